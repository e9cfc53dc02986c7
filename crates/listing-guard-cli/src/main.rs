mod config;

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use listing_guard_core::{
    build_analyst,
    history::summarize,
    http::{router, AppState},
    pricing::{format_price, ProductSearchSource, DEFAULT_SEARCH_TIMEOUT},
    render_report, InMemoryScanStore, ListingScraper, OutputFormat, PgScanStore, PriceOracle,
    PriceTable, RiskBand, ScanPipeline, ScanRequest, ScanStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "listing-guard",
    author,
    version,
    about = "Marketplace listing scam scanner"
)]
struct Cli {
    /// Optional TOML/YAML configuration file
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides config and LISTING_GUARD_BIND)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
    /// Scan a single listing and print the assessment
    Scan {
        #[arg(long)]
        title: String,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "seller")]
        seller_info: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the detected category for a listing title
    Categorize { title: String },
    /// Compare an asking price against market data
    ComparePrices {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "0")]
        price: String,
        #[arg(long)]
        json: bool,
    },
    /// Fetch a listing page and print the extracted fields as JSON
    Scrape { url: String },
    /// Show stored scans, newest first
    History {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve(&config, bind).await?,
        Commands::Scan {
            title,
            price,
            description,
            seller_info,
            image_url,
            url,
            json,
        } => {
            let request = ScanRequest {
                url,
                title: Some(title),
                description,
                price,
                seller_info,
                image_url,
            };
            scan(&config, request, OutputFormat::from_json_flag(json)).await?
        }
        Commands::Categorize { title } => {
            println!("{}", listing_guard_core::detect_category(&title));
        }
        Commands::ComparePrices { title, price, json } => {
            compare_prices(&config, &title, &price, json).await?
        }
        Commands::Scrape { url } => scrape(&url).await?,
        Commands::History { json } => history(&config, json).await?,
    }
    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn ScanStore>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = PgScanStore::connect(url).await?;
            info!("using Postgres scan store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no database configured; scans are kept in memory only");
            Ok(Arc::new(InMemoryScanStore::new()))
        }
    }
}

fn load_table(path: Option<&Path>) -> Result<PriceTable> {
    match path {
        Some(path) => PriceTable::from_yaml_file(path),
        None => Ok(PriceTable::default()),
    }
}

fn build_oracle(config: &AppConfig) -> Result<PriceOracle> {
    let table = load_table(config.pricing.table_path.as_deref())?;
    let mut oracle = PriceOracle::with_simulated_sources(table, Utc::now().year());
    if let Some(endpoint) = config.pricing.search_endpoint.as_deref() {
        let timeout = config
            .pricing
            .search_timeout()?
            .unwrap_or(DEFAULT_SEARCH_TIMEOUT);
        oracle = oracle.with_source(Arc::new(ProductSearchSource::new(endpoint, timeout)?));
    }
    Ok(oracle)
}

async fn build_pipeline(config: &AppConfig) -> Result<ScanPipeline> {
    let analyst = build_analyst(config.llm_settings());
    let oracle = Arc::new(build_oracle(config)?);
    let store = open_store(config).await?;
    Ok(ScanPipeline::new(analyst, oracle, store).with_thresholds(config.thresholds))
}

async fn serve(config: &AppConfig, bind: Option<SocketAddr>) -> Result<()> {
    let addr = match bind {
        Some(addr) => addr,
        None => config
            .bind
            .parse()
            .with_context(|| format!("invalid bind address `{}`", config.bind))?,
    };
    let state = AppState::new(build_pipeline(config).await?, ListingScraper::new()?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listing-guard API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

fn colored_band(band: RiskBand) -> String {
    match band {
        RiskBand::Low => band.label().green().to_string(),
        RiskBand::Medium => band.label().yellow().to_string(),
        RiskBand::High => band.label().red().bold().to_string(),
    }
}

async fn scan(config: &AppConfig, request: ScanRequest, format: OutputFormat) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let outcome = pipeline.run(request).await;
    let report = render_report(&outcome, format)?;
    print!("{report}");
    if format == OutputFormat::Human {
        println!("Verdict: {}", colored_band(outcome.assessment.risk_band));
    }
    Ok(())
}

async fn compare_prices(config: &AppConfig, title: &str, price: &str, json: bool) -> Result<()> {
    let oracle = build_oracle(config)?;
    let comparison = oracle.compare(title, price).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    println!(
        "Average {} (range {} - {})",
        format_price(comparison.average_price),
        format_price(comparison.lowest_price),
        format_price(comparison.highest_price)
    );
    let difference = format!("{:.1}% below average", comparison.percentage_difference);
    if comparison.is_suspiciously_low {
        println!("{} {}", difference.red(), "(suspiciously low)".red().bold());
    } else {
        println!("{difference}");
    }
    for alt in &comparison.alternatives {
        let marker = if alt.trusted { "✓".green() } else { "?".yellow() };
        println!("  {marker} {:<60} {:>12}  {}", alt.title, alt.price, alt.url);
    }
    Ok(())
}

async fn scrape(raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("invalid URL `{raw}`"))?;
    let listing = ListingScraper::new()?.scrape(&url).await?;
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

async fn history(config: &AppConfig, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let history = store.load_history().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    let scans: Vec<_> = history.iter().map(|details| details.scan.clone()).collect();
    let summary = summarize(&scans, &config.thresholds);
    println!(
        "{} scan(s), {} high risk, average score {}",
        summary.total_scans, summary.high_risk_scans, summary.average_score
    );
    for details in &history {
        let band =
            RiskBand::from_score_with_thresholds(details.scan.scam_score, &config.thresholds);
        println!(
            "- {date} {score:>3} {band:<14} {title} ({flags} flag(s))",
            date = details.scan.created_at.format("%Y-%m-%d %H:%M"),
            score = details.scan.scam_score,
            band = colored_band(band),
            title = details.scan.title,
            flags = details.red_flags.len(),
        );
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tokio=warn,sqlx=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
