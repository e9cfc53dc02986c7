pub mod history;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod pricing;
pub mod report;
pub mod scanner;
pub mod scraper;
pub mod store;

pub use history::{summarize, HistorySummary};
pub use llm::{build_analyst, ListingAnalyst, ListingText, LlmSettings, NoopAnalyst};
pub use pipeline::{ScanOutcome, ScanPipeline, ScanRequest};
pub use pricing::{PriceComparison, PriceOracle, PriceTable};
pub use report::{render_report, OutputFormat, ScanResponse};
pub use scanner::{
    aggregate, detect_category, extract_keywords, Category, ImageAnalysis, RedFlag,
    RiskAssessment, RiskBand, RiskThresholds, Severity, TextAnalysis,
};
pub use self::scraper::{ListingScraper, ScrapedListing};
pub use store::{InMemoryScanStore, PgScanStore, Scan, ScanDetails, ScanStore, StoreError};
