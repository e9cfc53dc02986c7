//! Market price comparison for listings.
//!
//! [`PriceOracle`] fans a query out to every [`PriceSource`] that supports the
//! detected category and derives deviation statistics from the quotes. When
//! fewer than two usable quotes come back it falls back to the static
//! [`PriceTable`].

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::scanner::{detect_category, extract_keywords, Category};

pub mod http_source;
pub mod sources;
pub mod table;

pub use http_source::{ProductSearchSource, DEFAULT_SEARCH_TIMEOUT};
pub use sources::{
    PriceSource, RealEstateListings, SimulatedMarketplace, StaticPriceSource, VehicleListings,
};
pub use table::{PriceRange, PriceRangeError, PriceTable};

/// Discount (in percent below the market average) beyond which a price is suspicious.
pub const SUSPICIOUS_DISCOUNT_PCT: f64 = 40.0;

/// Maximum number of comparable listings returned to callers.
pub const MAX_ALTERNATIVES: usize = 5;

/// Minimum number of quotes needed before live data is trusted over the table.
pub const MIN_QUOTES: usize = 2;

/// A comparable listing shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeListing {
    pub title: String,
    /// Display price, e.g. `$699.00`.
    pub price: String,
    pub url: String,
    pub trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparison {
    pub average_price: f64,
    pub lowest_price: f64,
    pub highest_price: f64,
    /// Positive when the asking price is below average.
    pub percentage_difference: f64,
    pub is_suspiciously_low: bool,
    pub alternatives: Vec<AlternativeListing>,
}

/// What a [`PriceSource`] is asked to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery {
    pub title: String,
    pub keywords: String,
    pub category: Category,
}

impl PriceQuery {
    pub fn from_title(title: &str) -> Self {
        Self {
            title: title.to_string(),
            keywords: extract_keywords(title),
            category: detect_category(title),
        }
    }
}

/// A raw price quote returned by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuote {
    pub title: String,
    pub price: f64,
    pub url: String,
    pub trusted: bool,
}

impl ListingQuote {
    pub fn to_alternative(&self) -> AlternativeListing {
        AlternativeListing {
            title: self.title.clone(),
            price: format_price(self.price),
            url: self.url.clone(),
            trusted: self.trusted,
        }
    }
}

/// Parse a free-form price such as `"$1,299.99"`; anything unparseable is zero.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

pub fn format_price(value: f64) -> String {
    format!("${value:.2}")
}

/// Percent by which `input` sits below `average`; zero when there is no average.
pub fn price_deviation(average: f64, input: f64) -> f64 {
    if average == 0.0 {
        0.0
    } else {
        (average - input) / average * 100.0
    }
}

pub struct PriceOracle {
    sources: Vec<Arc<dyn PriceSource>>,
    table: PriceTable,
}

impl PriceOracle {
    /// Oracle with no live sources; every comparison uses the table.
    pub fn new(table: PriceTable) -> Self {
        Self {
            sources: Vec::new(),
            table,
        }
    }

    /// Oracle backed by the simulated marketplace, vehicle and real-estate sources.
    pub fn with_simulated_sources(table: PriceTable, reference_year: i32) -> Self {
        Self::new(table.clone())
            .with_source(Arc::new(SimulatedMarketplace::amazon().with_table(table.clone())))
            .with_source(Arc::new(SimulatedMarketplace::ebay().with_table(table.clone())))
            .with_source(Arc::new(SimulatedMarketplace::walmart().with_table(table)))
            .with_source(Arc::new(VehicleListings::new(reference_year)))
            .with_source(Arc::new(RealEstateListings::default()))
    }

    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Compare an asking price against the market. Never fails.
    #[instrument(skip(self), fields(category = tracing::field::Empty))]
    pub async fn compare(&self, title: &str, price_text: &str) -> PriceComparison {
        let input_price = parse_price(price_text);
        let query = PriceQuery::from_title(title);
        tracing::Span::current().record("category", query.category.as_str());

        let quotes = self.collect_quotes(&query).await;
        if quotes.len() < MIN_QUOTES {
            debug!(
                quotes = quotes.len(),
                "too few comparable listings; using category baseline"
            );
            return self
                .table
                .fallback_comparison(title, input_price, query.category);
        }

        summarize_quotes(&quotes, input_price)
    }

    async fn collect_quotes(&self, query: &PriceQuery) -> Vec<ListingQuote> {
        let searches = self
            .sources
            .iter()
            .filter(|source| source.supports(query.category))
            .map(|source| async move {
                match source.search(query).await {
                    Ok(quotes) => {
                        debug!(
                            source = source.name(),
                            count = quotes.len(),
                            "price source answered"
                        );
                        quotes
                    }
                    Err(err) => {
                        warn!(source = source.name(), error = %err, "price source failed");
                        Vec::new()
                    }
                }
            });

        join_all(searches)
            .await
            .into_iter()
            .flatten()
            .filter(|quote| quote.price.is_finite() && quote.price > 0.0)
            .collect()
    }
}

fn summarize_quotes(quotes: &[ListingQuote], input_price: f64) -> PriceComparison {
    let total: f64 = quotes.iter().map(|quote| quote.price).sum();
    let average_price = total / quotes.len() as f64;
    let lowest_price = quotes
        .iter()
        .map(|quote| quote.price)
        .fold(f64::INFINITY, f64::min);
    let highest_price = quotes
        .iter()
        .map(|quote| quote.price)
        .fold(f64::NEG_INFINITY, f64::max);
    let percentage_difference = price_deviation(average_price, input_price);

    PriceComparison {
        average_price,
        lowest_price,
        highest_price,
        percentage_difference,
        is_suspiciously_low: percentage_difference > SUSPICIOUS_DISCOUNT_PCT,
        alternatives: quotes
            .iter()
            .take(MAX_ALTERNATIVES)
            .map(ListingQuote::to_alternative)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(title: &str, price: f64) -> ListingQuote {
        ListingQuote {
            title: title.into(),
            price,
            url: format!("https://shop.example/{}", title.to_lowercase()),
            trusted: true,
        }
    }

    #[test]
    fn parse_price_strips_currency_noise() {
        assert_eq!(parse_price("$1,299.99"), 1299.99);
        assert_eq!(parse_price("450"), 450.0);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("call for price"), 0.0);
        assert_eq!(parse_price("1.2.3"), 0.0);
    }

    #[test]
    fn format_price_uses_two_decimals() {
        assert_eq!(format_price(699.0), "$699.00");
        assert_eq!(format_price(1234.567), "$1234.57");
    }

    #[test]
    fn deviation_handles_zero_average() {
        assert_eq!(price_deviation(0.0, 100.0), 0.0);
        assert_eq!(price_deviation(800.0, 300.0), 62.5);
        assert!(price_deviation(100.0, 150.0) < 0.0);
    }

    #[test]
    fn suspicious_flag_is_strictly_above_forty_percent() {
        let quotes = [quote("A", 900.0), quote("B", 1100.0)];

        let half = summarize_quotes(&quotes, 500.0);
        assert_eq!(half.average_price, 1000.0);
        assert_eq!(half.percentage_difference, 50.0);
        assert!(half.is_suspiciously_low);

        let slight = summarize_quotes(&quotes, 900.0);
        assert_eq!(slight.percentage_difference, 10.0);
        assert!(!slight.is_suspiciously_low);

        let boundary = summarize_quotes(&quotes, 600.0);
        assert_eq!(boundary.percentage_difference, 40.0);
        assert!(!boundary.is_suspiciously_low);
    }

    #[tokio::test]
    async fn live_quotes_drive_statistics() {
        let source = StaticPriceSource::new(
            "fixture",
            vec![
                quote("A", 700.0),
                quote("B", 800.0),
                quote("C", 900.0),
                quote("Free", 0.0),
            ],
        );
        let oracle = PriceOracle::new(PriceTable::default()).with_source(Arc::new(source));

        let comparison = oracle.compare("iPhone 13 Pro", "$300").await;
        assert_eq!(comparison.average_price, 800.0);
        assert_eq!(comparison.lowest_price, 700.0);
        assert_eq!(comparison.highest_price, 900.0);
        assert_eq!(comparison.percentage_difference, 62.5);
        assert!(comparison.is_suspiciously_low);
        assert_eq!(comparison.alternatives.len(), 3);
        assert_eq!(comparison.alternatives[0].price, "$700.00");
    }

    #[tokio::test]
    async fn alternatives_are_capped() {
        let quotes = (1..=8).map(|i| quote(&format!("Q{i}"), 100.0 * i as f64)).collect();
        let oracle = PriceOracle::new(PriceTable::default())
            .with_source(Arc::new(StaticPriceSource::new("fixture", quotes)));

        let comparison = oracle.compare("desk lamp", "100").await;
        assert_eq!(comparison.alternatives.len(), MAX_ALTERNATIVES);
    }

    #[tokio::test]
    async fn failing_source_does_not_poison_others() {
        let good = StaticPriceSource::new("good", vec![quote("A", 400.0), quote("B", 600.0)]);
        let oracle = PriceOracle::new(PriceTable::default())
            .with_source(Arc::new(StaticPriceSource::failing("broken")))
            .with_source(Arc::new(good));

        let comparison = oracle.compare("Bose speaker", "$450").await;
        assert_eq!(comparison.average_price, 500.0);
        assert!(!comparison.is_suspiciously_low);
    }

    #[tokio::test]
    async fn single_quote_falls_back_to_table() {
        let oracle = PriceOracle::new(PriceTable::default())
            .with_source(Arc::new(StaticPriceSource::new("one", vec![quote("A", 10.0)])));

        let comparison = oracle.compare("iPhone 13 Pro", "$300").await;
        assert_eq!(comparison.average_price, 800.0);
        assert_eq!(comparison.lowest_price, 600.0);
        assert_eq!(comparison.highest_price, 1200.0);
        assert!(comparison.is_suspiciously_low);
        assert!(!comparison.alternatives.is_empty());
    }

    #[tokio::test]
    async fn sources_only_see_supported_categories() {
        let motors_only = StaticPriceSource::new("motors", vec![quote("A", 1.0), quote("B", 2.0)])
            .for_categories(&[Category::Vehicle]);
        let oracle = PriceOracle::new(PriceTable::default()).with_source(Arc::new(motors_only));

        let comparison = oracle.compare("Leather sofa", "$800").await;
        assert_eq!(comparison.average_price, 800.0);
        assert_eq!(comparison.percentage_difference, 0.0);
    }

    #[tokio::test]
    async fn simulated_sources_are_deterministic() {
        let oracle = PriceOracle::with_simulated_sources(PriceTable::default(), 2024);
        let first = oracle.compare("Samsung Galaxy S22", "$650").await;
        let second = oracle.compare("Samsung Galaxy S22", "$650").await;
        assert_eq!(first, second);
        assert!(first.alternatives.len() <= MAX_ALTERNATIVES);
        assert!(first.average_price > 0.0);
    }
}
