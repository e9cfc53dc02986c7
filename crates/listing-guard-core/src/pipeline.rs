use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::llm::{ListingAnalyst, ListingText};
use crate::pricing::{PriceComparison, PriceOracle};
use crate::scanner::{aggregate, ImageAnalysis, RiskAssessment, RiskThresholds, TextAnalysis};
use crate::store::{NewScan, Scan, ScanStore};

pub const DEFAULT_TITLE: &str = "Unknown listing";

/// One listing submitted for scanning. Blank fields are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanRequest {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub seller_info: Option<String>,
    pub image_url: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl ScanRequest {
    pub fn title_or_default(&self) -> String {
        present(&self.title).unwrap_or(DEFAULT_TITLE).to_string()
    }

    pub fn image_url(&self) -> Option<&str> {
        present(&self.image_url)
    }

    fn listing_text(&self) -> ListingText {
        ListingText {
            title: self.title_or_default(),
            description: present(&self.description).unwrap_or_default().to_string(),
            price: present(&self.price).unwrap_or_default().to_string(),
            seller_info: present(&self.seller_info).unwrap_or_default().to_string(),
        }
    }
}

/// Everything produced for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub scan: Scan,
    /// `false` when the store rejected the scan and `scan` is transient.
    pub persisted: bool,
    pub text: TextAnalysis,
    pub assessment: RiskAssessment,
    pub price: PriceComparison,
    pub image: Option<ImageAnalysis>,
}

/// Orchestrates analysis, price comparison, aggregation and persistence for one request.
#[derive(Clone)]
pub struct ScanPipeline {
    analyst: Arc<dyn ListingAnalyst>,
    oracle: Arc<PriceOracle>,
    store: Arc<dyn ScanStore>,
    thresholds: RiskThresholds,
}

impl ScanPipeline {
    pub fn new(
        analyst: Arc<dyn ListingAnalyst>,
        oracle: Arc<PriceOracle>,
        store: Arc<dyn ScanStore>,
    ) -> Self {
        Self {
            analyst,
            oracle,
            store,
            thresholds: RiskThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn analyst(&self) -> &Arc<dyn ListingAnalyst> {
        &self.analyst
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }

    pub fn store(&self) -> &Arc<dyn ScanStore> {
        &self.store
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    #[instrument(skip(self, request), fields(title = tracing::field::Empty))]
    pub async fn run(&self, request: ScanRequest) -> ScanOutcome {
        let listing = request.listing_text();
        tracing::Span::current().record("title", listing.title.as_str());

        let (text, price, image) = tokio::join!(
            self.analyze_text(&listing),
            self.oracle.compare(&listing.title, &listing.price),
            self.analyze_image(request.image_url()),
        );

        let assessment = aggregate(&text, &price, image.as_ref(), &self.thresholds);
        let new_scan = NewScan {
            title: listing.title.clone(),
            url: present(&request.url).map(str::to_string),
            image_url: request.image_url().map(str::to_string),
            scam_score: assessment.scam_score,
            analysis: text.analysis.clone(),
        };

        let (scan, persisted) = self.persist(new_scan, &assessment, &price).await;
        info!(
            scan_id = %scan.id,
            score = scan.scam_score,
            band = ?assessment.risk_band,
            persisted,
            "scan completed"
        );

        ScanOutcome {
            scan,
            persisted,
            text,
            assessment,
            price,
            image,
        }
    }

    async fn analyze_text(&self, listing: &ListingText) -> TextAnalysis {
        match self.analyst.analyze_text(listing).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "text analysis failed; using neutral score");
                TextAnalysis::unavailable(listing.title.clone())
            }
        }
    }

    async fn analyze_image(&self, image_url: Option<&str>) -> Option<ImageAnalysis> {
        let image_url = image_url?;
        match self.analyst.analyze_image(image_url).await {
            Ok(image) => Some(image),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "image analysis failed");
                Some(ImageAnalysis::unavailable())
            }
        }
    }

    async fn persist(
        &self,
        new_scan: NewScan,
        assessment: &RiskAssessment,
        price: &PriceComparison,
    ) -> (Scan, bool) {
        let scan = match self.store.create_scan(new_scan.clone()).await {
            Ok(scan) => scan,
            Err(err) => {
                warn!(error = %err, "failed to persist scan; returning transient result");
                return (new_scan.into_transient(), false);
            }
        };

        if let Err(err) = self
            .store
            .insert_red_flags(scan.id, &assessment.red_flags)
            .await
        {
            warn!(scan_id = %scan.id, error = %err, "failed to persist red flags");
        }
        if let Err(err) = self
            .store
            .insert_alternatives(scan.id, &price.alternatives)
            .await
        {
            warn!(scan_id = %scan.id, error = %err, "failed to persist alternatives");
        }

        (scan, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::NoopAnalyst;
    use crate::pricing::{ListingQuote, PriceTable, StaticPriceSource};
    use crate::scanner::{RedFlag, RiskBand, Severity};
    use crate::store::{
        InMemoryScanStore, StoreError, StoreResult, StoredAlternative, StoredRedFlag,
    };
    use crate::pricing::AlternativeListing;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct FixedAnalyst {
        score: u8,
        image: Option<ImageAnalysis>,
    }

    #[async_trait]
    impl ListingAnalyst for FixedAnalyst {
        async fn analyze_text(&self, listing: &ListingText) -> Result<TextAnalysis> {
            Ok(TextAnalysis {
                title: listing.title.clone(),
                scam_score: self.score,
                analysis: "Seller insists on wire transfer.".into(),
                red_flags: vec![RedFlag::new(Severity::High, "Unusual payment method")],
            })
        }

        async fn analyze_image(&self, _image_url: &str) -> Result<ImageAnalysis> {
            self.image.clone().ok_or_else(|| anyhow!("vision model unavailable"))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ScanStore for FailingStore {
        async fn create_scan(&self, _scan: NewScan) -> StoreResult<Scan> {
            Err(StoreError::Backend(anyhow!("connection refused")))
        }

        async fn insert_red_flags(&self, _scan_id: Uuid, _flags: &[RedFlag]) -> StoreResult<()> {
            Err(StoreError::Backend(anyhow!("connection refused")))
        }

        async fn insert_alternatives(
            &self,
            _scan_id: Uuid,
            _alternatives: &[AlternativeListing],
        ) -> StoreResult<()> {
            Err(StoreError::Backend(anyhow!("connection refused")))
        }

        async fn find_scan(&self, _id: Uuid) -> StoreResult<Option<Scan>> {
            Ok(None)
        }

        async fn red_flags_for(&self, _scan_id: Uuid) -> StoreResult<Vec<StoredRedFlag>> {
            Ok(Vec::new())
        }

        async fn alternatives_for(&self, _scan_id: Uuid) -> StoreResult<Vec<StoredAlternative>> {
            Ok(Vec::new())
        }

        async fn list_scans(&self) -> StoreResult<Vec<Scan>> {
            Ok(Vec::new())
        }

        async fn delete_scan(&self, _id: Uuid) -> StoreResult<bool> {
            Ok(false)
        }

        async fn delete_red_flags_for(&self, _scan_id: Uuid) -> StoreResult<u64> {
            Ok(0)
        }

        async fn delete_alternatives_for(&self, _scan_id: Uuid) -> StoreResult<u64> {
            Ok(0)
        }
    }

    fn oracle() -> Arc<PriceOracle> {
        let quotes = vec![
            ListingQuote {
                title: "A".into(),
                price: 700.0,
                url: "https://shop.example/a".into(),
                trusted: true,
            },
            ListingQuote {
                title: "B".into(),
                price: 900.0,
                url: "https://shop.example/b".into(),
                trusted: false,
            },
        ];
        Arc::new(
            PriceOracle::new(PriceTable::default())
                .with_source(Arc::new(StaticPriceSource::new("fixture", quotes))),
        )
    }

    fn request(price: &str, image_url: Option<&str>) -> ScanRequest {
        ScanRequest {
            url: Some("https://market.example/items/1".into()),
            title: Some("iPhone 13 Pro".into()),
            description: Some("Sealed".into()),
            price: Some(price.into()),
            seller_info: None,
            image_url: image_url.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn scan_is_scored_and_persisted() {
        let store = Arc::new(InMemoryScanStore::new());
        let pipeline = ScanPipeline::new(
            Arc::new(FixedAnalyst {
                score: 60,
                image: None,
            }),
            oracle(),
            store.clone(),
        );

        let outcome = pipeline.run(request("$300", None)).await;
        assert!(outcome.persisted);
        assert_eq!(outcome.assessment.scam_score, 75);
        assert_eq!(outcome.scan.scam_score, 75);
        assert_eq!(outcome.assessment.risk_band, RiskBand::High);
        assert!(outcome.image.is_none());

        let details = store.load_details(outcome.scan.id).await.unwrap();
        assert_eq!(details.red_flags.len(), 2);
        assert_eq!(details.red_flags[1].description, "Price is 63% below market value");
        assert_eq!(details.alternatives.len(), 2);
        assert_eq!(details.scan.analysis, "Seller insists on wire transfer.");
    }

    #[tokio::test]
    async fn image_failure_falls_back_without_penalty() {
        let pipeline = ScanPipeline::new(
            Arc::new(FixedAnalyst {
                score: 20,
                image: None,
            }),
            oracle(),
            Arc::new(InMemoryScanStore::new()),
        );

        let outcome = pipeline.run(request("$800", Some("https://img.example/1.jpg"))).await;
        let image = outcome.image.expect("fallback image analysis");
        assert_eq!(image.description, "Image analysis unavailable");
        assert_eq!(outcome.assessment.scam_score, 20);
    }

    #[tokio::test]
    async fn image_signals_are_added() {
        let pipeline = ScanPipeline::new(
            Arc::new(FixedAnalyst {
                score: 20,
                image: Some(ImageAnalysis {
                    is_stock_image: true,
                    contains_text: true,
                    description: "Catalog shot".into(),
                    suspicious_elements: vec!["watermark".into()],
                }),
            }),
            oracle(),
            Arc::new(InMemoryScanStore::new()),
        );

        let outcome = pipeline.run(request("$800", Some("https://img.example/1.jpg"))).await;
        assert_eq!(outcome.assessment.scam_score, 35);
        assert_eq!(outcome.scan.image_url.as_deref(), Some("https://img.example/1.jpg"));
    }

    #[tokio::test]
    async fn store_failure_yields_transient_scan() {
        let pipeline = ScanPipeline::new(Arc::new(NoopAnalyst), oracle(), Arc::new(FailingStore));

        let outcome = pipeline.run(request("$800", None)).await;
        assert!(!outcome.persisted);
        assert_eq!(outcome.scan.scam_score, 50);
        assert_eq!(outcome.scan.title, "iPhone 13 Pro");
    }

    #[tokio::test]
    async fn blank_title_uses_default() {
        let pipeline = ScanPipeline::new(
            Arc::new(NoopAnalyst),
            oracle(),
            Arc::new(InMemoryScanStore::new()),
        );

        let outcome = pipeline
            .run(ScanRequest {
                title: Some("   ".into()),
                ..ScanRequest::default()
            })
            .await;
        assert_eq!(outcome.scan.title, DEFAULT_TITLE);
        assert!(outcome.scan.url.is_none());
    }
}
