mod openai;
pub mod parse;
mod settings;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::scanner::{ImageAnalysis, TextAnalysis, NEUTRAL_SCAM_SCORE};

pub use openai::OpenAiAnalyst;
pub use settings::{LlmSettings, ProviderKind};

/// Listing fields submitted for text analysis. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingText {
    pub title: String,
    pub description: String,
    pub price: String,
    pub seller_info: String,
}

/// Model-backed assessment of listing text and images.
#[async_trait]
pub trait ListingAnalyst: Send + Sync {
    async fn analyze_text(&self, listing: &ListingText) -> Result<TextAnalysis>;

    async fn analyze_image(&self, image_url: &str) -> Result<ImageAnalysis>;
}

/// Neutral analyst used when model calls are disabled.
#[derive(Debug, Default, Clone)]
pub struct NoopAnalyst;

#[async_trait]
impl ListingAnalyst for NoopAnalyst {
    async fn analyze_text(&self, listing: &ListingText) -> Result<TextAnalysis> {
        Ok(TextAnalysis {
            title: listing.title.clone(),
            scam_score: NEUTRAL_SCAM_SCORE,
            analysis: "Listing analysis is disabled; \
                the score reflects price and image signals only."
                .into(),
            red_flags: Vec::new(),
        })
    }

    async fn analyze_image(&self, _image_url: &str) -> Result<ImageAnalysis> {
        Ok(ImageAnalysis {
            description: "Image analysis disabled".into(),
            ..ImageAnalysis::default()
        })
    }
}

/// Stands in for a misconfigured analyst so each request degrades instead of the process failing.
#[derive(Debug, Clone)]
pub struct UnconfiguredAnalyst {
    reason: String,
}

impl UnconfiguredAnalyst {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl ListingAnalyst for UnconfiguredAnalyst {
    async fn analyze_text(&self, _listing: &ListingText) -> Result<TextAnalysis> {
        Err(anyhow!("listing analyst is not configured: {}", self.reason))
    }

    async fn analyze_image(&self, _image_url: &str) -> Result<ImageAnalysis> {
        Err(anyhow!("listing analyst is not configured: {}", self.reason))
    }
}

/// Pick an analyst implementation for the loaded settings.
pub fn build_analyst(settings: Result<LlmSettings>) -> Arc<dyn ListingAnalyst> {
    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "listing analyst disabled");
            return Arc::new(UnconfiguredAnalyst::new(format!("{err:#}")));
        }
    };
    match settings.provider {
        ProviderKind::Noop => Arc::new(NoopAnalyst),
        ProviderKind::OpenAi => match OpenAiAnalyst::new(&settings) {
            Ok(analyst) => {
                tracing::info!(model = analyst.model(), "using OpenAI listing analyst");
                Arc::new(analyst)
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to build OpenAI analyst");
                Arc::new(UnconfiguredAnalyst::new(format!("{err:#}")))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_analyst_is_neutral() {
        let listing = ListingText {
            title: "Sofa".into(),
            ..ListingText::default()
        };
        let text = NoopAnalyst.analyze_text(&listing).await.unwrap();
        assert_eq!(text.scam_score, NEUTRAL_SCAM_SCORE);
        assert_eq!(text.title, "Sofa");
        assert!(text.red_flags.is_empty());

        let image = NoopAnalyst.analyze_image("https://img.example/1.jpg").await.unwrap();
        assert!(!image.is_stock_image);
        assert_eq!(image.description, "Image analysis disabled");
    }

    #[tokio::test]
    async fn configuration_errors_surface_per_call() {
        let analyst = build_analyst(Err(anyhow!("LISTING_GUARD_API_KEY missing")));
        let err = analyst
            .analyze_text(&ListingText::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("LISTING_GUARD_API_KEY missing"));
        assert!(analyst.analyze_image("https://img.example").await.is_err());
    }

    #[tokio::test]
    async fn noop_provider_builds_noop_analyst() {
        let analyst = build_analyst(Ok(LlmSettings {
            provider: ProviderKind::Noop,
            api_key: String::new(),
            endpoint: None,
            model: None,
            timeout_secs: None,
        }));
        let text = analyst.analyze_text(&ListingText::default()).await.unwrap();
        assert_eq!(text.scam_score, NEUTRAL_SCAM_SCORE);
    }

    #[test]
    fn listing_text_deserializes_partial_camel_case() {
        let listing: ListingText = serde_json::from_value(serde_json::json!({
            "title": "Bike",
            "sellerInfo": "joined 2019",
        }))
        .unwrap();
        assert_eq!(listing.seller_info, "joined 2019");
        assert!(listing.description.is_empty());
    }
}
