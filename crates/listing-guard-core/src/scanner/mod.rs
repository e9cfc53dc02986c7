use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregator;
pub mod category;
pub mod keywords;

pub use aggregator::{aggregate, RiskAssessment, ScoreBreakdown};
pub use category::{detect_category, Category};
pub use keywords::extract_keywords;

/// Highest score a listing can receive.
pub const MAX_SCAM_SCORE: u8 = 100;

/// Score used whenever a signal is unavailable.
pub const NEUTRAL_SCAM_SCORE: u8 = 50;

/// Thresholds that map scam scores into qualitative risk bands.
///
/// A score strictly above `high` is high risk, strictly above `medium` is
/// medium risk, anything else is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: u8,
    pub high: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 30,
            high: 70,
        }
    }
}

/// Classification buckets for the final scam score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// Map a scam score (0–100) into a risk band using default thresholds.
    pub fn from_score(score: u8) -> Self {
        Self::from_score_with_thresholds(score, &RiskThresholds::default())
    }

    /// Map a scam score using caller-provided thresholds.
    pub fn from_score_with_thresholds(score: u8, thresholds: &RiskThresholds) -> Self {
        if score > thresholds.high {
            Self::High
        } else if score > thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Medium => "Moderate Risk",
            Self::High => "High Risk",
        }
    }
}

/// Severity attached to a red flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse model-provided severities, treating anything unrecognised as medium.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Medium)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown red flag severity `{0}`")]
pub struct UnknownSeverity(pub String);

/// A discrete, human-readable reason contributing to suspicion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlag {
    pub severity: Severity,
    pub description: String,
}

impl RedFlag {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
        }
    }
}

/// Assessment of the listing text produced by the analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysis {
    pub title: String,
    pub scam_score: u8,
    pub analysis: String,
    pub red_flags: Vec<RedFlag>,
}

impl TextAnalysis {
    /// Neutral stand-in used by the scan pipeline when the analyst fails.
    pub fn unavailable(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            scam_score: NEUTRAL_SCAM_SCORE,
            analysis: "We couldn't fully analyze this listing. \
                Please provide more details for a better assessment."
                .into(),
            red_flags: Vec::new(),
        }
    }

    /// Fixed payload returned by the standalone text-analysis endpoint on failure.
    pub fn failed() -> Self {
        Self {
            title: "Analysis unavailable".into(),
            scam_score: NEUTRAL_SCAM_SCORE,
            analysis: "We couldn't analyze this listing due to a technical error. \
                Please try again with more information."
                .into(),
            red_flags: vec![RedFlag::new(
                Severity::Medium,
                "Analysis failed due to technical issues",
            )],
        }
    }
}

/// Assessment of the listing image produced by the analyst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub is_stock_image: bool,
    pub contains_text: bool,
    pub description: String,
    pub suspicious_elements: Vec<String>,
}

impl ImageAnalysis {
    /// Stand-in used when the analyst fails; contributes nothing to the score.
    pub fn unavailable() -> Self {
        Self {
            description: "Image analysis unavailable".into(),
            ..Self::default()
        }
    }

    /// Fixed payload returned by the standalone image-analysis endpoint on failure.
    pub fn failed() -> Self {
        Self {
            description: "We couldn't analyze this image due to a technical error.".into(),
            ..Self::default()
        }
    }
}
