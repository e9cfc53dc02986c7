use std::fmt::Write;

use serde::Serialize;

use crate::pipeline::ScanOutcome;
use crate::pricing::{format_price, AlternativeListing};
use crate::scanner::{ImageAnalysis, RedFlag, RiskBand, ScoreBreakdown};

/// Format styles supported by the CLI renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Produce a report string for a completed scan.
pub fn render_report(outcome: &ScanOutcome, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(outcome),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&ScanResponse::from(outcome))?),
    }
}

fn render_human(outcome: &ScanOutcome) -> anyhow::Result<String> {
    let scan = &outcome.scan;
    let assessment = &outcome.assessment;

    let mut out = String::new();
    writeln!(out, "Listing: {}", scan.title)?;
    writeln!(
        out,
        "Scam Score: {} ({})",
        assessment.scam_score,
        assessment.risk_band.label()
    )?;
    if !outcome.persisted {
        writeln!(out, "Note: result was not saved to history")?;
    }
    writeln!(out)?;
    writeln!(out, "{}", single_line(&scan.analysis))?;
    writeln!(out)?;

    if assessment.red_flags.is_empty() {
        writeln!(out, "No red flags detected.")?;
    } else {
        writeln!(out, "Red Flags:")?;
        for flag in &assessment.red_flags {
            writeln!(out, "  - [{}] {}", flag.severity, single_line(&flag.description))?;
        }
    }

    let price = &outcome.price;
    writeln!(out)?;
    writeln!(
        out,
        "Market average: {} • difference: {:.0}%{}",
        format_price(price.average_price),
        price.percentage_difference,
        if price.is_suspiciously_low {
            " (suspiciously low)"
        } else {
            ""
        }
    )?;

    if !price.alternatives.is_empty() {
        writeln!(out, "Alternatives:")?;
        for alt in &price.alternatives {
            writeln!(
                out,
                "  - {title} {price}{trusted}",
                title = alt.title,
                price = alt.price,
                trusted = if alt.trusted { " [trusted]" } else { "" },
            )?;
            writeln!(out, "    {}", alt.url)?;
        }
    }

    if let Some(image) = &outcome.image {
        writeln!(out, "\nImage: {}", single_line(&image.description))?;
        if image.is_stock_image {
            writeln!(out, "  Appears to be a stock photo")?;
        }
        for element in &image.suspicious_elements {
            writeln!(out, "  Suspicious: {element}")?;
        }
    }

    let breakdown = &assessment.breakdown;
    writeln!(
        out,
        "\nText {} + price {} + stock image {} + image elements {} = {}",
        breakdown.text_score,
        breakdown.price_adjustment,
        breakdown.stock_image_adjustment,
        breakdown.image_elements_adjustment,
        breakdown.raw_total
    )?;

    Ok(out)
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub average_price: f64,
    pub percentage_difference: f64,
    pub is_suspiciously_low: bool,
}

/// Wire shape of a scan result, shared by `POST /scan` and `scan --json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub scam_score: u8,
    pub risk_band: RiskBand,
    pub analysis: String,
    pub red_flags: Vec<RedFlag>,
    pub alternatives: Vec<AlternativeListing>,
    pub price_comparison: PriceSummary,
    pub image_analysis: Option<ImageAnalysis>,
    pub breakdown: ScoreBreakdown,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ScanOutcome> for ScanResponse {
    fn from(outcome: &ScanOutcome) -> Self {
        Self {
            id: outcome.scan.id.to_string(),
            title: outcome.scan.title.clone(),
            url: outcome.scan.url.clone(),
            image_url: outcome.scan.image_url.clone(),
            scam_score: outcome.assessment.scam_score,
            risk_band: outcome.assessment.risk_band,
            analysis: outcome.scan.analysis.clone(),
            red_flags: outcome.assessment.red_flags.clone(),
            alternatives: outcome.price.alternatives.clone(),
            price_comparison: PriceSummary {
                average_price: outcome.price.average_price,
                percentage_difference: outcome.price.percentage_difference,
                is_suspiciously_low: outcome.price.is_suspiciously_low,
            },
            image_analysis: outcome.image.clone(),
            breakdown: outcome.assessment.breakdown.clone(),
            persisted: outcome.persisted,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceComparison;
    use crate::scanner::{RiskAssessment, Severity, TextAnalysis};
    use crate::store::NewScan;

    fn sample_outcome() -> ScanOutcome {
        let scan = NewScan {
            title: "2020 Honda CBR600RR".into(),
            url: Some("https://market.example/items/7".into()),
            image_url: None,
            scam_score: 75,
            analysis: "Seller asks for a deposit\nbefore viewing.".into(),
        }
        .into_transient();
        ScanOutcome {
            scan,
            persisted: true,
            text: TextAnalysis::unavailable("2020 Honda CBR600RR"),
            assessment: RiskAssessment {
                scam_score: 75,
                risk_band: RiskBand::High,
                red_flags: vec![RedFlag::new(Severity::High, "Price is 65% below market value")],
                breakdown: ScoreBreakdown {
                    text_score: 60,
                    price_adjustment: 15,
                    stock_image_adjustment: 0,
                    image_elements_adjustment: 0,
                    raw_total: 75,
                },
            },
            price: PriceComparison {
                average_price: 8500.0,
                lowest_price: 7000.0,
                highest_price: 9800.0,
                percentage_difference: 64.7,
                is_suspiciously_low: true,
                alternatives: vec![AlternativeListing {
                    title: "Cycle Trader: 2020 Honda CBR600RR - Excellent Condition".into(),
                    price: "$8450.00".into(),
                    url: "https://www.example.com/2020-honda-cbr600rr".into(),
                    trusted: true,
                }],
            },
            image: None,
        }
    }

    #[test]
    fn human_report_lists_flags_and_alternatives() {
        let output = render_report(&sample_outcome(), OutputFormat::Human).unwrap();
        assert!(output.contains("Scam Score: 75 (High Risk)"));
        assert!(output.contains("  - [high] Price is 65% below market value"));
        assert!(output.contains("Seller asks for a deposit before viewing."));
        assert!(output.contains("Market average: $8500.00 • difference: 65% (suspiciously low)"));
        assert!(output.contains("$8450.00 [trusted]"));
        assert!(!output.contains("not saved"));
    }

    #[test]
    fn human_report_notes_unsaved_scans() {
        let mut outcome = sample_outcome();
        outcome.persisted = false;
        outcome.assessment.red_flags.clear();
        let output = render_report(&outcome, OutputFormat::Human).unwrap();
        assert!(output.contains("Note: result was not saved to history"));
        assert!(output.contains("No red flags detected."));
    }

    #[test]
    fn json_report_uses_wire_shape() {
        let outcome = sample_outcome();
        let output = render_report(&outcome, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["id"], outcome.scan.id.to_string());
        assert_eq!(value["scamScore"], 75);
        assert_eq!(value["riskBand"], "high");
        assert_eq!(value["priceComparison"]["isSuspiciouslyLow"], true);
        assert_eq!(value["alternatives"][0]["trusted"], true);
        assert!(value["imageAnalysis"].is_null());
        assert!(value.get("error").is_none());
    }
}
