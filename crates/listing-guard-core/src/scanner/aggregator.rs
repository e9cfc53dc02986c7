use serde::{Deserialize, Serialize};

use super::{
    ImageAnalysis, RedFlag, RiskBand, RiskThresholds, Severity, TextAnalysis, MAX_SCAM_SCORE,
};
use crate::pricing::PriceComparison;

/// Added when the asking price is suspiciously far below market.
pub const PRICE_PENALTY: u32 = 15;
/// Added when the image looks like a stock photo.
pub const STOCK_IMAGE_PENALTY: u32 = 10;
/// Added per suspicious element spotted in the image.
pub const IMAGE_ELEMENT_PENALTY: u32 = 5;

/// Per-signal contributions that make up the final score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub text_score: u32,
    pub price_adjustment: u32,
    pub stock_image_adjustment: u32,
    pub image_elements_adjustment: u32,
    /// Sum before clamping to the maximum score.
    pub raw_total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub scam_score: u8,
    pub risk_band: RiskBand,
    pub red_flags: Vec<RedFlag>,
    pub breakdown: ScoreBreakdown,
}

/// Combine independent signals into one bounded score with ordered red flags.
///
/// Text flags come first, followed by price, stock-image and image-element
/// flags. The score never exceeds [`MAX_SCAM_SCORE`].
pub fn aggregate(
    text: &TextAnalysis,
    price: &PriceComparison,
    image: Option<&ImageAnalysis>,
    thresholds: &RiskThresholds,
) -> RiskAssessment {
    let mut breakdown = ScoreBreakdown {
        text_score: u32::from(text.scam_score.min(MAX_SCAM_SCORE)),
        ..ScoreBreakdown::default()
    };
    let mut red_flags = text.red_flags.clone();

    if price.is_suspiciously_low {
        breakdown.price_adjustment = PRICE_PENALTY;
        red_flags.push(RedFlag::new(
            Severity::High,
            format!(
                "Price is {}% below market value",
                price.percentage_difference.round()
            ),
        ));
    }

    if let Some(image) = image {
        if image.is_stock_image {
            breakdown.stock_image_adjustment = STOCK_IMAGE_PENALTY;
            red_flags.push(RedFlag::new(
                Severity::Medium,
                "Image appears to be a stock photo",
            ));
        }
        if !image.suspicious_elements.is_empty() {
            let count = u32::try_from(image.suspicious_elements.len()).unwrap_or(u32::MAX);
            breakdown.image_elements_adjustment = count.saturating_mul(IMAGE_ELEMENT_PENALTY);
            red_flags.push(RedFlag::new(
                Severity::Medium,
                format!(
                    "Suspicious elements in image: {}",
                    image.suspicious_elements.join(", ")
                ),
            ));
        }
    }

    breakdown.raw_total = breakdown
        .text_score
        .saturating_add(breakdown.price_adjustment)
        .saturating_add(breakdown.stock_image_adjustment)
        .saturating_add(breakdown.image_elements_adjustment);

    let scam_score = u8::try_from(breakdown.raw_total.min(u32::from(MAX_SCAM_SCORE)))
        .unwrap_or(MAX_SCAM_SCORE);

    RiskAssessment {
        scam_score,
        risk_band: RiskBand::from_score_with_thresholds(scam_score, thresholds),
        red_flags,
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(score: u8, flags: Vec<RedFlag>) -> TextAnalysis {
        TextAnalysis {
            title: "Listing".into(),
            scam_score: score,
            analysis: "analysis".into(),
            red_flags: flags,
        }
    }

    fn price(pd: f64) -> PriceComparison {
        PriceComparison {
            average_price: 800.0,
            lowest_price: 600.0,
            highest_price: 1000.0,
            percentage_difference: pd,
            is_suspiciously_low: pd > crate::pricing::SUSPICIOUS_DISCOUNT_PCT,
            alternatives: Vec::new(),
        }
    }

    #[test]
    fn suspicious_price_adds_penalty_and_flag() {
        let assessment = aggregate(
            &text(60, vec![]),
            &price(62.4),
            None,
            &RiskThresholds::default(),
        );
        assert_eq!(assessment.scam_score, 75);
        assert_eq!(assessment.risk_band, RiskBand::High);
        assert_eq!(assessment.red_flags.len(), 1);
        assert_eq!(
            assessment.red_flags[0],
            RedFlag::new(Severity::High, "Price is 62% below market value")
        );
        assert_eq!(assessment.breakdown.price_adjustment, PRICE_PENALTY);
    }

    #[test]
    fn score_is_clamped_and_breakdown_keeps_raw_total() {
        let image = ImageAnalysis {
            is_stock_image: true,
            contains_text: false,
            description: "studio shot".into(),
            suspicious_elements: vec!["watermark".into(), "cropped logo".into()],
        };
        let assessment = aggregate(
            &text(95, vec![]),
            &price(55.0),
            Some(&image),
            &RiskThresholds::default(),
        );
        assert_eq!(assessment.scam_score, 100);
        assert_eq!(assessment.breakdown.raw_total, 130);
        assert_eq!(assessment.breakdown.image_elements_adjustment, 10);
    }

    #[test]
    fn flags_keep_signal_order() {
        let image = ImageAnalysis {
            is_stock_image: true,
            suspicious_elements: vec!["watermark".into(), "blurred serial".into()],
            ..ImageAnalysis::default()
        };
        let text_flag = RedFlag::new(Severity::Low, "Vague description");
        let assessment = aggregate(
            &text(20, vec![text_flag.clone()]),
            &price(45.0),
            Some(&image),
            &RiskThresholds::default(),
        );
        let descriptions: Vec<&str> = assessment
            .red_flags
            .iter()
            .map(|flag| flag.description.as_str())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "Vague description",
                "Price is 45% below market value",
                "Image appears to be a stock photo",
                "Suspicious elements in image: watermark, blurred serial",
            ]
        );
        assert_eq!(assessment.scam_score, 55);
    }

    #[test]
    fn overpriced_listing_is_not_flagged() {
        let assessment = aggregate(
            &text(10, vec![]),
            &price(-35.0),
            None,
            &RiskThresholds::default(),
        );
        assert_eq!(assessment.scam_score, 10);
        assert!(assessment.red_flags.is_empty());
        assert_eq!(assessment.risk_band, RiskBand::Low);
    }

    #[test]
    fn unavailable_image_contributes_nothing() {
        let image = ImageAnalysis::unavailable();
        let assessment = aggregate(
            &text(40, vec![]),
            &price(0.0),
            Some(&image),
            &RiskThresholds::default(),
        );
        assert_eq!(assessment.scam_score, 40);
        assert!(assessment.red_flags.is_empty());
    }

    proptest! {
        #[test]
        fn score_stays_within_bounds(
            score in 0u8..=255,
            pd in -500.0f64..500.0,
            stock in any::<bool>(),
            elements in proptest::collection::vec("[a-z]{1,8}", 0..30),
        ) {
            let image = ImageAnalysis {
                is_stock_image: stock,
                suspicious_elements: elements,
                ..ImageAnalysis::default()
            };
            let assessment = aggregate(
                &text(score, vec![]),
                &price(pd),
                Some(&image),
                &RiskThresholds::default(),
            );
            let ceiling = assessment.breakdown.raw_total.max(u32::from(MAX_SCAM_SCORE));
            prop_assert!(assessment.scam_score <= MAX_SCAM_SCORE);
            prop_assert!(u32::from(assessment.scam_score) <= ceiling);
        }
    }
}
