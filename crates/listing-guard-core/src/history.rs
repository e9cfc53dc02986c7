//! Dashboard statistics over the scan history.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::scanner::{RiskBand, RiskThresholds};
use crate::store::Scan;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl BandCounts {
    fn record(&mut self, band: RiskBand) {
        match band {
            RiskBand::Low => self.low += 1,
            RiskBand::Medium => self.medium += 1,
            RiskBand::High => self.high += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub scans: usize,
    pub average_score: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_scans: usize,
    pub high_risk_scans: usize,
    pub average_score: u8,
    pub bands: BandCounts,
    /// Oldest day first.
    pub daily: Vec<DailyTrend>,
}

fn rounded_mean(total: u64, count: usize) -> u8 {
    if count == 0 {
        return 0;
    }
    let mean = (total as f64 / count as f64).round();
    // Scores are at most 100, so the mean always fits.
    mean.clamp(0.0, f64::from(u8::MAX)) as u8
}

/// Aggregate scans into totals, band counts and a per-day trend (UTC dates).
pub fn summarize(scans: &[Scan], thresholds: &RiskThresholds) -> HistorySummary {
    let mut bands = BandCounts::default();
    let mut total: u64 = 0;
    let mut days: BTreeMap<NaiveDate, (usize, u64)> = BTreeMap::new();

    for scan in scans {
        bands.record(RiskBand::from_score_with_thresholds(scan.scam_score, thresholds));
        total += u64::from(scan.scam_score);

        let day = days.entry(scan.created_at.date_naive()).or_default();
        day.0 += 1;
        day.1 += u64::from(scan.scam_score);
    }

    HistorySummary {
        total_scans: scans.len(),
        high_risk_scans: bands.high,
        average_score: rounded_mean(total, scans.len()),
        bands,
        daily: days
            .into_iter()
            .map(|(date, (count, sum))| DailyTrend {
                date,
                scans: count,
                average_score: rounded_mean(sum, count),
            })
            .collect(),
    }
}
