use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    format_price, price_deviation, sources::detect_year, AlternativeListing, PriceComparison,
    SUSPICIOUS_DISCOUNT_PCT,
};
use crate::scanner::Category;

/// Typical market prices for a category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub const fn new(avg: f64, min: f64, max: f64) -> Self {
        Self { avg, min, max }
    }

    pub fn validate(&self, category: Category) -> Result<(), PriceRangeError> {
        if !(self.min.is_finite() && self.avg.is_finite() && self.max.is_finite()) {
            return Err(PriceRangeError::NotFinite { category });
        }
        if self.min <= 0.0 {
            return Err(PriceRangeError::NonPositiveMinimum {
                category,
                min: self.min,
            });
        }
        if self.avg < self.min || self.avg > self.max {
            return Err(PriceRangeError::AverageOutOfRange {
                category,
                avg: self.avg,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Errors emitted while validating price baselines.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceRangeError {
    #[error("price range for `{category}` must contain finite numbers")]
    NotFinite { category: Category },
    #[error("price range for `{category}` must have a positive minimum (got {min})")]
    NonPositiveMinimum { category: Category, min: f64 },
    #[error("price range for `{category}` has average {avg} outside {min}..={max}")]
    AverageOutOfRange {
        category: Category,
        avg: f64,
        min: f64,
        max: f64,
    },
}

const BUILTIN_RANGES: [(Category, PriceRange); 13] = [
    (Category::Smartphone, PriceRange::new(800.0, 600.0, 1200.0)),
    (Category::Laptop, PriceRange::new(1500.0, 1200.0, 2500.0)),
    (Category::Gaming, PriceRange::new(500.0, 450.0, 700.0)),
    (Category::Camera, PriceRange::new(1200.0, 800.0, 2000.0)),
    (Category::Audio, PriceRange::new(300.0, 200.0, 400.0)),
    (Category::Electronics, PriceRange::new(500.0, 300.0, 700.0)),
    (Category::Furniture, PriceRange::new(800.0, 400.0, 1500.0)),
    (Category::Appliance, PriceRange::new(1000.0, 500.0, 2000.0)),
    (Category::Jewelry, PriceRange::new(1500.0, 500.0, 5000.0)),
    (Category::Clothing, PriceRange::new(100.0, 50.0, 200.0)),
    (Category::Motorcycle, PriceRange::new(8000.0, 3000.0, 15000.0)),
    (Category::Vehicle, PriceRange::new(25000.0, 15000.0, 40000.0)),
    (
        Category::RealEstate,
        PriceRange::new(350000.0, 200000.0, 500000.0),
    ),
];

/// Per-category price baselines used when live sources come up short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    ranges: BTreeMap<Category, PriceRange>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            ranges: BUILTIN_RANGES.into_iter().collect(),
        }
    }
}

impl PriceTable {
    /// Built-in table with overrides from a YAML mapping of category to range.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read price table at {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid price table at {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let overrides: BTreeMap<Category, PriceRange> =
            serde_yaml::from_str(raw).context("price table must map categories to ranges")?;
        let mut table = Self::default();
        table.merge(overrides)?;
        Ok(table)
    }

    pub fn merge(
        &mut self,
        overrides: BTreeMap<Category, PriceRange>,
    ) -> Result<(), PriceRangeError> {
        for (category, range) in &overrides {
            range.validate(*category)?;
        }
        self.ranges.extend(overrides);
        Ok(())
    }

    pub fn range(&self, category: Category) -> PriceRange {
        self.ranges
            .get(&category)
            .or_else(|| self.ranges.get(&Category::Electronics))
            .copied()
            .unwrap_or(PriceRange::new(500.0, 300.0, 700.0))
    }

    /// Comparison built purely from the table and synthetic alternatives.
    pub fn fallback_comparison(
        &self,
        title: &str,
        input_price: f64,
        category: Category,
    ) -> PriceComparison {
        let range = self.range(category);
        let percentage_difference = price_deviation(range.avg, input_price);
        PriceComparison {
            average_price: range.avg,
            lowest_price: range.min,
            highest_price: range.max,
            percentage_difference,
            is_suspiciously_low: percentage_difference > SUSPICIOUS_DISCOUNT_PCT,
            alternatives: fallback_alternatives(title, category, range.avg),
        }
    }
}

const MOTORCYCLE_MAKES: &[&str] = &[
    "Yamaha", "Honda", "Kawasaki", "Suzuki", "Harley", "Ducati", "BMW", "Triumph", "KTM",
];

const CAR_MAKES: &[&str] = &[
    "Toyota", "Honda", "Ford", "Chevrolet", "Nissan", "BMW", "Mercedes", "Audi", "Lexus",
];

/// (title, multiplier of the average, retailer URL)
type Template = (&'static str, f64, &'static str);

fn named_products(category: Category) -> &'static [Template] {
    match category {
        Category::Smartphone => &[
            ("iPhone 13 Pro - Certified Refurbished", 1.0, "https://www.amazon.com"),
            ("Samsung Galaxy S22 - New", 0.9, "https://www.bestbuy.com"),
        ],
        Category::Laptop => &[
            ("MacBook Pro M1 - Apple Certified", 1.0, "https://www.apple.com"),
            ("Dell XPS 13 - New", 0.9, "https://www.dell.com"),
        ],
        Category::Gaming => &[
            ("PlayStation 5 - New", 1.0, "https://www.playstation.com"),
            ("Xbox Series X - New", 0.95, "https://www.xbox.com"),
        ],
        Category::Camera => &[
            ("Sony Alpha a7 III - New", 1.0, "https://www.bhphotovideo.com"),
            ("Canon EOS R6 - New", 1.05, "https://www.adorama.com"),
        ],
        Category::Audio => &[
            ("Bose QuietComfort 45 - New", 1.0, "https://www.bose.com"),
            ("Sony WH-1000XM4 - New", 0.95, "https://www.sony.com"),
        ],
        Category::Furniture => &[
            ("Modern Sofa - New", 1.0, "https://www.wayfair.com"),
            ("Dining Table Set - New", 0.85, "https://www.ikea.com"),
        ],
        Category::Appliance => &[
            ("Samsung Refrigerator - New", 1.0, "https://www.homedepot.com"),
            ("LG Washing Machine - New", 0.9, "https://www.bestbuy.com"),
        ],
        Category::Jewelry => &[
            ("Diamond Necklace - New", 1.0, "https://www.bluenile.com"),
            ("Gold Watch - New", 0.9, "https://www.jared.com"),
        ],
        Category::Clothing => &[
            ("Designer Jacket - New", 1.0, "https://www.nordstrom.com"),
            ("Premium Jeans - New", 0.9, "https://www.macys.com"),
        ],
        Category::RealEstate => &[
            ("Comparable Home - Recently Sold", 1.0, "https://www.zillow.com"),
            ("Similar Property - Active Listing", 0.95, "https://www.realtor.com"),
        ],
        _ => &[
            ("Similar Product - Verified Seller", 1.0, "https://www.amazon.com"),
            ("Alternative Product - Top Rated", 0.9, "https://www.bestbuy.com"),
        ],
    }
}

/// Make named in the title, or its first meaningful word.
fn detect_make(title: &str, makes: &[&'static str]) -> String {
    let lowered = title.to_lowercase();
    makes
        .iter()
        .find(|make| lowered.contains(&make.to_lowercase()))
        .map(|make| make.to_string())
        .or_else(|| {
            title
                .split_whitespace()
                .find(|word| word.chars().count() > 2)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Used".to_string())
}

fn alternative(title: String, multiplier: f64, avg: f64, url: &str) -> AlternativeListing {
    AlternativeListing {
        title,
        price: format_price(avg * multiplier),
        url: url.to_string(),
        trusted: true,
    }
}

fn fallback_alternatives(title: &str, category: Category, avg: f64) -> Vec<AlternativeListing> {
    let year = detect_year(title)
        .map(|year| year.to_string())
        .unwrap_or_else(|| "Recent".to_string());

    match category {
        Category::Motorcycle => {
            let make = detect_make(title, MOTORCYCLE_MAKES);
            vec![
                alternative(
                    format!("{year} {make} Motorcycle - Excellent Condition"),
                    0.95,
                    avg,
                    "https://www.cycletrader.com",
                ),
                alternative(
                    format!("{year} {make} Motorcycle - Good Condition"),
                    0.85,
                    avg,
                    "https://motorcycles.autotrader.com",
                ),
                alternative(
                    format!("Similar {make} Model - Low Miles"),
                    1.05,
                    avg,
                    "https://www.revzilla.com",
                ),
            ]
        }
        Category::Vehicle => {
            let make = detect_make(title, CAR_MAKES);
            vec![
                alternative(
                    format!("{year} {make} - Certified Pre-Owned"),
                    1.05,
                    avg,
                    "https://www.autotrader.com",
                ),
                alternative(
                    format!("{year} {make} - Excellent Condition"),
                    0.95,
                    avg,
                    "https://www.cars.com",
                ),
                alternative(
                    format!("Similar {make} Model - Low Miles"),
                    0.9,
                    avg,
                    "https://www.cargurus.com",
                ),
            ]
        }
        other => named_products(other)
            .iter()
            .map(|(name, multiplier, url)| alternative(name.to_string(), *multiplier, avg, url))
            .collect(),
    }
}
