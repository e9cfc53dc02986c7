use std::fmt;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Coarse product classification used to select price baselines and sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Vehicle,
    Motorcycle,
    RealEstate,
    Smartphone,
    Laptop,
    Gaming,
    Camera,
    Audio,
    Furniture,
    Appliance,
    Jewelry,
    Clothing,
    Electronics,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Vehicle,
        Category::Motorcycle,
        Category::RealEstate,
        Category::Smartphone,
        Category::Laptop,
        Category::Gaming,
        Category::Camera,
        Category::Audio,
        Category::Furniture,
        Category::Appliance,
        Category::Jewelry,
        Category::Clothing,
        Category::Electronics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Motorcycle => "motorcycle",
            Self::RealEstate => "real_estate",
            Self::Smartphone => "smartphone",
            Self::Laptop => "laptop",
            Self::Gaming => "gaming",
            Self::Camera => "camera",
            Self::Audio => "audio",
            Self::Furniture => "furniture",
            Self::Appliance => "appliance",
            Self::Jewelry => "jewelry",
            Self::Clothing => "clothing",
            Self::Electronics => "electronics",
        }
    }

    /// Vehicles and motorcycles are priced by their own listing sources.
    pub fn is_motor(self) -> bool {
        matches!(self, Self::Vehicle | Self::Motorcycle)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative predicate: any keyword substring or the compound clause matches,
/// unless the veto fires.
struct RuleSpec {
    category: Category,
    keywords: &'static [&'static str],
    compound: fn(&str) -> bool,
    veto: fn(&str) -> bool,
}

struct CategoryRule {
    category: Category,
    keywords: AhoCorasick,
    compound: fn(&str) -> bool,
    veto: fn(&str) -> bool,
}

impl CategoryRule {
    fn matches(&self, title: &str) -> bool {
        (self.keywords.is_match(title) || (self.compound)(title)) && !(self.veto)(title)
    }
}

fn never(_: &str) -> bool {
    false
}

fn has(title: &str, needle: &str) -> bool {
    title.contains(needle)
}

fn motorcycle_override(t: &str) -> bool {
    has(t, "motorcycle") || has(t, "bike") || (has(t, "honda") && has(t, "cbr"))
}

fn motorcycle_compound(t: &str) -> bool {
    (has(t, "honda") && (has(t, "cbr") || has(t, "motorcycle") || has(t, "bike")))
        || (has(t, "bmw") && (has(t, "motorcycle") || has(t, "bike")))
}

fn real_estate_compound(t: &str) -> bool {
    has(t, "bedroom") && has(t, "bath")
}

fn smartphone_compound(t: &str) -> bool {
    has(t, "samsung") && (has(t, "galaxy") || has(t, "phone"))
}

fn laptop_compound(t: &str) -> bool {
    has(t, "computer") && !has(t, "desktop")
}

fn gaming_compound(t: &str) -> bool {
    (has(t, "switch") && !has(t, "network switch"))
        || (has(t, "game") && (has(t, "console") || has(t, "system")))
}

fn camera_compound(t: &str) -> bool {
    (has(t, "sony") && (has(t, "camera") || has(t, "alpha")))
        || (has(t, "lens") && (has(t, "camera") || has(t, "mm")))
}

fn audio_compound(t: &str) -> bool {
    (has(t, "sound") && (has(t, "system") || has(t, "bar")))
        || (has(t, "beats") && !has(t, "beats per"))
}

fn jewelry_compound(t: &str) -> bool {
    has(t, "watch") && !has(t, "apple watch")
}

// Order is significant: the first matching rule wins.
const RULE_SPECS: &[RuleSpec] = &[
    RuleSpec {
        category: Category::Vehicle,
        keywords: &[
            "car", "truck", "suv", "vehicle", "auto", "ford", "toyota", "honda", "chevy",
            "chevrolet", "nissan", "bmw", "mercedes", "audi", "lexus", "sedan", "coupe",
        ],
        compound: never,
        veto: motorcycle_override,
    },
    RuleSpec {
        category: Category::Motorcycle,
        keywords: &[
            "motorcycle", "bike", "yamaha", "kawasaki", "suzuki", "harley", "ducati", "triumph",
            "ktm",
        ],
        compound: motorcycle_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::RealEstate,
        keywords: &[
            "house",
            "apartment",
            "condo",
            "townhouse",
            "property",
            "real estate",
            "home for sale",
        ],
        compound: real_estate_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Smartphone,
        keywords: &[
            "iphone",
            "pixel",
            "smartphone",
            "mobile phone",
            "android phone",
            "oneplus",
        ],
        compound: smartphone_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Laptop,
        keywords: &[
            "macbook",
            "laptop",
            "notebook",
            "dell xps",
            "thinkpad",
            "chromebook",
            "surface pro",
        ],
        compound: laptop_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Gaming,
        keywords: &[
            "playstation", "ps5", "ps4", "xbox", "nintendo", "console", "gaming",
        ],
        compound: gaming_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Camera,
        keywords: &["camera", "canon", "nikon", "fujifilm", "dslr", "mirrorless"],
        compound: camera_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Audio,
        keywords: &[
            "headphones", "earbuds", "airpods", "bose", "speaker", "audio", "sonos",
        ],
        compound: audio_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Furniture,
        keywords: &[
            "sofa", "couch", "chair", "table", "desk", "bed", "dresser", "furniture", "cabinet",
            "bookshelf",
        ],
        compound: never,
        veto: never,
    },
    RuleSpec {
        category: Category::Appliance,
        keywords: &[
            "refrigerator",
            "fridge",
            "washer",
            "dryer",
            "dishwasher",
            "microwave",
            "oven",
            "stove",
            "appliance",
        ],
        compound: never,
        veto: never,
    },
    RuleSpec {
        category: Category::Jewelry,
        keywords: &[
            "ring", "necklace", "bracelet", "gold", "silver", "diamond", "jewelry",
        ],
        compound: jewelry_compound,
        veto: never,
    },
    RuleSpec {
        category: Category::Clothing,
        keywords: &[
            "shirt", "pants", "jeans", "dress", "jacket", "coat", "shoes", "clothing", "apparel",
        ],
        compound: never,
        veto: never,
    },
];

static RULES: Lazy<Vec<CategoryRule>> = Lazy::new(|| {
    RULE_SPECS
        .iter()
        .filter_map(|spec| match AhoCorasick::new(spec.keywords) {
            Ok(keywords) => Some(CategoryRule {
                category: spec.category,
                keywords,
                compound: spec.compound,
                veto: spec.veto,
            }),
            Err(err) => {
                tracing::error!(
                    category = %spec.category,
                    %err,
                    "failed to build category automaton"
                );
                None
            }
        })
        .collect()
});

/// Classify a listing title into a product category.
///
/// Falls back to [`Category::Electronics`] for empty titles or when no rule matches.
pub fn detect_category(title: &str) -> Category {
    let lowered = title.trim().to_lowercase();
    if lowered.is_empty() {
        return Category::Electronics;
    }
    RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(Category::Electronics)
}
