use std::ops::RangeInclusive;

use anyhow::bail;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use regex::Regex;

use super::{ListingQuote, PriceQuery, PriceTable};
use crate::scanner::Category;

/// A provider of comparable listings for a query.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, category: Category) -> bool;

    async fn search(&self, query: &PriceQuery) -> anyhow::Result<Vec<ListingQuote>>;
}

/// FNV-1a over the parts, so simulated output is stable across runs and platforms.
pub(crate) fn stable_seed(parts: &[&str]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    parts.iter().fold(OFFSET, |hash, part| {
        part.bytes()
            .chain(std::iter::once(0xff))
            .fold(hash, |h, byte| (h ^ u64::from(byte)).wrapping_mul(PRIME))
    })
}

fn listing_id(rng: &mut StdRng) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(8)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect()
}

fn jitter(rng: &mut StdRng, base: f64, spread: f64) -> f64 {
    let factor = 1.0 + rng.gen_range(-spread..=spread);
    (base * factor).round()
}

fn product_names(category: Category) -> &'static [&'static str] {
    match category {
        Category::Smartphone => &[
            "iPhone 13 Pro",
            "Samsung Galaxy S22",
            "Google Pixel 6",
            "OnePlus 10 Pro",
        ],
        Category::Laptop => &[
            "MacBook Pro M1",
            "Dell XPS 13",
            "HP Spectre x360",
            "Lenovo ThinkPad X1",
        ],
        Category::Gaming => &[
            "PlayStation 5",
            "Xbox Series X",
            "Nintendo Switch OLED",
            "Steam Deck",
        ],
        Category::Camera => &[
            "Sony Alpha a7 III",
            "Canon EOS R6",
            "Nikon Z6 II",
            "Fujifilm X-T4",
        ],
        Category::Audio => &[
            "Bose QuietComfort 45",
            "Sony WH-1000XM4",
            "Apple AirPods Pro",
            "Sennheiser Momentum 3",
        ],
        Category::Furniture => &[
            "Sectional Sofa",
            "Queen Bed Frame",
            "Dining Table Set",
            "Office Desk",
        ],
        Category::Appliance => &[
            "Samsung Refrigerator",
            "LG Washing Machine",
            "KitchenAid Mixer",
            "Dyson Vacuum",
        ],
        Category::Jewelry => &[
            "Diamond Necklace",
            "Gold Watch",
            "Silver Bracelet",
            "Pearl Earrings",
        ],
        Category::Clothing => &[
            "Designer Jacket",
            "Premium Jeans",
            "Leather Boots",
            "Cashmere Sweater",
        ],
        _ => &[
            "Premium Electronics",
            "Smart Device",
            "Tech Gadget",
            "Digital Device",
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrustRule {
    Always,
    FirstResultOnly,
}

/// Retail marketplace stand-in producing plausible quotes around the category average.
#[derive(Debug, Clone)]
pub struct SimulatedMarketplace {
    name: &'static str,
    count: RangeInclusive<usize>,
    spread: f64,
    conditions: [&'static str; 2],
    url_prefix: &'static str,
    trust: TrustRule,
    table: PriceTable,
}

impl SimulatedMarketplace {
    pub fn amazon() -> Self {
        Self {
            name: "Amazon",
            count: 2..=4,
            spread: 0.15,
            conditions: ["New", "Renewed"],
            url_prefix: "https://www.amazon.com/dp/",
            trust: TrustRule::Always,
            table: PriceTable::default(),
        }
    }

    pub fn ebay() -> Self {
        Self {
            name: "eBay",
            count: 1..=3,
            spread: 0.25,
            conditions: ["Like New", "Used"],
            url_prefix: "https://www.ebay.com/itm/",
            trust: TrustRule::FirstResultOnly,
            table: PriceTable::default(),
        }
    }

    pub fn walmart() -> Self {
        Self {
            name: "Walmart",
            count: 1..=2,
            spread: 0.10,
            conditions: ["New", "Refurbished"],
            url_prefix: "https://www.walmart.com/ip/",
            trust: TrustRule::Always,
            table: PriceTable::default(),
        }
    }

    /// Use a custom baseline table instead of the built-in one.
    pub fn with_table(mut self, table: PriceTable) -> Self {
        self.table = table;
        self
    }
}

#[async_trait]
impl PriceSource for SimulatedMarketplace {
    fn name(&self) -> &str {
        self.name
    }

    fn supports(&self, category: Category) -> bool {
        !matches!(
            category,
            Category::Vehicle | Category::Motorcycle | Category::RealEstate
        )
    }

    async fn search(&self, query: &PriceQuery) -> anyhow::Result<Vec<ListingQuote>> {
        let mut rng = StdRng::seed_from_u64(stable_seed(&[
            self.name,
            &query.keywords,
            query.category.as_str(),
        ]));
        let base = self.table.range(query.category).avg;
        let names = product_names(query.category);
        let count = rng.gen_range(self.count.clone());

        let quotes = (0..count)
            .map(|i| {
                let name = names.choose(&mut rng).copied().unwrap_or("Similar Product");
                let condition = if rng.gen_bool(0.5) {
                    self.conditions[0]
                } else {
                    self.conditions[1]
                };
                ListingQuote {
                    title: format!("{}: {} ({})", self.name, name, condition),
                    price: jitter(&mut rng, base, self.spread),
                    url: format!("{}{}", self.url_prefix, listing_id(&mut rng)),
                    trusted: match self.trust {
                        TrustRule::Always => true,
                        TrustRule::FirstResultOnly => i == 0,
                    },
                }
            })
            .collect();
        Ok(quotes)
    }
}

static YEAR_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").ok());

const MOTORCYCLE_MODELS: &[(&str, &[&str])] = &[
    ("Yamaha", &["YZF-R6", "YZF-R1", "MT-07", "MT-09", "Tenere 700"]),
    ("Honda", &["CBR600RR", "CBR1000RR", "Rebel 500", "Africa Twin", "CB650R"]),
    ("Kawasaki", &["Ninja 400", "Ninja ZX-6R", "Z900", "Vulcan S"]),
    ("Suzuki", &["GSX-R600", "GSX-R750", "SV650", "V-Strom 650"]),
    ("Harley-Davidson", &["Sportster", "Street Glide", "Fat Boy", "Road King"]),
    ("Ducati", &["Panigale V4", "Monster", "Scrambler", "Multistrada V4"]),
    ("BMW", &["R 1250 GS", "S 1000 RR", "F 900 R", "R nineT"]),
    ("Triumph", &["Street Triple", "Bonneville T120", "Tiger 900", "Speed Triple"]),
    ("KTM", &["390 Duke", "790 Duke", "1290 Super Duke R", "890 Adventure"]),
];

const CAR_MODELS: &[(&str, &[&str])] = &[
    ("Toyota", &["Camry", "Corolla", "RAV4", "Highlander", "Tacoma", "4Runner", "Prius", "Sienna"]),
    ("Honda", &["Civic", "Accord", "CR-V", "Pilot", "Odyssey", "HR-V", "Ridgeline", "Fit"]),
    ("Ford", &["F-150", "Escape", "Explorer", "Mustang", "Edge", "Bronco", "Ranger", "Expedition"]),
    ("Chevrolet", &["Silverado", "Equinox", "Tahoe", "Malibu", "Traverse", "Camaro"]),
    ("Nissan", &["Altima", "Rogue", "Sentra", "Pathfinder", "Frontier"]),
    ("BMW", &["3 Series", "5 Series", "X3", "X5"]),
    ("Mercedes", &["C-Class", "E-Class", "GLC", "GLE"]),
    ("Audi", &["A4", "Q5", "A6", "Q7"]),
    ("Lexus", &["RX", "ES", "NX", "IS"]),
];

const MOTORCYCLE_SOURCES: &[&str] = &[
    "CycleTrader",
    "Motorcycle.com",
    "RevZilla",
    "Craigslist",
    "Facebook Marketplace",
];

const CAR_SOURCES: &[&str] = &[
    "AutoTrader",
    "Cars.com",
    "CarGurus",
    "Craigslist",
    "Facebook Marketplace",
];

const GENERIC_MODELS: &[&str] = &["Model"];

const UNTRUSTED_SOURCES: &[&str] = &["Craigslist", "Facebook Marketplace"];

const CONDITIONS: &[&str] = &["Excellent", "Good", "Fair", "Like New"];

/// First four-digit year mentioned in the title.
pub(crate) fn detect_year(title: &str) -> Option<i32> {
    YEAR_RE
        .as_ref()?
        .find(title)
        .and_then(|m| m.as_str().parse().ok())
}

/// Motorcycle and car listings from classified sites, priced by model year.
#[derive(Debug, Clone)]
pub struct VehicleListings {
    reference_year: i32,
}

impl VehicleListings {
    /// `reference_year` is the "current" year used to age vehicles.
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    fn base_price(&self, category: Category, year: Option<i32>) -> f64 {
        let motorcycle = category == Category::Motorcycle;
        match year {
            Some(year) => {
                let age = f64::from((self.reference_year - year).max(0));
                if motorcycle {
                    (12_000.0 - 500.0 * age).max(2_000.0)
                } else {
                    (35_000.0 - 1_500.0 * age).max(5_000.0)
                }
            }
            None if motorcycle => 5_000.0,
            None => 15_000.0,
        }
    }
}

fn find_make(
    lowered_title: &str,
    table: &'static [(&'static str, &'static [&'static str])],
) -> Option<(&'static str, &'static [&'static str])> {
    table.iter().copied().find(|(make, _)| {
        let make = make.to_lowercase();
        let stem = make.split('-').next().unwrap_or(&make);
        lowered_title.contains(stem) || (stem == "chevrolet" && lowered_title.contains("chevy"))
    })
}

#[async_trait]
impl PriceSource for VehicleListings {
    fn name(&self) -> &str {
        "vehicle-listings"
    }

    fn supports(&self, category: Category) -> bool {
        category.is_motor()
    }

    async fn search(&self, query: &PriceQuery) -> anyhow::Result<Vec<ListingQuote>> {
        let (models, sources) = match query.category {
            Category::Motorcycle => (MOTORCYCLE_MODELS, MOTORCYCLE_SOURCES),
            Category::Vehicle => (CAR_MODELS, CAR_SOURCES),
            other => bail!("vehicle listings cannot price category `{other}`"),
        };

        let mut rng = StdRng::seed_from_u64(stable_seed(&[
            self.name(),
            &query.keywords,
            query.category.as_str(),
        ]));
        let lowered = query.title.to_lowercase();
        let year = detect_year(&query.title);
        let (make, make_models) = match find_make(&lowered, models) {
            Some(found) => found,
            None => models
                .choose(&mut rng)
                .copied()
                .unwrap_or(("Generic", GENERIC_MODELS)),
        };
        let base = self.base_price(query.category, year);
        let count = rng.gen_range(3..=5);

        let quotes = (0..count)
            .map(|_| {
                let model = make_models.choose(&mut rng).copied().unwrap_or("Model");
                let listing_year = match year {
                    Some(year) => (year + rng.gen_range(-3..=3)).min(self.reference_year),
                    None => 2015 + rng.gen_range(0..7),
                };
                let condition = CONDITIONS.choose(&mut rng).copied().unwrap_or("Good");
                let source = sources.choose(&mut rng).copied().unwrap_or("Craigslist");
                let slug = format!("{}-{}-{}", make, model.replace(' ', "-"), listing_year)
                    .to_lowercase();
                ListingQuote {
                    title: format!(
                        "{source}: {listing_year} {make} {model} - {condition} Condition"
                    ),
                    price: jitter(&mut rng, base, 0.20),
                    url: format!("https://www.example.com/{slug}"),
                    trusted: !UNTRUSTED_SOURCES.contains(&source),
                }
            })
            .collect();
        Ok(quotes)
    }
}

static BEDROOMS_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:bed|bedroom|br)").ok());
static BATHROOMS_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:bath|bathroom|ba)").ok());
static LOCATION_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\bin\s+([a-z\s]+)").ok());

fn listing_location(lowered: &str) -> String {
    LOCATION_RE
        .as_ref()
        .and_then(|re| re.captures(lowered))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|location| !location.is_empty())
        .unwrap_or_else(|| "the area".to_string())
}

const PROPERTY_TYPES: &[&str] = &["House", "Condo", "Townhouse", "Apartment"];

const REAL_ESTATE_SOURCES: &[(&str, &str)] = &[
    ("Zillow", "zillow.com"),
    ("Redfin", "redfin.com"),
    ("Trulia", "trulia.com"),
    ("Realtor.com", "realtor.com"),
    ("Century 21", "century21.com"),
];

fn capture_number(re: Option<&Regex>, text: &str) -> Option<u32> {
    re?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Property listings priced from bedroom and bathroom counts.
#[derive(Debug, Clone, Default)]
pub struct RealEstateListings;

#[async_trait]
impl PriceSource for RealEstateListings {
    fn name(&self) -> &str {
        "real-estate-listings"
    }

    fn supports(&self, category: Category) -> bool {
        category == Category::RealEstate
    }

    async fn search(&self, query: &PriceQuery) -> anyhow::Result<Vec<ListingQuote>> {
        let mut rng = StdRng::seed_from_u64(stable_seed(&[self.name(), &query.keywords]));
        let lowered = query.title.to_lowercase();

        let bedrooms =
            capture_number(BEDROOMS_RE.as_ref(), &lowered).unwrap_or_else(|| rng.gen_range(2..=4));
        let bathrooms =
            capture_number(BATHROOMS_RE.as_ref(), &lowered).unwrap_or_else(|| rng.gen_range(1..=2));
        let location = listing_location(&lowered);

        let base = 250_000.0 + 50_000.0 * f64::from(bedrooms) + 25_000.0 * f64::from(bathrooms);
        let count = rng.gen_range(3..=4);

        let quotes = (0..count)
            .map(|_| {
                let (source, domain) = REAL_ESTATE_SOURCES
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(("Zillow", "zillow.com"));
                let kind = PROPERTY_TYPES.choose(&mut rng).copied().unwrap_or("House");
                ListingQuote {
                    title: format!(
                        "{source}: {bedrooms} bed, {bathrooms} bath {kind} in {location}"
                    ),
                    price: jitter(&mut rng, base, 0.15),
                    url: format!("https://www.{domain}/listing/{}", listing_id(&mut rng)),
                    trusted: true,
                }
            })
            .collect();
        Ok(quotes)
    }
}

/// Fixed quotes, optionally restricted to some categories or forced to fail.
#[derive(Debug, Clone)]
pub struct StaticPriceSource {
    name: String,
    quotes: Vec<ListingQuote>,
    categories: Option<Vec<Category>>,
    fail: bool,
}

impl StaticPriceSource {
    pub fn new(name: impl Into<String>, quotes: Vec<ListingQuote>) -> Self {
        Self {
            name: name.into(),
            quotes,
            categories: None,
            fail: false,
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn for_categories(mut self, categories: &[Category]) -> Self {
        self.categories = Some(categories.to_vec());
        self
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, category: Category) -> bool {
        self.categories
            .as_ref()
            .map_or(true, |categories| categories.contains(&category))
    }

    async fn search(&self, _query: &PriceQuery) -> anyhow::Result<Vec<ListingQuote>> {
        if self.fail {
            bail!("price source `{}` is unavailable", self.name);
        }
        Ok(self.quotes.clone())
    }
}
