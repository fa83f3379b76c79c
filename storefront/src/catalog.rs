//! Product Catalog
//!
//! The fixed set of products the store sells, plus search and category
//! filtering over it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Price ───────────────────────────────────────────────────

/// A non-negative amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Price times a quantity, saturating at `u64::MAX` cents
    pub fn times(&self, quantity: u32) -> Price {
        Price(self.0.saturating_mul(u64::from(quantity)))
    }
}

impl std::ops::Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, |a, b| a + b)
    }
}

/// Two decimals, no currency sign: `1999.98`.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// Item snapshots travel to the sync endpoint with the price as a plain
// decimal number.
impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom("price must be a non-negative number"));
        }
        Ok(Price((value * 100.0).round() as u64))
    }
}

// ── Category ────────────────────────────────────────────────

/// Product category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Smartphones,
    Laptops,
    Headphones,
    Accessories,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Smartphones,
        Category::Laptops,
        Category::Headphones,
        Category::Accessories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smartphones => "smartphones",
            Self::Laptops => "laptops",
            Self::Headphones => "headphones",
            Self::Accessories => "accessories",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category filter; exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(c) => *c == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .map(Self::Only)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

// ── Catalog ─────────────────────────────────────────────────

/// A product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: u32,
    pub name: String,
    pub category: Category,
    pub price: Price,
    pub image: String,
    pub description: String,
}

impl CatalogItem {
    /// Case-insensitive substring match on name or description. An empty
    /// query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query) || self.description.to_lowercase().contains(&query)
    }
}

/// The store's products, in display order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

const PLACEHOLDER_IMAGE: &str = "/placeholder.svg?height=250&width=280";

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// The eight demo products
    pub fn demo() -> Self {
        let item = |id, name: &str, category, cents, description: &str| CatalogItem {
            id,
            name: name.to_string(),
            category,
            price: Price::from_cents(cents),
            image: PLACEHOLDER_IMAGE.to_string(),
            description: description.to_string(),
        };
        use Category::*;
        Self::new(vec![
            item(1, "iPhone 15 Pro", Smartphones, 99_999,
                "The latest iPhone with advanced camera system and A17 Pro chip for exceptional performance."),
            item(2, "MacBook Air M2", Laptops, 119_999,
                "Ultra-thin laptop with M2 chip, perfect for work and creativity with all-day battery life."),
            item(3, "AirPods Pro", Headphones, 24_999,
                "Premium wireless earbuds with active noise cancellation and spatial audio."),
            item(4, "Samsung Galaxy S24", Smartphones, 89_999,
                "Flagship Android phone with AI-powered camera and stunning display technology."),
            item(5, "Dell XPS 13", Laptops, 109_999,
                "Premium ultrabook with InfinityEdge display and powerful Intel processors."),
            item(6, "Sony WH-1000XM5", Headphones, 39_999,
                "Industry-leading noise canceling headphones with exceptional sound quality."),
            item(7, "iPad Pro 12.9", Accessories, 109_999,
                "Professional tablet with M2 chip and Liquid Retina XDR display for creative work."),
            item(8, "Apple Watch Series 9", Accessories, 39_999,
                "Advanced smartwatch with health monitoring and fitness tracking capabilities."),
        ])
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, id: u32) -> Option<&CatalogItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items matching both the query and the filter, in catalog order
    pub fn search(&self, query: &str, filter: CategoryFilter) -> Vec<&CatalogItem> {
        self.items
            .iter()
            .filter(|i| filter.matches(i.category) && i.matches_query(query))
            .collect()
    }
}
