use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    InStock,
    OutOfStock,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::InStock => "In Stock",
            Availability::OutOfStock => "Out of Stock",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In Stock" => Ok(Availability::InStock),
            "Out of Stock" => Ok(Availability::OutOfStock),
            other => Err(format!("unknown availability `{}`", other)),
        }
    }
}

/// A validated price observation for one product on one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Product name followed by ` - {source}`.
    pub product_name: String,
    pub price: f64,
    pub availability: Availability,
    pub source: String,
}

impl PriceRecord {
    pub fn new(name: &str, price: f64, availability: Availability, source: &str) -> Self {
        Self {
            product_name: format!("{}{}", name, source_suffix(source)),
            price,
            availability,
            source: source.to_string(),
        }
    }

    /// Product name with the source suffix removed; the history key.
    pub fn canonical_name(&self) -> &str {
        self.product_name
            .strip_suffix(&source_suffix(&self.source))
            .unwrap_or(&self.product_name)
            .trim()
    }
}

fn source_suffix(source: &str) -> String {
    format!(" - {}", source)
}

/// Append-only history row, one per accepted `PriceRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub medicine_name: String,
    pub source: String,
    pub price: f64,
    pub availability: Availability,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_record(record: &PriceRecord, recorded_at: DateTime<Utc>) -> Self {
        Self {
            medicine_name: record.canonical_name().to_string(),
            source: record.source.clone(),
            price: record.price,
            availability: record.availability,
            recorded_at,
        }
    }
}
