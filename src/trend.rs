use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::HistoryEntry;

/// Price movement of one medicine on one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTrend {
    pub source: String,
    pub observations: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub latest: f64,
    pub first_recorded: DateTime<Utc>,
    pub last_recorded: DateTime<Utc>,
}

/// Summarize a medicine's history per source. Entries are expected in
/// `recorded_at` order, as `PriceHistoryStore::history_for` returns them.
pub fn summarize(entries: &[HistoryEntry]) -> Vec<PriceTrend> {
    let mut by_source: BTreeMap<&str, Vec<&HistoryEntry>> = BTreeMap::new();
    for entry in entries {
        by_source.entry(entry.source.as_str()).or_default().push(entry);
    }

    by_source
        .into_iter()
        .filter_map(|(source, rows)| {
            let first = rows.first()?;
            let last = rows.last()?;
            let prices = rows.iter().map(|e| e.price);

            Some(PriceTrend {
                source: source.to_string(),
                observations: rows.len(),
                min: prices.clone().fold(f64::INFINITY, f64::min),
                max: prices.clone().fold(f64::NEG_INFINITY, f64::max),
                mean: prices.sum::<f64>() / rows.len() as f64,
                latest: last.price,
                first_recorded: first.recorded_at,
                last_recorded: last.recorded_at,
            })
        })
        .collect()
}
