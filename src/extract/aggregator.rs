use std::fmt;
use tracing::{debug, info};

use crate::extract::{contains, Candidate, FieldExtractor};
use crate::models::PriceRecord;
use crate::parsers::{normalize_price, AvailabilityClassifier};

/// Why a candidate did not become a record. Never surfaced as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MissingName,
    MissingPrice,
    UnparseablePrice(String),
    NonPositivePrice(f64),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingName => write!(f, "missing name"),
            Rejection::MissingPrice => write!(f, "missing price"),
            Rejection::UnparseablePrice(raw) => write!(f, "unparseable price '{}'", raw),
            Rejection::NonPositivePrice(value) => write!(f, "non-positive price {}", value),
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    accepted: usize,
    duplicates: usize,
    missing_name: usize,
    missing_price: usize,
    bad_price: usize,
}

impl Tally {
    fn reject(&mut self, reason: &Rejection) {
        match reason {
            Rejection::MissingName => self.missing_name += 1,
            Rejection::MissingPrice => self.missing_price += 1,
            Rejection::UnparseablePrice(_) | Rejection::NonPositivePrice(_) => self.bad_price += 1,
        }
    }
}

/// Turns candidates into validated records for one source.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    fields: FieldExtractor,
    classifier: AvailabilityClassifier,
}

impl ResultAggregator {
    pub fn new(fields: FieldExtractor, classifier: AvailabilityClassifier) -> Self {
        Self { fields, classifier }
    }

    /// Name and positive price are both required; availability defaults to in stock.
    pub fn evaluate(&self, candidate: &Candidate<'_>, source: &str) -> Result<PriceRecord, Rejection> {
        let name = self.fields.extract_name(candidate).ok_or(Rejection::MissingName)?;
        let raw_price = self.fields.extract_price(candidate).ok_or(Rejection::MissingPrice)?;

        let price = normalize_price(&raw_price).ok_or_else(|| Rejection::UnparseablePrice(raw_price.clone()))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(Rejection::NonPositivePrice(price));
        }

        let availability = self.classifier.classify(candidate);
        Ok(PriceRecord::new(&name, price, availability, source))
    }

    /// Records in discovery order. Sibling candidates with the same name are
    /// all kept; a region matched again through a nested block with the same
    /// name and price is kept once, as its innermost block.
    pub fn aggregate<'a>(
        &self,
        candidates: impl IntoIterator<Item = Candidate<'a>>,
        source: &str,
    ) -> Vec<PriceRecord> {
        let mut accepted: Vec<(Candidate<'a>, PriceRecord)> = Vec::new();
        let mut tally = Tally::default();

        for (idx, candidate) in candidates.into_iter().enumerate() {
            let record = match self.evaluate(&candidate, source) {
                Ok(record) => record,
                Err(reason) => {
                    debug!("Candidate {} rejected: {}", idx + 1, reason);
                    tally.reject(&reason);
                    continue;
                }
            };

            let repeat = accepted.iter().position(|(prev, prev_record)| {
                prev_record.product_name == record.product_name
                    && prev_record.price == record.price
                    && (contains(prev.block, candidate.block) || contains(candidate.block, prev.block))
            });

            match repeat {
                Some(pos) => {
                    tally.duplicates += 1;
                    if contains(accepted[pos].0.block, candidate.block) {
                        debug!("Candidate {} narrows an earlier match of {}", idx + 1, record.product_name);
                        accepted[pos] = (candidate, record);
                    } else {
                        debug!("Candidate {} repeats {}", idx + 1, record.product_name);
                    }
                }
                None => {
                    debug!("Candidate {} accepted: {} - {}", idx + 1, record.product_name, record.price);
                    tally.accepted += 1;
                    accepted.push((candidate, record));
                }
            }
        }

        info!(
            "{}: {} records accepted ({} repeated, {} without name, {} without price, {} with unusable price)",
            source, tally.accepted, tally.duplicates, tally.missing_name, tally.missing_price, tally.bad_price
        );

        accepted.into_iter().map(|(_, record)| record).collect()
    }
}
