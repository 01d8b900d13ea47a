use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::PersistError;
use crate::models::{HistoryEntry, PriceRecord};
use crate::storage::PriceHistoryStore;

/// Appends one history row per accepted record. Never retries.
pub struct HistoryRecorder {
    store: Arc<dyn PriceHistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn PriceHistoryStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, records: &[PriceRecord]) -> Result<Vec<HistoryEntry>, PersistError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // Stamped at write time, not fetch time.
        let recorded_at = Utc::now();
        let entries: Vec<HistoryEntry> = records
            .iter()
            .map(|record| HistoryEntry::from_record(record, recorded_at))
            .collect();

        self.store.append(&entries).await?;
        info!("Recorded {} price history entries", entries.len());
        Ok(entries)
    }
}
