use async_trait::async_trait;

use crate::error::PersistError;
use crate::models::HistoryEntry;

mod sqlite;
pub use sqlite::SqliteStorage;

/// Append-only price history, queryable per medicine in time order.
#[async_trait]
pub trait PriceHistoryStore: Send + Sync {
    async fn migrate(&self) -> Result<(), PersistError>;
    /// Writes the whole batch or nothing.
    async fn append(&self, entries: &[HistoryEntry]) -> Result<(), PersistError>;
    async fn history_for(&self, medicine_name: &str) -> Result<Vec<HistoryEntry>, PersistError>;
}
