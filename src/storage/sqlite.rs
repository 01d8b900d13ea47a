use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::error::PersistError;
use crate::models::{Availability, HistoryEntry};
use crate::storage::PriceHistoryStore;

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub async fn new(db_path: &str) -> Result<Self, PersistError> {
        let conn = Connection::open(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn in_memory() -> Result<Self, PersistError> {
        Self::new(":memory:").await
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistError> {
        self.conn
            .lock()
            .map_err(|_| PersistError::Unavailable("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl PriceHistoryStore for SqliteStorage {
    async fn migrate(&self) -> Result<(), PersistError> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                medicine_name TEXT NOT NULL,
                source TEXT NOT NULL,
                price REAL NOT NULL,
                availability TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_medicine_recorded ON price_history(medicine_name, recorded_at)",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }

    async fn append(&self, entries: &[HistoryEntry]) -> Result<(), PersistError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for entry in entries {
            tx.execute(
                "INSERT INTO price_history (medicine_name, source, price, availability, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &entry.medicine_name,
                    &entry.source,
                    entry.price,
                    entry.availability.as_str(),
                    entry.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn history_for(&self, medicine_name: &str) -> Result<Vec<HistoryEntry>, PersistError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT medicine_name, source, price, availability, recorded_at
             FROM price_history
             WHERE medicine_name = ?1
             ORDER BY recorded_at, id",
        )?;

        let rows = stmt
            .query_map(params![medicine_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(medicine_name, source, price, availability, recorded_at)| {
                Ok(HistoryEntry {
                    medicine_name,
                    source,
                    price,
                    availability: availability.parse::<Availability>().map_err(PersistError::Decode)?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map_err(|e| PersistError::Decode(format!("recorded_at `{}`: {}", recorded_at, e)))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }
}
