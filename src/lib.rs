//! Medicine price extraction from pharmacy search pages.
//!
//! [`engine::PriceExtractor`] drives one run per [`models::ExtractionTarget`]:
//! render the page in a headless browser, locate product-like regions,
//! read names and prices, normalize them, and append accepted records to
//! the price history.

pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod history;
pub mod models;
pub mod parsers;
pub mod snapshot;
pub mod storage;
pub mod trend;

pub use engine::{ExtractionRun, PriceExtractor, RunState};
pub use error::{FetchError, PersistError, SetupError};
