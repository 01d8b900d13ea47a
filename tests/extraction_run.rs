use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use med_price_monitor::browser::{BrowserDriver, BrowserSession};
use med_price_monitor::config::Config;
use med_price_monitor::models::{Availability, ExtractionTarget, HistoryEntry, PriceRecord};
use med_price_monitor::storage::{PriceHistoryStore, SqliteStorage};
use med_price_monitor::{FetchError, PersistError, PriceExtractor, RunState};

const SOURCE: &str = "Apollo Pharmacy";
const STRUCTURAL_PAGE: &str = include_str!("fixtures/structural_single.html");
const TEXT_SCAN_PAGE: &str = include_str!("fixtures/text_scan.html");

#[derive(Clone, Copy)]
enum Script {
    Serve,
    FailLaunch,
    FailNavigation,
    Hang(Duration),
}

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    closes: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

struct ScriptedDriver {
    html: String,
    script: Script,
    counters: Arc<Counters>,
}

impl ScriptedDriver {
    fn new(html: &str, script: Script) -> (Arc<Self>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let driver = Arc::new(Self {
            html: html.to_string(),
            script,
            counters: counters.clone(),
        });
        (driver, counters)
    }
}

impl BrowserDriver for ScriptedDriver {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if let Script::FailLaunch = self.script {
            return Err(anyhow!("chrome binary not found"));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            html: self.html.clone(),
            script: self.script,
            counters: self.counters.clone(),
        }))
    }
}

struct ScriptedSession {
    html: String,
    script: Script,
    counters: Arc<Counters>,
}

impl BrowserSession for ScriptedSession {
    fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
        match self.script {
            Script::FailNavigation => Err(anyhow!("net::ERR_NAME_NOT_RESOLVED")),
            Script::Hang(duration) => {
                std::thread::sleep(duration);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn scroll_to(&mut self, _offset_px: u32) -> Result<()> {
        Ok(())
    }

    fn page_source(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RejectingStore;

#[async_trait]
impl PriceHistoryStore for RejectingStore {
    async fn migrate(&self) -> Result<(), PersistError> {
        Ok(())
    }

    async fn append(&self, _entries: &[HistoryEntry]) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("disk full".to_string()))
    }

    async fn history_for(&self, _medicine_name: &str) -> Result<Vec<HistoryEntry>, PersistError> {
        Ok(Vec::new())
    }
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.browser.render_delay_ms = 0;
    config.browser.scroll_delay_ms = 0;
    config.politeness_delay_secs = 0;
    config
}

fn target(query: &str) -> ExtractionTarget {
    let slug = query.to_lowercase().replace(' ', "-");
    let url = Url::parse(&format!("https://www.apollopharmacy.in/search-medicines/{}", slug)).unwrap();
    ExtractionTarget::new(query, url, SOURCE)
}

async fn memory_store() -> Arc<SqliteStorage> {
    let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
    storage.migrate().await.unwrap();
    storage
}

#[tokio::test]
async fn structural_candidate_becomes_one_record() {
    let (driver, counters) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::Serve);
    let store = memory_store().await;
    let extractor = PriceExtractor::new(&fast_config(), driver, store.clone()).unwrap();

    let run = extractor.run(&target("Dolo 650mg")).await.unwrap();

    assert_eq!(
        run.records,
        vec![PriceRecord {
            product_name: "Dolo 650mg Tablet - Apollo Pharmacy".to_string(),
            price: 35.5,
            availability: Availability::InStock,
            source: SOURCE.to_string(),
        }]
    );
    assert_eq!(run.state, RunState::Recorded);
    assert_eq!(run.history.as_ref().unwrap().len(), 1);

    let stored = store.history_for("Dolo 650mg Tablet").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].price, 35.5);
    assert_eq!(stored[0].source, SOURCE);
    assert!(stored[0].recorded_at >= run.fetched_at);

    assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn text_scan_fallback_keeps_discovery_order() {
    let (driver, _) = ScriptedDriver::new(TEXT_SCAN_PAGE, Script::Serve);
    let extractor = PriceExtractor::new(&fast_config(), driver, memory_store().await).unwrap();

    let run = extractor.run(&target("650mg")).await.unwrap();

    let summary: Vec<_> = run
        .records
        .iter()
        .map(|r| (r.product_name.as_str(), r.price))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Dolo 650mg Tablet 15's - Apollo Pharmacy", 35.5),
            ("Calpol 650mg Tablet - Apollo Pharmacy", 30.0),
        ]
    );
}

#[tokio::test]
async fn navigation_failure_ends_run_and_releases_session() {
    let (driver, counters) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::FailNavigation);
    let store = memory_store().await;
    let extractor = PriceExtractor::new(&fast_config(), driver, store.clone()).unwrap();

    let err = extractor.run(&target("Dolo 650mg")).await.unwrap_err();

    assert!(matches!(err, FetchError::Navigation { .. }));
    assert!(store.history_for("Dolo 650mg Tablet").await.unwrap().is_empty());
    assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn launch_failure_is_a_fetch_error() {
    let (driver, counters) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::FailLaunch);
    let extractor = PriceExtractor::new(&fast_config(), driver, memory_store().await).unwrap();

    let err = extractor.run(&target("Dolo 650mg")).await.unwrap_err();

    assert!(matches!(err, FetchError::Launch(_)));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persist_failure_still_returns_records() {
    let (driver, _) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::Serve);
    let extractor = PriceExtractor::new(&fast_config(), driver, Arc::new(RejectingStore)).unwrap();

    let run = extractor.run(&target("Dolo 650mg")).await.unwrap();

    assert_eq!(run.state, RunState::PersistFailed);
    assert!(matches!(run.history, Err(PersistError::Unavailable(_))));
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].product_name, "Dolo 650mg Tablet - Apollo Pharmacy");
}

#[tokio::test]
async fn page_without_products_is_an_empty_success() {
    let (driver, _) = ScriptedDriver::new("<html><body><p>No results found</p></body></html>", Script::Serve);
    let extractor = PriceExtractor::new(&fast_config(), driver, memory_store().await).unwrap();

    let run = extractor.run(&target("Unknown medicine")).await.unwrap();

    assert!(run.records.is_empty());
    assert_eq!(run.state, RunState::Recorded);
    assert!(run.history.unwrap().is_empty());
}

#[tokio::test]
async fn timed_out_fetch_still_tears_down_session() {
    let (driver, counters) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::Hang(Duration::from_millis(1500)));
    let mut config = fast_config();
    config.browser.navigation_timeout_secs = 1;
    config.browser.launch_timeout_secs = 0;
    let extractor = PriceExtractor::new(&config, driver, memory_store().await).unwrap();

    let err = extractor.run(&target("Dolo 650mg")).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }));

    // The abandoned blocking task finishes on its own and drops the session.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn consecutive_runs_respect_politeness_delay() {
    let (driver, counters) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::Serve);
    let mut config = fast_config();
    config.politeness_delay_secs = 1;
    let extractor = PriceExtractor::new(&config, driver, memory_store().await).unwrap();

    let started = Instant::now();
    let outcomes = extractor
        .run_all(&[target("Dolo 650mg"), target("Calpol 650mg")])
        .await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_runs_on_one_source_never_overlap() {
    let (driver, counters) = ScriptedDriver::new(STRUCTURAL_PAGE, Script::Hang(Duration::from_millis(500)));
    let mut config = fast_config();
    config.politeness_delay_secs = 1;
    let extractor = PriceExtractor::new(&config, driver, memory_store().await).unwrap();
    let (first, second) = (target("Dolo 650mg"), target("Calpol 650mg"));

    let started = Instant::now();
    let (a, b) = tokio::join!(extractor.run(&first), extractor.run(&second));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(counters.max_open.load(Ordering::SeqCst), 1);
    // Two half-second fetches with the full delay between the first ending and the second starting.
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
}
