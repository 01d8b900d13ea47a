use chrono::{DateTime, Utc};
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserDriver, FetchSettings, PageFetcher};
use crate::config::Config;
use crate::error::{FetchError, PersistError, SetupError};
use crate::extract::{CandidateLocator, FieldExtractor, ResultAggregator};
use crate::history::HistoryRecorder;
use crate::models::{ExtractionTarget, HistoryEntry, PriceRecord, RenderedPage};
use crate::parsers::AvailabilityClassifier;
use crate::snapshot::SnapshotWriter;
use crate::storage::PriceHistoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Fetching,
    FetchFailed,
    Located,
    Extracting,
    Aggregated,
    Recorded,
    PersistFailed,
}

/// Outcome of a run that got past fetching. Records are kept even when
/// recording them failed.
#[derive(Debug)]
pub struct ExtractionRun {
    pub target: ExtractionTarget,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<PriceRecord>,
    pub history: Result<Vec<HistoryEntry>, PersistError>,
    pub state: RunState,
}

/// One fetch per source at a time, with at least `delay` between the end of
/// one fetch and the start of the next.
struct Politeness {
    delay: Duration,
    sources: Mutex<HashMap<String, Arc<Mutex<Option<Instant>>>>>,
}

impl Politeness {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Holds the source until the returned guard is stamped and dropped.
    async fn wait_turn(&self, source: &str) -> OwnedMutexGuard<Option<Instant>> {
        let slot = {
            let mut sources = self.sources.lock().await;
            sources.entry(source.to_string()).or_default().clone()
        };

        let last_end = slot.lock_owned().await;
        if let Some(previous) = *last_end {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                info!("Waiting {:?} before fetching from {} again", wait, source);
                tokio::time::sleep(wait).await;
            }
        }
        last_end
    }
}

/// The price-extraction pipeline: fetch, locate, extract, aggregate, record.
pub struct PriceExtractor {
    fetcher: PageFetcher,
    locator: CandidateLocator,
    aggregator: ResultAggregator,
    recorder: HistoryRecorder,
    snapshots: Option<SnapshotWriter>,
    politeness: Politeness,
}

impl PriceExtractor {
    pub fn new(
        config: &Config,
        driver: Arc<dyn BrowserDriver>,
        store: Arc<dyn PriceHistoryStore>,
    ) -> Result<Self, SetupError> {
        let extraction = &config.extraction;

        Ok(Self {
            fetcher: PageFetcher::new(driver, FetchSettings::from(&config.browser)),
            locator: CandidateLocator::from_config(extraction)?,
            aggregator: ResultAggregator::new(
                FieldExtractor::from_config(extraction),
                AvailabilityClassifier::new(extraction.out_of_stock_markers.iter().cloned()),
            ),
            recorder: HistoryRecorder::new(store),
            snapshots: config.snapshot_dir.as_ref().map(SnapshotWriter::new),
            politeness: Politeness::new(config.politeness_delay()),
        })
    }

    /// One best-effort pass over a target. Only fetch failures are errors;
    /// a failed history write is reported on the returned run.
    pub async fn run(&self, target: &ExtractionTarget) -> Result<ExtractionRun, FetchError> {
        let mut state = RunState::Init;
        advance(&mut state, RunState::Fetching, target);

        let mut turn = self.politeness.wait_turn(&target.source).await;
        let fetched = self.fetcher.fetch(target).await;
        *turn = Some(Instant::now());
        drop(turn);

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                advance(&mut state, RunState::FetchFailed, target);
                error!("Fetching '{}' from {} failed: {}", target.query, target.source, e);
                return Err(e);
            }
        };

        if let Some(snapshots) = &self.snapshots {
            match snapshots.save(target, &page) {
                Ok(path) => debug!("Saved snapshot to {}", path.display()),
                Err(e) => warn!("Could not save snapshot: {:#}", e),
            }
        }

        let records = self.extract(&page, target, &mut state);
        info!("Found {} priced products for '{}' on {}", records.len(), target.query, target.source);

        let history = self.recorder.record(&records).await;
        match &history {
            Ok(_) => advance(&mut state, RunState::Recorded, target),
            Err(e) => {
                advance(&mut state, RunState::PersistFailed, target);
                error!("Recording prices for '{}' failed: {}", target.query, e);
            }
        }

        Ok(ExtractionRun {
            target: target.clone(),
            fetched_at: page.fetched_at,
            records,
            history,
            state,
        })
    }

    /// Runs targets one after another with the politeness delay in between.
    pub async fn run_all(&self, targets: &[ExtractionTarget]) -> Vec<Result<ExtractionRun, FetchError>> {
        let mut outcomes = Vec::with_capacity(targets.len());

        for (idx, target) in targets.iter().enumerate() {
            if idx > 0 && !self.politeness.delay.is_zero() {
                debug!("Politeness delay of {:?}", self.politeness.delay);
                tokio::time::sleep(self.politeness.delay).await;
            }
            outcomes.push(self.run(target).await);
        }

        outcomes
    }

    fn extract(
        &self,
        page: &RenderedPage,
        target: &ExtractionTarget,
        state: &mut RunState,
    ) -> Vec<PriceRecord> {
        let document = Html::parse_document(&page.html);
        let candidates = self.locator.locate(&document);
        advance(state, RunState::Located, target);

        advance(state, RunState::Extracting, target);
        let records = self.aggregator.aggregate(candidates, &target.source);
        advance(state, RunState::Aggregated, target);
        records
    }
}

fn advance(state: &mut RunState, next: RunState, target: &ExtractionTarget) {
    debug!("Run '{}' on {}: {:?} -> {:?}", target.query, target.source, state, next);
    *state = next;
}
