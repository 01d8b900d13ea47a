use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

use med_price_monitor::browser::ChromeDriver;
use med_price_monitor::config::Config;
use med_price_monitor::models::ExtractionTarget;
use med_price_monitor::storage::{PriceHistoryStore, SqliteStorage};
use med_price_monitor::trend;
use med_price_monitor::PriceExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("med_price_monitor=info".parse()?),
        )
        .init();

    info!("Starting Med Price Monitor");

    let config = Config::load()?;

    // Medicines on the command line replace the configured watch list
    let args: Vec<String> = std::env::args().skip(1).collect();
    let medicines = if args.is_empty() { config.medicines.clone() } else { args };
    let targets = config.targets(&medicines)?;

    let storage = Arc::new(
        SqliteStorage::new(&config.database_path)
            .await
            .context("Failed to open price history database")?,
    );
    storage.migrate().await?;

    let driver = Arc::new(ChromeDriver::new(config.browser.clone()));
    let extractor = PriceExtractor::new(&config, driver, storage.clone())?;

    match config.watch_interval_secs {
        None => check_cycle(&extractor, storage.as_ref(), &targets).await,
        Some(secs) => {
            let mut interval = interval(Duration::from_secs(secs));
            loop {
                interval.tick().await;
                info!("--- Starting new check cycle at {} ---", Local::now().format("%Y-%m-%d %H:%M:%S"));
                check_cycle(&extractor, storage.as_ref(), &targets).await;
                info!("Check cycle completed, waiting {} seconds", secs);
            }
        }
    }

    Ok(())
}

async fn check_cycle(extractor: &PriceExtractor, storage: &dyn PriceHistoryStore, targets: &[ExtractionTarget]) {
    for outcome in extractor.run_all(targets).await {
        let run = match outcome {
            Ok(run) => run,
            // Already logged by the extractor; the next target still runs.
            Err(_) => continue,
        };

        if run.records.is_empty() {
            warn!("No products extracted for '{}' on {}", run.target.query, run.target.source);
            continue;
        }

        for record in &run.records {
            info!("  {} - ₹{:.2} ({})", record.product_name, record.price, record.availability);
        }

        if run.history.is_err() {
            continue;
        }

        let mut medicines: Vec<&str> = run.records.iter().map(|r| r.canonical_name()).collect();
        medicines.dedup();
        for medicine in medicines {
            match storage.history_for(medicine).await {
                Ok(history) => {
                    for t in trend::summarize(&history) {
                        info!(
                            "  trend {} on {}: {} observations, min ₹{:.2}, max ₹{:.2}, mean ₹{:.2}, latest ₹{:.2}",
                            medicine, t.source, t.observations, t.min, t.max, t.mean, t.latest
                        );
                    }
                }
                Err(e) => error!("Could not read price history for {}: {}", medicine, e),
            }
        }
    }
}
