use anyhow::{bail, Context, Result};
use scraper::Html;
use std::fs;

use med_price_monitor::config::Config;
use med_price_monitor::extract::{CandidateLocator, FieldExtractor, ResultAggregator};
use med_price_monitor::parsers::AvailabilityClassifier;

/// Replays candidate location and aggregation over a saved snapshot.
///
/// Usage: probe_selectors <snapshot.html> [source label]
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: probe_selectors <snapshot.html> [source label]");
    };
    let source = args.next().unwrap_or_else(|| "Snapshot".to_string());

    let config = Config::load()?;
    let extraction = &config.extraction;
    let locator = CandidateLocator::from_config(extraction)?;
    let fields = FieldExtractor::from_config(extraction);
    let aggregator = ResultAggregator::new(
        fields.clone(),
        AvailabilityClassifier::new(extraction.out_of_stock_markers.iter().cloned()),
    );

    let html = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    let document = Html::parse_document(&html);

    // Per-strategy hit counts, ignoring the first-match-wins rule
    for strategy in locator.strategies() {
        let hits = document.select(strategy.selector()).count();
        println!("{:<20} {:>4} matches", strategy.label, hits);
    }

    let candidates: Vec<_> = locator.locate(&document).collect();
    println!("\n{} candidates", candidates.len());
    for (idx, candidate) in candidates.iter().enumerate() {
        let verdict = match aggregator.evaluate(candidate, &source) {
            Ok(record) => format!("ok {} = {}", record.product_name, record.price),
            Err(reason) => format!("rejected: {}", reason),
        };
        println!(
            "[{}] {:<18} name={:?} price={:?} -> {}",
            idx + 1,
            locator.origin_label(candidate.origin),
            fields.extract_name(candidate),
            fields.extract_price(candidate),
            verdict
        );
    }

    let records = aggregator.aggregate(candidates, &source);
    println!("\n{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}
