use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::extract::locator::DEFAULT_STRATEGIES;
use crate::models::ExtractionTarget;
use crate::parsers::DEFAULT_OUT_OF_STOCK_MARKERS;

const CONFIG_PATH_ENV: &str = "MEDPRICE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "med_price_monitor";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    pub politeness_delay_secs: u64,
    /// Repeat the whole watch list on this interval; single pass when unset.
    pub watch_interval_secs: Option<u64>,
    pub snapshot_dir: Option<PathBuf>,
    pub medicines: Vec<String>,
    pub sources: BTreeMap<String, SourceConfig>,
    pub browser: BrowserConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Search page template, `{query}` is replaced by the formatted medicine name.
    pub search_url: String,
    #[serde(default)]
    pub query_style: QueryStyle,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub render_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStyle {
    /// `Dolo 650mg` becomes `dolo-650mg`
    #[default]
    Slug,
    /// `Dolo 650mg` becomes `Dolo%20650mg`
    Encoded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub chrome_path: Option<PathBuf>,
    /// Fixed wait for JavaScript after navigation.
    pub render_delay_ms: u64,
    pub scroll_offset_px: u32,
    /// Fixed wait after the scroll that triggers lazy loading.
    pub scroll_delay_ms: u64,
    pub navigation_timeout_secs: u64,
    /// Allowance for Chrome start-up and reading the page back.
    pub launch_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub label: String,
    pub selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Tried in order; the first one with a match is the only one used.
    pub structural_strategies: Vec<StrategyConfig>,
    pub currency_markers: Vec<String>,
    pub out_of_stock_markers: Vec<String>,
    pub text_scan_limit: usize,
    pub min_name_chars: usize,
    pub max_name_chars: usize,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        let mut sources = BTreeMap::new();

        sources.insert(
            "apollo".to_string(),
            SourceConfig {
                name: "Apollo Pharmacy".to_string(),
                search_url: "https://www.apollopharmacy.in/search-medicines/{query}".to_string(),
                query_style: QueryStyle::Slug,
                enabled: true,
                render_delay_ms: None,
            },
        );

        sources.insert(
            "netmeds".to_string(),
            SourceConfig {
                name: "Netmeds".to_string(),
                search_url: "https://www.netmeds.com/products?q={query}".to_string(),
                query_style: QueryStyle::Encoded,
                enabled: true,
                render_delay_ms: Some(8000),
            },
        );

        let medicines = [
            "Paracip 500mg",
            "Crocin Advance",
            "Dolo 650mg",
            "Azithral 500",
            "Pan 40",
            "Calpol 650mg",
            "Augmentin 625",
            "Betadine Gargle",
            "Combiflam",
            "Sinarest",
        ];

        Self {
            database_path: "medicines.db".to_string(),
            politeness_delay_secs: 3,
            watch_interval_secs: None,
            snapshot_dir: None,
            medicines: medicines.iter().map(|m| m.to_string()).collect(),
            sources,
            browser: BrowserConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
            window_width: 1920,
            window_height: 1080,
            chrome_path: None,
            render_delay_ms: 3000,
            scroll_offset_px: 1000,
            scroll_delay_ms: 2000,
            navigation_timeout_secs: 30,
            launch_timeout_secs: 20,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            structural_strategies: DEFAULT_STRATEGIES
                .iter()
                .map(|(label, selector)| StrategyConfig {
                    label: label.to_string(),
                    selector: selector.to_string(),
                })
                .collect(),
            currency_markers: vec!["₹".to_string(), "â‚¹".to_string(), "Rs.".to_string()],
            out_of_stock_markers: DEFAULT_OUT_OF_STOCK_MARKERS.iter().map(|m| m.to_string()).collect(),
            text_scan_limit: 3,
            min_name_chars: 10,
            max_name_chars: 100,
        }
    }
}

impl Config {
    /// Defaults, then `med_price_monitor.{toml,json,...}` (or `$MEDPRICE_CONFIG`),
    /// then `MEDPRICE__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MEDPRICE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_secs(self.politeness_delay_secs)
    }

    /// One target per medicine and enabled source, medicine-major.
    pub fn targets(&self, medicines: &[String]) -> Result<Vec<ExtractionTarget>> {
        let mut targets = Vec::new();
        for medicine in medicines {
            for source in self.sources.values().filter(|s| s.enabled) {
                targets.push(source.target_for(medicine)?);
            }
        }
        Ok(targets)
    }
}

impl SourceConfig {
    pub fn target_for(&self, medicine: &str) -> Result<ExtractionTarget> {
        let medicine = medicine.trim();
        let query = match self.query_style {
            QueryStyle::Slug => medicine.to_lowercase().replace(' ', "-"),
            QueryStyle::Encoded => utf8_percent_encode(medicine, NON_ALPHANUMERIC).to_string(),
        };

        let url = Url::parse(&self.search_url.replace("{query}", &query))
            .with_context(|| format!("Invalid search URL template for {}", self.name))?;

        let target = ExtractionTarget::new(medicine, url, self.name.clone());
        Ok(match self.render_delay_ms {
            Some(ms) => target.with_render_delay(Duration::from_millis(ms)),
            None => target,
        })
    }
}
