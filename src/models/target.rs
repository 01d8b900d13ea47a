use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;

/// Immutable input to one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionTarget {
    pub query: String,
    pub source_url: Url,
    /// Fixed label of the pharmacy, used verbatim as `PriceRecord::source`.
    pub source: String,
    /// Overrides the configured JavaScript wait for slow sources.
    pub render_delay: Option<Duration>,
}

impl ExtractionTarget {
    pub fn new(query: impl Into<String>, source_url: Url, source: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            source_url,
            source: source.into(),
            render_delay: None,
        }
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }
}

/// Markup as the browser saw it after the dynamic-content wait.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}
