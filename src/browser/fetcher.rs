use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{BrowserDriver, SessionGuard};
use crate::config::BrowserConfig;
use crate::error::FetchError;
use crate::models::{ExtractionTarget, RenderedPage};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub render_delay: Duration,
    pub scroll_offset_px: u32,
    pub scroll_delay: Duration,
    pub navigation_timeout: Duration,
    pub launch_timeout: Duration,
}

impl From<&BrowserConfig> for FetchSettings {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            render_delay: Duration::from_millis(config.render_delay_ms),
            scroll_offset_px: config.scroll_offset_px,
            scroll_delay: Duration::from_millis(config.scroll_delay_ms),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            launch_timeout: Duration::from_secs(config.launch_timeout_secs),
        }
    }
}

impl FetchSettings {
    /// Whole-fetch limit: launch, navigation and the fixed waits.
    pub fn budget(&self, render_delay: Duration) -> Duration {
        self.launch_timeout + self.navigation_timeout + render_delay + self.scroll_delay
    }
}

/// Loads a target in a fresh browser session and returns the rendered markup.
pub struct PageFetcher {
    driver: Arc<dyn BrowserDriver>,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(driver: Arc<dyn BrowserDriver>, settings: FetchSettings) -> Self {
        Self { driver, settings }
    }

    /// The browser work runs on a blocking thread that owns the session, so
    /// the session is torn down there even if this future is dropped or the
    /// overall budget runs out.
    pub async fn fetch(&self, target: &ExtractionTarget) -> Result<RenderedPage, FetchError> {
        let url = target.source_url.to_string();
        let render_delay = target.render_delay.unwrap_or(self.settings.render_delay);
        let budget = self.settings.budget(render_delay);

        info!("Fetching {} for '{}'", url, target.query);

        let driver = self.driver.clone();
        let settings = self.settings.clone();
        let task_url = url.clone();
        let task = tokio::task::spawn_blocking(move || {
            render(driver.as_ref(), &task_url, render_delay, &settings)
        });

        let html = match tokio::time::timeout(budget, task).await {
            Err(_) => {
                return Err(FetchError::Timeout {
                    url,
                    timeout: budget,
                })
            }
            Ok(Err(join_error)) => {
                return Err(FetchError::Aborted {
                    url,
                    reason: join_error.to_string(),
                })
            }
            Ok(Ok(result)) => result?,
        };

        info!("Rendered {} ({} bytes)", url, html.len());
        Ok(RenderedPage {
            url,
            html,
            fetched_at: Utc::now(),
        })
    }
}

fn render(
    driver: &dyn BrowserDriver,
    url: &str,
    render_delay: Duration,
    settings: &FetchSettings,
) -> Result<String, FetchError> {
    let mut session = SessionGuard::acquire(driver).map_err(|e| FetchError::Launch(format!("{:#}", e)))?;

    session
        .navigate(url, settings.navigation_timeout)
        .map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            reason: format!("{:#}", e),
        })?;

    // Fixed waits: the page gives no reliable readiness signal.
    std::thread::sleep(render_delay);
    if let Err(e) = session.scroll_to(settings.scroll_offset_px) {
        warn!("Scroll to trigger lazy loading failed on {}: {}", url, e);
    }
    std::thread::sleep(settings.scroll_delay);

    let html = session.page_source().map_err(|e| FetchError::Render {
        url: url.to_string(),
        reason: format!("{:#}", e),
    })?;

    if let Err(e) = session.release() {
        warn!("Browser session teardown failed: {}", e);
    }
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn budget_covers_launch_navigation_and_waits() {
        let settings = FetchSettings::from(&BrowserConfig::default());

        assert_eq!(settings.budget(settings.render_delay), Duration::from_secs(20 + 30 + 3 + 2));
        assert_eq!(settings.budget(Duration::from_millis(8000)), Duration::from_secs(20 + 30 + 8 + 2));
    }
}
