use anyhow::{anyhow, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::browser::{BrowserDriver, BrowserSession};
use crate::config::BrowserConfig;

const CHROME_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
];

/// Launches a fresh headless Chrome process per session.
pub struct ChromeDriver {
    config: BrowserConfig,
}

impl ChromeDriver {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl BrowserDriver for ChromeDriver {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let args: Vec<&OsStr> = CHROME_ARGS.iter().map(OsStr::new).collect();

        let options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false)
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .path(self.config.chrome_path.clone())
            .idle_browser_timeout(Duration::from_secs(self.config.navigation_timeout_secs * 4))
            .args(args)
            .build()
            .map_err(|e| anyhow!("Invalid Chrome launch options: {}", e))?;

        let browser = Browser::new(options).context("Failed to start Chrome")?;
        let tab = browser.new_tab().context("Failed to open a browser tab")?;
        tab.set_user_agent(&self.config.user_agent, None, None)
            .context("Failed to set user agent")?;

        info!("Chrome session started");
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
        }))
    }
}

struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn scroll_to(&mut self, offset_px: u32) -> Result<()> {
        self.tab
            .evaluate(&format!("window.scrollTo(0, {});", offset_px), false)?;
        Ok(())
    }

    fn page_source(&mut self) -> Result<String> {
        self.tab.get_content()
    }

    fn close(&mut self) -> Result<()> {
        let closed = self.tab.close(false);
        // Dropping the browser kills the Chrome process.
        self.browser.take();
        info!("Chrome session closed");
        closed.map(|_| ())
    }
}
