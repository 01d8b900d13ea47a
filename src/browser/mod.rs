//! Browser access for rendering JavaScript-heavy search pages.
//!
//! A `BrowserDriver` launches one `BrowserSession` per fetch. Sessions are
//! only ever held through a `SessionGuard`, which closes them exactly once
//! on every exit path.

pub mod chrome;
pub mod fetcher;

pub use chrome::ChromeDriver;
pub use fetcher::{FetchSettings, PageFetcher};

use anyhow::Result;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::{debug, warn};

pub trait BrowserDriver: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// A live browser tab. Calls block the current thread.
pub trait BrowserSession {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    fn scroll_to(&mut self, offset_px: u32) -> Result<()>;
    fn page_source(&mut self) -> Result<String>;
    fn close(&mut self) -> Result<()>;
}

pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
    released: bool,
}

impl SessionGuard {
    pub fn acquire(driver: &dyn BrowserDriver) -> Result<Self> {
        let session = driver.launch()?;
        debug!("Browser session acquired");
        Ok(Self {
            session,
            released: false,
        })
    }

    /// Close now and report teardown errors instead of only logging them.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.session.close()
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.session.close() {
            Ok(()) => debug!("Browser session released"),
            Err(e) => warn!("Browser session teardown failed: {}", e),
        }
    }
}
