//! Browser automation layer
//!
//! The crawler only talks to the [`PageDriver`] trait. [`ChromeDriver`] is the
//! real implementation on top of the Chrome DevTools Protocol; tests swap in an
//! in-memory site.

pub mod cdp;
pub mod chrome_driver;
pub mod launcher;

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use cdp::CdpConnection;
pub use chrome_driver::ChromeDriver;
pub use launcher::{BrowserOptions, ChromeInstance};

/// Faults raised by a page driver
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("element is gone from the page")]
    NoSuchElement,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Opaque identifier of an open page (a tab with its own session)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId(pub String);

/// Opaque reference to an element inside one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub i64);

/// Load milestone a navigation waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
}

/// A download the browser has finished receiving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadHandle {
    pub id: String,
    pub suggested_filename: String,
    pub url: String,
}

/// Everything the crawl needs from a browser
///
/// Any failure comes back as a [`DriverError`]; callers translate it into
/// their own skip/retry policy.
pub trait PageDriver {
    /// Open a fresh, isolated page
    fn open_page(&mut self) -> DriverResult<PageId>;

    fn close_page(&mut self, page: &PageId) -> DriverResult<()>;

    fn navigate(
        &mut self,
        page: &PageId,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> DriverResult<()>;

    fn query_all(&mut self, page: &PageId, selector: &str) -> DriverResult<Vec<ElementHandle>>;

    fn get_attribute(
        &mut self,
        page: &PageId,
        element: ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>>;

    /// Rendered text of an element
    fn get_text(&mut self, page: &PageId, element: ElementHandle) -> DriverResult<String>;

    /// Evaluate a script in the page and return its JSON value
    fn evaluate(&mut self, page: &PageId, script: &str) -> DriverResult<serde_json::Value>;

    fn click(&mut self, page: &PageId, element: ElementHandle) -> DriverResult<()>;

    /// Wait for a download triggered from `page` to complete
    fn await_download(&mut self, page: &PageId, timeout: Duration) -> DriverResult<DownloadHandle>;

    /// Move a completed download to its final location
    fn save_download(&mut self, download: &DownloadHandle, path: &Path) -> DriverResult<()>;
}
