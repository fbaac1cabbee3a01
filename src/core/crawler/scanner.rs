// Folder scanner: lists the subfolder and file links of one folder page

use std::collections::HashSet;
use std::thread;
use std::time::Instant;
use url::Url;

use super::observer::CrawlObserver;
use crate::core::browser::{DriverError, DriverResult, PageDriver, PageId, WaitUntil};
use crate::core::config::CrawlSettings;

/// Scrolls to the end and reports the resulting document height
const SCROLL_SCRIPT: &str = "(() => { const h = document.body ? document.body.scrollHeight : 0; \
     window.scrollTo(0, h); return h; })()";

/// A link found on a folder page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLink {
    pub url: String,
    pub display_name: String,
}

pub type FolderLink = RemoteLink;
pub type FileLink = RemoteLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Folder,
    File,
}

/// Links of one folder; both lists are empty when the folder could not be read
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    pub subfolders: Vec<FolderLink>,
    pub files: Vec<FileLink>,
    pub error: Option<String>,
}

impl ScanResult {
    fn failed(reason: String) -> Self {
        Self {
            error: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

pub struct FolderScanner<'a> {
    settings: &'a CrawlSettings,
}

impl<'a> FolderScanner<'a> {
    pub fn new(settings: &'a CrawlSettings) -> Self {
        Self { settings }
    }

    /// Open `folder_url` in `page` and collect its links
    ///
    /// Failures are reported and yield an empty result; the folder is not
    /// retried.
    pub fn scan(
        &self,
        driver: &mut dyn PageDriver,
        page: &PageId,
        folder_url: &str,
        observer: &dyn CrawlObserver,
    ) -> ScanResult {
        if let Err(e) = driver.navigate(
            page,
            folder_url,
            WaitUntil::DomContentLoaded,
            self.settings.navigation_timeout(),
        ) {
            log::warn!("Failed to open folder {}: {}", folder_url, e);
            observer.log(&format!("⚠️  No se pudo abrir la carpeta {}: {}", folder_url, e));
            return ScanResult::failed(e.to_string());
        }

        self.settle(driver, page);

        match self.collect_links(driver, page, folder_url) {
            Ok(result) => {
                log::info!(
                    "Folder {}: {} subfolders, {} files",
                    folder_url,
                    result.subfolders.len(),
                    result.files.len()
                );
                result
            }
            Err(e) => {
                log::warn!("Failed to read links of {}: {}", folder_url, e);
                observer.log(&format!("⚠️  Error leyendo enlaces de {}: {}", folder_url, e));
                ScanResult::failed(e.to_string())
            }
        }
    }

    /// Scroll until the document height stops growing
    ///
    /// Returns the number of rounds used. Gives up early on script errors;
    /// a page that cannot scroll is read as-is.
    pub fn settle(&self, driver: &mut dyn PageDriver, page: &PageId) -> u32 {
        let mut last_height: Option<i64> = None;
        let mut stable_since = Instant::now();
        let mut rounds = 0;

        while rounds < self.settings.settle_max_rounds {
            rounds += 1;

            let height = match driver.evaluate(page, SCROLL_SCRIPT) {
                Ok(value) => value.as_f64().map(|h| h as i64).unwrap_or(0),
                Err(e) => {
                    log::debug!("Scroll script failed, reading page as-is: {}", e);
                    break;
                }
            };

            if last_height == Some(height) {
                if stable_since.elapsed() >= self.settings.settle_stable() {
                    break;
                }
            } else {
                last_height = Some(height);
                stable_since = Instant::now();
            }

            let interval = self.settings.settle_interval();
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }

        rounds
    }

    fn collect_links(
        &self,
        driver: &mut dyn PageDriver,
        page: &PageId,
        folder_url: &str,
    ) -> DriverResult<ScanResult> {
        let base = Url::parse(folder_url).map_err(|e| DriverError::Navigation {
            url: folder_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut result = ScanResult::default();
        let mut seen = HashSet::new();

        for anchor in driver.query_all(page, "a[href]")? {
            let href = match driver.get_attribute(page, anchor, "href") {
                Ok(Some(href)) => href,
                Ok(None) | Err(DriverError::NoSuchElement) => continue,
                Err(e) => return Err(e),
            };

            let Some(url) = resolve_link(&base, &href) else {
                continue;
            };
            let Some(kind) = classify_link(&url, self.settings) else {
                continue;
            };
            if !seen.insert(url.to_string()) {
                continue;
            }

            let display_name = match driver.get_text(page, anchor) {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => driver
                    .get_attribute(page, anchor, "title")
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                Err(DriverError::NoSuchElement) => continue,
                Err(e) => return Err(e),
            };

            let link = RemoteLink {
                url: url.to_string(),
                display_name,
            };
            match kind {
                LinkKind::Folder => result.subfolders.push(link),
                LinkKind::File => result.files.push(link),
            }
        }

        Ok(result)
    }
}

/// Resolve `href` against the folder URL, keeping same-host http(s) links only
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str() != base.host_str() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Decide whether a same-site URL is a folder, a file, or neither
pub fn classify_link(url: &Url, settings: &CrawlSettings) -> Option<LinkKind> {
    let path = url.path();

    if settings
        .folder_prefixes
        .iter()
        .any(|p| path.starts_with(p.as_str()))
    {
        return Some(LinkKind::Folder);
    }

    if settings
        .file_prefixes
        .iter()
        .any(|p| path.starts_with(p.as_str()))
        || path.ends_with(".html")
    {
        return Some(LinkKind::File);
    }

    None
}
