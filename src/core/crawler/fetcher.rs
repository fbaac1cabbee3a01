//! File fetcher
//!
//! Downloads one file by opening its page in a fresh tab, clicking the site's
//! download control and waiting for the browser download. Each attempt goes
//! NAVIGATING → AWAITING_CONTROL → CLICKED_AWAITING_DOWNLOAD and ends SAVED or
//! FAILED; failed attempts are retried on a new tab after a jittered backoff
//! until `max_attempts` is used up, then the file is abandoned.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::observer::{CrawlObserver, FileStatus};
use super::scanner::FileLink;
use crate::core::browser::{DriverError, ElementHandle, PageDriver, PageId, WaitUntil};
use crate::core::config::CrawlSettings;
use crate::core::sanitizer::{
    clean_display_text, media_extension, sanitize_for_filesystem, unique_save_path,
};
use crate::error::{CrawlError, Result};

/// Name used when neither the link text nor the suggested name leaves anything
const FALLBACK_NAME: &str = "arquivo";

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The file page could not be opened or loaded
    Navigation(String),
    /// No download button or link appeared within the poll budget
    MissingControl,
    /// The site showed an error after the click
    SiteError(String),
    /// The click did not produce a completed download
    Download(String),
    /// The download finished but could not be written
    Save(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Navigation(e) => write!(f, "navigation failed: {}", e),
            AttemptFailure::MissingControl => write!(f, "no download control found"),
            AttemptFailure::SiteError(msg) => write!(f, "site reported an error: {}", msg),
            AttemptFailure::Download(e) => write!(f, "download failed: {}", e),
            AttemptFailure::Save(e) => write!(f, "save failed: {}", e),
        }
    }
}

/// Final result for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Saved(PathBuf),
    AlreadyPresent(PathBuf),
    Abandoned {
        attempts: u32,
        last_failure: AttemptFailure,
    },
}

type AttemptResult = std::result::Result<PathBuf, AttemptFailure>;

/// Downloads files one at a time
///
/// One fetcher serves one crawl run. Files it saved itself never count as
/// "already present", so two remote files that clean to the same name both
/// get downloaded.
pub struct FileFetcher<'a> {
    settings: &'a CrawlSettings,
    saved: RefCell<HashSet<PathBuf>>,
}

impl<'a> FileFetcher<'a> {
    pub fn new(settings: &'a CrawlSettings) -> Self {
        Self {
            settings,
            saved: RefCell::new(HashSet::new()),
        }
    }

    /// Download `file` into `local_dir`
    ///
    /// Per-file faults end in `Abandoned`; only errors that would hit every
    /// following file too (permission denied, disk full) are returned as `Err`.
    pub fn fetch(
        &self,
        driver: &mut dyn PageDriver,
        file: &FileLink,
        local_dir: &Path,
        observer: &dyn CrawlObserver,
    ) -> Result<FetchOutcome> {
        let cleaned = sanitize_for_filesystem(&clean_display_text(&file.display_name));

        if self.settings.skip_existing {
            if let Some(existing) = find_existing(local_dir, &cleaned, &self.saved.borrow()) {
                log::info!("Already present, skipping: {:?}", existing);
                observer.set_status(&file.url, FileStatus::Present);
                observer.log(&format!("⊘ Ya existe: {}", existing.display()));
                return Ok(FetchOutcome::AlreadyPresent(existing));
            }
        }

        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_failure = AttemptFailure::MissingControl;

        for attempt in 1..=max_attempts {
            observer.set_status(&file.url, FileStatus::Downloading(attempt));
            observer.log(&format!(
                "⬇️  Descargando: {} [{}/{}]",
                file.url, attempt, max_attempts
            ));

            let result = match driver.open_page() {
                Ok(page) => {
                    let result = self.attempt(driver, &page, file, local_dir, &cleaned);
                    if let Err(e) = driver.close_page(&page) {
                        log::debug!("Failed to close page {}: {}", page.0, e);
                    }
                    result?
                }
                Err(e) => Err(AttemptFailure::Navigation(e.to_string())),
            };

            match result {
                Ok(path) => {
                    log::info!("Saved {} -> {:?}", file.url, path);
                    self.saved.borrow_mut().insert(path.clone());
                    observer.set_status(&file.url, FileStatus::Done);
                    observer.log(&format!("✓ Guardado: {}", path.display()));
                    return Ok(FetchOutcome::Saved(path));
                }
                Err(failure) => {
                    log::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        max_attempts,
                        file.url,
                        failure
                    );
                    observer.set_status(&file.url, FileStatus::Error(attempt));
                    observer.log(&format!(
                        "⚠️  Intento {}/{} falló: {}",
                        attempt, max_attempts, failure
                    ));
                    last_failure = failure;

                    if attempt < max_attempts {
                        pause(self.settings.retry_backoff.sample());
                    }
                }
            }
        }

        log::warn!("Giving up on {} after {} attempts", file.url, max_attempts);
        observer.set_status(&file.url, FileStatus::Skipped);
        observer.log(&format!(
            "✗ Omitido tras {} intentos: {}",
            max_attempts, file.url
        ));

        Ok(FetchOutcome::Abandoned {
            attempts: max_attempts,
            last_failure,
        })
    }

    /// One attempt on an already opened page
    fn attempt(
        &self,
        driver: &mut dyn PageDriver,
        page: &PageId,
        file: &FileLink,
        local_dir: &Path,
        cleaned: &str,
    ) -> Result<AttemptResult> {
        // NAVIGATING
        if let Err(e) = driver.navigate(
            page,
            &file.url,
            WaitUntil::DomContentLoaded,
            self.settings.navigation_timeout(),
        ) {
            return Ok(Err(AttemptFailure::Navigation(e.to_string())));
        }
        pause(self.settings.pre_download_wait.sample());

        // AWAITING_CONTROL
        let Some(control) = self.find_download_control(driver, page) else {
            return Ok(Err(AttemptFailure::MissingControl));
        };

        // CLICKED_AWAITING_DOWNLOAD
        if let Err(e) = driver.click(page, control) {
            return Ok(Err(AttemptFailure::Download(format!("click failed: {}", e))));
        }
        pause(self.settings.post_click_wait());

        if let Some(message) = self.site_error(driver, page) {
            return Ok(Err(AttemptFailure::SiteError(message)));
        }

        let download = match driver.await_download(page, self.settings.download_timeout()) {
            Ok(download) => download,
            Err(e) => return Ok(Err(AttemptFailure::Download(e.to_string()))),
        };

        let name = final_file_name(&file.display_name, cleaned, &download.suggested_filename);
        let path = unique_save_path(local_dir, &name);

        match driver.save_download(&download, &path) {
            Ok(()) => Ok(Ok(path)),
            Err(DriverError::Io(e)) if is_resource_exhaustion(&e) => Err(CrawlError::Io(e)),
            Err(e) => Ok(Err(AttemptFailure::Save(e.to_string()))),
        }
    }

    /// Poll for a labeled download button/link, then for an `a[download]`
    fn find_download_control(
        &self,
        driver: &mut dyn PageDriver,
        page: &PageId,
    ) -> Option<ElementHandle> {
        let polls = self.settings.control_poll_attempts.max(1);

        for poll in 1..=polls {
            if let Some(control) = self.labeled_control(driver, page) {
                return Some(control);
            }

            match driver.query_all(page, "a[download]") {
                Ok(links) if !links.is_empty() => return links.first().copied(),
                Ok(_) => {}
                Err(e) => log::debug!("a[download] query failed: {}", e),
            }

            if poll < polls {
                pause(self.settings.control_poll_interval());
            }
        }

        None
    }

    fn labeled_control(&self, driver: &mut dyn PageDriver, page: &PageId) -> Option<ElementHandle> {
        let labels: Vec<String> = self
            .settings
            .download_labels
            .iter()
            .map(|l| l.to_lowercase())
            .collect();
        if labels.is_empty() {
            return None;
        }

        let candidates = driver.query_all(page, "button, a").ok()?;
        candidates.into_iter().find(|&element| {
            driver
                .get_text(page, element)
                .map(|text| {
                    let text = text.to_lowercase();
                    labels.iter().any(|label| text.contains(label.as_str()))
                })
                .unwrap_or(false)
        })
    }

    /// Text of the first visible error banner, if any
    fn site_error(&self, driver: &mut dyn PageDriver, page: &PageId) -> Option<String> {
        let selector = self.settings.error_selector.trim();
        if selector.is_empty() {
            return None;
        }

        let banners = match driver.query_all(page, selector) {
            Ok(banners) => banners,
            Err(e) => {
                log::debug!("Error banner query failed: {}", e);
                return None;
            }
        };

        banners.into_iter().find_map(|banner| {
            driver
                .get_text(page, banner)
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
    }
}

/// Local file name for a finished download
///
/// Keeps the extension the browser suggested (falling back to the display
/// name's media extension). A cleaned name that already ends in a media
/// extension is used as-is.
pub fn final_file_name(display_name: &str, cleaned: &str, suggested_filename: &str) -> String {
    if media_extension(cleaned).is_some() {
        return cleaned.to_string();
    }

    let suggested = sanitize_for_filesystem(suggested_filename);
    let suggested_path = Path::new(&suggested);

    let extension = suggested_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|e| !e.is_empty())
        .or_else(|| media_extension(display_name));

    let base = if !cleaned.is_empty() {
        cleaned.to_string()
    } else {
        suggested_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.starts_with('.'))
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    };

    match extension {
        Some(ext) => format!("{}.{}", base, ext),
        None => base,
    }
}

/// A file in `dir` whose name or stem equals `cleaned`, other than `ignore`
fn find_existing(dir: &Path, cleaned: &str, ignore: &HashSet<PathBuf>) -> Option<PathBuf> {
    if cleaned.is_empty() {
        return None;
    }

    fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).find(|path| {
        path.is_file()
            && !ignore.contains(path)
            && (path.file_name().and_then(|n| n.to_str()) == Some(cleaned)
                || path.file_stem().and_then(|s| s.to_str()) == Some(cleaned))
    })
}

fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::StorageFull
    )
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
