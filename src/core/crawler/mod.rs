//! Breadth-first crawl of a remote folder tree
//!
//! The [`Crawler`] pops folders from a FIFO queue, asks the
//! [`FolderScanner`] for their links, queues unseen subfolders and hands
//! every file to the [`FileFetcher`] right away. Local directories mirror the
//! remote tree, one cleaned folder label per level.
//!
//! # Examples
//!
//! ```no_run
//! use drivecrawl::core::browser::{BrowserOptions, ChromeDriver, ChromeInstance};
//! use drivecrawl::core::crawler::{Crawler, NoopObserver};
//! use drivecrawl::CrawlSettings;
//! use std::path::Path;
//!
//! let chrome = ChromeInstance::ensure_running(&BrowserOptions::default())?;
//! let mut driver = ChromeDriver::connect(chrome.ws_url(), chrome.download_dir())?;
//!
//! let settings = CrawlSettings::default();
//! let mut crawler = Crawler::new(&settings, &NoopObserver);
//! let stats = crawler.run(&mut driver, "https://drivedepobre.com/pasta/exemplo", Path::new("downloads"))?;
//! println!("{} files saved", stats.files_downloaded);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod fetcher;
pub mod observer;
pub mod scanner;

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

use crate::core::browser::PageDriver;
use crate::core::config::CrawlSettings;
use crate::core::sanitizer::{clean_folder_label, sanitize_for_filesystem};
use crate::error::{CrawlError, Result};

pub use fetcher::{AttemptFailure, FetchOutcome, FileFetcher};
pub use observer::{ChannelObserver, CrawlEvent, CrawlObserver, FileStatus, NoopObserver};
pub use scanner::{FileLink, FolderLink, FolderScanner, LinkKind, RemoteLink, ScanResult};

/// Directory name used when a folder has neither a usable label nor URL segment
const FALLBACK_FOLDER: &str = "pasta";

/// A folder waiting to be scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderTask {
    pub url: String,
    /// Empty for the root
    pub display_name: String,
    pub local_dir: PathBuf,
}

/// Statistics from a crawl run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub folders_scanned: usize,
    pub folders_failed: usize,
    pub files_found: usize,
    pub files_downloaded: usize,
    pub files_present: usize,
    pub files_abandoned: usize,
    pub bytes_downloaded: u64,
    pub was_cancelled: bool,
}

/// Traversal driver
///
/// The visited set lives as long as the crawler, so running it twice never
/// rescans a folder. Cancellation is cooperative: the flag is checked before
/// each folder and before each file, never during a download.
pub struct Crawler<'a> {
    settings: &'a CrawlSettings,
    observer: &'a dyn CrawlObserver,
    pub cancel_flag: Arc<AtomicBool>,
    visited: HashSet<String>,
    queued: HashSet<String>,
    queue: VecDeque<FolderTask>,
}

impl<'a> Crawler<'a> {
    pub fn new(settings: &'a CrawlSettings, observer: &'a dyn CrawlObserver) -> Self {
        Self {
            settings,
            observer,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            visited: HashSet::new(),
            queued: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Share an existing stop flag, e.g. one set by a Ctrl+C handler or the UI
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Folders scanned so far
    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    /// Crawl everything reachable from `root_url` into `output_root`
    pub fn run(
        &mut self,
        driver: &mut dyn PageDriver,
        root_url: &str,
        output_root: &Path,
    ) -> Result<CrawlStats> {
        let root = Url::parse(root_url)?;
        if !matches!(root.scheme(), "http" | "https") {
            return Err(CrawlError::invalid_url(format!(
                "{} is not an http(s) URL",
                root
            )));
        }
        fs::create_dir_all(output_root)?;

        log::info!("Starting crawl of {} into {:?}", root, output_root);
        self.observer.log(&format!("🌐 Carpeta raíz: {}", root));
        self.observer
            .log(&format!("📁 Destino: {}", output_root.display()));

        self.enqueue(FolderTask {
            url: root.to_string(),
            display_name: String::new(),
            local_dir: output_root.to_path_buf(),
        });

        let scanner = FolderScanner::new(self.settings);
        let fetcher = FileFetcher::new(self.settings);
        let mut stats = CrawlStats::default();

        let page = driver.open_page()?;
        let outcome = self.crawl_loop(driver, &page, &scanner, &fetcher, &mut stats);
        if let Err(e) = driver.close_page(&page) {
            log::debug!("Failed to close folder page: {}", e);
        }
        outcome?;

        if stats.was_cancelled {
            log::info!("Crawl cancelled with {} folders still queued", self.queue.len());
            self.observer.log(&format!(
                "🛑 Cancelado: {} carpetas quedaron en cola",
                self.queue.len()
            ));
        } else {
            log::info!("Crawl finished: {:?}", stats);
            self.observer.log("✓ Todos los archivos fueron procesados");
        }

        Ok(stats)
    }

    fn crawl_loop(
        &mut self,
        driver: &mut dyn PageDriver,
        page: &crate::core::browser::PageId,
        scanner: &FolderScanner<'_>,
        fetcher: &FileFetcher<'_>,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        while let Some(task) = self.queue.pop_front() {
            if self.is_cancelled() {
                stats.was_cancelled = true;
                // Keep the task so the queue length reflects what was skipped
                self.queue.push_front(task);
                return Ok(());
            }

            self.queued.remove(&task.url);
            if !self.visited.insert(task.url.clone()) {
                continue;
            }

            self.observer
                .log(&format!("📂 Abriendo carpeta: {}", task.url));
            let result = scanner.scan(driver, page, &task.url, self.observer);
            if result.is_failed() {
                stats.folders_failed += 1;
                continue;
            }
            stats.folders_scanned += 1;

            let mut added = 0;
            for folder in &result.subfolders {
                if self.visited.contains(&folder.url) || self.queued.contains(&folder.url) {
                    continue;
                }
                let local_dir = task.local_dir.join(folder_dir_name(folder));
                self.enqueue(FolderTask {
                    url: folder.url.clone(),
                    display_name: folder.display_name.clone(),
                    local_dir,
                });
                added += 1;
            }
            if added > 0 {
                self.observer
                    .log(&format!("   ✓ {} subcarpetas agregadas a la cola", added));
            }

            stats.files_found += result.files.len();
            for file in &result.files {
                self.observer
                    .file_discovered(&file.url, &file.display_name, &task.local_dir);
            }

            for file in &result.files {
                if self.is_cancelled() {
                    stats.was_cancelled = true;
                    return Ok(());
                }

                fs::create_dir_all(&task.local_dir)?;

                match fetcher.fetch(driver, file, &task.local_dir, self.observer)? {
                    FetchOutcome::Saved(path) => {
                        stats.files_downloaded += 1;
                        stats.bytes_downloaded += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    }
                    FetchOutcome::AlreadyPresent(_) => stats.files_present += 1,
                    FetchOutcome::Abandoned { .. } => stats.files_abandoned += 1,
                }
            }
        }

        Ok(())
    }

    fn enqueue(&mut self, task: FolderTask) {
        self.queued.insert(task.url.clone());
        self.queue.push_back(task);
    }
}

/// Local directory name for a subfolder link
///
/// Uses the cleaned label, then the last URL path segment, then a fixed name.
pub fn folder_dir_name(folder: &FolderLink) -> String {
    let label = clean_folder_label(&folder.display_name);
    if !label.is_empty() {
        return label;
    }

    Url::parse(&folder.url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .map(|segment| clean_folder_label(&sanitize_for_filesystem(&segment)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FOLDER.to_string())
}
