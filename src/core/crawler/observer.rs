//! Progress reporting from the crawl worker
//!
//! Observers only watch: nothing they do feeds back into the crawl, which
//! behaves the same with [`NoopObserver`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::CrawlStats;

/// Per-file status shown in the dashboard's status table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Queued,
    /// Attempt number in progress
    Downloading(u32),
    Done,
    /// Attempt number that failed
    Error(u32),
    /// Abandoned after exhausting attempts
    Skipped,
    /// Already on disk from an earlier run
    Present,
}

impl FileStatus {
    /// No further updates will follow for this file
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Skipped | FileStatus::Present)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Queued => write!(f, "en cola"),
            FileStatus::Downloading(n) => write!(f, "descargando (intento {})", n),
            FileStatus::Done => write!(f, "listo"),
            FileStatus::Error(n) => write!(f, "error (intento {})", n),
            FileStatus::Skipped => write!(f, "omitido"),
            FileStatus::Present => write!(f, "ya existe"),
        }
    }
}

/// Receives log lines and status changes from the crawl worker
pub trait CrawlObserver {
    fn log(&self, line: &str);

    fn set_status(&self, key: &str, status: FileStatus);

    /// A file link was found; `key` identifies it in later `set_status` calls
    fn file_discovered(&self, key: &str, _display_name: &str, _local_dir: &Path) {
        self.set_status(key, FileStatus::Queued);
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {
    fn log(&self, _line: &str) {}

    fn set_status(&self, _key: &str, _status: FileStatus) {}
}

/// Messages sent from the worker thread to the UI thread
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Log(String),
    Discovered {
        key: String,
        display_name: String,
        local_dir: PathBuf,
    },
    Status {
        key: String,
        status: FileStatus,
    },
    Finished(CrawlStats),
    Failed(String),
}

/// Forwards everything over a one-way channel
///
/// Send errors are ignored: a closed receiver only means nobody is watching.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<CrawlEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<CrawlEvent>) -> Self {
        Self { tx }
    }

    pub fn finished(&self, stats: CrawlStats) {
        let _ = self.tx.send(CrawlEvent::Finished(stats));
    }

    pub fn failed(&self, reason: String) {
        let _ = self.tx.send(CrawlEvent::Failed(reason));
    }
}

impl CrawlObserver for ChannelObserver {
    fn log(&self, line: &str) {
        let _ = self.tx.send(CrawlEvent::Log(line.to_string()));
    }

    fn set_status(&self, key: &str, status: FileStatus) {
        let _ = self.tx.send(CrawlEvent::Status {
            key: key.to_string(),
            status,
        });
    }

    fn file_discovered(&self, key: &str, display_name: &str, local_dir: &Path) {
        let _ = self.tx.send(CrawlEvent::Discovered {
            key: key.to_string(),
            display_name: display_name.to_string(),
            local_dir: local_dir.to_path_buf(),
        });
    }
}
