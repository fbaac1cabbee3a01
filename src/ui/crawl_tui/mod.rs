//! Terminal dashboard for a running crawl.
//!
//! Shows the run settings, a per-file status table and the log, using ratatui.

mod app;
mod event_handler;
mod render;
mod widgets;

pub use app::{run_crawl_app, CrawlApp, CrawlHeader, FileRow, WorkerState};
pub use event_handler::CrawlUiEvent;
