// Core business logic module

pub mod browser;
pub mod config;
pub mod crawler;
pub mod sanitizer;
pub mod validation;

// Re-export commonly used items
pub use browser::{ChromeDriver, ChromeInstance, DriverError, PageDriver};
pub use config::{Config, CrawlSettings, JitterRange};
pub use crawler::{CrawlObserver, CrawlStats, Crawler, FileStatus};
