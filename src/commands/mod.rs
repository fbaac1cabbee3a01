// Command handlers module
pub mod completions;
pub mod config;
pub mod crawl;
pub mod version;
pub mod watch;

// Re-exports for cleaner imports
pub use crawl::execute as crawl;
pub use version::execute as version;
pub use watch::execute as watch;
