// UI and formatting module

pub mod console;
pub mod crawl_tui;
pub mod formatters;
pub mod prompts;

// Re-export commonly used items for cleaner imports
pub use console::{print_summary, ConsoleObserver};
pub use formatters::{format_elapsed, format_size, format_time, truncate};
pub use prompts::{confirm, dimmed, success, warn};
