//! Plain console reporting for `drivecrawl crawl`

use colored::Colorize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use crate::core::crawler::{CrawlObserver, CrawlStats, FileStatus};
use crate::ui::formatters::{format_size, format_time, truncate};

const NAME_WIDTH: usize = 60;

/// Prints log lines and status changes as they happen
///
/// Remembers the display name of each discovered file so status lines show
/// names instead of URLs.
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    names: RefCell<HashMap<String, String>>,
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print the `en cola` line of every discovered file
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn name_for(&self, key: &str) -> String {
        self.names
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

impl CrawlObserver for ConsoleObserver {
    fn log(&self, line: &str) {
        println!("{} {}", format_time(SystemTime::now()).dimmed(), line);
    }

    fn set_status(&self, key: &str, status: FileStatus) {
        if status == FileStatus::Queued && !self.verbose {
            return;
        }

        let name = truncate(&self.name_for(key), NAME_WIDTH);
        let label = format!("[{}]", status);
        let label = match status {
            FileStatus::Queued => label.dimmed(),
            FileStatus::Downloading(_) => label.cyan(),
            FileStatus::Done => label.green().bold(),
            FileStatus::Error(_) => label.yellow(),
            FileStatus::Skipped => label.red().bold(),
            FileStatus::Present => label.blue(),
        };
        println!("{} {} {}", format_time(SystemTime::now()).dimmed(), label, name);
    }

    fn file_discovered(&self, key: &str, display_name: &str, _local_dir: &Path) {
        let name = if display_name.trim().is_empty() {
            key
        } else {
            display_name
        };
        self.names
            .borrow_mut()
            .insert(key.to_string(), name.to_string());
        self.set_status(key, FileStatus::Queued);
    }
}

/// Print the end-of-run summary
pub fn print_summary(stats: &CrawlStats, output_root: &Path, elapsed: &str) {
    println!();
    if stats.was_cancelled {
        println!("{}", "🛑 Rastreo cancelado".yellow().bold());
    } else {
        println!("{}", "✅ Rastreo completado".green().bold());
    }
    println!("{}", "─".repeat(40).dimmed());
    println!("  Carpetas leídas:     {}", stats.folders_scanned.to_string().cyan());
    if stats.folders_failed > 0 {
        println!("  Carpetas con error:  {}", stats.folders_failed.to_string().red());
    }
    println!("  Archivos encontrados: {}", stats.files_found.to_string().cyan());
    println!(
        "  Descargados:         {} ({})",
        stats.files_downloaded.to_string().green(),
        format_size(stats.bytes_downloaded)
    );
    println!("  Ya existían:         {}", stats.files_present.to_string().blue());
    if stats.files_abandoned > 0 {
        println!("  Omitidos:            {}", stats.files_abandoned.to_string().red());
    }
    println!("  Tiempo:              {}", elapsed);
    println!("  Destino:             {}", output_root.display().to_string().white().bold());
}
