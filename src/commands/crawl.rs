use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::core::browser::{BrowserOptions, ChromeDriver, ChromeInstance};
use crate::core::{validation, Config, CrawlObserver, CrawlSettings, CrawlStats, Crawler};
use crate::ui::{format_elapsed, print_summary, ConsoleObserver};

/// Everything a crawl run needs, resolved from flags and the saved config
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub root_url: String,
    pub output_root: PathBuf,
    pub settings: CrawlSettings,
    pub browser: BrowserOptions,
}

impl CrawlRequest {
    /// Flags override the saved config for this run only
    pub fn from_matches(matches: &ArgMatches, config: &Config) -> Result<Self> {
        let url = matches
            .get_one::<String>("url")
            .context("URL argument is required")?;
        let root_url = validation::validate_web_url(url)?.to_string();

        let output_flag = matches.get_one::<String>("output");
        if let Some(dir) = output_flag {
            validation::validate_directory_path(dir)?;
        }
        let output_root = config.resolve_output_root(output_flag.map(String::as_str));

        let mut settings = config.settings.clone();
        if let Some(&attempts) = matches.get_one::<u32>("attempts") {
            anyhow::ensure!(attempts >= 1, "--attempts must be at least 1");
            settings.max_attempts = attempts;
        }
        if matches.get_flag("no-skip-existing") {
            settings.skip_existing = false;
        }

        let mut browser = BrowserOptions {
            headless: matches.get_flag("headless"),
            executable: matches.get_one::<String>("browser").map(PathBuf::from),
            ..BrowserOptions::default()
        };
        if let Some(&port) = matches.get_one::<u16>("port") {
            browser.port = port;
        }

        Ok(Self {
            root_url,
            output_root,
            settings,
            browser,
        })
    }
}

/// Start (or attach to) the browser and open a driver on it
///
/// The driver must be dropped before the instance.
pub fn start_browser(options: &BrowserOptions) -> Result<(ChromeInstance, ChromeDriver)> {
    let chrome = ChromeInstance::ensure_running(options).context("Failed to start the browser")?;
    let driver = ChromeDriver::connect(chrome.ws_url(), chrome.download_dir())
        .context("Failed to connect to the browser over CDP")?;
    Ok((chrome, driver))
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = Config::load()?;
    let request = CrawlRequest::from_matches(matches, &config)?;

    // Create shared cancellation flag
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_flag_clone = cancel_flag.clone();

    // Setup Ctrl+C handler
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "Cancelación solicitada...".yellow().bold());
        println!("{}", "Se detendrá al terminar el archivo actual".dimmed());
        cancel_flag_clone.store(true, Ordering::Relaxed);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    println!("{}", "🕷️  Iniciando rastreo...".cyan().bold());
    println!("{}", "Pulsa Ctrl+C para detener de forma segura".dimmed());
    println!();

    let (chrome, mut driver) = start_browser(&request.browser)?;
    if chrome.was_already_running() {
        println!("{}", "Usando el navegador ya abierto".dimmed());
    }

    let started = Instant::now();
    let observer = ConsoleObserver::new();
    let stats = run_crawl(&request, &mut driver, &observer, cancel_flag);

    drop(driver);
    drop(chrome);

    let stats = stats?;
    print_summary(&stats, &request.output_root, &format_elapsed(started.elapsed()));
    Ok(())
}

/// Crawl with an already connected driver
pub fn run_crawl(
    request: &CrawlRequest,
    driver: &mut ChromeDriver,
    observer: &dyn CrawlObserver,
    cancel_flag: Arc<AtomicBool>,
) -> Result<CrawlStats> {
    let mut crawler = Crawler::new(&request.settings, observer).with_cancel_flag(cancel_flag);
    crawler
        .run(driver, &request.root_url, &request.output_root)
        .with_context(|| format!("Crawl of {} stopped", request.root_url))
}
