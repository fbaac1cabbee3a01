use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use super::crawl::{run_crawl, start_browser, CrawlRequest};
use crate::core::crawler::{ChannelObserver, CrawlEvent, CrawlObserver};
use crate::core::Config;
use crate::ui::crawl_tui::{run_crawl_app, CrawlApp, CrawlHeader, WorkerState};
use crate::ui::{format_elapsed, print_summary};

/// Run the crawl on a background thread behind the terminal dashboard
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = Config::load()?;
    let request = CrawlRequest::from_matches(matches, &config)?;

    fs::create_dir_all(&request.output_root).with_context(|| {
        format!("Failed to create output directory {:?}", request.output_root)
    })?;

    // The dashboard owns the screen, so logs go to a file outside the mirror
    let log_file = Config::get_log_path()?;
    crate::init_file_logging(&log_file)
        .with_context(|| format!("Failed to open log file {:?}", log_file))?;

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let header = CrawlHeader {
        root_url: request.root_url.clone(),
        output_root: request.output_root.clone(),
        max_attempts: request.settings.max_attempts,
        headless: request.browser.headless,
        log_file: Some(log_file.clone()),
    };

    let worker = {
        let request = request.clone();
        let cancel_flag = cancel_flag.clone();
        thread::Builder::new()
            .name("crawl-worker".to_string())
            .spawn(move || crawl_worker(request, tx, cancel_flag))
            .context("Failed to spawn crawl worker")?
    };

    let app = CrawlApp::new(header, cancel_flag.clone());
    let ui_result = run_crawl_app(app, rx);

    // Whatever happened to the UI, the worker must stop before the browser goes away
    cancel_flag.store(true, Ordering::Relaxed);
    let app = ui_result?;

    if app.is_running() {
        println!(
            "{}",
            "⏳ Esperando a que termine el archivo actual...".yellow()
        );
    }
    if worker.join().is_err() {
        log::error!("Crawl worker panicked");
    }

    match &app.state {
        WorkerState::Finished(stats) => {
            print_summary(stats, &request.output_root, &format_elapsed(app.started_at.elapsed()));
        }
        WorkerState::Failed(reason) => {
            anyhow::bail!("Crawl failed: {}", reason);
        }
        WorkerState::Gone => {
            anyhow::bail!("Crawl worker stopped unexpectedly, see {:?}", log_file);
        }
        WorkerState::Running | WorkerState::Stopping => {
            println!("{}", "🛑 Rastreo detenido".yellow().bold());
        }
    }

    Ok(())
}

/// Background thread body: owns the browser for the whole run
fn crawl_worker(request: CrawlRequest, tx: Sender<CrawlEvent>, cancel_flag: Arc<AtomicBool>) {
    let observer = ChannelObserver::new(tx);

    let (chrome, mut driver) = match start_browser(&request.browser) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Browser start-up failed: {:#}", e);
            observer.failed(format!("{:#}", e));
            return;
        }
    };
    observer.log("🌐 Navegador listo");

    let result = run_crawl(&request, &mut driver, &observer, cancel_flag);

    drop(driver);
    drop(chrome);

    match result {
        Ok(stats) => observer.finished(stats),
        Err(e) => {
            log::error!("{:#}", e);
            observer.failed(format!("{:#}", e));
        }
    }
}
