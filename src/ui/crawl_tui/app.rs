use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::core::crawler::{CrawlEvent, CrawlStats, FileStatus};
use crate::ui::formatters::format_time;

use super::event_handler::CrawlUiEvent;
use super::render::render_ui;

const MAX_LOG_LINES: usize = 500;
const PAGE_ROWS: usize = 10;

/// Run settings shown in the dashboard header
#[derive(Debug, Clone)]
pub struct CrawlHeader {
    pub root_url: String,
    pub output_root: PathBuf,
    pub max_attempts: u32,
    pub headless: bool,
    pub log_file: Option<PathBuf>,
}

/// One row of the status table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub key: String,
    pub display_name: String,
    pub local_dir: PathBuf,
    pub status: FileStatus,
}

/// Where the background crawl stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopping,
    Finished(CrawlStats),
    Failed(String),
    /// Channel closed without a final message
    Gone,
}

/// Crawl dashboard state
pub struct CrawlApp {
    pub header: CrawlHeader,
    pub rows: Vec<FileRow>,
    row_index: HashMap<String, usize>,
    pub logs: VecDeque<String>,
    pub state: WorkerState,
    pub started_at: Instant,
    pub should_quit: bool,
    pub show_help: bool,
    /// First visible row; `None` follows the newest rows
    pub scroll: Option<usize>,
    pub tick_rate: Duration,
    cancel_flag: Arc<AtomicBool>,
}

impl CrawlApp {
    pub fn new(header: CrawlHeader, cancel_flag: Arc<AtomicBool>) -> Self {
        Self {
            header,
            rows: Vec::new(),
            row_index: HashMap::new(),
            logs: VecDeque::new(),
            state: WorkerState::Running,
            started_at: Instant::now(),
            should_quit: false,
            show_help: false,
            scroll: None,
            tick_rate: Duration::from_millis(200),
            cancel_flag,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, WorkerState::Running | WorkerState::Stopping)
    }

    /// Apply everything currently waiting in the channel
    pub fn drain(&mut self, rx: &Receiver<CrawlEvent>) {
        loop {
            match rx.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.is_running() {
                        self.state = WorkerState::Gone;
                    }
                    break;
                }
            }
        }
    }

    pub fn apply(&mut self, event: CrawlEvent) {
        match event {
            CrawlEvent::Log(line) => self.push_log(line),
            CrawlEvent::Discovered {
                key,
                display_name,
                local_dir,
            } => {
                if let Some(&i) = self.row_index.get(&key) {
                    self.rows[i].status = FileStatus::Queued;
                } else {
                    self.row_index.insert(key.clone(), self.rows.len());
                    self.rows.push(FileRow {
                        key,
                        display_name,
                        local_dir,
                        status: FileStatus::Queued,
                    });
                }
            }
            CrawlEvent::Status { key, status } => match self.row_index.get(&key) {
                Some(&i) => self.rows[i].status = status,
                None => {
                    self.row_index.insert(key.clone(), self.rows.len());
                    self.rows.push(FileRow {
                        display_name: key.clone(),
                        key,
                        local_dir: PathBuf::new(),
                        status,
                    });
                }
            },
            CrawlEvent::Finished(stats) => {
                self.push_log(if stats.was_cancelled {
                    "🛑 Rastreo detenido. Pulsa q para salir".to_string()
                } else {
                    "✅ Rastreo completado. Pulsa q para salir".to_string()
                });
                self.state = WorkerState::Finished(stats);
            }
            CrawlEvent::Failed(reason) => {
                self.push_log(format!("❌ Error fatal: {}", reason));
                self.state = WorkerState::Failed(reason);
            }
        }
    }

    fn push_log(&mut self, line: String) {
        self.logs
            .push_back(format!("{} {}", format_time(SystemTime::now()), line));
        while self.logs.len() > MAX_LOG_LINES {
            self.logs.pop_front();
        }
    }

    pub fn handle_event(&mut self, event: CrawlUiEvent) {
        match event {
            CrawlUiEvent::Quit => {
                self.request_stop();
                self.should_quit = true;
            }
            CrawlUiEvent::Stop => self.request_stop(),
            CrawlUiEvent::ToggleHelp => self.show_help = !self.show_help,
            CrawlUiEvent::ScrollUp => self.scroll_by(-1),
            CrawlUiEvent::ScrollDown => self.scroll_by(1),
            CrawlUiEvent::PageUp => self.scroll_by(-(PAGE_ROWS as isize)),
            CrawlUiEvent::PageDown => self.scroll_by(PAGE_ROWS as isize),
            CrawlUiEvent::Follow => self.scroll = None,
            CrawlUiEvent::None => {}
        }
    }

    fn request_stop(&mut self) {
        if self.cancel_flag.swap(true, Ordering::Relaxed) {
            return;
        }
        if self.state == WorkerState::Running {
            self.state = WorkerState::Stopping;
            self.push_log("⏳ Deteniendo tras el archivo actual...".to_string());
        }
    }

    fn scroll_by(&mut self, delta: isize) {
        let last = self.rows.len().saturating_sub(1);
        let current = self.scroll.unwrap_or(last) as isize;
        let next = (current + delta).clamp(0, last as isize) as usize;
        self.scroll = if next >= last { None } else { Some(next) };
    }

    /// Files per status bucket: (done, present, in progress, skipped)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        self.rows.iter().fold((0, 0, 0, 0), |mut acc, row| {
            match row.status {
                FileStatus::Done => acc.0 += 1,
                FileStatus::Present => acc.1 += 1,
                FileStatus::Downloading(_) | FileStatus::Error(_) => acc.2 += 1,
                FileStatus::Skipped => acc.3 += 1,
                FileStatus::Queued => {}
            }
            acc
        })
    }
}

/// Run the dashboard until the user quits
///
/// The channel is drained every tick; the cancel flag is set on quit.
pub fn run_crawl_app(mut app: CrawlApp, rx: Receiver<CrawlEvent>) -> Result<CrawlApp> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = event_loop(&mut terminal, &mut app, &rx);

    // Restore terminal even when the loop failed
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result.map(|_| app)
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut CrawlApp,
    rx: &Receiver<CrawlEvent>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render_ui(frame, app))?;

        let timeout = app
            .tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("Event poll failed")? {
            if let Event::Key(key) = event::read().context("Event read failed")? {
                app.handle_event(CrawlUiEvent::from_key(key));
            }
        }

        if app.should_quit {
            return Ok(());
        }

        if last_tick.elapsed() >= app.tick_rate {
            app.drain(rx);
            last_tick = Instant::now();
        }
    }
}
