use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Events that can occur in the crawl dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlUiEvent {
    /// Stop the crawl and close the dashboard
    Quit,
    /// Ask the worker to stop after the current file
    Stop,
    /// Toggle help overlay
    ToggleHelp,
    /// Scroll the status table
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    /// Jump back to following the newest rows
    Follow,
    /// No action
    None,
}

impl CrawlUiEvent {
    pub fn from_key(key: KeyEvent) -> Self {
        if key.kind != KeyEventKind::Press {
            return CrawlUiEvent::None;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                CrawlUiEvent::Quit
            }
            KeyCode::Char('q') | KeyCode::Esc => CrawlUiEvent::Quit,
            KeyCode::Char('s') => CrawlUiEvent::Stop,
            KeyCode::Char('?') | KeyCode::Char('h') => CrawlUiEvent::ToggleHelp,
            KeyCode::Up | KeyCode::Char('k') => CrawlUiEvent::ScrollUp,
            KeyCode::Down | KeyCode::Char('j') => CrawlUiEvent::ScrollDown,
            KeyCode::PageUp => CrawlUiEvent::PageUp,
            KeyCode::PageDown => CrawlUiEvent::PageDown,
            KeyCode::End | KeyCode::Char('f') => CrawlUiEvent::Follow,
            _ => CrawlUiEvent::None,
        }
    }
}
