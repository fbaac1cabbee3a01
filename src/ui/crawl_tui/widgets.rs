use ratatui::style::Color;

use crate::core::crawler::FileStatus;

/// Color of a status cell
pub fn status_color(status: FileStatus) -> Color {
    match status {
        FileStatus::Queued => Color::DarkGray,
        FileStatus::Downloading(_) => Color::Cyan,
        FileStatus::Done => Color::Green,
        FileStatus::Error(_) => Color::LightYellow,
        FileStatus::Skipped => Color::LightRed,
        FileStatus::Present => Color::Blue,
    }
}
