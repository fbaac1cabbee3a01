//! Name cleanup for remote folder and file labels
//!
//! The site renders link texts like `Resolva_prova_final.pdf` or
//! `Pasta Provas 2024`. These helpers turn them into readable names that are
//! safe to use as local file and directory names. Everything here is pure and
//! deterministic; the noise vocabularies match the target site's conventions
//! and are not meant to be general.
//!
//! # Examples
//!
//! ```
//! use drivecrawl::core::sanitizer::{clean_display_text, clean_folder_label};
//!
//! assert_eq!(clean_display_text("Resolva_prova_final.pdf"), "prova_final");
//! assert_eq!(clean_folder_label("Pasta Provas  2024"), "Provas 2024");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Extensions treated as "real" file extensions when naming downloads
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "zip", "rar", "7z", "mp4", "mkv",
    "avi", "mov", "mp3", "wav", "jpg", "jpeg", "png", "gif", "epub",
];

static ILLEGAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f]"#).expect("valid regex"));

static NON_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\-.]").expect("valid regex"));

static NOISE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(resolva|baixar|download|arquivo)[\s_\-]+").expect("valid regex")
});

static NOISE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(pdf|download|baixar|file|arquivo|video)\b").expect("valid regex")
});

static FOLDER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(subfolder|folder|pasta|dir)\b[\s_\-:]*").expect("valid regex")
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static TRAILING_MEDIA_EXT: Lazy<Regex> = Lazy::new(|| {
    let alternatives = MEDIA_EXTENSIONS.join("|");
    Regex::new(&format!(r"(?i)\.({})\s*$", alternatives)).expect("valid regex")
});

/// Replace characters that common filesystems reject with `_` and trim
///
/// Idempotent: applying it twice gives the same result as applying it once.
pub fn sanitize_for_filesystem(name: &str) -> String {
    ILLEGAL_CHARS.replace_all(name, "_").trim().to_string()
}

/// Turn a rendered file link text into a short human-readable name
///
/// Drops punctuation, the site's boilerplate prefixes, noise words such as
/// "pdf" or "download", and a trailing media extension. May return an empty
/// string when the text is nothing but noise; callers pick the fallback.
pub fn clean_display_text(name: &str) -> String {
    let text = NON_NAME_CHARS.replace_all(name, "");
    let text = TRAILING_MEDIA_EXT.replace(&text, "");

    let mut text = text.into_owned();
    while let Some(m) = NOISE_PREFIX.find(&text) {
        // A prefix that swallows the whole name is not a prefix
        if m.end() >= text.len() {
            break;
        }
        text = text[m.end()..].to_string();
    }

    let text = NOISE_WORDS.replace_all(&text, " ");
    let text = WHITESPACE_RUN.replace_all(&text, " ");

    text.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '-' || c == '_')
        .to_string()
}

/// Clean a folder link text into a local directory name
pub fn clean_folder_label(name: &str) -> String {
    let text = ILLEGAL_CHARS.replace_all(name, "");
    let text = FOLDER_PREFIX.replace(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");

    // "." and ".." would escape the mirrored tree
    let text = text.trim().trim_matches('.').trim();
    text.to_string()
}

/// Recognised media extension of a name, lowercased and without the dot
pub fn media_extension(name: &str) -> Option<String> {
    let ext = Path::new(name.trim()).extension()?.to_str()?.to_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Return `dir/file_name`, or `dir/stem (n).ext` with the first free `n`
///
/// Suffixes start at 1 and only grow, so repeated calls after each file is
/// written hand out strictly increasing numbers.
pub fn unique_save_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_extension(file_name);
    let mut n: u32 = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Split `name.ext` into ("name", Some("ext")); dotfiles have no extension
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => {
            (&file_name[..idx], Some(&file_name[idx + 1..]))
        }
        _ => (file_name, None),
    }
}
