//! Text helpers shared by the normalizer, rewriter and trend scorer.
//!
//! This module provides:
//! - Markup stripping and whitespace collapsing for API-supplied bodies
//! - Word counting with the same notion of a "word" everywhere in the pipeline
//! - String truncation for logging large payloads
//! - File system validation for the record store location

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}[\p{L}\p{M}'-]*").unwrap());

/// Remove anything that looks like an HTML/XML tag.
pub fn strip_tags(s: &str) -> String {
    RE_TAGS.replace_all(s, " ").into_owned()
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Count words in `s` after stripping markup.
///
/// A word is a run of letters in any script (combining marks included),
/// optionally continued by apostrophes or hyphens. Numbers and punctuation
/// on their own do not count.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(word_count("<b>Hello</b> big world"), 3);
/// assert_eq!(word_count("Current price: $42"), 2);
/// ```
pub fn word_count(s: &str) -> usize {
    RE_WORD.find_iter(&strip_tags(s)).count()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a char boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure the directory that will hold `file_path` exists and is writable.
///
/// Creates the parent directory if needed, then performs a write test by
/// creating and immediately deleting a probe file next to the target.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %file_path.display()))]
pub async fn ensure_parent_writable(file_path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match file_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    let probe_path = dir.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Store directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
