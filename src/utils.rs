//! Utility functions for identifiers, log formatting and file system checks.

use sha1::{Digest, Sha1};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Content-addressed article id: SHA-1 hex digest of `key`.
///
/// `key` is the article URL, or its title when the entry has no link, so
/// identical input always yields identical ids.
pub fn stable_id(key: &str) -> String {
    hex::encode(Sha1::digest(key.as_bytes()))
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped characters appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} chars)", &s[..idx], s[idx..].chars().count()),
    }
}

/// Ensure the directory that will hold `output_path` exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
/// Called before any network work so a bad output path fails fast.
#[instrument(level = "info", skip_all, fields(path = %output_path.display()))]
pub async fn ensure_writable_parent(output_path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = dir.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(dir = %dir.display(), "Output directory is writable");
    Ok(())
}
