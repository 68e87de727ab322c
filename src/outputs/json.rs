//! Snapshot persistence.
//!
//! The snapshot is serialized as pretty-printed JSON (two-space indent) and
//! written to a sibling temporary file that is then renamed over the target,
//! so readers never observe a half-written file.

use crate::models::Snapshot;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `snapshot` to `path`, replacing any previous file.
///
/// Parent directories are created as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display(), items = snapshot.items.len()))]
pub async fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut json = serde_json::to_string_pretty(snapshot)?;
    json.push('\n');

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let tmp = temp_path(path);
    fs::write(&tmp, json.as_bytes()).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        error!(error = %e, "Failed to move snapshot into place");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(bytes = json.len(), "Wrote snapshot");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}
