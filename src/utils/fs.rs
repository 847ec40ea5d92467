//! Atomic file writes.
//!
//! Generated files are written to a temporary file in the target directory,
//! synced, then renamed over the destination, so a reader never observes a
//! partially written file.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of writing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The file did not exist or had different content
    Written,
    /// The file already held exactly this content and was left alone
    Unchanged,
}

/// Create `path` and all missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Atomically replace `path` with `content`.
///
/// Parent directories are created as needed. When the file already holds
/// `content` it is not rewritten, so its modification time is preserved.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, the temporary
/// file cannot be written or synced, or the final rename fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<WriteStatus> {
    if fs::read(path).is_ok_and(|existing| existing == content) {
        return Ok(WriteStatus::Unchanged);
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write to temp file for: {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;
    temp.persist(path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(WriteStatus::Written)
}

/// Write several files concurrently, each atomically.
///
/// All writes are attempted; if any fails the error lists every failure.
/// Statuses are returned in input order.
pub async fn atomic_write_multiple(files: &[(PathBuf, Vec<u8>)]) -> Result<Vec<WriteStatus>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let tasks = files.iter().map(|(path, content)| {
        let path = path.clone();
        let content = content.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
    });
    let results = try_join_all(tasks).await.context("Failed to join atomic write tasks")?;

    let mut statuses = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(status) => statuses.push(status),
            Err(e) => errors.push(format!("  {e:#}")),
        }
    }

    if !errors.is_empty() {
        return Err(anyhow::anyhow!("Failed to write {} files:\n{}", errors.len(), errors.join("\n")));
    }
    Ok(statuses)
}
