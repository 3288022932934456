//! JSON Lines primitives.
//!
//! Every record is one self-contained line, so a torn final write can only
//! ever damage the line being written. Readers skip lines they cannot parse.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::StoreError;

/// Creates the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::DirectoryCreationFailed(format!(
                    "Failed to create directory {:?}: {}",
                    parent, e
                ))
            })?;
        }
    }
    Ok(())
}

/// Appends one record as a single line write.
pub async fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    ensure_parent(path).await?;

    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// Reads every parseable record; a missing file reads as empty.
pub async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping malformed record"
            ),
        }
    }
    Ok(records)
}

/// Replaces the file with `records`.
///
/// Written to a temporary sibling and renamed over the target, so readers see
/// either the old or the new contents.
pub async fn rewrite_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    ensure_parent(path).await?;

    let mut buffer = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buffer, record)?;
        buffer.push(b'\n');
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let rewrite_failed = |reason: String| StoreError::RewriteFailed {
        path: path.display().to_string(),
        reason,
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| rewrite_failed(e.to_string()))?;
    tmp.write_all(&buffer)
        .and_then(|_| tmp.flush())
        .map_err(|e| rewrite_failed(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| rewrite_failed(e.error.to_string()))?;
    Ok(())
}
