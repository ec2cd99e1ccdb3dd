//! On-disk tile artifacts.
//!
//! Tiles for a region are written under `<root>/<region>.part/` while the
//! download runs and renamed to `<root>/<region>/` when it completes, so a
//! region directory without the suffix is always complete.

use crate::config::PathsConfig;
use crate::error::{OffgridError, Result};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Root directory holding every region's tiles.
#[derive(Debug, Clone)]
pub struct TileArtifactStore {
    root: PathBuf,
}

impl TileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a completed region.
    pub fn region_dir(&self, region_id: &str) -> PathBuf {
        self.root.join(dir_name(region_id))
    }

    fn partial_dir(&self, region_id: &str) -> PathBuf {
        self.root.join(format!(
            "{}{}",
            dir_name(region_id),
            PathsConfig::PARTIAL_SUFFIX
        ))
    }

    /// Start writing a region, discarding leftovers from an earlier attempt.
    pub async fn begin(&self, region_id: &str) -> Result<PartialArtifacts> {
        let partial_dir = self.partial_dir(region_id);
        remove_dir_if_present(&partial_dir).await?;
        tokio::fs::create_dir_all(&partial_dir)
            .await
            .map_err(|e| OffgridError::io_with_path(e, &partial_dir))?;

        Ok(PartialArtifacts {
            partial_dir,
            final_dir: self.region_dir(region_id),
            bytes_written: 0,
        })
    }

    /// Delete a region's completed and partial directories. Returns true if
    /// anything was removed.
    pub async fn remove(&self, region_id: &str) -> Result<bool> {
        let removed_final = remove_dir_if_present(&self.region_dir(region_id)).await?;
        let removed_partial = remove_dir_if_present(&self.partial_dir(region_id)).await?;
        Ok(removed_final || removed_partial)
    }

    /// Size on disk of a completed region, if present.
    pub async fn size_of(&self, region_id: &str) -> Result<Option<u64>> {
        let dir = self.region_dir(region_id);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(None);
        }
        dir_size(&dir).await.map(Some)
    }
}

/// Tiles of an in-progress download.
#[derive(Debug)]
pub struct PartialArtifacts {
    partial_dir: PathBuf,
    final_dir: PathBuf,
    bytes_written: u64,
}

impl PartialArtifacts {
    /// Write one tile at the relative `key` (e.g. `14/8185/5449`).
    ///
    /// Empty payloads are skipped.
    pub async fn write(&mut self, key: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let path = self.partial_dir.join(checked_key(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OffgridError::io_with_path(e, parent))?;
        }

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| OffgridError::io_with_path(e, &path))?;
        file.write_all(data)
            .await
            .map_err(|e| OffgridError::io_with_path(e, &path))?;
        file.flush()
            .await
            .map_err(|e| OffgridError::io_with_path(e, &path))?;

        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Move the tiles into place. Returns the number of bytes committed.
    pub async fn commit(self) -> Result<u64> {
        remove_dir_if_present(&self.final_dir).await?;
        if let Err(e) = tokio::fs::rename(&self.partial_dir, &self.final_dir).await {
            let _ = tokio::fs::remove_dir_all(&self.partial_dir).await;
            return Err(OffgridError::io_with_path(e, &self.final_dir));
        }
        debug!(
            "Committed {} bytes to {}",
            self.bytes_written,
            self.final_dir.display()
        );
        Ok(self.bytes_written)
    }

    /// Throw away everything written so far.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.partial_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to discard partial tiles at {}: {}",
                    self.partial_dir.display(),
                    e
                );
            }
        }
    }
}

/// File-system-safe directory name for a region id.
fn dir_name(region_id: &str) -> String {
    let mut name = String::with_capacity(region_id.len());
    for byte in region_id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => name.push(byte as char),
            other => name.push_str(&format!("%{:02X}", other)),
        }
    }
    name
}

/// Reject keys that would escape the region directory.
fn checked_key(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if safe {
        Ok(path)
    } else {
        Err(OffgridError::invalid(
            "tile_key",
            format!("{:?} is not a relative tile path", key),
        ))
    }
}

async fn remove_dir_if_present(dir: &Path) -> Result<bool> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(OffgridError::io_with_path(e, dir)),
    }
}

async fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .map_err(|e| OffgridError::io_with_path(e, &current))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OffgridError::io_with_path(e, &current))?
        {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}
