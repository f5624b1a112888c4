//! Durable on-disk store for resized artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, ImageRequest};
use crate::domain::errors::{PipelineError, PipelineResult};

/// Number of fingerprint characters embedded in artifact names.
const KEY_PREFIX_LEN: usize = 16;

/// Longest file stem kept from the source URL.
const MAX_STEM_LEN: usize = 96;

/// Writes resized images under a root directory, one file per fingerprint.
///
/// Files are written to a temporary sibling and renamed into place, so a
/// reader sees either no file or the complete artifact.
#[derive(Debug)]
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns `StorageFailed` if the directory cannot be created.
    pub async fn new(root: PathBuf) -> PipelineResult<Self> {
        fs::create_dir_all(&root).await.map_err(|e| {
            PipelineError::storage(format!(
                "failed to create image dir {}: {e}",
                root.display()
            ))
        })?;
        debug!(root = %root.display(), "Opened image store");
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact for `request`, e.g. `cat_100x50_3f2a9c0d1b7e4a55.jpg`.
    #[must_use]
    pub fn artifact_path(&self, request: &ImageRequest, key: &CacheKey) -> PathBuf {
        let name = format!(
            "{}_{}x{}_{}.{}",
            sanitize_stem(request.stem()),
            request.width(),
            request.height(),
            key.short(KEY_PREFIX_LEN),
            request.extension()
        );
        self.root.join(name)
    }

    /// Reads an artifact. A missing file is `Ok(None)`.
    ///
    /// # Errors
    /// Returns `StorageFailed` for any other I/O error.
    pub async fn read(&self, path: &Path) -> PipelineResult<Option<Bytes>> {
        match fs::read(path).await {
            Ok(bytes) => {
                trace!(path = %path.display(), size = bytes.len(), "Read artifact");
                Ok(Some(Bytes::from(bytes)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Atomically writes `bytes` to `path` and returns the size written.
    ///
    /// # Errors
    /// Returns `StorageFailed` if the file cannot be written or moved into
    /// place; nothing is left at `path` in that case.
    pub async fn write(&self, path: &Path, bytes: Bytes) -> PipelineResult<u64> {
        let target = path.to_path_buf();
        let dir = target.parent().unwrap_or(&self.root).to_path_buf();

        let size = tokio::task::spawn_blocking(move || -> std::io::Result<u64> {
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&bytes)?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(bytes.len() as u64)
        })
        .await
        .map_err(|e| PipelineError::storage(format!("write task failed: {e}")))?
        .map_err(|e| PipelineError::storage(format!("failed to write {}: {e}", path.display())))?;

        debug!(path = %path.display(), size, "Stored artifact");
        Ok(size)
    }
}

/// Keeps `[A-Za-z0-9._-]`, replaces anything else with `_` and caps the length.
fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .take(MAX_STEM_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
