//! Cache file persistence
//!
//! The cache file is a JSON object keyed by chain digest. Records written by
//! older versions are `[image, comment]` pairs and are still accepted.

use super::{ImageCache, ImageInfo};
use crate::error::{DockenvError, DockenvResult};
use crate::hash::Digest;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Full(ImageInfo),
    Legacy(String, String),
}

impl From<StoredRecord> for ImageInfo {
    fn from(record: StoredRecord) -> Self {
        match record {
            StoredRecord::Full(info) => info,
            StoredRecord::Legacy(image, comment) => ImageInfo::new(image, comment),
        }
    }
}

/// Load the cache at `path`; a missing file is an empty cache
pub async fn load(path: &Path) -> DockenvResult<ImageCache> {
    if !path.exists() {
        debug!("No image cache at {}", path.display());
        return Ok(ImageCache::new());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| DockenvError::io(format!("reading image cache {}", path.display()), e))?;

    let corrupt = |reason: String| DockenvError::CacheCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let records: BTreeMap<String, StoredRecord> =
        serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

    let entries = records
        .into_iter()
        .map(|(key, record)| match Digest::parse(&key) {
            Some(digest) => Ok((digest, record.into())),
            None => Err(corrupt(format!("invalid digest key {:?}", key))),
        })
        .collect::<DockenvResult<_>>()?;
    Ok(ImageCache::from_entries(entries))
}

/// Write the cache to `path`, replacing it atomically
pub async fn save(cache: &ImageCache, path: &Path) -> DockenvResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DockenvError::io("creating image cache directory", e))?;
    }

    let content = serde_json::to_string_pretty(cache.entries())?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .await
        .map_err(|e| DockenvError::io(format!("writing image cache {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| DockenvError::io(format!("replacing image cache {}", path.display()), e))?;

    debug!("Saved {} cache entries to {}", cache.len(), path.display());
    Ok(())
}

/// An image cache loaded from disk for the duration of one run.
///
/// The only way in is [`StoredCache::with`], which saves the cache after the
/// work finishes whether it succeeded or not, so steps built before a
/// failure stay recorded.
#[derive(Debug)]
pub struct StoredCache {
    path: PathBuf,
    cache: ImageCache,
}

impl StoredCache {
    /// Load the cache at `path`, hand it to `work`, then save what comes back.
    ///
    /// `work` owns the cache while it runs and returns it together with its
    /// result. If both the work and the save failed, the work's error is
    /// returned and the save error is logged.
    pub async fn with<T, F, Fut>(path: &Path, work: F) -> DockenvResult<T>
    where
        F: FnOnce(ImageCache) -> Fut,
        Fut: Future<Output = (ImageCache, DockenvResult<T>)>,
    {
        let stored = Self::open(path).await?;
        let (cache, result) = work(stored.cache).await;
        Self {
            path: stored.path,
            cache,
        }
        .finish(result)
        .await
    }

    async fn open(path: &Path) -> DockenvResult<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            cache: load(path).await?,
        })
    }

    async fn finish<T>(self, result: DockenvResult<T>) -> DockenvResult<T> {
        let saved = save(&self.cache, &self.path).await;

        match (result, saved) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_err)) => {
                warn!("Failed to save image cache: {}", save_err);
                Err(e)
            }
        }
    }
}
