//! In-memory image cache

use crate::error::{DockenvError, DockenvResult};
use crate::hash::Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What was built for one chain digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Image handle returned by the runtime
    pub image: String,

    /// Description of the step that produced the image
    pub comment: String,

    /// Chain digest of the previous cached step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Digest>,

    /// Image the step was applied to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_image: Option<String>,

    /// When the image was committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ImageInfo {
    pub fn new(image: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            comment: comment.into(),
            parent: None,
            parent_image: None,
            timestamp: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<Digest>, parent_image: impl Into<String>) -> Self {
        self.parent = parent;
        self.parent_image = Some(parent_image.into());
        self
    }

    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }

    /// Whether two records describe the same build, ignoring comment and time
    fn same_build(&self, other: &ImageInfo) -> bool {
        self.image == other.image
            && self.parent == other.parent
            && self.parent_image == other.parent_image
    }
}

/// Chain digest -> image, ordered by digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCache {
    entries: BTreeMap<Digest, ImageInfo>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &Digest) -> Option<&ImageInfo> {
        self.entries.get(digest)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.contains_key(digest)
    }

    /// Record `info` under `digest`.
    ///
    /// Re-inserting the same build is a no-op; a different image under an
    /// existing digest is a `CacheConflict` and leaves the entry unchanged.
    pub fn insert(&mut self, digest: Digest, info: ImageInfo) -> DockenvResult<()> {
        if let Some(existing) = self.entries.get(&digest) {
            if existing.same_build(&info) {
                return Ok(());
            }
            return Err(DockenvError::CacheConflict {
                digest: digest.to_string(),
                existing: existing.image.clone(),
                new: info.image,
            });
        }
        self.entries.insert(digest, info);
        Ok(())
    }

    /// Evict an entry; used by garbage collection once the image is gone
    pub fn remove(&mut self, digest: &Digest) -> Option<ImageInfo> {
        self.entries.remove(digest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &ImageInfo)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn from_entries(entries: BTreeMap<Digest, ImageInfo>) -> Self {
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &BTreeMap<Digest, ImageInfo> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(s: &str) -> Digest {
        Digest::new(s)
    }

    #[test]
    fn insert_and_get() {
        let mut cache = ImageCache::new();
        cache
            .insert(digest("aa"), ImageInfo::new("img1", "init"))
            .unwrap();

        assert!(cache.contains(&digest("aa")));
        assert_eq!(cache.get(&digest("aa")).unwrap().image, "img1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn identical_insert_is_noop() {
        let mut cache = ImageCache::new();
        let info = ImageInfo::new("img1", "init").with_parent(None, "ubuntu:latest");
        cache.insert(digest("aa"), info.clone().stamped()).unwrap();
        cache.insert(digest("aa"), info.stamped()).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn divergent_insert_is_rejected() {
        let mut cache = ImageCache::new();
        cache
            .insert(digest("aa"), ImageInfo::new("img1", "init"))
            .unwrap();

        let err = cache
            .insert(digest("aa"), ImageInfo::new("img2", "init"))
            .unwrap_err();

        match err {
            DockenvError::CacheConflict { existing, new, .. } => {
                assert_eq!(existing, "img1");
                assert_eq!(new, "img2");
            }
            other => panic!("expected CacheConflict, got {other:?}"),
        }
        assert_eq!(cache.get(&digest("aa")).unwrap().image, "img1");
    }

    #[test]
    fn remove_evicts() {
        let mut cache = ImageCache::new();
        cache
            .insert(digest("aa"), ImageInfo::new("img1", "init"))
            .unwrap();
        assert_eq!(cache.remove(&digest("aa")).unwrap().image, "img1");
        assert!(cache.is_empty());
        assert!(cache.remove(&digest("aa")).is_none());
    }
}
