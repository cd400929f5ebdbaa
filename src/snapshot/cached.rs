//! Cache-aware steps
//!
//! The cache key for a step is its chain digest: the image the step is
//! applied to, combined with the digest of the step's own inputs. Because
//! each step's input image is the previous step's output, the key implicitly
//! covers every earlier step in the chain.

use super::Snapshotter;
use crate::cache::{ImageCache, ImageInfo};
use crate::error::{DockenvError, DockenvResult};
use crate::hash::{ContentHasher, Digest};
use crate::orchestration::Backend;
use tracing::{debug, info};

/// Result of applying a cached step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub digest: Digest,
    pub image: String,
    /// Whether the image came from the cache
    pub cached: bool,
}

/// A step whose output is looked up in, and recorded to, the image cache
#[derive(Debug, Clone)]
pub struct CachedSnapshotter {
    inner: Snapshotter,
    step_digest: Digest,
}

impl CachedSnapshotter {
    /// Wrap `inner`, hashing its inputs now.
    ///
    /// Steps whose effect lives outside the image are rejected.
    pub fn new(inner: Snapshotter) -> DockenvResult<Self> {
        if !inner.is_cacheable() {
            return Err(DockenvError::UncacheableStep(inner.comment()));
        }
        let step_digest = inner.digest()?;
        Ok(Self { inner, step_digest })
    }

    pub fn inner(&self) -> &Snapshotter {
        &self.inner
    }

    pub fn step_digest(&self) -> &Digest {
        &self.step_digest
    }

    /// Cache key for applying this step to `image`
    pub fn chain_digest(&self, image: &str) -> Digest {
        let mut hasher = ContentHasher::new();
        hasher.frame_str(image);
        hasher.digest(&self.step_digest);
        hasher.finish()
    }

    /// Return the cached image for `image`, building and recording it on a miss.
    ///
    /// `parent` is the chain digest of the previous cached step.
    pub async fn apply(
        &self,
        backend: Backend<'_>,
        cache: &mut ImageCache,
        image: &str,
        parent: Option<&Digest>,
    ) -> DockenvResult<StepOutcome> {
        let digest = self.chain_digest(image);

        if let Some(info) = cache.get(&digest) {
            debug!("Cache hit {} -> {}", digest.short(), info.image);
            return Ok(StepOutcome {
                image: info.image.clone(),
                digest,
                cached: true,
            });
        }

        let comment = self.inner.comment();
        info!("Building {} ({})", comment, digest.short());
        let built = self.inner.apply(backend, image).await?;

        cache.insert(
            digest.clone(),
            ImageInfo::new(built.clone(), comment)
                .with_parent(parent.cloned(), image)
                .stamped(),
        )?;

        Ok(StepOutcome {
            digest,
            image: built,
            cached: false,
        })
    }
}
