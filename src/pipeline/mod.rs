//! Build pipeline and garbage collection
//!
//! A pipeline is a base image plus an ordered list of steps. Building folds
//! the steps over the base image, consulting the image cache at each one,
//! and reports the chain digests it went through. Right after a build that
//! trace is the live set; on its own, garbage collection replays the fold
//! against the cache alone. Every other cached image is removed.

mod discover;

pub use discover::{discover_scripts, TargetPipeline};

use crate::cache::{ImageCache, ImageInfo};
use crate::error::DockenvResult;
use crate::hash::Digest;
use crate::orchestration::{Backend, ContainerRuntime};
use crate::snapshot::{CachedSnapshotter, DevelopSnapshotter, Snapshotter, StepOutcome};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// One pipeline step as seen by the driver
#[derive(Debug, Clone)]
pub enum Step {
    Cached(CachedSnapshotter),
    /// Never cached itself; its build/install fallback is
    Develop {
        develop: DevelopSnapshotter,
        fallback: CachedSnapshotter,
    },
}

impl Step {
    fn from_snapshotter(snapshotter: Snapshotter) -> DockenvResult<Self> {
        match snapshotter {
            Snapshotter::Develop(develop) => {
                let fallback = CachedSnapshotter::new(develop.fallback().clone().into())?;
                Ok(Self::Develop { develop, fallback })
            }
            other => Ok(Self::Cached(CachedSnapshotter::new(other)?)),
        }
    }

    pub fn comment(&self) -> String {
        match self {
            Self::Cached(step) => step.inner().comment(),
            Self::Develop { develop, .. } => develop.comment().to_string(),
        }
    }
}

/// Summary of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Final image of the chain
    pub image: String,
    /// Steps that ran
    pub built: usize,
    /// Steps served from the cache
    pub reused: usize,
    /// Chain digests this build went through, in step order
    pub digests: Vec<Digest>,
}

/// Outcome of a garbage collection sweep
#[derive(Debug, Default)]
pub struct GcReport {
    /// Entries whose image was removed and which were evicted
    pub removed: Vec<(Digest, ImageInfo)>,
    /// Entries whose image could not be removed, with the reason; still cached
    pub failed: Vec<(Digest, ImageInfo, String)>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    base_image: String,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Build a pipeline, caching every leaf step individually.
    ///
    /// Compound steps are flattened so a change to one member does not
    /// invalidate its siblings.
    pub fn new(
        base_image: impl Into<String>,
        snapshotters: impl IntoIterator<Item = Snapshotter>,
    ) -> DockenvResult<Self> {
        let steps = snapshotters
            .into_iter()
            .flat_map(Snapshotter::into_steps)
            .map(Step::from_snapshotter)
            .collect::<DockenvResult<Vec<_>>>()?;

        Ok(Self {
            base_image: base_image.into(),
            steps,
        })
    }

    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Fold the steps over the base image, reusing cached images
    pub async fn build(&self, backend: Backend<'_>, cache: &mut ImageCache) -> DockenvResult<BuildReport> {
        let mut image = self.base_image.clone();
        let mut parent: Option<Digest> = None;
        let mut built = 0;
        let mut reused = 0;
        let mut digests = Vec::new();

        for step in &self.steps {
            let cached = match step {
                Step::Cached(cached) => cached,
                Step::Develop { develop, fallback } => {
                    if develop.supports_develop(backend.host).await? {
                        image = develop.develop(backend, &image).await?;
                        continue;
                    }
                    fallback
                }
            };

            let StepOutcome {
                digest,
                image: next,
                cached: hit,
            } = cached.apply(backend, cache, &image, parent.as_ref()).await?;

            if hit {
                reused += 1;
            } else {
                built += 1;
            }
            digests.push(digest.clone());
            parent = Some(digest);
            image = next;
        }

        info!("Built {} ({} built, {} cached)", image, built, reused);
        Ok(BuildReport {
            image,
            built,
            reused,
            digests,
        })
    }

    /// Chain digests reachable by folding the pipeline over the cache.
    ///
    /// Runs nothing. The walk stops at the first step whose digest is not
    /// cached; develop steps leave the image unchanged unless their fallback
    /// was cached for the current image.
    pub fn live_digests(&self, cache: &ImageCache) -> BTreeSet<Digest> {
        let mut live = BTreeSet::new();
        let mut image = self.base_image.clone();

        for step in &self.steps {
            let (cached, transparent) = match step {
                Step::Cached(cached) => (cached, false),
                Step::Develop { fallback, .. } => (fallback, true),
            };

            let digest = cached.chain_digest(&image);
            match cache.get(&digest) {
                Some(info) => {
                    image = info.image.clone();
                    live.insert(digest);
                }
                None if transparent => continue,
                None => break,
            }
        }

        debug!("{} live cache entries", live.len());
        live
    }

    /// Cache entries not reachable from this pipeline
    pub fn unused_entries(&self, cache: &ImageCache) -> Vec<(Digest, ImageInfo)> {
        let live = self.live_digests(cache);
        cache
            .iter()
            .filter(|(digest, _)| !live.contains(*digest))
            .map(|(digest, info)| (digest.clone(), info.clone()))
            .collect()
    }

    /// Remove every image unreachable from this pipeline and evict its entry
    pub async fn collect_garbage(
        &self,
        runtime: &dyn ContainerRuntime,
        cache: &mut ImageCache,
    ) -> GcReport {
        let live = self.live_digests(cache);
        remove_unused(runtime, cache, &live).await
    }
}

/// Remove the image of every cache entry outside `live` and evict it.
///
/// After a build, pass the digests from its `BuildReport` so the sweep keeps
/// exactly the chain that build went through, develop steps included. A
/// failed removal is logged and skipped; its entry stays cached.
pub async fn remove_unused<'a>(
    runtime: &dyn ContainerRuntime,
    cache: &mut ImageCache,
    live: impl IntoIterator<Item = &'a Digest>,
) -> GcReport {
    let live: BTreeSet<&Digest> = live.into_iter().collect();
    let unused: Vec<(Digest, ImageInfo)> = cache
        .iter()
        .filter(|(digest, _)| !live.contains(*digest))
        .map(|(digest, info)| (digest.clone(), info.clone()))
        .collect();

    let mut report = GcReport::default();

    for (digest, info) in unused {
        info!(
            "Removing {} image {} ({})",
            digest.short(),
            info.image,
            info.comment
        );
        match runtime.remove_image(&info.image).await {
            Ok(()) => {
                cache.remove(&digest);
                report.removed.push((digest, info));
            }
            Err(e) => {
                warn!("Failed to remove image {}: {}", info.image, e);
                report.failed.push((digest, info, e.to_string()));
            }
        }
    }

    report
}
