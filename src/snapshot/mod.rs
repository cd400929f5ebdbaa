//! Build steps
//!
//! A snapshotter turns an image into a new image and can describe its
//! inputs as a digest without running anything. The set of step kinds is
//! closed:
//!
//! | Kind | Effect | Cacheable |
//! |------|--------|-----------|
//! | Command | run a command, commit the container | yes |
//! | BuildInstall | build into a scratch dir, install from it, commit | yes |
//! | Develop | check out on the host, develop against a live mount | no |
//! | Compound | apply members in order | if every member is |

mod build_install;
mod cached;
mod command;
mod compound;
mod develop;

pub use build_install::BuildInstallSnapshotter;
pub use cached::{CachedSnapshotter, StepOutcome};
pub use command::CommandSnapshotter;
pub use compound::CompoundSnapshotter;
pub use develop::DevelopSnapshotter;

use crate::error::DockenvResult;
use crate::hash::{ContentHasher, Digest};
use crate::orchestration::Backend;
use futures_util::future::{BoxFuture, FutureExt};

/// Directory inside build containers where the step's context is mounted
pub const CONTEXT_DIR: &str = "/dockenv_context";

/// A build step
#[derive(Debug, Clone)]
pub enum Snapshotter {
    Command(CommandSnapshotter),
    BuildInstall(BuildInstallSnapshotter),
    Develop(DevelopSnapshotter),
    Compound(CompoundSnapshotter),
}

impl Snapshotter {
    /// Short name of the step kind, also mixed into the digest
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::BuildInstall(_) => "build-install",
            Self::Develop(_) => "develop",
            Self::Compound(_) => "compound",
        }
    }

    /// Human-readable description recorded in the image cache
    pub fn comment(&self) -> String {
        match self {
            Self::Command(s) => s.comment().to_string(),
            Self::BuildInstall(s) => s.comment().to_string(),
            Self::Develop(s) => s.comment().to_string(),
            Self::Compound(s) => s.comment(),
        }
    }

    /// Whether the step's whole effect lives in the produced image
    pub fn is_cacheable(&self) -> bool {
        match self {
            Self::Develop(_) => false,
            Self::Compound(s) => s.members().iter().all(Snapshotter::is_cacheable),
            _ => true,
        }
    }

    /// Mix this step's declared inputs into `hasher`
    pub fn update_hash(&self, hasher: &mut ContentHasher) -> DockenvResult<()> {
        hasher.frame_str(self.kind());
        match self {
            Self::Command(s) => s.update_hash(hasher),
            Self::BuildInstall(s) => s.update_hash(hasher),
            Self::Develop(s) => s.update_hash(hasher),
            Self::Compound(s) => s.update_hash(hasher),
        }
    }

    /// Digest of this step's declared inputs
    pub fn digest(&self) -> DockenvResult<Digest> {
        let mut hasher = ContentHasher::new();
        self.update_hash(&mut hasher)?;
        Ok(hasher.finish())
    }

    /// Produce a new image from `image`
    pub fn apply<'a>(
        &'a self,
        backend: Backend<'a>,
        image: &'a str,
    ) -> BoxFuture<'a, DockenvResult<String>> {
        async move {
            match self {
                Self::Command(s) => s.apply(backend, image).await,
                Self::BuildInstall(s) => s.apply(backend, image).await,
                Self::Develop(s) => s.apply(backend, image).await,
                Self::Compound(s) => s.apply(backend, image).await,
            }
        }
        .boxed()
    }

    /// Flatten compounds into their leaf steps, preserving order
    pub fn into_steps(self) -> Vec<Snapshotter> {
        match self {
            Self::Compound(s) => s
                .into_members()
                .into_iter()
                .flat_map(Snapshotter::into_steps)
                .collect(),
            other => vec![other],
        }
    }
}

impl From<CommandSnapshotter> for Snapshotter {
    fn from(s: CommandSnapshotter) -> Self {
        Self::Command(s)
    }
}

impl From<BuildInstallSnapshotter> for Snapshotter {
    fn from(s: BuildInstallSnapshotter) -> Self {
        Self::BuildInstall(s)
    }
}

impl From<DevelopSnapshotter> for Snapshotter {
    fn from(s: DevelopSnapshotter) -> Self {
        Self::Develop(s)
    }
}

impl From<CompoundSnapshotter> for Snapshotter {
    fn from(s: CompoundSnapshotter) -> Self {
        Self::Compound(s)
    }
}

/// Rewrite `./name` arguments through `resolve`, leaving others as-is
pub(crate) fn resolve_prefix(
    prefix: &[String],
    resolve: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    prefix
        .iter()
        .map(|arg| {
            arg.strip_prefix("./")
                .and_then(&resolve)
                .unwrap_or_else(|| arg.clone())
        })
        .collect()
}
