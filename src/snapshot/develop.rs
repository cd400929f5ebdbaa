//! Development-mode steps
//!
//! A develop-capable script keeps its working copy on the host: `checkout`
//! runs directly on the host and `develop` runs in a container with the base
//! directory bind-mounted read-write. Nothing is committed, so the step
//! returns its input image. Scripts that answer the `nodevelop` probe with
//! success are not develop-capable and fall back to a build/install step.

use super::{BuildInstallSnapshotter, CONTEXT_DIR};
use crate::error::{DockenvError, DockenvResult};
use crate::hash::ContentHasher;
use crate::orchestration::{Backend, HostShell, MountMode};
use crate::runner::{same_path_mount, Runner};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PROBE_PHASE: &str = "nodevelop";
const CHECKOUT_PHASE: &str = "checkout";
const DEVELOP_PHASE: &str = "develop";

#[derive(Debug, Clone)]
pub struct DevelopSnapshotter {
    base_dir: PathBuf,
    runner: Runner,
    fallback: BuildInstallSnapshotter,
    comment: String,
}

impl DevelopSnapshotter {
    /// Wrap `fallback`, developing in `base_dir` with `runner`
    pub fn new(base_dir: impl Into<PathBuf>, runner: Runner, fallback: BuildInstallSnapshotter) -> Self {
        let mut words = fallback.cmd_prefix().to_vec();
        words.push(DEVELOP_PHASE.to_string());
        Self {
            base_dir: base_dir.into(),
            runner,
            comment: words.join(" "),
            fallback,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn fallback(&self) -> &BuildInstallSnapshotter {
        &self.fallback
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Ask the script whether it can run in develop mode.
    ///
    /// A non-zero exit from the probe means "yes".
    pub async fn supports_develop(&self, host: &dyn HostShell) -> DockenvResult<bool> {
        let code = host
            .run(&self.fallback.host_command(PROBE_PHASE), &self.base_dir)
            .await?;
        debug!("Probe {} exited with {}", self.comment, code);
        Ok(code != 0)
    }

    /// Check out on the host, then develop against the live base directory
    pub async fn develop(&self, backend: Backend<'_>, image: &str) -> DockenvResult<String> {
        let checkout = self.fallback.host_command(CHECKOUT_PHASE);
        let code = backend.host.run(&checkout, &self.base_dir).await?;
        if code != 0 {
            return Err(DockenvError::HostCommand {
                command: checkout.join(" "),
                code,
            });
        }

        let runner = self.runner.with_mounts(
            self.fallback
                .context()
                .mounts(CONTEXT_DIR)?
                .into_iter()
                .chain(std::iter::once(same_path_mount(
                    &self.base_dir,
                    MountMode::ReadWrite,
                ))),
        );
        let workdir = self.base_dir.to_string_lossy();
        runner
            .run(
                backend.runtime,
                image,
                &self.fallback.container_command(DEVELOP_PHASE),
                Some(workdir.as_ref()),
            )
            .await?;

        info!("Developed {} in {}", self.comment, self.base_dir.display());
        Ok(image.to_string())
    }

    pub(crate) fn update_hash(&self, hasher: &mut ContentHasher) -> DockenvResult<()> {
        hasher.args(self.fallback.cmd_prefix());
        hasher.frame_str(&self.base_dir.to_string_lossy());
        self.fallback.update_hash(hasher)
    }

    pub(crate) async fn apply(&self, backend: Backend<'_>, image: &str) -> DockenvResult<String> {
        if self.supports_develop(backend.host).await? {
            self.develop(backend, image).await
        } else {
            self.fallback.apply(backend, image).await
        }
    }
}
