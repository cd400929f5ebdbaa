//! Two-phase build/install steps
//!
//! The build phase runs `<prefix> build` in a throwaway container with a
//! fresh scratch directory mounted read-write as its work dir. The install
//! phase runs `<prefix> install` against the input image with the same
//! directory mounted read-only, and only that container is committed. Build
//! tooling therefore never reaches the produced image.

use super::{resolve_prefix, CONTEXT_DIR};
use crate::context::Context;
use crate::error::{DockenvError, DockenvResult};
use crate::hash::ContentHasher;
use crate::orchestration::{Backend, Mount, MountMode};
use crate::runner::Runner;
use std::path::Path;
use tracing::{debug, warn};

pub(crate) const BUILD_PHASE: &str = "build";
pub(crate) const INSTALL_PHASE: &str = "install";

/// Context name of a wrapper script
const WRAPPER_NAME: &str = "wrapper.sh";

#[derive(Debug, Clone)]
pub struct BuildInstallSnapshotter {
    cmd_prefix: Vec<String>,
    context: Context,
    build_runner: Runner,
    install_runner: Runner,
    build_image: Option<String>,
    comment: String,
}

impl BuildInstallSnapshotter {
    pub fn new(
        cmd_prefix: Vec<String>,
        context: Context,
        build_runner: Runner,
        install_runner: Runner,
    ) -> Self {
        let comment = cmd_prefix.join(" ");
        Self {
            cmd_prefix,
            context,
            build_runner,
            install_runner,
            build_image: None,
            comment,
        }
    }

    /// Run the build phase on `image` instead of the step's input image
    pub fn with_build_image(mut self, image: impl Into<String>) -> Self {
        self.build_image = Some(image.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Copy of this step run through `wrapper`.
    ///
    /// The wrapper joins the context as `wrapper.sh` and is prepended to the
    /// command prefix. `self` is left untouched.
    pub fn wrapped(&self, wrapper: &Path) -> DockenvResult<Self> {
        let context = self
            .context
            .with(WRAPPER_NAME, wrapper, MountMode::ReadOnly)?;

        let mut cmd_prefix = vec![format!("./{}", WRAPPER_NAME)];
        cmd_prefix.extend(self.cmd_prefix.iter().cloned());

        Ok(Self {
            cmd_prefix,
            context,
            comment: format!("{} (wrapped {})", self.comment, wrapper.display()),
            ..self.clone()
        })
    }

    pub fn cmd_prefix(&self) -> &[String] {
        &self.cmd_prefix
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// `<prefix> <phase>` with `./name` arguments pointing into the mounted context
    pub fn container_command(&self, phase: &str) -> Vec<String> {
        let mut cmd = resolve_prefix(&self.cmd_prefix, |name| {
            self.context
                .contains(name)
                .then(|| format!("{}/{}", CONTEXT_DIR, name))
        });
        cmd.push(phase.to_string());
        cmd
    }

    /// `<prefix> <phase>` with `./name` arguments pointing at the host sources
    pub fn host_command(&self, phase: &str) -> Vec<String> {
        let mut cmd = resolve_prefix(&self.cmd_prefix, |name| {
            self.context
                .get(name)
                .map(|entry| entry.source.to_string_lossy().into_owned())
        });
        cmd.push(phase.to_string());
        cmd
    }

    // The build image and runners are execution details, not inputs.
    pub(crate) fn update_hash(&self, hasher: &mut ContentHasher) -> DockenvResult<()> {
        hasher.args(&self.cmd_prefix);
        self.context.update_hash(hasher)
    }

    pub(crate) async fn apply(&self, backend: Backend<'_>, image: &str) -> DockenvResult<String> {
        let scratch = tempfile::Builder::new()
            .prefix("dockenv-build-")
            .tempdir()
            .map_err(|e| DockenvError::io("creating build directory", e))?;
        open_permissions(scratch.path())?;
        debug!("Build directory: {}", scratch.path().display());

        let result = self.build_then_install(backend, image, scratch.path()).await;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove build directory: {}", e);
        }
        result
    }

    async fn build_then_install(
        &self,
        backend: Backend<'_>,
        image: &str,
        scratch: &Path,
    ) -> DockenvResult<String> {
        let context_mounts = self.context.mounts(CONTEXT_DIR)?;

        let build_mount = Mount::bind(scratch.to_path_buf(), CONTEXT_DIR, MountMode::ReadWrite);
        let build_runner = self
            .build_runner
            .with_mounts(std::iter::once(build_mount).chain(context_mounts.iter().cloned()));
        let build_image = self.build_image.as_deref().unwrap_or(image);
        build_runner
            .run(
                backend.runtime,
                build_image,
                &self.container_command(BUILD_PHASE),
                Some(CONTEXT_DIR),
            )
            .await?;

        let install_mount = Mount::bind(scratch.to_path_buf(), CONTEXT_DIR, MountMode::ReadOnly);
        let install_runner = self
            .install_runner
            .with_mounts(std::iter::once(install_mount).chain(context_mounts));
        install_runner
            .snapshot(
                backend.runtime,
                image,
                &self.container_command(INSTALL_PHASE),
                Some(CONTEXT_DIR),
            )
            .await
    }
}

// The mapped container user must be able to traverse the scratch dir.
#[cfg(unix)]
fn open_permissions(dir: &Path) -> DockenvResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| DockenvError::io("setting build directory permissions", e))
}

#[cfg(not(unix))]
fn open_permissions(_dir: &Path) -> DockenvResult<()> {
    Ok(())
}
