//! Pipelines from target configuration
//!
//! A target's pipeline is an optional init step followed by one
//! build/install step per numbered script found in its script directories.

use super::Pipeline;
use crate::config::TargetConfig;
use crate::context::Context;
use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::MountMode;
use crate::runner::{same_path_mount, HostUserOptions, Runner};
use crate::snapshot::{BuildInstallSnapshotter, CommandSnapshotter, DevelopSnapshotter, Snapshotter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the init script is mounted in its container
const INIT_SCRIPT_PATH: &str = "/init_script";

/// Scripts in `dir` that form build steps, in name order.
///
/// A script is a regular, executable file whose name is one or more digits
/// followed by a dot, such as `10.install-foo.sh`.
pub fn discover_scripts(dir: &Path) -> DockenvResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| DockenvError::io(format!("reading script directory {}", dir.display()), e))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DockenvError::io("reading script directory entry", e))?;
        let path = entry.path();
        let name = entry.file_name();

        if !is_step_name(&name.to_string_lossy()) {
            continue;
        }
        let metadata = fs::metadata(&path)
            .map_err(|e| DockenvError::io(format!("reading {}", path.display()), e))?;
        if metadata.is_file() && is_executable(&metadata) {
            scripts.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }

    scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(scripts)
}

fn is_step_name(name: &str) -> bool {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && name.as_bytes().get(digits) == Some(&b'.')
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

/// Everything needed to build and enter one target
#[derive(Debug, Clone)]
pub struct TargetPipeline {
    pub pipeline: Pipeline,
    /// Runner for the final command, with the base dir mounted in place
    pub run_runner: Runner,
    pub base_dir: PathBuf,
    pub workdir: Option<PathBuf>,
}

impl TargetPipeline {
    /// Assemble the pipeline for `target`.
    ///
    /// With `develop`, every script step becomes a develop step that falls
    /// back to the plain build/install step.
    pub fn from_target(target: &TargetConfig, base_dir: &Path, develop: bool) -> DockenvResult<Self> {
        let host_user = Runner::host_user(&HostUserOptions {
            entrypoint_script: target.entrypoint_script.clone(),
            home_volume: target.home_volume.clone(),
            allow_sudo: target.allow_sudo,
            forward_ssh_agent: target.forward_ssh_agent,
        });

        let mut steps: Vec<Snapshotter> = Vec::new();

        if let Some(ref init) = target.init_script {
            steps.push(
                CommandSnapshotter::new(
                    vec![INIT_SCRIPT_PATH.to_string()],
                    Context::from_files([(INIT_SCRIPT_PATH, init)])?,
                    Runner::new().with_entrypoint("/bin/sh"),
                )
                .with_comment(format!("init ({})", init.display()))
                .into(),
            );
        }

        for dir in &target.script_dirs {
            for script in discover_scripts(dir)? {
                let step = script_step(&script, &host_user, target)?;
                let step = match target.wrapper_script {
                    Some(ref wrapper) => step.wrapped(wrapper)?,
                    None => step,
                };
                steps.push(if develop {
                    DevelopSnapshotter::new(base_dir, host_user.clone(), step).into()
                } else {
                    step.into()
                });
            }
        }

        debug!("Target has {} steps", steps.len());

        Ok(Self {
            pipeline: Pipeline::new(target.base_image.clone(), steps)?,
            run_runner: host_user.with_mounts([same_path_mount(base_dir, MountMode::ReadWrite)]),
            base_dir: base_dir.to_path_buf(),
            workdir: target.workdir.clone(),
        })
    }
}

fn script_step(
    script: &Path,
    runner: &Runner,
    target: &TargetConfig,
) -> DockenvResult<BuildInstallSnapshotter> {
    let name = script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DockenvError::Internal(format!("script without a name: {}", script.display())))?;

    let step = BuildInstallSnapshotter::new(
        vec![format!("./{}", name)],
        Context::from_files([(name.as_str(), script)])?,
        runner.clone(),
        runner.clone(),
    );

    Ok(match target.build_image {
        Some(ref image) => step.with_build_image(image.clone()),
        None => step,
    })
}
