//! Recording fakes for the container runtime and host shell

use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::{ContainerRuntime, ContainerSpec, HostShell, MountMode, RunOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File written by a fake "build" phase into its writable work dir
pub const ARTIFACT: &str = "artifact.txt";

#[derive(Default)]
struct RuntimeState {
    runs: Vec<ContainerSpec>,
    commits: Vec<String>,
    removed_containers: Vec<String>,
    removed_images: Vec<String>,
    installed_artifacts: Vec<String>,
    writable_dirs: Vec<PathBuf>,
    containers: u32,
    images: u32,
}

/// In-memory `ContainerRuntime`.
///
/// Images are named `img1`, `img2`, ... in commit order. A container whose
/// last argument is `build` writes `ARTIFACT` into the mount backing its
/// work dir; one whose last argument is `install` records what it finds.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
    failing_args: HashSet<String>,
    fail_commit: bool,
    fail_container_removal: bool,
    failing_images: HashSet<String>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Containers whose command contains `arg` exit with status 1
    pub fn failing_arg(mut self, arg: &str) -> Self {
        self.failing_args.insert(arg.to_string());
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_container_removal(mut self) -> Self {
        self.fail_container_removal = true;
        self
    }

    pub fn failing_image_removal(mut self, image: &str) -> Self {
        self.failing_images.insert(image.to_string());
        self
    }

    pub fn runs(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits.len()
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_containers.clone()
    }

    pub fn removed_images(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_images.clone()
    }

    pub fn installed_artifacts(&self) -> Vec<String> {
        self.state.lock().unwrap().installed_artifacts.clone()
    }

    /// Host directories that backed a writable work dir
    pub fn writable_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().writable_dirs.clone()
    }
}

fn workdir_mount(spec: &ContainerSpec, mode: MountMode) -> Option<PathBuf> {
    let workdir = spec.workdir.as_deref()?;
    spec.mounts
        .iter()
        .find(|m| m.container_path == workdir && m.mode == mode)
        .and_then(|m| m.host_path.clone())
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ensure_ready(&self) -> DockenvResult<()> {
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> DockenvResult<RunOutcome> {
        let mut state = self.state.lock().unwrap();
        state.runs.push(spec.clone());

        let failed = spec.command.iter().any(|a| self.failing_args.contains(a));

        match spec.command.last().map(String::as_str) {
            Some("build") if !failed => {
                if let Some(dir) = workdir_mount(spec, MountMode::ReadWrite) {
                    std::fs::write(dir.join(ARTIFACT), format!("built from {}", spec.image))
                        .map_err(|e| DockenvError::io("writing fake artifact", e))?;
                    state.writable_dirs.push(dir);
                }
            }
            Some("install") if !failed => {
                if let Some(dir) = workdir_mount(spec, MountMode::ReadOnly) {
                    if let Ok(content) = std::fs::read_to_string(dir.join(ARTIFACT)) {
                        state.installed_artifacts.push(content);
                    }
                }
            }
            _ => {}
        }

        let container_id = if spec.auto_remove {
            None
        } else {
            state.containers += 1;
            Some(format!("ctr{}", state.containers))
        };

        Ok(RunOutcome {
            exit_code: if failed { 1 } else { 0 },
            container_id,
        })
    }

    async fn commit(&self, container_id: &str) -> DockenvResult<String> {
        if self.fail_commit {
            return Err(DockenvError::ImageCommit {
                container_id: container_id.to_string(),
                reason: "commit refused".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.commits.push(container_id.to_string());
        state.images += 1;
        Ok(format!("img{}", state.images))
    }

    async fn remove_container(&self, container_id: &str) -> DockenvResult<()> {
        if self.fail_container_removal {
            return Err(DockenvError::command_exec("fake rm", "container busy"));
        }
        self.state
            .lock()
            .unwrap()
            .removed_containers
            .push(container_id.to_string());
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> DockenvResult<()> {
        if self.failing_images.contains(image) {
            return Err(DockenvError::command_exec("fake rmi", "image is in use"));
        }
        self.state
            .lock()
            .unwrap()
            .removed_images
            .push(image.to_string());
        Ok(())
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}

/// In-memory `HostShell`; exit codes are chosen by the command's last argument
#[derive(Default)]
pub struct FakeShell {
    exit_codes: HashMap<String, i32>,
    calls: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit_code(mut self, last_arg: &str, code: i32) -> Self {
        self.exit_codes.insert(last_arg.to_string(), code);
        self
    }

    pub fn calls(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostShell for FakeShell {
    async fn run(&self, command: &[String], cwd: &Path) -> DockenvResult<i32> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_vec(), cwd.to_path_buf()));
        let code = command
            .last()
            .and_then(|last| self.exit_codes.get(last))
            .copied()
            .unwrap_or(0);
        Ok(code)
    }
}
