//! Docker / Podman CLI runtime
//!
//! Both CLIs accept the same `run`, `commit`, `rm` and `rmi` arguments,
//! so one implementation drives either binary.

use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::container::{ContainerSpec, RunOutcome};
use crate::orchestration::runtime::ContainerRuntime;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Supported runtime CLIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

/// Container runtime driven through its command-line client
pub struct CliRuntime {
    kind: RuntimeKind,
}

impl CliRuntime {
    pub fn new(kind: RuntimeKind) -> Self {
        Self { kind }
    }

    /// Check if the runtime binary is installed
    pub async fn is_installed(kind: RuntimeKind) -> bool {
        Command::new(kind.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute a runtime command and capture its output
    async fn exec(&self, args: &[&str]) -> DockenvResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.kind.binary(), args);

        Command::new(self.kind.binary())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DockenvError::command_failed(format!("{} {:?}", self.kind.binary(), args), e))
    }

    /// Execute a runtime command with inherited stdio
    async fn exec_interactive(&self, args: &[String]) -> DockenvResult<i32> {
        debug!("Executing interactively: {} {:?}", self.kind.binary(), args);

        let status = Command::new(self.kind.binary())
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DockenvError::command_failed(format!("{} {:?}", self.kind.binary(), args), e))?;

        Ok(status.code().unwrap_or(-1))
    }

    /// Build the argument list for `run`
    fn run_args(spec: &ContainerSpec, cidfile: Option<&Path>) -> Vec<String> {
        let mut args = vec!["run".to_string()];

        if spec.auto_remove {
            args.push("--rm".to_string());
        }
        if let Some(cidfile) = cidfile {
            args.push(format!("--cidfile={}", cidfile.display()));
        }
        if spec.tty {
            args.push("--tty".to_string());
            args.push("--interactive".to_string());
        }
        if let Some(ref workdir) = spec.workdir {
            args.push(format!("--workdir={}", workdir));
        }
        if let Some(ref entrypoint) = spec.entrypoint {
            args.push(format!("--entrypoint={}", entrypoint));
        }
        for mount in &spec.mounts {
            args.push(format!("--volume={}", mount.volume_arg()));
        }
        for (k, v) in &spec.env {
            args.push(format!("--env={}={}", k, v));
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn ensure_ready(&self) -> DockenvResult<()> {
        if Self::is_installed(self.kind).await {
            Ok(())
        } else {
            Err(DockenvError::RuntimeNotFound {
                binary: self.kind.binary().to_string(),
            })
        }
    }

    async fn run(&self, spec: &ContainerSpec) -> DockenvResult<RunOutcome> {
        if spec.auto_remove {
            let args = Self::run_args(spec, None);
            let exit_code = self.exec_interactive(&args).await?;
            return Ok(RunOutcome {
                exit_code,
                container_id: None,
            });
        }

        // The cidfile must not exist beforehand, so it lives in a fresh dir
        let tmp = tempfile::tempdir().map_err(|e| DockenvError::io("creating cidfile directory", e))?;
        let cidfile = tmp.path().join("cid");
        let args = Self::run_args(spec, Some(&cidfile));
        let exit_code = self.exec_interactive(&args).await?;

        let container_id = match tokio::fs::read_to_string(&cidfile).await {
            Ok(content) => Some(content.trim().to_string()).filter(|id| !id.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(DockenvError::io(format!("reading {}", cidfile.display()), e)),
        };

        Ok(RunOutcome {
            exit_code,
            container_id,
        })
    }

    async fn commit(&self, container_id: &str) -> DockenvResult<String> {
        debug!("Committing container: {}", container_id);

        let output = self.exec(&["commit", container_id]).await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(DockenvError::ImageCommit {
                container_id: container_id.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn remove_container(&self, container_id: &str) -> DockenvResult<()> {
        debug!("Removing container: {}", container_id);

        let output = self.exec(&["rm", container_id]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DockenvError::command_exec(format!("{} rm", self.kind.binary()), stderr))
        }
    }

    async fn remove_image(&self, image: &str) -> DockenvResult<()> {
        debug!("Removing image: {}", image);

        let output = self.exec(&["rmi", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DockenvError::command_exec(format!("{} rmi", self.kind.binary()), stderr))
        }
    }

    fn runtime_name(&self) -> &'static str {
        match self.kind {
            RuntimeKind::Docker => "Docker",
            RuntimeKind::Podman => "Podman",
        }
    }
}
