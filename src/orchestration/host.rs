//! Host-side command execution
//!
//! Develop steps probe and check out sources on the host itself, outside
//! any container.

use crate::error::{DockenvError, DockenvResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs commands directly on the host
#[async_trait]
pub trait HostShell: Send + Sync {
    /// Run `command` in `cwd` with inherited stdio and return its exit code.
    ///
    /// Only a failure to spawn is an error; a non-zero exit is returned.
    async fn run(&self, command: &[String], cwd: &Path) -> DockenvResult<i32>;
}

/// `HostShell` backed by real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

#[async_trait]
impl HostShell for SystemShell {
    async fn run(&self, command: &[String], cwd: &Path) -> DockenvResult<i32> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DockenvError::Internal("empty host command".to_string()))?;

        debug!("Executing on host in {}: {:?}", cwd.display(), command);

        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DockenvError::command_failed(command.join(" "), e))?;

        Ok(status.code().unwrap_or(-1))
    }
}
