//! Container invocation types
//!
//! Plain data passed to a `ContainerRuntime`. Runtimes turn these into
//! command-line arguments; nothing here talks to a runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Access mode of a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MountMode {
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volume mount for a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Host path; `None` creates an anonymous volume
    pub host_path: Option<PathBuf>,
    /// Path inside the container
    pub container_path: String,
    pub mode: MountMode,
}

impl Mount {
    /// Bind-mount a host path
    pub fn bind(host_path: impl Into<PathBuf>, container_path: impl Into<String>, mode: MountMode) -> Self {
        Self {
            host_path: Some(host_path.into()),
            container_path: container_path.into(),
            mode,
        }
    }

    /// Anonymous volume at `container_path`
    pub fn anonymous(container_path: impl Into<String>) -> Self {
        Self {
            host_path: None,
            container_path: container_path.into(),
            mode: MountMode::ReadWrite,
        }
    }

    /// Generate the `--volume` value (host:container:mode)
    pub fn volume_arg(&self) -> String {
        match &self.host_path {
            Some(host) => format!("{}:{}:{}", host.display(), self.container_path, self.mode),
            None => self.container_path.clone(),
        }
    }
}

/// Everything needed to start one container
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Image to instantiate
    pub image: String,
    /// Command and arguments
    pub command: Vec<String>,
    /// Volume mounts
    pub mounts: Vec<Mount>,
    /// Environment variables, in the order given
    pub env: Vec<(String, String)>,
    /// Working directory inside the container
    pub workdir: Option<String>,
    /// Entrypoint override
    pub entrypoint: Option<String>,
    /// Allocate a TTY and keep stdin open
    pub tty: bool,
    /// Remove the container when it exits
    pub auto_remove: bool,
}

/// Result of running a container to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code of the container's main process (-1 if killed by a signal)
    pub exit_code: i32,
    /// Id of the retained container; `None` when auto-removed or never created
    pub container_id: Option<String>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
