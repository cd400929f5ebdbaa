//! Runtime factory
//!
//! Picks the container CLI named in the configuration, or probes for one.

use crate::config::schema::RuntimeConfig;
use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::native::{CliRuntime, RuntimeKind};
use crate::orchestration::runtime::ContainerRuntime;
use tracing::debug;

/// Runtime selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeChoice {
    /// Use this CLI
    Fixed(RuntimeKind),
    /// First installed of docker, podman
    Auto,
}

impl RuntimeChoice {
    /// Parse the `runtime.binary` setting
    pub fn parse(value: &str) -> DockenvResult<Self> {
        match value {
            "docker" => Ok(Self::Fixed(RuntimeKind::Docker)),
            "podman" => Ok(Self::Fixed(RuntimeKind::Podman)),
            "auto" => Ok(Self::Auto),
            other => Err(DockenvError::UnsupportedRuntime(other.to_string())),
        }
    }
}

/// Create the container runtime described by `config`
pub async fn create_runtime(config: &RuntimeConfig) -> DockenvResult<Box<dyn ContainerRuntime>> {
    let kind = match RuntimeChoice::parse(&config.binary)? {
        RuntimeChoice::Fixed(kind) => kind,
        RuntimeChoice::Auto => detect().await?,
    };
    debug!("Using container runtime: {}", kind.binary());
    Ok(Box::new(CliRuntime::new(kind)))
}

async fn detect() -> DockenvResult<RuntimeKind> {
    for kind in [RuntimeKind::Docker, RuntimeKind::Podman] {
        if CliRuntime::is_installed(kind).await {
            return Ok(kind);
        }
    }
    Err(DockenvError::RuntimeNotFound {
        binary: "docker or podman".to_string(),
    })
}
