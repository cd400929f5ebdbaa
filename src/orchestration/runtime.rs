//! Container runtime abstraction
//!
//! The pipeline only needs four things from a runtime: run a container to
//! completion, commit a container to an image, and remove containers and
//! images. Implementations exist for the docker and podman CLIs.

use crate::error::DockenvResult;
use crate::orchestration::container::{ContainerSpec, RunOutcome};
use async_trait::async_trait;

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the runtime binary is usable
    async fn ensure_ready(&self) -> DockenvResult<()>;

    /// Run a container to completion with inherited stdio.
    ///
    /// A non-zero exit is reported in the outcome, not as an error. When
    /// `spec.auto_remove` is false the outcome carries the container id.
    async fn run(&self, spec: &ContainerSpec) -> DockenvResult<RunOutcome>;

    /// Commit a stopped container, returning the new image id
    async fn commit(&self, container_id: &str) -> DockenvResult<String>;

    /// Remove a container
    async fn remove_container(&self, container_id: &str) -> DockenvResult<()>;

    /// Remove an image
    async fn remove_image(&self, image: &str) -> DockenvResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
