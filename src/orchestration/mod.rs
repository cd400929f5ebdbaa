//! Orchestration module for container runtimes
//!
//! Provides the runtime-agnostic container interface used by build steps:
//! - `ContainerRuntime`: run / commit / remove against docker or podman
//! - `HostShell`: commands executed directly on the host

mod container;
mod factory;
mod host;
mod native;
mod runtime;

pub use container::{ContainerSpec, Mount, MountMode, RunOutcome};
pub use factory::{create_runtime, RuntimeChoice};
pub use host::{HostShell, SystemShell};
pub use native::{CliRuntime, RuntimeKind};
pub use runtime::ContainerRuntime;

/// The collaborators a build step runs against
#[derive(Clone, Copy)]
pub struct Backend<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub host: &'a dyn HostShell,
}

impl<'a> Backend<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, host: &'a dyn HostShell) -> Self {
        Self { runtime, host }
    }
}
