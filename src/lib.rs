//! dockenv - cached container build environments
//!
//! Builds a chain of container images from ordered build steps, caching
//! each step's image under a digest of its inputs so unchanged steps never
//! run twice, and garbage-collects images the current chain no longer uses.

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod orchestration;
pub mod pipeline;
pub mod runner;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{DockenvError, DockenvResult};
