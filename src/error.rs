//! Error types for dockenv
//!
//! All modules use `DockenvResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dockenv operations
pub type DockenvResult<T> = Result<T, DockenvError>;

/// All errors that can occur in dockenv
#[derive(Error, Debug)]
pub enum DockenvError {
    // Environment errors
    #[error("Container runtime not found: {binary}")]
    RuntimeNotFound { binary: String },

    #[error("Unsupported container runtime: {0}")]
    UnsupportedRuntime(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Unknown target: {name} (available: {available})")]
    TargetNotFound { name: String, available: String },

    #[error("Context conflict for {target}: {existing} -> {new}")]
    ContextConflict {
        target: String,
        existing: PathBuf,
        new: PathBuf,
    },

    #[error("Image cache conflict for {digest}: {existing} -> {new}")]
    CacheConflict {
        digest: String,
        existing: String,
        new: String,
    },

    #[error("Corrupt image cache {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("Step cannot be cached: {0}")]
    UncacheableStep(String),

    // Hashing errors
    #[error("Failed to hash {path}: {reason}")]
    Hash { path: PathBuf, reason: String },

    // Container errors
    #[error("Container command failed: {command}, exit code: {code}")]
    ContainerCommand { command: String, code: i32 },

    #[error("Failed to commit container {container_id}: {reason}")]
    ImageCommit { container_id: String, reason: String },

    #[error("Container {container_id} leaked after failed commit ({commit_error}): {reason}")]
    ContainerLeak {
        container_id: String,
        commit_error: String,
        reason: String,
    },

    #[error("Container id not recorded for: {0}")]
    ContainerIdMissing(String),

    // Host errors
    #[error("Host command failed: {command}, exit code: {code}")]
    HostCommand { command: String, code: i32 },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl DockenvError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether this error means the configuration or persisted state is
    /// inconsistent, as opposed to a command that failed to run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. }
                | Self::ConfigNotFound(_)
                | Self::TargetNotFound { .. }
                | Self::ContextConflict { .. }
                | Self::CacheConflict { .. }
                | Self::CacheCorrupt { .. }
                | Self::UncacheableStep(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RuntimeNotFound { .. } => {
                Some("Install docker or podman, or set runtime.binary in dockenv.toml")
            }
            Self::ConfigNotFound(_) => Some("Create a dockenv.toml or pass --config"),
            Self::CacheConflict { .. } => {
                Some("The step digest is not deterministic; inspect the cache file before retrying")
            }
            Self::CacheCorrupt { .. } => Some("Fix or remove the image cache file"),
            _ => None,
        }
    }
}
