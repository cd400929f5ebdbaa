//! Configuration management for dockenv

pub mod schema;

pub use schema::{Config, GeneralConfig, RuntimeConfig, TargetConfig};

use crate::cache::DEFAULT_CACHE_FILE;
use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::RuntimeChoice;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "dockenv.toml";

/// Loaded configuration together with where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    base_dir: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load `explicit`, or the nearest `dockenv.toml` above the current directory
    pub async fn load(explicit: Option<&Path>) -> DockenvResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| DockenvError::io("getting current directory", e))?;

        let path = match explicit {
            Some(path) => {
                let path = cwd.join(path);
                if !path.exists() {
                    return Err(DockenvError::ConfigNotFound(path));
                }
                path
            }
            None => Self::find_local_config(&cwd)
                .ok_or_else(|| DockenvError::ConfigNotFound(cwd.join(CONFIG_FILE_NAME)))?,
        };

        Self::load_from_file(path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(path: PathBuf) -> DockenvResult<Self> {
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| DockenvError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| DockenvError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        RuntimeChoice::parse(&config.runtime.binary).map_err(|e| DockenvError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        debug!("Loaded config from {}", path.display());
        Ok(Self {
            config_path: path,
            base_dir,
            config,
        })
    }

    /// Walk up from `start` looking for `dockenv.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Directory holding the config file
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a path from the config file against the base directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Where the image cache is stored
    pub fn cache_path(&self) -> PathBuf {
        match self.config.general.cache_file {
            Some(ref file) => self.resolve(file),
            None => self.base_dir.join(DEFAULT_CACHE_FILE),
        }
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.config.targets.keys().map(String::as_str).collect()
    }

    /// Select a target and resolve its paths.
    ///
    /// Without a name, `general.default_target` is used, then the only
    /// target if there is exactly one.
    pub fn target(&self, name: Option<&str>) -> DockenvResult<(String, TargetConfig)> {
        let name = match name.or(self.config.general.default_target.as_deref()) {
            Some(name) => name.to_string(),
            None => match self.target_names().as_slice() {
                [only] => only.to_string(),
                [] => {
                    return Err(DockenvError::ConfigInvalid {
                        path: self.config_path.clone(),
                        reason: "no targets defined".to_string(),
                    })
                }
                names => {
                    return Err(DockenvError::User(format!(
                        "No target given and no default_target set; choose one of: {}",
                        names.join(", ")
                    )))
                }
            },
        };

        let target = self
            .config
            .targets
            .get(&name)
            .ok_or_else(|| DockenvError::TargetNotFound {
                name: name.clone(),
                available: self.target_names().join(", "),
            })?;

        Ok((name, self.resolve_target(target)))
    }

    fn resolve_target(&self, target: &TargetConfig) -> TargetConfig {
        let resolve = |p: &Option<PathBuf>| p.as_deref().map(|p| self.resolve(p));
        TargetConfig {
            base_image: target.base_image.clone(),
            script_dirs: target.script_dirs.iter().map(|d| self.resolve(d)).collect(),
            build_image: target.build_image.clone(),
            init_script: resolve(&target.init_script),
            wrapper_script: resolve(&target.wrapper_script),
            entrypoint_script: resolve(&target.entrypoint_script),
            home_volume: resolve(&target.home_volume),
            allow_sudo: target.allow_sudo,
            forward_ssh_agent: target.forward_ssh_agent,
            workdir: resolve(&target.workdir),
        }
    }
}
