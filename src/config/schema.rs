//! Configuration schema for dockenv
//!
//! Configuration is stored in `dockenv.toml` at the root of a project. The
//! directory holding the file is the base directory; relative paths in the
//! file are resolved against it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container runtime settings
    pub runtime: RuntimeConfig,

    /// Named build targets
    pub targets: BTreeMap<String, TargetConfig>,
}

/// General application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Image cache file; `docker_image_cache.json` in the base dir if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,

    /// Target used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
}

/// Container runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// "docker", "podman", or "auto"
    pub binary: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

/// One buildable environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Image the chain starts from
    pub base_image: String,

    /// Directories scanned for numbered build scripts
    pub script_dirs: Vec<PathBuf>,

    /// Toolchain image for build phases; the chain image if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_image: Option<String>,

    /// Script run with /bin/sh as the first step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_script: Option<PathBuf>,

    /// Script every build script is run through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper_script: Option<PathBuf>,

    /// Entrypoint that creates the host-mapped user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint_script: Option<PathBuf>,

    /// Host directory used as the container home
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_volume: Option<PathBuf>,

    /// Let the mapped user use sudo
    pub allow_sudo: bool,

    /// Forward the host SSH agent
    pub forward_ssh_agent: bool,

    /// Working directory for `run`; the invocation directory if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_image: "ubuntu:latest".to_string(),
            script_dirs: Vec::new(),
            build_image: None,
            init_script: None,
            wrapper_script: None,
            entrypoint_script: None,
            home_volume: None,
            allow_sudo: true,
            forward_ssh_agent: false,
            workdir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.runtime.binary, "docker");
        assert!(config.targets.is_empty());
        assert!(config.general.cache_file.is_none());
    }

    #[test]
    fn target_defaults() {
        let config: Config = toml::from_str(
            r#"
            [targets.dev]
            script_dirs = ["scripts"]
            "#,
        )
        .unwrap();

        let target = &config.targets["dev"];
        assert_eq!(target.base_image, "ubuntu:latest");
        assert_eq!(target.script_dirs, vec![PathBuf::from("scripts")]);
        assert!(target.allow_sudo);
        assert!(!target.forward_ssh_agent);
    }

    #[test]
    fn full_target_parses() {
        let config: Config = toml::from_str(
            r#"
            [general]
            cache_file = "cache/images.json"
            default_target = "app"

            [runtime]
            binary = "podman"

            [targets.app]
            base_image = "debian:bookworm"
            script_dirs = ["setup", "app"]
            build_image = "rust:1.82"
            init_script = "image_init.sh"
            wrapper_script = "cleanup_wrapper.sh"
            entrypoint_script = "hostuser.sh"
            home_volume = "home"
            allow_sudo = false
            forward_ssh_agent = true
            workdir = "src"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.default_target.as_deref(), Some("app"));
        assert_eq!(config.runtime.binary, "podman");
        let target = &config.targets["app"];
        assert_eq!(target.build_image.as_deref(), Some("rust:1.82"));
        assert_eq!(target.workdir, Some(PathBuf::from("src")));
        assert!(!target.allow_sudo);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config: Config = toml::from_str(
            r#"
            [general]
            color = true
            "#,
        )
        .unwrap();
        assert!(config.general.default_target.is_none());
    }

    #[test]
    fn serializes_back_to_toml() {
        let mut config = Config::default();
        config
            .targets
            .insert("dev".to_string(), TargetConfig::default());
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.targets["dev"], TargetConfig::default());
    }
}
