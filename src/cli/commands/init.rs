//! Init command - create a project dockenv.toml

use crate::cli::args::InitArgs;
use crate::config::CONFIG_FILE_NAME;
use crate::error::{DockenvError, DockenvResult};
use console::style;
use std::path::Path;
use tokio::fs;

/// Template for a new project config
const INIT_TEMPLATE: &str = r#"# dockenv project configuration
# Relative paths are resolved against the directory holding this file.

[general]
# cache_file = "docker_image_cache.json"
default_target = "dev"

[runtime]
binary = "docker"                    # docker, podman, auto

[targets.dev]
base_image = "ubuntu:latest"
script_dirs = ["scripts"]            # numbered executables, e.g. 10.install-foo.sh
# build_image = "rust:latest"        # toolchain image for build phases
# init_script = "image_init.sh"      # runs first, with /bin/sh
# wrapper_script = "cleanup_wrapper.sh"
# entrypoint_script = "hostuser.sh"  # creates the host-mapped user
# home_volume = "home"
# allow_sudo = true
# forward_ssh_agent = false
# workdir = "."
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> DockenvResult<()> {
    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => std::env::current_dir()
            .map_err(|e| DockenvError::io("getting current directory", e))?,
    };

    let config_path = target_dir.join(CONFIG_FILE_NAME);

    if config_path.exists() && !args.force {
        return Err(DockenvError::User(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        )));
    }

    ensure_dir(&target_dir).await?;

    fs::write(&config_path, INIT_TEMPLATE)
        .await
        .map_err(|e| DockenvError::io(format!("writing {}", config_path.display()), e))?;

    eprintln!(
        "{} Created project config {}",
        style("✓").green(),
        config_path.display()
    );

    Ok(())
}

async fn ensure_dir(dir: &Path) -> DockenvResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| DockenvError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}
