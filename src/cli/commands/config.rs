//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::ConfigManager;
use crate::error::DockenvResult;
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager) -> DockenvResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(manager)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Targets) => show_targets(manager),
    }

    Ok(())
}

fn show_config(manager: &ConfigManager) -> DockenvResult<()> {
    let toml = toml::to_string_pretty(manager.config())?;
    println!("{}", toml);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

fn show_targets(manager: &ConfigManager) {
    let default = manager.config().general.default_target.as_deref();
    for (name, target) in &manager.config().targets {
        let marker = if Some(name.as_str()) == default {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!("{} {} ({})", marker, name, target.base_image);
    }
}
