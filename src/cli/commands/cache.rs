//! Cache command - inspect the image cache

use crate::cache::{ImageCache, ImageInfo};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::ConfigManager;
use crate::error::DockenvResult;
use crate::hash::Digest;
use console::style;
use serde::Serialize;

/// Execute the cache command
pub async fn execute(args: CacheArgs, manager: &ConfigManager) -> DockenvResult<()> {
    match args.action {
        CacheAction::List { format } => {
            let cache = crate::cache::load(&manager.cache_path()).await?;
            list_images(&cache, format)
        }
    }
}

fn list_images(cache: &ImageCache, format: OutputFormat) -> DockenvResult<()> {
    match format {
        OutputFormat::Table => print_table(cache),
        OutputFormat::Json => print_json(cache)?,
        OutputFormat::Plain => print_plain(cache),
    }
    Ok(())
}

fn print_table(cache: &ImageCache) {
    if cache.is_empty() {
        println!("No cached images.");
        return;
    }

    println!(
        "{:<14} {:<20} {:<18} {}",
        "DIGEST", "IMAGE", "CREATED", "COMMENT"
    );
    println!("{}", "-".repeat(80));

    for (digest, info) in cache.iter() {
        let created = info
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| style("unknown").dim().to_string());

        println!(
            "{:<14} {:<20} {:<18} {}",
            digest.short(),
            short_image(&info.image),
            created,
            info.comment
        );
    }

    println!();
    println!("Total: {} image(s)", cache.len());
}

#[derive(Serialize)]
struct CacheEntryJson<'a> {
    digest: &'a Digest,
    #[serde(flatten)]
    info: &'a ImageInfo,
}

fn print_json(cache: &ImageCache) -> DockenvResult<()> {
    let entries: Vec<CacheEntryJson<'_>> = cache
        .iter()
        .map(|(digest, info)| CacheEntryJson { digest, info })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn print_plain(cache: &ImageCache) {
    for (_, info) in cache.iter() {
        println!("{}", info.image);
    }
}

/// Image ids are long; show them the way the runtime's own listing does
fn short_image(image: &str) -> &str {
    match image.strip_prefix("sha256:") {
        Some(hex) => hex.get(..12).unwrap_or(hex),
        None => image,
    }
}
