//! Run command - build a target's image chain and run a command in it

use super::print_gc_report;
use crate::cache::{ImageCache, StoredCache};
use crate::cli::args::RunArgs;
use crate::config::ConfigManager;
use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::{create_runtime, Backend, SystemShell};
use crate::pipeline::{remove_unused, BuildReport, Pipeline, TargetPipeline};
use console::style;
use std::path::PathBuf;
use tracing::{debug, info};

/// Execute the run command
pub async fn execute(args: RunArgs, manager: &ConfigManager) -> DockenvResult<()> {
    let (name, target) = manager.target(args.target.as_deref())?;
    let target_pipeline = TargetPipeline::from_target(&target, manager.base_dir(), args.develop)?;
    let pipeline = &target_pipeline.pipeline;

    let runtime = create_runtime(&manager.config().runtime).await?;
    runtime.ensure_ready().await?;
    let shell = SystemShell;
    let backend = Backend::new(runtime.as_ref(), &shell);

    info!("Building target {} from {}", name, pipeline.base_image());

    let cleanup = args.cleanup;
    let report = StoredCache::with(&manager.cache_path(), |mut cache| async move {
        let result = build_and_sweep(pipeline, backend, &mut cache, cleanup).await;
        (cache, result)
    })
    .await?;

    eprintln!(
        "{} {} -> {} ({} built, {} cached)",
        style("✓").green(),
        name,
        report.image,
        report.built,
        report.reused
    );

    if args.build_only {
        return Ok(());
    }

    let workdir = match args.workdir.or(target_pipeline.workdir) {
        Some(dir) => dir,
        None => current_dir()?,
    };
    let workdir = workdir.to_string_lossy();
    debug!("Running {:?} in {}", args.command, workdir);

    target_pipeline
        .run_runner
        .run(runtime.as_ref(), &report.image, &args.command, Some(workdir.as_ref()))
        .await
}

/// Build the chain and, when asked, remove every cached image the build did
/// not go through
async fn build_and_sweep(
    pipeline: &Pipeline,
    backend: Backend<'_>,
    cache: &mut ImageCache,
    cleanup: bool,
) -> DockenvResult<BuildReport> {
    let report = pipeline.build(backend, cache).await?;
    if cleanup {
        let gc = remove_unused(backend.runtime, cache, &report.digests).await;
        print_gc_report(&gc);
    }
    Ok(report)
}

fn current_dir() -> DockenvResult<PathBuf> {
    std::env::current_dir().map_err(|e| DockenvError::io("getting current directory", e))
}
