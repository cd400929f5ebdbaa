//! Gc command - remove cached images the target no longer reaches

use super::{print_gc_report, print_unused};
use crate::cache::StoredCache;
use crate::cli::args::GcArgs;
use crate::config::ConfigManager;
use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::create_runtime;
use crate::pipeline::TargetPipeline;

/// Execute the gc command
pub async fn execute(args: GcArgs, manager: &ConfigManager) -> DockenvResult<()> {
    let (name, target) = manager.target(args.target.as_deref())?;
    let target_pipeline = TargetPipeline::from_target(&target, manager.base_dir(), false)?;
    let pipeline = &target_pipeline.pipeline;

    if args.dry_run {
        let cache = crate::cache::load(&manager.cache_path()).await?;
        let unused = pipeline.unused_entries(&cache);
        if unused.is_empty() {
            println!("No unused images for target {}.", name);
        } else {
            println!("{} image(s) unused by target {}:", unused.len(), name);
            print_unused(&unused);
            println!();
            println!("Dry run - no images removed.");
        }
        return Ok(());
    }

    let runtime = create_runtime(&manager.config().runtime).await?;
    runtime.ensure_ready().await?;

    let runtime = runtime.as_ref();
    let report = StoredCache::with(&manager.cache_path(), |mut cache| async move {
        let report = pipeline.collect_garbage(runtime, &mut cache).await;
        (cache, Ok::<_, DockenvError>(report))
    })
    .await?;

    print_gc_report(&report);
    Ok(())
}
