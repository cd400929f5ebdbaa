//! CLI command implementations

pub mod cache;
pub mod config;
pub mod gc;
pub mod init;
pub mod run;

pub use cache::execute as cache;
pub use config::execute as config;
pub use gc::execute as gc;
pub use init::execute as init;
pub use run::execute as run;

use crate::cache::ImageInfo;
use crate::hash::Digest;
use crate::pipeline::GcReport;
use console::style;

/// Print entries that are, or would be, removed by garbage collection
pub(crate) fn print_unused(entries: &[(Digest, ImageInfo)]) {
    for (digest, info) in entries {
        println!(
            "  {} {} {} ({})",
            style("•").red(),
            digest.short(),
            info.image,
            info.comment
        );
    }
}

pub(crate) fn print_gc_report(report: &GcReport) {
    if report.removed.is_empty() && report.failed.is_empty() {
        println!("No unused images.");
        return;
    }

    if !report.removed.is_empty() {
        println!("Removed {} unused image(s):", report.removed.len());
        print_unused(&report.removed);
    }

    for (digest, info, reason) in &report.failed {
        println!(
            "  {} {} {} kept: {}",
            style("!").yellow(),
            digest.short(),
            info.image,
            reason
        );
    }
}
