//! AclSleuth: flags folders whose permissions diverge from their parent.
//!
//! Thin binary entry point. All logic lives in the `aclsleuth-core` crate.
//!
//! Usage: `AclSleuth <root> [scan-level]`

use aclsleuth_core::compare::{AclComparerWorker, CompareProgress, WorkerOutcome};
use aclsleuth_core::services::{ReportTrustee, ScanServices};
use anyhow::{bail, Context};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(root) = args.next() else {
        bail!("usage: AclSleuth <root> [scan-level]");
    };
    let scan_level = match args.next() {
        Some(level) => level
            .parse::<u32>()
            .with_context(|| format!("invalid scan level '{level}'"))?,
        None => 0,
    };

    tracing::info!("AclSleuth starting on {root} (scan level {scan_level})");

    let services = ScanServices::native(Arc::new(ReportTrustee::with_scan_level(scan_level)));
    let handle = AclComparerWorker::new(services)
        .start(&root)
        .context("failed to start the comparison")?;

    for item in handle.events.iter() {
        match item {
            CompareProgress::Mismatch(m) => {
                tracing::info!("{}: {} (parent {})", m.path, m.reason, m.parent_path)
            }
            CompareProgress::Error(e) => tracing::warn!("{}: {}", e.path, e.reason),
        }
    }

    let (_, completion) = handle.finish();
    tracing::info!(
        "{} folders compared, {} mismatches, {} errors in {:.2?}",
        completion.folders_compared,
        completion.mismatches,
        completion.errors,
        completion.duration,
    );

    match completion.outcome {
        WorkerOutcome::Completed | WorkerOutcome::Cancelled => Ok(()),
        WorkerOutcome::Failed(e) => Err(e).with_context(|| format!("cannot compare {root}")),
    }
}
