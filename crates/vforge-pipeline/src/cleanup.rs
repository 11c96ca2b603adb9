//! Best-effort removal of ephemeral artifacts.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use vforge_models::ArtifactRef;

use crate::executor::RunContext;
use crate::metrics;
use crate::tracker::ArtifactTracker;

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    /// Local copies of uploaded artifacts removed
    pub released: usize,
    /// Tracked but never written, or already gone
    pub missing: usize,
    /// Protected because they are the source or a durable locator
    pub skipped: usize,
    pub failed: usize,
    /// Cleanup disabled for this deployment
    pub disabled: bool,
}

/// Deletes whatever remains in a request's cleanup set.
#[derive(Debug, Clone, Copy)]
pub struct CleanupManager {
    enabled: bool,
}

impl CleanupManager {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Delete every pending file except the source and durable locators,
    /// then the local copies of uploaded artifacts, then the work dir.
    ///
    /// Failures are logged and counted, never returned.
    pub async fn sweep(
        &self,
        ctx: &RunContext,
        tracker: ArtifactTracker,
        source: &ArtifactRef,
        durable: &[ArtifactRef],
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        if !self.enabled {
            debug!(
                request_id = %ctx.request_id,
                pending = tracker.len(),
                "Artifact cleanup disabled, keeping files"
            );
            report.disabled = true;
            return report;
        }

        let protected = |path: &Path| {
            path == Path::new(&source.locator)
                || durable.iter().any(|d| path == Path::new(&d.locator))
        };

        let (pending, promoted) = tracker.into_parts();
        for path in pending {
            if protected(&path) {
                report.skipped += 1;
                continue;
            }
            match remove(ctx, &path).await {
                Removal::Deleted => report.deleted += 1,
                Removal::Missing => report.missing += 1,
                Removal::Failed => report.failed += 1,
            }
        }

        // the durable copy is authoritative once uploaded
        for path in promoted {
            if protected(&path) {
                report.skipped += 1;
                continue;
            }
            match remove(ctx, &path).await {
                Removal::Deleted => report.released += 1,
                Removal::Missing => report.missing += 1,
                Removal::Failed => report.failed += 1,
            }
        }

        // only succeeds once the directory is empty
        if tokio::fs::remove_dir(&ctx.work_dir).await.is_ok() {
            debug!(request_id = %ctx.request_id, "Removed request work dir");
        }

        metrics::record_cleanup(report.deleted + report.released);
        debug!(
            request_id = %ctx.request_id,
            deleted = report.deleted,
            released = report.released,
            missing = report.missing,
            failed = report.failed,
            "Cleanup finished"
        );
        report
    }
}

enum Removal {
    Deleted,
    Missing,
    Failed,
}

async fn remove(ctx: &RunContext, path: &Path) -> Removal {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Removal::Deleted,
        Err(e) if e.kind() == ErrorKind::NotFound => Removal::Missing,
        Err(e) => {
            warn!(
                request_id = %ctx.request_id,
                path = %path.display(),
                error = %e,
                "Failed to delete ephemeral artifact"
            );
            Removal::Failed
        }
    }
}
