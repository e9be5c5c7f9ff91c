/// ACL comparison: flags folders whose ACL differs from their nearest
/// ancestor's ACL.
///
/// Two engines share the same comparison and depth-limit rules:
/// - [`task::AclCompareTask`] walks recursively on a background thread and
///   reports through a callback; access-denied children are reported as
///   error items.
/// - [`worker::AclComparerWorker`] walks with an explicit frame stack and
///   reports over crossbeam channels; access-denied children are only
///   logged.
///
/// Both always compare a child against the ACL of the directory it was
/// listed from, never against the scan root.
pub mod task;
pub mod worker;

#[cfg(test)]
mod fakes;

use crate::error::ScanError;
use crate::model::{AclModel, FolderStatus};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

pub use task::{AclCompareTask, CompareHandle};
pub use worker::{
    AclComparerWorker, DeniedChildPolicy, WorkerCompletion, WorkerHandle, WorkerOptions,
    WorkerOutcome,
};

/// Maximum number of progress messages that may queue up in the worker's
/// event channel before the walk blocks on the consumer.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

pub const MISMATCH_REASON: &str = "Permissions differ from the parent folder.";
pub const ACCESS_DENIED_REASON: &str = "Access denied.";
pub const PATH_TOO_LONG_REASON: &str = "The path name is too long.";
pub const UNHANDLED_REASON: &str = "Unhandled error.";

/// A folder whose ACL differs from its parent's.
#[derive(Debug, Clone, Serialize)]
pub struct AclComparisonResult {
    pub path: String,
    pub parent_path: String,
    pub reason: String,
    /// The folder's own ACL, which became the baseline for its subtree.
    pub acl: Vec<AclModel>,
}

impl AclComparisonResult {
    pub(crate) fn mismatch(path: &Path, parent: &Path, acl: &[AclModel]) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            parent_path: parent.to_string_lossy().into_owned(),
            reason: MISMATCH_REASON.to_string(),
            acl: acl.to_vec(),
        }
    }
}

/// A folder that could not be compared.
#[derive(Debug)]
pub struct AclComparisonError {
    pub path: String,
    pub reason: String,
    pub status: FolderStatus,
    pub source: Option<ScanError>,
}

impl AclComparisonError {
    pub fn access_denied(path: &Path) -> Self {
        let path = path.to_string_lossy().into_owned();
        Self {
            reason: ACCESS_DENIED_REASON.to_string(),
            status: FolderStatus::AccessDeniedError,
            source: Some(ScanError::AccessDenied { path: path.clone() }),
            path,
        }
    }

    /// Classify a per-folder failure.
    ///
    /// Too-long paths and access denials get fixed reasons, I/O failures
    /// carry the underlying message, anything else is unhandled.
    pub fn from_error(path: &Path, error: ScanError) -> Self {
        let reason = match &error {
            ScanError::PathTooLong { .. } => PATH_TOO_LONG_REASON.to_string(),
            ScanError::AccessDenied { .. } => ACCESS_DENIED_REASON.to_string(),
            ScanError::Io { source, .. } => source.to_string(),
            ScanError::Enumerator { source, .. } => source.to_string(),
            _ => UNHANDLED_REASON.to_string(),
        };
        Self {
            path: path.to_string_lossy().into_owned(),
            reason,
            status: error.status(),
            source: Some(error),
        }
    }
}

/// One item reported while comparing.
#[derive(Debug)]
pub enum CompareProgress {
    Mismatch(AclComparisonResult),
    Error(AclComparisonError),
}

impl CompareProgress {
    pub fn path(&self) -> &str {
        match self {
            Self::Mismatch(m) => &m.path,
            Self::Error(e) => &e.path,
        }
    }
}

/// Totals of a finished comparison run.
#[derive(Debug, Clone, Serialize)]
pub struct CompareSummary {
    /// Folders whose ACL was fetched and compared.
    pub folders_compared: u64,
    pub mismatches: u64,
    pub errors: u64,
    pub cancelled: bool,
    pub duration: Duration,
    pub finished_at: DateTime<Local>,
}

/// Running counters shared by both engines.
#[derive(Debug)]
pub(crate) struct Tally {
    started: Instant,
    pub folders_compared: u64,
    pub mismatches: u64,
    pub errors: u64,
}

impl Tally {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            folders_compared: 0,
            mismatches: 0,
            errors: 0,
        }
    }

    pub fn record(&mut self, item: &CompareProgress) {
        match item {
            CompareProgress::Mismatch(_) => self.mismatches += 1,
            CompareProgress::Error(_) => self.errors += 1,
        }
    }

    pub fn summary(&self, cancelled: bool) -> CompareSummary {
        CompareSummary {
            folders_compared: self.folders_compared,
            mismatches: self.mismatches,
            errors: self.errors,
            cancelled,
            duration: self.started.elapsed(),
            finished_at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FindError;

    #[test]
    fn error_reasons_follow_failure_kind() {
        let p = Path::new("/srv/x");

        let e = AclComparisonError::from_error(p, ScanError::PathTooLong { path: "x".into() });
        assert_eq!(e.reason, PATH_TOO_LONG_REASON);
        assert_eq!(e.status, FolderStatus::PathTooLongError);

        let e = AclComparisonError::from_error(
            p,
            ScanError::Io {
                path: "x".into(),
                source: std::io::Error::other("network name no longer available"),
            },
        );
        assert_eq!(e.reason, "network name no longer available");

        let e = AclComparisonError::from_error(
            p,
            ScanError::Enumerator {
                path: "x".into(),
                source: FindError::Os {
                    path: "x".into(),
                    code: 21,
                    message: "device not ready".into(),
                },
            },
        );
        assert!(e.reason.contains("device not ready"));

        let e = AclComparisonError::from_error(p, ScanError::Service("boom".into()));
        assert_eq!(e.reason, UNHANDLED_REASON);
        assert!(e.source.is_some());
    }

    #[test]
    fn access_denied_item() {
        let e = AclComparisonError::access_denied(Path::new("/srv/locked"));
        assert_eq!(e.reason, "Access denied.");
        assert_eq!(e.status, FolderStatus::AccessDeniedError);
        assert_eq!(e.path, "/srv/locked");
    }

    #[test]
    fn tally_counts_items() {
        let mut tally = Tally::start();
        tally.record(&CompareProgress::Error(AclComparisonError::access_denied(
            Path::new("a"),
        )));
        tally.record(&CompareProgress::Mismatch(AclComparisonResult::mismatch(
            Path::new("a/b"),
            Path::new("a"),
            &[],
        )));
        let summary = tally.summary(false);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.mismatches, 1);
        assert!(!summary.cancelled);
    }
}
