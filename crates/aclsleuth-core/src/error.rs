/// Error taxonomy for enumeration and comparison.
///
/// Two layers exist:
/// - [`FindError`] is raised by the native entry enumerator and carries the
///   OS-level classification of a failed listing call.
/// - [`ScanError`] is what every higher component deals in. Per-folder
///   failures are converted into report/error items using
///   [`ScanError::status`]; only failures on the scan root propagate.
use crate::model::FolderStatus;
use std::io;
use thiserror::Error;

/// Failure of a native directory listing call.
///
/// "No more files" is not an error; the enumerator reports it as
/// exhaustion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("the path name is too long: {path}")]
    PathTooLong { path: String },

    #[error("path not found: {path}")]
    NotFound { path: String },

    #[error("listing {path} failed with OS error {code}: {message}")]
    Os {
        path: String,
        code: i32,
        message: String,
    },
}

impl FindError {
    /// Path the failed call was issued for.
    pub fn path(&self) -> &str {
        match self {
            Self::AccessDenied { path }
            | Self::PathTooLong { path }
            | Self::NotFound { path }
            | Self::Os { path, .. } => path,
        }
    }
}

/// Error type used by the report builder, the compare task and the worker.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A required argument was null or blank. Nothing was executed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The call was well-formed but cannot be carried out for these inputs.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("the path name is too long: {path}")]
    PathTooLong { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A listing fault surfaced by the native enumerator.
    #[error("directory enumeration failed for {path}: {source}")]
    Enumerator {
        path: String,
        #[source]
        source: FindError,
    },

    /// A fault reported by a collaborator service (directory lister, ACL
    /// provider, trustee source).
    #[error("service error: {0}")]
    Service(String),

    #[error("unhandled error: {0}")]
    Unhandled(String),
}

impl ScanError {
    /// Classify this error for a per-folder report.
    pub fn status(&self) -> FolderStatus {
        match self {
            Self::AccessDenied { .. }
            | Self::Enumerator {
                source: FindError::AccessDenied { .. },
                ..
            } => FolderStatus::AccessDeniedError,
            Self::PathTooLong { .. }
            | Self::Enumerator {
                source: FindError::PathTooLong { .. },
                ..
            } => FolderStatus::PathTooLongError,
            Self::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
                FolderStatus::AccessDeniedError
            }
            _ => FolderStatus::OtherError,
        }
    }

    /// `true` for I/O-flavoured failures (OS errors surfaced by listing or
    /// security calls), as opposed to collaborator or logic faults.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Enumerator { .. })
    }

    /// Wrap an `io::Error` raised for `path`, keeping permission failures
    /// distinguishable.
    pub fn from_io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            return Self::AccessDenied {
                path: path.to_string(),
            };
        }
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

impl From<FindError> for ScanError {
    fn from(err: FindError) -> Self {
        match err {
            FindError::AccessDenied { path } => Self::AccessDenied { path },
            FindError::PathTooLong { path } => Self::PathTooLong { path },
            other => Self::Enumerator {
                path: other.path().to_string(),
                source: other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_errors_map_to_typed_scan_errors() {
        let denied: ScanError = FindError::AccessDenied { path: "a".into() }.into();
        assert_eq!(denied.status(), FolderStatus::AccessDeniedError);

        let long: ScanError = FindError::PathTooLong { path: "a".into() }.into();
        assert_eq!(long.status(), FolderStatus::PathTooLongError);

        let os: ScanError = FindError::Os {
            path: "a".into(),
            code: 21,
            message: "device not ready".into(),
        }
        .into();
        assert_eq!(os.status(), FolderStatus::OtherError);
        assert!(os.is_io());
    }

    #[test]
    fn permission_denied_io_is_access_denied() {
        let err = ScanError::from_io("x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ScanError::AccessDenied { .. }));

        let err = ScanError::from_io("x", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.status(), FolderStatus::OtherError);
        assert!(err.is_io());
    }

    #[test]
    fn service_errors_are_not_io() {
        let err = ScanError::Service("lister offline".into());
        assert!(!err.is_io());
        assert_eq!(err.status(), FolderStatus::OtherError);
    }
}
