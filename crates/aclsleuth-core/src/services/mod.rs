/// Collaborator contracts consumed by the report builder and the
/// comparison engine, plus their native implementations.
///
/// Every collaborator is shared as an `Arc<dyn _>` so that a scan running
/// on a background thread and its caller can hold the same instances.
pub mod fs;
pub mod security;
pub mod trustee;

use crate::error::ScanError;
use crate::model::{AccessRule, AclModel, FileStats, FolderEntry};
use std::path::Path;
use std::sync::Arc;

pub use fs::FsDirectoryLister;
pub use security::{DefaultAclModelBuilder, NativeAclProvider};
pub use trustee::{ReportTrustee, SharedTrustee};

/// Lists the subdirectories of a folder.
pub trait DirectoryLister: Send + Sync {
    /// Direct subdirectories of `path`, in native listing order.
    fn get_directories(&self, path: &Path) -> Result<Vec<FolderEntry>, ScanError>;

    /// `true` if `entry` cannot be listed.
    fn is_access_denied(&self, entry: &FolderEntry) -> bool {
        entry.access_denied
    }

    /// `true` if `path` contains at least one subdirectory.
    fn has_sub_folders(&self, path: &Path) -> Result<bool, ScanError>;

    /// Count and total size of the files directly inside `path`.
    fn file_stats(&self, path: &Path) -> Result<FileStats, ScanError>;
}

/// Reads the security information of a folder.
pub trait AclViewProvider: Send + Sync {
    /// The folder's native ACL entries.
    fn get_acl_view(&self, path: &Path) -> Result<Vec<AccessRule>, ScanError>;

    /// The folder's owner account.
    fn get_owner(&self, path: &Path) -> Result<String, ScanError>;
}

/// Maps a native ACL entry into the comparable model.
pub trait AclModelBuilder: Send + Sync {
    /// `None` for entries that take no part in comparison.
    fn build(&self, rule: &AccessRule) -> Option<AclModel>;
}

/// Live source of the report trustee configuration.
///
/// Queried on every depth check; implementations must not assume the
/// value is cached by the caller.
pub trait TrusteeSource: Send + Sync {
    fn current_report_trustee(&self) -> ReportTrustee;
}

/// The set of collaborators one scan runs against.
#[derive(Clone)]
pub struct ScanServices {
    pub lister: Arc<dyn DirectoryLister>,
    pub acl_view: Arc<dyn AclViewProvider>,
    pub model_builder: Arc<dyn AclModelBuilder>,
    pub trustee: Arc<dyn TrusteeSource>,
}

impl ScanServices {
    /// Native filesystem lister, native security reader, default model
    /// mapping, and the given trustee source.
    pub fn native(trustee: Arc<dyn TrusteeSource>) -> Self {
        Self {
            lister: Arc::new(FsDirectoryLister::new()),
            acl_view: Arc::new(NativeAclProvider::new()),
            model_builder: Arc::new(DefaultAclModelBuilder),
            trustee,
        }
    }

    /// Fetch the ACL of `path` and map it into the comparable model.
    pub fn acl_models(&self, path: &Path) -> Result<Vec<AclModel>, ScanError> {
        let rules = self.acl_view.get_acl_view(path)?;
        Ok(rules
            .iter()
            .filter_map(|rule| self.model_builder.build(rule))
            .collect())
    }
}

impl std::fmt::Debug for ScanServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanServices")
            .field("trustee", &self.trustee.current_report_trustee())
            .finish_non_exhaustive()
    }
}
