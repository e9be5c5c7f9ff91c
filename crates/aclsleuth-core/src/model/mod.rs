/// Data model for folder reports and ACL comparison.
///
/// Re-exports the folder/report records and the ACL model types.
pub mod acl;
pub mod folder;

pub use acl::{
    is_acl_equal, AccessRule, AccountType, AceType, AclModel, FileSystemRights, InheritanceFlags,
    PropagationFlags,
};
pub use folder::{FileStats, FolderEntry, FolderEnumeratorOptions, FolderReport, FolderStatus};
