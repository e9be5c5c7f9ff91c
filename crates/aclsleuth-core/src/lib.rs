/// AclSleuth Core: folder enumeration and ACL comparison engine.
///
/// This crate contains all business logic with zero UI dependencies.
/// It is designed to be reusable across different frontends (GUI, CLI,
/// report exporters).
///
/// # Modules
///
/// - [`error`]: Error taxonomy shared by every component.
/// - [`platform`]: Native directory enumeration, long-path handling, and
///   security-descriptor reading (Windows) or mode-bit reading (elsewhere).
/// - [`model`]: Folder entries, folder reports, and the ACL model.
/// - [`services`]: Collaborator traits plus their native implementations.
/// - [`path_util`]: String-based path depth arithmetic.
/// - [`report`]: Lazy folder-report stream with size/owner aggregation.
/// - [`compare`]: Parent/child ACL comparison, recursive and iterative.
pub mod compare;
pub mod error;
pub mod model;
pub mod path_util;
pub mod platform;
pub mod report;
pub mod services;

pub use error::{FindError, ScanError};
