/// Folder report generation: a lazy, pre-order stream of per-folder rows
/// with optional size, file-count and owner aggregation.
pub mod builder;

pub use builder::{FolderReportBuilder, FolderReports};
