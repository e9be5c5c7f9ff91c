/// Folder records produced by directory listing and by the report builder.
///
/// [`FolderEntry`] is the lightweight result of one listing call.
/// [`FolderReport`] is the per-folder output row of a scan, carrying
/// aggregated counts and a failure classification.
use crate::error::ScanError;
use compact_str::CompactString;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

/// One directory discovered by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderEntry {
    /// Full path of the directory, as handed to subsequent listing calls.
    pub full_path: PathBuf,
    /// Directory name only.
    pub name: CompactString,
    /// `true` if the directory contains at least one subdirectory.
    pub has_sub_folders: bool,
    /// `true` if the directory itself could not be opened for listing.
    pub access_denied: bool,
    /// Hidden attribute on Windows, dot-prefixed name elsewhere.
    pub is_hidden: bool,
}

impl FolderEntry {
    /// Create an entry for a readable, visible directory.
    pub fn new(full_path: impl Into<PathBuf>, has_sub_folders: bool) -> Self {
        let full_path = full_path.into();
        let name = entry_name(&full_path);
        Self {
            full_path,
            name,
            has_sub_folders,
            access_denied: false,
            is_hidden: false,
        }
    }

    /// Mark the entry as access denied.
    pub fn denied(mut self) -> Self {
        self.access_denied = true;
        self
    }

    /// Mark the entry as hidden.
    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    /// Full path rendered for report rows.
    pub fn display_path(&self) -> String {
        self.full_path.to_string_lossy().into_owned()
    }
}

/// Derive the display name of a folder from its path.
///
/// Drive roots like `C:\` have no file name; the trimmed path is used.
pub(crate) fn entry_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => {
            let s = path.to_string_lossy();
            CompactString::new(s.trim_end_matches(['\\', '/']))
        }
    }
}

/// Direct file totals of a single folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub file_count: u64,
    /// Sum of logical file sizes in bytes.
    pub size: u64,
}

impl std::ops::AddAssign for FileStats {
    fn add_assign(&mut self, rhs: Self) {
        self.file_count += rhs.file_count;
        self.size += rhs.size;
    }
}

/// Outcome classification of one reported folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FolderStatus {
    Ok,
    AccessDeniedError,
    PathTooLongError,
    OtherError,
}

impl FolderStatus {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::AccessDeniedError => "Access denied",
            Self::PathTooLongError => "Path too long",
            Self::OtherError => "Error",
        }
    }
}

/// One row of a folder scan.
///
/// Invariant: `status != Ok` exactly when `exception` is set, and in that
/// case every count and size is zero.
#[derive(Debug, Serialize)]
pub struct FolderReport {
    pub full_name: String,
    pub name: CompactString,
    pub file_count: u64,
    /// Bytes in the folder's own files.
    pub size: u64,
    pub file_count_incl_sub: u64,
    /// Bytes in the whole subtree.
    pub size_incl_sub: u64,
    pub owner: Option<String>,
    pub status: FolderStatus,
    #[serde(serialize_with = "serialize_exception")]
    pub exception: Option<ScanError>,
}

impl FolderReport {
    /// A successful report with no counts filled in yet.
    pub fn ok(entry: &FolderEntry) -> Self {
        Self {
            full_name: entry.display_path(),
            name: entry.name.clone(),
            file_count: 0,
            size: 0,
            file_count_incl_sub: 0,
            size_incl_sub: 0,
            owner: None,
            status: FolderStatus::Ok,
            exception: None,
        }
    }

    /// A failed report; the status is derived from the error.
    pub fn failed(entry: &FolderEntry, error: ScanError) -> Self {
        Self {
            status: error.status(),
            exception: Some(error),
            ..Self::ok(entry)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FolderStatus::Ok
    }

    /// Fill in the folder's own totals.
    pub fn with_stats(mut self, own: FileStats) -> Self {
        self.file_count = own.file_count;
        self.size = own.size;
        self
    }

    /// Fill in the subtree totals.
    pub fn with_subtree_stats(mut self, subtree: FileStats) -> Self {
        self.file_count_incl_sub = subtree.file_count;
        self.size_incl_sub = subtree.size;
        self
    }
}

fn serialize_exception<S: Serializer>(
    exception: &Option<ScanError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match exception {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Configuration for one [`crate::report::FolderReportBuilder`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderEnumeratorOptions {
    /// Recurse below the root's direct children.
    pub include_subtree: bool,
    /// Report hidden folders (and walk into them).
    pub include_hidden: bool,
    /// Yield the root itself as the first report.
    pub include_current_folder: bool,
    /// Count the files directly inside each folder.
    pub include_file_count: bool,
    /// Count the files in each folder's whole subtree.
    pub include_file_count_for_subtree: bool,
    /// Resolve each folder's owner.
    pub include_owner: bool,
    /// Only yield folders whose owner contains this text
    /// (case-insensitive). Ignored unless `include_owner` is set.
    pub owner_filter: Option<String>,
    /// Deepest folder level that gets listed, root = 0. `0` = unlimited.
    pub scan_level: u32,
}

impl FolderEnumeratorOptions {
    /// Options for a full recursive walk with file counts.
    pub fn recursive() -> Self {
        Self {
            include_subtree: true,
            include_file_count: true,
            ..Self::default()
        }
    }

    /// `true` when the owner of a folder passes the owner filter.
    pub(crate) fn owner_matches(&self, owner: Option<&str>) -> bool {
        let Some(filter) = self.owner_filter.as_deref().filter(|f| !f.is_empty()) else {
            return true;
        };
        if !self.include_owner {
            return true;
        }
        owner.is_some_and(|o| o.to_lowercase().contains(&filter.to_lowercase()))
    }
}
