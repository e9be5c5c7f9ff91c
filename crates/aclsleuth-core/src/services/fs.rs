/// Directory lister backed by the native entry enumerator.
///
/// Each listed subdirectory is probed once with its own search handle. The
/// probe tells whether the child can be opened at all (access denied) and
/// whether it has subdirectories, so callers can classify children without
/// issuing further listing calls.
use super::DirectoryLister;
use crate::error::{FindError, ScanError};
use crate::model::{FileStats, FolderEntry};
use crate::platform::FindFileEnumerator;
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryLister;

impl FsDirectoryLister {
    pub fn new() -> Self {
        Self
    }
}

/// `Ok(true)` as soon as one walkable subdirectory is seen.
fn probe_sub_folders(path: &Path) -> Result<bool, FindError> {
    for entry in FindFileEnumerator::open(path)? {
        if entry?.is_walkable_directory() {
            return Ok(true);
        }
    }
    Ok(false)
}

impl DirectoryLister for FsDirectoryLister {
    fn get_directories(&self, path: &Path) -> Result<Vec<FolderEntry>, ScanError> {
        let mut folders = Vec::new();

        for entry in FindFileEnumerator::open(path)? {
            let entry = entry?;
            if !entry.is_directory || entry.is_dot() {
                continue;
            }
            if entry.is_reparse_point {
                trace!("Skipping reparse point {}\\{}", path.display(), entry.name);
                continue;
            }

            let full_path = path.join(entry.name.as_str());
            let (has_sub_folders, access_denied) = match probe_sub_folders(&full_path) {
                Ok(has) => (has, false),
                Err(FindError::AccessDenied { .. }) => (false, true),
                // Let the descent surface the real error for this folder.
                Err(e) => {
                    debug!("Probe of {} failed: {e}", full_path.display());
                    (true, false)
                }
            };

            folders.push(FolderEntry {
                full_path,
                name: entry.name,
                has_sub_folders,
                access_denied,
                is_hidden: entry.is_hidden,
            });
        }

        Ok(folders)
    }

    fn has_sub_folders(&self, path: &Path) -> Result<bool, ScanError> {
        Ok(probe_sub_folders(path)?)
    }

    fn file_stats(&self, path: &Path) -> Result<FileStats, ScanError> {
        let mut stats = FileStats::default();
        for entry in FindFileEnumerator::open(path)? {
            let entry = entry?;
            if entry.is_directory {
                continue;
            }
            stats.file_count += 1;
            stats.size += entry.size;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lists_only_directories_with_probe_results() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("parent/child")).unwrap();
        fs::create_dir(tmp.path().join("leaf")).unwrap();
        fs::write(tmp.path().join("file.txt"), b"abc").unwrap();

        let mut folders = FsDirectoryLister::new().get_directories(tmp.path()).unwrap();
        folders.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "leaf");
        assert!(!folders[0].has_sub_folders);
        assert_eq!(folders[1].name, "parent");
        assert!(folders[1].has_sub_folders);
        assert!(folders.iter().all(|f| !f.access_denied));
    }

    #[test]
    fn file_stats_counts_direct_files_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested/ignored.bin"), vec![0u8; 50]).unwrap();
        fs::write(tmp.path().join("a.bin"), vec![0u8; 100]).unwrap();
        fs::write(tmp.path().join("b.bin"), vec![0u8; 200]).unwrap();

        let stats = FsDirectoryLister::new().file_stats(tmp.path()).unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.size, 300);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = FsDirectoryLister::new().get_directories(&tmp.path().join("nope"));
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_listed() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("link")).unwrap();

        let folders = FsDirectoryLister::new().get_directories(tmp.path()).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "real");
    }
}
