/// Native entry enumerator: one directory, one search handle.
///
/// On Windows this drives `FindFirstFileExW` / `FindNextFileW` directly
/// (basic info level, large-fetch buffering) and applies long-path
/// normalization before opening. Elsewhere it wraps the `readdir` stream
/// behind `std::fs::ReadDir`.
///
/// # Handle lifetime
///
/// The search handle is an RAII guard owned by the enumerator. It is
/// released the moment the listing is exhausted, when a listing error is
/// reported, on [`FindFileEnumerator::close`], or on drop, whichever comes
/// first. Advancing a closed enumerator keeps returning `None`.
use crate::error::FindError;
use compact_str::CompactString;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

/// One raw record from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: CompactString,
    pub is_directory: bool,
    pub is_hidden: bool,
    /// Junctions and symbolic links. These are never walked into.
    pub is_reparse_point: bool,
    /// Logical size in bytes; zero for directories.
    pub size: u64,
}

impl RawEntry {
    /// `true` for the `.` and `..` pseudo-entries.
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// `true` for a real subdirectory that may be descended into.
    pub fn is_walkable_directory(&self) -> bool {
        self.is_directory && !self.is_reparse_point && !self.is_dot()
    }
}

/// Stateful iterator over one directory's native listing.
pub struct FindFileEnumerator {
    path: PathBuf,
    handle: Option<imp::SearchHandle>,
}

impl FindFileEnumerator {
    /// Open a search handle on `path`.
    ///
    /// Fails with a typed [`FindError`] when the directory cannot be
    /// listed. An empty listing is not an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FindError> {
        let path = path.as_ref().to_path_buf();
        let handle = imp::open(&path)?;
        Ok(Self { path, handle })
    }

    /// Directory this enumerator lists.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` while the search handle is held.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Re-open the handle and restart from the first entry.
    pub fn reset(&mut self) -> Result<(), FindError> {
        self.close();
        self.handle = imp::open(&self.path)?;
        Ok(())
    }

    /// Release the search handle. Idempotent.
    pub fn close(&mut self) {
        self.handle = None;
    }
}

impl Iterator for FindFileEnumerator {
    type Item = Result<RawEntry, FindError>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.handle.as_mut()?;
        match handle.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                self.close();
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for FindFileEnumerator {}

impl std::fmt::Debug for FindFileEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindFileEnumerator")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(windows)]
mod imp {
    use super::RawEntry;
    use crate::error::FindError;
    use crate::platform::long_path::normalize_long_path;
    use compact_str::CompactString;
    use std::path::Path;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{
        ERROR_ACCESS_DENIED, ERROR_FILENAME_EXCED_RANGE, ERROR_FILE_NOT_FOUND,
        ERROR_NO_MORE_FILES, ERROR_PATH_NOT_FOUND, HANDLE,
    };
    use windows::Win32::Storage::FileSystem::{
        FindClose, FindExInfoBasic, FindExSearchNameMatch, FindFirstFileExW, FindNextFileW,
        FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_HIDDEN, FILE_ATTRIBUTE_REPARSE_POINT,
        FIND_FIRST_EX_LARGE_FETCH, WIN32_FIND_DATAW,
    };

    /// Owned `FindFirstFileExW` handle. Closed on drop.
    pub struct SearchHandle {
        handle: HANDLE,
        /// `FindFirstFileExW` already returned the first record.
        first: Option<RawEntry>,
        path: String,
    }

    impl Drop for SearchHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = FindClose(self.handle);
            }
        }
    }

    impl SearchHandle {
        pub fn next_entry(&mut self) -> Result<Option<RawEntry>, FindError> {
            if let Some(first) = self.first.take() {
                return Ok(Some(first));
            }

            let mut data = WIN32_FIND_DATAW::default();
            match unsafe { FindNextFileW(self.handle, &mut data) } {
                Ok(()) => Ok(Some(to_entry(&data))),
                Err(e) if e.code() == ERROR_NO_MORE_FILES.to_hresult() => Ok(None),
                Err(e) => Err(classify(&self.path, &e)),
            }
        }
    }

    pub fn open(path: &Path) -> Result<Option<SearchHandle>, FindError> {
        let display = path.to_string_lossy().into_owned();
        let native = normalize_long_path(&display)?;
        let pattern = format!("{}\\*", native.trim_end_matches(['\\', '/']));
        let wide: Vec<u16> = pattern.encode_utf16().chain(std::iter::once(0)).collect();

        let mut data = WIN32_FIND_DATAW::default();
        let result = unsafe {
            FindFirstFileExW(
                PCWSTR(wide.as_ptr()),
                FindExInfoBasic,
                &mut data as *mut WIN32_FIND_DATAW as *mut core::ffi::c_void,
                FindExSearchNameMatch,
                None,
                FIND_FIRST_EX_LARGE_FETCH,
            )
        };

        match result {
            Ok(handle) => Ok(Some(SearchHandle {
                handle,
                first: Some(to_entry(&data)),
                path: display,
            })),
            // Nothing matched the pattern: an empty listing, not a failure.
            Err(e)
                if e.code() == ERROR_FILE_NOT_FOUND.to_hresult()
                    || e.code() == ERROR_NO_MORE_FILES.to_hresult() =>
            {
                Ok(None)
            }
            Err(e) => Err(classify(&display, &e)),
        }
    }

    fn to_entry(data: &WIN32_FIND_DATAW) -> RawEntry {
        let len = data
            .cFileName
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(data.cFileName.len());
        let name = String::from_utf16_lossy(&data.cFileName[..len]);
        let attrs = data.dwFileAttributes;
        let is_directory = attrs & FILE_ATTRIBUTE_DIRECTORY.0 != 0;

        RawEntry {
            name: CompactString::new(name),
            is_directory,
            is_hidden: attrs & FILE_ATTRIBUTE_HIDDEN.0 != 0,
            is_reparse_point: attrs & FILE_ATTRIBUTE_REPARSE_POINT.0 != 0,
            size: if is_directory {
                0
            } else {
                ((data.nFileSizeHigh as u64) << 32) | data.nFileSizeLow as u64
            },
        }
    }

    fn classify(path: &str, err: &windows::core::Error) -> FindError {
        let code = err.code();
        let path = path.to_string();
        if code == ERROR_ACCESS_DENIED.to_hresult() {
            FindError::AccessDenied { path }
        } else if code == ERROR_FILENAME_EXCED_RANGE.to_hresult() {
            FindError::PathTooLong { path }
        } else if code == ERROR_PATH_NOT_FOUND.to_hresult() {
            FindError::NotFound { path }
        } else {
            FindError::Os {
                path,
                code: code.0,
                message: err.message().to_string(),
            }
        }
    }
}

#[cfg(not(windows))]
mod imp {
    use super::RawEntry;
    use crate::error::FindError;
    use compact_str::CompactString;
    use std::fs::ReadDir;
    use std::io;
    use std::path::Path;

    #[cfg(target_os = "linux")]
    const ENAMETOOLONG: i32 = 36;
    #[cfg(not(target_os = "linux"))]
    const ENAMETOOLONG: i32 = 63;

    /// Owned `readdir` stream. Closed on drop.
    pub struct SearchHandle {
        dir: ReadDir,
        path: String,
    }

    impl SearchHandle {
        pub fn next_entry(&mut self) -> Result<Option<RawEntry>, FindError> {
            let entry = match self.dir.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(classify(&self.path, &e)),
                Some(Ok(entry)) => entry,
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .map_err(|e| classify(&self.path, &e))?;
            // A file removed between readdir and stat counts as empty.
            let size = if file_type.is_file() {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            } else {
                0
            };

            Ok(Some(RawEntry {
                is_hidden: name.starts_with('.'),
                name: CompactString::new(name),
                is_directory: file_type.is_dir(),
                is_reparse_point: file_type.is_symlink(),
                size,
            }))
        }
    }

    pub fn open(path: &Path) -> Result<Option<SearchHandle>, FindError> {
        let display = path.to_string_lossy().into_owned();
        match std::fs::read_dir(path) {
            Ok(dir) => Ok(Some(SearchHandle { dir, path: display })),
            Err(e) => Err(classify(&display, &e)),
        }
    }

    fn classify(path: &str, err: &io::Error) -> FindError {
        let path = path.to_string();
        match err.kind() {
            io::ErrorKind::PermissionDenied => FindError::AccessDenied { path },
            io::ErrorKind::NotFound => FindError::NotFound { path },
            _ if err.raw_os_error() == Some(ENAMETOOLONG) => FindError::PathTooLong { path },
            _ => FindError::Os {
                path,
                code: err.raw_os_error().unwrap_or(-1),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(entries: impl Iterator<Item = Result<RawEntry, FindError>>) -> Vec<String> {
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap())
            .filter(|e| !e.is_dot())
            .map(|e| e.name.to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn lists_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();

        let entries: Vec<RawEntry> = FindFileEnumerator::open(tmp.path())
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| !e.is_dot())
            .collect();
        assert_eq!(entries.len(), 2);

        let sub = entries.iter().find(|e| e.name == "sub").unwrap();
        assert!(sub.is_walkable_directory());
        let file = entries.iter().find(|e| e.name == "a.txt").unwrap();
        assert!(!file.is_directory);
        assert_eq!(file.size, 5);
    }

    #[test]
    fn advancing_after_exhaustion_stays_exhausted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("only.bin"), b"x").unwrap();

        let mut it = FindFileEnumerator::open(tmp.path()).unwrap();
        while it.next().is_some() {}
        assert!(!it.is_open(), "handle must be released on exhaustion");
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn reset_restarts_from_first_entry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one"), b"1").unwrap();
        fs::write(tmp.path().join("two"), b"2").unwrap();

        let mut it = FindFileEnumerator::open(tmp.path()).unwrap();
        let first_pass = names(it.by_ref());
        it.reset().unwrap();
        assert!(it.is_open());
        let second_pass = names(it.by_ref());
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass, vec!["one", "two"]);
    }

    #[test]
    fn close_releases_handle_early() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one"), b"1").unwrap();

        let mut it = FindFileEnumerator::open(tmp.path()).unwrap();
        it.close();
        assert!(!it.is_open());
        assert!(it.next().is_none());
    }

    #[test]
    fn missing_directory_is_a_typed_error() {
        let tmp = TempDir::new().unwrap();
        let err = FindFileEnumerator::open(tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, FindError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let it = FindFileEnumerator::open(tmp.path()).unwrap();
        assert!(names(it).is_empty());
    }
}
