/// Long-path normalization for the Win32 file APIs.
///
/// Paths longer than the traditional limit must be passed to the wide-char
/// APIs with the `\\?\` marker, which also switches off the API's own path
/// parsing. The conversion is purely string based so it can be exercised on
/// any platform.
use crate::error::FindError;
use std::borrow::Cow;

/// Traditional Win32 path limit in UTF-16 units, terminator included.
pub const MAX_PATH: usize = 260;

/// Longest directory path usable without the marker. Directory APIs reserve
/// room for an 8.3 file name below the directory.
pub const LONG_PATH_THRESHOLD: usize = MAX_PATH - 12;

/// Hard limit for marker-prefixed paths.
pub const MAX_EXTENDED_PATH: usize = 32_767;

pub const EXTENDED_PREFIX: &str = r"\\?\";
pub const EXTENDED_UNC_PREFIX: &str = r"\\?\UNC\";

/// `true` if `path` already carries an extended-length or device marker.
pub fn is_extended(path: &str) -> bool {
    path.starts_with(EXTENDED_PREFIX) || path.starts_with(r"\\.\")
}

/// `true` if `path` is long enough to need the extended marker.
pub fn needs_long_path_prefix(path: &str) -> bool {
    !is_extended(path) && utf16_len(path) >= LONG_PATH_THRESHOLD
}

/// Convert `path` into the form the native API accepts.
///
/// Short or already-prefixed paths are returned untouched. Long absolute
/// paths get `\\?\` (drive paths) or `\\?\UNC\` (UNC paths), with forward
/// slashes turned into backslashes since the marker disables that
/// conversion. Relative long paths and paths beyond the extended limit
/// cannot be normalized.
pub fn normalize_long_path(path: &str) -> Result<Cow<'_, str>, FindError> {
    if utf16_len(path) > MAX_EXTENDED_PATH {
        return Err(FindError::PathTooLong {
            path: path.to_string(),
        });
    }
    if !needs_long_path_prefix(path) {
        return Ok(Cow::Borrowed(path));
    }

    let backslashed = path.replace('/', "\\");
    let normalized = if let Some(unc) = backslashed.strip_prefix(r"\\") {
        format!("{EXTENDED_UNC_PREFIX}{unc}")
    } else if is_drive_absolute(&backslashed) {
        format!("{EXTENDED_PREFIX}{backslashed}")
    } else {
        return Err(FindError::PathTooLong {
            path: path.to_string(),
        });
    };

    if utf16_len(&normalized) > MAX_EXTENDED_PATH {
        return Err(FindError::PathTooLong {
            path: path.to_string(),
        });
    }
    Ok(Cow::Owned(normalized))
}

/// Strip an extended marker again, for display.
pub fn strip_long_path_prefix(path: &str) -> Cow<'_, str> {
    if let Some(rest) = path.strip_prefix(EXTENDED_UNC_PREFIX) {
        Cow::Owned(format!(r"\\{rest}"))
    } else if let Some(rest) = path.strip_prefix(EXTENDED_PREFIX) {
        Cow::Borrowed(rest)
    } else {
        Cow::Borrowed(path)
    }
}

fn is_drive_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\'
}

fn utf16_len(path: &str) -> usize {
    path.encode_utf16().count()
}
