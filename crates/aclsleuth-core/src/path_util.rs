/// Path depth arithmetic.
///
/// Everything here is plain string handling; no path is validated against
/// the filesystem, so UNC paths and unusual drive-like prefixes (`#:/test`)
/// are treated exactly like local paths.
use crate::error::ScanError;
use std::path::MAIN_SEPARATOR;

/// Convert `/` to the platform separator, trim trailing separators, and
/// append exactly one.
///
/// The trailing separator makes root-like paths (`C:\`, `/`) and their
/// children compare as clean prefixes.
pub fn normalize_separators(path: &str) -> String {
    let converted: String = path
        .chars()
        .map(|c| if c == '/' { MAIN_SEPARATOR } else { c })
        .collect();
    let mut normalized = converted.trim_end_matches(MAIN_SEPARATOR).to_string();
    normalized.push(MAIN_SEPARATOR);
    normalized
}

fn segment_count(normalized: &str) -> usize {
    normalized
        .split(MAIN_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .count()
}

/// Number of path segments separating `descendant` from `ancestor`.
///
/// Fails with [`ScanError::InvalidArgument`] on blank input and with
/// [`ScanError::InvalidOperation`] when `descendant` is not nested under
/// `ancestor` (ordinal, case-sensitive prefix comparison).
pub fn get_path_depth(ancestor: &str, descendant: &str) -> Result<usize, ScanError> {
    if ancestor.trim().is_empty() {
        return Err(ScanError::InvalidArgument("ancestor path must not be blank"));
    }
    if descendant.trim().is_empty() {
        return Err(ScanError::InvalidArgument(
            "descendant path must not be blank",
        ));
    }

    let ancestor = normalize_separators(ancestor);
    let descendant = normalize_separators(descendant);

    if !descendant.starts_with(&ancestor) {
        return Err(ScanError::InvalidOperation(format!(
            "'{descendant}' is not located under '{ancestor}'"
        )));
    }

    Ok(segment_count(&descendant) - segment_count(&ancestor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_levels_below() {
        assert_eq!(get_path_depth("/var/lib", "/var/lib/depth-1/depth-2").unwrap(), 2);
    }

    #[test]
    fn same_path_is_depth_zero() {
        assert_eq!(get_path_depth("/var/lib", "/var/lib").unwrap(), 0);
        assert_eq!(get_path_depth("/var/lib/", "/var/lib").unwrap(), 0);
    }

    #[test]
    fn trailing_separators_are_ignored() {
        assert_eq!(get_path_depth("/var/lib///", "/var/lib/a/b/c/").unwrap(), 3);
    }

    #[test]
    fn sibling_path_is_rejected() {
        let err = get_path_depth("/var/lib", "/usr/lib").unwrap_err();
        assert!(matches!(err, ScanError::InvalidOperation(_)));
    }

    #[test]
    fn name_prefix_is_not_containment() {
        let err = get_path_depth("/var/lib", "/var/library/x").unwrap_err();
        assert!(matches!(err, ScanError::InvalidOperation(_)));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert!(get_path_depth("/Var/Lib", "/var/lib/x").is_err());
    }

    #[test]
    fn blank_input_is_an_argument_error() {
        assert!(matches!(
            get_path_depth("", "/var"),
            Err(ScanError::InvalidArgument(_))
        ));
        assert!(matches!(
            get_path_depth("/var", "   "),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn drive_like_prefix_is_plain_text() {
        assert_eq!(get_path_depth("#:/test", "#:/test/one/two/three").unwrap(), 3);
    }

    #[test]
    fn filesystem_root_ancestor() {
        assert_eq!(get_path_depth("/", "/etc/ssl").unwrap(), 2);
    }

    #[cfg(windows)]
    #[test]
    fn windows_drive_and_unc_paths() {
        assert_eq!(get_path_depth(r"C:\", r"C:\Users\Public").unwrap(), 2);
        assert_eq!(
            get_path_depth(r"\\server\share", r"\\server\share\dept\team").unwrap(),
            2
        );
        assert_eq!(get_path_depth("C:/data", r"C:\data\x").unwrap(), 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn unc_style_paths_with_forward_slashes() {
        assert_eq!(
            get_path_depth("//server/share", "//server/share/dept/team").unwrap(),
            2
        );
    }
}
