/// Platform-specific functionality: native directory enumeration,
/// long-path handling, and security-descriptor reading.

pub mod find;
pub mod long_path;
pub mod security;

pub use find::{FindFileEnumerator, RawEntry};
pub use long_path::{normalize_long_path, strip_long_path_prefix};
pub use security::SecurityReader;
