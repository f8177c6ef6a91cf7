//! Path validation for volume-relative paths.
//!
//! Every path handed to a [`StorageBackend`](crate::StorageBackend) is
//! relative to the volume root. Paths reported by the reader itself are not
//! always tidy (Windows-style separators from older firmware, doubled
//! slashes), so they are validated and normalized here before use.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a volume-relative path for security and correctness.
/// Ensures that paths don't escape the volume root (no `..` traversal).
///
/// Backslashes are treated as separators: the reader's catalog was written by
/// firmware that doesn't care which way its slashes lean. Null bytes are
/// explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pbsync_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("Books/a.epub").is_ok());
/// assert!(validate_path("Books/Fiction/../a.epub").is_ok()); // (never leaves volume root)
/// // Invalid paths
/// assert!(validate_path("../system/explorer-2/explorer-2.db").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("wrong/../Books\\Fiction//./a.epub").unwrap(),
///     Path::new("Books/Fiction/a.epub")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let path: Cow<'_, Path> = match original.to_str() {
        Some(s) if s.contains('\\') => Cow::Owned(PathBuf::from(s.replace('\\', "/"))),
        _ => Cow::Borrowed(original),
    };
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate(Path::new("Books/a.epub")).unwrap(), Path::new("Books/a.epub"));
        assert_eq!(validate(Path::new("a/b/c/book.fb2")).unwrap(), Path::new("a/b/c/book.fb2"));
        assert_eq!(validate(Path::new("metadata.pbsync.json")).unwrap(), Path::new("metadata.pbsync.json"));
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(validate(Path::new("a//b//c")).unwrap(), Path::new("a/b/c"));
        assert_eq!(validate(Path::new("a/./b/./c")).unwrap(), Path::new("a/b/c"));
        // Leading root is dropped: everything is relative to the volume.
        assert_eq!(validate(Path::new("/Books/a.epub")).unwrap(), Path::new("Books/a.epub"));
    }

    #[test]
    fn test_backslash_normalization() {
        assert_eq!(validate(Path::new("Books\\Fiction\\a.epub")).unwrap(), Path::new("Books/Fiction/a.epub"));
        assert_eq!(validate(Path::new("a\\b/c\\d")).unwrap(), Path::new("a/b/c/d"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate(Path::new("../etc/passwd")).is_err());
        assert!(validate(Path::new("a/../../b")).is_err());
        assert!(validate(Path::new("..\\..\\b")).is_err());
        assert!(validate(Path::new("..")).is_err());
    }

    #[test]
    fn test_reverse_attempts() {
        assert_eq!(validate(Path::new("a/b/..")).unwrap(), Path::new("a"));
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate(Path::new("a\0b")).is_err());
        assert!(validate(Path::new("\0")).is_err());
    }

    #[test]
    fn test_empty_paths() {
        assert!(validate(Path::new("")).is_err());
        assert!(validate(Path::new(".")).is_err());
        assert!(validate(Path::new("./.")).is_err());
        assert!(validate(Path::new("//")).is_err());
    }

    #[test]
    fn test_trailing_slashes() {
        assert_eq!(validate(Path::new("Books/")).unwrap(), Path::new("Books"));
        assert_eq!(validate(Path::new("Books///")).unwrap(), Path::new("Books"));
    }
}
