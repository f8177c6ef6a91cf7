//! Device path computation.
//!
//! The catalog records every book by a device folder (`/mnt/ext1/Books`) and
//! a file name. On the host, the folder's mount marker is replaced by the
//! volume's storage root, giving the book's device path: the identity key of a
//! [`BookRecord`](crate::BookRecord).

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{ErrorKind, Result};

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(MOUNT_MARKER, r"^/mnt/ext\d+");

fn reject(reason: &str, folder: &str, file: &str) -> crate::error::Error {
    exn::Exn::from(ErrorKind::RowNormalization(format!("{reason} ({folder}/{file})")))
}

/// Compute the device path of a catalog entry.
///
/// Separators are normalized to `/`, duplicate slashes collapse and leading
/// slashes are stripped. Paths that try to climb out of the volume, or whose
/// bytes were not valid UTF-8, are rejected.
///
/// ```
/// use pbsync_library::device_path;
/// assert_eq!(device_path("/mnt/ext1/Books", "a.epub", "/card").unwrap(), "card/Books/a.epub");
/// assert_eq!(device_path("/mnt/ext1/Books", "a.epub", "/").unwrap(), "Books/a.epub");
/// ```
pub fn device_path(folder: &str, file: &str, storage_root: &str) -> Result<String> {
    let folder_normalized = folder.replace('\\', "/");
    if !MOUNT_MARKER.is_match(&folder_normalized) {
        return Err(reject("folder outside any mount", folder, file));
    }
    let file_normalized = file.replace('\\', "/");
    if file_normalized.trim_matches('/').is_empty() {
        return Err(reject("empty file name", folder, file));
    }
    let substituted = MOUNT_MARKER.replace(&folder_normalized, regex::NoExpand(storage_root));
    let joined = format!("{substituted}/{file_normalized}");
    normalize(&joined).ok_or_else(|| reject("unusable path", folder, file))
}

/// Normalize a slash-separated relative path, `None` if it is unusable.
pub(crate) fn normalize(path: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => return None,
            s if s.contains(['\u{FFFD}', '\0']) => return None,
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => None,
        false => Some(segments.join("/")),
    }
}
