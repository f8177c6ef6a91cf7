//! Firmware version detection.
//!
//! Firmware before 5.x writes `fwinfo.txt` to the root of main memory; the
//! version is the third comma-separated field of its first line. Newer
//! firmware doesn't write the file at all.

use pbsync_storage::StorageBackend;
use pbsync_storage::error::ErrorKind as StorageErrorKind;
use std::path::Path;

use crate::FIRMWARE_INFO;

/// Reported when the firmware version cannot be determined.
pub const UNKNOWN_FIRMWARE: &str = "Unknown";

/// Extract the firmware version from the contents of `fwinfo.txt`.
///
/// ```
/// use pbsync_device::firmware::parse;
/// assert_eq!(parse("PB360,360,2.0.3,20100722\n").as_deref(), Some("2.0.3"));
/// assert_eq!(parse("garbage"), None);
/// ```
pub fn parse(contents: &str) -> Option<String> {
    let line = contents.lines().next()?;
    let version = line.split(',').nth(2)?.trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Read the firmware version from the reader's main memory.
///
/// Never fails: a missing or malformed file yields [`UNKNOWN_FIRMWARE`].
pub async fn read(main: &dyn StorageBackend) -> String {
    let contents = match main.read(Path::new(FIRMWARE_INFO)).await {
        Ok(contents) => contents,
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
            tracing::debug!("No firmware info file, firmware is newer than 4.x");
            return UNKNOWN_FIRMWARE.to_string();
        },
        Err(e) => {
            tracing::warn!(volume = main.name(), error = ?e, "Could not read firmware info");
            return UNKNOWN_FIRMWARE.to_string();
        },
    };
    match parse(&String::from_utf8_lossy(&contents)) {
        Some(version) => version,
        None => {
            tracing::debug!("Malformed firmware info file");
            UNKNOWN_FIRMWARE.to_string()
        },
    }
}
