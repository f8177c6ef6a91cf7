//! PocketBook reader models and well-known on-device locations.
//!
//! All reader models are served by the same sync code. What differs between
//! them (USB identifiers, volume labels, formats and a few behavioural flags)
//! is captured by a [`DeviceProfile`] from a static table.

pub mod error;
pub mod firmware;
mod profile;

pub use crate::profile::{Capabilities, DeviceProfile, PROFILES, UsbId, by_name, generic, match_usb};

/// Location of the book catalog, relative to main memory.
pub const CATALOG_PATH: &str = "system/explorer-2/explorer-2.db";
/// Firmware information file, relative to main memory.
pub const FIRMWARE_INFO: &str = "fwinfo.txt";
/// Highest catalog schema version known to work.
pub const SUPPORTED_DB_VERSION: i64 = 120;

/// Check a catalog schema version against [`SUPPORTED_DB_VERSION`].
///
/// Newer catalogs are only warned about: the queries are usually still
/// valid, and the fallback query covers the rest.
pub fn check_db_version(version: i64) -> bool {
    let supported = version <= SUPPORTED_DB_VERSION;
    if !supported {
        tracing::warn!(version, supported = SUPPORTED_DB_VERSION, "Catalog schema is newer than any known to work");
    }
    supported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_db_version() {
        assert!(check_db_version(14));
        assert!(check_db_version(SUPPORTED_DB_VERSION));
        assert!(!check_db_version(SUPPORTED_DB_VERSION + 1));
    }
}
