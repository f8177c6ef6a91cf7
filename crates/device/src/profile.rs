//! Supported reader models.
//!
//! Every model is a row in [`PROFILES`]; the sync code is the same for all of
//! them and only consults the matched profile for labels, formats and
//! capability flags.

use derive_more::Display;
use std::fmt;

use crate::error::{ErrorKind, Result};

/// Behavioural switches of a reader model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Books may live in nested folders below the ebook directory.
    pub supports_sub_dirs: bool,
    /// Book discovery starts at the volume root rather than the ebook directory.
    pub scan_from_root: bool,
    /// Metadata must be read from the book files themselves.
    pub must_read_metadata: bool,
    /// The firmware maintains an on-device SQLite catalog.
    pub has_catalog: bool,
    /// The host mounts main memory and card the wrong way round.
    pub swap_drives: bool,
}
impl Capabilities {
    const LEGACY: Self = Self {
        supports_sub_dirs: true,
        scan_from_root: false,
        must_read_metadata: false,
        has_catalog: false,
        swap_drives: false,
    };
    const CATALOG: Self = Self {
        supports_sub_dirs: true,
        scan_from_root: true,
        must_read_metadata: true,
        has_catalog: true,
        swap_drives: false,
    };
}

/// A reader model.
#[derive(Debug, Display, PartialEq, Eq)]
#[display("{gui_name}")]
pub struct DeviceProfile {
    /// Stable identifier, used in configuration.
    pub name: &'static str,
    /// Human readable model name.
    pub gui_name: &'static str,
    pub vendor_ids: &'static [u16],
    /// Empty means any product of the vendor.
    pub product_ids: &'static [u16],
    /// Empty means any device revision.
    pub bcd: &'static [u16],
    /// USB vendor strings reported by the device.
    pub vendor_names: &'static [&'static str],
    pub main_volume_label: &'static str,
    pub card_volume_label: &'static str,
    /// Drive names as seen by Windows.
    pub windows_labels: &'static [&'static str],
    /// File extensions the reader can open, lowercase, without the dot.
    pub supported_formats: &'static [&'static str],
    /// Directory new books are sent to, relative to the volume root.
    pub ebook_dir_main: &'static str,
    pub capabilities: Capabilities,
}

const LEGACY_FORMATS: &[&str] = &["epub", "fb2", "prc", "mobi", "pdf", "djvu", "rtf", "chm", "txt"];
const PRO_FORMATS: &[&str] = &["epub", "fb2", "prc", "mobi", "pdf", "djvu", "rtf", "chm", "doc", "tcr", "txt"];

/// Known reader models, most specific first.
pub static PROFILES: &[DeviceProfile] = &[
    DeviceProfile {
        name: "pocketbook-360",
        gui_name: "PocketBook 360",
        vendor_ids: &[0x1f85, 0x0525],
        product_ids: &[0x1688, 0xa4a5],
        bcd: &[0x0110],
        vendor_names: &["PHILIPS", "__POCKET", "POCKETBO"],
        main_volume_label: "EB600 Internal Storage",
        card_volume_label: "EB600 Card Storage",
        windows_labels: &["MASS_STORGE", "BOOK_USB_STORAGE", "OK_POCKET_611_61", "OK_POCKET_360+61"],
        supported_formats: LEGACY_FORMATS,
        ebook_dir_main: "",
        capabilities: Capabilities::LEGACY,
    },
    DeviceProfile {
        name: "pocketbook-301",
        gui_name: "PocketBook 301",
        vendor_ids: &[0x0001],
        product_ids: &[0x0301],
        bcd: &[0x0132],
        vendor_names: &[],
        main_volume_label: "PocketBook 301 Main Memory",
        card_volume_label: "PocketBook 301 Storage Card",
        windows_labels: &[],
        supported_formats: LEGACY_FORMATS,
        ebook_dir_main: "",
        capabilities: Capabilities::LEGACY,
    },
    DeviceProfile {
        name: "pocketbook-602",
        gui_name: "PocketBook Pro 602/902",
        vendor_ids: &[0x0525],
        product_ids: &[0xa4a5],
        bcd: &[0x0324, 0x0330],
        vendor_names: &["", "LINUX"],
        main_volume_label: "PocketBook Pro 602/902 Main Memory",
        card_volume_label: "PocketBook Pro 602/902 Storage Card",
        windows_labels: &["PB602", "PB603", "PB902", "PB903", "Pocket912", "PB", "FILE-STOR_GADGET"],
        supported_formats: PRO_FORMATS,
        ebook_dir_main: "books",
        capabilities: Capabilities { scan_from_root: true, ..Capabilities::LEGACY },
    },
    DeviceProfile {
        name: "pocketbook-622",
        gui_name: "PocketBook 622/623",
        vendor_ids: &[0x0489],
        product_ids: &[0xe107, 0xcff1],
        bcd: &[0x0326],
        vendor_names: &["LINUX"],
        main_volume_label: "PocketBook 622/623 Main Memory",
        card_volume_label: "PocketBook 622/623 Storage Card",
        windows_labels: &["FILE-STOR_GADGET"],
        supported_formats: PRO_FORMATS,
        ebook_dir_main: "",
        capabilities: Capabilities { scan_from_root: true, ..Capabilities::LEGACY },
    },
    DeviceProfile {
        name: "pocketbook-360-plus",
        gui_name: "PocketBook 360+",
        vendor_ids: &[0x0525],
        product_ids: &[0xa4a5],
        bcd: &[0x0323],
        vendor_names: &["__POCKET"],
        main_volume_label: "PocketBook 360+ Main Memory",
        card_volume_label: "PocketBook 360+ Storage Card",
        windows_labels: &["BOOK_USB_STORAGE"],
        supported_formats: PRO_FORMATS,
        ebook_dir_main: "",
        capabilities: Capabilities { scan_from_root: true, ..Capabilities::LEGACY },
    },
    DeviceProfile {
        name: "pocketbook-701",
        gui_name: "PocketBook 701",
        vendor_ids: &[0x18d1],
        product_ids: &[0xa004],
        bcd: &[0x0224],
        vendor_names: &["ANDROID"],
        main_volume_label: "PocketBook 701 Main Memory",
        card_volume_label: "PocketBook 701 Storage Card",
        windows_labels: &["__UMS_COMPOSITE"],
        supported_formats: PRO_FORMATS,
        ebook_dir_main: "books",
        capabilities: Capabilities { swap_drives: true, ..Capabilities::LEGACY },
    },
    DeviceProfile {
        name: "pocketbook-626",
        gui_name: "PocketBook Touch Lux 2",
        vendor_ids: &[0xfffe],
        product_ids: &[],
        bcd: &[],
        vendor_names: &["USB_2.0"],
        main_volume_label: "PocketBook Touch Lux 2 Main Memory",
        card_volume_label: "PocketBook Touch Lux 2 Storage Card",
        windows_labels: &["USB_FLASH_DRIVER"],
        supported_formats: &["epub", "pdf", "fb2", "txt", "html", "djvu", "doc", "docx", "rtf", "chm"],
        ebook_dir_main: "",
        capabilities: Capabilities::CATALOG,
    },
    DeviceProfile {
        name: "pocketbook",
        gui_name: "PocketBook Reader",
        vendor_ids: &[0xfffe],
        product_ids: &[],
        bcd: &[],
        vendor_names: &[],
        main_volume_label: "PocketBook Reader Main Memory",
        card_volume_label: "PocketBook Reader Storage Card",
        windows_labels: &[],
        supported_formats: &["epub", "pdf", "fb2", "txt", "html", "djvu", "doc", "docx", "rtf", "chm", "mobi"],
        ebook_dir_main: "",
        capabilities: Capabilities::CATALOG,
    },
];

/// Identifiers of a connected USB device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
    /// Device release number, when known.
    pub bcd: Option<u16>,
    /// Vendor string reported by the device, when known.
    pub vendor_name: Option<String>,
}
impl UsbId {
    pub fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product, bcd: None, vendor_name: None }
    }

    pub fn with_bcd(mut self, bcd: u16) -> Self {
        self.bcd = Some(bcd);
        self
    }

    pub fn with_vendor_name(mut self, name: impl Into<String>) -> Self {
        self.vendor_name = Some(name.into());
        self
    }
}
impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)?;
        if let Some(bcd) = self.bcd {
            write!(f, " (bcd {bcd:04x})")?;
        }
        Ok(())
    }
}

impl DeviceProfile {
    /// Whether this profile describes the given device.
    ///
    /// Vendor strings only take part when the device reported one. Profiles
    /// that claim every product of a vendor and list vendor strings (such as
    /// the Touch Lux 2) require a matching vendor string, otherwise they would
    /// shadow the generic profile.
    pub fn matches(&self, id: &UsbId) -> bool {
        if !self.vendor_ids.contains(&id.vendor) {
            return false;
        }
        if !self.product_ids.is_empty() && !self.product_ids.contains(&id.product) {
            return false;
        }
        if let Some(bcd) = id.bcd
            && !self.bcd.is_empty()
            && !self.bcd.contains(&bcd)
        {
            return false;
        }
        let vendor_wide = self.product_ids.is_empty() && self.bcd.is_empty();
        match (&id.vendor_name, self.vendor_names.is_empty()) {
            (_, true) => true,
            (Some(name), false) => self.vendor_names.contains(&name.as_str()),
            (None, false) => !vendor_wide,
        }
    }

    /// Whether the reader can open files with this extension.
    pub fn supports_format(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(extension))
    }

    /// Put the host's mounts into (main, card) order.
    ///
    /// Only swaps when both are present.
    pub fn order_drives<T>(&self, main: T, card: Option<T>) -> (T, Option<T>) {
        match (self.capabilities.swap_drives, card) {
            (true, Some(card)) => (card, Some(main)),
            (_, card) => (main, card),
        }
    }
}

/// Find the first profile matching the device.
pub fn match_usb(id: &UsbId) -> Option<&'static DeviceProfile> {
    let found = PROFILES.iter().find(|profile| profile.matches(id));
    match found {
        Some(profile) => tracing::debug!(device = %id, profile = profile.name, "Matched device profile"),
        None => tracing::debug!(device = %id, "No device profile matches"),
    }
    found
}

/// Look up a profile by its identifier (case insensitive).
pub fn by_name(name: &str) -> Result<&'static DeviceProfile> {
    match PROFILES.iter().find(|profile| profile.name.eq_ignore_ascii_case(name)) {
        Some(profile) => Ok(profile),
        None => exn::bail!(ErrorKind::UnknownProfile(name.to_string())),
    }
}

/// The catalog driver for PocketBook readers without a dedicated profile.
pub fn generic() -> &'static DeviceProfile {
    &PROFILES[PROFILES.len() - 1]
}
