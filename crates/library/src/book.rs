use pbsync_catalog::{CatalogRow, QueryVariant};
use time::UtcDateTime;

use crate::collections::{Collections, Signals};
use crate::error::{ErrorKind, Result};
use crate::mime::mime_type;

/// Size reported for books whose real size is unknown: shortcut entries and
/// placeholders for missing files.
pub const SENTINEL_SIZE: u64 = 1_048_576;
/// Title prefix of placeholders for cataloged books whose file is absent.
pub const MISSING_PREFIX: &str = "FILE MISSING: ";
const UNKNOWN_AUTHOR: &str = "Unknown";
const SHORTCUT_CONTENT_TYPE: &str = "6";
const SHORTCUT_MIME_MARKER: &str = "Shortcover";

/// One book on a storage volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    /// Path relative to the volume root, with forward slashes. Identity key.
    pub device_path: String,
    pub title: String,
    pub authors: Vec<String>,
    pub mime_type: String,
    pub timestamp: UtcDateTime,
    pub collections: Collections,
    /// Opaque cover handle, carried over from the cache.
    pub thumbnail: Option<String>,
    pub size_bytes: u64,
    pub series: Option<String>,
    pub series_index: Option<u32>,
    /// Only known for catalogs read with the enriched query.
    pub last_opened: Option<UtcDateTime>,
}

/// What the catalog says about a book, besides its collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub mime_type: String,
    pub timestamp: UtcDateTime,
    pub size_bytes: u64,
    pub series: Option<String>,
    pub series_index: Option<u32>,
    pub last_opened: Option<UtcDateTime>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn timestamp(seconds: i64, what: &str) -> Result<UtcDateTime> {
    match UtcDateTime::from_unix_timestamp(seconds) {
        Ok(ts) => Ok(ts),
        Err(_) => exn::bail!(ErrorKind::RowNormalization(format!("{what} out of range: {seconds}"))),
    }
}

impl BookMetadata {
    /// Extract book metadata from a catalog row.
    ///
    /// The update time is only trusted when the enriched query produced the
    /// row; otherwise (or when it holds the `1` sentinel) the creation time is
    /// used.
    pub fn from_row(row: &CatalogRow, device_path: &str, variant: QueryVariant) -> Result<Self> {
        let title = non_empty(row.title.as_deref())
            .or(non_empty(row.display_name.as_deref()))
            .unwrap_or(&row.file_name)
            .to_string();
        let mut authors: Vec<String> = row
            .author
            .as_deref()
            .map(|author| author.split(',').map(str::trim).filter(|a| !a.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        if authors.is_empty() {
            let fallback = non_empty(row.first_author.as_deref()).unwrap_or(UNKNOWN_AUTHOR);
            authors.push(fallback.to_string());
        }
        let enriched = variant == QueryVariant::Enriched;
        let updated = match row.updated_at {
            Some(updated) if enriched && updated > 1 => timestamp(updated, "update time")?,
            _ => timestamp(row.created_at, "creation time")?,
        };
        let last_opened = match row.opened_at {
            Some(opened) if enriched && opened > 0 => Some(timestamp(opened, "open time")?),
            _ => None,
        };
        Ok(Self {
            title,
            authors,
            mime_type: mime_type(device_path).to_string(),
            timestamp: updated,
            size_bytes: row.size_bytes.and_then(|size| u64::try_from(size).ok()).unwrap_or(0),
            series: non_empty(row.series.as_deref()).map(String::from),
            series_index: row.series_index.and_then(|index| u32::try_from(index).ok()),
            last_opened,
        })
    }
}

/// Whether a catalog row is a shortcut pseudo-entry rather than a real file.
pub fn is_shortcut(row: &CatalogRow) -> bool {
    row.content_type.as_deref() == Some(SHORTCUT_CONTENT_TYPE) && row.mime_marker.as_deref() == Some(SHORTCUT_MIME_MARKER)
}

impl BookRecord {
    pub fn new(device_path: impl Into<String>, metadata: BookMetadata, collections: Collections) -> Self {
        Self {
            device_path: device_path.into(),
            title: metadata.title,
            authors: metadata.authors,
            mime_type: metadata.mime_type,
            timestamp: metadata.timestamp,
            collections,
            thumbnail: None,
            size_bytes: metadata.size_bytes,
            series: metadata.series,
            series_index: metadata.series_index,
            last_opened: metadata.last_opened,
        }
    }

    /// A shortcut pseudo-entry. Its size is unknown.
    pub fn shortcut(device_path: impl Into<String>, metadata: BookMetadata, collections: Collections) -> Self {
        let mut record = Self::new(device_path, metadata, collections);
        record.size_bytes = SENTINEL_SIZE;
        record
    }

    /// A placeholder for a cataloged book whose file is absent.
    pub fn missing(device_path: impl Into<String>, metadata: BookMetadata, collections: Collections) -> Self {
        let mut record = Self::new(device_path, metadata, collections);
        record.title = format!("{MISSING_PREFIX}{}", record.title);
        record.size_bytes = SENTINEL_SIZE;
        record
    }

    /// Overwrite catalog-derived metadata, returning whether anything changed.
    ///
    /// Collections and thumbnail are left alone.
    pub fn refresh_from(&mut self, metadata: BookMetadata) -> bool {
        let current = BookMetadata {
            title: std::mem::take(&mut self.title),
            authors: std::mem::take(&mut self.authors),
            mime_type: std::mem::take(&mut self.mime_type),
            timestamp: self.timestamp,
            size_bytes: self.size_bytes,
            series: self.series.take(),
            series_index: self.series_index,
            last_opened: self.last_opened,
        };
        let changed = current != metadata;
        self.title = metadata.title;
        self.authors = metadata.authors;
        self.mime_type = metadata.mime_type;
        self.timestamp = metadata.timestamp;
        self.size_bytes = metadata.size_bytes;
        self.series = metadata.series;
        self.series_index = metadata.series_index;
        self.last_opened = metadata.last_opened;
        changed
    }

    /// Replace the collections, returning whether they differ.
    pub fn set_collections(&mut self, collections: Collections) -> bool {
        if self.collections == collections {
            return false;
        }
        self.collections = collections;
        true
    }
}

/// Collections of a catalog row.
pub fn collections_of(row: &CatalogRow) -> Collections {
    Signals::from(row).collections()
}
