//! Booklist cache on the reader.
//!
//! Each volume keeps the booklist of its last sync in a JSON document at the
//! volume root. The cache is a convenience, not a source of truth: a missing
//! or damaged cache simply means every cataloged book is new again.

use exn::ResultExt;
use pbsync_storage::error::ErrorKind as StorageErrorKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::UtcDateTime;

use crate::book::BookRecord;
use crate::booklist::Booklist;
use crate::collections::Collection;
use crate::error::{ErrorKind, Result};
use crate::volume::Volume;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    books: Vec<BookProxy>,
}

#[derive(Serialize, Deserialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
struct BookProxy {
    #[serde(rename = "lpath")]
    device_path: String,
    title: String,
    authors: Vec<String>,
    #[serde(rename = "mime")]
    mime_type: String,
    /// Unix timestamp, seconds.
    timestamp: i64,
    #[serde(default)]
    collections: Vec<Collection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail: Option<String>,
    #[serde(rename = "size")]
    size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    series_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_opened: Option<i64>,
}
impl From<&BookRecord> for BookProxy {
    fn from(book: &BookRecord) -> Self {
        Self {
            device_path: book.device_path.clone(),
            title: book.title.clone(),
            authors: book.authors.clone(),
            mime_type: book.mime_type.clone(),
            timestamp: book.timestamp.unix_timestamp(),
            collections: book.collections.iter().copied().collect(),
            thumbnail: book.thumbnail.clone(),
            size_bytes: book.size_bytes,
            series: book.series.clone(),
            series_index: book.series_index,
            last_opened: book.last_opened.map(UtcDateTime::unix_timestamp),
        }
    }
}
impl TryFrom<BookProxy> for BookRecord {
    type Error = time::error::ComponentRange;
    fn try_from(proxy: BookProxy) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            device_path: proxy.device_path,
            title: proxy.title,
            authors: proxy.authors,
            mime_type: proxy.mime_type,
            timestamp: UtcDateTime::from_unix_timestamp(proxy.timestamp)?,
            collections: proxy.collections.into_iter().collect(),
            thumbnail: proxy.thumbnail,
            size_bytes: proxy.size_bytes,
            series: proxy.series,
            series_index: proxy.series_index,
            last_opened: proxy.last_opened.map(UtcDateTime::from_unix_timestamp).transpose()?,
        })
    }
}

/// Load the cached booklist of a volume.
///
/// Never fails. A missing cache is an empty booklist; an unreadable or corrupt
/// one is logged and treated the same. Records whose path lies outside the
/// volume are dropped.
pub async fn load_cached_booklist(volume: &Volume, cache_file: &str) -> Booklist {
    let data = match volume.backend().read(Path::new(cache_file)).await {
        Ok(data) => data,
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
            tracing::debug!(volume = %volume.storage(), "No booklist cache, starting empty");
            return Booklist::new();
        },
        Err(e) => {
            tracing::warn!(volume = %volume.storage(), error = ?e, "Could not read booklist cache, starting empty");
            return Booklist::new();
        },
    };
    let document: CacheDocument = match serde_json::from_slice(&data) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(volume = %volume.storage(), error = %e, "Corrupt booklist cache, starting empty");
            return Booklist::new();
        },
    };
    if document.version != FORMAT_VERSION {
        tracing::warn!(volume = %volume.storage(), version = document.version, "Unknown booklist cache version, starting empty");
        return Booklist::new();
    }
    let mut booklist = Booklist::new();
    for proxy in document.books {
        if !volume.contains(&proxy.device_path) {
            tracing::warn!(volume = %volume.storage(), path = %proxy.device_path, "Dropping cached book outside the volume");
            continue;
        }
        let path = proxy.device_path.clone();
        match BookRecord::try_from(proxy) {
            Ok(book) => _ = booklist.insert(book),
            Err(e) => tracing::warn!(path = %path, error = %e, "Dropping cached book with invalid timestamp"),
        }
    }
    tracing::debug!(volume = %volume.storage(), books = booklist.len(), "Loaded booklist cache");
    booklist
}

/// Write the booklist of a volume to its cache.
pub async fn save_booklist(volume: &Volume, cache_file: &str, booklist: &Booklist) -> Result<()> {
    let document = CacheDocument {
        version: FORMAT_VERSION,
        books: booklist.iter().map(BookProxy::from).collect(),
    };
    let data = serde_json::to_vec_pretty(&document).or_raise(|| ErrorKind::Persistence)?;
    volume
        .backend()
        .write(Path::new(cache_file), &data)
        .await
        .or_raise(|| ErrorKind::Persistence)?;
    tracing::info!(volume = %volume.storage(), books = booklist.len(), "Saved booklist cache");
    Ok(())
}
