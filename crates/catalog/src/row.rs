use crate::error::{Error, ErrorKind};
use derive_more::Display;
use exn::OptionExt;

/// Creation time reported for rows read with the reduced query.
pub const CREATION_SENTINEL: i64 = 1_368_618_807;
/// Mount marker prefix of every folder name in the catalog.
const MOUNT_PREFIX: &str = "/mnt/ext";
/// Mount number of the reader's main memory.
const MAIN_MOUNT: &str = "1";

/// Storage volume a catalog row belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageId {
    #[display("main")]
    Main,
    #[display("card")]
    Card,
}
impl StorageId {
    /// Derive the storage volume from a device folder name.
    ///
    /// ```
    /// use pbsync_catalog::StorageId;
    /// assert_eq!(StorageId::from_folder("/mnt/ext1/Books"), Some(StorageId::Main));
    /// assert_eq!(StorageId::from_folder("/mnt/ext2"), Some(StorageId::Card));
    /// assert_eq!(StorageId::from_folder("/mnt/extra/Books"), None);
    /// ```
    pub fn from_folder(folder: &str) -> Option<Self> {
        let rest = folder.strip_prefix(MOUNT_PREFIX)?;
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (mount, tail) = rest.split_at(end);
        if mount.is_empty() || !(tail.is_empty() || tail.starts_with('/') || tail.starts_with('\\')) {
            return None;
        }
        match mount.trim_start_matches('0') == MAIN_MOUNT {
            true => Some(Self::Main),
            false => Some(Self::Card),
        }
    }
}

/// Which of the two query shapes produced a [`RowSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryVariant {
    /// Schema 14 and later: real update, open and creation timestamps.
    Enriched,
    /// Older schemas: timestamps are literal sentinels and must not be trusted.
    Reduced,
}

/// Book rows read in one pass, plus how they were read.
#[derive(Debug, Clone)]
pub struct RowSet {
    pub variant: QueryVariant,
    pub rows: Vec<CatalogRow>,
    /// Rows that could not be decoded and were skipped.
    pub rejected: usize,
}

/// One book as described by the device catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub book_id: i64,
    pub storage_id: StorageId,
    /// Device-side folder, including its `/mnt/extN` mount marker.
    pub folder_name: String,
    pub file_name: String,
    pub display_name: Option<String>,
    pub extension: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub first_author: Option<String>,
    pub series: Option<String>,
    pub series_index: Option<i64>,
    pub size_bytes: Option<i64>,
    pub content_type: Option<String>,
    pub mime_marker: Option<String>,
    pub read_status: i64,
    pub expired: i64,
    pub favorite: i64,
    pub accessibility: i64,
    pub updated_at: Option<i64>,
    pub opened_at: Option<i64>,
    pub created_at: i64,
}

/// Raw row shape shared by both queries.
///
/// Text is decoded as bytes: the reader's firmware does not always write
/// valid UTF-8, and one bad title must not fail the whole query.
#[derive(sqlx::FromRow)]
pub(crate) struct RawRow {
    book_id: i64,
    folder_name: Option<Vec<u8>>,
    file_name: Option<Vec<u8>>,
    display_name: Option<Vec<u8>>,
    extension: Option<Vec<u8>>,
    title: Option<Vec<u8>>,
    author: Option<Vec<u8>>,
    first_author: Option<Vec<u8>>,
    series: Option<Vec<u8>>,
    series_index: Option<i64>,
    size_bytes: Option<i64>,
    content_type: Option<Vec<u8>>,
    mime_marker: Option<Vec<u8>>,
    read_status: i64,
    expired: i64,
    favorite: i64,
    accessibility: i64,
    updated_at: Option<i64>,
    opened_at: Option<i64>,
    created_at: Option<i64>,
}

fn lossy(bytes: Option<Vec<u8>>) -> Option<String> {
    bytes.map(|b| match String::from_utf8(b) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

impl TryFrom<RawRow> for CatalogRow {
    type Error = Error;
    fn try_from(row: RawRow) -> Result<Self, Self::Error> {
        let folder_name = lossy(row.folder_name).ok_or_raise(|| ErrorKind::InvalidData("folder name"))?;
        let file_name = lossy(row.file_name).ok_or_raise(|| ErrorKind::InvalidData("file name"))?;
        let storage_id = StorageId::from_folder(&folder_name).ok_or_raise(|| ErrorKind::InvalidData("mount marker"))?;
        Ok(Self {
            book_id: row.book_id,
            storage_id,
            folder_name,
            file_name,
            display_name: lossy(row.display_name),
            extension: lossy(row.extension),
            title: lossy(row.title),
            author: lossy(row.author),
            first_author: lossy(row.first_author),
            series: lossy(row.series),
            series_index: row.series_index,
            size_bytes: row.size_bytes,
            content_type: lossy(row.content_type),
            mime_marker: lossy(row.mime_marker),
            read_status: row.read_status,
            expired: row.expired,
            favorite: row.favorite,
            accessibility: row.accessibility,
            updated_at: row.updated_at,
            opened_at: row.opened_at,
            created_at: row.created_at.unwrap_or(CREATION_SENTINEL),
        })
    }
}
