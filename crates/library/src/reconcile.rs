//! Booklist reconciliation.
//!
//! Merges freshly read catalog rows into the cached booklist of one storage
//! volume. The catalog is authoritative for which books exist and for their
//! collections; the cache only contributes what the catalog doesn't know
//! (thumbnails) and the stable ordering of records.
//!
//! A pass is idempotent: reconciling the same rows twice reports `changed`
//! only the first time.

use pbsync_catalog::{CatalogRow, RowSet};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::book::{BookMetadata, BookRecord, collections_of, is_shortcut};
use crate::booklist::Booklist;
use crate::error::{ErrorKind, Result};
use crate::session::SessionContext;
use crate::volume::Volume;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub booklist: Booklist,
    /// Whether the booklist differs from the cached one and should be saved.
    pub changed: bool,
    /// Cataloged books whose file is absent, in catalog order.
    pub missing: Vec<String>,
    /// Rows skipped because they could not be decoded or normalized.
    pub rejected: usize,
}
impl ReconciliationResult {
    /// Result for a volume that isn't there.
    pub fn empty() -> Self {
        Self { booklist: Booklist::new(), changed: false, missing: Vec::new(), rejected: 0 }
    }
}

/// A normalized catalog row, ready to be merged.
struct Entry {
    device_path: String,
    row: CatalogRow,
}

/// Reconciles catalog rows into a cached booklist.
///
/// ```no_run
/// # use pbsync_library::{Booklist, Reconciler, SessionContext, Volume};
/// # use pbsync_catalog::RowSet;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example(volume: &Volume, session: &SessionContext, cached: Booklist, rows: RowSet) -> pbsync_library::error::Result<()> {
/// let token = CancellationToken::new();
/// let result = Reconciler::new(volume, session).with_cancellation(token).run(cached, rows).await?;
/// if result.changed {
///     // persist result.booklist
/// }
/// # Ok(())
/// # }
/// ```
pub struct Reconciler<'a> {
    volume: &'a Volume,
    session: &'a SessionContext,
    cancel: CancellationToken,
}

impl<'a> Reconciler<'a> {
    pub fn new(volume: &'a Volume, session: &'a SessionContext) -> Self {
        Self { volume, session, cancel: CancellationToken::new() }
    }

    /// Check this token between rows; once cancelled the pass fails with
    /// [`ErrorKind::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[instrument(
        name = "reconcile",
        skip_all,
        fields(volume = %self.volume.storage(), schema = ?self.session.catalog_schema_version, rows = rows.rows.len())
    )]
    pub async fn run(&self, cached: Booklist, rows: RowSet) -> Result<ReconciliationResult> {
        let RowSet { variant, rows, rejected } = rows;
        let mut rejected = rejected;
        let entries = self.normalize(rows, &mut rejected);

        let mut booklist = cached;
        let mut unmatched: HashSet<String> = booklist.paths().map(String::from).collect();
        let mut changed = false;
        let mut missing = Vec::new();

        for Entry { device_path, row } in entries {
            if self.cancel.is_cancelled() {
                tracing::info!(path = %device_path, "Reconciliation cancelled");
                exn::bail!(ErrorKind::Cancelled);
            }
            // Still cataloged: the cached record stays even if the row turns out unusable.
            unmatched.remove(&device_path);
            let metadata = match BookMetadata::from_row(&row, &device_path, variant) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %device_path, error = %*e, "Skipping catalog row");
                    rejected += 1;
                    continue;
                },
            };
            let collections = collections_of(&row);
            let shortcut = is_shortcut(&row);
            // Shortcut rows don't have a file on the volume.
            let present = shortcut || self.is_present(&device_path).await;
            if !present {
                tracing::warn!(path = %device_path, "Cataloged book is missing from the volume");
                missing.push(device_path.clone());
            }

            match booklist.get_mut(&device_path) {
                Some(record) => {
                    if !shortcut && present && record.refresh_from(metadata) {
                        tracing::debug!(path = %device_path, "Refreshed book metadata");
                        changed = true;
                    }
                    if record.set_collections(collections) {
                        tracing::debug!(path = %device_path, "Collections changed");
                        changed = true;
                    }
                },
                None => {
                    let record = match (shortcut, present) {
                        (true, _) => BookRecord::shortcut(device_path, metadata, collections),
                        (false, true) => BookRecord::new(device_path, metadata, collections),
                        (false, false) => BookRecord::missing(device_path, metadata, collections),
                    };
                    tracing::debug!(path = %record.device_path, "Adding book");
                    booklist.insert(record);
                    changed = true;
                },
            }
        }

        for removed in booklist.remove_all(&unmatched) {
            tracing::info!(path = %removed.device_path, "Removing book no longer in catalog");
            changed = true;
        }

        tracing::info!(books = booklist.len(), changed, missing = missing.len(), rejected, "Reconciled booklist");
        Ok(ReconciliationResult { booklist, changed, missing, rejected })
    }

    /// Whether the book's file is present. A failed check counts as absent.
    async fn is_present(&self, device_path: &str) -> bool {
        match self.volume.exists(device_path).await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(path = %device_path, error = ?e, "Could not check book file, treating it as missing");
                false
            },
        }
    }

    /// Compute device paths, dropping rows of other volumes and rows that
    /// can't be normalized. When several rows share a device path, the last
    /// one wins.
    fn normalize(&self, rows: Vec<CatalogRow>, rejected: &mut usize) -> Vec<Entry> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            if row.storage_id != self.volume.storage() {
                continue;
            }
            match self.volume.device_path(&row) {
                Ok(device_path) => entries.push(Entry { device_path, row }),
                Err(e) => {
                    tracing::warn!(book_id = row.book_id, error = %*e, "Skipping catalog row");
                    *rejected += 1;
                },
            }
        }
        let mut seen = HashSet::new();
        let mut deduplicated: Vec<Entry> = entries
            .into_iter()
            .rev()
            .filter(|entry| {
                let first = seen.insert(entry.device_path.clone());
                if !first {
                    tracing::debug!(path = %entry.device_path, book_id = entry.row.book_id, "Duplicate device path, later row wins");
                }
                first
            })
            .collect();
        deduplicated.reverse();
        deduplicated
    }
}

/// Reconcile without cancellation.
pub async fn reconcile(
    cached: Booklist,
    rows: RowSet,
    volume: &Volume,
    session: &SessionContext,
) -> Result<ReconciliationResult> {
    Reconciler::new(volume, session).run(cached, rows).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::tests::row;
    use crate::book::{MISSING_PREFIX, SENTINEL_SIZE};
    use crate::collections::{Collection, Collections};
    use pbsync_catalog::{QueryVariant, StorageId};
    use pbsync_storage::backend::{LocalBackend, MockBackend};
    use std::sync::Arc;

    fn main_volume(files: &[&str]) -> (Volume, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::with_files(files.iter().map(|f| (*f, b"PK".to_vec()))));
        (Volume::new(StorageId::Main, "/", backend.clone()), backend)
    }

    fn rows(rows: Vec<CatalogRow>) -> RowSet {
        RowSet { variant: QueryVariant::Enriched, rows, rejected: 0 }
    }

    fn session() -> SessionContext {
        SessionContext::new(pbsync_device::generic())
    }

    fn catalog() -> Vec<CatalogRow> {
        let mut a = row("/mnt/ext1/Books", "a.epub");
        a.read_status = 2;
        a.favorite = 1;
        let mut b = row("/mnt/ext1/Books", "b.pdf");
        b.book_id = 2;
        b.title = Some("Bar".to_string());
        vec![a, b]
    }

    #[tokio::test]
    async fn test_second_pass_is_unchanged() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let first = reconcile(Booklist::new(), rows(catalog()), &volume, &session).await.unwrap();
        assert!(first.changed);
        assert_eq!(first.booklist.paths().collect::<Vec<_>>(), ["Books/a.epub", "Books/b.pdf"]);
        assert_eq!(first.missing, ["Books/b.pdf"]);

        let second = reconcile(first.booklist.clone(), rows(catalog()), &volume, &session).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.booklist, first.booklist);
        assert_eq!(second.missing, ["Books/b.pdf"]);
    }

    #[tokio::test]
    async fn test_new_book() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let result = reconcile(Booklist::new(), rows(catalog()), &volume, &session()).await.unwrap();
        let book = result.booklist.get("Books/a.epub").unwrap();
        assert_eq!(book.title, "Foo");
        assert_eq!(book.authors, ["Ann Author"]);
        assert_eq!(book.mime_type, "application/epub+zip");
        assert_eq!(book.size_bytes, 2048);
        assert_eq!(book.timestamp.unix_timestamp(), 1_700_000_000);
        assert_eq!(book.collections, Collections::from([Collection::Read, Collection::Shortlist]));
    }

    #[tokio::test]
    async fn test_card_paths_use_storage_root() {
        let backend = Arc::new(MockBackend::with_files([("Books/a.epub", b"PK")]));
        let volume = Volume::new(StorageId::Card, "/card", backend);
        let rows = rows(vec![row("/mnt/ext2/Books", "a.epub"), row("/mnt/ext1/Books", "main.epub")]);
        let result = reconcile(Booklist::new(), rows, &volume, &session()).await.unwrap();
        assert_eq!(result.booklist.paths().collect::<Vec<_>>(), ["card/Books/a.epub"]);
        assert!(result.missing.is_empty());
        assert_eq!(result.rejected, 0);
    }

    #[tokio::test]
    async fn test_missing_file_placeholder() {
        let (volume, _) = main_volume(&[]);
        let result = reconcile(Booklist::new(), rows(vec![row("/mnt/ext1/Books", "a.epub")]), &volume, &session())
            .await
            .unwrap();
        let book = result.booklist.get("Books/a.epub").unwrap();
        assert_eq!(book.title, format!("{MISSING_PREFIX}Foo"));
        assert_eq!(book.size_bytes, SENTINEL_SIZE);
        assert_eq!(result.missing, ["Books/a.epub"]);
    }

    #[tokio::test]
    async fn test_uncataloged_books_are_removed() {
        let (volume, _) = main_volume(&["Books/a.epub", "Books/b.pdf"]);
        let session = session();
        let cached = reconcile(Booklist::new(), rows(catalog()), &volume, &session).await.unwrap().booklist;
        let result = reconcile(cached, rows(vec![row("/mnt/ext1/Books", "b.pdf")]), &volume, &session)
            .await
            .unwrap();
        assert!(result.changed);
        assert_eq!(result.booklist.paths().collect::<Vec<_>>(), ["Books/b.pdf"]);
    }

    #[tokio::test]
    async fn test_collections_are_replaced() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let cached = reconcile(Booklist::new(), rows(catalog()), &volume, &session).await.unwrap().booklist;
        let mut a = row("/mnt/ext1/Books", "a.epub");
        a.read_status = 1;
        let result = reconcile(cached, rows(vec![a]), &volume, &session).await.unwrap();
        assert!(result.changed);
        let book = result.booklist.get("Books/a.epub").unwrap();
        assert_eq!(book.collections, Collections::from([Collection::Reading]));
    }

    #[tokio::test]
    async fn test_shortcut_file_is_not_checked() {
        let (volume, _) = main_volume(&[]);
        let mut shortcut = row("/mnt/ext1/Books", "a.epub");
        shortcut.content_type = Some("6".to_string());
        shortcut.mime_marker = Some("Shortcover".to_string());
        let result = reconcile(Booklist::new(), rows(vec![shortcut]), &volume, &session()).await.unwrap();
        let book = result.booklist.get("Books/a.epub").unwrap();
        assert_eq!(book.title, "Foo");
        assert_eq!(book.size_bytes, SENTINEL_SIZE);
        assert!(result.missing.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_file_keeps_stale_record() {
        let (volume, backend) = main_volume(&["Books/a.epub"]);
        let session = session();
        let mut cached = reconcile(Booklist::new(), rows(vec![row("/mnt/ext1/Books", "a.epub")]), &volume, &session)
            .await
            .unwrap()
            .booklist;
        cached.get_mut("Books/a.epub").unwrap().thumbnail = Some("cover".to_string());
        assert!(backend.remove("Books/a.epub").await);

        let mut renamed = row("/mnt/ext1/Books", "a.epub");
        renamed.title = Some("Renamed".to_string());
        let result = reconcile(cached.clone(), rows(vec![renamed]), &volume, &session).await.unwrap();
        assert!(!result.changed);
        assert_eq!(result.booklist, cached);
        assert_eq!(result.missing, ["Books/a.epub"]);
    }

    #[tokio::test]
    async fn test_refresh_keeps_thumbnail() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let mut cached = reconcile(Booklist::new(), rows(vec![row("/mnt/ext1/Books", "a.epub")]), &volume, &session)
            .await
            .unwrap()
            .booklist;
        cached.get_mut("Books/a.epub").unwrap().thumbnail = Some("cover".to_string());

        let mut renamed = row("/mnt/ext1/Books", "a.epub");
        renamed.title = Some("Renamed".to_string());
        let result = reconcile(cached, rows(vec![renamed]), &volume, &session).await.unwrap();
        assert!(result.changed);
        let book = result.booklist.get("Books/a.epub").unwrap();
        assert_eq!(book.title, "Renamed");
        assert_eq!(book.thumbnail.as_deref(), Some("cover"));
    }

    #[tokio::test]
    async fn test_duplicate_paths_last_row_wins() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let mut later = row("/mnt/ext1\\Books", "a.epub");
        later.book_id = 2;
        later.title = Some("Later".to_string());
        let duplicates = || rows(vec![row("/mnt/ext1/Books", "a.epub"), later.clone()]);
        let first = reconcile(Booklist::new(), duplicates(), &volume, &session).await.unwrap();
        assert_eq!(first.booklist.len(), 1);
        assert_eq!(first.booklist.get("Books/a.epub").unwrap().title, "Later");
        let second = reconcile(first.booklist, duplicates(), &volume, &session).await.unwrap();
        assert!(!second.changed);
    }

    #[tokio::test]
    async fn test_rejected_rows_are_counted() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let mut set = rows(vec![
            row("/mnt/ext1/Books", "a.epub"),
            row("/mnt/ext1/Books", "../../etc/passwd"),
            row("/mnt/ext1/Books", "bad\u{FFFD}.epub"),
        ]);
        set.rejected = 2;
        let mut out_of_range = row("/mnt/ext1/Books", "c.epub");
        out_of_range.updated_at = Some(i64::MAX);
        set.rows.push(out_of_range);
        let result = reconcile(Booklist::new(), set, &volume, &session()).await.unwrap();
        assert_eq!(result.booklist.paths().collect::<Vec<_>>(), ["Books/a.epub"]);
        assert_eq!(result.rejected, 5);
    }

    #[tokio::test]
    async fn test_reduced_rows_use_creation_time() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let mut a = row("/mnt/ext1/Books", "a.epub");
        a.opened_at = Some(1_700_000_500);
        let set = RowSet { variant: QueryVariant::Reduced, rows: vec![a], rejected: 0 };
        let result = reconcile(Booklist::new(), set, &volume, &session()).await.unwrap();
        let book = result.booklist.get("Books/a.epub").unwrap();
        assert_eq!(book.timestamp.unix_timestamp(), 1_600_000_000);
        assert_eq!(book.last_opened, None);
    }

    #[tokio::test]
    async fn test_cancelled_pass() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let token = CancellationToken::new();
        token.cancel();
        let err = Reconciler::new(&volume, &session)
            .with_cancellation(token)
            .run(Booklist::new(), rows(catalog()))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_catalog_clears_booklist() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let cached = reconcile(Booklist::new(), rows(catalog()), &volume, &session).await.unwrap().booklist;
        let result = reconcile(cached, rows(Vec::new()), &volume, &session).await.unwrap();
        assert!(result.changed);
        assert!(result.booklist.is_empty());

        let result = reconcile(Booklist::new(), rows(Vec::new()), &volume, &session).await.unwrap();
        assert!(!result.changed);
    }

    #[tokio::test]
    async fn test_unusable_row_keeps_cached_record() {
        let (volume, _) = main_volume(&["Books/a.epub"]);
        let session = session();
        let cached = reconcile(Booklist::new(), rows(catalog()), &volume, &session).await.unwrap().booklist;
        let mut broken = row("/mnt/ext1/Books", "a.epub");
        broken.updated_at = Some(i64::MAX);
        let mut b = row("/mnt/ext1/Books", "b.pdf");
        b.title = Some("Bar".to_string());
        let result = reconcile(cached.clone(), rows(vec![broken, b]), &volume, &session).await.unwrap();
        assert_eq!(result.rejected, 1);
        assert!(!result.changed);
        assert_eq!(result.booklist, cached);
    }

    #[tokio::test]
    async fn test_failed_existence_check_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Books")).unwrap();
        std::fs::write(dir.path().join("Books/a.epub"), b"PK").unwrap();
        let backend = LocalBackend::new("main", dir.path()).unwrap();
        let volume = Volume::new(StorageId::Main, "/", Arc::new(backend));
        let long_name = format!("{}.epub", "x".repeat(300));
        let rows = rows(vec![row("/mnt/ext1/Books", &long_name), row("/mnt/ext1/Books", "a.epub")]);
        let result = reconcile(Booklist::new(), rows, &volume, &session()).await.unwrap();
        assert_eq!(result.booklist.len(), 2);
        assert_eq!(result.missing, [format!("Books/{long_name}")]);
        assert!(result.booklist.get(&format!("Books/{long_name}")).unwrap().title.starts_with(MISSING_PREFIX));
    }
}
