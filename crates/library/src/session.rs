//! One sync with a connected reader.

use exn::ResultExt;
use pbsync_catalog::{Catalog, RowSet, StorageId};
use pbsync_device::{DeviceProfile, check_db_version};
use pbsync_device::firmware::{self, UNKNOWN_FIRMWARE};
use pbsync_storage::BackendHandle;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::persist::{load_cached_booklist, save_booklist};
use crate::reconcile::{Reconciler, ReconciliationResult};
use crate::volume::Volume;

/// What is known about the connected reader during one sync.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub profile: &'static DeviceProfile,
    /// Set once the catalog has been opened.
    pub catalog_schema_version: Option<i64>,
    /// Whether that schema version is one this crate knows how to read.
    pub catalog_supported: Option<bool>,
    pub firmware_version: String,
}
impl SessionContext {
    pub fn new(profile: &'static DeviceProfile) -> Self {
        Self {
            profile,
            catalog_schema_version: None,
            catalog_supported: None,
            firmware_version: UNKNOWN_FIRMWARE.to_string(),
        }
    }
}

/// Which volume to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeSelector {
    Main,
    Card,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Storage root substituted for main memory's mount marker.
    pub main_root: String,
    /// Storage root substituted for the card's mount marker.
    pub card_root: String,
    /// Name of the booklist cache at the root of each volume.
    pub cache_file: String,
}
impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            main_root: "/".to_string(),
            card_root: "/card".to_string(),
            cache_file: "metadata.pbsync.json".to_string(),
        }
    }
}

/// A sync with one reader, from mount to unmount.
///
/// Volumes are listed one at a time; [`books`](SyncSession::books) takes
/// `&mut self` so passes over the same reader never overlap.
pub struct SyncSession {
    context: SessionContext,
    main: Volume,
    card: Option<Volume>,
    catalog_path: PathBuf,
    cache_file: String,
}

impl SyncSession {
    /// Start a sync with a reader whose volumes are mounted on the given
    /// backends.
    ///
    /// `main` and `card` must already be in (main, card) order; see
    /// [`DeviceProfile::order_drives`].
    #[instrument(skip_all, fields(profile = profile.name, catalog = %catalog_path.as_ref().display()))]
    pub async fn open(
        profile: &'static DeviceProfile,
        main: BackendHandle,
        card: Option<BackendHandle>,
        catalog_path: impl AsRef<Path>,
        options: SyncOptions,
    ) -> Result<Self> {
        if !profile.capabilities.has_catalog {
            exn::bail!(ErrorKind::NoCatalog(profile.gui_name));
        }
        let mut context = SessionContext::new(profile);
        context.firmware_version = firmware::read(&*main).await;
        tracing::info!(firmware = %context.firmware_version, card = card.is_some(), "Opened sync session");
        Ok(Self {
            context,
            main: Volume::new(StorageId::Main, options.main_root, main).excluding(&options.card_root),
            card: card.map(|card| Volume::new(StorageId::Card, options.card_root, card)),
            catalog_path: catalog_path.as_ref().to_path_buf(),
            cache_file: options.cache_file,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn volume(&self, selector: VolumeSelector) -> Option<&Volume> {
        match selector {
            VolumeSelector::Main => Some(&self.main),
            VolumeSelector::Card => self.card.as_ref(),
        }
    }

    /// Bring the cached booklist of a volume in line with the catalog.
    ///
    /// The cache is only written when the booklist changed. Asking for the
    /// card when none is mounted yields an empty, unchanged result.
    #[instrument(skip(self, cancel))]
    pub async fn books(&mut self, selector: VolumeSelector, cancel: &CancellationToken) -> Result<ReconciliationResult> {
        let Some(volume) = self.volume(selector).cloned() else {
            tracing::debug!("No card mounted");
            return Ok(ReconciliationResult::empty());
        };
        let rows = self.read_catalog().await?;
        let cached = load_cached_booklist(&volume, &self.cache_file).await;
        let result = Reconciler::new(&volume, &self.context)
            .with_cancellation(cancel.clone())
            .run(cached, rows)
            .await?;
        if result.changed {
            save_booklist(&volume, &self.cache_file, &result.booklist).await?;
        } else {
            tracing::debug!("Booklist unchanged, not saving");
        }
        Ok(result)
    }

    /// Read every row of the catalog and record its schema version.
    ///
    /// The connection is closed before returning; on errors it is dropped.
    async fn read_catalog(&mut self) -> Result<RowSet> {
        let mut catalog = Catalog::open(&self.catalog_path)
            .await
            .or_raise(|| ErrorKind::CatalogUnavailable)?;
        let version = catalog.schema_version().await.or_raise(|| ErrorKind::Catalog)?;
        self.context.catalog_schema_version = Some(version);
        self.context.catalog_supported = Some(check_db_version(version));
        let rows = catalog.query_rows(version).await.or_raise(|| ErrorKind::Catalog)?;
        catalog.close().await;
        tracing::debug!(version, rows = rows.rows.len(), variant = ?rows.variant, "Read catalog");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbsync_storage::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_legacy_profile_has_no_catalog() {
        let profile = pbsync_device::by_name("pocketbook-360").unwrap();
        let main: BackendHandle = Arc::new(MockBackend::default());
        let err = SyncSession::open(profile, main, None, "explorer-2.db", SyncOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(&*err, ErrorKind::NoCatalog("PocketBook 360")));
    }

    #[tokio::test]
    async fn test_firmware_is_read_on_open() {
        let main: BackendHandle = Arc::new(MockBackend::with_files([("fwinfo.txt", b"PB626,626,5.19.1,2018")]));
        let session = SyncSession::open(pbsync_device::generic(), main, None, "explorer-2.db", SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(session.context().firmware_version, "5.19.1");
        assert_eq!(session.context().catalog_schema_version, None);
        assert_eq!(session.context().catalog_supported, None);
        assert!(session.volume(VolumeSelector::Card).is_none());
    }

    #[tokio::test]
    async fn test_card_absent_does_not_touch_catalog() {
        let main: BackendHandle = Arc::new(MockBackend::default());
        let mut session = SyncSession::open(pbsync_device::generic(), main, None, "/nonexistent/explorer-2.db", SyncOptions::default())
            .await
            .unwrap();
        let result = session.books(VolumeSelector::Card, &CancellationToken::new()).await.unwrap();
        assert_eq!(result, ReconciliationResult::empty());
    }

    #[tokio::test]
    async fn test_missing_catalog_is_unavailable() {
        let main: BackendHandle = Arc::new(MockBackend::default());
        let mut session = SyncSession::open(pbsync_device::generic(), main, None, "/nonexistent/explorer-2.db", SyncOptions::default())
            .await
            .unwrap();
        let err = session.books(VolumeSelector::Main, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CatalogUnavailable));
        assert!(err.is_retryable());
    }
}
