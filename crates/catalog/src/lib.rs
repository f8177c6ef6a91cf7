//! Read-only access to the reader's on-device book catalog.
//!
//! The catalog is a SQLite database maintained by the reader's firmware at
//! `system/explorer-2/explorer-2.db` on main memory. It is the source of
//! truth for which books are installed on either storage volume; this crate
//! never writes to it.
//!
//! # Schema Versions
//! Two query shapes exist. Catalogs at schema version 14 or later are read
//! with the enriched query, which includes update, open and creation
//! timestamps. Older catalogs (and newer ones that lack those columns after
//! all) are read with the reduced query, which substitutes literal sentinels.
//! The [`QueryVariant`] of a [`RowSet`] records which shape was used.

mod db;
pub mod error;
mod row;

pub use crate::db::{Catalog, ENRICHED_SCHEMA_VERSION};
pub use crate::row::{CREATION_SENTINEL, CatalogRow, QueryVariant, RowSet, StorageId};

/// SQL fixtures for building throwaway catalogs in tests.
#[cfg(any(test, feature = "fixtures"))]
pub mod fixture {
    use crate::error::{ErrorKind, Result};
    use exn::ResultExt;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{Connection, SqliteConnection};
    use std::path::Path;

    /// Catalog schema as written by current firmware.
    pub const SCHEMA_V14: &str = include_str!("../fixtures/schema_v14.sql");
    /// Catalog schema without any timestamp columns.
    pub const SCHEMA_V13: &str = include_str!("../fixtures/schema_v13.sql");

    /// Execute SQL against a (possibly new) catalog file.
    pub async fn build(path: impl AsRef<Path>, sql: &str) -> Result<()> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .or_raise(|| ErrorKind::Unavailable(path.to_path_buf()))?;
        sqlx::raw_sql(sql).execute(&mut conn).await.or_raise(|| ErrorKind::Query)?;
        conn.close().await.or_raise(|| ErrorKind::Query)?;
        Ok(())
    }
}
