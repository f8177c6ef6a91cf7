//! Catalog connection and queries.

use exn::{OptionExt, ResultExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Connection, FromRow, SqliteConnection};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::row::{CatalogRow, QueryVariant, RawRow, RowSet};

/// First schema version carrying update, open and creation timestamps.
pub const ENRICHED_SCHEMA_VERSION: i64 = 14;
/// Columns whose absence is recovered by retrying with the reduced query.
const OPTIONAL_COLUMNS: [&str; 3] = ["updated", "opentime", "creationtime"];

/// Read-only handle on the reader's book catalog.
///
/// Holds a single SQLite connection for the duration of one reconciliation
/// pass. Call [`close`](Catalog::close) when done; on error paths dropping
/// the handle releases the connection.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    conn: SqliteConnection,
}

impl Catalog {
    /// Open the catalog at the given path, read-only.
    ///
    /// The catalog belongs to the reader: it is never created, migrated or
    /// written to.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .create_if_missing(false)
            // The reader may still be writing to it right after mounting.
            .busy_timeout(std::time::Duration::from_millis(1500));
        let conn = SqliteConnection::connect_with(&options)
            .await
            .or_raise(|| ErrorKind::Unavailable(path.clone()))?;
        Ok(Self { path, conn })
    }

    /// Path of the catalog file on the host.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version stored in the catalog's `version` table.
    pub async fn schema_version(&mut self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar(include_str!("../queries/schema_version.sql"))
            .fetch_optional(&mut self.conn)
            .await
            .or_raise(|| ErrorKind::Query)?;
        let version = version.ok_or_raise(|| ErrorKind::InvalidData("schema version"))?;
        tracing::debug!(version, "Read catalog schema version");
        Ok(version)
    }

    /// Read every book row.
    ///
    /// Schema versions from [`ENRICHED_SCHEMA_VERSION`] onwards are read with
    /// the enriched query. If that fails because one of the timestamp columns
    /// is missing anyway (catalogs upgraded in place by some firmware), the
    /// reduced query is used instead. Any other failure propagates.
    ///
    /// Rows that fail to decode are logged and counted in
    /// [`RowSet::rejected`].
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn query_rows(&mut self, schema_version: i64) -> Result<RowSet> {
        if schema_version < ENRICHED_SCHEMA_VERSION {
            return self.fetch(QueryVariant::Reduced).await;
        }
        match self.fetch_raw(QueryVariant::Enriched).await {
            Ok(rows) => Ok(Self::decode(QueryVariant::Enriched, rows)),
            Err(e) if is_missing_optional_column(&e) => {
                tracing::warn!(schema_version, error = %e, "Catalog lacks timestamp columns, falling back to reduced query");
                self.fetch(QueryVariant::Reduced).await
            },
            Err(e) => {
                let kind = kind_of(&e);
                Err(e).or_raise(|| kind)
            },
        }
    }

    async fn fetch(&mut self, variant: QueryVariant) -> Result<RowSet> {
        match self.fetch_raw(variant).await {
            Ok(rows) => Ok(Self::decode(variant, rows)),
            Err(e) => {
                let kind = kind_of(&e);
                Err(e).or_raise(|| kind)
            },
        }
    }

    async fn fetch_raw(&mut self, variant: QueryVariant) -> sqlx::Result<Vec<SqliteRow>> {
        let sql = match variant {
            QueryVariant::Enriched => include_str!("../queries/list_books.sql"),
            QueryVariant::Reduced => include_str!("../queries/list_books_reduced.sql"),
        };
        sqlx::query(sql).fetch_all(&mut self.conn).await
    }

    fn decode(variant: QueryVariant, rows: Vec<SqliteRow>) -> RowSet {
        let mut decoded = Vec::with_capacity(rows.len());
        let mut rejected = 0;
        for row in &rows {
            let converted = RawRow::from_row(row)
                .or_raise(|| ErrorKind::InvalidData("row"))
                .and_then(CatalogRow::try_from);
            match converted {
                Ok(row) => decoded.push(row),
                Err(e) => {
                    rejected += 1;
                    tracing::warn!(error = ?e, "Skipping undecodable catalog row");
                },
            }
        }
        tracing::debug!(?variant, rows = decoded.len(), rejected, "Read catalog rows");
        RowSet { variant, rows: decoded, rejected }
    }

    /// Release the connection.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            tracing::debug!(path = %self.path.display(), error = %e, "Error while closing catalog");
        }
    }
}

fn kind_of(e: &sqlx::Error) -> ErrorKind {
    match e {
        sqlx::Error::Database(db) if db.message().contains("no such column") => ErrorKind::SchemaMismatch,
        _ => ErrorKind::Query,
    }
}

fn is_missing_optional_column(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            let message = db.message();
            message.contains("no such column") && OPTIONAL_COLUMNS.iter().any(|column| message.contains(column))
        },
        _ => false,
    }
}
