//! Booklists of a PocketBook reader, kept in line with its on-device catalog.
//!
//! A [`SyncSession`] reads the catalog once per pass and hands the rows to the
//! [`Reconciler`], which merges them into the booklist cached on the volume.

mod book;
mod booklist;
mod collections;
pub mod error;
mod mime;
mod path;
pub mod persist;
mod reconcile;
mod session;
mod volume;

pub use crate::book::{BookMetadata, BookRecord, MISSING_PREFIX, SENTINEL_SIZE, collections_of, is_shortcut};
pub use crate::booklist::Booklist;
pub use crate::collections::{Collection, Collections, Signals};
pub use crate::mime::mime_type;
pub use crate::path::device_path;
pub use crate::reconcile::{Reconciler, ReconciliationResult, reconcile};
pub use crate::session::{SessionContext, SyncOptions, SyncSession, VolumeSelector};
pub use crate::volume::Volume;
