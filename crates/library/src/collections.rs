//! Device collections.
//!
//! The reader doesn't store collections as such; it stores a handful of
//! integer codes per book. Collections are derived from those codes on every
//! pass and replace whatever a book had before.

use derive_more::Display;
use pbsync_catalog::CatalogRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A device collection label.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    #[display("reading")]
    Reading,
    #[display("read")]
    Read,
    #[display("closed")]
    Closed,
    #[display("expired")]
    Expired,
    #[display("shortlist")]
    Shortlist,
    #[display("preview")]
    Preview,
    #[display("recommendation")]
    Recommendation,
}

/// The collections of one book.
pub type Collections = BTreeSet<Collection>;

/// Raw collection codes of a catalog row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub read_status: i64,
    pub expired: i64,
    pub favorite: i64,
    pub accessibility: i64,
}
impl From<&CatalogRow> for Signals {
    fn from(row: &CatalogRow) -> Self {
        Self {
            read_status: row.read_status,
            expired: row.expired,
            favorite: row.favorite,
            accessibility: row.accessibility,
        }
    }
}

impl Signals {
    /// Derive the collection labels. Unknown codes contribute nothing.
    pub fn collections(&self) -> Collections {
        let mut collections = Collections::new();
        match self.read_status {
            1 => _ = collections.insert(Collection::Reading),
            2 => _ = collections.insert(Collection::Read),
            3 => _ = collections.insert(Collection::Closed),
            _ => {},
        }
        if self.expired == 3 {
            collections.insert(Collection::Expired);
        }
        if self.favorite == 1 {
            collections.insert(Collection::Shortlist);
        }
        match self.accessibility {
            6 => _ = collections.insert(Collection::Preview),
            4 => _ = collections.insert(Collection::Recommendation),
            _ => {},
        }
        collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn signals(read_status: i64, expired: i64, favorite: i64, accessibility: i64) -> Signals {
        Signals { read_status, expired, favorite, accessibility }
    }

    #[rstest]
    #[case(signals(0, 0, 0, 0), &[])]
    #[case(signals(1, 0, 0, 0), &[Collection::Reading])]
    #[case(signals(2, 0, 1, 0), &[Collection::Read, Collection::Shortlist])]
    #[case(signals(3, 3, 0, 0), &[Collection::Closed, Collection::Expired])]
    #[case(signals(0, 0, 0, 6), &[Collection::Preview])]
    #[case(signals(0, 0, 0, 4), &[Collection::Recommendation])]
    #[case(signals(1, 3, 1, 6), &[Collection::Reading, Collection::Expired, Collection::Shortlist, Collection::Preview])]
    #[case(signals(9, 2, 7, 5), &[])]
    fn test_collections(#[case] signals: Signals, #[case] expected: &[Collection]) {
        assert_eq!(signals.collections(), expected.iter().copied().collect::<Collections>());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Collection::Reading.to_string(), "reading");
        assert_eq!(Collection::Recommendation.to_string(), "recommendation");
    }
}
