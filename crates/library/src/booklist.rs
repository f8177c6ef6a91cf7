use std::collections::{HashMap, HashSet};

use crate::book::BookRecord;

/// The books of a single storage volume, in stable order.
///
/// Device paths are unique: inserting a record whose path is already present
/// replaces the existing record in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Booklist {
    books: Vec<BookRecord>,
    index: HashMap<String, usize>,
}

impl Booklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BookRecord> {
        self.books.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.books.iter().map(|book| book.device_path.as_str())
    }

    pub fn contains(&self, device_path: &str) -> bool {
        self.index.contains_key(device_path)
    }

    pub fn get(&self, device_path: &str) -> Option<&BookRecord> {
        self.index.get(device_path).map(|&i| &self.books[i])
    }

    pub fn get_mut(&mut self, device_path: &str) -> Option<&mut BookRecord> {
        self.index.get(device_path).map(|&i| &mut self.books[i])
    }

    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, book: BookRecord) -> Option<BookRecord> {
        match self.index.get(&book.device_path) {
            Some(&i) => Some(std::mem::replace(&mut self.books[i], book)),
            None => {
                self.index.insert(book.device_path.clone(), self.books.len());
                self.books.push(book);
                None
            },
        }
    }

    /// Remove every record whose path is in the set, returning the removed
    /// records in their original order.
    pub fn remove_all(&mut self, device_paths: &HashSet<String>) -> Vec<BookRecord> {
        if device_paths.is_empty() {
            return Vec::new();
        }
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.books)
            .into_iter()
            .partition(|book| device_paths.contains(&book.device_path));
        self.books = kept;
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.index = self.books.iter().enumerate().map(|(i, book)| (book.device_path.clone(), i)).collect();
    }
}

impl FromIterator<BookRecord> for Booklist {
    fn from_iter<I: IntoIterator<Item = BookRecord>>(iter: I) -> Self {
        let mut booklist = Self::new();
        for book in iter {
            booklist.insert(book);
        }
        booklist
    }
}

impl<'a> IntoIterator for &'a Booklist {
    type Item = &'a BookRecord;
    type IntoIter = std::slice::Iter<'a, BookRecord>;
    fn into_iter(self) -> Self::IntoIter {
        self.books.iter()
    }
}

impl IntoIterator for Booklist {
    type Item = BookRecord;
    type IntoIter = std::vec::IntoIter<BookRecord>;
    fn into_iter(self) -> Self::IntoIter {
        self.books.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::Collections;
    use time::UtcDateTime;

    fn book(path: &str, title: &str) -> BookRecord {
        BookRecord {
            device_path: path.to_string(),
            title: title.to_string(),
            authors: vec!["Unknown".to_string()],
            mime_type: "application/epub+zip".to_string(),
            timestamp: UtcDateTime::UNIX_EPOCH,
            collections: Collections::new(),
            thumbnail: None,
            size_bytes: 0,
            series: None,
            series_index: None,
            last_opened: None,
        }
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut booklist: Booklist = [book("a", "A"), book("b", "B")].into_iter().collect();
        let replaced = booklist.insert(book("a", "A2")).unwrap();
        assert_eq!(replaced.title, "A");
        assert_eq!(booklist.len(), 2);
        let titles: Vec<_> = booklist.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["A2", "B"]);
    }

    #[test]
    fn test_remove_all_keeps_order_and_index() {
        let mut booklist: Booklist = ["a", "b", "c", "d"].into_iter().map(|p| book(p, p)).collect();
        let removed = booklist.remove_all(&HashSet::from(["b".to_string(), "d".to_string(), "zz".to_string()]));
        assert_eq!(removed.iter().map(|b| b.device_path.as_str()).collect::<Vec<_>>(), ["b", "d"]);
        assert_eq!(booklist.paths().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(booklist.get("c").unwrap().title, "c");
        assert!(!booklist.contains("b"));
        booklist.get_mut("c").unwrap().title = "C".to_string();
        assert_eq!(booklist.get("c").unwrap().title, "C");
    }

    #[test]
    fn test_remove_nothing() {
        let mut booklist: Booklist = [book("a", "A")].into_iter().collect();
        assert!(booklist.remove_all(&HashSet::new()).is_empty());
        assert_eq!(booklist.len(), 1);
    }
}
