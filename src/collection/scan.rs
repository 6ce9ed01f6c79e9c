use crate::document::Document;
use crate::types::DocumentId;
use std::sync::Arc;

/// A consistent, immutable view of a collection's documents at one instant.
#[derive(Debug, Clone)]
pub struct Snapshot {
    collection: String,
    docs: Arc<Vec<Arc<Document>>>,
}

impl Snapshot {
    pub(crate) const fn new(collection: String, docs: Arc<Vec<Arc<Document>>>) -> Self {
        Self { collection, docs }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: DocumentId) -> Option<&Arc<Document>> {
        self.docs.get(id.slot()).filter(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.docs.iter()
    }

    #[must_use]
    pub fn scan(&self) -> Scan {
        Scan { docs: Arc::clone(&self.docs), pos: 0 }
    }
}

/// Lazy insertion-order cursor over a snapshot.
#[derive(Debug, Clone)]
pub struct Scan {
    docs: Arc<Vec<Arc<Document>>>,
    pos: usize,
}

impl Scan {
    /// Rewinds to the first document.
    pub fn restart(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for Scan {
    type Item = Arc<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let doc = self.docs.get(self.pos).cloned();
        if doc.is_some() {
            self.pos += 1;
        }
        doc
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.docs.len() - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Scan {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;

    fn snap(n: u64) -> Snapshot {
        let docs = (1..=n).map(|i| Arc::new(Document::new(DocumentId(i), Fields::new().with("i", i as i64)))).collect();
        Snapshot::new("c".into(), Arc::new(docs))
    }

    #[test]
    fn scan_is_restartable() {
        let s = snap(3);
        let mut scan = s.scan();
        assert_eq!(scan.len(), 3);
        assert_eq!(scan.next().unwrap().id, DocumentId(1));
        scan.restart();
        let ids: Vec<_> = scan.map(|d| d.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(s.scan().count(), 3);
    }

    #[test]
    fn get_checks_the_id() {
        let s = snap(2);
        assert_eq!(s.get(DocumentId(2)).unwrap().id, DocumentId(2));
        assert!(s.get(DocumentId(0)).is_none());
        assert!(s.get(DocumentId(3)).is_none());
    }
}
