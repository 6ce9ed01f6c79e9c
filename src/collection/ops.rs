use super::core::Collection;
use super::scan::{Scan, Snapshot};
use crate::document::{Document, Fields};
use crate::errors::DbError;
use crate::query::{self, Predicate};
use crate::types::DocumentId;
use std::sync::Arc;

impl Collection {
    /// Appends one document and updates every index.
    ///
    /// # Errors
    /// Returns `CollectionDropped` if the collection has been dropped.
    pub fn insert(&self, fields: Fields) -> Result<DocumentId, DbError> {
        Ok(self.insert_many(std::iter::once(fields))?[0])
    }

    /// Appends documents in order under one write lock.
    ///
    /// # Errors
    /// Returns `CollectionDropped` if the collection has been dropped.
    pub fn insert_many(&self, batch: impl IntoIterator<Item = Fields>) -> Result<Vec<DocumentId>, DbError> {
        let mut st = self.state.write();
        if self.is_dropped() {
            return Err(DbError::CollectionDropped(self.name().to_string()));
        }
        let st = &mut *st;
        let docs = Arc::make_mut(&mut st.docs);
        let mut ids = Vec::new();
        for fields in batch {
            let id = DocumentId(docs.len() as u64 + 1);
            let doc = Arc::new(Document::new(id, fields));
            st.indexes.insert_all(&doc);
            docs.push(doc);
            ids.push(id);
        }
        Ok(ids)
    }

    /// # Errors
    /// Returns `CollectionDropped` if the collection has been dropped.
    pub fn snapshot(&self) -> Result<Snapshot, DbError> {
        let st = self.read_state()?;
        Ok(Snapshot::new(self.name().to_string(), Arc::clone(&st.docs)))
    }

    /// Lazy scan in insertion order. Each call starts from the first document.
    ///
    /// # Errors
    /// Returns `CollectionDropped` if the collection has been dropped.
    pub fn scan(&self) -> Result<Scan, DbError> {
        Ok(self.snapshot()?.scan())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Errors
    /// Returns `CollectionDropped` if the collection has been dropped.
    pub fn get(&self, id: DocumentId) -> Result<Option<Arc<Document>>, DbError> {
        let st = self.read_state()?;
        Ok(st.docs.get(id.slot()).filter(|d| d.id == id).cloned())
    }

    /// Number of documents, or of those matching `predicate`.
    ///
    /// # Errors
    /// `Evaluation` on a type mismatch, `CollectionDropped` on a dropped collection.
    pub fn count(&self, predicate: Option<&Predicate>) -> Result<usize, DbError> {
        match predicate {
            Some(p) => query::count_docs(self, p),
            None => Ok(self.read_state()?.docs.len()),
        }
    }

    /// First matching document in insertion order; `Ok(None)` when nothing matches.
    ///
    /// # Errors
    /// `Evaluation` on a type mismatch, `CollectionDropped` on a dropped collection.
    pub fn find_one(&self, predicate: &Predicate) -> Result<Option<Arc<Document>>, DbError> {
        query::find_one(self, predicate)
    }

    /// All matching documents in insertion order.
    ///
    /// # Errors
    /// `Evaluation` on a type mismatch, `CollectionDropped` on a dropped collection.
    pub fn find(&self, predicate: &Predicate) -> Result<Vec<Arc<Document>>, DbError> {
        query::find_docs(self, predicate)
    }

    /// Removes all documents and invalidates the indexes. Returns false if already dropped.
    pub fn drop_collection(&self) -> bool {
        let mut st = self.state.write();
        if !self.mark_dropped() {
            return false;
        }
        st.docs = Arc::new(Vec::new());
        st.indexes.invalidate_all();
        log::info!("collection {} dropped", self.name());
        true
    }
}
