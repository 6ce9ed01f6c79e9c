use crate::document::Document;
use crate::errors::DbError;
use crate::index::IndexManager;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Documents and indexes of one collection, guarded together so an index
/// never disagrees with the documents it was read alongside.
#[derive(Debug, Default)]
pub(crate) struct CollectionState {
    /// Copy-on-write; readers clone the `Arc` to pin a snapshot.
    pub(crate) docs: Arc<Vec<Arc<Document>>>,
    pub(crate) indexes: IndexManager,
}

#[derive(Debug)]
pub struct Collection {
    name: String,
    pub(crate) state: RwLock<CollectionState>,
    dropped: AtomicBool,
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: RwLock::new(CollectionState::default()), dropped: AtomicBool::new(false) }
    }

    /// Builds a collection from fully prepared documents, indexing nothing.
    pub(crate) fn from_documents(name: impl Into<String>, docs: Vec<Arc<Document>>) -> Self {
        let col = Self::new(name);
        col.state.write().docs = Arc::new(docs);
        col
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dropped(&self) -> bool {
        !self.dropped.swap(true, Ordering::AcqRel)
    }

    /// Read access to the live state; fails once the collection is dropped.
    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, CollectionState>, DbError> {
        let guard = self.state.read();
        if self.is_dropped() {
            return Err(DbError::CollectionDropped(self.name.clone()));
        }
        Ok(guard)
    }
}
