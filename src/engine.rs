use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::document::Document;
use crate::errors::DbError;
use crate::types::CollectionName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The in-process engine: configuration plus the named collections.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("collections", &self.list_collection_names())
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config, collections: RwLock::new(HashMap::new()) }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the collection named `name`, creating it if absent.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        if let Some(c) = self.collections.read().get(name) {
            return Arc::clone(c);
        }
        let mut cols = self.collections.write();
        Arc::clone(cols.entry(name.to_string()).or_insert_with(|| {
            log::info!("collection {name} created");
            Arc::new(Collection::new(name))
        }))
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// # Errors
    /// `NoSuchCollection` if `name` is unknown.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    /// Removes `name` and invalidates its indexes. Dropping an unknown
    /// collection is a no-op returning false.
    pub fn drop_collection(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name);
        removed.is_some_and(|c| c.drop_collection())
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<CollectionName> {
        let mut names: Vec<_> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Installs `docs` as collection `name` in one step. Any previous
    /// collection of that name is dropped, so its handles and indexes go stale.
    pub(crate) fn replace_collection(&self, name: &str, docs: Vec<Arc<Document>>) -> Arc<Collection> {
        let fresh = Arc::new(Collection::from_documents(name, docs));
        let old = self.collections.write().insert(name.to_string(), Arc::clone(&fresh));
        if let Some(old) = old {
            old.drop_collection();
        }
        log::info!("collection {name} replaced with {} documents", fresh.len());
        fresh
    }
}
