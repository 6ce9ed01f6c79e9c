pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod import;
pub mod index;
pub mod join;
pub mod pipeline;
pub mod query;
pub mod synth;
pub mod types;
pub mod utils;
pub mod workload;

#[cfg(test)]
mod test_support;

use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::document::{Document, Fields};
use crate::engine::Engine;
use crate::errors::DbError;
use crate::index::{IndexOrder, IndexStatsSnapshot};
use crate::join::JoinSpec;
use crate::pipeline::{ExecOptions, Pipeline};
use crate::query::Predicate;
use crate::types::DocumentId;
use std::sync::Arc;

/// Handle to one in-memory database. Every operation names its collection
/// explicitly; there is no current-collection state.
#[derive(Debug, Clone)]
pub struct Database {
    engine: Arc<Engine>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// An empty database with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// An empty database. When `config.log_dir` is set, file logging is
    /// initialized there unless a logger is already installed.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        if let Some(dir) = &config.log_dir
            && let Err(e) = utils::logger::configure_logging(Some(dir.as_path()), config.log_level.as_deref(), None)
        {
            log::debug!("logging not reconfigured: {e}");
        }
        Self { engine: Arc::new(Engine::new(config)) }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the named collection, creating it if needed.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        self.engine.create_collection(name)
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    /// # Errors
    /// `NoSuchCollection` if `name` is unknown.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.collection(name)
    }

    /// Drops a collection and its indexes. Idempotent.
    pub fn drop_collection(&self, name: &str) -> bool {
        self.engine.drop_collection(name)
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    /// Inserts into `collection`, creating it on first use.
    ///
    /// # Errors
    /// `CollectionDropped` if a stale handle is raced by a drop.
    pub fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId, DbError> {
        self.create_collection(collection).insert(fields)
    }

    /// # Errors
    /// `CollectionDropped` if a stale handle is raced by a drop.
    pub fn insert_many(
        &self,
        collection: &str,
        batch: impl IntoIterator<Item = Fields>,
    ) -> Result<Vec<DocumentId>, DbError> {
        self.create_collection(collection).insert_many(batch)
    }

    /// # Errors
    /// `NoSuchCollection`, or `Evaluation` on a type mismatch.
    pub fn count(&self, collection: &str, predicate: Option<&Predicate>) -> Result<usize, DbError> {
        self.collection(collection)?.count(predicate)
    }

    /// # Errors
    /// `NoSuchCollection`, or `Evaluation` on a type mismatch.
    pub fn find_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Arc<Document>>, DbError> {
        self.collection(collection)?.find_one(predicate)
    }

    /// # Errors
    /// `NoSuchCollection`, or `Evaluation` on a type mismatch.
    pub fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Arc<Document>>, DbError> {
        self.collection(collection)?.find(predicate)
    }

    /// # Errors
    /// `NoSuchCollection`, or `Validation` for an empty field name.
    pub fn ensure_index(&self, collection: &str, field: &str, order: IndexOrder) -> Result<bool, DbError> {
        self.collection(collection)?.ensure_index(field, order)
    }

    /// # Errors
    /// `NoSuchCollection`, or `StaleIndex` for an index of a dropped collection.
    pub fn index_stats(&self, collection: &str, field: &str) -> Result<Option<IndexStatsSnapshot>, DbError> {
        self.collection(collection)?.index_stats(field)
    }

    /// # Errors
    /// `NoSuchCollection`, `Pipeline { stage, .. }` or `Cancelled`.
    pub fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Fields>, DbError> {
        self.aggregate_with(collection, pipeline, &ExecOptions::default())
    }

    /// # Errors
    /// `NoSuchCollection`, `Pipeline { stage, .. }` or `Cancelled`.
    pub fn aggregate_with(
        &self,
        collection: &str,
        pipeline: &Pipeline,
        opts: &ExecOptions,
    ) -> Result<Vec<Fields>, DbError> {
        let col = self.collection(collection)?;
        pipeline::run(&col, pipeline, opts)
    }

    /// Materializes `source` joined against `lookup` into `target`.
    ///
    /// # Errors
    /// `MissingJoinKey`, `NoSuchCollection` or `Validation`; `target` is
    /// unchanged on any error.
    pub fn materialize_join(
        &self,
        source: &str,
        lookup: &str,
        spec: &JoinSpec,
        target: &str,
    ) -> Result<Arc<Collection>, DbError> {
        join::materialize(&self.engine, source, lookup, spec, target)
    }
}
