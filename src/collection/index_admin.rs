use super::core::Collection;
use crate::document::{Document, Value};
use crate::errors::DbError;
use crate::index::{IndexDescriptor, IndexOrder, IndexStatsSnapshot};
use crate::utils::logger::METRICS_TARGET;
use std::sync::Arc;

impl Collection {
    /// Builds an index on `field` unless one exists. Returns whether an index was built.
    ///
    /// # Errors
    /// `Validation` for an empty field name, `CollectionDropped` on a dropped collection.
    pub fn ensure_index(&self, field: &str, order: IndexOrder) -> Result<bool, DbError> {
        if field.is_empty() {
            return Err(DbError::validation("ensure_index", "field name is empty"));
        }
        let mut st = self.state.write();
        if self.is_dropped() {
            return Err(DbError::CollectionDropped(self.name().to_string()));
        }
        let docs = Arc::clone(&st.docs);
        let built = st.indexes.ensure(field, order, docs.iter().map(|d| &**d));
        if built {
            let ms = st.indexes.get(field).map_or(0, |i| i.stats.build_time_ms);
            log::info!("index {}.{field} built over {} documents in {ms} ms", self.name(), docs.len());
            log::info!(target: METRICS_TARGET, "index {}.{field} entries={} build_ms={ms}", self.name(), docs.len());
        } else {
            log::debug!("index {}.{field} already present", self.name());
        }
        Ok(built)
    }

    /// Stats for the index on `field`, if there is one.
    ///
    /// # Errors
    /// `StaleIndex` if the collection was dropped after the index was built.
    pub fn index_stats(&self, field: &str) -> Result<Option<IndexStatsSnapshot>, DbError> {
        let st = self.state.read();
        match st.indexes.get(field) {
            Some(idx) if idx.is_stale() => Err(self.stale(field)),
            Some(idx) => Ok(Some(idx.stats_snapshot())),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn index_descriptors(&self) -> Vec<IndexDescriptor> {
        self.state.read().indexes.descriptors()
    }

    /// First document holding `key` on the indexed `field`, by index order.
    ///
    /// # Errors
    /// `StaleIndex` if the collection was dropped, `Validation` if `field` is not indexed.
    pub fn lookup_first(&self, field: &str, key: &Value) -> Result<Option<Arc<Document>>, DbError> {
        let st = self.state.read();
        let Some(idx) = st.indexes.get(field) else {
            if self.is_dropped() {
                return Err(DbError::CollectionDropped(self.name().to_string()));
            }
            return Err(DbError::validation(format!("lookup on {}.{field}", self.name()), "field is not indexed"));
        };
        if idx.is_stale() {
            return Err(self.stale(field));
        }
        Ok(idx.first_eq(key).and_then(|id| st.docs.get(id.slot()).cloned()))
    }

    pub(crate) fn stale(&self, field: &str) -> DbError {
        DbError::StaleIndex { collection: self.name().to_string(), field: field.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;

    #[test]
    fn lookup_uses_the_first_match() {
        let c = Collection::new("rankings");
        c.insert(Fields::new().with("pageURL", "a").with("pageRank", 1)).unwrap();
        c.insert(Fields::new().with("pageURL", "a").with("pageRank", 2)).unwrap();
        assert!(c.ensure_index("pageURL", IndexOrder::Asc).unwrap());
        assert!(!c.ensure_index("pageURL", IndexOrder::Asc).unwrap());
        let hit = c.lookup_first("pageURL", &Value::from("a")).unwrap().unwrap();
        assert_eq!(hit.get("pageRank"), Some(&Value::from(1)));
        assert!(c.lookup_first("pageURL", &Value::from("zz")).unwrap().is_none());
        assert_eq!(c.index_stats("pageURL").unwrap().unwrap().entries, 2);
    }

    #[test]
    fn indexes_go_stale_on_drop() {
        let c = Collection::new("rankings");
        c.insert(Fields::new().with("pageURL", "a")).unwrap();
        c.ensure_index("pageURL", IndexOrder::Asc).unwrap();
        c.drop_collection();
        assert!(matches!(c.lookup_first("pageURL", &Value::from("a")), Err(DbError::StaleIndex { .. })));
        assert!(matches!(c.index_stats("pageURL"), Err(DbError::StaleIndex { .. })));
        assert!(matches!(c.ensure_index("pageURL", IndexOrder::Asc), Err(DbError::CollectionDropped(_))));
    }
}
