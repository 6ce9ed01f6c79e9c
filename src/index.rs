use crate::document::{Document, Value, ValueKind};
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOrder {
    Asc,
    Desc,
}

impl IndexOrder {
    /// MongoDB-style direction: `1` ascending, `-1` descending.
    #[must_use]
    pub const fn from_direction(d: i64) -> Option<Self> {
        match d {
            1 => Some(Self::Asc),
            -1 => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub build_time_ms: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStatsSnapshot {
    pub keys: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub build_time_ms: u128,
}

/// Ordered single-field index. Ids under one key are kept in insertion order.
#[derive(Debug)]
pub struct BTreeIndex {
    pub field: String,
    pub order: IndexOrder,
    map: BTreeMap<Value, Vec<DocumentId>>,
    kinds: HashMap<ValueKind, usize>,
    stale: bool,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(field: String, order: IndexOrder) -> Self {
        Self {
            field,
            order,
            map: BTreeMap::new(),
            kinds: HashMap::new(),
            stale: false,
            stats: IndexStats::default(),
        }
    }

    /// Adds a document. Documents must arrive in insertion order.
    pub fn insert(&mut self, doc: &Document) {
        if let Some(v) = doc.get(&self.field) {
            *self.kinds.entry(v.kind()).or_default() += 1;
            self.map.entry(v.clone()).or_default().push(doc.id);
            self.stats.entries += 1;
            self.stats.keys = self.map.len();
        }
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// Drops all entries and marks the index unusable.
    pub fn invalidate(&mut self) {
        self.map.clear();
        self.kinds.clear();
        self.stale = true;
        self.stats.keys = 0;
        self.stats.entries = 0;
    }

    /// A kind held by some indexed value but not listed in `allowed`, if any.
    #[must_use]
    pub fn foreign_kind(&self, allowed: &[ValueKind]) -> Option<ValueKind> {
        let mut foreign: Vec<ValueKind> =
            self.kinds.iter().filter(|(k, n)| **n > 0 && !allowed.contains(*k)).map(|(k, _)| *k).collect();
        foreign.sort_unstable();
        foreign.first().copied()
    }

    fn record(&self, found: bool) {
        if found {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn lookup_eq(&self, v: &Value) -> &[DocumentId] {
        let ids = self.map.get(v).map_or(&[][..], Vec::as_slice);
        self.record(!ids.is_empty());
        ids
    }

    /// First document holding `v`, by index order.
    #[must_use]
    pub fn first_eq(&self, v: &Value) -> Option<DocumentId> {
        self.lookup_eq(v).first().copied()
    }

    /// Ids whose value lies within the bounds, in index order.
    #[must_use]
    pub fn lookup_range(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> Vec<DocumentId> {
        if let (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) =
            (lower, upper)
        {
            let empty = l > u
                || (l == u && !matches!((lower, upper), (Bound::Included(_), Bound::Included(_))));
            if empty {
                self.record(false);
                return Vec::new();
            }
        }
        let range = self.map.range::<Value, _>((lower, upper));
        let out: Vec<DocumentId> = match self.order {
            IndexOrder::Asc => range.flat_map(|(_, ids)| ids.iter().copied()).collect(),
            IndexOrder::Desc => range.rev().flat_map(|(_, ids)| ids.iter().copied()).collect(),
        };
        self.record(!out.is_empty());
        out
    }

    #[must_use]
    pub fn stats_snapshot(&self) -> IndexStatsSnapshot {
        IndexStatsSnapshot {
            keys: self.stats.keys,
            entries: self.stats.entries,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            build_time_ms: self.stats.build_time_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub field: String,
    pub order: IndexOrder,
}

#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: HashMap<String, BTreeIndex>, // key: field name
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: HashMap::new() }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&BTreeIndex> {
        self.indexes.get(field)
    }

    /// Builds an index over `docs` unless one already exists on `field`.
    /// Returns whether a new index was built.
    pub fn ensure<'a>(
        &mut self,
        field: &str,
        order: IndexOrder,
        docs: impl IntoIterator<Item = &'a Document>,
    ) -> bool {
        if self.indexes.contains_key(field) {
            return false;
        }
        let start = std::time::Instant::now();
        let mut idx = BTreeIndex::new(field.to_string(), order);
        for d in docs {
            idx.insert(d);
        }
        idx.stats.build_time_ms = start.elapsed().as_millis();
        self.indexes.insert(field.to_string(), idx);
        true
    }

    pub fn insert_all(&mut self, doc: &Document) {
        for idx in self.indexes.values_mut() {
            idx.insert(doc);
        }
    }

    pub fn invalidate_all(&mut self) {
        for idx in self.indexes.values_mut() {
            idx.invalidate();
        }
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        let mut out: Vec<IndexDescriptor> = self
            .indexes
            .values()
            .map(|i| IndexDescriptor { field: i.field.clone(), order: i.order })
            .collect();
        out.sort_by(|a, b| a.field.cmp(&b.field));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;

    fn docs(values: &[i64]) -> Vec<Document> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Document::new(DocumentId(i as u64 + 1), Fields::new().with("k", *v)))
            .collect()
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let ds = docs(&[5, 3, 5, 1, 5]);
        let mut mgr = IndexManager::new();
        assert!(mgr.ensure("k", IndexOrder::Asc, &ds));
        let idx = mgr.get("k").unwrap();
        assert_eq!(idx.lookup_eq(&Value::from(5)), &[DocumentId(1), DocumentId(3), DocumentId(5)]);
        assert_eq!(idx.first_eq(&Value::from(5)), Some(DocumentId(1)));
        assert_eq!(idx.first_eq(&Value::from(7)), None);
    }

    #[test]
    fn ensure_is_a_no_op_when_present() {
        let ds = docs(&[1, 2]);
        let mut mgr = IndexManager::new();
        assert!(mgr.ensure("k", IndexOrder::Asc, &ds));
        assert!(!mgr.ensure("k", IndexOrder::Desc, &ds));
        assert_eq!(mgr.get("k").unwrap().order, IndexOrder::Asc);
    }

    #[test]
    fn range_bounds_and_direction() {
        let ds = docs(&[10, 20, 30, 40]);
        let mut mgr = IndexManager::new();
        mgr.ensure("k", IndexOrder::Desc, &ds);
        let idx = mgr.get("k").unwrap();
        let lo = Value::from(10);
        let hi = Value::from(40);
        let got = idx.lookup_range(Bound::Excluded(&lo), Bound::Excluded(&hi));
        assert_eq!(got, vec![DocumentId(3), DocumentId(2)]);
        assert!(idx.lookup_range(Bound::Excluded(&hi), Bound::Excluded(&lo)).is_empty());
        assert!(idx.lookup_range(Bound::Excluded(&lo), Bound::Included(&lo)).is_empty());
        let snap = idx.stats_snapshot();
        assert_eq!(snap.entries, 4);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 2);
    }

    #[test]
    fn tracks_foreign_kinds_and_invalidation() {
        let mut ds = docs(&[1]);
        ds.push(Document::new(DocumentId(2), Fields::new().with("k", "text")));
        let mut mgr = IndexManager::new();
        mgr.ensure("k", IndexOrder::Asc, &ds);
        assert_eq!(mgr.get("k").unwrap().foreign_kind(&[ValueKind::Number]), Some(ValueKind::String));
        mgr.invalidate_all();
        let idx = mgr.get("k").unwrap();
        assert!(idx.is_stale());
        assert_eq!(idx.foreign_kind(&[ValueKind::Number]), None);
    }
}
