use std::sync::Arc;
use std::time::Instant;

use super::eval::evaluate;
use super::plan;
use super::types::Predicate;
use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::utils::devlog::BenchRecord;

/// Visits every matching document in insertion order under one read lock.
/// Every candidate is evaluated, so type errors surface even after a match.
/// Returns whether an index supplied the candidates.
fn for_each_match(
    col: &Collection,
    predicate: &Predicate,
    mut visit: impl FnMut(&Arc<Document>),
) -> Result<bool, DbError> {
    let st = col.read_state()?;
    let mut check = |d: &Arc<Document>| -> Result<(), DbError> {
        if evaluate(&d.fields, predicate).map_err(|m| m.into_error(col.name()))? {
            visit(d);
        }
        Ok(())
    };
    match plan::candidates(col.name(), &st.indexes, predicate)? {
        Some(mut ids) => {
            ids.sort_unstable();
            ids.dedup();
            for d in ids.into_iter().filter_map(|id| st.docs.get(id.slot())) {
                check(d)?;
            }
            Ok(true)
        }
        None => {
            for d in st.docs.iter() {
                check(d)?;
            }
            Ok(false)
        }
    }
}

fn trace(op: &'static str, col: &Collection, start: Instant, used_index: bool, result_count: usize) {
    BenchRecord {
        bench: "query",
        op,
        collection: col.name(),
        duration_ms: start.elapsed().as_millis(),
        used_index,
        result_count,
    }
    .emit();
}

/// # Errors
/// `Evaluation` on a type mismatch, `StaleIndex`/`CollectionDropped` on a dropped collection.
pub fn count_docs(col: &Collection, predicate: &Predicate) -> Result<usize, DbError> {
    let start = Instant::now();
    let mut n = 0usize;
    let used_index = for_each_match(col, predicate, |_| n += 1)?;
    trace("count", col, start, used_index, n);
    Ok(n)
}

/// Matching documents in insertion order, whether or not an index was used.
///
/// # Errors
/// `Evaluation` on a type mismatch, `StaleIndex`/`CollectionDropped` on a dropped collection.
pub fn find_docs(col: &Collection, predicate: &Predicate) -> Result<Vec<Arc<Document>>, DbError> {
    let start = Instant::now();
    let mut out = Vec::new();
    let used_index = for_each_match(col, predicate, |d| out.push(Arc::clone(d)))?;
    trace("find", col, start, used_index, out.len());
    Ok(out)
}

/// The earliest inserted match, or `None`.
///
/// # Errors
/// `Evaluation` on a type mismatch, `StaleIndex`/`CollectionDropped` on a dropped collection.
pub fn find_one(col: &Collection, predicate: &Predicate) -> Result<Option<Arc<Document>>, DbError> {
    let start = Instant::now();
    let mut first: Option<Arc<Document>> = None;
    let used_index = for_each_match(col, predicate, |d| {
        if first.is_none() {
            first = Some(Arc::clone(d));
        }
    })?;
    trace("find_one", col, start, used_index, usize::from(first.is_some()));
    Ok(first)
}
