use std::ops::Bound;

use super::eval::operand_kinds;
use super::types::{Clause, CmpOp, Operand, Predicate};
use crate::document::Value;
use crate::errors::DbError;
use crate::index::{BTreeIndex, IndexManager};
use crate::types::DocumentId;

/// Candidate ids for `predicate` from the indexes, or `None` when it must be a full scan.
///
/// Candidates come from the first clause on an indexed field that has a
/// usable comparator. They are a superset of the matches, in index order;
/// callers re-check the whole predicate, which covers the unindexed clauses.
///
/// # Errors
/// `StaleIndex` for an invalidated index, `Evaluation` when an index holds
/// values of a kind the predicate's operands cannot compare with.
pub(crate) fn candidates(
    collection: &str,
    indexes: &IndexManager,
    predicate: &Predicate,
) -> Result<Option<Vec<DocumentId>>, DbError> {
    let resolved: Vec<(&Clause, &BTreeIndex)> =
        predicate.clauses.iter().filter_map(|c| indexes.get(&c.field).map(|idx| (c, idx))).collect();
    for (clause, idx) in &resolved {
        if idx.is_stale() {
            return Err(DbError::StaleIndex { collection: collection.to_string(), field: clause.field.clone() });
        }
        for cmp in &clause.comparators {
            let kinds = operand_kinds(cmp);
            if kinds.is_empty() {
                continue;
            }
            if let Some(found) = idx.foreign_kind(&kinds) {
                let expected = kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join("|");
                return Err(DbError::Evaluation {
                    collection: collection.to_string(),
                    field: clause.field.clone(),
                    message: format!("{} compares a {found} value against a {expected} operand", cmp.op),
                });
            }
        }
    }
    Ok(resolved.into_iter().find_map(|(clause, idx)| lookup(clause, idx)))
}

fn lookup(clause: &Clause, idx: &BTreeIndex) -> Option<Vec<DocumentId>> {
    let mut lower: Bound<&Value> = Bound::Unbounded;
    let mut upper: Bound<&Value> = Bound::Unbounded;
    for cmp in &clause.comparators {
        match (&cmp.operand, cmp.op) {
            (Operand::Scalar(v), CmpOp::Eq | CmpOp::In) => return Some(idx.lookup_eq(v).to_vec()),
            (Operand::Set(vs), CmpOp::In) => {
                return Some(vs.iter().flat_map(|v| idx.lookup_eq(v).iter().copied()).collect());
            }
            (Operand::Scalar(v), CmpOp::Gt) if matches!(lower, Bound::Unbounded) => lower = Bound::Excluded(v),
            (Operand::Scalar(v), CmpOp::Gte) if matches!(lower, Bound::Unbounded) => lower = Bound::Included(v),
            (Operand::Scalar(v), CmpOp::Lt) if matches!(upper, Bound::Unbounded) => upper = Bound::Excluded(v),
            (Operand::Scalar(v), CmpOp::Lte) if matches!(upper, Bound::Unbounded) => upper = Bound::Included(v),
            _ => {}
        }
    }
    if matches!((lower, upper), (Bound::Unbounded, Bound::Unbounded)) {
        return None;
    }
    Some(idx.lookup_range(lower, upper))
}
