use std::cmp::Ordering;

use super::types::{CmpOp, Comparator, Operand, Predicate};
use crate::document::{Fields, Value, ValueKind};
use crate::errors::DbError;

/// A comparison between values of different kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub field: String,
    pub message: String,
}

impl Mismatch {
    #[must_use]
    pub fn into_error(self, collection: &str) -> DbError {
        DbError::Evaluation { collection: collection.to_string(), field: self.field, message: self.message }
    }
}

/// Kinds a field value may have to be comparable with `cmp`.
pub(crate) fn operand_kinds(cmp: &Comparator) -> Vec<ValueKind> {
    match &cmp.operand {
        Operand::Scalar(v) => vec![v.kind()],
        Operand::Set(vs) => {
            let mut kinds: Vec<ValueKind> = vs.iter().map(Value::kind).collect();
            kinds.sort_unstable();
            kinds.dedup();
            kinds
        }
    }
}

fn compare_one(field: &str, value: &Value, cmp: &Comparator) -> Result<bool, Mismatch> {
    let kinds = operand_kinds(cmp);
    if kinds.is_empty() {
        return Ok(false);
    }
    if !kinds.contains(&value.kind()) {
        let expected = kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join("|");
        return Err(Mismatch {
            field: field.to_string(),
            message: format!("{} compares a {} value against a {expected} operand", cmp.op, value.kind()),
        });
    }
    let ord = |rhs: &Value| value.cmp(rhs);
    Ok(match (&cmp.operand, cmp.op) {
        (Operand::Set(vs), CmpOp::In) => vs.iter().any(|v| v == value),
        (Operand::Set(_), _) => false,
        (Operand::Scalar(v), CmpOp::Eq | CmpOp::In) => ord(v) == Ordering::Equal,
        (Operand::Scalar(v), CmpOp::Ne) => ord(v) != Ordering::Equal,
        (Operand::Scalar(v), CmpOp::Gt) => ord(v) == Ordering::Greater,
        (Operand::Scalar(v), CmpOp::Gte) => ord(v) != Ordering::Less,
        (Operand::Scalar(v), CmpOp::Lt) => ord(v) == Ordering::Less,
        (Operand::Scalar(v), CmpOp::Lte) => ord(v) != Ordering::Greater,
    })
}

/// Evaluates every clause of `predicate` against `fields`.
///
/// All comparators are checked even after one fails, so a type mismatch is
/// reported regardless of clause order. A missing field satisfies only `$ne`.
///
/// # Errors
/// Returns a [`Mismatch`] when a present value's kind differs from the operand's.
pub fn evaluate(fields: &Fields, predicate: &Predicate) -> Result<bool, Mismatch> {
    let mut all = true;
    for clause in &predicate.clauses {
        let value = fields.get(&clause.field);
        for cmp in &clause.comparators {
            let hit = match value {
                Some(v) => compare_one(&clause.field, v, cmp)?,
                None => cmp.op == CmpOp::Ne,
            };
            all &= hit;
        }
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Fields {
        Fields::new()
            .with("pageRank", 150)
            .with("adRevenue", 0.25)
            .with("visitDate", Value::date("1982-07-15").unwrap())
            .with("sourceIP", "158.112.27.3")
    }

    #[test]
    fn numeric_and_date_ranges() {
        let d = doc();
        assert!(evaluate(&d, &Predicate::new().gt("pageRank", 100)).unwrap());
        assert!(!evaluate(&d, &Predicate::new().gt("pageRank", 1000)).unwrap());
        assert!(evaluate(&d, &Predicate::new().gte("pageRank", 150.0).lte("pageRank", 150)).unwrap());
        let range = Predicate::new()
            .gt("visitDate", Value::date("1980-01-01").unwrap())
            .lt("visitDate", Value::date("1983-04-01").unwrap());
        assert!(evaluate(&d, &range).unwrap());
        let narrow = Predicate::new()
            .gt("visitDate", Value::date("1980-01-01").unwrap())
            .lt("visitDate", Value::date("1980-04-01").unwrap());
        assert!(!evaluate(&d, &narrow).unwrap());
    }

    #[test]
    fn missing_fields_only_satisfy_ne() {
        let d = doc();
        assert!(!evaluate(&d, &Predicate::new().eq("nope", 1)).unwrap());
        assert!(!evaluate(&d, &Predicate::new().lt("nope", 1)).unwrap());
        assert!(evaluate(&d, &Predicate::new().ne("nope", 1)).unwrap());
    }

    #[test]
    fn kind_mismatch_is_reported_even_after_a_false_clause() {
        let d = doc();
        let p = Predicate::new().gt("pageRank", 1000).gt("sourceIP", 5);
        let m = evaluate(&d, &p).unwrap_err();
        assert_eq!(m.field, "sourceIP");
        assert!(m.message.contains("string value against a number operand"));
        let err = m.into_error("userVisits");
        assert!(err.to_string().contains("collection userVisits, field sourceIP"));
        // a string never compares with a date
        assert!(evaluate(&d, &Predicate::new().gt("visitDate", "1980")).is_err());
    }

    #[test]
    fn in_sets() {
        let d = doc();
        assert!(evaluate(&d, &Predicate::new().in_set("pageRank", [1, 150])).unwrap());
        assert!(!evaluate(&d, &Predicate::new().in_set("pageRank", [1, 2])).unwrap());
        assert!(!evaluate(&d, &Predicate::new().in_set("pageRank", Vec::<i64>::new())).unwrap());
        assert!(evaluate(&d, &Predicate::new().in_set("pageRank", ["x"])).is_err());
    }
}
