use crate::document::Value;
use serde::Serialize;
use std::fmt;

pub(crate) const MAX_IN_SET: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl CmpOp {
    #[must_use]
    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Scalar(Value),
    Set(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparator {
    pub op: CmpOp,
    pub operand: Operand,
}

/// All comparators on one field, ANDed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub field: String,
    pub comparators: Vec<Comparator>,
}

/// Conjunction of per-field clauses. The empty predicate matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub clauses: Vec<Clause>,
}

impl Predicate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub(crate) fn push(&mut self, field: &str, op: CmpOp, operand: Operand) {
        let cmp = Comparator { op, operand };
        match self.clauses.iter_mut().find(|c| c.field == field) {
            Some(c) => c.comparators.push(cmp),
            None => self.clauses.push(Clause { field: field.to_string(), comparators: vec![cmp] }),
        }
    }

    fn with(mut self, field: &str, op: CmpOp, value: impl Into<Value>) -> Self {
        self.push(field, op, Operand::Scalar(value.into()));
        self
    }

    #[must_use]
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, CmpOp::Eq, value)
    }

    #[must_use]
    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, CmpOp::Ne, value)
    }

    #[must_use]
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, CmpOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, CmpOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, CmpOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, CmpOp::Lte, value)
    }

    #[must_use]
    pub fn in_set<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push(field, CmpOp::In, Operand::Set(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|c| c.field.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_merges_comparators_per_field() {
        let p = Predicate::new()
            .gt("visitDate", Value::date("1980-01-01").unwrap())
            .lt("visitDate", Value::date("1983-04-01").unwrap())
            .eq("sourceIP", "1.2.3.4");
        assert_eq!(p.clauses.len(), 2);
        assert_eq!(p.clauses[0].comparators.len(), 2);
        assert_eq!(p.fields().collect::<Vec<_>>(), vec!["visitDate", "sourceIP"]);
        assert!(Predicate::all().is_empty());
    }

    #[test]
    fn operator_names_round_trip() {
        for op in [CmpOp::Eq, CmpOp::Ne, CmpOp::Gt, CmpOp::Gte, CmpOp::Lt, CmpOp::Lte, CmpOp::In] {
            assert_eq!(CmpOp::from_operator(op.operator()), Some(op));
        }
        assert_eq!(CmpOp::from_operator("$regex"), None);
    }
}
