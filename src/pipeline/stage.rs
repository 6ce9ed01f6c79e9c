use crate::document::{Fields, Number, Value};
use crate::index::IndexOrder;
use crate::query::{Mismatch, Predicate};

pub const MAX_SORT_FIELDS: usize = 8;

/// A value computed from one input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `"$field"`
    Field(String),
    /// `{$substr: ["$field", start, len]}`: characters `start..start + len`, never padded.
    Substr { field: String, start: usize, len: usize },
}

impl Expr {
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    #[must_use]
    pub fn substr(name: impl Into<String>, start: usize, len: usize) -> Self {
        Self::Substr { field: name.into(), start, len }
    }

    /// The input field this expression reads.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Field(f) | Self::Substr { field: f, .. } => f,
        }
    }

    /// `Ok(None)` when the source field is missing.
    ///
    /// # Errors
    /// A [`Mismatch`] for `$substr` over a number.
    pub fn eval(&self, fields: &Fields) -> Result<Option<Value>, Mismatch> {
        let Some(v) = fields.get(self.source()) else {
            return Ok(None);
        };
        match self {
            Self::Field(_) => Ok(Some(v.clone())),
            Self::Substr { field, start, len } => match v.as_text() {
                Some(s) => Ok(Some(Value::String(s.chars().skip(*start).take(*len).collect()))),
                None => Err(Mismatch {
                    field: field.clone(),
                    message: format!("$substr needs a string or date, found a {}", v.kind()),
                }),
            },
        }
    }
}

/// Output fields of a `$project`, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSpec {
    pub fields: Vec<(String, Expr)>,
}

impl ProjectSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn include(self, name: &str) -> Self {
        self.derive(name, Expr::field(name))
    }

    #[must_use]
    pub fn rename(self, name: &str, source: &str) -> Self {
        self.derive(name, Expr::field(source))
    }

    #[must_use]
    pub fn substr(self, name: &str, source: &str, start: usize, len: usize) -> Self {
        self.derive(name, Expr::substr(source, start, len))
    }

    #[must_use]
    pub fn derive(mut self, name: &str, expr: Expr) -> Self {
        self.fields.push((name.to_string(), expr));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SumOperand {
    Field(String),
    Constant(Number),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(SumOperand),
    Avg(String),
    First(String),
}

impl Accumulator {
    #[must_use]
    pub const fn operator(&self) -> &'static str {
        match self {
            Self::Sum(_) => "$sum",
            Self::Avg(_) => "$avg",
            Self::First(_) => "$first",
        }
    }

    /// The input field read, if any.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Sum(SumOperand::Field(f)) | Self::Avg(f) | Self::First(f) => Some(f),
            Self::Sum(SumOperand::Constant(_)) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// One group for the whole input.
    Null,
    /// Key stored under `_id`.
    Single(Expr),
    /// Key parts stored under their own names.
    Compound(Vec<(String, Expr)>),
}

impl GroupKey {
    pub(crate) fn parts(&self) -> Vec<(&str, &Expr)> {
        match self {
            Self::Null => Vec::new(),
            Self::Single(e) => vec![("_id", e)],
            Self::Compound(parts) => parts.iter().map(|(n, e)| (n.as_str(), e)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub key: GroupKey,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    #[must_use]
    pub const fn new(key: GroupKey) -> Self {
        Self { key, accumulators: Vec::new() }
    }

    #[must_use]
    pub fn by_field(field: &str) -> Self {
        Self::new(GroupKey::Single(Expr::field(field)))
    }

    #[must_use]
    pub const fn all() -> Self {
        Self::new(GroupKey::Null)
    }

    #[must_use]
    pub fn accumulate(mut self, name: &str, acc: Accumulator) -> Self {
        self.accumulators.push((name.to_string(), acc));
        self
    }

    #[must_use]
    pub fn sum(self, name: &str, field: &str) -> Self {
        self.accumulate(name, Accumulator::Sum(SumOperand::Field(field.to_string())))
    }

    /// `{$sum: 1}`
    #[must_use]
    pub fn count(self, name: &str) -> Self {
        self.accumulate(name, Accumulator::Sum(SumOperand::Constant(Number::Int(1))))
    }

    #[must_use]
    pub fn avg(self, name: &str, field: &str) -> Self {
        self.accumulate(name, Accumulator::Avg(field.to_string()))
    }

    #[must_use]
    pub fn first(self, name: &str, field: &str) -> Self {
        self.accumulate(name, Accumulator::First(field.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: IndexOrder,
}

impl SortKey {
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), order: IndexOrder::Asc }
    }

    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), order: IndexOrder::Desc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Project(ProjectSpec),
    Match(Predicate),
    Group(GroupSpec),
    Sort(Vec<SortKey>),
    Limit(usize),
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Project(_) => "$project",
            Self::Match(_) => "$match",
            Self::Group(_) => "$group",
            Self::Sort(_) => "$sort",
            Self::Limit(_) => "$limit",
        }
    }
}

/// A validated, immutable stage list.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub(crate) stages: Vec<Stage>,
}

impl Pipeline {
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substr_counts_characters_without_padding() {
        let f = Fields::new().with("ip", "158.112.27.3").with("u", "ünï").with("n", 5);
        assert_eq!(Expr::substr("ip", 0, 7).eval(&f).unwrap(), Some(Value::from("158.112")));
        assert_eq!(Expr::substr("ip", 8, 50).eval(&f).unwrap(), Some(Value::from("27.3")));
        assert_eq!(Expr::substr("ip", 40, 2).eval(&f).unwrap(), Some(Value::from("")));
        assert_eq!(Expr::substr("u", 1, 1).eval(&f).unwrap(), Some(Value::from("n")));
        assert_eq!(Expr::substr("gone", 0, 1).eval(&f).unwrap(), None);
        assert!(Expr::substr("n", 0, 1).eval(&f).is_err());
    }

    #[test]
    fn substr_of_a_date_is_a_string() {
        let f = Fields::new().with("d", Value::date("1983-04-01").unwrap());
        assert_eq!(Expr::substr("d", 0, 4).eval(&f).unwrap(), Some(Value::from("1983")));
    }
}
