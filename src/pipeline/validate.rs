use std::collections::HashSet;

use super::stage::{Expr, MAX_SORT_FIELDS, Stage};
use crate::errors::DbError;

/// Fields a stage may reference. Before the first `$project`/`$group` the
/// input shape is unknown and references are resolved per document.
enum Shape {
    Open,
    Closed(HashSet<String>),
}

impl Shape {
    fn require(&self, stage: &str, field: &str) -> Result<(), DbError> {
        match self {
            Self::Closed(known) if !known.contains(field) => Err(DbError::validation(
                stage,
                format!("field {field} is not produced by an earlier stage"),
            )),
            _ => Ok(()),
        }
    }
}

fn unique_names<'a>(stage: &str, names: impl IntoIterator<Item = &'a str>) -> Result<HashSet<String>, DbError> {
    let mut seen = HashSet::new();
    for n in names {
        if n.is_empty() {
            return Err(DbError::validation(stage, "empty output field name"));
        }
        if n.starts_with('$') {
            return Err(DbError::validation(stage, format!("output field {n} may not start with $")));
        }
        if !seen.insert(n.to_string()) {
            return Err(DbError::validation(stage, format!("duplicate output field {n}")));
        }
    }
    Ok(seen)
}

fn check_expr(shape: &Shape, stage: &str, expr: &Expr) -> Result<(), DbError> {
    if expr.source().is_empty() {
        return Err(DbError::validation(stage, "empty field reference"));
    }
    shape.require(stage, expr.source())
}

fn check_stage(shape: &Shape, stage: &Stage) -> Result<Option<Shape>, DbError> {
    let name = stage.name();
    match stage {
        Stage::Project(spec) => {
            if spec.fields.is_empty() {
                return Err(DbError::validation(name, "no output fields"));
            }
            for (_, e) in &spec.fields {
                check_expr(shape, name, e)?;
            }
            let out = unique_names(name, spec.fields.iter().map(|(n, _)| n.as_str()))?;
            Ok(Some(Shape::Closed(out)))
        }
        Stage::Match(p) => {
            for f in p.fields() {
                shape.require(name, f)?;
            }
            Ok(None)
        }
        Stage::Group(g) => {
            let parts = g.key.parts();
            for (_, e) in &parts {
                check_expr(shape, name, e)?;
            }
            for (_, acc) in &g.accumulators {
                if let Some(src) = acc.source() {
                    if src.is_empty() {
                        return Err(DbError::validation(name, format!("{} has an empty field reference", acc.operator())));
                    }
                    shape.require(name, src)?;
                }
            }
            let names = parts.iter().map(|(n, _)| *n).chain(g.accumulators.iter().map(|(n, _)| n.as_str()));
            Ok(Some(Shape::Closed(unique_names(name, names)?)))
        }
        Stage::Sort(keys) => {
            if keys.is_empty() {
                return Err(DbError::validation(name, "no sort keys"));
            }
            if keys.len() > MAX_SORT_FIELDS {
                return Err(DbError::validation(name, format!("at most {MAX_SORT_FIELDS} sort keys")));
            }
            for k in keys {
                shape.require(name, &k.field)?;
            }
            Ok(None)
        }
        Stage::Limit(_) => Ok(None),
    }
}

/// Checks stage parameters and field references before any document is read.
///
/// # Errors
/// `Pipeline { stage, source: Validation }` for the first malformed stage.
pub(crate) fn validate(stages: &[Stage]) -> Result<(), DbError> {
    let mut shape = Shape::Open;
    for (i, stage) in stages.iter().enumerate() {
        if let Some(next) = check_stage(&shape, stage).map_err(|e| e.at_stage(i))? {
            shape = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{GroupSpec, ProjectSpec, SortKey};
    use crate::query::Predicate;

    fn stage_of(err: DbError) -> usize {
        match err {
            DbError::Pipeline { stage, source } => {
                assert!(matches!(*source, DbError::Validation { .. }));
                stage
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn open_shape_accepts_any_reference() {
        let stages = vec![Stage::Match(Predicate::new().gt("anything", 1)), Stage::Sort(vec![SortKey::asc("x")])];
        assert!(validate(&stages).is_ok());
    }

    #[test]
    fn references_after_group_are_checked() {
        let stages = vec![
            Stage::Group(GroupSpec::by_field("sourceIP").sum("totalRevenue", "adRevenue")),
            Stage::Sort(vec![SortKey::desc("totalRevenue")]),
            Stage::Project(ProjectSpec::new().include("adRevenue")),
        ];
        assert_eq!(stage_of(validate(&stages).unwrap_err()), 2);
    }

    #[test]
    fn malformed_parameters_name_their_stage() {
        let empty_project = vec![Stage::Limit(1), Stage::Project(ProjectSpec::new())];
        assert_eq!(stage_of(validate(&empty_project).unwrap_err()), 1);
        let dup = vec![Stage::Group(GroupSpec::by_field("a").sum("_id", "b"))];
        assert_eq!(stage_of(validate(&dup).unwrap_err()), 0);
        let many = vec![Stage::Sort((0..9).map(|i| SortKey::asc(&format!("f{i}"))).collect())];
        assert_eq!(stage_of(validate(&many).unwrap_err()), 0);
        let no_keys = vec![Stage::Sort(Vec::new())];
        assert_eq!(stage_of(validate(&no_keys).unwrap_err()), 0);
    }
}
