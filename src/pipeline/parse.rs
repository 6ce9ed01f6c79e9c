use bson::{Bson, Document as BsonDocument};

use super::stage::{Accumulator, Expr, GroupKey, GroupSpec, Pipeline, ProjectSpec, SortKey, Stage, SumOperand};
use crate::document::Number;
use crate::errors::DbError;
use crate::index::IndexOrder;
use crate::query::{Predicate, json_to_bson};

fn integer(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
        _ => None,
    }
}

fn non_negative(ctx: &str, what: &str, v: &Bson) -> Result<usize, DbError> {
    integer(v)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| DbError::validation(ctx, format!("{what} must be a non-negative integer, got {v}")))
}

fn field_ref<'a>(ctx: &str, v: &'a Bson) -> Result<&'a str, DbError> {
    match v {
        Bson::String(s) if s.len() > 1 && s.starts_with('$') => Ok(&s[1..]),
        other => Err(DbError::validation(ctx, format!("expected a \"$field\" reference, got {other}"))),
    }
}

/// `"$field"` or `{$substr: ["$field", start, len]}`.
fn expr(ctx: &str, v: &Bson) -> Result<Expr, DbError> {
    match v {
        Bson::String(_) => Ok(Expr::field(field_ref(ctx, v)?)),
        Bson::Document(d) => {
            let args = match (d.len(), d.get("$substr")) {
                (1, Some(Bson::Array(args))) if args.len() == 3 => args,
                _ => {
                    return Err(DbError::validation(ctx, format!("unsupported expression {d}; expected $substr")));
                }
            };
            let field = field_ref(ctx, &args[0])?;
            let start = non_negative(ctx, "$substr start", &args[1])?;
            let len = non_negative(ctx, "$substr length", &args[2])?;
            Ok(Expr::substr(field, start, len))
        }
        other => Err(DbError::validation(ctx, format!("unsupported expression {other}"))),
    }
}

fn stage_body<'a>(name: &str, v: &'a Bson) -> Result<&'a BsonDocument, DbError> {
    match v {
        Bson::Document(d) if !d.is_empty() => Ok(d),
        Bson::Document(_) => Err(DbError::validation(name, "empty stage specification")),
        other => Err(DbError::validation(name, format!("expected a document, got {other}"))),
    }
}

fn parse_project(body: &BsonDocument) -> Result<ProjectSpec, DbError> {
    let ctx = "$project";
    let mut spec = ProjectSpec::new();
    for (name, v) in body {
        let flag = match v {
            Bson::Boolean(b) => Some(*b),
            v => integer(v).map(|i| i != 0),
        };
        match (name.as_str(), flag) {
            ("_id", Some(false)) => {}
            ("_id", _) => return Err(DbError::validation(ctx, "_id can only be excluded")),
            (_, Some(true)) => spec = spec.include(name),
            (_, Some(false)) => {
                return Err(DbError::validation(ctx, format!("cannot exclude {name}; only _id may be excluded")));
            }
            (_, None) => spec = spec.derive(name, expr(&format!("{ctx}.{name}"), v)?),
        }
    }
    if spec.fields.is_empty() {
        return Err(DbError::validation(ctx, "no output fields"));
    }
    Ok(spec)
}

fn parse_accumulator(name: &str, v: &Bson) -> Result<Accumulator, DbError> {
    let ctx = format!("$group.{name}");
    let Bson::Document(d) = v else {
        return Err(DbError::validation(ctx, format!("expected an accumulator document, got {v}")));
    };
    let mut entries = d.iter();
    let (Some((op, arg)), None) = (entries.next(), entries.next()) else {
        return Err(DbError::validation(ctx, "expected exactly one accumulator operator"));
    };
    match op.as_str() {
        "$sum" => match arg {
            Bson::Int32(i) => Ok(Accumulator::Sum(SumOperand::Constant(Number::Int(i64::from(*i))))),
            Bson::Int64(i) => Ok(Accumulator::Sum(SumOperand::Constant(Number::Int(*i)))),
            Bson::Double(f) => Ok(Accumulator::Sum(SumOperand::Constant(Number::Float(*f)))),
            _ => Ok(Accumulator::Sum(SumOperand::Field(field_ref(&ctx, arg)?.to_string()))),
        },
        "$avg" => Ok(Accumulator::Avg(field_ref(&ctx, arg)?.to_string())),
        "$first" => Ok(Accumulator::First(field_ref(&ctx, arg)?.to_string())),
        other => Err(DbError::validation(ctx, format!("unsupported accumulator {other}"))),
    }
}

fn parse_group(body: &BsonDocument) -> Result<GroupSpec, DbError> {
    let ctx = "$group._id";
    let key = match body.get("_id") {
        None => return Err(DbError::validation("$group", "missing _id")),
        Some(Bson::Null) => GroupKey::Null,
        Some(Bson::Document(d)) if d.keys().next().is_some_and(|k| !k.starts_with('$')) => {
            let mut parts = Vec::with_capacity(d.len());
            for (n, v) in d {
                parts.push((n.clone(), expr(&format!("{ctx}.{n}"), v)?));
            }
            GroupKey::Compound(parts)
        }
        Some(v) => GroupKey::Single(expr(ctx, v)?),
    };
    let mut spec = GroupSpec::new(key);
    for (name, v) in body.iter().filter(|(k, _)| k.as_str() != "_id") {
        spec = spec.accumulate(name, parse_accumulator(name, v)?);
    }
    Ok(spec)
}

fn parse_sort(body: &BsonDocument) -> Result<Vec<SortKey>, DbError> {
    body.iter()
        .map(|(field, v)| {
            let order = integer(v).and_then(IndexOrder::from_direction).ok_or_else(|| {
                DbError::validation("$sort", format!("direction of {field} must be 1 or -1, got {v}"))
            })?;
            Ok(SortKey { field: field.clone(), order })
        })
        .collect()
}

fn parse_stage(doc: &BsonDocument) -> Result<Stage, DbError> {
    let mut entries = doc.iter();
    let (Some((name, v)), None) = (entries.next(), entries.next()) else {
        return Err(DbError::validation("stage", "a stage document must have exactly one key"));
    };
    match name.as_str() {
        "$project" => Ok(Stage::Project(parse_project(stage_body(name, v)?)?)),
        "$match" => match v {
            Bson::Document(d) => Ok(Stage::Match(Predicate::from_bson(d)?)),
            other => Err(DbError::validation(name, format!("expected a document, got {other}"))),
        },
        "$group" => Ok(Stage::Group(parse_group(stage_body(name, v)?)?)),
        "$sort" => Ok(Stage::Sort(parse_sort(stage_body(name, v)?)?)),
        "$limit" => Ok(Stage::Limit(non_negative(name, "$limit", v)?)),
        other => Err(DbError::validation("stage", format!("unsupported stage {other}"))),
    }
}

impl Pipeline {
    /// Parses and validates a MongoDB-style stage list.
    ///
    /// # Errors
    /// `Pipeline { stage, source: Validation }` for the first malformed stage.
    pub fn from_bson(stages: &[BsonDocument]) -> Result<Self, DbError> {
        let parsed = stages
            .iter()
            .enumerate()
            .map(|(i, d)| parse_stage(d).map_err(|e| e.at_stage(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_stages(parsed)
    }
}

/// Parses a JSON array of stage objects.
///
/// # Errors
/// `Json` for malformed text, otherwise as [`Pipeline::from_bson`].
pub fn parse_pipeline_json(json: &str) -> Result<Pipeline, DbError> {
    let Bson::Array(items) = json_to_bson(serde_json::from_str(json)?) else {
        return Err(DbError::validation("pipeline", "expected a JSON array of stages"));
    };
    let docs = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Bson::Document(d) => Ok(d),
            other => Err(DbError::validation("stage", format!("expected a document, got {other}")).at_stage(i)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Pipeline::from_bson(&docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn stage_of(err: &DbError) -> usize {
        match err {
            DbError::Pipeline { stage, .. } => *stage,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_the_join_query() {
        let p = Pipeline::from_bson(&[
            doc! {"$match": {"visitDate": {"$gt": "1980-01-01", "$lt": "1983-04-01"}}},
            doc! {"$group": {
                "_id": "$sourceIP",
                "totalRevenue": {"$sum": "$adRevenue"},
                "avgPageRank": {"$avg": "$pageRank"},
                "visitDate": {"$first": "$visitDate"}
            }},
            doc! {"$sort": {"totalRevenue": -1}},
            doc! {"$limit": 1},
        ])
        .unwrap();
        let expected = Pipeline::builder()
            .filter(Predicate::from_bson(&doc! {"visitDate": {"$gt": "1980-01-01", "$lt": "1983-04-01"}}).unwrap())
            .group(
                GroupSpec::by_field("sourceIP")
                    .sum("totalRevenue", "adRevenue")
                    .avg("avgPageRank", "pageRank")
                    .first("visitDate", "visitDate"),
            )
            .sort(vec![SortKey::desc("totalRevenue")])
            .limit(1)
            .build()
            .unwrap();
        assert_eq!(p, expected);
    }

    #[test]
    fn parses_project_substr_and_json() {
        let p = parse_pipeline_json(
            r#"[{"$project": {"_id": 0, "adRevenue": 1, "sourceIP_group": {"$substr": ["$sourceIP", 0, 7]}}},
                {"$group": {"_id": "$sourceIP_group", "totalRevenue": {"$sum": "$adRevenue"}, "n": {"$sum": 1}}},
                {"$project": {"sourceIP_group": "$_id", "totalRevenue": 1}},
                {"$limit": 5}]"#,
        )
        .unwrap();
        assert_eq!(
            p.stages()[0],
            Stage::Project(ProjectSpec::new().include("adRevenue").substr("sourceIP_group", "sourceIP", 0, 7))
        );
        let Stage::Group(g) = &p.stages()[1] else { panic!("expected $group") };
        assert_eq!(g.accumulators[1].1, Accumulator::Sum(SumOperand::Constant(Number::Int(1))));
    }

    #[test]
    fn compound_and_null_group_keys() {
        let p = Pipeline::from_bson(&[doc! {"$group": {"_id": {"ip": "$sourceIP", "c": "$countryCode"}, "n": {"$sum": 1}}}])
            .unwrap();
        let Stage::Group(g) = &p.stages()[0] else { panic!("expected $group") };
        assert!(matches!(&g.key, GroupKey::Compound(parts) if parts.len() == 2));
        let p = Pipeline::from_bson(&[doc! {"$group": {"_id": null, "n": {"$sum": 1}}}]).unwrap();
        let Stage::Group(g) = &p.stages()[0] else { panic!("expected $group") };
        assert_eq!(g.key, GroupKey::Null);
    }

    #[test]
    fn malformed_stages_name_their_index() {
        let cases: Vec<(Vec<BsonDocument>, usize)> = vec![
            (vec![doc! {"$limit": 1}, doc! {"$limit": -1}], 1),
            (vec![doc! {"$unwind": "$x"}], 0),
            (vec![doc! {"$limit": 1, "$sort": {"a": 1}}], 0),
            (vec![doc! {"$project": {"a": 0}}], 0),
            (vec![doc! {"$project": {}}], 0),
            (vec![doc! {"$group": {"n": {"$sum": 1}}}], 0),
            (vec![doc! {"$group": {"_id": "$a", "m": {"$max": "$b"}}}], 0),
            (vec![doc! {"$match": {}}, doc! {"$sort": {"a": 2}}], 1),
            (vec![doc! {"$project": {"s": {"$substr": ["$a", -1, 2]}}}], 0),
            (vec![doc! {"$group": {"_id": "$a", "t": {"$sum": "$b"}}}, doc! {"$sort": {"b": 1}}], 1),
        ];
        for (stages, at) in cases {
            let err = Pipeline::from_bson(&stages).unwrap_err();
            assert_eq!(stage_of(&err), at, "{err}");
            assert!(matches!(err.root(), DbError::Validation { .. }), "{err}");
        }
        assert!(matches!(parse_pipeline_json("{}"), Err(DbError::Validation { .. })));
    }
}
