use indexmap::IndexMap;
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;

use super::accumulator::AccState;
use super::stage::{GroupSpec, Pipeline, ProjectSpec, SortKey, Stage};
use crate::collection::Collection;
use crate::document::{Document, Fields, Value};
use crate::errors::DbError;
use crate::index::IndexOrder;
use crate::query::{self, Mismatch, Predicate, evaluate};
use crate::utils::devlog::BenchRecord;

type Row = Result<Fields, DbError>;
type Stream<'a> = Box<dyn Iterator<Item = Row> + 'a>;

/// Per-run execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Checked between stages and before a stage materializes its input.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ExecOptions {
    #[must_use]
    pub const fn with_cancel(flag: Arc<AtomicBool>) -> Self {
        Self { cancel: Some(flag) }
    }

    fn check(&self, stage: usize) -> Result<(), DbError> {
        match &self.cancel {
            Some(flag) if flag.load(AtomicOrdering::Acquire) => Err(DbError::Cancelled { stage }),
            _ => Ok(()),
        }
    }
}

fn project(spec: &ProjectSpec, fields: &Fields) -> Result<Fields, Mismatch> {
    let mut out = Fields::with_capacity(spec.fields.len());
    for (name, expr) in &spec.fields {
        if let Some(v) = expr.eval(fields)? {
            out.insert(name.clone(), v);
        }
    }
    Ok(out)
}

fn group(source: &str, spec: &GroupSpec, input: Stream<'_>) -> Result<Vec<Fields>, DbError> {
    let parts = spec.key.parts();
    let mut groups: IndexMap<Vec<Option<Value>>, Vec<AccState>> = IndexMap::new();
    for row in input {
        let fields = row?;
        let key = parts
            .iter()
            .map(|(_, e)| e.eval(&fields))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|m| m.into_error(source))?;
        let states = groups
            .entry(key)
            .or_insert_with(|| spec.accumulators.iter().map(|(_, a)| AccState::new(a)).collect());
        for (state, (_, acc)) in states.iter_mut().zip(&spec.accumulators) {
            state.update(acc, &fields).map_err(|m| m.into_error(source))?;
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = Fields::with_capacity(key.len() + states.len());
            for ((name, _), v) in parts.iter().zip(key) {
                if let Some(v) = v {
                    out.insert(*name, v);
                }
            }
            for ((name, _), state) in spec.accumulators.iter().zip(states) {
                if let Some(v) = state.finish() {
                    out.insert(name.clone(), v);
                }
            }
            out
        })
        .collect())
}

/// Missing values order first; kinds order number < string < date.
fn compare(a: &Fields, b: &Fields, keys: &[SortKey]) -> Ordering {
    for k in keys {
        let ord = match (a.get(&k.field), b.get(&k.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return if k.order == IndexOrder::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn execute<'a>(
    source: &'a str,
    mut stream: Stream<'a>,
    stages: &'a [Stage],
    opts: &ExecOptions,
) -> Result<Vec<Fields>, DbError> {
    for (i, stage) in stages.iter().enumerate() {
        opts.check(i)?;
        stream = match stage {
            Stage::Project(spec) => Box::new(stream.map(move |row| {
                row.and_then(|f| project(spec, &f).map_err(|m| m.into_error(source).at_stage(i)))
            })),
            Stage::Match(p) => Box::new(stream.filter_map(move |row| match row {
                Ok(f) => match evaluate(&f, p) {
                    Ok(true) => Some(Ok(f)),
                    Ok(false) => None,
                    Err(m) => Some(Err(m.into_error(source).at_stage(i))),
                },
                Err(e) => Some(Err(e)),
            })),
            Stage::Group(spec) => {
                let rows = group(source, spec, stream).map_err(|e| e.at_stage(i))?;
                Box::new(rows.into_iter().map(Ok))
            }
            Stage::Sort(keys) => {
                let mut rows = stream.collect::<Result<Vec<_>, _>>()?;
                rows.sort_by(|a, b| compare(a, b, keys));
                Box::new(rows.into_iter().map(Ok))
            }
            Stage::Limit(n) => Box::new(stream.take(*n)),
        };
    }
    opts.check(stages.len())?;
    stream.collect()
}

/// Runs `pipeline` over arbitrary input documents. `source` names the input in errors.
///
/// # Errors
/// `Pipeline { stage, .. }` wrapping the first stage failure, or `Cancelled`.
pub fn run_on<'a, I>(
    source: &'a str,
    input: I,
    pipeline: &'a Pipeline,
    opts: &ExecOptions,
) -> Result<Vec<Fields>, DbError>
where
    I: IntoIterator<Item = Fields>,
    I::IntoIter: 'a,
{
    execute(source, Box::new(input.into_iter().map(Ok)), pipeline.stages(), opts)
}

/// Documents feeding the pipeline: a leading `$match` is answered from the
/// indexes when it can be, under the same read lock as the snapshot.
fn source_docs(col: &Collection, lead: Option<&Predicate>) -> Result<(Vec<Arc<Document>>, bool), DbError> {
    let st = col.read_state()?;
    if let Some(p) = lead
        && let Some(mut ids) = query::plan_candidates(col.name(), &st.indexes, p).map_err(|e| e.at_stage(0))?
    {
        ids.sort_unstable();
        ids.dedup();
        let docs = ids.into_iter().filter_map(|id| st.docs.get(id.slot()).cloned()).collect();
        return Ok((docs, true));
    }
    Ok((st.docs.iter().cloned().collect(), false))
}

/// Runs `pipeline` over a consistent snapshot of `col`.
///
/// # Errors
/// `Pipeline { stage, .. }` wrapping the first stage failure, `Cancelled`, or
/// `CollectionDropped`.
pub fn run(col: &Collection, pipeline: &Pipeline, opts: &ExecOptions) -> Result<Vec<Fields>, DbError> {
    let start = Instant::now();
    opts.check(0)?;
    let lead = match pipeline.stages().first() {
        Some(Stage::Match(p)) => Some(p),
        _ => None,
    };
    let (docs, used_index) = source_docs(col, lead)?;
    let stream: Stream<'_> = Box::new(docs.into_iter().map(|d| Ok(d.fields.clone())));
    let out = execute(col.name(), stream, pipeline.stages(), opts)?;
    BenchRecord {
        bench: "pipeline",
        op: "aggregate",
        collection: col.name(),
        duration_ms: start.elapsed().as_millis(),
        used_index,
        result_count: out.len(),
    }
    .emit();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Expr, GroupKey};

    fn visits() -> Vec<Fields> {
        vec![
            Fields::new().with("ip", "10.0.0.1").with("rev", 1.5).with("d", Value::date("1980-02-01").unwrap()),
            Fields::new().with("ip", "10.0.0.2").with("rev", 2.0).with("d", Value::date("1981-01-01").unwrap()),
            Fields::new().with("ip", "11.0.0.1").with("rev", 4.0).with("d", Value::date("1985-01-01").unwrap()),
            Fields::new().with("ip", "10.0.0.1").with("rev", 0.5).with("d", Value::date("1979-01-01").unwrap()),
        ]
    }

    #[test]
    fn groups_in_first_seen_order() {
        let p = Pipeline::builder()
            .project(ProjectSpec::new().include("rev").substr("g", "ip", 0, 2))
            .group(GroupSpec::new(GroupKey::Single(Expr::field("g"))).sum("total", "rev").count("n"))
            .build()
            .unwrap();
        let out = run_on("v", visits(), &p, &ExecOptions::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("_id"), Some(&Value::from("10")));
        assert_eq!(out[0].get("total"), Some(&Value::from(4.0)));
        assert_eq!(out[0].get("n"), Some(&Value::from(3)));
        assert_eq!(out[1].get("total"), Some(&Value::from(4.0)));
    }

    #[test]
    fn sort_is_stable_and_limit_truncates() {
        let p = Pipeline::builder().sort(vec![SortKey::desc("rev")]).limit(3).build().unwrap();
        let mut input = visits();
        input.push(Fields::new().with("ip", "tie").with("rev", 2.0));
        let out = run_on("v", input, &p, &ExecOptions::default()).unwrap();
        let ips: Vec<_> = out.iter().map(|f| f.get("ip").unwrap().to_string()).collect();
        assert_eq!(ips, vec!["11.0.0.1", "10.0.0.2", "tie"]);
        let none = Pipeline::builder().limit(0).build().unwrap();
        assert!(run_on("v", visits(), &none, &ExecOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn missing_sort_values_come_first() {
        let p = Pipeline::builder().sort(vec![SortKey::asc("rev")]).build().unwrap();
        let mut input = visits();
        input.push(Fields::new().with("ip", "norev"));
        let out = run_on("v", input, &p, &ExecOptions::default()).unwrap();
        assert_eq!(out[0].get("ip"), Some(&Value::from("norev")));
    }

    #[test]
    fn stage_errors_carry_their_index() {
        let p = Pipeline::builder()
            .filter(Predicate::new().gt("d", Value::date("1980-01-01").unwrap()))
            .group(GroupSpec::by_field("ip").sum("t", "ip"))
            .build()
            .unwrap();
        let err = run_on("v", visits(), &p, &ExecOptions::default()).unwrap_err();
        assert!(matches!(err, DbError::Pipeline { stage: 1, .. }));
        assert!(matches!(err.root(), DbError::Evaluation { field, .. } if field == "ip"));
    }

    #[test]
    fn cancellation_stops_at_a_stage_boundary() {
        let flag = Arc::new(AtomicBool::new(true));
        let p = Pipeline::builder().limit(1).build().unwrap();
        let err = run_on("v", visits(), &p, &ExecOptions::with_cancel(flag)).unwrap_err();
        assert!(matches!(err, DbError::Cancelled { stage: 0 }));
    }

    #[test]
    fn leading_match_uses_the_index() {
        let col = Collection::new("v");
        col.insert_many(visits()).unwrap();
        col.ensure_index("d", IndexOrder::Asc).unwrap();
        let p = Pipeline::builder()
            .filter(
                Predicate::new()
                    .gt("d", Value::date("1980-01-01").unwrap())
                    .lt("d", Value::date("1983-04-01").unwrap()),
            )
            .group(GroupSpec::by_field("ip").sum("totalRevenue", "rev").first("visitDate", "d"))
            .sort(vec![SortKey::desc("totalRevenue")])
            .limit(1)
            .build()
            .unwrap();
        let _g = crate::utils::devlog::enable_thread_sink();
        let out = run(&col, &p, &ExecOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("_id"), Some(&Value::from("10.0.0.2")));
        assert!(crate::utils::devlog::drain().iter().any(|l| l.contains(r#""used_index":true"#)));
    }
}
