use bson::{Bson, Document as BsonDocument};

use super::types::{CmpOp, MAX_IN_SET, Operand, Predicate};
use crate::document::Value;
use crate::errors::DbError;

/// Converts parsed JSON into bson. Integers stay integers, other numbers become doubles.
pub(crate) fn json_to_bson(v: serde_json::Value) -> Bson {
    use serde_json::Value as J;
    match v {
        J::Null => Bson::Null,
        J::Bool(b) => Bson::Boolean(b),
        J::Number(n) => n.as_i64().map_or_else(|| Bson::Double(n.as_f64().unwrap_or(f64::NAN)), Bson::Int64),
        J::String(s) => Bson::String(s),
        J::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        J::Object(map) => {
            let mut doc = BsonDocument::new();
            for (k, v) in map {
                doc.insert(k, json_to_bson(v));
            }
            Bson::Document(doc)
        }
    }
}

/// Parses a JSON object into a bson document.
///
/// # Errors
/// `Json` on malformed text, `Validation` if the top level is not an object.
pub(crate) fn json_object(json: &str, context: &str) -> Result<BsonDocument, DbError> {
    match json_to_bson(serde_json::from_str(json)?) {
        Bson::Document(d) => Ok(d),
        other => Err(DbError::validation(context, format!("expected a JSON object, got {other}"))),
    }
}

fn literal(field: &str, op: &str, v: &Bson) -> Result<Value, DbError> {
    Value::try_from(v).map_err(|e| match e {
        DbError::Validation { message, .. } => DbError::validation(format!("predicate {field}.{op}"), message),
        other => other,
    })
}

impl Predicate {
    /// Parses the MongoDB filter shape: `{field: literal}` for equality or
    /// `{field: {$op: operand, ...}}` with `$eq $ne $gt $gte $lt $lte $in`.
    ///
    /// # Errors
    /// `Validation` for unknown operators, empty operator objects, non-scalar
    /// operands, `$in` without an array, or top-level `$` keys.
    pub fn from_bson(doc: &BsonDocument) -> Result<Self, DbError> {
        let mut out = Self::new();
        for (field, v) in doc {
            if field.is_empty() {
                return Err(DbError::validation("predicate", "empty field name"));
            }
            if field.starts_with('$') {
                return Err(DbError::validation("predicate", format!("top-level operator {field} is not supported")));
            }
            let Bson::Document(ops) = v else {
                out.push(field, CmpOp::Eq, Operand::Scalar(literal(field, "$eq", v)?));
                continue;
            };
            if ops.is_empty() {
                return Err(DbError::validation(format!("predicate {field}"), "empty operator object"));
            }
            for (op_name, operand) in ops {
                let Some(op) = CmpOp::from_operator(op_name) else {
                    let msg = if op_name.starts_with('$') {
                        format!("unknown operator {op_name}")
                    } else {
                        "nested documents are not supported".to_string()
                    };
                    return Err(DbError::validation(format!("predicate {field}"), msg));
                };
                let operand = match (op, operand) {
                    (CmpOp::In, Bson::Array(items)) => {
                        if items.len() > MAX_IN_SET {
                            return Err(DbError::validation(
                                format!("predicate {field}.$in"),
                                format!("at most {MAX_IN_SET} values"),
                            ));
                        }
                        Operand::Set(items.iter().map(|i| literal(field, "$in", i)).collect::<Result<_, _>>()?)
                    }
                    (CmpOp::In, other) => {
                        return Err(DbError::validation(
                            format!("predicate {field}.$in"),
                            format!("expected an array, got {other}"),
                        ));
                    }
                    (_, v) => Operand::Scalar(literal(field, op_name, v)?),
                };
                out.push(field, op, operand);
            }
        }
        Ok(out)
    }
}

/// # Errors
/// Returns an error if the JSON is malformed or does not describe a valid predicate.
pub fn parse_predicate_json(json: &str) -> Result<Predicate, DbError> {
    Predicate::from_bson(&json_object(json, "predicate")?)
}
