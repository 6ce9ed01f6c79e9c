use super::stage::{Accumulator, SumOperand};
use crate::document::{Fields, Number, Value};
use crate::query::Mismatch;

/// Running state of one accumulator within one group.
#[derive(Debug, Clone)]
pub(crate) enum AccState {
    Sum(Number),
    Avg { sum: Number, count: u64 },
    First(Option<Option<Value>>),
}

fn numeric(op: &str, field: &str, v: &Value) -> Result<Number, Mismatch> {
    v.as_number().ok_or_else(|| Mismatch {
        field: field.to_string(),
        message: format!("{op} needs numbers, found a {}", v.kind()),
    })
}

impl AccState {
    pub(crate) const fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum(Number::Int(0)),
            Accumulator::Avg(_) => Self::Avg { sum: Number::Int(0), count: 0 },
            Accumulator::First(_) => Self::First(None),
        }
    }

    /// Folds one document in. Missing values do not qualify.
    pub(crate) fn update(&mut self, acc: &Accumulator, fields: &Fields) -> Result<(), Mismatch> {
        match (self, acc) {
            (Self::Sum(total), Accumulator::Sum(SumOperand::Constant(c))) => *total = total.plus(*c),
            (Self::Sum(total), Accumulator::Sum(SumOperand::Field(f))) => {
                if let Some(v) = fields.get(f) {
                    *total = total.plus(numeric("$sum", f, v)?);
                }
            }
            (Self::Avg { sum, count }, Accumulator::Avg(f)) => {
                if let Some(v) = fields.get(f) {
                    *sum = sum.plus(numeric("$avg", f, v)?);
                    *count += 1;
                }
            }
            (Self::First(slot @ None), Accumulator::First(f)) => *slot = Some(fields.get(f).cloned()),
            _ => {}
        }
        Ok(())
    }

    /// Final value; `None` means the output field is omitted.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn finish(self) -> Option<Value> {
        match self {
            Self::Sum(total) => Some(Value::Number(total)),
            Self::Avg { count: 0, .. } => None,
            Self::Avg { sum, count } => Some(Value::from(sum.as_f64() / count as f64)),
            Self::First(v) => v.flatten(),
        }
    }
}
