mod eval;
mod exec;
mod parse;
mod plan;
mod types;

pub use eval::{Mismatch, evaluate};
pub use exec::{count_docs, find_docs, find_one};
pub use parse::parse_predicate_json;
pub(crate) use parse::{json_object, json_to_bson};
pub(crate) use plan::candidates as plan_candidates;
pub use types::{Clause, CmpOp, Comparator, Operand, Predicate};
