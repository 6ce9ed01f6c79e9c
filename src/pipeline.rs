mod accumulator;
mod builder;
mod exec;
mod parse;
mod stage;
mod validate;

pub use builder::PipelineBuilder;
pub use exec::{ExecOptions, run, run_on};
pub use parse::parse_pipeline_json;
pub use stage::{
    Accumulator, Expr, GroupKey, GroupSpec, MAX_SORT_FIELDS, Pipeline, ProjectSpec, SortKey, Stage,
    SumOperand,
};
