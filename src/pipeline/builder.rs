use super::stage::{GroupSpec, Pipeline, ProjectSpec, SortKey, Stage};
use super::validate::validate;
use crate::errors::DbError;
use crate::query::Predicate;

/// Assembles a fresh [`Pipeline`] stage by stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Validates an explicit stage list.
    ///
    /// # Errors
    /// `Pipeline { stage, .. }` naming the first malformed stage.
    pub fn from_stages(stages: Vec<Stage>) -> Result<Self, DbError> {
        validate(&stages)?;
        Ok(Self { stages })
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn project(self, spec: ProjectSpec) -> Self {
        self.stage(Stage::Project(spec))
    }

    /// A `$match` stage.
    #[must_use]
    pub fn filter(self, predicate: Predicate) -> Self {
        self.stage(Stage::Match(predicate))
    }

    #[must_use]
    pub fn group(self, spec: GroupSpec) -> Self {
        self.stage(Stage::Group(spec))
    }

    #[must_use]
    pub fn sort(self, keys: Vec<SortKey>) -> Self {
        self.stage(Stage::Sort(keys))
    }

    #[must_use]
    pub fn limit(self, n: usize) -> Self {
        self.stage(Stage::Limit(n))
    }

    /// # Errors
    /// `Pipeline { stage, .. }` naming the first malformed stage.
    pub fn build(self) -> Result<Pipeline, DbError> {
        Pipeline::from_stages(self.stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Expr, GroupKey};

    #[test]
    fn builds_the_aggregation_query() {
        let p = Pipeline::builder()
            .project(ProjectSpec::new().include("adRevenue").substr("sourceIP_group", "sourceIP", 0, 7))
            .group(GroupSpec::new(GroupKey::Single(Expr::field("sourceIP_group"))).sum("totalRevenue", "adRevenue"))
            .project(ProjectSpec::new().include("totalRevenue").rename("sourceIP_group", "_id"))
            .limit(5)
            .build()
            .unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.stages()[3], Stage::Limit(5));
    }

    #[test]
    fn invalid_stage_fails_the_build() {
        let err = Pipeline::builder().limit(1).sort(Vec::new()).build().unwrap_err();
        assert!(matches!(err, DbError::Pipeline { stage: 1, .. }));
    }
}
