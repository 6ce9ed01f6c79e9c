use crate::types::DocumentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error in {context}: {message}")]
    Validation { context: String, message: String },

    #[error("Evaluation error in collection {collection}, field {field}: {message}")]
    Evaluation { collection: String, field: String, message: String },

    #[error("Missing join key for document {document} of collection {collection}: {detail}")]
    MissingJoinKey { collection: String, document: DocumentId, detail: String },

    #[error("Pipeline stage {stage} failed: {source}")]
    Pipeline {
        stage: usize,
        #[source]
        source: Box<DbError>,
    },

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Collection was dropped: {0}")]
    CollectionDropped(String),

    #[error("Index on {collection}.{field} is stale; its collection was dropped or replaced")]
    StaleIndex { collection: String, field: String },

    #[error("Pipeline cancelled before stage {stage}")]
    Cancelled { stage: usize },

    #[error("Check failed: {0}")]
    CheckFailed(String),
}

impl DbError {
    pub(crate) fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { context: context.into(), message: message.into() }
    }

    /// Wraps a stage-level failure with the index of the stage that raised it.
    /// Errors that already carry a stage index are passed through untouched.
    pub(crate) fn at_stage(self, stage: usize) -> Self {
        match self {
            e @ (Self::Pipeline { .. } | Self::Cancelled { .. }) => e,
            other => Self::Pipeline { stage, source: Box::new(other) },
        }
    }

    /// The innermost error, looking through pipeline wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }
}
