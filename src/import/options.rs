use serde::Serialize;

use crate::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Documents per `insert_many` call.
    pub batch_size: usize,
    /// Replace a non-empty target instead of skipping it.
    pub drop_existing: bool,
    /// Count malformed rows as skipped instead of aborting.
    pub skip_errors: bool,
    /// Log progress every N rows; 0 disables it.
    pub progress_every: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ImportOptions {
    #[must_use]
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            batch_size: cfg.import_batch_size.max(1),
            drop_existing: false,
            skip_errors: false,
            progress_every: cfg.progress_every,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub collection: String,
    pub inserted: u64,
    pub skipped: u64,
    /// The target already held documents and `drop_existing` was off.
    pub collection_skipped: bool,
}
