use serde::{Deserialize, Serialize};
use std::fmt;

pub type CollectionName = String;

/// Synthetic document id, assigned per collection in insertion order starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl DocumentId {
    pub(crate) const fn first() -> Self {
        Self(1)
    }

    /// Position of the document in its collection's insertion order.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0.saturating_sub(1) as usize
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
