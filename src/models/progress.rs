use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable reading progress for one `(user, story)` pair. Exactly one record
/// exists per pair; every write is an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: String,
    pub story_id: String,
    pub words_read: u64,
    /// Lifetime accuracy for this story, in [0, 1].
    pub accuracy: f64,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Last-write-wins comparison key.
    pub fn is_newer_than(&self, other: &ProgressRecord) -> bool {
        self.updated_at > other.updated_at
    }
}
