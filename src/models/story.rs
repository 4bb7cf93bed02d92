use serde::{Deserialize, Serialize};

/// A story as fetched from the content backend. Immutable for the lifetime
/// of the reading session that loaded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub full_text: String,
}
