use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accuracy::RunningAccuracy;
use crate::retry::RetryPolicy;

/// Where a reading session is in its lifecycle. `Completed` and `Failed` are
/// terminal; a new session instance is the only way back out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Loading,
    Ready,
    Recording,
    Evaluating,
    Completed,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Failed)
    }
}

/// Non-fatal feedback for the reader after a recording window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Feedback {
    /// Chunk accuracy fell below the pass threshold; same chunk again.
    TryAgain,
    /// No speech arrived within the bounded wait.
    DidntHear,
}

/// Mutable session state. Owned exclusively by the controller; everything
/// outside sees it through [`SessionSnapshot`].
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub phase: SessionPhase,
    pub current_chunk_index: usize,
    /// Cumulative words credited this story; never decremented.
    pub words_read: u64,
    pub accuracy: RunningAccuracy,
    pub retry: RetryPolicy,
    pub feedback: Option<Feedback>,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            phase: SessionPhase::Idle,
            current_chunk_index: 0,
            words_read: 0,
            accuracy: RunningAccuracy::default(),
            retry: RetryPolicy::new(max_attempts),
            feedback: None,
            last_error: None,
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = SessionPhase::Failed;
        self.last_error = Some(message.into());
    }
}

/// Serializable view of the session for the UI/navigation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub story_id: String,
    pub story_title: Option<String>,
    pub phase: SessionPhase,
    pub current_chunk_index: usize,
    pub total_chunks: usize,
    /// Words of the chunk currently shown; empty before a story is loaded.
    /// A completed session keeps the final chunk for the results view.
    pub chunk_words: Vec<String>,
    pub words_read: u64,
    pub running_accuracy: f64,
    pub retry_attempts: u32,
    pub feedback: Option<Feedback>,
    pub last_error: Option<String>,
}
