//! Interfaces to the subsystems this crate consumes but does not own:
//! story content, the speech recognizer, the remote progress backend, and
//! the pronunciation helper.
//!
//! Everything arrives by injection. The session controller never touches a
//! global engine handle, which keeps every piece mockable in tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::{ProgressRecord, Story};

/// One recognizer result. Produced by the voice engine, consumed exactly
/// once by the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvent {
    pub recognized_text: String,
    pub timestamp: DateTime<Utc>,
}

/// What the voice engine can deliver during a recording window.
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    Speech(SpeechEvent),
    /// Engine-level failure (mapped to the `voice` operation class).
    Error(String),
}

/// Fetches a story's full text by id.
#[async_trait]
pub trait StoryFetcher: Send + Sync {
    async fn fetch_story(&self, story_id: &str) -> Result<Story>;
}

/// The speech-recognition engine. A process-wide exclusive resource: the
/// controller always stops it before anything else may start it.
///
/// `start` returns the event stream for this recording window; dropping the
/// receiver (or the controller cancelling its pump) is the unsubscribe.
#[async_trait]
pub trait VoiceEngine: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn start(&self, locale: &str) -> Result<mpsc::Receiver<VoiceEvent>>;
    async fn stop(&self) -> Result<()>;
}

/// Remote progress backend (document store keyed on user + story).
/// Upserts are last-write-wins on `updated_at`; the sink is expected to keep
/// the newer of its row and the incoming one.
#[async_trait]
pub trait RemoteProgressSink: Send + Sync {
    async fn get(&self, user_id: &str, story_id: &str) -> Result<Option<ProgressRecord>>;
    async fn upsert(&self, record: &ProgressRecord) -> Result<()>;
}

/// Pronunciation helper. Fire-and-forget; failures are only logged.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn speak(&self, word: &str) -> Result<()>;
}
