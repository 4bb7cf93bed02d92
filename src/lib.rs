//! Interactive reading-session core for a children's reading tutor.
//!
//! The embedding application supplies the story backend, the speech
//! recognizer, the remote progress sink, and the text-to-speech helper
//! through the traits in [`collaborators`]. This crate owns everything in
//! between: chunking, fuzzy matching, accuracy accounting, bounded failure
//! recovery, and local-first progress persistence, all driven by the
//! [`session::SessionController`] state machine.

pub mod accuracy;
pub mod chunker;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod matching;
pub mod models;
pub mod progress;
pub mod retry;
pub mod session;

pub use chunker::{Chunk, TextChunker};
pub use collaborators::{
    RemoteProgressSink, SpeechEvent, StoryFetcher, TextToSpeech, VoiceEngine, VoiceEvent,
};
pub use config::SessionConfig;
pub use db::CacheDb;
pub use matching::{match_chunk, MatchConfig, MatchResult, WordVerdict};
pub use models::{ProgressRecord, Story};
pub use progress::ProgressStore;
pub use retry::{FailedOperation, RetryDecision, RetryPolicy};
pub use session::{Feedback, SessionController, SessionDeps, SessionPhase, SessionSnapshot};
