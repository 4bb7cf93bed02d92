use std::time::Duration;

use crate::matching::MatchConfig;

/// Tunable knobs for a reading session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Words shown to the reader at once.
    pub chunk_size: usize,

    /// Minimum chunk accuracy required to advance to the next chunk.
    pub pass_threshold: f64,

    /// Per-word similarity settings for the speech matcher.
    pub matching: MatchConfig,

    /// Shared recovery budget across voice and story-fetch failures.
    pub max_attempts: u32,

    /// How long to wait for a speech result before giving the reader a
    /// "didn't hear you" nudge and returning to Ready.
    pub speech_wait: Duration,

    /// Locale handed to the voice engine on start.
    pub locale: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            pass_threshold: 0.8,
            matching: MatchConfig::default(),
            max_attempts: 3,
            speech_wait: Duration::from_secs(30),
            locale: "en-US".into(),
        }
    }
}
