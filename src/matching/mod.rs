//! Fuzzy matching of a recognized utterance against an expected chunk.
//!
//! Alignment is strictly positional: spoken word i is compared with expected
//! word i. No insertion or reordering handling; a skipped word costs that
//! position and shifts everything after it.

mod config;
mod similarity;

pub use config::MatchConfig;
pub use similarity::word_similarity;

use serde::Serialize;

use crate::chunker::Chunk;

/// Verdict for one expected word.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordVerdict {
    pub expected: String,
    /// What was heard at this position, if anything.
    pub spoken: Option<String>,
    pub similarity: f64,
    pub is_match: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub word_verdicts: Vec<WordVerdict>,
    /// Matched words over expected words, in [0, 1].
    pub chunk_accuracy: f64,
}

/// Scores `recognized_text` against the chunk's expected words. Pure; safe to
/// call without any speech hardware behind it.
pub fn match_chunk(chunk: &Chunk, recognized_text: &str, config: &MatchConfig) -> MatchResult {
    let spoken: Vec<&str> = recognized_text.split_whitespace().collect();

    let mut verdicts = Vec::with_capacity(chunk.words.len());
    let mut matches = 0usize;

    for (i, expected) in chunk.words.iter().enumerate() {
        let (spoken_word, similarity) = match spoken.get(i) {
            Some(word) => (Some(word.to_string()), word_similarity(expected, word)),
            // Trailing expected words the reader never reached.
            None => (None, 0.0),
        };

        let is_match = similarity >= config.word_threshold;
        if is_match {
            matches += 1;
        }

        verdicts.push(WordVerdict {
            expected: expected.clone(),
            spoken: spoken_word,
            similarity,
            is_match,
        });
    }

    let chunk_accuracy = if chunk.words.is_empty() {
        0.0
    } else {
        matches as f64 / chunk.words.len() as f64
    };

    MatchResult {
        word_verdicts: verdicts,
        chunk_accuracy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(words: &str) -> Chunk {
        Chunk {
            index: 0,
            words: words.split_whitespace().map(str::to_string).collect(),
            is_last: false,
        }
    }

    #[test]
    fn perfect_reading_scores_one() {
        let result = match_chunk(
            &chunk("the quick brown fox"),
            "the quick brown fox",
            &MatchConfig::default(),
        );

        assert_eq!(result.chunk_accuracy, 1.0);
        assert!(result.word_verdicts.iter().all(|v| v.is_match));
    }

    #[test]
    fn one_substituted_word_scores_three_quarters() {
        let result = match_chunk(
            &chunk("the quick brown fox"),
            "the slow brown fox",
            &MatchConfig::default(),
        );

        assert_eq!(result.chunk_accuracy, 0.75);
        assert!(!result.word_verdicts[1].is_match);
        assert!(result.chunk_accuracy < 0.8);
    }

    #[test]
    fn empty_utterance_scores_zero() {
        let result = match_chunk(&chunk("the quick brown fox"), "", &MatchConfig::default());

        assert_eq!(result.chunk_accuracy, 0.0);
        assert!(result
            .word_verdicts
            .iter()
            .all(|v| v.spoken.is_none() && v.similarity == 0.0));
    }

    #[test]
    fn short_utterance_counts_missing_tail_as_misses() {
        let result = match_chunk(
            &chunk("the quick brown fox"),
            "the quick",
            &MatchConfig::default(),
        );

        assert_eq!(result.chunk_accuracy, 0.5);
        assert_eq!(result.word_verdicts[2].similarity, 0.0);
        assert!(result.word_verdicts[3].spoken.is_none());
    }

    #[test]
    fn extra_spoken_words_are_ignored() {
        let result = match_chunk(
            &chunk("the quick"),
            "the quick brown fox jumps",
            &MatchConfig::default(),
        );

        assert_eq!(result.chunk_accuracy, 1.0);
        assert_eq!(result.word_verdicts.len(), 2);
    }

    #[test]
    fn punctuation_in_the_story_text_does_not_hurt() {
        let result = match_chunk(
            &chunk("\"Hello,\" said Mom."),
            "hello said mom",
            &MatchConfig::default(),
        );

        assert_eq!(result.chunk_accuracy, 1.0);
    }

    #[test]
    fn accuracy_stays_in_bounds() {
        let result = match_chunk(
            &chunk("one two three"),
            "wildly different utterance entirely",
            &MatchConfig::default(),
        );
        assert!((0.0..=1.0).contains(&result.chunk_accuracy));
    }
}
