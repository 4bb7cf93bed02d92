/// Thresholds for per-word fuzzy matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Minimum normalized similarity for an aligned word pair to count as a
    /// match. 0.8 tolerates single-letter recognizer slips on short words
    /// without accepting outright substitutions.
    pub word_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            word_threshold: 0.8,
        }
    }
}
