//! Normalized edit-distance similarity between an expected word and what the
//! recognizer heard.

/// Lowercases and strips surrounding punctuation. Story text carries commas
/// and quotes; recognizers emit bare words. Inner apostrophes survive.
fn normalize(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity in [0, 1]: 1.0 for identical words after normalization, 0.0
/// when every character differs.
pub fn word_similarity(expected: &str, spoken: &str) -> f64 {
    let expected: Vec<char> = normalize(expected).chars().collect();
    let spoken: Vec<char> = normalize(spoken).chars().collect();

    let longest = expected.len().max(spoken.len());
    if longest == 0 {
        return 1.0;
    }

    let distance = levenshtein(&expected, &spoken);
    1.0 - distance as f64 / longest as f64
}
