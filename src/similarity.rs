//! Heuristic text similarity.
//!
//! Three pure scorers, each returning a value in `[0.0, 1.0]`:
//!
//! - [`cosine_similarity`] - term-frequency vectors projected onto the fixed
//!   [`VOCABULARY`]. Words outside the vocabulary are ignored, which caps
//!   precision: two texts that share only out-of-vocabulary words score 0.
//! - [`jaccard_similarity`] - token-set intersection over union.
//! - [`levenshtein_similarity`] - `(max_len - edit_distance) / max_len` over
//!   characters.
//!
//! [`similarity`] dispatches on [`SimilarityAlgorithm`] and short-circuits to
//! `1.0` when both texts normalize to the same string, so self-similarity is
//! always exact regardless of vocabulary coverage.

use serde::{Deserialize, Serialize};

/// Which scorer the semantic cache uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityAlgorithm {
    #[default]
    Cosine,
    Jaccard,
    Levenshtein,
}

impl std::str::FromStr for SimilarityAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityAlgorithm::Cosine),
            "jaccard" => Ok(SimilarityAlgorithm::Jaccard),
            "levenshtein" => Ok(SimilarityAlgorithm::Levenshtein),
            other => Err(format!("unknown similarity algorithm: {other}")),
        }
    }
}

/// Vocabulary for cosine projection. Sorted, so lookups can binary search.
pub const VOCABULARY: &[&str] = &[
    "action", "analysis", "analyze", "answer", "argument", "battle", "begin", "build", "calculate",
    "castle", "cause", "chapter", "character", "city", "clue", "code", "compare", "conclusion",
    "conflict", "create", "creature", "dark", "data", "describe", "design", "detail", "dialogue",
    "dragon", "dream", "effect", "emotion", "empire", "end", "enemy", "evaluate", "event",
    "evidence", "example", "explain", "explore", "fact", "fight", "find", "forest", "friend",
    "function", "game", "generate", "goal", "hero", "history", "idea", "image", "item", "journey",
    "king", "kingdom", "land", "legend", "level", "light", "list", "logic", "magic", "map",
    "mission", "monster", "mystery", "name", "narrative", "number", "ocean", "order", "pattern",
    "place", "plan", "player", "plot", "power", "problem", "proof", "puzzle", "quest", "question",
    "reason", "result", "rule", "scene", "sea", "secret", "ship", "solution", "solve", "spell",
    "story", "strategy", "summary", "sword", "system", "tale", "test", "theory", "time", "town",
    "trade", "treasure", "village", "war", "weapon", "world", "write",
];

/// Lowercase, replace non-alphanumeric characters with spaces and collapse
/// whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Score two texts with the chosen algorithm.
pub fn similarity(a: &str, b: &str, algorithm: SimilarityAlgorithm) -> f64 {
    if normalize(a) == normalize(b) {
        return 1.0;
    }
    match algorithm {
        SimilarityAlgorithm::Cosine => cosine_similarity(a, b),
        SimilarityAlgorithm::Jaccard => jaccard_similarity(a, b),
        SimilarityAlgorithm::Levenshtein => levenshtein_similarity(a, b),
    }
}

fn term_vector(text: &str) -> Vec<f64> {
    let mut vector = vec![0.0; VOCABULARY.len()];
    for token in tokens(text) {
        if let Ok(idx) = VOCABULARY.binary_search(&token.as_str()) {
            vector[idx] += 1.0;
        }
    }
    vector
}

/// Cosine similarity over vocabulary term frequencies.
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let va = term_vector(a);
    let vb = term_vector(b);
    let dot: f64 = va.iter().zip(&vb).map(|(x, y)| x * y).sum();
    let norm_a = va.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = vb.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Jaccard index of the two token sets. Two empty sets score 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;

    let sa: HashSet<String> = tokens(a).into_iter().collect();
    let sb: HashSet<String> = tokens(b).into_iter().collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// Character-level edit distance (insert, delete, substitute all cost 1).
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `(max_len - distance) / max_len`; two empty strings score 1.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein_distance(a, b);
    (max_len - distance.min(max_len)) as f64 / max_len as f64
}
