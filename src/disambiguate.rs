//! Context scoring for snippets with more than one admissible occurrence.

use std::collections::BTreeSet;

use crate::matcher::MatchCandidate;
use crate::normalize::fold_word;
use crate::text_model::FlattenedText;

/// Weights and threshold for context scoring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisambiguationConfig {
    /// Weight of the before-context score when both contexts are supplied.
    pub before_weight: f32,
    /// Weight of the after-context score when both contexts are supplied.
    pub after_weight: f32,
    /// Minimum combined score for a context-based choice.
    pub acceptance_threshold: f32,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            before_weight: 0.4,
            after_weight: 0.6,
            acceptance_threshold: 0.3,
        }
    }
}

/// Outcome of choosing among candidates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Choice {
    /// Best-scoring candidate met the threshold.
    Scored { index: usize, score: f32 },
    /// No score met the threshold; the earliest candidate is used.
    Fallback { index: usize, best_score: f32 },
    /// No context to score with; the earliest candidate is used.
    Earliest { index: usize },
}

impl Choice {
    /// Index of the chosen candidate.
    pub fn index(&self) -> usize {
        match *self {
            Self::Scored { index, .. } | Self::Fallback { index, .. } | Self::Earliest { index } => {
                index
            }
        }
    }
}

/// Jaccard similarity of two folded word sets.
pub fn jaccard<S: AsRef<str>>(left: &[S], right: &[S]) -> f32 {
    let left = folded_set(left);
    let right = folded_set(right);
    if left.is_empty() && right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f32 / union as f32
}

fn folded_set<S: AsRef<str>>(words: &[S]) -> BTreeSet<String> {
    words
        .iter()
        .map(|word| fold_word(word.as_ref()))
        .filter(|word| !word.is_empty())
        .collect()
}

/// The `count` words preceding normalized offset `at`.
pub fn words_before(normalized: &str, at: usize, count: usize) -> Vec<&str> {
    let head = normalized.get(..at).unwrap_or(normalized);
    let mut words: Vec<&str> = head.split_whitespace().rev().take(count).collect();
    words.reverse();
    words
}

/// The `count` words following normalized offset `at`.
pub fn words_after(normalized: &str, at: usize, count: usize) -> Vec<&str> {
    let tail = normalized.get(at..).unwrap_or("");
    tail.split_whitespace().take(count).collect()
}

/// Context score of `candidate` in `[0, 1]`.
///
/// Words are taken from the candidate's own container. With both contexts
/// the scores are combined by weight; with one, that score is used alone.
pub fn score(
    flat: &FlattenedText,
    candidate: &MatchCandidate,
    before: Option<&[String]>,
    after: Option<&[String]>,
    config: &DisambiguationConfig,
) -> f32 {
    let text = flat.normalized();
    let before_score = before.filter(|words| !words.is_empty()).map(|words| {
        let found = words_before(text, candidate.norm_start, words.len());
        jaccard(words, &owned(&found))
    });
    let after_score = after.filter(|words| !words.is_empty()).map(|words| {
        let found = words_after(text, candidate.norm_end, words.len());
        jaccard(words, &owned(&found))
    });
    match (before_score, after_score) {
        (Some(b), Some(a)) => config.before_weight * b + config.after_weight * a,
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => 0.0,
    }
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

/// Pick among scored candidates (in document order).
///
/// The highest score wins, earliest on ties, if it reaches the threshold.
pub fn choose(scores: &[f32], config: &DisambiguationConfig) -> Choice {
    let mut best: Option<(usize, f32)> = None;
    for (index, score) in scores.iter().copied().enumerate() {
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }
    match best {
        Some((index, score)) if score >= config.acceptance_threshold => {
            Choice::Scored { index, score }
        }
        Some((_, best_score)) => Choice::Fallback {
            index: 0,
            best_score,
        },
        None => Choice::Earliest { index: 0 },
    }
}
