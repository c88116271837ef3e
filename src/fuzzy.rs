//! Approximate snippet location over word windows.
//!
//! Used only after exact matching found nothing admissible. Windows of
//! consecutive document words are compared with the snippet on lowercase,
//! space-free text using normalized Levenshtein similarity.

use crate::normalize::compact_key;
use crate::text_model::TextModel;
use crate::tracker::DocPosition;

/// Fuzzy search limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FuzzyConfig {
    /// Minimum similarity for a window to be accepted.
    pub min_similarity: f32,
    /// Similarity at which the search stops early.
    pub early_exit: f32,
    /// Maximum number of containers scanned from the floor container.
    pub max_containers: usize,
    /// Allowed relative difference between window and snippet lengths.
    pub length_tolerance: f32,
    /// Extra words tried on either side of the snippet's word count.
    pub word_slack: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.8,
            early_exit: 0.95,
            max_containers: 64,
            length_tolerance: 0.5,
            word_slack: 2,
        }
    }
}

/// Best approximate occurrence.
#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyMatch {
    /// Insertion point (after the last word of the window).
    pub position: DocPosition,
    /// Similarity in `[0, 1]`.
    pub similarity: f32,
    /// Normalized window text.
    pub matched: String,
}

struct Word<'a> {
    container: usize,
    text: &'a str,
    key: String,
    end: usize,
}

/// Best window for `snippet` whose insertion point lies in `[floor, ceiling]`.
///
/// Containers must already be flattened (see [`TextModel::ensure_all`]);
/// containers without cached text are skipped.
pub fn fuzzy_find(
    model: &TextModel,
    snippet: &str,
    floor: DocPosition,
    ceiling: Option<DocPosition>,
    config: &FuzzyConfig,
) -> Option<FuzzyMatch> {
    let target = compact_key(snippet);
    let target_len = target.chars().count();
    if target_len == 0 {
        return None;
    }
    let snippet_words = snippet.split_whitespace().count().max(1);

    let last_container = ceiling
        .map(|c| c.container)
        .unwrap_or(usize::MAX)
        .min(floor.container.saturating_add(config.max_containers.max(1) - 1))
        .min(model.len().saturating_sub(1));

    let mut words: Vec<Word<'_>> = Vec::new();
    for index in floor.container..=last_container {
        let Some(flat) = model.get(index) else {
            continue;
        };
        let normalized = flat.normalized();
        let mapping = flat.mapping();
        let mut offset = 0usize;
        for piece in normalized.split(' ') {
            let start = offset;
            offset += piece.len() + 1;
            if piece.is_empty() {
                continue;
            }
            words.push(Word {
                container: index,
                text: piece,
                key: compact_key(piece),
                end: mapping.source_end(start + piece.len()),
            });
        }
    }

    let min_size = snippet_words.saturating_sub(config.word_slack).max(1);
    let max_size = snippet_words + config.word_slack;
    let tolerance = (target_len as f32 * config.length_tolerance).ceil() as usize;
    let mut best: Option<(f32, usize, usize)> = None;

    'outer: for start in 0..words.len() {
        let mut window = String::new();
        let mut window_len = 0usize;
        for size in 1..=max_size {
            let Some(word) = words.get(start + size - 1) else {
                break;
            };
            window.push_str(&word.key);
            window_len += word.key.chars().count();
            if size < min_size {
                continue;
            }
            if window_len > target_len + tolerance {
                break;
            }
            if window_len + tolerance < target_len {
                continue;
            }
            let position = DocPosition::new(word.container, word.end);
            if position < floor || ceiling.is_some_and(|c| position > c) {
                continue;
            }
            let similarity = strsim::normalized_levenshtein(&window, &target) as f32;
            if best.is_none_or(|(best_score, _, _)| similarity > best_score) {
                best = Some((similarity, start, start + size));
                if similarity >= config.early_exit {
                    break 'outer;
                }
            }
        }
    }

    let (similarity, start, end) = best?;
    log::debug!(
        "Fuzzy best for {:?}: {:.3} over words {}..{}",
        snippet,
        similarity,
        start,
        end
    );
    if similarity < config.min_similarity {
        return None;
    }
    let last = words.get(end - 1)?;
    let matched = words[start..end]
        .iter()
        .map(|w| w.text)
        .collect::<Vec<_>>()
        .join(" ");
    Some(FuzzyMatch {
        position: DocPosition::new(last.container, last.end),
        similarity,
        matched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ContentTree;

    fn model_for(source: &str) -> (ContentTree, TextModel) {
        let tree = ContentTree::parse(source).expect("parse should succeed");
        let mut model = TextModel::new(&tree);
        model.ensure_all(&tree);
        (tree, model)
    }

    #[test]
    fn finds_near_miss_and_places_after_last_word() {
        let (_, model) = model_for("<p>The old house stood on the hill above the village.</p>");
        let found = fuzzy_find(
            &model,
            "the old hause stood",
            DocPosition::default(),
            None,
            &FuzzyConfig::default(),
        )
        .expect("near miss should match");
        assert_eq!(found.matched, "The old house stood");
        assert_eq!(found.position, DocPosition::new(0, "The old house stood".len()));
        assert!(found.similarity > 0.9);
    }

    #[test]
    fn respects_floor_and_ceiling() {
        let (_, model) = model_for("<p>red green blue</p><p>red green blue</p>");
        let config = FuzzyConfig::default();
        let found = fuzzy_find(&model, "red grean", DocPosition::new(0, 10), None, &config)
            .expect("second paragraph");
        assert_eq!(found.position.container, 1);
        assert!(fuzzy_find(
            &model,
            "red grean",
            DocPosition::new(0, 10),
            Some(DocPosition::new(0, 20)),
            &config
        )
        .is_none());
    }

    #[test]
    fn unrelated_text_is_rejected() {
        let (_, model) = model_for("<p>completely unrelated sentence here</p>");
        assert!(fuzzy_find(
            &model,
            "the trees were",
            DocPosition::default(),
            None,
            &FuzzyConfig::default()
        )
        .is_none());
    }
}
