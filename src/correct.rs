//! Snippet repair against a trusted reference rendering of the document.
//!
//! Snippets extracted from a paginated source are often cut mid-word at the
//! page edge or carry broken word boundaries inside. The corrector looks
//! each snippet up in the reference text and either completes the trailing
//! word or replaces a corrupted interior with the verbatim reference span
//! between two short anchors.

use serde::Serialize;
use smallvec::SmallVec;

use crate::matcher::SearchSnippet;
use crate::normalize::{is_word_char, normalize_snippet, normalize_text};
use crate::text_model::TextModel;
use crate::tree::ContentTree;

/// Normalized flattened text of a whole document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceText {
    text: String,
}

impl ReferenceText {
    /// Reference from externally supplied text.
    pub fn new(raw: &str) -> Self {
        Self {
            text: normalize_snippet(raw),
        }
    }

    /// Reference built from the containers of `tree`.
    pub fn from_tree(tree: &ContentTree) -> Self {
        Self::from_model(&mut TextModel::new(tree), tree)
    }

    /// Reference built from (and caching into) an existing text model.
    pub(crate) fn from_model(model: &mut TextModel, tree: &ContentTree) -> Self {
        let mut text = String::new();
        for index in 0..model.len() {
            let Some(flat) = model.flat(tree, index) else {
                continue;
            };
            if flat.normalized().is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(flat.normalized());
        }
        Self {
            text: normalize_text(&text),
        }
    }

    /// Normalized reference text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the reference is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Kind of repair applied before a snippet was placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    /// Trailing partial word extended to the full word.
    Completion,
    /// Corrupted interior replaced by the reference span between anchors.
    ContextCorrection,
    /// Placed by approximate matching.
    Fuzzy,
}

/// Which repairs the corrector attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectionConfig {
    /// Extend a snippet that ends inside a reference word.
    pub completion: bool,
    /// Rebuild a snippet from head/tail anchors when it is absent.
    pub context_correction: bool,
    /// Preferred anchor length in words.
    pub anchor_words: usize,
    /// Shortest anchor length tried.
    pub min_anchor_words: usize,
    /// Accepted corrected span length, relative to the snippet, lower bound.
    pub min_span_ratio: f32,
    /// Accepted corrected span length, relative to the snippet, upper bound.
    pub max_span_ratio: f32,
    /// Head anchor occurrences tried before giving up.
    pub max_head_candidates: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            completion: true,
            context_correction: true,
            anchor_words: 3,
            min_anchor_words: 2,
            min_span_ratio: 0.5,
            max_span_ratio: 2.0,
            max_head_candidates: 8,
        }
    }
}

impl CorrectionConfig {
    /// No repairs.
    pub fn disabled() -> Self {
        Self {
            completion: false,
            context_correction: false,
            ..Self::default()
        }
    }
}

/// Snippet after correction.
#[derive(Clone, Debug, PartialEq)]
pub struct Corrected {
    /// Snippet to search for.
    pub snippet: SearchSnippet,
    /// Repairs applied, in order.
    pub kinds: SmallVec<[CorrectionKind; 2]>,
    /// The snippet was absent from the reference and could not be repaired.
    pub skipped: bool,
}

impl Corrected {
    fn unchanged(snippet: &SearchSnippet) -> Self {
        Self {
            snippet: snippet.clone(),
            kinds: SmallVec::new(),
            skipped: false,
        }
    }

    /// Whether any repair changed the snippet.
    pub fn is_corrected(&self) -> bool {
        !self.kinds.is_empty()
    }
}

/// Word boundary corrector with its own reference cursor.
#[derive(Clone, Debug)]
pub struct WordBoundaryCorrector<'r> {
    reference: &'r ReferenceText,
    config: CorrectionConfig,
    cursor: usize,
}

impl<'r> WordBoundaryCorrector<'r> {
    /// Corrector starting at the beginning of `reference`.
    pub fn new(reference: &'r ReferenceText, config: CorrectionConfig) -> Self {
        Self {
            reference,
            config,
            cursor: 0,
        }
    }

    /// Current reference cursor (byte offset into the reference text).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Repair `snippet` if the reference shows it is truncated or corrupted.
    ///
    /// The reference cursor moves to the located occurrence, so later
    /// snippets are looked up after it.
    pub fn correct(&mut self, snippet: &SearchSnippet) -> Corrected {
        let reference = self.reference.as_str();
        if snippet.is_empty()
            || reference.is_empty()
            || !(self.config.completion || self.config.context_correction)
        {
            return Corrected::unchanged(snippet);
        }

        if let Some(at) = find_from(reference, snippet.text(), self.cursor) {
            self.cursor = at;
            return self.complete(snippet, at, SmallVec::new());
        }
        if reference.contains(snippet.text()) {
            // Present only before the cursor: leave it to the placement order.
            return Corrected::unchanged(snippet);
        }

        if self.config.context_correction && snippet.explicit_marker().is_none() {
            if let Some((at, span)) = self.anchor_span(snippet.text()) {
                log::debug!(
                    "Context correction: {:?} -> {:?}",
                    snippet.text(),
                    span
                );
                self.cursor = at;
                let rebuilt = SearchSnippet::from_parts(span.to_string(), None);
                let mut kinds = SmallVec::new();
                kinds.push(CorrectionKind::ContextCorrection);
                return self.complete(&rebuilt, at, kinds);
            }
        }

        Corrected {
            snippet: snippet.clone(),
            kinds: SmallVec::new(),
            skipped: true,
        }
    }

    /// Extend a snippet found at `at` to the end of its last word.
    fn complete(
        &self,
        snippet: &SearchSnippet,
        at: usize,
        mut kinds: SmallVec<[CorrectionKind; 2]>,
    ) -> Corrected {
        let reference = self.reference.as_str();
        let text = snippet.text();
        let end = at + text.len();
        let ends_in_word = text.chars().next_back().is_some_and(is_word_char)
            && reference[end..].chars().next().is_some_and(is_word_char);

        if !self.config.completion || !ends_in_word {
            return Corrected {
                snippet: snippet.clone(),
                kinds,
                skipped: false,
            };
        }

        let word_end = reference[end..]
            .char_indices()
            .find(|(_, c)| !is_word_char(*c))
            .map(|(i, _)| end + i)
            .unwrap_or(reference.len());
        let completed = &reference[at..word_end];
        log::debug!("Completion: {:?} -> {:?}", text, completed);
        kinds.push(CorrectionKind::Completion);
        Corrected {
            snippet: SearchSnippet::from_parts(completed.to_string(), snippet.explicit_marker()),
            kinds,
            skipped: false,
        }
    }

    /// Reference span between head and tail anchors of `text`.
    fn anchor_span(&self, text: &str) -> Option<(usize, &'r str)> {
        let reference: &'r str = self.reference.as_str();
        let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
        let min_len = (text.len() as f32 * self.config.min_span_ratio) as usize;
        let max_len = (text.len() as f32 * self.config.max_span_ratio).ceil() as usize;
        let min_words = self.config.min_anchor_words.max(1);

        for n in (min_words..=self.config.anchor_words).rev() {
            if words.len() < 2 * n {
                continue;
            }
            let head = words[..n].join(" ");
            let tail = words[words.len() - n..].join(" ");

            let mut from = self.cursor;
            for _ in 0..self.config.max_head_candidates {
                let Some(head_at) = find_from(reference, &head, from) else {
                    break;
                };
                let search_from = head_at + head.len();
                let mut window_end = (head_at + max_len).min(reference.len());
                while !reference.is_char_boundary(window_end) {
                    window_end -= 1;
                }
                let tail_at = (search_from <= window_end)
                    .then(|| reference[search_from..window_end].find(&tail))
                    .flatten();
                if let Some(tail_rel) = tail_at {
                    let span_end = search_from + tail_rel + tail.len();
                    let span = &reference[head_at..span_end];
                    if span.len() >= min_len && span.len() <= max_len {
                        return Some((head_at, span));
                    }
                }
                from = next_char(reference, head_at);
            }
        }
        None
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack
        .get(from..)
        .and_then(|rest| rest.find(needle))
        .map(|rel| from + rel)
}

fn next_char(text: &str, at: usize) -> usize {
    at + text[at..].chars().next().map(char::len_utf8).unwrap_or(1)
}
