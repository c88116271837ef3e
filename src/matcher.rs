//! Exact snippet search inside flattened container text.

use serde::Serialize;

use crate::normalize::normalize_snippet;
use crate::text_model::FlattenedText;
use crate::tracker::DocPosition;

/// Separator marking an explicit page break inside a snippet.
pub const PAGE_BREAK: char = '|';

/// Normalized search text plus the marker point inside it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchSnippet {
    text: String,
    marker_at: Option<usize>,
}

impl SearchSnippet {
    /// Parse and normalize a snippet.
    ///
    /// `"a b|c d"` searches for `"a b c d"` with the marker after `"a b"`.
    /// Without a `|` the marker goes after the whole snippet.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(PAGE_BREAK) {
            Some((before, after)) => {
                let before = normalize_snippet(before);
                let after = normalize_snippet(after);
                let marker_at = before.len();
                let text = match (before.is_empty(), after.is_empty()) {
                    (_, true) => before,
                    (true, false) => after,
                    (false, false) => format!("{} {}", before, after),
                };
                Self {
                    text,
                    marker_at: Some(marker_at),
                }
            }
            None => Self {
                text: normalize_snippet(raw),
                marker_at: None,
            },
        }
    }

    pub(crate) fn from_parts(text: String, marker_at: Option<usize>) -> Self {
        Self { text, marker_at }
    }

    /// Normalized text that is searched for.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Explicit marker offset within [`Self::text`], if the snippet had a `|`.
    pub fn explicit_marker(&self) -> Option<usize> {
        self.marker_at
    }

    /// Marker offset within [`Self::text`].
    pub fn marker_offset(&self) -> usize {
        self.marker_at.unwrap_or(self.text.len()).min(self.text.len())
    }

    /// Whether there is nothing to search for.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One occurrence of a snippet in a container.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchCandidate {
    /// Container index in document order.
    pub container: usize,
    /// Start of the occurrence in the container's original text.
    pub start: usize,
    /// End of the occurrence in the container's original text.
    pub end: usize,
    /// Insertion point in the container's original text.
    pub marker: usize,
    /// Start of the occurrence in normalized text.
    pub norm_start: usize,
    /// End of the occurrence in normalized text.
    pub norm_end: usize,
    /// Context score, once the disambiguator has scored this candidate.
    pub score: Option<f32>,
}

impl MatchCandidate {
    /// Insertion point in document order.
    pub fn position(&self) -> DocPosition {
        DocPosition::new(self.container, self.marker)
    }
}

/// All occurrences of `snippet` in `flat`, in text order.
///
/// Each start position is reported once; occurrences may overlap.
pub fn find(flat: &FlattenedText, container: usize, snippet: &SearchSnippet) -> Vec<MatchCandidate> {
    let mut out = Vec::new();
    find_each(flat, container, snippet, |candidate| {
        out.push(candidate);
        true
    });
    out
}

/// First occurrence at or after `min_marker` (original offset of the
/// insertion point).
pub fn find_first_from(
    flat: &FlattenedText,
    container: usize,
    snippet: &SearchSnippet,
    min_marker: usize,
) -> Option<MatchCandidate> {
    let mut found = None;
    find_each(flat, container, snippet, |candidate| {
        if candidate.marker >= min_marker {
            found = Some(candidate);
            return false;
        }
        true
    });
    found
}

fn find_each(
    flat: &FlattenedText,
    container: usize,
    snippet: &SearchSnippet,
    mut visit: impl FnMut(MatchCandidate) -> bool,
) {
    let needle = snippet.text();
    if needle.is_empty() {
        return;
    }
    let haystack = flat.normalized();
    let mapping = flat.mapping();
    let marker_rel = snippet.marker_offset();
    let mut from = 0usize;

    while let Some(rel) = haystack.get(from..).and_then(|rest| rest.find(needle)) {
        let norm_start = from + rel;
        let norm_end = norm_start + needle.len();
        let (start, end) = mapping.source_span(norm_start, norm_end);
        let marker = if marker_rel == 0 {
            start
        } else {
            mapping.source_end(norm_start + marker_rel)
        };
        let candidate = MatchCandidate {
            container,
            start,
            end,
            marker,
            norm_start,
            norm_end,
            score: None,
        };
        if !visit(candidate) {
            return;
        }
        let step = haystack[norm_start..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        from = norm_start + step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ContentTree;

    fn flat_of(source: &str) -> FlattenedText {
        let tree = ContentTree::parse(source).expect("parse should succeed");
        FlattenedText::flatten(&tree, tree.containers()[0])
    }

    #[test]
    fn parses_page_break_syntax() {
        let snippet = SearchSnippet::parse("word1  word2 | word3 word4");
        assert_eq!(snippet.text(), "word1 word2 word3 word4");
        assert_eq!(snippet.marker_offset(), "word1 word2".len());

        let plain = SearchSnippet::parse(" the trees\u{00A0}were ");
        assert_eq!(plain.text(), "the trees were");
        assert_eq!(plain.marker_offset(), plain.text().len());
    }

    #[test]
    fn finds_across_inline_formatting() {
        let flat = flat_of("<p>When <i>the\n   trees</i> were young</p>");
        let snippet = SearchSnippet::parse("the trees were");
        let found = find(&flat, 0, &snippet);
        assert_eq!(found.len(), 1);
        assert_eq!(&flat.original()[..found[0].marker], "When the\n   trees were");
    }

    #[test]
    fn reports_every_start_once() {
        let flat = flat_of("<p>aa aa aa</p>");
        let found = find(&flat, 0, &SearchSnippet::parse("aa aa"));
        let starts: Vec<usize> = found.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 3]);
    }

    #[test]
    fn marker_follows_explicit_break() {
        let flat = flat_of("<p>end of page start of next</p>");
        let found = find(&flat, 0, &SearchSnippet::parse("of page|start of"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].marker, "end of page".len());
    }

    #[test]
    fn first_from_skips_earlier_occurrences() {
        let flat = flat_of("<p>x y x y</p>");
        let snippet = SearchSnippet::parse("x");
        let first = find_first_from(&flat, 0, &snippet, 2).expect("second occurrence");
        assert_eq!(first.start, 4);
        assert!(find_first_from(&flat, 0, &snippet, 6).is_none());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let flat = flat_of("<p>The Trees</p>");
        assert!(find(&flat, 0, &SearchSnippet::parse("the trees")).is_empty());
    }
}
