//! Text normalization shared by the matcher, the corrector, and the
//! disambiguator.
//!
//! The same rules apply to snippets and to document text, and applying them
//! twice yields the same string as applying them once, so equality on
//! normalized text is well defined.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// How a single source character appears in normalized output.
enum Mapped {
    Drop,
    Space,
    Char(char),
    Str(&'static str),
}

fn map_char(ch: char) -> Mapped {
    match ch {
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => {
            Mapped::Drop
        }
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{02BC}' => {
            Mapped::Char('\'')
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => Mapped::Char('"'),
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => Mapped::Char('-'),
        '\u{2026}' => Mapped::Str("..."),
        c if c.is_whitespace() => Mapped::Space,
        c => Mapped::Char(c),
    }
}

/// Normalized text plus, for every output byte, the source byte range of the
/// character(s) that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct NormalizedText {
    pub(crate) text: String,
    pub(crate) origin: Vec<(usize, usize)>,
}

impl NormalizedText {
    /// Source range for the normalized byte span `[start, end)`.
    ///
    /// `end` must be greater than `start`.
    pub(crate) fn source_span(&self, start: usize, end: usize) -> (usize, usize) {
        (self.origin[start].0, self.origin[end - 1].1)
    }

    /// Source offset just past the normalized character ending at `end`.
    pub(crate) fn source_end(&self, end: usize) -> usize {
        if end == 0 {
            return self.origin.first().map(|span| span.0).unwrap_or(0);
        }
        self.origin[end - 1].1
    }
}

struct Builder {
    out: NormalizedText,
    pending_space: Option<(usize, usize)>,
    after_slash: bool,
}

impl Builder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: NormalizedText {
                text: String::with_capacity(capacity),
                origin: Vec::with_capacity(capacity),
            },
            pending_space: None,
            after_slash: false,
        }
    }

    fn note_space(&mut self, start: usize, end: usize) {
        self.pending_space = Some(match self.pending_space {
            Some((run_start, _)) => (run_start, end),
            None => (start, end),
        });
    }

    fn push_str(&mut self, s: &str, start: usize, end: usize) {
        if let Some((run_start, run_end)) = self.pending_space.take() {
            if !self.out.text.is_empty() && !self.after_slash && !s.starts_with('/') {
                self.out.text.push(' ');
                self.out.origin.push((run_start, run_end));
            }
        }
        if s.starts_with('/') {
            while self.out.text.ends_with(' ') {
                self.out.text.pop();
                self.out.origin.pop();
            }
        }
        self.out.text.push_str(s);
        for _ in 0..s.len() {
            self.out.origin.push((start, end));
        }
        self.after_slash = s.ends_with('/');
    }

    fn finish(self) -> NormalizedText {
        self.out
    }
}

/// Normalize `source`, recording where each output byte came from.
///
/// `breaks` lists source offsets (ascending) that act as zero-width word
/// separators, such as the position of a `<br/>` between two text runs.
pub(crate) fn normalize_mapped(source: &str, breaks: &[usize]) -> NormalizedText {
    let mut builder = Builder::with_capacity(source.len());
    let mut next_break = breaks.iter().copied().peekable();
    let mut buf = [0u8; 4];

    for (offset, ch) in source.char_indices() {
        while let Some(at) = next_break.peek().copied() {
            if at > offset {
                break;
            }
            builder.note_space(at, at);
            next_break.next();
        }
        let end = offset + ch.len_utf8();
        match map_char(ch) {
            Mapped::Drop => {}
            Mapped::Space => builder.note_space(offset, end),
            Mapped::Char(c) => builder.push_str(c.encode_utf8(&mut buf), offset, end),
            Mapped::Str(s) => builder.push_str(s, offset, end),
        }
    }
    builder.finish()
}

/// Normalize arbitrary text for matching.
pub fn normalize_text(source: &str) -> String {
    normalize_mapped(source, &[]).text
}

/// Normalize a snippet: canonical composition first, then the shared rules.
///
/// Snippets usually come from a different toolchain than the document, so
/// decomposed accents are composed before matching.
pub fn normalize_snippet(snippet: &str) -> String {
    let composed: String = snippet.nfc().collect();
    normalize_text(&composed)
}

/// Word character test used for word-boundary decisions.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || is_combining_mark(ch)
}

/// Fold a word for set comparison: lowercase, strip diacritics, trim edge
/// punctuation.
pub fn fold_word(word: &str) -> String {
    let lowered = word.to_lowercase();
    let stripped: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Lowercased text with all spaces removed, used by approximate matching.
pub(crate) fn compact_key(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(normalize_text("  the\n\t trees \u{00A0} were  "), "the trees were");
    }

    #[test]
    fn punctuation_equivalence_rules() {
        assert_eq!(normalize_text("\u{201C}It\u{2019}s\u{201D}"), "\"It's\"");
        assert_eq!(normalize_text("1914\u{2013}1918"), "1914-1918");
        assert_eq!(normalize_text("and so\u{2026}"), "and so...");
        assert_eq!(normalize_text("and / or"), "and/or");
        assert_eq!(normalize_text("co\u{00AD}operate"), "cooperate");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "  a  /  b \u{2014} c\u{2026} \u{201C}d\u{201D} ",
            "σύγχυση\u{00A0}\u{00A0}και",
            "x /y/ z",
        ];
        for input in inputs {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn origin_map_points_back_to_source() {
        let source = "ab  \u{2026}cd";
        let normalized = normalize_mapped(source, &[]);
        assert_eq!(normalized.text, "ab ...cd");
        assert_eq!(normalized.origin.len(), normalized.text.len());
        // The collapsed space covers the whole whitespace run.
        assert_eq!(normalized.origin[2], (2, 4));
        // All three dots map to the single ellipsis character.
        assert_eq!(normalized.origin[3], (4, 7));
        assert_eq!(normalized.origin[5], (4, 7));
        assert_eq!(normalized.source_span(6, 8), (7, 9));
    }

    #[test]
    fn breaks_insert_zero_width_separators() {
        let normalized = normalize_mapped("line oneline two", &[8]);
        assert_eq!(normalized.text, "line one line two");
        assert_eq!(normalized.origin[8], (8, 8));
    }

    #[test]
    fn snippet_normalization_composes_accents() {
        let decomposed = "δικαστηρι\u{0301}ου";
        assert_eq!(normalize_snippet(decomposed), "δικαστηρίου");
    }

    #[test]
    fn fold_word_strips_accents_and_edge_punctuation() {
        assert_eq!(fold_word("Τελεσίδικη."), "τελεσιδικη");
        assert_eq!(fold_word("«είναι»"), "ειναι");
        assert_eq!(fold_word("Café"), "cafe");
    }

    #[test]
    fn compact_key_drops_spaces_and_lowercases() {
        assert_eq!(compact_key("The Trees were"), "thetreeswere");
    }
}
