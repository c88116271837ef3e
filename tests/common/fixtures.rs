use epub_pagemark::{ContentTree, FlattenedText, SnippetRecord, MARKER_CLASS};

pub const SIMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test</title></head>
<body>
    <p>This is a simple paragraph.</p>
    <p>This is another paragraph with some text.</p>
</body>
</html>
"#;

pub const FORMATTED_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test</title></head>
<body>
    <p>This has <i>italic text</i> in it.</p>
    <p>This has <b>bold</b> and <i>italic</i> words.</p>
    <p>Split <i>across</i> <span>multiple</span> tags here.</p>
</body>
</html>
"#;

pub const GREEK_HTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" lang="el">
<head><title>Τίτλος</title></head>
<body>
    <p>Αυτό είναι ένα κείμενο στα ελληνικά.</p>
</body>
</html>
"#;

const WORDS: &[&str] = &[
    "river", "lantern", "quiet", "harbor", "stone", "letter", "morning", "garden", "window",
    "distant", "silver", "road", "winter", "candle", "shadow", "orchard", "bridge", "hollow",
    "meadow", "thread", "copper", "whisper", "north", "island", "ember", "field", "marble",
    "echo", "willow", "signal",
];

/// Deterministic pseudo-random chapter with inline formatting and entities.
pub fn generated_chapter(paragraphs: usize, words_per_paragraph: usize) -> String {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>Generated</title></head>\n<body>\n",
    );
    for p in 0..paragraphs {
        out.push_str(&format!("<p id=\"para{}\">", p));
        for w in 0..words_per_paragraph {
            if w > 0 {
                out.push(' ');
            }
            let word = WORDS[(next() % WORDS.len() as u64) as usize];
            match next() % 23 {
                0 => out.push_str(&format!("<i>{}</i>", word)),
                1 => out.push_str(&format!("<b>{}</b>", word)),
                2 => out.push_str(&format!("{} &amp;", word)),
                _ => out.push_str(word),
            }
        }
        // Unique tail so every paragraph ends with a distinct phrase.
        out.push_str(&format!(" mark{} end.</p>\n", p));
    }
    out.push_str("</body>\n</html>\n");
    out
}

/// One record per `every` containers, using the last `words` normalized words.
pub fn page_records(xhtml: &str, every: usize, words: usize) -> Vec<SnippetRecord> {
    let tree = ContentTree::parse(xhtml).unwrap_or_else(|e| panic!("parse fixture: {}", e));
    tree.containers()
        .iter()
        .enumerate()
        .filter(|(index, _)| index % every == every - 1)
        .enumerate()
        .map(|(page, (_, container))| {
            let flat = FlattenedText::flatten(&tree, *container);
            let all: Vec<&str> = flat.normalized().split(' ').collect();
            let tail = all[all.len().saturating_sub(words)..].join(" ");
            SnippetRecord::new((page as u64) + 1, tail)
        })
        .collect()
}

/// Remove every inserted marker element from serialized output.
pub fn strip_markers(xhtml: &str) -> String {
    let open = format!("<span class=\"{}\"", MARKER_CLASS);
    let mut out = String::with_capacity(xhtml.len());
    let mut rest = xhtml;
    while let Some(start) = rest.find(&open) {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let end = after
            .find("</span>")
            .unwrap_or_else(|| panic!("unterminated marker in output"));
        rest = &after[end + "</span>".len()..];
    }
    out.push_str(rest);
    out
}

/// Text immediately before each marker (up to `width` bytes), in document order.
pub fn text_before_markers(xhtml: &str, width: usize) -> Vec<String> {
    let open = format!("<span class=\"{}\"", MARKER_CLASS);
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = xhtml[from..].find(&open) {
        let at = from + rel;
        let mut start = at.saturating_sub(width);
        while !xhtml.is_char_boundary(start) {
            start += 1;
        }
        out.push(xhtml[start..at].to_string());
        from = at + open.len();
    }
    out
}
