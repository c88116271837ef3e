//! Pre-run checks over a record list.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::correct::ReferenceText;
use crate::matcher::SearchSnippet;
use crate::snippet::{PageLabel, SnippetRecord};
use crate::tree::ContentTree;

/// Snippet text shared by several records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateSnippet {
    /// Shared snippet text.
    pub text: String,
    /// Number of records using it.
    pub count: usize,
}

/// Summary of record quality against a document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Records checked.
    pub total: usize,
    /// Distinct snippet texts.
    pub unique: usize,
    /// Snippet texts used by more than one record, most frequent first.
    pub duplicates: Vec<DuplicateSnippet>,
    /// Records still holding the template placeholder.
    pub placeholders: usize,
    /// Pages whose normalized snippet occurs nowhere in the document.
    pub missing: Vec<PageLabel>,
    /// Fraction of checked (non-placeholder) records found in the document.
    pub match_rate: f32,
}

impl ValidationReport {
    /// Whether every record is unique, filled in, and present.
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.placeholders == 0 && self.missing.is_empty()
    }
}

/// Check `records` for duplicates, placeholders, and presence in `tree`.
pub fn validate_records(records: &[SnippetRecord], tree: &ContentTree) -> ValidationReport {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.text()).or_default() += 1;
    }
    let mut duplicates: Vec<DuplicateSnippet> = counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(text, count)| DuplicateSnippet {
            text: (*text).to_string(),
            count: *count,
        })
        .collect();
    duplicates.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));

    let reference = ReferenceText::from_tree(tree);
    let mut placeholders = 0usize;
    let mut checked = 0usize;
    let mut missing = Vec::new();
    for record in records {
        if record.is_placeholder() {
            placeholders += 1;
            continue;
        }
        let snippet = SearchSnippet::parse(record.text());
        if snippet.is_empty() {
            continue;
        }
        checked += 1;
        if !reference.as_str().contains(snippet.text()) {
            missing.push(record.page().clone());
        }
    }
    let match_rate = if checked == 0 {
        0.0
    } else {
        (checked - missing.len()) as f32 / checked as f32
    };

    if !missing.is_empty() {
        log::warn!(
            "{} of {} snippets do not occur in the document",
            missing.len(),
            checked
        );
    }

    ValidationReport {
        total: records.len(),
        unique: counts.len(),
        duplicates,
        placeholders,
        missing,
        match_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::PLACEHOLDER_SNIPPET;

    #[test]
    fn reports_duplicates_placeholders_and_missing() {
        let tree = ContentTree::parse("<p>one <i>two</i> three</p><p>four</p>").expect("parse");
        let records = vec![
            SnippetRecord::new("1", "one two"),
            SnippetRecord::new("2", "four"),
            SnippetRecord::new("3", "four"),
            SnippetRecord::new("4", PLACEHOLDER_SNIPPET),
            SnippetRecord::new("5", "five"),
        ];
        let report = validate_records(&records, &tree);
        assert_eq!(report.total, 5);
        assert_eq!(report.unique, 4);
        assert_eq!(
            report.duplicates,
            vec![DuplicateSnippet {
                text: "four".into(),
                count: 2
            }]
        );
        assert_eq!(report.placeholders, 1);
        assert_eq!(report.missing, vec![PageLabel::new("5")]);
        assert!((report.match_rate - 0.75).abs() < 1e-6);
        assert!(!report.is_clean());
    }
}
