//! Snippet records, page labels, and record loading.

use core::cmp::Ordering;
use core::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ErrorPhase, PagemarkError};

/// Placeholder text left in record templates that were never filled in.
pub const PLACEHOLDER_SNIPPET: &str = "PASTE_TEXT_FROM_END_OF_PAGE_HERE";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LabelKey {
    Roman(u32),
    Other(String),
    Numeric(u64, String),
}

/// Page label with a total order.
///
/// Roman numerals (by value) sort first, then other non-numeric labels
/// lexicographically, then numeric labels by number and suffix, so
/// `xii < 7 < 36 < 36a < 36b`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PageLabel {
    raw: String,
    key: LabelKey,
}

impl PageLabel {
    /// Parse a label; surrounding whitespace is dropped.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let key = label_key(&raw);
        Self { raw, key }
    }

    /// Label as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric value of a numeric label.
    pub fn number(&self) -> Option<u64> {
        match self.key {
            LabelKey::Numeric(n, _) => Some(n),
            _ => None,
        }
    }

    /// Value of a roman numeral label.
    pub fn roman_value(&self) -> Option<u32> {
        match self.key {
            LabelKey::Roman(n) => Some(n),
            _ => None,
        }
    }
}

fn label_key(raw: &str) -> LabelKey {
    let digits = raw.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Ok(number) = raw[..digits].parse::<u64>() {
            return LabelKey::Numeric(number, raw[digits..].to_string());
        }
    }
    match roman_value(raw) {
        Some(value) => LabelKey::Roman(value),
        None => LabelKey::Other(raw.to_string()),
    }
}

/// Value of a canonical lowercase or uppercase roman numeral.
fn roman_value(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.len() > 15 {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    let mut total = 0u32;
    let mut prev = 0u32;
    for ch in lower.chars().rev() {
        let value = match ch {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if value < prev {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            prev = value;
        }
    }
    (total > 0 && to_roman(total) == lower).then_some(total)
}

fn to_roman(mut value: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (n, symbol) in TABLE {
        while value >= *n {
            out.push_str(symbol);
            value -= n;
        }
    }
    out
}

impl Ord for PageLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for PageLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for PageLabel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for PageLabel {
    fn from(number: u64) -> Self {
        Self::new(&number.to_string())
    }
}

impl Serialize for PageLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Text expected at the end of one source page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnippetRecord {
    page: PageLabel,
    text: String,
    context_before: Option<Vec<String>>,
    context_after: Option<Vec<String>>,
}

impl SnippetRecord {
    /// Record without context.
    pub fn new(page: impl Into<PageLabel>, text: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            text: text.into(),
            context_before: None,
            context_after: None,
        }
    }

    /// Attach the words expected before the snippet.
    pub fn with_context_before(mut self, context: &str) -> Self {
        self.context_before = split_context(context);
        self
    }

    /// Attach the words expected after the snippet.
    pub fn with_context_after(mut self, context: &str) -> Self {
        self.context_after = split_context(context);
        self
    }

    /// Page this snippet ends.
    pub fn page(&self) -> &PageLabel {
        &self.page
    }

    /// Raw snippet text, possibly with a `|` page-break point.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Words expected just before the snippet.
    pub fn context_before(&self) -> Option<&[String]> {
        self.context_before.as_deref()
    }

    /// Words expected just after the snippet.
    pub fn context_after(&self) -> Option<&[String]> {
        self.context_after.as_deref()
    }

    /// Whether any context words were supplied.
    pub fn has_context(&self) -> bool {
        self.context_before.is_some() || self.context_after.is_some()
    }

    /// Whether the snippet is the unfilled template placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.text.trim() == PLACEHOLDER_SNIPPET
    }
}

fn split_context(context: &str) -> Option<Vec<String>> {
    let words: Vec<String> = context.split_whitespace().map(str::to_string).collect();
    (!words.is_empty()).then_some(words)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPage {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContext {
    Text(String),
    Words(Vec<String>),
}

impl RawContext {
    fn into_words(self) -> Option<Vec<String>> {
        match self {
            Self::Text(text) => split_context(&text),
            Self::Words(words) => split_context(&words.join(" ")),
        }
    }
}

#[derive(Deserialize)]
struct RawRecord {
    page: Option<RawPage>,
    #[serde(alias = "text")]
    snippet: Option<String>,
    #[serde(default)]
    context_before: Option<RawContext>,
    #[serde(default)]
    context_after: Option<RawContext>,
}

/// Parse a JSON array of snippet records.
///
/// `page` may be a string or a number; `text` is accepted in place of
/// `snippet`; context values may be a string or a list of words. Unknown
/// fields are ignored. Records are returned in file order; use
/// [`ensure_page_order`] or [`sort_records`] before marking.
pub fn parse_records_json(json: &str) -> Result<Vec<SnippetRecord>, PagemarkError> {
    let raw: Vec<RawRecord> = serde_json::from_str(json).map_err(|err| {
        PagemarkError::new(
            ErrorPhase::Records,
            "RECORDS_JSON_ERROR",
            format!("Invalid snippet record JSON: {}", err),
        )
    })?;

    let mut records = Vec::with_capacity(raw.len());
    for (index, record) in raw.into_iter().enumerate() {
        let page = match record.page {
            Some(RawPage::Number(n)) => PageLabel::from(n),
            Some(RawPage::Text(text)) => PageLabel::new(&text),
            None => return Err(missing_field(index, "page")),
        };
        let Some(text) = record.snippet else {
            return Err(missing_field(index, "snippet").with_page(page.as_str()));
        };
        records.push(SnippetRecord {
            page,
            text,
            context_before: record.context_before.and_then(RawContext::into_words),
            context_after: record.context_after.and_then(RawContext::into_words),
        });
    }
    ensure_nonempty(&records)?;
    Ok(records)
}

fn missing_field(index: usize, field: &str) -> PagemarkError {
    PagemarkError::new(
        ErrorPhase::Records,
        "RECORDS_MISSING_FIELD",
        format!("Record is missing required field `{}`", field),
    )
    .with_record_index(index)
}

/// Reject records whose snippet is empty after trimming.
pub fn ensure_nonempty(records: &[SnippetRecord]) -> Result<(), PagemarkError> {
    match records.iter().position(|r| r.text.trim().is_empty()) {
        Some(index) => Err(PagemarkError::new(
            ErrorPhase::Records,
            "RECORDS_EMPTY_SNIPPET",
            "Snippet text is empty",
        )
        .with_record_index(index)
        .with_page(records[index].page.as_str())),
        None => Ok(()),
    }
}

/// Reject record lists not in non-decreasing page order.
pub fn ensure_page_order(records: &[SnippetRecord]) -> Result<(), PagemarkError> {
    for (index, pair) in records.windows(2).enumerate() {
        if pair[1].page < pair[0].page {
            return Err(PagemarkError::new(
                ErrorPhase::Records,
                "RECORDS_OUT_OF_ORDER",
                format!(
                    "Page {} follows page {}",
                    pair[1].page.as_str(),
                    pair[0].page.as_str()
                ),
            )
            .with_record_index(index + 1)
            .with_page(pair[1].page.as_str()));
        }
    }
    Ok(())
}

/// Stable sort by page label.
pub fn sort_records(records: &mut [SnippetRecord]) {
    records.sort_by(|a, b| a.page.cmp(&b.page));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<PageLabel> {
        raw.iter().map(|r| PageLabel::new(r)).collect()
    }

    #[test]
    fn labels_order_roman_other_numeric() {
        let mut pages = labels(&["36b", "7", "xii", "36", "ix", "Cover", "36a", "100"]);
        pages.sort();
        let order: Vec<&str> = pages.iter().map(PageLabel::as_str).collect();
        assert_eq!(order, vec!["ix", "xii", "Cover", "7", "36", "36a", "36b", "100"]);
    }

    #[test]
    fn roman_numerals_must_be_canonical() {
        assert_eq!(PageLabel::new("xiv").roman_value(), Some(14));
        assert_eq!(PageLabel::new("XL").roman_value(), Some(40));
        assert_eq!(PageLabel::new("iiii").roman_value(), None);
        assert_eq!(PageLabel::new("civil").roman_value(), None);
    }

    #[test]
    fn parses_mixed_json_shapes() {
        let json = r#"[
            {"page": 12, "snippet": "the trees were", "context_after": "tall and old"},
            {"page": "13", "text": "second", "context_before": ["a", "b"], "extra": true},
            {"page": "xiv", "snippet": "third", "context_before": "  "}
        ]"#;
        let records = parse_records_json(json).expect("records should parse");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].page().number(), Some(12));
        assert_eq!(
            records[0].context_after(),
            Some(&["tall".to_string(), "and".to_string(), "old".to_string()][..])
        );
        assert_eq!(records[1].text(), "second");
        assert_eq!(records[1].context_before().map(<[String]>::len), Some(2));
        assert!(!records[2].has_context());
    }

    #[test]
    fn missing_and_empty_fields_are_fatal() {
        let err = parse_records_json(r#"[{"page": 1}]"#).expect_err("missing snippet");
        assert_eq!(err.code, "RECORDS_MISSING_FIELD");
        assert_eq!(err.record_index(), Some(0));

        let err = parse_records_json(r#"[{"page": 1, "snippet": "ok"}, {"page": 2, "snippet": " "}]"#)
            .expect_err("empty snippet");
        assert_eq!(err.code, "RECORDS_EMPTY_SNIPPET");
        assert_eq!(err.record_index(), Some(1));

        let err = parse_records_json("{not json").expect_err("bad json");
        assert_eq!(err.code, "RECORDS_JSON_ERROR");
    }

    #[test]
    fn page_order_is_checked_and_sortable() {
        let mut records = vec![
            SnippetRecord::new("3", "c"),
            SnippetRecord::new("1", "a"),
            SnippetRecord::new("1", "b"),
        ];
        let err = ensure_page_order(&records).expect_err("out of order");
        assert_eq!(err.record_index(), Some(1));
        sort_records(&mut records);
        let texts: Vec<&str> = records.iter().map(SnippetRecord::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(ensure_page_order(&records).is_ok());
    }
}
