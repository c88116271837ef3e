//! Print page-boundary markers for EPUB/XHTML content.
//!
//! Given an XHTML document and an ordered list of snippet records (text known
//! to sit at the end of each page of a printed edition), `epub-pagemark`
//! finds every snippet in the document's text, even across inline
//! formatting, and inserts a `span.page-number` marker at the boundary.
//!
//! ```no_run
//! use epub_pagemark::{mark_document, parse_records_json, ContentTree, MarkOptions};
//!
//! # fn main() -> Result<(), epub_pagemark::PagemarkError> {
//! let xhtml = std::fs::read_to_string("chapter.xhtml").unwrap_or_default();
//! let json = std::fs::read_to_string("pages.json").unwrap_or_default();
//! let mut tree = ContentTree::parse(&xhtml)?;
//! let records = parse_records_json(&json)?;
//! let report = mark_document(&mut tree, &records, MarkOptions::default())?;
//! for failed in report.failed() {
//!     eprintln!("page {}: {:?}", failed.page, failed.outcome);
//! }
//! let marked = tree.to_xhtml();
//! # let _ = marked;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod correct;
pub mod disambiguate;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod marker;
pub mod matcher;
pub mod normalize;
pub mod snippet;
pub mod text_model;
pub mod tracker;
pub mod tree;
pub mod validate;

pub use correct::{CorrectionConfig, CorrectionKind, ReferenceText, WordBoundaryCorrector};
pub use disambiguate::DisambiguationConfig;
pub use engine::{
    mark_document, Advisory, MarkLimits, MarkOptions, MatchStrategy, Outcome, PageMarker,
    RecordResult, RunReport, RunStats,
};
pub use error::{ErrorLimitContext, ErrorPhase, PagemarkError, PagemarkErrorContext};
pub use fuzzy::FuzzyConfig;
pub use marker::{MarkerConfig, MARKER_CLASS};
pub use matcher::{MatchCandidate, SearchSnippet};
pub use snippet::{
    ensure_page_order, parse_records_json, sort_records, PageLabel, SnippetRecord,
    PLACEHOLDER_SNIPPET,
};
pub use text_model::{FlattenedText, TextModel};
pub use tracker::{DocPosition, Tracker};
pub use tree::{ContentTree, NodeId, TreeLimits};
pub use validate::{validate_records, ValidationReport};
