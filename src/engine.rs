//! Ordered marking pass over snippet records.
//!
//! Records are processed in page order with one [`Tracker`]. For each record
//! the corrector may rewrite the snippet, the matcher collects candidates
//! from the cursor container onward, the tracker drops candidates behind the
//! cursor, the disambiguator picks among several, and the inserter commits.
//! Records that still have no placement go to the fuzzy locator, either
//! inline or in a deferred pass bounded by their placed neighbors.

use serde::Serialize;
use smallvec::SmallVec;

use crate::correct::{CorrectionConfig, CorrectionKind, ReferenceText, WordBoundaryCorrector};
use crate::disambiguate::{self, Choice, DisambiguationConfig};
use crate::error::PagemarkError;
use crate::fuzzy::{fuzzy_find, FuzzyConfig, FuzzyMatch};
use crate::marker::{self, MarkerConfig, MarkerIds};
use crate::matcher::{self, MatchCandidate, SearchSnippet};
use crate::snippet::{ensure_nonempty, ensure_page_order, PageLabel, SnippetRecord};
use crate::text_model::TextModel;
use crate::tracker::{DocPosition, Tracker};
use crate::tree::ContentTree;

/// How records without an exact admissible match are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Exact matching only.
    #[default]
    Exact,
    /// Try the fuzzy locator right away, bounded below by the cursor.
    ExactThenFuzzy,
    /// Retry with the fuzzy locator after the ordered pass, bounded by the
    /// neighboring placements.
    ExactThenDeferredFuzzy,
}

/// Per-record search limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkLimits {
    /// Maximum admissible candidates collected for disambiguation.
    pub max_candidates: usize,
}

impl Default for MarkLimits {
    fn default() -> Self {
        Self { max_candidates: 64 }
    }
}

/// Marking run options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarkOptions {
    /// Fallback behavior after exact matching.
    pub strategy: MatchStrategy,
    /// Context scoring weights and threshold.
    pub disambiguation: DisambiguationConfig,
    /// Snippet repairs against the reference text.
    pub correction: CorrectionConfig,
    /// Fuzzy locator limits.
    pub fuzzy: FuzzyConfig,
    /// Marker output options.
    pub marker: MarkerConfig,
    /// Candidate limits.
    pub limits: MarkLimits,
}

impl MarkOptions {
    /// Tighter search bounds for constrained environments.
    pub fn embedded() -> Self {
        Self {
            fuzzy: FuzzyConfig {
                max_containers: 16,
                ..FuzzyConfig::default()
            },
            limits: MarkLimits { max_candidates: 16 },
            ..Self::default()
        }
    }

    /// Set the fallback strategy for records without an exact match.
    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set context scoring weights and threshold.
    pub fn with_disambiguation(mut self, disambiguation: DisambiguationConfig) -> Self {
        self.disambiguation = disambiguation;
        self
    }

    /// Set which snippet repairs are attempted.
    pub fn with_correction(mut self, correction: CorrectionConfig) -> Self {
        self.correction = correction;
        self
    }

    /// Set approximate matching limits.
    pub fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Set marker id and stylesheet options.
    pub fn with_marker(mut self, marker: MarkerConfig) -> Self {
        self.marker = marker;
        self
    }

    /// Set per-record candidate limits.
    pub fn with_limits(mut self, limits: MarkLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Final decision for one record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Exact unique placement.
    Inserted { position: DocPosition },
    /// Placed after the snippet was repaired or matched approximately.
    InsertedAfterCorrection {
        position: DocPosition,
        correction_kind: CorrectionKind,
    },
    /// Several admissible candidates; one was chosen by context scoring.
    ///
    /// `score` is the chosen candidate's own context score, which is below
    /// the threshold when the earliest candidate was taken as a fallback.
    Ambiguous {
        chosen_position: DocPosition,
        score: f32,
    },
    /// No candidate anywhere after the cursor.
    NotFound,
    /// Occurrences exist, but all lie before the cursor.
    RejectedOutOfOrder,
}

impl Outcome {
    /// Insertion point, if a marker was placed.
    pub fn position(&self) -> Option<DocPosition> {
        match *self {
            Self::Inserted { position } | Self::InsertedAfterCorrection { position, .. } => {
                Some(position)
            }
            Self::Ambiguous {
                chosen_position, ..
            } => Some(chosen_position),
            Self::NotFound | Self::RejectedOutOfOrder => None,
        }
    }
}

/// Non-fatal observations attached to a record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Context scores were all below the threshold; earliest candidate used.
    AmbiguousBelowThreshold { best_score: f32 },
    /// Snippet absent from the reference text and no repair was found.
    CorrectionSkipped,
}

/// Result for one record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordResult {
    /// Index of the record in the supplied list.
    pub index: usize,
    /// Page label of the record.
    pub page: PageLabel,
    /// Decision.
    pub outcome: Outcome,
    /// Repairs applied before placement.
    pub corrections: Vec<CorrectionKind>,
    /// Advisories raised while processing.
    pub advisories: Vec<Advisory>,
    /// Id of the inserted marker, when ids are emitted.
    pub marker_id: Option<String>,
    /// Normalized snippet text that was searched for.
    pub snippet_used: String,
    /// Cursor position when the record was processed.
    pub searched_after: DocPosition,
    /// Admissible candidates considered.
    pub candidates: usize,
    /// Occurrences skipped because they lie before the cursor.
    pub rejected_before_cursor: usize,
    /// Similarity of the fuzzy window, for approximate placements.
    pub fuzzy_similarity: Option<f32>,
}

impl RecordResult {
    fn pending(index: usize, record: &SnippetRecord, cursor: DocPosition) -> Self {
        Self {
            index,
            page: record.page().clone(),
            outcome: Outcome::NotFound,
            corrections: Vec::new(),
            advisories: Vec::new(),
            marker_id: None,
            snippet_used: String::new(),
            searched_after: cursor,
            candidates: 0,
            rejected_before_cursor: 0,
            fuzzy_similarity: None,
        }
    }

    /// Insertion point, if placed.
    pub fn position(&self) -> Option<DocPosition> {
        self.outcome.position()
    }

    /// Whether a marker was inserted for this record.
    pub fn is_placed(&self) -> bool {
        self.position().is_some()
    }
}

/// Aggregate counters for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Records processed.
    pub total: usize,
    /// Records that received a marker.
    pub placed: usize,
    /// Records with no occurrence at all.
    pub not_found: usize,
    /// Records whose occurrences all lie behind the cursor.
    pub rejected_out_of_order: usize,
    /// Records with more than one admissible candidate.
    pub multiple_matches: usize,
    /// Context choices that met the threshold.
    pub context_used: usize,
    /// Context choices that fell back to the earliest candidate.
    pub context_fallback: usize,
    /// Records placed after completion or context correction.
    pub corrected: usize,
    /// Records placed by approximate matching.
    pub fuzzy: usize,
    /// Records absent from the reference text that could not be repaired.
    pub correction_skipped: usize,
}

impl RunStats {
    fn from_results(results: &[RecordResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.outcome {
                Outcome::NotFound => stats.not_found += 1,
                Outcome::RejectedOutOfOrder => stats.rejected_out_of_order += 1,
                _ => stats.placed += 1,
            }
            if result.candidates > 1 {
                stats.multiple_matches += 1;
            }
            let fell_back = result
                .advisories
                .iter()
                .any(|a| matches!(a, Advisory::AmbiguousBelowThreshold { .. }));
            if fell_back {
                stats.context_fallback += 1;
            } else if matches!(result.outcome, Outcome::Ambiguous { .. }) {
                stats.context_used += 1;
            }
            if result.advisories.contains(&Advisory::CorrectionSkipped) {
                stats.correction_skipped += 1;
            }
            if result.is_placed() {
                if result.corrections.contains(&CorrectionKind::Fuzzy) {
                    stats.fuzzy += 1;
                } else if !result.corrections.is_empty() {
                    stats.corrected += 1;
                }
            }
        }
        stats
    }
}

/// Results of a marking run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    /// One result per record, in record order.
    pub results: Vec<RecordResult>,
    /// Counters over `results`.
    pub stats: RunStats,
    /// Whether the marker stylesheet was added to `<head>`.
    pub css_injected: bool,
}

impl RunReport {
    /// Records that did not receive a marker.
    pub fn failed(&self) -> impl Iterator<Item = &RecordResult> + '_ {
        self.results.iter().filter(|r| !r.is_placed())
    }

    /// Fraction of records placed, in `[0, 1]`.
    pub fn placement_rate(&self) -> f32 {
        if self.stats.total == 0 {
            return 0.0;
        }
        self.stats.placed as f32 / self.stats.total as f32
    }
}

/// Admissible candidates for one snippet.
struct Search {
    admissible: Vec<MatchCandidate>,
    rejected: usize,
}

struct FuzzyJob {
    index: usize,
    snippet: String,
    floor: DocPosition,
    ceiling: Option<DocPosition>,
}

/// Marking run over one content tree.
pub struct PageMarker<'t> {
    tree: &'t mut ContentTree,
    options: MarkOptions,
    model: TextModel,
    tracker: Tracker,
    ids: MarkerIds,
}

impl<'t> PageMarker<'t> {
    /// Prepare a run over `tree`.
    ///
    /// Containers are collected and marker ids already present in the
    /// document are reserved; no text is flattened until the run starts.
    pub fn new(tree: &'t mut ContentTree, options: MarkOptions) -> Self {
        let model = TextModel::new(tree);
        let ids = MarkerIds::from_tree(tree);
        Self {
            tree,
            options,
            model,
            tracker: Tracker::new(),
            ids,
        }
    }

    /// Place markers for `records` (in page order).
    ///
    /// `reference` overrides the text the corrector checks snippets against;
    /// without one, the tree's own text is used when corrections are enabled.
    /// Empty snippets and out-of-order records abort the run before the tree
    /// is touched.
    pub fn run(
        mut self,
        records: &[SnippetRecord],
        reference: Option<&ReferenceText>,
    ) -> Result<RunReport, PagemarkError> {
        ensure_nonempty(records)?;
        ensure_page_order(records)?;

        let correction = self.options.correction;
        let built;
        let reference = match reference {
            Some(reference) => Some(reference),
            None if correction.completion || correction.context_correction => {
                built = ReferenceText::from_model(&mut self.model, self.tree);
                Some(&built)
            }
            None => None,
        };
        let mut corrector = reference.map(|r| WordBoundaryCorrector::new(r, correction));

        let mut results = Vec::with_capacity(records.len());
        let mut deferred = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let (result, defer) = self.place(index, record, corrector.as_mut());
            if defer {
                deferred.push(index);
            }
            results.push(result);
        }

        if !deferred.is_empty() {
            self.deferred_pass(records, &mut results, &deferred);
        }

        let stats = RunStats::from_results(&results);
        let css_injected =
            self.options.marker.inject_css && stats.placed > 0 && marker::inject_css(self.tree);
        log::info!(
            "Marking finished: {}/{} placed, {} not found, {} rejected out of order",
            stats.placed,
            stats.total,
            stats.not_found,
            stats.rejected_out_of_order
        );
        Ok(RunReport {
            results,
            stats,
            css_injected,
        })
    }

    /// Process one record; the flag asks for a deferred fuzzy retry.
    fn place(
        &mut self,
        index: usize,
        record: &SnippetRecord,
        corrector: Option<&mut WordBoundaryCorrector<'_>>,
    ) -> (RecordResult, bool) {
        let cursor = self.tracker.cursor();
        let mut result = RecordResult::pending(index, record, cursor);
        let label = record.page().as_str();
        let original = SearchSnippet::parse(record.text());

        let mut snippet = original.clone();
        let mut corrections: SmallVec<[CorrectionKind; 2]> = SmallVec::new();
        if let Some(corrector) = corrector {
            let corrected = corrector.correct(&original);
            if corrected.skipped {
                log::debug!("page {}: no correction found for {:?}", label, original.text());
                result.advisories.push(Advisory::CorrectionSkipped);
            }
            corrections = corrected.kinds;
            snippet = corrected.snippet;
        }

        let collect_all = record.has_context();
        let mut search = self.search(&snippet, collect_all);
        if search.admissible.is_empty() && !corrections.is_empty() {
            let retry = self.search(&original, collect_all);
            if !retry.admissible.is_empty() {
                log::debug!("page {}: corrected snippet missing, original used", label);
                search = retry;
                snippet = original;
                corrections.clear();
            }
        }
        result.snippet_used = snippet.text().to_string();
        result.candidates = search.admissible.len();
        result.rejected_before_cursor = search.rejected;

        if search.admissible.is_empty() {
            match self.options.strategy {
                MatchStrategy::ExactThenFuzzy => {
                    let found = self.fuzzy_inline(snippet.text());
                    if let Some(found) = found {
                        corrections.push(CorrectionKind::Fuzzy);
                        result.corrections = corrections.to_vec();
                        result.fuzzy_similarity = Some(found.similarity);
                        self.insert(found.position, &mut result);
                        self.tracker.commit(found.position);
                        result.outcome = Outcome::InsertedAfterCorrection {
                            position: found.position,
                            correction_kind: CorrectionKind::Fuzzy,
                        };
                        log_placed(label, found.position);
                        return (result, false);
                    }
                }
                MatchStrategy::ExactThenDeferredFuzzy => {
                    result.corrections = corrections.to_vec();
                    return (result, true);
                }
                MatchStrategy::Exact => {}
            }
            result.corrections = corrections.to_vec();
            self.resolve_unplaced(&mut result, &snippet, cursor);
            return (result, false);
        }

        let (chosen, ambiguity) = self.choose(record, &search.admissible, &mut result);
        let position = search.admissible[chosen].position();
        self.insert(position, &mut result);
        self.tracker.commit(position);
        result.corrections = corrections.to_vec();
        result.outcome = match (ambiguity, corrections.first()) {
            (Some(score), _) => Outcome::Ambiguous {
                chosen_position: position,
                score,
            },
            (None, Some(kind)) => Outcome::InsertedAfterCorrection {
                position,
                correction_kind: *kind,
            },
            (None, None) => Outcome::Inserted { position },
        };
        log_placed(label, position);
        (result, false)
    }

    /// Candidates from the cursor container onward.
    ///
    /// Without `collect_all` the search stops at the first admissible one.
    fn search(&mut self, snippet: &SearchSnippet, collect_all: bool) -> Search {
        let mut search = Search {
            admissible: Vec::new(),
            rejected: 0,
        };
        if snippet.is_empty() {
            return search;
        }
        let cursor = self.tracker.cursor();
        let limit = self.options.limits.max_candidates.max(1);
        for container in cursor.container..self.model.len() {
            let Some(flat) = self.model.flat(self.tree, container) else {
                continue;
            };
            for candidate in matcher::find(flat, container, snippet) {
                if !self.tracker.admissible(&candidate) {
                    search.rejected += 1;
                    continue;
                }
                search.admissible.push(candidate);
                if !collect_all || search.admissible.len() >= limit {
                    return search;
                }
            }
        }
        search
    }

    /// Index of the chosen candidate and, when context decided, its score.
    fn choose(
        &self,
        record: &SnippetRecord,
        candidates: &[MatchCandidate],
        result: &mut RecordResult,
    ) -> (usize, Option<f32>) {
        if candidates.len() < 2 || !record.has_context() {
            return (0, None);
        }
        let config = &self.options.disambiguation;
        let scores: Vec<f32> = candidates
            .iter()
            .map(|candidate| {
                self.model
                    .get(candidate.container)
                    .map(|flat| {
                        disambiguate::score(
                            flat,
                            candidate,
                            record.context_before(),
                            record.context_after(),
                            config,
                        )
                    })
                    .unwrap_or(0.0)
            })
            .collect();
        match disambiguate::choose(&scores, config) {
            Choice::Scored { index, score } => {
                log::debug!(
                    "page {}: context chose candidate {} of {} (score {:.2})",
                    record.page(),
                    index + 1,
                    candidates.len(),
                    score
                );
                (index, Some(score))
            }
            Choice::Fallback { index, best_score } => {
                log::warn!(
                    "page {}: best context score {:.2} below threshold; using earliest of {} candidates",
                    record.page(),
                    best_score,
                    candidates.len()
                );
                result
                    .advisories
                    .push(Advisory::AmbiguousBelowThreshold { best_score });
                (index, Some(scores.get(index).copied().unwrap_or(0.0)))
            }
            Choice::Earliest { index } => (index, None),
        }
    }

    /// Insert a marker at `position` without touching the tracker.
    fn insert(&mut self, position: DocPosition, result: &mut RecordResult) {
        let Some(flat) = self.model.flat(self.tree, position.container) else {
            return;
        };
        let label = result.page.as_str();
        let id = self
            .options
            .marker
            .emit_ids
            .then(|| self.ids.allocate(label));
        marker::insert_marker(self.tree, flat, position.offset, label, id.as_deref());
        self.model.invalidate(position.container);
        result.marker_id = id;
    }

    fn fuzzy_inline(&mut self, snippet: &str) -> Option<FuzzyMatch> {
        let floor = self.tracker.cursor();
        let last = floor
            .container
            .saturating_add(self.options.fuzzy.max_containers)
            .min(self.model.len());
        for container in floor.container..last {
            let _ = self.model.flat(self.tree, container);
        }
        fuzzy_find(&self.model, snippet, floor, None, &self.options.fuzzy)
    }

    /// Decide between `RejectedOutOfOrder` and `NotFound` for an unplaced record.
    fn resolve_unplaced(
        &mut self,
        result: &mut RecordResult,
        snippet: &SearchSnippet,
        cursor: DocPosition,
    ) {
        let mut before = 0usize;
        let last = cursor.container.min(self.model.len().saturating_sub(1));
        if !snippet.is_empty() && !self.model.is_empty() {
            for container in 0..=last {
                let Some(flat) = self.model.flat(self.tree, container) else {
                    continue;
                };
                before += matcher::find(flat, container, snippet)
                    .iter()
                    .filter(|candidate| candidate.position() < cursor)
                    .count();
            }
        }
        result.rejected_before_cursor = before;
        if before > 0 {
            log::warn!(
                "page {}: {} occurrence(s) of {:?} precede the cursor ({}:{}); rejected",
                result.page,
                before,
                snippet.text(),
                cursor.container,
                cursor.offset
            );
            result.outcome = Outcome::RejectedOutOfOrder;
        } else {
            log::warn!("page {}: snippet {:?} not found", result.page, snippet.text());
            result.outcome = Outcome::NotFound;
        }
    }

    /// Fuzzy retry of deferred records between their placed neighbors.
    fn deferred_pass(
        &mut self,
        records: &[SnippetRecord],
        results: &mut [RecordResult],
        deferred: &[usize],
    ) {
        self.model.ensure_all(self.tree);
        let mut positions: Vec<Option<DocPosition>> =
            results.iter().map(RecordResult::position).collect();

        let jobs: Vec<FuzzyJob> = deferred
            .iter()
            .map(|&index| FuzzyJob {
                index,
                snippet: results[index].snippet_used.clone(),
                floor: results[index].searched_after,
                ceiling: positions[index + 1..].iter().flatten().next().copied(),
            })
            .collect();

        let model = &self.model;
        let config = self.options.fuzzy;
        let run_job = |job: &FuzzyJob| fuzzy_find(model, &job.snippet, job.floor, job.ceiling, &config);
        #[cfg(feature = "parallel")]
        let found: Vec<Option<FuzzyMatch>> = {
            use rayon::prelude::*;
            jobs.par_iter().map(run_job).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let found: Vec<Option<FuzzyMatch>> = jobs.iter().map(run_job).collect();

        for (job, found) in jobs.iter().zip(found) {
            let index = job.index;
            let lower = positions[..index].iter().flatten().max().copied();
            let upper = positions[index + 1..].iter().flatten().min().copied();
            let fits = |position: DocPosition| {
                lower.is_none_or(|l| position >= l) && upper.is_none_or(|u| position <= u)
            };
            let result = &mut results[index];
            match found {
                Some(found) if fits(found.position) => {
                    self.insert(found.position, result);
                    positions[index] = Some(found.position);
                    result.corrections.push(CorrectionKind::Fuzzy);
                    result.fuzzy_similarity = Some(found.similarity);
                    result.outcome = Outcome::InsertedAfterCorrection {
                        position: found.position,
                        correction_kind: CorrectionKind::Fuzzy,
                    };
                    log_placed(records[index].page().as_str(), found.position);
                }
                _ => {
                    let snippet = SearchSnippet::parse(records[index].text());
                    self.resolve_unplaced(result, &snippet, job.floor);
                }
            }
        }
    }
}

fn log_placed(label: &str, position: DocPosition) {
    log::info!(
        "page {}: marker inserted (container {}:{})",
        label,
        position.container,
        position.offset
    );
}

/// Parse-free convenience wrapper: mark `tree` with default reference handling.
pub fn mark_document(
    tree: &mut ContentTree,
    records: &[SnippetRecord],
    options: MarkOptions,
) -> Result<RunReport, PagemarkError> {
    PageMarker::new(tree, options).run(records, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_only() -> MarkOptions {
        MarkOptions::default().with_correction(CorrectionConfig::disabled())
    }

    #[test]
    fn places_a_unique_snippet() {
        let mut tree = ContentTree::parse("<p>When the trees were young.</p>").expect("parse");
        let report = mark_document(
            &mut tree,
            &[SnippetRecord::new("5", "the trees were")],
            exact_only(),
        )
        .expect("run should succeed");
        assert_eq!(
            report.results[0].outcome,
            Outcome::Inserted {
                position: DocPosition::new(0, "When the trees were".len())
            }
        );
        assert_eq!(report.results[0].marker_id.as_deref(), Some("page5"));
        assert_eq!(report.stats.placed, 1);
    }

    #[test]
    fn out_of_order_records_abort_before_mutation() {
        let source = "<p>a b c</p>";
        let mut tree = ContentTree::parse(source).expect("parse");
        let records = [SnippetRecord::new("2", "b"), SnippetRecord::new("1", "a")];
        let err = mark_document(&mut tree, &records, exact_only()).expect_err("should abort");
        assert_eq!(err.code, "RECORDS_OUT_OF_ORDER");
        assert_eq!(tree.to_xhtml(), source);
    }

    #[test]
    fn earlier_occurrences_are_rejected() {
        let mut tree = ContentTree::parse("<p>alpha beta</p><p>gamma</p>").expect("parse");
        let records = [SnippetRecord::new("1", "gamma"), SnippetRecord::new("2", "alpha")];
        let report = mark_document(&mut tree, &records, exact_only()).expect("run");
        assert!(report.results[0].is_placed());
        assert_eq!(report.results[1].outcome, Outcome::RejectedOutOfOrder);
        assert_eq!(report.results[1].rejected_before_cursor, 1);
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn missing_snippets_are_not_found() {
        let mut tree = ContentTree::parse("<p>alpha</p>").expect("parse");
        let report =
            mark_document(&mut tree, &[SnippetRecord::new("1", "omega")], exact_only()).expect("run");
        assert_eq!(report.results[0].outcome, Outcome::NotFound);
        assert_eq!(report.stats.not_found, 1);
        assert_eq!(tree.to_xhtml(), "<p>alpha</p>");
    }

    #[test]
    fn inline_fuzzy_places_near_misses() {
        let mut tree =
            ContentTree::parse("<p>The old house stood on the hill.</p>").expect("parse");
        let options = exact_only().with_strategy(MatchStrategy::ExactThenFuzzy);
        let report =
            mark_document(&mut tree, &[SnippetRecord::new("3", "the old hause stood")], options)
                .expect("run");
        assert_eq!(
            report.results[0].outcome,
            Outcome::InsertedAfterCorrection {
                position: DocPosition::new(0, "The old house stood".len()),
                correction_kind: CorrectionKind::Fuzzy,
            }
        );
        assert_eq!(report.stats.fuzzy, 1);
    }

    #[test]
    fn deferred_fuzzy_stays_between_neighbors() {
        let mut tree = ContentTree::parse(
            "<p>first page ends here</p><p>the old house stood</p><p>third page ends</p><p>the old house stood</p>",
        )
        .expect("parse");
        let records = [
            SnippetRecord::new("1", "first page ends here"),
            SnippetRecord::new("2", "the old hause stood"),
            SnippetRecord::new("3", "third page ends"),
        ];
        let options = exact_only().with_strategy(MatchStrategy::ExactThenDeferredFuzzy);
        let report = mark_document(&mut tree, &records, options).expect("run");
        let positions: Vec<Option<DocPosition>> =
            report.results.iter().map(RecordResult::position).collect();
        assert_eq!(positions[1], Some(DocPosition::new(1, "the old house stood".len())));
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn fallback_reports_the_chosen_candidates_score() {
        let mut tree = ContentTree::parse(
            "<p>the key phrase q1 q2 q3 q4 q5</p><p>the key phrase delta z1 z2 z3 z4</p>",
        )
        .expect("parse");
        let record = SnippetRecord::new("9", "the key phrase")
            .with_context_after("x1 x2 x3 x4 delta");
        let report = mark_document(&mut tree, &[record], exact_only()).expect("run");
        let result = &report.results[0];
        assert_eq!(
            result.outcome,
            Outcome::Ambiguous {
                chosen_position: DocPosition::new(0, "the key phrase".len()),
                score: 0.0,
            }
        );
        match result.advisories.as_slice() {
            [Advisory::AmbiguousBelowThreshold { best_score }] => {
                assert!((best_score - 1.0 / 9.0).abs() < 1e-6, "{}", best_score)
            }
            other => panic!("unexpected advisories {:?}", other),
        }
    }

    #[test]
    fn css_is_injected_only_when_requested() {
        let source = "<html><head></head><body><p>x y</p></body></html>";
        let mut tree = ContentTree::parse(source).expect("parse");
        let options = exact_only().with_marker(MarkerConfig {
            emit_ids: false,
            inject_css: true,
        });
        let report = mark_document(&mut tree, &[SnippetRecord::new("1", "x")], options).expect("run");
        assert!(report.css_injected);
        let out = tree.to_xhtml();
        assert!(out.contains(".page-number {"));
        assert!(out.contains("<span class=\"page-number\" role=\"note\" aria-label=\"Page 1\">1</span>"));
    }
}
