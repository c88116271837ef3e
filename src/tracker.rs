//! Monotonic document-order cursor.

use serde::Serialize;

use crate::matcher::MatchCandidate;

/// Position in document order: container index, then byte offset into that
/// container's original text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocPosition {
    /// Container index in document order.
    pub container: usize,
    /// Byte offset into the container's flattened original text.
    pub offset: usize,
}

impl DocPosition {
    /// Build a position.
    pub fn new(container: usize, offset: usize) -> Self {
        Self { container, offset }
    }
}

/// Single cursor threaded through a marking run.
///
/// Candidates whose insertion point lies before the cursor are rejected.
/// Equal positions are admissible so two records with the same label can
/// land at the same point.
#[derive(Clone, Debug, Default)]
pub struct Tracker {
    cursor: DocPosition,
    commits: usize,
}

impl Tracker {
    /// Tracker positioned at the start of the document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor.
    pub fn cursor(&self) -> DocPosition {
        self.cursor
    }

    /// Number of committed placements.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Whether `position` may be used.
    pub fn admits(&self, position: DocPosition) -> bool {
        position >= self.cursor
    }

    /// Whether `candidate`'s insertion point may be used.
    pub fn admissible(&self, candidate: &MatchCandidate) -> bool {
        self.admits(candidate.position())
    }

    /// Advance the cursor to `position`.
    ///
    /// Returns `false` and leaves the cursor unchanged if `position` lies
    /// before it.
    pub fn commit(&mut self, position: DocPosition) -> bool {
        if position < self.cursor {
            log::warn!(
                "Refusing to move cursor backwards ({}:{} < {}:{})",
                position.container,
                position.offset,
                self.cursor.container,
                self.cursor.offset
            );
            return false;
        }
        self.cursor = position;
        self.commits += 1;
        true
    }
}
