//! Flattened per-container text with offset tables back into the tree.

use crate::marker::MARKER_CLASS;
use crate::normalize::{normalize_mapped, NormalizedText};
use crate::tree::{ContentTree, NodeId};

/// Byte range `[start, end)` of `original` contributed by one text node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeSpan {
    /// Text node that produced this range.
    pub node: NodeId,
    /// Start offset in the flattened original text.
    pub start: usize,
    /// End offset (exclusive) in the flattened original text.
    pub end: usize,
}

/// Markup-stripped view of one container.
#[derive(Clone, Debug)]
pub struct FlattenedText {
    container: NodeId,
    original: String,
    spans: Vec<NodeSpan>,
    breaks: Vec<usize>,
    normalized: NormalizedText,
}

impl FlattenedText {
    /// Flatten the descendant text of `container`.
    ///
    /// Inline elements are transparent. `script`/`style` subtrees and
    /// previously inserted page markers contribute nothing, so the text of a
    /// container does not change when markers are added to it. A `<br>`
    /// acts as a word separator in the normalized view.
    pub fn flatten(tree: &ContentTree, container: NodeId) -> Self {
        let mut original = String::new();
        let mut spans = Vec::new();
        let mut breaks = Vec::new();
        let mut stack = vec![container];

        while let Some(id) = stack.pop() {
            if let Some(text) = tree.text(id) {
                let start = original.len();
                original.push_str(text.text());
                spans.push(NodeSpan {
                    node: id,
                    start,
                    end: original.len(),
                });
                continue;
            }
            if let Some(element) = tree.element(id) {
                if id != container
                    && (matches!(element.name(), "script" | "style")
                        || element.has_class(MARKER_CLASS))
                {
                    continue;
                }
                if element.name() == "br" {
                    breaks.push(original.len());
                }
            }
            stack.extend(tree.children(id).iter().rev().copied());
        }

        let normalized = normalize_mapped(&original, &breaks);
        Self {
            container,
            original,
            spans,
            breaks,
            normalized,
        }
    }

    /// Container element this text belongs to.
    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Concatenated decoded text.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Normalized text used for matching.
    pub fn normalized(&self) -> &str {
        &self.normalized.text
    }

    /// Text node spans in document order.
    pub fn spans(&self) -> &[NodeSpan] {
        &self.spans
    }

    /// Original offsets of `<br>` separators.
    pub fn breaks(&self) -> &[usize] {
        &self.breaks
    }

    pub(crate) fn mapping(&self) -> &NormalizedText {
        &self.normalized
    }

    /// Resolve an original offset to `(text node, offset within node)`.
    ///
    /// The node whose span satisfies `start < offset <= end` wins, so an
    /// offset at a run boundary attaches to the end of the preceding run.
    /// Offset 0 resolves to the start of the first text node.
    pub fn locate(&self, offset: usize) -> Option<(NodeId, usize)> {
        if offset == 0 {
            return self.spans.first().map(|span| (span.node, 0));
        }
        self.spans
            .iter()
            .find(|span| span.start < offset && offset <= span.end)
            .map(|span| (span.node, offset - span.start))
    }
}

/// Lazily built flattened text for every container of a tree.
#[derive(Clone, Debug)]
pub struct TextModel {
    containers: Vec<NodeId>,
    cache: Vec<Option<FlattenedText>>,
}

impl TextModel {
    /// Collect the containers of `tree`; nothing is flattened yet.
    pub fn new(tree: &ContentTree) -> Self {
        let containers = tree.containers();
        let cache = vec![None; containers.len()];
        Self { containers, cache }
    }

    /// Number of containers.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Whether the tree has no containers.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Container element at `index`.
    pub fn container(&self, index: usize) -> Option<NodeId> {
        self.containers.get(index).copied()
    }

    /// Flattened text of container `index`, built on first access.
    pub fn flat(&mut self, tree: &ContentTree, index: usize) -> Option<&FlattenedText> {
        let container = *self.containers.get(index)?;
        let slot = self.cache.get_mut(index)?;
        Some(slot.get_or_insert_with(|| FlattenedText::flatten(tree, container)))
    }

    /// Cached flattened text of container `index`, if already built.
    pub fn get(&self, index: usize) -> Option<&FlattenedText> {
        self.cache.get(index).and_then(Option::as_ref)
    }

    /// Drop the cached text of container `index` after a mutation.
    pub fn invalidate(&mut self, index: usize) {
        if let Some(slot) = self.cache.get_mut(index) {
            *slot = None;
        }
    }

    /// Build every container's flattened text.
    pub fn ensure_all(&mut self, tree: &ContentTree) {
        for (slot, container) in self.cache.iter_mut().zip(self.containers.iter()) {
            if slot.is_none() {
                *slot = Some(FlattenedText::flatten(tree, *container));
            }
        }
    }
}
