//! Page marker elements: construction, id allocation, and insertion.

use std::collections::BTreeSet;

use crate::text_model::FlattenedText;
use crate::tree::{ContentTree, NodeId, NodeKind};

/// Class carried by every inserted marker.
pub const MARKER_CLASS: &str = "page-number";

const MARKER_CSS: &str = "\n.page-number {\n    display: inline-block;\n    background-color: #e0e0e0;\n    color: #333;\n    padding: 2px 6px;\n    margin: 0 4px;\n    border-radius: 3px;\n    font-size: 0.85em;\n    font-weight: bold;\n    vertical-align: middle;\n}\n";

/// Marker output options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerConfig {
    /// Emit an `id` attribute on each marker.
    pub emit_ids: bool,
    /// Append a `<style>` block for `.page-number` to `<head>` after a run.
    pub inject_css: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            emit_ids: true,
            inject_css: false,
        }
    }
}

/// Unique marker id allocator seeded with the document's existing ids.
#[derive(Clone, Debug, Default)]
pub struct MarkerIds {
    used: BTreeSet<String>,
}

impl MarkerIds {
    /// Allocator that avoids every `id` already present in `tree`.
    pub fn from_tree(tree: &ContentTree) -> Self {
        Self {
            used: tree.id_values(),
        }
    }

    /// Next free id for `label`: `page{label}`, then `page{label}-2`, ...
    pub fn allocate(&mut self, label: &str) -> String {
        let base = format!("page{}", label);
        let mut candidate = base.clone();
        let mut n = 2usize;
        while self.used.contains(&candidate) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Insert a marker for `label` at original offset `offset` of `flat`.
///
/// The text node covering the offset is split (on the source position of
/// the decoded character, never inside an entity) and the marker goes
/// between the halves. At a node edge no split happens and no empty text
/// node is created. A container without text gets the marker as its last
/// child. The caller must invalidate the container's flattened text.
pub fn insert_marker(
    tree: &mut ContentTree,
    flat: &FlattenedText,
    offset: usize,
    label: &str,
    id: Option<&str>,
) -> NodeId {
    let aria_label = format!("Page {}", label);
    let mut attributes = vec![
        ("class", MARKER_CLASS),
        ("role", "note"),
        ("aria-label", aria_label.as_str()),
    ];
    if let Some(id) = id {
        attributes.push(("id", id));
    }
    let marker = tree.create_element("span", &attributes, Some(label));

    let Some((node, in_node)) = flat.locate(offset) else {
        tree.append_child(flat.container(), marker);
        return marker;
    };
    if in_node == 0 {
        // Lands after any marker already placed before `node`.
        tree.insert_before(node, marker);
        return marker;
    }
    let node_len = tree.text(node).map(|t| t.text().len()).unwrap_or(0);
    if in_node < node_len {
        // Tail half is attached after `node`; the marker goes between.
        let _ = tree.split_text(node, in_node);
    }
    // Markers already placed at this point keep their order.
    let mut anchor = node;
    while let Some(next) = tree.next_sibling(anchor) {
        if !tree.element(next).is_some_and(|e| e.has_class(MARKER_CLASS)) {
            break;
        }
        anchor = next;
    }
    tree.insert_after(anchor, marker);
    marker
}

/// Append the marker stylesheet to `<head>`.
///
/// Returns `false` when the document has no `head` or already carries a
/// `.page-number` rule.
pub fn inject_css(tree: &mut ContentTree) -> bool {
    let Some(head) = tree.find_element("head") else {
        return false;
    };
    let has_rule = tree.children(head).iter().any(|child| match tree.kind(*child) {
        NodeKind::Raw(raw) => raw.starts_with("<style") && raw.contains(".page-number"),
        NodeKind::Element(e) => {
            e.name() == "style" && tree.text_content(*child).contains(".page-number")
        }
        _ => false,
    });
    if has_rule {
        return false;
    }
    let style = tree.create_raw(&format!("<style type=\"text/css\">{}</style>", MARKER_CSS));
    tree.append_child(head, style);
    true
}
