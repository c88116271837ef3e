//! Arena-backed XHTML content tree.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`].
//! Parent links are plain indices (non-owning back-references); each node's
//! `children` vector owns the ordering of its subtree.
//!
//! Every token keeps its verbatim source text. Serializing an unmodified tree
//! reproduces the input byte for byte, and serializing a marked tree differs
//! from the input only at the points where markers were inserted.

use core::fmt;
use std::collections::BTreeSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{ErrorPhase, PagemarkError};

/// Compact node identifier (index into the arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Arena index of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Limits for tree construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeLimits {
    /// Maximum accepted source size in bytes.
    pub max_input_bytes: usize,
    /// Maximum number of arena nodes.
    pub max_nodes: usize,
    /// Maximum element nesting depth.
    pub max_depth: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 16 * 1024 * 1024,
            max_nodes: 1 << 22,
            max_depth: 256,
        }
    }
}

impl TreeLimits {
    /// Smaller bounds for constrained environments.
    pub fn embedded() -> Self {
        Self {
            max_input_bytes: 2 * 1024 * 1024,
            max_nodes: 1 << 18,
            max_depth: 64,
        }
    }
}

/// Element attribute with its decoded name and value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Attribute value as written (entities are not expanded).
    pub value: String,
}

/// Element payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    start_tag: String,
    end_tag: Option<String>,
}

impl Element {
    /// Lowercased local name (namespace prefix stripped).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed attributes in source order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of the first attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Whether the whitespace-separated `class` list contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    /// Verbatim start tag source.
    pub fn start_tag(&self) -> &str {
        &self.start_tag
    }
}

/// Text payload: verbatim escaped source plus its decoded form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextNode {
    raw: String,
    text: String,
    /// Source offset in `raw` for every decoded byte offset, plus one past the end.
    raw_at: Vec<usize>,
}

impl TextNode {
    fn from_raw(raw: String) -> Self {
        let (text, raw_at) = decode_text(&raw);
        Self { raw, text, raw_at }
    }

    fn from_decoded(text: &str) -> Self {
        Self::from_raw(quick_xml::escape::partial_escape(text).into_owned())
    }

    /// Decoded text content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Verbatim source text (entities intact).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn raw_offset(&self, decoded_offset: usize) -> usize {
        self.raw_at
            .get(decoded_offset)
            .copied()
            .unwrap_or(self.raw.len())
    }
}

/// Node payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root (exactly one, at index 0).
    Document,
    /// Element with attributes and children.
    Element(Element),
    /// Character data.
    Text(TextNode),
    /// Opaque token kept verbatim: comment, doctype, declaration, processing
    /// instruction, CDATA section, stray end tag, or injected markup.
    Raw(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutable XHTML document tree.
#[derive(Clone, Debug)]
pub struct ContentTree {
    nodes: Vec<Node>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Block elements that bound a snippet search.
pub const CONTAINER_TAGS: &[&str] = &[
    "p",
    "div",
    "td",
    "th",
    "li",
    "dd",
    "dt",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "aside",
    "article",
    "section",
    "figcaption",
    "caption",
    "pre",
];

/// Whether `tag` names a container element.
pub fn is_container_tag(tag: &str) -> bool {
    CONTAINER_TAGS.contains(&tag)
}

/// Whether text under `tag` is never rendered as content.
pub fn is_skipped_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "head" | "noscript" | "template")
}

impl ContentTree {
    /// Parse an XHTML document with default limits.
    pub fn parse(source: &str) -> Result<Self, PagemarkError> {
        Self::parse_with_limits(source, TreeLimits::default())
    }

    /// Parse an XHTML document with explicit limits.
    ///
    /// Unclosed elements are closed implicitly at the end of their parent;
    /// end tags without a matching open element are kept as raw tokens.
    /// Malformed markup is a fatal [`PagemarkError`].
    pub fn parse_with_limits(source: &str, limits: TreeLimits) -> Result<Self, PagemarkError> {
        if source.len() > limits.max_input_bytes {
            return Err(PagemarkError::new(
                ErrorPhase::Parse,
                "TREE_LIMIT_EXCEEDED",
                format!(
                    "Document exceeds max_input_bytes ({} > {})",
                    source.len(),
                    limits.max_input_bytes
                ),
            )
            .with_limit("max_input_bytes", source.len(), limits.max_input_bytes));
        }

        let mut tree = Self {
            nodes: Vec::with_capacity(source.len() / 16 + 1),
        };
        tree.nodes.push(Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
        });

        let mut reader = Reader::from_str(source);
        {
            let config = reader.config_mut();
            config.trim_text(false);
            config.check_end_names = false;
            config.allow_unmatched_ends = true;
            config.expand_empty_elements = false;
        }

        let mut stack: Vec<NodeId> = Vec::with_capacity(32);
        let mut pending_text: Option<(usize, usize)> = None;

        loop {
            let start = reader_offset(&reader);
            let event = reader.read_event().map_err(|err| {
                PagemarkError::new(
                    ErrorPhase::Parse,
                    "TREE_TOKENIZE_ERROR",
                    format!("XML error: {:?}", err),
                )
                .with_token_offset(reader_offset(&reader))
            })?;
            let end = reader_offset(&reader);
            let raw = &source[start..end];
            let parent = stack.last().copied().unwrap_or(ContentTree::ROOT);

            match event {
                Event::Text(_) | Event::GeneralRef(_) => {
                    pending_text = Some(match pending_text {
                        Some((text_start, _)) => (text_start, end),
                        None => (start, end),
                    });
                    continue;
                }
                Event::Eof => {
                    tree.flush_text(source, &mut pending_text, parent, limits)?;
                    break;
                }
                _ => tree.flush_text(source, &mut pending_text, parent, limits)?,
            }

            match event {
                Event::Start(e) => {
                    let element = element_from_start(&reader, &e, raw, start)?;
                    let is_void = VOID_ELEMENTS.contains(&element.name.as_str());
                    let id = tree.push_node(NodeKind::Element(element), parent, limits)?;
                    if !is_void {
                        if stack.len() >= limits.max_depth {
                            return Err(PagemarkError::new(
                                ErrorPhase::Parse,
                                "TREE_LIMIT_EXCEEDED",
                                format!(
                                    "Element nesting exceeds max_depth ({} > {})",
                                    stack.len() + 1,
                                    limits.max_depth
                                ),
                            )
                            .with_limit("max_depth", stack.len() + 1, limits.max_depth)
                            .with_token_offset(start));
                        }
                        stack.push(id);
                    }
                }
                Event::Empty(e) => {
                    let element = element_from_start(&reader, &e, raw, start)?;
                    tree.push_node(NodeKind::Element(element), parent, limits)?;
                }
                Event::End(e) => {
                    let name = decode_tag_name(&reader, e.name().as_ref(), start)?;
                    let open_idx = stack.iter().rposition(|id| {
                        tree.element(*id)
                            .is_some_and(|element| element.name == name)
                    });
                    match open_idx {
                        Some(idx) => {
                            let id = stack[idx];
                            stack.truncate(idx);
                            if let NodeKind::Element(element) = &mut tree.nodes[id.index()].kind {
                                element.end_tag = Some(raw.to_string());
                            }
                        }
                        None => {
                            log::warn!("Unmatched end tag </{}> at offset {}; kept verbatim", name, start);
                            tree.push_node(NodeKind::Raw(raw.to_string()), parent, limits)?;
                        }
                    }
                }
                _ => {
                    tree.push_node(NodeKind::Raw(raw.to_string()), parent, limits)?;
                }
            }
        }

        Ok(tree)
    }

    /// Root document node.
    pub const ROOT: NodeId = NodeId(0);

    fn flush_text(
        &mut self,
        source: &str,
        pending: &mut Option<(usize, usize)>,
        parent: NodeId,
        limits: TreeLimits,
    ) -> Result<(), PagemarkError> {
        if let Some((start, end)) = pending.take() {
            let node = TextNode::from_raw(source[start..end].to_string());
            self.push_node(NodeKind::Text(node), parent, limits)?;
        }
        Ok(())
    }

    fn push_node(
        &mut self,
        kind: NodeKind,
        parent: NodeId,
        limits: TreeLimits,
    ) -> Result<NodeId, PagemarkError> {
        if self.nodes.len() >= limits.max_nodes {
            return Err(PagemarkError::new(
                ErrorPhase::Parse,
                "TREE_LIMIT_EXCEEDED",
                format!("Document exceeds max_nodes ({})", limits.max_nodes),
            )
            .with_limit("max_nodes", self.nodes.len() + 1, limits.max_nodes));
        }
        let id = self.alloc(kind);
        self.nodes[id.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Number of arena nodes (detached nodes included).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node payload.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Parent of `id` (`None` for the root).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Children of `id` in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Following sibling of `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Element payload, if `id` is an element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.index()].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Text payload, if `id` is a text node.
    pub fn text(&self, id: NodeId) -> Option<&TextNode> {
        match &self.nodes[id.index()].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Pre-order traversal of the subtree rooted at `id` (inclusive).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Concatenated decoded text of the subtree rooted at `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text.text());
            }
        }
        out
    }

    /// Elements carrying `class` in document order.
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(Self::ROOT)
            .filter(|id| self.element(*id).is_some_and(|e| e.has_class(class)))
            .collect()
    }

    /// First element named `name` in document order.
    pub fn find_element(&self, name: &str) -> Option<NodeId> {
        self.descendants(Self::ROOT)
            .find(|id| self.element(*id).is_some_and(|e| e.name == name))
    }

    /// All `id` attribute values present in the document.
    pub fn id_values(&self) -> BTreeSet<String> {
        self.descendants(Self::ROOT)
            .filter_map(|id| self.element(id).and_then(|e| e.attribute("id")))
            .map(str::to_string)
            .collect()
    }

    /// Leaf block containers in document order.
    ///
    /// A container is an element from [`CONTAINER_TAGS`] that has no
    /// container descendant and is not inside `head`, `script`, or `style`.
    pub fn containers(&self) -> Vec<NodeId> {
        let order: Vec<NodeId> = self.content_preorder().collect();
        let mut has_container_below = vec![false; self.nodes.len()];
        for id in order.iter().rev() {
            let is_container = self
                .element(*id)
                .is_some_and(|e| is_container_tag(&e.name));
            if is_container || has_container_below[id.index()] {
                if let Some(parent) = self.parent(*id) {
                    has_container_below[parent.index()] = true;
                }
            }
        }
        order
            .into_iter()
            .filter(|id| {
                self.element(*id).is_some_and(|e| is_container_tag(&e.name))
                    && !has_container_below[id.index()]
            })
            .collect()
    }

    /// Pre-order traversal that does not descend into skipped elements.
    fn content_preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![Self::ROOT];
        core::iter::from_fn(move || {
            let id = stack.pop()?;
            let skip = self.element(id).is_some_and(|e| is_skipped_tag(&e.name));
            if !skip {
                stack.extend(self.children(id).iter().rev().copied());
            }
            Some(id)
        })
    }

    /// Create a detached element with the given attributes and text content.
    ///
    /// Attribute values are escaped when the start tag is generated.
    pub(crate) fn create_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: Option<&str>,
    ) -> NodeId {
        let mut start_tag = String::with_capacity(64);
        start_tag.push('<');
        start_tag.push_str(name);
        for (key, value) in attributes {
            start_tag.push(' ');
            start_tag.push_str(key);
            start_tag.push_str("=\"");
            start_tag.push_str(&quick_xml::escape::escape(*value));
            start_tag.push('"');
        }
        start_tag.push('>');
        let element = Element {
            name: name.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(key, value)| Attribute {
                    name: key.to_ascii_lowercase(),
                    value: (*value).to_string(),
                })
                .collect(),
            start_tag,
            end_tag: Some(format!("</{}>", name)),
        };
        let id = self.alloc(NodeKind::Element(element));
        if let Some(text) = text {
            let text_id = self.alloc(NodeKind::Text(TextNode::from_decoded(text)));
            self.nodes[text_id.index()].parent = Some(id);
            self.nodes[id.index()].children.push(text_id);
        }
        id
    }

    /// Create a detached raw node emitted verbatim.
    pub(crate) fn create_raw(&mut self, raw: &str) -> NodeId {
        self.alloc(NodeKind::Raw(raw.to_string()))
    }

    /// Attach detached `node` immediately after `sibling`.
    pub(crate) fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        self.insert_relative(sibling, node, 1);
    }

    /// Attach detached `node` immediately before `sibling`.
    pub(crate) fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        self.insert_relative(sibling, node, 0);
    }

    fn insert_relative(&mut self, sibling: NodeId, node: NodeId, delta: usize) {
        let Some(parent) = self.parent(sibling) else {
            return;
        };
        let siblings = &mut self.nodes[parent.index()].children;
        let Some(pos) = siblings.iter().position(|id| *id == sibling) else {
            return;
        };
        siblings.insert(pos + delta, node);
        self.nodes[node.index()].parent = Some(parent);
    }

    /// Attach detached `node` as the last child of `parent`.
    pub(crate) fn append_child(&mut self, parent: NodeId, node: NodeId) {
        self.nodes[parent.index()].children.push(node);
        self.nodes[node.index()].parent = Some(parent);
    }

    /// Split text node `id` at decoded byte offset `at`.
    ///
    /// `id` keeps the text before the split; the returned node holds the rest
    /// and is attached right after `id`. The split lands on the source offset
    /// of the decoded character, so entity references are never cut. Returns
    /// `None` when `id` is not a text node or `at` is not an interior offset.
    pub(crate) fn split_text(&mut self, id: NodeId, at: usize) -> Option<NodeId> {
        let (head_raw, tail_raw) = {
            let text = self.text(id)?;
            if at == 0 || at >= text.text.len() || !text.text.is_char_boundary(at) {
                return None;
            }
            let raw_at = text.raw_offset(at);
            if raw_at == 0 || raw_at >= text.raw.len() {
                return None;
            }
            (
                text.raw[..raw_at].to_string(),
                text.raw[raw_at..].to_string(),
            )
        };
        self.nodes[id.index()].kind = NodeKind::Text(TextNode::from_raw(head_raw));
        let tail = self.alloc(NodeKind::Text(TextNode::from_raw(tail_raw)));
        self.insert_after(id, tail);
        Some(tail)
    }

    /// Serialize the tree back to markup.
    pub fn to_xhtml(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 16);
        self.write_node(Self::ROOT, &mut out);
        out
    }

    fn write_node(&self, root: NodeId, out: &mut String) {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }
        let mut steps = vec![Step::Open(root)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Open(id) => {
                    match &self.nodes[id.index()].kind {
                        NodeKind::Document => {}
                        NodeKind::Element(element) => out.push_str(&element.start_tag),
                        NodeKind::Text(text) => out.push_str(&text.raw),
                        NodeKind::Raw(raw) => out.push_str(raw),
                    }
                    steps.push(Step::Close(id));
                    steps.extend(self.children(id).iter().rev().map(|c| Step::Open(*c)));
                }
                Step::Close(id) => {
                    if let NodeKind::Element(element) = &self.nodes[id.index()].kind {
                        if let Some(end_tag) = &element.end_tag {
                            out.push_str(end_tag);
                        }
                    }
                }
            }
        }
    }

    /// Serialize the subtree rooted at `id`.
    pub fn outer_xhtml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    tree: &'a ContentTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

fn reader_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(
    reader: &Reader<&[u8]>,
    raw: &[u8],
    offset: usize,
) -> Result<String, PagemarkError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        PagemarkError::new(
            ErrorPhase::Parse,
            "TREE_DECODE_ERROR",
            format!("Decode error: {:?}", err),
        )
        .with_token_offset(offset)
    })?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

fn element_from_start(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    raw: &str,
    offset: usize,
) -> Result<Element, PagemarkError> {
    let name = decode_tag_name(reader, e.name().as_ref(), offset)?;
    let mut attributes = Vec::new();
    for attr in e.html_attributes().flatten() {
        let key = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(v) => v.to_ascii_lowercase(),
            Err(_) => continue,
        };
        let value = match reader.decoder().decode(&attr.value) {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        attributes.push(Attribute { name: key, value });
    }
    Ok(Element {
        name,
        attributes,
        start_tag: raw.to_string(),
        end_tag: None,
    })
}

/// Decode escaped text, returning the decoded string and a map from each
/// decoded byte offset to the source offset where its character starts.
fn decode_text(raw: &str) -> (String, Vec<usize>) {
    let mut text = String::with_capacity(raw.len());
    let mut raw_at = Vec::with_capacity(raw.len() + 1);
    let mut pos = 0usize;
    while pos < raw.len() {
        let rest = &raw[pos..];
        if rest.starts_with('&') {
            if let Some((decoded, consumed)) = resolve_reference(rest) {
                text.push_str(&decoded);
                raw_at.extend(core::iter::repeat(pos).take(decoded.len()));
                pos += consumed;
                continue;
            }
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        text.push(ch);
        raw_at.extend(core::iter::repeat(pos).take(ch.len_utf8()));
        pos += ch.len_utf8();
    }
    raw_at.push(raw.len());
    (text, raw_at)
}

/// Resolve a character or entity reference at the start of `rest`.
fn resolve_reference(rest: &str) -> Option<(String, usize)> {
    let semi = rest.char_indices().take(40).find(|(_, c)| *c == ';')?.0;
    let reference = &rest[..=semi];
    let decoded = match quick_xml::escape::unescape(reference) {
        Ok(decoded) => decoded,
        Err(_) => {
            quick_xml::escape::unescape_with(reference, quick_xml::escape::resolve_html5_entity)
                .ok()?
        }
    };
    Some((decoded.into_owned(), reference.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Test</title><style>p { color: red; }</style></head>
<body>
  <!-- comment -->
  <p class="first" id="p1">This has <i>italic   text</i> in it &amp; more.</p>
  <div><p>Nested &#x3b1; paragraph<br/>next line</p></div>
  <table><tr><td>cell one</td><td>cell <b>two</b></td></tr></table>
</body>
</html>"#;

    #[test]
    fn round_trip_is_byte_identical() {
        let tree = ContentTree::parse(SAMPLE).expect("parse should succeed");
        assert_eq!(tree.to_xhtml(), SAMPLE);
    }

    #[test]
    fn containers_are_leaf_blocks_in_document_order() {
        let tree = ContentTree::parse(SAMPLE).expect("parse should succeed");
        let containers = tree.containers();
        let texts: Vec<String> = containers.iter().map(|id| tree.text_content(*id)).collect();
        assert_eq!(
            texts,
            vec![
                "This has italic   text in it & more.",
                "Nested α paragraphnext line",
                "cell one",
                "cell two",
            ]
        );
    }

    #[test]
    fn head_content_is_never_a_container() {
        let tree = ContentTree::parse("<html><head><style>div{}</style></head><body><p>x</p></body></html>")
            .expect("parse should succeed");
        assert_eq!(tree.containers().len(), 1);
    }

    #[test]
    fn decode_maps_entities_to_source_offsets() {
        let (text, raw_at) = decode_text("a&amp;b&#x3b1;c");
        assert_eq!(text, "a&bαc");
        assert_eq!(raw_at[0], 0);
        assert_eq!(raw_at[1], 1); // '&' comes from "&amp;"
        assert_eq!(raw_at[2], 6); // 'b'
        assert_eq!(raw_at[3], 7); // 'α' from "&#x3b1;"
        assert_eq!(raw_at[5], 14); // 'c'
        assert_eq!(*raw_at.last().expect("sentinel"), 15);
    }

    #[test]
    fn html_named_entities_are_decoded() {
        let (text, _) = decode_text("a&nbsp;b");
        assert_eq!(text, "a\u{00A0}b");
    }

    #[test]
    fn split_text_keeps_entities_whole() {
        let mut tree = ContentTree::parse("<p>fish &amp; chips</p>").expect("parse should succeed");
        let p = tree.containers()[0];
        let text = tree.children(p)[0];
        let tail = tree.split_text(text, 6).expect("split should succeed");
        assert_eq!(tree.text(text).map(TextNode::raw), Some("fish &amp;"));
        assert_eq!(tree.text(tail).map(TextNode::raw), Some(" chips"));
        assert_eq!(tree.to_xhtml(), "<p>fish &amp; chips</p>");
    }

    #[test]
    fn split_text_rejects_edges() {
        let mut tree = ContentTree::parse("<p>abc</p>").expect("parse should succeed");
        let p = tree.containers()[0];
        let text = tree.children(p)[0];
        assert!(tree.split_text(text, 0).is_none());
        assert!(tree.split_text(text, 3).is_none());
    }

    #[test]
    fn unmatched_end_tags_are_preserved() {
        let source = "<div><p>one</span> two</p></div>";
        let tree = ContentTree::parse(source).expect("parse should succeed");
        assert_eq!(tree.to_xhtml(), source);
        assert_eq!(tree.containers().len(), 1);
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let source = "<p>one<br>two</p><p>three</p>";
        let tree = ContentTree::parse(source).expect("parse should succeed");
        assert_eq!(tree.containers().len(), 2);
        assert_eq!(tree.to_xhtml(), source);
    }

    #[test]
    fn created_elements_escape_attributes() {
        let mut tree = ContentTree::parse("<p>x</p>").expect("parse should succeed");
        let span = tree.create_element("span", &[("aria-label", "Page \"5\"")], Some("5 < 6"));
        assert_eq!(
            tree.outer_xhtml(span),
            "<span aria-label=\"Page &quot;5&quot;\">5 &lt; 6</span>"
        );
    }

    #[test]
    fn limits_are_enforced() {
        let limits = TreeLimits {
            max_nodes: 4,
            ..TreeLimits::default()
        };
        let err = ContentTree::parse_with_limits("<p>a</p><p>b</p><p>c</p>", limits)
            .expect_err("node limit should trip");
        assert_eq!(err.code, "TREE_LIMIT_EXCEEDED");
    }

    #[test]
    fn malformed_markup_is_fatal() {
        let err = ContentTree::parse("<p class=\"x>text</p>").expect_err("should fail");
        assert_eq!(err.code, "TREE_TOKENIZE_ERROR");
        assert_eq!(err.phase, ErrorPhase::Parse);
    }
}
