//! Abstract Syntax Tree types for kurrent documents.
//!
//! Nodes live in an arena owned by the [`Document`] and are addressed by
//! copyable [`NodeId`] handles. Each node records its parent, so
//! collaborators can walk up as well as down, and can restructure the tree
//! with [`Document::replace_in_parent`], [`Document::remove_from_parent`] and
//! [`Document::add_child`].
//!
//! Spans are half-open [`Location`] pairs. A node without an explicit start
//! takes the start of its first child; a node without an explicit end takes
//! the end of its last child.

use std::collections::BTreeMap;

use crate::span::Location;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The node variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// The root. Always [`Document::root`].
    Document {
        filename: Option<String>,
        metadata: BTreeMap<String, String>,
    },
    Paragraph,
    Emphasis,
    Strong,
    UnorderedList,
    OrderedList,
    ListItem,
    BlockQuote,
    DefinitionList,
    /// One definition. The first `terms` children are the term's inline
    /// nodes, the rest are the description's blocks.
    Definition {
        terms: usize,
    },
    Text {
        content: String,
    },
    Header {
        text: String,
        level: usize,
    },
    RawBlock {
        lines: Vec<String>,
    },
    /// Block-level `[type|primary]: secondary` with an optional body.
    Extension {
        kind: Option<String>,
        primary: String,
        secondary: Option<String>,
        body: Vec<String>,
    },
    /// Inline `[text][type|primary](secondary)` and its shorter forms.
    InlineExtension {
        kind: Option<String>,
        primary: String,
        secondary: Option<String>,
        text: Option<String>,
    },
}

impl Node {
    /// Short name of the variant, as used in tree dumps.
    pub fn name(&self) -> &'static str {
        match self {
            Node::Document { .. } => "Document",
            Node::Paragraph => "Paragraph",
            Node::Emphasis => "Emphasis",
            Node::Strong => "Strong",
            Node::UnorderedList => "UnorderedList",
            Node::OrderedList => "OrderedList",
            Node::ListItem => "ListItem",
            Node::BlockQuote => "BlockQuote",
            Node::DefinitionList => "DefinitionList",
            Node::Definition { .. } => "Definition",
            Node::Text { .. } => "Text",
            Node::Header { .. } => "Header",
            Node::RawBlock { .. } => "RawBlock",
            Node::Extension { .. } => "Extension",
            Node::InlineExtension { .. } => "InlineExtension",
        }
    }

    /// Create a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text {
            content: content.into(),
        }
    }

    /// Whether this node appears inside paragraphs rather than as a block.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Node::Text { .. } | Node::Emphasis | Node::Strong | Node::InlineExtension { .. }
        )
    }

    /// Display text of an inline extension, defaulting to its primary.
    pub fn extension_text(&self) -> Option<&str> {
        match self {
            Node::InlineExtension { text, primary, .. } => {
                Some(text.as_deref().unwrap_or(primary))
            }
            _ => None,
        }
    }
}

/// A node together with its links and explicit span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub node: Node,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    start: Option<Location>,
    end: Option<Location>,
}

impl NodeData {
    fn new(node: Node) -> Self {
        Self {
            node,
            parent: None,
            children: Vec::new(),
            start: None,
            end: None,
        }
    }

    /// The owning node, absent for the root and for detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A parsed document.
///
/// # Example
///
/// ```rust
/// use kurrent_core::ast::{Document, Node};
///
/// let mut doc = Document::new(None);
/// let para = doc.create(Node::Paragraph);
/// let text = doc.create(Node::text("hello"));
/// doc.add_child(para, text);
/// doc.add_child(doc.root(), para);
///
/// let names: Vec<_> = doc.traverse().map(|id| doc.node(id).name()).collect();
/// assert_eq!(names, ["Document", "Paragraph", "Text"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<NodeData>,
}

/// Arena length recorded before a speculative parse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Document {
    /// Create an empty document.
    pub fn new(filename: Option<String>) -> Self {
        Self {
            nodes: vec![NodeData::new(Node::Document {
                filename,
                metadata: BTreeMap::new(),
            })],
        }
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The name of the parsed file, if any.
    pub fn filename(&self) -> Option<&str> {
        match &self.nodes[0].node {
            Node::Document { filename, .. } => filename.as_deref(),
            _ => None,
        }
    }

    /// Document metadata, filled in by transformation passes.
    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        match &self.nodes[0].node {
            Node::Document { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    /// Mutable document metadata.
    pub fn metadata_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        match &mut self.nodes[0].node {
            Node::Document { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the root has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Allocate a detached node.
    pub fn create(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(node));
        id
    }

    /// Allocate a detached node with an explicit span.
    pub fn create_spanned(&mut self, node: Node, start: Location, end: Location) -> NodeId {
        let id = self.create(node);
        self.set_start(id, start);
        self.set_end(id, end);
        id
    }

    pub fn get(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0].node
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Append `child` to `parent`, detaching it from any previous owner.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.remove_from_parent(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Append several children in order.
    pub fn add_children(&mut self, parent: NodeId, children: impl IntoIterator<Item = NodeId>) {
        for child in children {
            self.add_child(parent, child);
        }
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes[id.0].parent;
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes[node.0].parent;
        }
        false
    }

    /// Put `new` in the place of `old` among its siblings.
    ///
    /// `old` becomes detached. Returns `false` and leaves the tree unchanged
    /// if `old` has no parent, is `new` itself, or lies inside `new`.
    pub fn replace_in_parent(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.nodes[old.0].parent else {
            return false;
        };
        if old == new || self.is_ancestor(new, old) {
            return false;
        }
        self.remove_from_parent(new);
        let Some(slot) = self.nodes[parent.0].children.iter().position(|&c| c == old) else {
            return false;
        };
        self.nodes[parent.0].children[slot] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        true
    }

    /// Detach `id` from its parent. Returns `false` if it had none.
    pub fn remove_from_parent(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return false;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        true
    }

    /// Set an explicit start location.
    pub fn set_start(&mut self, id: NodeId, start: Location) {
        self.nodes[id.0].start = Some(start);
    }

    /// Set an explicit end location.
    pub fn set_end(&mut self, id: NodeId, end: Location) {
        self.nodes[id.0].end = Some(end);
    }

    /// Start location: explicit, or that of the first child.
    pub fn start(&self, id: NodeId) -> Option<Location> {
        let mut current = id;
        loop {
            let data = &self.nodes[current.0];
            if let Some(start) = data.start {
                return Some(start);
            }
            current = *data.children.first()?;
        }
    }

    /// End location: explicit, or that of the last child.
    pub fn end(&self, id: NodeId) -> Option<Location> {
        let mut current = id;
        loop {
            let data = &self.nodes[current.0];
            if let Some(end) = data.end {
                return Some(end);
            }
            current = *data.children.last()?;
        }
    }

    /// Term nodes of a definition; empty for other nodes.
    pub fn term(&self, id: NodeId) -> &[NodeId] {
        match self.nodes[id.0].node {
            Node::Definition { terms } => &self.nodes[id.0].children[..terms],
            _ => &[],
        }
    }

    /// Description nodes of a definition; empty for other nodes.
    pub fn description(&self, id: NodeId) -> &[NodeId] {
        match self.nodes[id.0].node {
            Node::Definition { terms } => &self.nodes[id.0].children[terms..],
            _ => &[],
        }
    }

    /// Pre-order iterator over every node reachable from the root.
    pub fn traverse(&self) -> Traverse<'_> {
        self.traverse_from(self.root())
    }

    /// Pre-order iterator over `id` and its descendants.
    pub fn traverse_from(&self, id: NodeId) -> Traverse<'_> {
        Traverse {
            document: self,
            stack: vec![id],
        }
    }

    /// Concatenated text content below `id`.
    pub fn plain_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.traverse_from(id) {
            match self.node(node) {
                Node::Text { content } => out.push_str(content),
                Node::Header { text, .. } => out.push_str(text),
                extension @ Node::InlineExtension { .. } => {
                    out.push_str(extension.extension_text().unwrap_or_default())
                }
                _ => {}
            }
        }
        out
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.nodes.len())
    }

    /// Discard every node allocated after `checkpoint`.
    ///
    /// Nodes older than the checkpoint must not own any of the discarded
    /// nodes.
    pub(crate) fn rollback_to(&mut self, checkpoint: Checkpoint) {
        debug_assert!(self.nodes[..checkpoint.0]
            .iter()
            .all(|data| data.children.iter().all(|c| c.0 < checkpoint.0)));
        self.nodes.truncate(checkpoint.0);
    }
}

/// Lazy pre-order walk. See [`Document::traverse`].
#[derive(Debug, Clone)]
pub struct Traverse<'d> {
    document: &'d Document,
    stack: Vec<NodeId>,
}

impl Iterator for Traverse<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.document.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new(Some("sample.kur".into()));
        let para = doc.create(Node::Paragraph);
        let a = doc.create_spanned(Node::text("a"), Location::new(1, 1), Location::new(1, 2));
        let b = doc.create_spanned(Node::text("b"), Location::new(2, 1), Location::new(2, 4));
        doc.add_children(para, [a, b]);
        doc.add_child(doc.root(), para);
        (doc, para, a, b)
    }

    #[test]
    fn spans_derive_from_children() {
        let (doc, para, _, _) = sample();
        assert_eq!(doc.start(para), Some(Location::new(1, 1)));
        assert_eq!(doc.end(para), Some(Location::new(2, 4)));
        assert_eq!(doc.start(doc.root()), Some(Location::new(1, 1)));
    }

    #[test]
    fn explicit_span_wins() {
        let (mut doc, para, _, _) = sample();
        doc.set_start(para, Location::new(1, 5));
        assert_eq!(doc.start(para), Some(Location::new(1, 5)));
        assert_eq!(doc.end(para), Some(Location::new(2, 4)));
    }

    #[test]
    fn childless_node_has_no_span() {
        let mut doc = Document::new(None);
        let list = doc.create(Node::UnorderedList);
        assert_eq!(doc.start(list), None);
        assert_eq!(doc.end(list), None);
    }

    #[test]
    fn traverse_is_preorder_and_restartable() {
        let (doc, para, a, b) = sample();
        let order: Vec<NodeId> = doc.traverse().collect();
        assert_eq!(order, vec![doc.root(), para, a, b]);
        assert_eq!(doc.traverse().count(), 4);
    }

    #[test]
    fn replace_in_parent_keeps_position() {
        let (mut doc, para, a, b) = sample();
        let c = doc.create(Node::text("c"));
        assert!(doc.replace_in_parent(a, c));
        assert_eq!(doc.children(para), &[c, b]);
        assert_eq!(doc.parent(c), Some(para));
        assert_eq!(doc.parent(a), None);
        assert!(!doc.replace_in_parent(a, c));
    }

    #[test]
    fn replace_with_self_or_ancestor_is_refused() {
        let (mut doc, para, a, b) = sample();
        assert!(!doc.replace_in_parent(a, a));
        assert_eq!(doc.children(para), &[a, b]);
        assert_eq!(doc.parent(a), Some(para));

        assert!(doc.is_ancestor(para, a));
        assert!(!doc.is_ancestor(a, para));
        assert!(!doc.replace_in_parent(a, para));
        assert!(!doc.replace_in_parent(para, doc.root()));
        assert_eq!(doc.children(para), &[a, b]);
        assert_eq!(doc.traverse().count(), 4);
    }

    #[test]
    fn replace_with_sibling_moves_it() {
        let (mut doc, para, a, b) = sample();
        assert!(doc.replace_in_parent(b, a));
        assert_eq!(doc.children(para), &[a]);
        assert_eq!(doc.parent(b), None);
    }

    #[test]
    fn inline_and_block_nodes() {
        assert!(Node::text("a").is_inline());
        assert!(Node::Emphasis.is_inline());
        assert!(!Node::Paragraph.is_inline());
        assert!(!Node::BlockQuote.is_inline());
    }

    #[test]
    fn remove_and_reattach() {
        let (mut doc, para, a, b) = sample();
        assert!(doc.remove_from_parent(a));
        assert!(!doc.remove_from_parent(a));
        assert_eq!(doc.children(para), &[b]);
        doc.add_child(para, a);
        assert_eq!(doc.children(para), &[b, a]);
    }

    #[test]
    fn add_child_moves_between_owners() {
        let (mut doc, para, a, b) = sample();
        let quote = doc.create(Node::BlockQuote);
        doc.add_child(quote, a);
        assert_eq!(doc.children(para), &[b]);
        assert_eq!(doc.parent(a), Some(quote));
    }

    #[test]
    fn definition_splits_term_and_description() {
        let mut doc = Document::new(None);
        let def = doc.create(Node::Definition { terms: 1 });
        let term = doc.create(Node::text("term"));
        let desc = doc.create(Node::Paragraph);
        doc.add_children(def, [term, desc]);
        assert_eq!(doc.term(def), &[term]);
        assert_eq!(doc.description(def), &[desc]);
        assert!(doc.term(term).is_empty());
    }

    #[test]
    fn extension_text_defaults_to_primary() {
        let ext = Node::InlineExtension {
            kind: None,
            primary: "foo".into(),
            secondary: None,
            text: None,
        };
        assert_eq!(ext.extension_text(), Some("foo"));
        assert_eq!(Node::Paragraph.extension_text(), None);
    }

    #[test]
    fn rollback_discards_new_nodes() {
        let (mut doc, _, _, _) = sample();
        let checkpoint = doc.checkpoint();
        let strong = doc.create(Node::Strong);
        let text = doc.create(Node::text("x"));
        doc.add_child(strong, text);
        doc.rollback_to(checkpoint);
        assert_eq!(doc.len(), 4);
    }

    #[test]
    fn metadata_and_filename() {
        let (mut doc, para, _, _) = sample();
        assert_eq!(doc.filename(), Some("sample.kur"));
        if let Some(meta) = doc.metadata_mut() {
            meta.insert("title".into(), "Sample".into());
        }
        assert_eq!(doc.metadata().and_then(|m| m.get("title")).map(String::as_str), Some("Sample"));
        assert_eq!(doc.plain_text(para), "ab");
    }
}
