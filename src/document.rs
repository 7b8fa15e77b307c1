//! Mutable HTML tree every filter operates on.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Detached
//! nodes stay in the arena but are unreachable from the root, so they never
//! serialize. Every attached node has exactly one parent, and `append`
//! refuses to create cycles.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use html5ever::tendril::TendrilSink as _;
use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Elements serialized without children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

/// Namespace every parsed element lives in.
const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Stands in for a node id from another document: no parent, no children.
static MISSING: Node = Node {
    children: Vec::new(),
    kind: NodeKind::Text(String::new()),
    parent: None,
};

/// Index of a node in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// An element's tag name and attributes. Names are lowercase; attributes
/// are kept sorted so serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Attribute name to value.
    pub attrs: BTreeMap<String, String>,
    /// Lowercase tag name.
    pub name: String,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with attributes and children.
    Element(Element),
    /// The fragment root; never serialized itself.
    Root,
    /// A text run. Carries no attributes or children.
    Text(String),
}

/// One arena slot.
#[derive(Debug, Clone)]
struct Node {
    /// Child ids in document order.
    children: Vec<NodeId>,
    /// Element, text or root.
    kind: NodeKind,
    /// `None` for the root and detached nodes.
    parent: Option<NodeId>,
}

/// An HTML fragment as an arena tree.
#[derive(Debug, Clone)]
pub struct Document {
    /// Arena; index 0 is the root.
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        return Self::new();
    }
}

impl Document {
    /// The fragment root of every document.
    pub const ROOT: NodeId = NodeId(0);

    /// An empty fragment.
    pub fn new() -> Self {
        return Self {
            nodes: vec![Node {
                children: Vec::new(),
                kind: NodeKind::Root,
                parent: None,
            }],
        };
    }

    /// Parse an HTML fragment as if it appeared inside `<body>`.
    ///
    /// Comments and doctypes are dropped; tag and attribute names come out
    /// lowercase. Never fails: malformed markup is repaired by the HTML5
    /// tree builder.
    pub fn parse(html: &str) -> Self {
        let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
        let dom: RcDom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html);

        let mut doc = Self::new();
        let Some(container) = fragment_container(&dom.document) else {
            return doc;
        };

        let mut stack: Vec<(Handle, NodeId)> = container
            .children
            .borrow()
            .iter()
            .rev()
            .map(|child| (child.clone(), Self::ROOT))
            .collect();

        while let Some((handle, parent)) = stack.pop() {
            let Some(id) = doc.import_rcdom_node(&handle) else {
                continue;
            };
            doc.append(parent, id);
            for child in handle.children.borrow().iter().rev() {
                stack.push((child.clone(), id));
            }
        }

        return doc;
    }

    /// Allocate an arena node for one rcdom node, or `None` for node types we drop.
    fn import_rcdom_node(&mut self, handle: &Handle) -> Option<NodeId> {
        return match &handle.data {
            NodeData::Element { name, attrs, .. } => {
                let attrs = attrs
                    .borrow()
                    .iter()
                    .map(|a| (a.name.local.to_string(), a.value.to_string()))
                    .collect();
                Some(self.push(NodeKind::Element(Element {
                    attrs,
                    name: name.local.to_string(),
                })))
            },
            NodeData::Text { contents } => Some(self.create_text(contents.borrow().to_string())),
            _ => None,
        };
    }

    /// Allocate a detached node.
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            children: Vec::new(),
            kind,
            parent: None,
        });
        return id;
    }

    // ── Construction ─────────────────────────────────────────────────────

    /// Create a detached element with no attributes.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        return self.push(NodeKind::Element(Element {
            attrs: BTreeMap::new(),
            name: name.to_ascii_lowercase(),
        }));
    }

    /// Create a detached element with the given attributes.
    pub fn create_element_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(name);
        for (key, value) in attrs {
            self.set_attr(id, key, value);
        }
        return id;
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        return self.push(NodeKind::Text(text.into()));
    }

    /// Deep-copy `node` (and its subtree) from `other` into this arena, detached.
    pub fn import(&mut self, other: &Document, node: NodeId) -> NodeId {
        let top = self.push(other.kind(node).clone());
        let mut stack: Vec<(NodeId, NodeId)> = other
            .children(node)
            .iter()
            .rev()
            .map(|&child| (child, top))
            .collect();
        while let Some((source, parent)) = stack.pop() {
            let copy = self.push(other.kind(source).clone());
            self.append(parent, copy);
            for &child in other.children(source).iter().rev() {
                stack.push((child, copy));
            }
        }
        return top;
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// What `id` is.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        return &self.node(id).kind;
    }

    /// The slot for `id`.
    fn node(&self, id: NodeId) -> &Node {
        return self.nodes.get(id.0).unwrap_or(&MISSING);
    }

    /// The slot for `id`, writable; `None` for ids this document never issued.
    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        return self.nodes.get_mut(id.0);
    }

    /// Parent of `id`, `None` for the root and for detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        return self.node(id).parent;
    }

    /// Children of `id` in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        return &self.node(id).children;
    }

    /// First child of `id`.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        return self.children(id).first().copied();
    }

    /// Sibling immediately after `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        return siblings.get(pos.checked_add(1)?).copied();
    }

    /// Sibling immediately before `id`.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        return siblings.get(pos.checked_sub(1)?).copied();
    }

    /// Proper ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        return Ancestors {
            doc: self,
            next: self.parent(id),
        };
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        return id == Self::ROOT || self.ancestors(id).any(|a| a == Self::ROOT);
    }

    /// Whether any proper ancestor of `id` satisfies `pred`.
    pub fn has_ancestor(&self, id: NodeId, mut pred: impl FnMut(NodeId) -> bool) -> bool {
        return self.ancestors(id).any(|a| pred(a));
    }

    /// Whether `id` sits (at any depth) inside an element named in `names`.
    pub fn is_inside(&self, id: NodeId, names: &[&str]) -> bool {
        return self.has_ancestor(id, |a| self.tag(a).is_some_and(|t| names.contains(&t)));
    }

    /// All nodes under `id` in preorder, excluding `id` itself. The result
    /// is a snapshot; callers that mutate while iterating should check
    /// [`Self::is_attached`].
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        return out;
    }

    /// Attached elements named `name`, in document order.
    pub fn elements_named(&self, name: &str) -> Vec<NodeId> {
        return self
            .descendants(Self::ROOT)
            .into_iter()
            .filter(|&id| self.tag(id) == Some(name))
            .collect();
    }

    /// Attached text nodes, in document order.
    pub fn text_nodes(&self) -> Vec<NodeId> {
        return self
            .descendants(Self::ROOT)
            .into_iter()
            .filter(|&id| matches!(self.kind(id), NodeKind::Text(_)))
            .collect();
    }

    // ── Element and text access ──────────────────────────────────────────

    /// Element data for `id`, if it is an element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        return match self.kind(id) {
            NodeKind::Element(e) => Some(e),
            _ => None,
        };
    }

    /// Writable element data for `id`, if it is an element.
    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        return match &mut self.node_mut(id)?.kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        };
    }

    /// Tag name of `id`, if it is an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        return self.element(id).map(|e| e.name.as_str());
    }

    /// Whether `id` is an element named `name`.
    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        return self.tag(id) == Some(name);
    }

    /// Rename an element in place.
    pub fn rename(&mut self, id: NodeId, name: &str) {
        if let Some(e) = self.element_mut(id) {
            e.name = name.to_ascii_lowercase();
        }
    }

    /// Contents of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        return match self.kind(id) {
            NodeKind::Text(t) => Some(t.as_str()),
            _ => None,
        };
    }

    /// Overwrite a text node's contents. No-op on other node kinds.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(Node {
            kind: NodeKind::Text(t),
            ..
        }) = self.node_mut(id)
        {
            *t = text.into();
        }
    }

    /// Attribute value on an element.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        return self.element(id)?.attrs.get(name).map(String::as_str);
    }

    /// Set an attribute on an element. No-op on other node kinds.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(e) = self.element_mut(id) {
            e.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        return self.element_mut(id)?.attrs.remove(name);
    }

    /// Keep only the attributes for which `keep` returns a value; the
    /// returned string replaces the attribute's value.
    pub fn filter_attrs(&mut self, id: NodeId, mut keep: impl FnMut(&str, &str) -> Option<String>) {
        let Some(e) = self.element_mut(id) else {
            return;
        };
        let old = std::mem::take(&mut e.attrs);
        e.attrs = old
            .into_iter()
            .filter_map(|(name, value)| keep(&name, &value).map(|v| (name, v)))
            .collect();
    }

    /// Whether the element's `class` list contains `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        return self
            .attr(id, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class));
    }

    /// Add `class` to the element's class list if absent.
    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let list = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &list);
    }

    /// Concatenated text of `id` and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(t) = self.text(node) {
                out.push_str(t);
            }
        }
        return out;
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Remove `id` from its parent. The subtree stays intact and can be reattached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Link a detached `child` into `parent`'s children at `at`, clamped
    /// to the end.
    fn attach(&mut self, parent: NodeId, at: usize, child: NodeId) {
        if self.node_mut(child).is_none() {
            return;
        }
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        let at = at.min(node.children.len());
        node.children.insert(at, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Whether making `child` a child of `parent` would create a cycle.
    fn would_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        return parent == child || self.ancestors(parent).any(|a| a == child);
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if self.would_cycle(parent, child) || child == Self::ROOT {
            return;
        }
        self.detach(child);
        self.attach(parent, usize::MAX, child);
    }

    /// Move `child` to the front of `parent`'s children.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        if self.would_cycle(parent, child) || child == Self::ROOT {
            return;
        }
        self.detach(child);
        self.attach(parent, 0, child);
    }

    /// Move `node` to sit immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        self.insert_at_offset(reference, node, 0);
    }

    /// Move `node` to sit immediately after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        self.insert_at_offset(reference, node, 1);
    }

    /// Move `node` next to `reference`: before it at offset 0, after it at 1.
    fn insert_at_offset(&mut self, reference: NodeId, node: NodeId, offset: usize) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if self.would_cycle(parent, node) || node == reference {
            return;
        }
        self.detach(node);
        let Some(pos) = self.children(parent).iter().position(|&c| c == reference) else {
            return;
        };
        self.attach(parent, pos.saturating_add(offset), node);
    }

    /// Put `replacements` where `old` was, in order, and detach `old`.
    pub fn replace(&mut self, old: NodeId, replacements: &[NodeId]) {
        if self.parent(old).is_none() {
            return;
        }
        for &node in replacements {
            self.insert_before(old, node);
        }
        self.detach(old);
    }

    /// Replace an element by its own children.
    pub fn unwrap(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        self.replace(id, &children);
    }

    /// Put `wrapper` where `id` was and move `id` inside it.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        self.insert_before(id, wrapper);
        self.append(wrapper, id);
    }

    /// Detach every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
    }

    // ── Serialization ────────────────────────────────────────────────────

    /// Serialize the whole fragment.
    pub fn to_html(&self) -> String {
        return self.inner_html(Self::ROOT);
    }

    /// Serialize the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        return out;
    }

    /// Serialize `id` including its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        return out;
    }

    /// Serialize `id` and its subtree without recursion.
    fn write_node(&self, id: NodeId, out: &mut String) {
        /// Pending serialization work.
        enum Step {
            /// Emit the end tag.
            Close(NodeId),
            /// Emit the node, then its children.
            Open(NodeId),
        }

        let mut stack = vec![Step::Open(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(node) => match self.kind(node) {
                    NodeKind::Root => {
                        stack.extend(self.children(node).iter().rev().map(|&c| Step::Open(c)));
                    },
                    NodeKind::Text(text) => {
                        let raw = self
                            .parent(node)
                            .and_then(|p| self.tag(p))
                            .is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
                        if raw {
                            out.push_str(text);
                        } else {
                            escape_text(text, out);
                        }
                    },
                    NodeKind::Element(e) => {
                        write_start_tag(e, out);
                        if VOID_ELEMENTS.contains(&e.name.as_str()) {
                            continue;
                        }
                        stack.push(Step::Close(node));
                        stack.extend(self.children(node).iter().rev().map(|&c| Step::Open(c)));
                    },
                },
                Step::Close(node) => {
                    if let Some(name) = self.tag(node) {
                        let _ = write!(out, "</{name}>");
                    }
                },
            }
        }
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors<'a> {
    /// Tree being walked.
    doc: &'a Document,
    /// Next ancestor to yield.
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        return Some(current);
    }
}

/// The `<html>` element html5ever wraps fragment children in.
fn fragment_container(document: &Handle) -> Option<Handle> {
    return document
        .children
        .borrow()
        .iter()
        .find(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned();
}

/// Serialize `<name attr="value">`.
fn write_start_tag(e: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&e.name);
    for (name, value) in &e.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
}

/// Escape text content for HTML.
pub fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape an attribute value for a double-quoted HTML attribute.
pub fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape a string for use as HTML text, returning a new string.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_text(text, &mut out);
    return out;
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests fail by panicking"
)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_and_serialize_round_trip() {
        let html = "<p>Hello <a href=\"/x\">world</a></p><pre>code</pre>";
        assert_eq!(Document::parse(html).to_html(), html);
    }

    #[test]
    fn attribute_names_are_lowercased_and_sorted() {
        let doc = Document::parse("<A TITLE=\"t\" HREF=\"/x\">y</A>");
        assert_eq!(doc.to_html(), "<a href=\"/x\" title=\"t\">y</a>");
    }

    #[test]
    fn style_element_stays_in_fragment() {
        let doc = Document::parse("<style>Label ~foo</style>");
        assert_eq!(doc.to_html(), "<style>Label ~foo</style>");
    }

    #[test]
    fn comments_are_dropped() {
        let doc = Document::parse("a<!-- hidden -->b");
        assert_eq!(doc.to_html(), "ab");
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let mut doc = Document::new();
        let a = doc.create_element_with("a", &[("title", "\"<x>\" & y")]);
        let text = doc.create_text("1 < 2 & 3");
        doc.append(a, text);
        doc.append(Document::ROOT, a);
        assert_eq!(doc.to_html(), "<a title=\"&quot;&lt;x&gt;&quot; &amp; y\">1 &lt; 2 &amp; 3</a>");
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let doc = Document::parse("a<br>b<img src=\"/i.png\">");
        assert_eq!(doc.to_html(), "a<br>b<img src=\"/i.png\">");
    }

    #[test]
    fn replace_keeps_order_and_detaches_old() {
        let mut doc = Document::parse("<p>x</p>");
        let p = doc.elements_named("p")[0];
        let old = doc.children(p)[0];
        let one = doc.create_text("1");
        let two = doc.create_element("b");
        let three = doc.create_text("3");
        doc.replace(old, &[one, two, three]);
        assert_eq!(doc.to_html(), "<p>1<b></b>3</p>");
        assert_eq!(doc.parent(old), None);
        assert!(!doc.is_attached(old));
    }

    #[test]
    fn unwrap_lifts_children() {
        let mut doc = Document::parse("<div><em>a</em>b</div>");
        let div = doc.elements_named("div")[0];
        doc.unwrap(div);
        assert_eq!(doc.to_html(), "<em>a</em>b");
    }

    #[test]
    fn append_refuses_cycles() {
        let mut doc = Document::parse("<div><span></span></div>");
        let div = doc.elements_named("div")[0];
        let span = doc.elements_named("span")[0];
        doc.append(span, div);
        assert_eq!(doc.to_html(), "<div><span></span></div>");
        assert_eq!(doc.parent(span), Some(div));
    }

    #[test]
    fn wrap_moves_node_inside_wrapper() {
        let mut doc = Document::parse("<p><img src=\"/a.png\"></p>");
        let img = doc.elements_named("img")[0];
        let a = doc.create_element_with("a", &[("href", "/a.png")]);
        doc.wrap(img, a);
        assert_eq!(doc.to_html(), "<p><a href=\"/a.png\"><img src=\"/a.png\"></a></p>");
    }

    #[test]
    fn import_deep_copies_subtree() {
        let source = Document::parse("<ul><li>a</li><li>b</li></ul>");
        let ul = source.elements_named("ul")[0];
        let mut target = Document::parse("<p>x</p>");
        let copy = target.import(&source, ul);
        target.append(Document::ROOT, copy);
        assert_eq!(target.to_html(), "<p>x</p><ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn add_class_is_idempotent() {
        let mut doc = Document::parse("<a class=\"gfm\">x</a>");
        let a = doc.elements_named("a")[0];
        doc.add_class(a, "gfm-issue");
        doc.add_class(a, "gfm-issue");
        assert_eq!(doc.attr(a, "class"), Some("gfm gfm-issue"));
    }

    #[test]
    fn ids_from_another_document_are_ignored() {
        let mut other = Document::parse("<p>a</p><p>b</p><p>c</p>");
        let foreign = other.create_text("x");
        let mut doc = Document::new();
        doc.append(Document::ROOT, foreign);
        doc.set_attr(foreign, "class", "y");
        assert_eq!(doc.to_html(), "");
        assert_eq!(doc.parent(foreign), None);
        assert!(doc.children(foreign).is_empty());
    }

    #[test]
    fn siblings_and_ancestors() {
        let doc = Document::parse("<div><b>1</b><i>2</i></div>");
        let b = doc.elements_named("b")[0];
        let i = doc.elements_named("i")[0];
        assert_eq!(doc.next_sibling(b), Some(i));
        assert_eq!(doc.previous_sibling(i), Some(b));
        let text = doc.children(i)[0];
        assert!(doc.is_inside(text, &["div"]));
        assert!(!doc.is_inside(text, &["pre"]));
    }
}
