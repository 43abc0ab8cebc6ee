//! Mutable page DOM for enhancement passes.
//!
//! The tree is a `scraper` [`Html`] (html5ever parse, `ego_tree` storage) that
//! is edited in place and serialized back with html5ever's serializer. This
//! layer adds what a browser page has on top of the tree: event listeners and
//! the insertion records a subtree mutation observer would see.

use std::collections::HashMap;

use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node};

pub use ego_tree::NodeId;

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Kinds of user input a listener can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    KeyDown,
}

/// What a listener does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Copy the page URL with `#heading_id` appended.
    CopyHeadingLink { heading_id: String },
    /// Copy text captured from a code block.
    CopyCode { text: String },
    /// Flip the disclosure that owns the control.
    ToggleDisclosure,
}

/// An event listener attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub event: EventKind,
    pub action: Action,
}

/// A page: parsed HTML plus listeners and pending mutation records.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    /// The `<html>` element the fragment parser puts content under.
    root: NodeId,
    mutations: Vec<NodeId>,
    listeners: HashMap<NodeId, Vec<Listener>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self::parse("")
    }

    /// Parse server-rendered HTML as the initial page content.
    ///
    /// Initial content is not reported as a mutation.
    pub fn parse(html: &str) -> Self {
        let html = Html::parse_fragment(html);
        let root = html.root_element().id();
        Self {
            html,
            root,
            mutations: Vec::new(),
            listeners: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // -----------------------------------------------------------------------
    // Tree construction
    // -----------------------------------------------------------------------

    /// Parse `html` and append it under `parent`, returning the inserted top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        let merged = self.html.tree.extend_tree(fragment.tree).id();

        // `extend_tree` shifts ids; find the `<html>` wrapper under the merged root.
        let Some(wrapper) = self
            .html
            .tree
            .get(merged)
            .and_then(|root| root.children().find(|child| child.value().is_element()))
            .map(|node| node.id())
        else {
            return Vec::new();
        };

        let inserted = self.children(wrapper);
        for &node in &inserted {
            self.append_child(parent, node);
        }
        inserted
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let name = QualName::new(
            None,
            Namespace::from(HTML_NS),
            LocalName::from(tag.to_ascii_lowercase()),
        );
        let attrs = attrs.iter().map(|&(k, v)| attribute(k, v)).collect();
        self.html
            .tree
            .orphan(Node::Element(Element::new(name, attrs)))
            .id()
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.html
            .tree
            .orphan(Node::Text(Text {
                text: StrTendril::from(text),
            }))
            .id()
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child {
            return;
        }
        if let Some(mut node) = self.html.tree.get_mut(parent) {
            node.append_id(child);
            self.mutations.push(child);
        }
    }

    /// Insert `node` right after `reference` in its parent.
    ///
    /// Returns `false` when `reference` is detached.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        if reference == node || self.parent(reference).is_none() {
            return false;
        }
        match self.html.tree.get_mut(reference) {
            Some(mut sibling) => {
                sibling.insert_id_after(node);
                self.mutations.push(node);
                true
            }
            None => false,
        }
    }

    /// Replace all children of `node` with one text node.
    ///
    /// Not reported as a mutation: it only swaps a control's label.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        for child in self.children(node) {
            if let Some(mut child) = self.html.tree.get_mut(child) {
                child.detach();
            }
        }
        let text_node = self.create_text(text);
        if let Some(mut parent) = self.html.tree.get_mut(node) {
            parent.append_id(text_node);
        }
    }

    // -----------------------------------------------------------------------
    // Mutation records
    // -----------------------------------------------------------------------

    /// Drain subtree roots inserted since the last call.
    ///
    /// Roots that were detached again, or that sit inside another reported
    /// root, are dropped.
    pub fn take_mutations(&mut self) -> Vec<NodeId> {
        let pending = std::mem::take(&mut self.mutations);
        let mut roots: Vec<NodeId> = Vec::new();
        for node in pending {
            if roots.contains(&node) || !self.is_connected(node) {
                continue;
            }
            roots.push(node);
        }
        let snapshot = roots.clone();
        roots.retain(|&node| {
            !snapshot
                .iter()
                .any(|&other| other != node && self.is_ancestor(other, node))
        });
        roots
    }

    /// Number of insertion records not yet drained.
    pub fn pending_mutations(&self) -> usize {
        self.mutations.len()
    }

    /// Forget records made after the first `len`, keeping older ones queued.
    pub fn discard_mutations_after(&mut self, len: usize) {
        self.mutations.truncate(len);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.html.tree.get(node)?.value().as_element()
    }

    /// Parent of `node`; the document root has none.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        if node == self.root {
            return None;
        }
        self.html.tree.get(node)?.parent().map(|parent| parent.id())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(node)
            .map(|n| n.children().map(|child| child.id()).collect())
            .unwrap_or_default()
    }

    /// Lower-case tag name, or `None` for non-element nodes.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(Element::name)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(name)
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.edit_attrs(node, |attrs| {
            match attrs.iter_mut().find(|attr| &*attr.name.local == name) {
                Some(attr) => attr.value = StrTendril::from(value),
                None => attrs.push(attribute(name, value)),
            }
        });
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if !self.has_attr(node, name) {
            return;
        }
        self.edit_attrs(node, |attrs| attrs.retain(|attr| &*attr.name.local != name));
    }

    /// Rebuild the element so its cached id and class lookups stay in sync.
    fn edit_attrs(&mut self, node: NodeId, edit: impl FnOnce(&mut Vec<Attribute>)) {
        let Some(mut node) = self.html.tree.get_mut(node) else {
            return;
        };
        let Node::Element(element) = node.value() else {
            return;
        };
        let mut attrs: Vec<Attribute> = element.attrs().map(|(k, v)| attribute(k, v)).collect();
        edit(&mut attrs);
        *element = Element::new(element.name.clone(), attrs);
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// `node` and everything below it, in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(node)
            .map(|n| n.descendants().map(|d| d.id()).collect())
            .unwrap_or_default()
    }

    /// Elements under `node` (inclusive) whose tag is one of `tags`.
    pub fn elements_by_tag(&self, node: NodeId, tags: &[&str]) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.tag(n).is_some_and(|t| tags.contains(&t)))
            .collect()
    }

    /// First child element of `node` carrying `class`.
    pub fn child_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        self.children(node)
            .into_iter()
            .find(|&c| self.has_class(c, class))
    }

    /// Nearest inclusive ancestor of `node` carrying `class`.
    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.has_class(n, class) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Connected element whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.attr(n, "id") == Some(id))
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let Some(node) = self.html.tree.get(node) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|n| n.value().as_text())
            .map(|text| &**text)
            .collect()
    }

    /// Whether `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root || self.is_ancestor(self.root, node)
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    pub fn add_listener(&mut self, node: NodeId, listener: Listener) {
        self.listeners.entry(node).or_default().push(listener);
    }

    pub fn listeners(&self, node: NodeId) -> &[Listener] {
        self.listeners.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total listeners across the document.
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serialize the document's content.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    /// Markup of an element's children; empty for other nodes.
    pub fn inner_html(&self, node: NodeId) -> String {
        self.element_ref(node)
            .map(|el| el.inner_html())
            .unwrap_or_default()
    }

    /// Markup of an element including its own tags; empty for other nodes.
    pub fn outer_html(&self, node: NodeId) -> String {
        self.element_ref(node).map(|el| el.html()).unwrap_or_default()
    }

    fn element_ref(&self, node: NodeId) -> Option<ElementRef<'_>> {
        ElementRef::wrap(self.html.tree.get(node)?)
    }
}

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from(value),
    }
}
