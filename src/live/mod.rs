//! Live markup tree.
//!
//! The codec reads and writes a generic markup tree: elements with a tag, an
//! attribute map, a class-token set and ordered children, plus text and comment
//! leaves. [`LiveTree`] is an arena-backed implementation of that interface.
//! Nodes are addressed by [`NodeId`] and are never freed; removing a node only
//! detaches it, so ids held by sessions or probes stay valid handles.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use uuid::Uuid;

pub type ClassSet = BTreeSet<String>;
pub type AttributeMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of one tree instance. Handles minted for one tree are rejected by
/// any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeId(Uuid);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: AttributeMap,
    pub classes: ClassSet,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: AttributeMap::new(),
            classes: ClassSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct LiveTree {
    id: TreeId,
    nodes: Vec<Slot>,
    root: NodeId,
}

impl LiveTree {
    /// Creates a tree whose root is an empty element named `root_tag`.
    pub fn new(root_tag: &str) -> Self {
        Self {
            id: TreeId(Uuid::new_v4()),
            nodes: vec![Slot {
                data: NodeData::Element(Element::new(root_tag)),
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    pub fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0).map(|slot| &slot.data)
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.data(node)? {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(node.0).map(|slot| &mut slot.data)? {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    /// Text of a text leaf. Elements and comments yield `None`.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.data(node)? {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.children(node).get(index).copied()
    }

    /// Whether `node` is `ancestor` or lies below it.
    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(node) && self.is_inclusive_descendant(node, self.root)
    }

    /// Appends `child` under `parent`, detaching it from any previous parent.
    ///
    /// Returns `false` without touching the tree when `parent` is not an
    /// element or when the move would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        if !self.contains(child)
            || self.element(parent).is_none()
            || self.is_inclusive_descendant(parent, child)
        {
            return false;
        }
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        true
    }

    /// Unlinks `node` from its parent. The node and its subtree stay in the
    /// arena.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&child| child != node);
        self.nodes[node.0].parent = None;
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.remove(name);
        }
    }

    pub fn classes(&self, node: NodeId) -> Option<&ClassSet> {
        self.element(node).map(|element| &element.classes)
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node)
            .map(|classes| classes.contains(class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node) {
            element.classes.insert(class.to_string());
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node) {
            element.classes.remove(class);
        }
    }

    /// Concatenated text of all descendant text leaves, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element(_)) => {
                for &child in self.children(node) {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    /// Replaces the content of `node` with a single text leaf, or with nothing
    /// when `text` is empty. On a text leaf the text itself is replaced.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if self.element(node).is_some() {
            for child in self.children(node).to_vec() {
                self.detach(child);
            }
            if !text.is_empty() {
                let leaf = self.create_text(text);
                self.append_child(node, leaf);
            }
            return;
        }
        if let Some(NodeData::Text(current) | NodeData::Comment(current)) =
            self.nodes.get_mut(node.0).map(|slot| &mut slot.data)
        {
            *current = text.to_string();
        }
    }

    /// Merges adjacent text leaves and drops empty ones throughout the subtree.
    pub fn normalize(&mut self, node: NodeId) {
        let children = self.children(node).to_vec();
        let mut pending: Option<NodeId> = None;
        for child in children {
            let Some(text) = self.text(child).map(str::to_string) else {
                pending = None;
                self.normalize(child);
                continue;
            };
            if text.is_empty() {
                self.detach(child);
                continue;
            }
            match pending {
                Some(target) => {
                    if let Some(NodeData::Text(merged)) =
                        self.nodes.get_mut(target.0).map(|slot| &mut slot.data)
                    {
                        merged.push_str(&text);
                    }
                    self.detach(child);
                }
                None => pending = Some(child),
            }
        }
    }

    /// Pre-order walk of the subtree rooted at `node`, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// First descendant element with the given tag, in document order.
    pub fn find_descendant(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(node)
            .into_iter()
            .find(|&id| self.tag(id) == Some(tag))
    }

    /// Markup dump of a subtree, for diagnostics. No escaping beyond `<`, `>`
    /// and `&` in text and `"` in attribute values.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            Some(NodeData::Text(text)) => out.push_str(&escape_text(text)),
            Some(NodeData::Comment(text)) => {
                let _ = write!(out, "<!--{text}-->");
            }
            Some(NodeData::Element(element)) => {
                let _ = write!(out, "<{}", element.tag);
                if !element.classes.is_empty() {
                    let classes: Vec<&str> = element.classes.iter().map(String::as_str).collect();
                    let _ = write!(out, " class=\"{}\"", classes.join(" "));
                }
                for (name, value) in &element.attributes {
                    if value.is_empty() {
                        let _ = write!(out, " {name}");
                    } else {
                        let _ = write!(out, " {name}=\"{}\"", value.replace('"', "&quot;"));
                    }
                }
                out.push('>');
                for &child in self.children(node) {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
            None => {}
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
