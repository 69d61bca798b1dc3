//! Two-way transform between the live markup tree and [`DocItem`] trees.
//!
//! [`serialize`] walks a live subtree top-down and emits the tagged form;
//! [`Decoder`] rebuilds live nodes from it and, when attached to an
//! [`EditSession`], registers editable regions as it goes. Both directions are
//! driven by the tag table in [`crate::schema`].

use serde::Serialize;

use crate::color::Color;
use crate::live::{ClassSet, Element, LiveTree, NodeData, NodeId};
use crate::schema::{
    AudioAttributes, ButtonVariant, DocItem, DocNode, Float, FloatVariant, ImageAttributes,
    ImageVariant, Lang, LinkAttributes, LinkVariant, ListVariant, NavVariant, ParagraphVariant,
    PayloadKind, RubyVariant, Shape, Size, SourceAttributes, SpanVariant, TrackAttributes,
    TypeTag, Variant, VideoAttributes, VideoVariant,
};
use crate::session::{ChangeSink, EDITABLE_CLASS, EditSession, RegionId};

pub mod nav;

pub use nav::{ExistenceCheck, LinkResolver, ProbeTicket, run_probes};
#[cfg(feature = "url")]
pub use nav::UrlResolver;

const FLOAT_LEFT: &str = "float-left";
const FLOAT_RIGHT: &str = "float-right";
const BROKEN: &str = "broken";
const CLICK: &str = "click";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Summary text of the navigation disclosure widget.
    pub nav_label: String,
    /// Whether the navigation widget is rendered open.
    pub nav_open: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            nav_label: "NAV".to_string(),
            nav_open: true,
        }
    }
}

// =============================================================================
// Serialize
// =============================================================================

/// Serializes a live node.
///
/// Comments, whitespace-only text that starts with a newline, and elements
/// with no table entry (together with their subtrees) yield `None`.
pub fn serialize(tree: &LiveTree, node: NodeId) -> Option<DocItem> {
    match tree.data(node)? {
        NodeData::Text(text) => serialize_text(text).map(DocItem::Text),
        NodeData::Comment(_) => None,
        NodeData::Element(element) => serialize_element(tree, node, element, None).map(DocItem::Node),
    }
}

/// Serializes an edit root. The root is always emitted as `body`, whatever
/// element it is on the live tree.
pub fn serialize_root(tree: &LiveTree, node: NodeId) -> Option<DocNode> {
    let element = tree.element(node)?;
    serialize_element(tree, node, element, Some(TypeTag::Body))
}

/// Text rule: a leaf that is a newline followed only by whitespace is dropped;
/// otherwise the trailing run of whitespace is cut from its first newline on.
pub fn serialize_text(text: &str) -> Option<String> {
    if let Some(rest) = text.strip_prefix('\n')
        && rest.chars().all(char::is_whitespace)
    {
        return None;
    }
    let body_len = text.trim_end().len();
    match text[body_len..].find('\n') {
        Some(offset) => Some(text[..body_len + offset].to_string()),
        None => Some(text.to_string()),
    }
}

fn serialize_element(
    tree: &LiveTree,
    node: NodeId,
    element: &Element,
    forced: Option<TypeTag>,
) -> Option<DocNode> {
    let (tag, variant) = match forced {
        Some(tag) => (tag, tag.spec().payload.default_variant()),
        None => classify(tree, node, element)?,
    };
    let mut out = DocNode {
        tag,
        variant,
        children: Vec::new(),
    };

    if tag == TypeTag::Nav || tag.spec().self_closing {
        return Some(out);
    }
    if let Some(Variant::Ruby(RubyVariant::Simple { .. })) = &out.variant {
        if let Some((base, _)) = simple_ruby(tree, node) {
            out.children.push(DocItem::Text(base));
        }
        return Some(out);
    }

    out.children = tree
        .children(node)
        .iter()
        .filter_map(|&child| serialize(tree, child))
        .collect();
    Some(out)
}

/// Resolves the tag and payload of an element: element-name table first, then
/// the marker-class fallback.
fn classify(tree: &LiveTree, node: NodeId, element: &Element) -> Option<(TypeTag, Option<Variant>)> {
    if let Some(tag) = TypeTag::from_element(&element.tag) {
        return Some((tag, read_variant(tree, node, element, tag.spec().payload)));
    }

    let classes = &element.classes;
    let tag = if classes.contains("columns") {
        TypeTag::Columns
    } else if classes.contains("color") {
        TypeTag::Color
    } else if classes.contains("colorbox") {
        TypeTag::Colorbox
    } else {
        return None;
    };
    Some((tag, read_variant(tree, node, element, tag.spec().payload)))
}

fn read_variant(
    tree: &LiveTree,
    node: NodeId,
    element: &Element,
    payload: PayloadKind,
) -> Option<Variant> {
    let classes = &element.classes;
    let attribute = |name: &'static str| element.attributes.get(name).cloned();
    let variant = match payload {
        PayloadKind::None => return None,
        PayloadKind::Float => Variant::Float(FloatVariant {
            float: if classes.contains(FLOAT_RIGHT) {
                Float::Right
            } else if classes.contains(FLOAT_LEFT) {
                Float::Left
            } else {
                Float::None
            },
        }),
        PayloadKind::Paragraph => Variant::Paragraph(ParagraphVariant {
            lang: (element.attributes.get("lang").map(String::as_str) == Some("en"))
                .then_some(Lang::En),
        }),
        PayloadKind::Image => Variant::Image(ImageVariant {
            attributes: ImageAttributes::read(attribute),
            size: read_size(classes),
        }),
        PayloadKind::List => Variant::List(ListVariant {
            start: element
                .attributes
                .get("start")
                .and_then(|start| start.trim().parse().ok()),
        }),
        PayloadKind::Audio => Variant::Audio(AudioAttributes::read(attribute)),
        PayloadKind::Video => Variant::Video(VideoVariant {
            attributes: VideoAttributes::read(attribute),
            size: read_size(classes),
        }),
        PayloadKind::Track => Variant::Track(TrackAttributes::read(attribute)),
        PayloadKind::Source => Variant::Source(SourceAttributes::read(attribute)),
        PayloadKind::Link => Variant::Link(LinkVariant {
            attributes: LinkAttributes::read(attribute),
            shape: read_shape(classes),
        }),
        PayloadKind::Button => Variant::Button(ButtonVariant {
            shape: read_shape(classes),
        }),
        PayloadKind::Ruby => Variant::Ruby(match simple_ruby(tree, node) {
            Some((_, rt)) => RubyVariant::Simple { rt },
            None => RubyVariant::Complex,
        }),
        PayloadKind::Span => Variant::Span(SpanVariant {
            color: Color::from_classes(classes),
            click: classes.contains(CLICK),
        }),
        PayloadKind::Nav => Variant::Nav(NavVariant {
            data: nav::serialize_menu(tree, node),
        }),
    };
    Some(variant)
}

fn read_size(classes: &ClassSet) -> Size {
    if classes.contains("full") {
        Size::Full
    } else if classes.contains("large") {
        Size::Large
    } else if classes.contains("small") {
        Size::Small
    } else {
        Size::Medium
    }
}

// broken > color > colorbox; at most one applies.
fn read_shape(classes: &ClassSet) -> Shape {
    if classes.contains(BROKEN) {
        Shape::Broken
    } else if classes.contains("color") {
        Shape::Color(Color::from_classes(classes))
    } else if classes.contains("colorbox") {
        Shape::Colorbox(Color::from_classes(classes))
    } else {
        Shape::None
    }
}

/// Returns `(base, annotation)` when a ruby element is exactly one text leaf
/// and one `rt` element, in either order.
fn simple_ruby(tree: &LiveTree, node: NodeId) -> Option<(String, String)> {
    let &[first, second] = tree.children(node) else {
        return None;
    };
    let (text, rt) = if tree.is_text(second) {
        (second, first)
    } else {
        (first, second)
    };
    let base = tree.text(text)?;
    if tree.tag(rt) != Some("rt") {
        return None;
    }
    Some((base.to_string(), tree.text_content(rt)))
}

fn size_class(size: Size) -> Option<&'static str> {
    match size {
        Size::Small => Some("small"),
        Size::Medium => None,
        Size::Large => Some("large"),
        Size::Full => Some("full"),
    }
}

// =============================================================================
// Deserialize
// =============================================================================

/// Result of decoding one item: the literal text for text leaves, or a record
/// mirroring the built node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EditItem {
    Text(String),
    Node(EditRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRecord {
    #[serde(rename = "type")]
    pub tag: TypeTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    /// Region id, present only for nodes registered as editable regions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RegionId>,
    #[serde(skip)]
    pub node: NodeId,
    pub children: Vec<EditItem>,
}

impl EditItem {
    pub fn as_record(&self) -> Option<&EditRecord> {
        match self {
            EditItem::Text(_) => None,
            EditItem::Node(record) => Some(record),
        }
    }

    /// Region ids in document order.
    pub fn region_ids(&self) -> Vec<RegionId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<RegionId>) {
        if let EditItem::Node(record) = self {
            out.extend(record.id);
            for child in &record.children {
                child.collect_ids(out);
            }
        }
    }
}

/// Builds live nodes from [`DocItem`]s.
///
/// ```ignore
/// let mut tree = LiveTree::new("div");
/// let root = tree.root();
/// let mut session = EditSession::new();
/// let record = Decoder::new(&mut tree).editing(&mut session).decode(root, &item);
/// ```
pub struct Decoder<'a, S: ChangeSink = Vec<crate::session::ChangeRecord>> {
    tree: &'a mut LiveTree,
    config: CodecConfig,
    resolver: Option<&'a dyn LinkResolver>,
    session: Option<&'a mut EditSession<S>>,
    cursor: Vec<usize>,
    probes: Vec<ProbeTicket>,
}

impl<'a> Decoder<'a> {
    pub fn new(tree: &'a mut LiveTree) -> Self {
        Self {
            tree,
            config: CodecConfig::default(),
            resolver: None,
            session: None,
            cursor: Vec::new(),
            probes: Vec::new(),
        }
    }
}

impl<'a, S: ChangeSink> Decoder<'a, S> {
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Link resolution for navigation menus. Without a resolver, menu links
    /// are neither marked `self` nor probed.
    pub fn with_resolver(mut self, resolver: &'a dyn LinkResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Turns on edit mode: decoding a `body` root begins a session on the
    /// target container and editable nodes are registered as regions.
    pub fn editing<T: ChangeSink>(self, session: &'a mut EditSession<T>) -> Decoder<'a, T> {
        Decoder {
            tree: self.tree,
            config: self.config,
            resolver: self.resolver,
            session: Some(session),
            cursor: self.cursor,
            probes: self.probes,
        }
    }

    /// Probe tickets issued by navigation menus built so far.
    pub fn probes(&self) -> &[ProbeTicket] {
        &self.probes
    }

    pub fn into_probes(self) -> Vec<ProbeTicket> {
        self.probes
    }

    /// Decodes `item` under `parent`. A `body` node maps onto `parent` itself.
    pub fn decode(&mut self, parent: NodeId, item: &DocItem) -> EditItem {
        match item {
            DocItem::Text(text) => {
                let leaf = self.tree.create_text(text.as_str());
                self.tree.append_child(parent, leaf);
                EditItem::Text(text.clone())
            }
            DocItem::Node(node) => EditItem::Node(self.decode_node(parent, node)),
        }
    }

    fn decode_node(&mut self, parent: NodeId, node: &DocNode) -> EditRecord {
        let spec = node.tag.spec();
        let target = if node.tag == TypeTag::Body {
            if self.cursor.is_empty()
                && let Some(session) = self.session.as_deref_mut()
            {
                session.begin(self.tree, parent);
            }
            parent
        } else {
            let element = self.tree.create_element(spec.element);
            if let Some(marker) = spec.marker {
                self.tree.add_class(element, marker);
            }
            self.apply_variant(element, node);
            self.tree.append_child(parent, element);
            element
        };

        let mut record = EditRecord {
            tag: node.tag,
            variant: node.variant.clone(),
            id: None,
            node: target,
            children: Vec::new(),
        };

        if node.tag == TypeTag::Nav {
            let entries = match &node.variant {
                Some(Variant::Nav(nav)) => nav.data.as_slice(),
                _ => &[],
            };
            let probes = nav::render_menu(self.tree, target, entries, &self.config, self.resolver);
            self.probes.extend(probes);
            return record;
        }

        if spec.editable
            && !self.tree.has_class(parent, EDITABLE_CLASS)
            && let Some(session) = self.session.as_deref_mut()
            && session.is_editing()
        {
            record.id = Some(session.register(self.tree, target, self.cursor.clone()));
        }

        match (&node.variant, node.children.as_slice()) {
            (Some(Variant::Ruby(RubyVariant::Simple { rt })), [DocItem::Text(base)]) => {
                let leaf = self.tree.create_text(base.as_str());
                self.tree.append_child(target, leaf);
                self.append_annotation(target, rt);
                record.children.push(EditItem::Text(base.clone()));
            }
            (Some(Variant::Ruby(RubyVariant::Simple { rt })), _) => {
                tracing::debug!("simple ruby without a single base text, building as complex");
                self.decode_children(target, node, &mut record);
                self.append_annotation(target, rt);
            }
            _ => self.decode_children(target, node, &mut record),
        }

        if record.id.is_some()
            && let Some(session) = self.session.as_deref_mut()
        {
            session.snapshot(self.tree, target);
        }
        record
    }

    fn decode_children(&mut self, target: NodeId, node: &DocNode, record: &mut EditRecord) {
        for (index, child) in node.children.iter().enumerate() {
            self.cursor.push(index);
            let item = self.decode(target, child);
            self.cursor.pop();
            record.children.push(item);
        }
    }

    fn append_annotation(&mut self, ruby: NodeId, rt: &str) {
        let annotation = self.tree.create_element("rt");
        self.tree.set_text_content(annotation, rt);
        self.tree.append_child(ruby, annotation);
    }

    fn apply_variant(&mut self, element: NodeId, node: &DocNode) {
        let Some(variant) = &node.variant else {
            return;
        };
        if variant.kind() != node.tag.spec().payload {
            tracing::debug!(tag = %node.tag, "ignoring variant that does not belong to the tag");
            return;
        }
        let tree = &mut *self.tree;
        match variant {
            Variant::Float(FloatVariant { float }) => match float {
                Float::Right => tree.add_class(element, FLOAT_RIGHT),
                Float::Left => tree.add_class(element, FLOAT_LEFT),
                Float::None => {}
            },
            Variant::Paragraph(ParagraphVariant { lang }) => {
                if let Some(Lang::En) = lang {
                    tree.set_attribute(element, "lang", "en");
                }
            }
            Variant::Image(image) => {
                set_attributes(tree, element, image.attributes.entries());
                apply_size(tree, element, image.size);
            }
            Variant::List(ListVariant { start }) => {
                if let Some(start) = start {
                    tree.set_attribute(element, "start", start.to_string());
                }
            }
            Variant::Audio(attributes) => set_attributes(tree, element, attributes.entries()),
            Variant::Video(video) => {
                set_attributes(tree, element, video.attributes.entries());
                apply_size(tree, element, video.size);
            }
            Variant::Track(attributes) => set_attributes(tree, element, attributes.entries()),
            Variant::Source(attributes) => set_attributes(tree, element, attributes.entries()),
            Variant::Link(link) => {
                set_attributes(tree, element, link.attributes.entries());
                apply_shape(tree, element, link.shape);
            }
            Variant::Button(ButtonVariant { shape }) => apply_shape(tree, element, *shape),
            Variant::Span(SpanVariant { color, click }) => {
                if *click {
                    tree.add_class(element, CLICK);
                }
                apply_color(tree, element, *color);
            }
            Variant::Ruby(_) | Variant::Nav(_) => {}
        }
    }
}

fn set_attributes(tree: &mut LiveTree, element: NodeId, entries: Vec<(&'static str, &str)>) {
    for (name, value) in entries {
        tree.set_attribute(element, name, value);
    }
}

fn apply_size(tree: &mut LiveTree, element: NodeId, size: Size) {
    if let Some(class) = size_class(size) {
        tree.add_class(element, class);
    }
}

fn apply_color(tree: &mut LiveTree, element: NodeId, color: Option<Color>) {
    if let (Some(color), Some(classes)) = (color, tree.element_mut(element).map(|e| &mut e.classes)) {
        color.apply_to(classes);
    }
}

fn apply_shape(tree: &mut LiveTree, element: NodeId, shape: Shape) {
    match shape {
        Shape::None => {}
        Shape::Broken => tree.add_class(element, BROKEN),
        Shape::Color(color) => {
            tree.add_class(element, "color");
            apply_color(tree, element, color);
        }
        Shape::Colorbox(color) => {
            tree.add_class(element, "colorbox");
            apply_color(tree, element, color);
        }
    }
}

/// Decodes `item` under `parent` without edit mode or link probing.
pub fn deserialize(tree: &mut LiveTree, parent: NodeId, item: &DocItem) -> EditItem {
    Decoder::new(tree).decode(parent, item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_with_classes(tree: &mut LiveTree, tag: &str, classes: &[&str]) -> NodeId {
        let node = tree.create_element(tag);
        for class in classes {
            tree.add_class(node, class);
        }
        node
    }

    #[test]
    fn test_serialize_text_rules() {
        assert_eq!(serialize_text("\n   "), None);
        assert_eq!(serialize_text("\n"), None);
        assert_eq!(serialize_text("\n  hello"), Some("\n  hello".into()));
        assert_eq!(serialize_text("hello\n   "), Some("hello".into()));
        assert_eq!(serialize_text("a\n b\n  "), Some("a\n b".into()));
        assert_eq!(serialize_text("tail  "), Some("tail  ".into()));
        assert_eq!(serialize_text("  \n "), Some("  ".into()));
    }

    #[test]
    fn test_list_start_keeps_only_integers() {
        let mut tree = LiveTree::new("body");
        let numeric = tree.create_element("ol");
        tree.set_attribute(numeric, "start", " 7 ");
        let roman = tree.create_element("ol");
        tree.set_attribute(roman, "start", "iv");

        let Some(DocItem::Node(node)) = serialize(&tree, numeric) else {
            panic!("expected ol");
        };
        assert_eq!(node.variant, Some(Variant::List(ListVariant { start: Some(7) })));
        let Some(DocItem::Node(node)) = serialize(&tree, roman) else {
            panic!("expected ol");
        };
        assert_eq!(node.variant, Some(Variant::List(ListVariant { start: None })));
    }

    #[test]
    fn test_comments_and_unknown_elements_are_dropped() {
        let mut tree = LiveTree::new("body");
        let root = tree.root();
        let comment = tree.create_comment("note");
        let div = tree.create_element("div");
        let inner = tree.create_element("p");
        tree.append_child(div, inner);
        tree.append_child(root, comment);
        tree.append_child(root, div);

        let Some(DocItem::Node(body)) = serialize(&tree, root) else {
            panic!("expected body");
        };
        assert!(body.children.is_empty());
        assert_eq!(serialize(&tree, comment), None);
    }

    #[test]
    fn test_marker_fallback_order() {
        let mut tree = LiveTree::new("body");
        let both = element_with_classes(&mut tree, "span", &["color", "colorbox", "c2", "click"]);
        let Some(DocItem::Node(node)) = serialize(&tree, both) else {
            panic!("expected node");
        };
        assert_eq!(node.tag, TypeTag::Color);
        assert_eq!(
            node.variant,
            Some(Variant::Span(SpanVariant {
                color: Color::new(2),
                click: true,
            }))
        );

        let columns = element_with_classes(&mut tree, "div", &["columns", "color"]);
        let Some(DocItem::Node(node)) = serialize(&tree, columns) else {
            panic!("expected node");
        };
        assert_eq!(node.tag, TypeTag::Columns);
        assert_eq!(node.variant, None);
    }

    #[test]
    fn test_self_closing_skips_children() {
        let mut tree = LiveTree::new("body");
        let img = tree.create_element("img");
        let stray = tree.create_text("ignored");
        tree.append_child(img, stray);
        tree.add_class(img, "large");
        tree.add_class(img, "full");
        tree.set_attribute(img, "src", "cat.png");

        let Some(DocItem::Node(node)) = serialize(&tree, img) else {
            panic!("expected node");
        };
        assert!(node.children.is_empty());
        assert_eq!(
            node.variant,
            Some(Variant::Image(ImageVariant {
                attributes: ImageAttributes {
                    src: Some("cat.png".into()),
                    alt: None,
                },
                size: Size::Full,
            }))
        );
    }

    #[test]
    fn test_serialize_root_forces_body() {
        let mut tree = LiveTree::new("div");
        let root = tree.root();
        let p = tree.create_element("p");
        tree.append_child(root, p);
        let body = serialize_root(&tree, root).unwrap();
        assert_eq!(body.tag, TypeTag::Body);
        assert_eq!(body.children.len(), 1);
    }

    #[test]
    fn test_absent_variant_fields_leave_attributes_untouched() {
        let mut tree = LiveTree::new("body");
        let root = tree.root();
        let item = DocItem::Node(DocNode::new(TypeTag::A));
        let EditItem::Node(record) = deserialize(&mut tree, root, &item) else {
            panic!("expected node");
        };
        let element = tree.element(record.node).unwrap();
        assert!(element.attributes.is_empty());
        assert!(element.classes.is_empty());
    }

    #[test]
    fn test_mismatched_variant_is_ignored() {
        let mut tree = LiveTree::new("body");
        let root = tree.root();
        let node = DocNode::new(TypeTag::Section).with_variant(Variant::Float(FloatVariant {
            float: Float::Left,
        }));
        let EditItem::Node(record) = deserialize(&mut tree, root, &DocItem::Node(node)) else {
            panic!("expected node");
        };
        assert!(!tree.has_class(record.node, FLOAT_LEFT));
    }
}
