//! Serialized document model.
//!
//! A [`DocNode`] is `{ type, variant, children }`: a [`TypeTag`], a typed
//! [`Variant`] payload whose shape is fixed by the tag, and ordered children that
//! are either text strings or nested nodes. Every tag has one [`TagSpec`] row
//! describing how it maps onto live markup; the codec is driven entirely by that
//! table.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::color::Color;

pub mod wire;

pub use wire::{DecodeError, Decoded, DroppedNode, decode_lenient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Body,
    Nav,
    Section,
    Article,
    Hgroup,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Hr,
    Br,
    P,
    Figure,
    Figcaption,
    Img,
    Fieldset,
    Legend,
    Ol,
    Ul,
    Li,
    Details,
    Summary,
    Strong,
    Em,
    B,
    I,
    U,
    Sub,
    Sup,
    Ins,
    Del,
    Ruby,
    Rt,
    Rp,
    Audio,
    Video,
    Track,
    Source,
    A,
    Button,
    Columns,
    Color,
    Colorbox,
}

/// Which payload a tag carries in its `variant` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    None,
    Float,
    Paragraph,
    Image,
    List,
    Audio,
    Video,
    Track,
    Source,
    Link,
    Button,
    Ruby,
    Span,
    Nav,
}

/// One row of the tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
    /// Element name on the live tree.
    pub element: &'static str,
    /// Marker class identifying the tag when the element name alone does not.
    pub marker: Option<&'static str>,
    pub payload: PayloadKind,
    /// Emitted without visiting children.
    pub self_closing: bool,
    /// Whether the node can become an editable region.
    pub editable: bool,
}

const fn row(element: &'static str, payload: PayloadKind, editable: bool) -> TagSpec {
    TagSpec {
        element,
        marker: None,
        payload,
        self_closing: false,
        editable,
    }
}

const fn void(element: &'static str, payload: PayloadKind) -> TagSpec {
    TagSpec {
        element,
        marker: None,
        payload,
        self_closing: true,
        editable: false,
    }
}

const fn marked(
    element: &'static str,
    marker: &'static str,
    payload: PayloadKind,
    editable: bool,
) -> TagSpec {
    TagSpec {
        element,
        marker: Some(marker),
        payload,
        self_closing: false,
        editable,
    }
}

impl TypeTag {
    pub const ALL: [TypeTag; 45] = [
        TypeTag::Body,
        TypeTag::Nav,
        TypeTag::Section,
        TypeTag::Article,
        TypeTag::Hgroup,
        TypeTag::H1,
        TypeTag::H2,
        TypeTag::H3,
        TypeTag::H4,
        TypeTag::H5,
        TypeTag::H6,
        TypeTag::Hr,
        TypeTag::Br,
        TypeTag::P,
        TypeTag::Figure,
        TypeTag::Figcaption,
        TypeTag::Img,
        TypeTag::Fieldset,
        TypeTag::Legend,
        TypeTag::Ol,
        TypeTag::Ul,
        TypeTag::Li,
        TypeTag::Details,
        TypeTag::Summary,
        TypeTag::Strong,
        TypeTag::Em,
        TypeTag::B,
        TypeTag::I,
        TypeTag::U,
        TypeTag::Sub,
        TypeTag::Sup,
        TypeTag::Ins,
        TypeTag::Del,
        TypeTag::Ruby,
        TypeTag::Rt,
        TypeTag::Rp,
        TypeTag::Audio,
        TypeTag::Video,
        TypeTag::Track,
        TypeTag::Source,
        TypeTag::A,
        TypeTag::Button,
        TypeTag::Columns,
        TypeTag::Color,
        TypeTag::Colorbox,
    ];

    /// The tag table.
    pub const fn spec(self) -> TagSpec {
        use PayloadKind as K;
        match self {
            TypeTag::Body => row("body", K::None, false),
            TypeTag::Nav => row("nav", K::Nav, false),
            TypeTag::Section => row("section", K::None, false),
            TypeTag::Article => row("article", K::Float, false),
            TypeTag::Hgroup => row("hgroup", K::None, false),
            TypeTag::H1 => row("h1", K::None, true),
            TypeTag::H2 => row("h2", K::None, true),
            TypeTag::H3 => row("h3", K::None, true),
            TypeTag::H4 => row("h4", K::None, true),
            TypeTag::H5 => row("h5", K::None, true),
            TypeTag::H6 => row("h6", K::None, true),
            TypeTag::Hr => void("hr", K::None),
            TypeTag::Br => void("br", K::None),
            TypeTag::P => row("p", K::Paragraph, true),
            TypeTag::Figure => row("figure", K::Float, false),
            TypeTag::Figcaption => row("figcaption", K::None, true),
            TypeTag::Img => void("img", K::Image),
            TypeTag::Fieldset => row("fieldset", K::None, false),
            TypeTag::Legend => row("legend", K::None, true),
            TypeTag::Ol => row("ol", K::List, false),
            TypeTag::Ul => row("ul", K::None, false),
            TypeTag::Li => row("li", K::None, true),
            TypeTag::Details => row("details", K::None, false),
            TypeTag::Summary => row("summary", K::None, true),
            TypeTag::Strong => row("strong", K::None, true),
            TypeTag::Em => row("em", K::None, true),
            TypeTag::B => row("b", K::None, true),
            TypeTag::I => row("i", K::None, true),
            TypeTag::U => row("u", K::None, true),
            TypeTag::Sub => row("sub", K::None, true),
            TypeTag::Sup => row("sup", K::None, true),
            TypeTag::Ins => row("ins", K::None, true),
            TypeTag::Del => row("del", K::None, true),
            TypeTag::Ruby => row("ruby", K::Ruby, true),
            TypeTag::Rt => row("rt", K::None, true),
            TypeTag::Rp => row("rp", K::None, true),
            TypeTag::Audio => row("audio", K::Audio, false),
            TypeTag::Video => row("video", K::Video, false),
            TypeTag::Track => row("track", K::Track, false),
            TypeTag::Source => row("source", K::Source, false),
            TypeTag::A => row("a", K::Link, true),
            TypeTag::Button => row("button", K::Button, true),
            TypeTag::Columns => marked("div", "columns", K::None, false),
            TypeTag::Color => marked("span", "color", K::Span, true),
            TypeTag::Colorbox => marked("span", "colorbox", K::Span, true),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Columns => "columns",
            TypeTag::Color => "color",
            TypeTag::Colorbox => "colorbox",
            other => other.spec().element,
        }
    }

    /// Resolves an element name through the direct part of the table. Tags
    /// identified by a marker class are not returned here.
    pub fn from_element(name: &str) -> Option<TypeTag> {
        TypeTag::ALL.into_iter().find(|tag| {
            let spec = tag.spec();
            spec.marker.is_none() && spec.element.eq_ignore_ascii_case(name)
        })
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownType(s.to_string()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Float {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    #[default]
    Medium,
    Large,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
}

/// Payload of `article` and `figure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FloatVariant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub float: Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParagraphVariant {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lang_or_none"
    )]
    pub lang: Option<Lang>,
}

// Only `en` is a recognized language flag; anything else reads as unset.
fn lang_or_none<'de, D>(deserializer: D) -> Result<Option<Lang>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(lang)) if lang == "en" => Some(Lang::En),
        _ => None,
    })
}

/// Payload of `ol`.
///
/// `start` is kept only when it reads as an integer. A live `start` such as
/// `"iv"` is dropped on serialize, so it does not survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListVariant {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "start_or_none"
    )]
    pub start: Option<i64>,
}

fn start_or_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Declares a payload that copies a fixed attribute allowlist verbatim.
/// Absent attributes stay `None`; nothing is defaulted.
macro_rules! attribute_set {
    ($(#[$meta:meta])* $name:ident { $($field:ident : $attr:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            $(
                #[serde(rename = $attr, default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<String>,
            )+
        }

        impl $name {
            pub const ATTRIBUTES: &'static [&'static str] = &[$($attr),+];

            pub fn read(mut lookup: impl FnMut(&'static str) -> Option<String>) -> Self {
                Self {
                    $($field: lookup($attr),)+
                }
            }

            pub fn entries(&self) -> Vec<(&'static str, &str)> {
                let mut out = Vec::new();
                $(
                    if let Some(value) = &self.$field {
                        out.push(($attr, value.as_str()));
                    }
                )+
                out
            }
        }
    };
}

attribute_set!(ImageAttributes { src: "src", alt: "alt" });

attribute_set!(
    /// Payload of `audio`.
    AudioAttributes {
        src: "src",
        controls: "controls",
        crossorigin: "crossorigin",
        looping: "loop",
        muted: "muted",
        preload: "preload",
    }
);

attribute_set!(VideoAttributes {
    src: "src",
    autoplay: "autoplay",
    controls: "controls",
    crossorigin: "crossorigin",
    looping: "loop",
    muted: "muted",
    poster: "poster",
    preload: "preload",
});

attribute_set!(
    /// Payload of `track`.
    TrackAttributes {
        src: "src",
        srclang: "srclang",
        default: "default",
        kind: "kind",
        label: "label",
    }
);

attribute_set!(
    /// Payload of `source`. Only meaningful under `audio` and `video`.
    SourceAttributes { src: "src", media: "media" }
);

attribute_set!(LinkAttributes {
    href: "href",
    target: "target",
    download: "download",
    rel: "rel",
});

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageVariant {
    #[serde(flatten)]
    pub attributes: ImageAttributes,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: Size,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoVariant {
    #[serde(flatten)]
    pub attributes: VideoAttributes,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: Size,
}

/// Visual shape of a link or button. `Color` and `Colorbox` carry the palette
/// index when one is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "ShapeRepr", into = "ShapeRepr")]
pub enum Shape {
    #[default]
    None,
    Broken,
    Color(Option<Color>),
    Colorbox(Option<Color>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ShapeKind {
    #[default]
    None,
    Broken,
    Color,
    Colorbox,
}

#[derive(Serialize, Deserialize)]
struct ShapeRepr {
    #[serde(default, deserialize_with = "null_as_default")]
    shape: ShapeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
}

impl From<ShapeRepr> for Shape {
    fn from(repr: ShapeRepr) -> Self {
        match repr.shape {
            ShapeKind::None => Shape::None,
            ShapeKind::Broken => Shape::Broken,
            ShapeKind::Color => Shape::Color(repr.color),
            ShapeKind::Colorbox => Shape::Colorbox(repr.color),
        }
    }
}

impl From<Shape> for ShapeRepr {
    fn from(shape: Shape) -> Self {
        let (shape, color) = match shape {
            Shape::None => (ShapeKind::None, None),
            Shape::Broken => (ShapeKind::Broken, None),
            Shape::Color(color) => (ShapeKind::Color, color),
            Shape::Colorbox(color) => (ShapeKind::Colorbox, color),
        };
        ShapeRepr { shape, color }
    }
}

/// Payload of `a`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkVariant {
    #[serde(flatten)]
    pub attributes: LinkAttributes,
    #[serde(flatten)]
    pub shape: Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonVariant {
    #[serde(flatten)]
    pub shape: Shape,
}

/// Payload of `ruby`.
///
/// A simple ruby is exactly one base text plus one annotation and is encoded
/// as `{complex: false, rt}` with the base text as the only child. Every other
/// shape is complex and keeps its children (including `rt`/`rp`) as nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RubyRepr", into = "RubyRepr")]
pub enum RubyVariant {
    Simple {
        rt: String,
    },
    #[default]
    Complex,
}

#[derive(Serialize, Deserialize)]
struct RubyRepr {
    #[serde(default, deserialize_with = "null_as_default")]
    complex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rt: Option<String>,
}

impl From<RubyRepr> for RubyVariant {
    fn from(repr: RubyRepr) -> Self {
        if repr.complex {
            RubyVariant::Complex
        } else {
            RubyVariant::Simple {
                rt: repr.rt.unwrap_or_default(),
            }
        }
    }
}

impl From<RubyVariant> for RubyRepr {
    fn from(variant: RubyVariant) -> Self {
        match variant {
            RubyVariant::Simple { rt } => RubyRepr {
                complex: false,
                rt: Some(rt),
            },
            RubyVariant::Complex => RubyRepr {
                complex: true,
                rt: None,
            },
        }
    }
}

/// Payload of `color` and `colorbox` spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub click: bool,
}

/// Payload of `nav`: the whole menu hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavVariant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<NavEntry>,
}

/// One entry of the navigation hierarchy. Childless entries travel as a bare
/// name string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "NavRepr", into = "NavRepr")]
pub struct NavEntry {
    pub name: String,
    pub children: Vec<NavEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NavRepr {
    Leaf(String),
    Branch {
        name: String,
        #[serde(default)]
        children: Vec<NavEntry>,
    },
}

impl From<NavRepr> for NavEntry {
    fn from(repr: NavRepr) -> Self {
        match repr {
            NavRepr::Leaf(name) => NavEntry::leaf(name),
            NavRepr::Branch { name, children } => NavEntry { name, children },
        }
    }
}

impl From<NavEntry> for NavRepr {
    fn from(entry: NavEntry) -> Self {
        if entry.children.is_empty() {
            NavRepr::Leaf(entry.name)
        } else {
            NavRepr::Branch {
                name: entry.name,
                children: entry.children,
            }
        }
    }
}

impl NavEntry {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn branch(name: impl Into<String>, children: Vec<NavEntry>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Variant {
    Float(FloatVariant),
    Paragraph(ParagraphVariant),
    Image(ImageVariant),
    List(ListVariant),
    Audio(AudioAttributes),
    Video(VideoVariant),
    Track(TrackAttributes),
    Source(SourceAttributes),
    Link(LinkVariant),
    Button(ButtonVariant),
    Ruby(RubyVariant),
    Span(SpanVariant),
    Nav(NavVariant),
}

impl Variant {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Variant::Float(_) => PayloadKind::Float,
            Variant::Paragraph(_) => PayloadKind::Paragraph,
            Variant::Image(_) => PayloadKind::Image,
            Variant::List(_) => PayloadKind::List,
            Variant::Audio(_) => PayloadKind::Audio,
            Variant::Video(_) => PayloadKind::Video,
            Variant::Track(_) => PayloadKind::Track,
            Variant::Source(_) => PayloadKind::Source,
            Variant::Link(_) => PayloadKind::Link,
            Variant::Button(_) => PayloadKind::Button,
            Variant::Ruby(_) => PayloadKind::Ruby,
            Variant::Span(_) => PayloadKind::Span,
            Variant::Nav(_) => PayloadKind::Nav,
        }
    }
}

impl PayloadKind {
    /// The payload a freshly built node of this kind carries.
    pub fn default_variant(self) -> Option<Variant> {
        Some(match self {
            PayloadKind::None => return None,
            PayloadKind::Float => Variant::Float(FloatVariant::default()),
            PayloadKind::Paragraph => Variant::Paragraph(ParagraphVariant::default()),
            PayloadKind::Image => Variant::Image(ImageVariant::default()),
            PayloadKind::List => Variant::List(ListVariant::default()),
            PayloadKind::Audio => Variant::Audio(AudioAttributes::default()),
            PayloadKind::Video => Variant::Video(VideoVariant::default()),
            PayloadKind::Track => Variant::Track(TrackAttributes::default()),
            PayloadKind::Source => Variant::Source(SourceAttributes::default()),
            PayloadKind::Link => Variant::Link(LinkVariant::default()),
            PayloadKind::Button => Variant::Button(ButtonVariant::default()),
            PayloadKind::Ruby => Variant::Ruby(RubyVariant::default()),
            PayloadKind::Span => Variant::Span(SpanVariant::default()),
            PayloadKind::Nav => Variant::Nav(NavVariant::default()),
        })
    }

    /// Decodes a wire payload. A missing or `null` payload yields the default;
    /// payloads supplied for tags that carry none are ignored.
    pub fn decode(self, value: Option<&Value>) -> Result<Option<Variant>, serde_json::Error> {
        let value = match value {
            None | Some(Value::Null) => return Ok(self.default_variant()),
            Some(value) => value.clone(),
        };
        let variant = match self {
            PayloadKind::None => return Ok(None),
            PayloadKind::Float => Variant::Float(serde_json::from_value(value)?),
            PayloadKind::Paragraph => Variant::Paragraph(serde_json::from_value(value)?),
            PayloadKind::Image => Variant::Image(serde_json::from_value(value)?),
            PayloadKind::List => Variant::List(serde_json::from_value(value)?),
            PayloadKind::Audio => Variant::Audio(serde_json::from_value(value)?),
            PayloadKind::Video => Variant::Video(serde_json::from_value(value)?),
            PayloadKind::Track => Variant::Track(serde_json::from_value(value)?),
            PayloadKind::Source => Variant::Source(serde_json::from_value(value)?),
            PayloadKind::Link => Variant::Link(serde_json::from_value(value)?),
            PayloadKind::Button => Variant::Button(serde_json::from_value(value)?),
            PayloadKind::Ruby => Variant::Ruby(serde_json::from_value(value)?),
            PayloadKind::Span => Variant::Span(serde_json::from_value(value)?),
            PayloadKind::Nav => Variant::Nav(serde_json::from_value(value)?),
        };
        Ok(Some(variant))
    }
}

/// One node of the serialized tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocNode {
    #[serde(rename = "type")]
    pub tag: TypeTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    pub children: Vec<DocItem>,
}

/// A child of a [`DocNode`]: a text leaf or a nested node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DocItem {
    Text(String),
    Node(DocNode),
}

impl DocNode {
    /// A childless node carrying the tag's default payload.
    pub fn new(tag: TypeTag) -> Self {
        Self {
            tag,
            variant: tag.spec().payload.default_variant(),
            children: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with_child(mut self, child: impl Into<DocItem>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<DocItem>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

impl DocItem {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DocItem::Text(text) => Some(text),
            DocItem::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&DocNode> {
        match self {
            DocItem::Text(_) => None,
            DocItem::Node(node) => Some(node),
        }
    }
}

impl From<DocNode> for DocItem {
    fn from(node: DocNode) -> Self {
        DocItem::Node(node)
    }
}

impl From<String> for DocItem {
    fn from(text: String) -> Self {
        DocItem::Text(text)
    }
}

impl From<&str> for DocItem {
    fn from(text: &str) -> Self {
        DocItem::Text(text.to_string())
    }
}
