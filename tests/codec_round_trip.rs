use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use tagdoc::schema::{
    AudioAttributes, ButtonVariant, Float, FloatVariant, ImageAttributes, ImageVariant, Lang,
    LinkAttributes, LinkVariant, ListVariant, NavEntry, NavVariant, ParagraphVariant, PayloadKind,
    RubyVariant, Shape, Size, SourceAttributes, SpanVariant, TrackAttributes, VideoAttributes,
    VideoVariant,
};
use tagdoc::{Color, Decoder, DocItem, DocNode, LiveTree, TypeTag, Variant, serialize, serialize_root};
mod proptest_config;

fn text() -> impl Strategy<Value = String> {
    "[a-z][a-z ]{0,6}"
}

fn attr() -> impl Strategy<Value = Option<String>> {
    option::of("[a-z0-9./]{0,5}")
}

fn color() -> impl Strategy<Value = Option<Color>> {
    option::of(0u8..11).prop_map(|index| index.and_then(Color::new))
}

fn shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        Just(Shape::None),
        Just(Shape::Broken),
        color().prop_map(Shape::Color),
        color().prop_map(Shape::Colorbox),
    ]
}

fn size() -> impl Strategy<Value = Size> {
    prop_oneof![
        Just(Size::Small),
        Just(Size::Medium),
        Just(Size::Large),
        Just(Size::Full),
    ]
}

fn nav_entries() -> impl Strategy<Value = Vec<NavEntry>> {
    let leaf = "[a-z/]{0,3}".prop_map(NavEntry::leaf);
    let entry = leaf.prop_recursive(2, 8, 3, |inner| {
        ("[a-z/]{0,3}", vec(inner, 0..3)).prop_map(|(name, children)| NavEntry::branch(name, children))
    });
    vec(entry, 0..3)
}

fn variant_for(kind: PayloadKind) -> BoxedStrategy<Option<Variant>> {
    match kind {
        PayloadKind::None => Just(None).boxed(),
        PayloadKind::Float => prop_oneof![Just(Float::None), Just(Float::Left), Just(Float::Right)]
            .prop_map(|float| Some(Variant::Float(FloatVariant { float })))
            .boxed(),
        PayloadKind::Paragraph => any::<bool>()
            .prop_map(|en| {
                Some(Variant::Paragraph(ParagraphVariant {
                    lang: en.then_some(Lang::En),
                }))
            })
            .boxed(),
        PayloadKind::Image => (attr(), attr(), size())
            .prop_map(|(src, alt, size)| {
                Some(Variant::Image(ImageVariant {
                    attributes: ImageAttributes { src, alt },
                    size,
                }))
            })
            .boxed(),
        PayloadKind::List => option::of(-50i64..50)
            .prop_map(|start| Some(Variant::List(ListVariant { start })))
            .boxed(),
        PayloadKind::Audio => (attr(), attr(), attr())
            .prop_map(|(src, controls, looping)| {
                Some(Variant::Audio(AudioAttributes {
                    src,
                    controls,
                    looping,
                    ..Default::default()
                }))
            })
            .boxed(),
        PayloadKind::Video => (attr(), attr(), size())
            .prop_map(|(src, poster, size)| {
                Some(Variant::Video(VideoVariant {
                    attributes: VideoAttributes {
                        src,
                        poster,
                        ..Default::default()
                    },
                    size,
                }))
            })
            .boxed(),
        PayloadKind::Track => (attr(), attr())
            .prop_map(|(src, srclang)| {
                Some(Variant::Track(TrackAttributes {
                    src,
                    srclang,
                    ..Default::default()
                }))
            })
            .boxed(),
        PayloadKind::Source => (attr(), attr())
            .prop_map(|(src, media)| Some(Variant::Source(SourceAttributes { src, media })))
            .boxed(),
        PayloadKind::Link => (attr(), attr(), shape())
            .prop_map(|(href, target, shape)| {
                Some(Variant::Link(LinkVariant {
                    attributes: LinkAttributes {
                        href,
                        target,
                        ..Default::default()
                    },
                    shape,
                }))
            })
            .boxed(),
        PayloadKind::Button => shape()
            .prop_map(|shape| Some(Variant::Button(ButtonVariant { shape })))
            .boxed(),
        PayloadKind::Ruby => Just(Some(Variant::Ruby(RubyVariant::Complex))).boxed(),
        PayloadKind::Span => (color(), any::<bool>())
            .prop_map(|(color, click)| Some(Variant::Span(SpanVariant { color, click })))
            .boxed(),
        PayloadKind::Nav => nav_entries()
            .prop_map(|data| Some(Variant::Nav(NavVariant { data })))
            .boxed(),
    }
}

fn is_leaf_tag(tag: TypeTag) -> bool {
    tag == TypeTag::Nav || tag.spec().self_closing
}

fn leaf_node() -> impl Strategy<Value = DocItem> {
    let tags: Vec<TypeTag> = TypeTag::ALL.into_iter().filter(|&tag| is_leaf_tag(tag)).collect();
    proptest::sample::select(tags).prop_flat_map(|tag| {
        variant_for(tag.spec().payload).prop_map(move |variant| {
            DocItem::Node(DocNode {
                tag,
                variant,
                children: Vec::new(),
            })
        })
    })
}

fn simple_ruby() -> impl Strategy<Value = DocItem> {
    (text(), "[a-z]{0,4}").prop_map(|(base, rt)| {
        DocItem::Node(
            DocNode::new(TypeTag::Ruby)
                .with_variant(Variant::Ruby(RubyVariant::Simple { rt }))
                .with_child(base),
        )
    })
}

// A complex ruby whose children look like `text + rt` would read back as
// simple; pad it so the shape stays complex.
fn keep_complex(mut node: DocNode) -> DocNode {
    if node.tag == TypeTag::Ruby
        && let [first, second] = node.children.as_slice()
    {
        let is_rt = |item: &DocItem| item.as_node().is_some_and(|n| n.tag == TypeTag::Rt);
        let looks_simple = (first.as_text().is_some() && is_rt(second))
            || (second.as_text().is_some() && is_rt(first));
        if looks_simple {
            node.children.push(DocItem::Text("pad".into()));
        }
    }
    node
}

fn doc_item() -> impl Strategy<Value = DocItem> {
    let leaf = prop_oneof![
        3 => text().prop_map(DocItem::Text),
        1 => leaf_node(),
        1 => simple_ruby(),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        let tags: Vec<TypeTag> = TypeTag::ALL
            .into_iter()
            .filter(|&tag| tag != TypeTag::Body && !is_leaf_tag(tag))
            .collect();
        (proptest::sample::select(tags), vec(inner, 0..4)).prop_flat_map(|(tag, children)| {
            variant_for(tag.spec().payload).prop_map(move |variant| {
                DocItem::Node(keep_complex(DocNode {
                    tag,
                    variant,
                    children: children.clone(),
                }))
            })
        })
    })
}

fn body() -> impl Strategy<Value = DocNode> {
    vec(doc_item(), 0..5).prop_map(|children| DocNode::new(TypeTag::Body).with_children(children))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_config::cases()))]
    #[test]
    fn prop_serialize_after_deserialize_is_identity(item in doc_item()) {
        let mut tree = LiveTree::new("div");
        let root = tree.root();
        let built = Decoder::new(&mut tree).decode(root, &item);
        let back = match built.as_record() {
            Some(record) => serialize(&tree, record.node),
            None => serialize(&tree, tree.children(root)[0]),
        };
        prop_assert_eq!(back, Some(item));
    }

    #[test]
    fn prop_body_round_trip_onto_any_container(doc in body()) {
        let mut tree = LiveTree::new("main");
        let root = tree.root();
        Decoder::new(&mut tree).decode(root, &DocItem::Node(doc.clone()));
        prop_assert_eq!(serialize_root(&tree, root), Some(doc));
    }

    #[test]
    fn prop_wire_form_round_trips(doc in body()) {
        let json = serde_json::to_value(&doc).unwrap();
        let back: DocNode = serde_json::from_value(json).unwrap();
        prop_assert_eq!(back, doc);
    }

    #[test]
    fn prop_edit_mode_builds_the_same_tree(doc in body()) {
        let mut plain = LiveTree::new("div");
        let plain_root = plain.root();
        Decoder::new(&mut plain).decode(plain_root, &DocItem::Node(doc.clone()));

        let mut edited = LiveTree::new("div");
        let edited_root = edited.root();
        let mut session = tagdoc::EditSession::new();
        Decoder::new(&mut edited)
            .editing(&mut session)
            .decode(edited_root, &DocItem::Node(doc.clone()));
        session.stop(&mut edited);

        prop_assert_eq!(serialize_root(&edited, edited_root), Some(doc));
        prop_assert_eq!(edited.to_markup(edited_root), plain.to_markup(plain_root));
    }
}
