use serde_json::json;
use tagdoc::session::{CONTENT_EDITABLE_ATTR, EDITABLE_CLASS, EDITED_CLASS, REGION_ID_ATTR};
use tagdoc::{
    ChangeRecord, Decoder, DocItem, DocNode, EditItem, EditSession, LiveTree, NodeId,
    SessionState,
};

fn document() -> DocItem {
    serde_json::from_value(json!({
        "type": "body",
        "children": [
            {"type": "h1", "children": ["Title"]},
            {"type": "section", "children": [
                {"type": "p", "children": ["first ", {"type": "strong", "children": ["bold"]}]},
                {"type": "p", "children": ["second"]}
            ]},
            {"type": "hr"}
        ]
    }))
    .unwrap()
}

fn open(tree: &mut LiveTree, root: NodeId, session: &mut EditSession) -> EditItem {
    Decoder::new(tree).editing(session).decode(root, &document())
}

#[test]
fn region_ids_follow_document_order() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    let record = open(&mut tree, root, &mut session);

    assert_eq!(record.region_ids(), vec![0, 1, 2]);
    let paths: Vec<_> = session.regions().map(|(_, region)| region.path.clone()).collect();
    assert_eq!(paths, vec![vec![0], vec![1, 0], vec![1, 1]]);

    let strong = tree.find_descendant(root, "strong").unwrap();
    assert!(!tree.has_class(strong, EDITABLE_CLASS));
    let first_p = session.region(1).unwrap().node;
    assert_eq!(tree.attribute(first_p, REGION_ID_ATTR), Some("1"));
    assert_eq!(tree.attribute(first_p, CONTENT_EDITABLE_ATTR), Some("plaintext-only"));
}

#[test]
fn region_ids_are_deterministic_across_trees() {
    let mut first = LiveTree::new("div");
    let mut second = LiveTree::new("div");
    let (a, b) = (first.root(), second.root());
    let mut one = EditSession::new();
    let mut two = EditSession::new();

    let left = serde_json::to_value(open(&mut first, a, &mut one)).unwrap();
    let right = serde_json::to_value(open(&mut second, b, &mut two)).unwrap();
    assert_eq!(left, right);
    assert_eq!(left["children"][1]["children"][0]["id"], 1);
}

#[test]
fn reverting_an_edit_clears_the_dirty_mark() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    open(&mut tree, root, &mut session);
    let h1 = session.region(0).unwrap().node;

    tree.set_text_content(h1, "Titel");
    assert!(session.on_input(&mut tree, h1));
    assert!(session.on_blur(&mut tree, h1));
    assert!(session.is_dirty(0));
    assert!(tree.has_class(h1, EDITED_CLASS));

    tree.set_text_content(h1, "Title");
    assert!(session.on_input(&mut tree, h1));
    assert!(session.on_blur(&mut tree, h1));
    assert!(!session.is_dirty(0));
    assert!(!tree.has_class(h1, EDITED_CLASS));
    assert_eq!(session.commit(&mut tree), 0);
    assert!(session.sink().is_empty());
}

#[test]
fn commit_emits_records_in_region_order() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    open(&mut tree, root, &mut session);

    let second = session.region(2).unwrap().node;
    let strong = tree.find_descendant(root, "strong").unwrap();
    let bold = tree.child(strong, 0).unwrap();
    tree.set_text_content(second, "changed");
    tree.set_text_content(bold, "BOLD");
    assert!(session.on_input(&mut tree, second));
    assert!(session.on_input(&mut tree, bold));

    assert_eq!(session.commit(&mut tree), 2);
    assert_eq!(
        serde_json::to_value(session.sink()).unwrap(),
        json!([
            {
                "position": [1, 0],
                "newContent": {"type": "p", "variant": {}, "children": [
                    "first ", {"type": "strong", "children": ["BOLD"]}
                ]}
            },
            {
                "position": [1, 1],
                "newContent": {"type": "p", "variant": {}, "children": ["changed"]}
            }
        ])
    );
    assert!(!session.is_dirty(1));
    assert!(!session.is_dirty(2));

    // The committed content is the new clean state.
    assert_eq!(session.commit(&mut tree), 0);
    assert!(session.on_input(&mut tree, second));
    assert!(session.on_blur(&mut tree, second));
    assert!(!session.is_dirty(2));
}

#[test]
fn stop_strips_markers_and_is_idempotent() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    open(&mut tree, root, &mut session);
    let h1 = session.region(0).unwrap().node;
    tree.set_text_content(h1, "New");
    session.on_input(&mut tree, h1);

    assert_eq!(session.stop(&mut tree), 1);
    assert_eq!(session.state(), SessionState::Idle);
    for node in tree.descendants(root) {
        assert!(!tree.has_class(node, EDITABLE_CLASS));
        assert!(!tree.has_class(node, EDITED_CLASS));
        assert_eq!(tree.attribute(node, REGION_ID_ATTR), None);
        assert_eq!(tree.attribute(node, CONTENT_EDITABLE_ATTR), None);
    }

    assert_eq!(session.stop(&mut tree), 0);
    assert!(!session.on_input(&mut tree, h1));
    assert!(!session.on_blur(&mut tree, h1));
    assert_eq!(session.commit(&mut tree), 0);
    assert_eq!(session.sink().len(), 1);
}

#[test]
fn opening_another_root_stops_the_previous_session() {
    let mut tree = LiveTree::new("main");
    let left = tree.create_element("div");
    let right = tree.create_element("div");
    let root = tree.root();
    tree.append_child(root, left);
    tree.append_child(root, right);
    let mut session = EditSession::new();

    open(&mut tree, left, &mut session);
    let h1 = session.region(0).unwrap().node;
    tree.set_text_content(h1, "Left");
    session.on_input(&mut tree, h1);

    let record = open(&mut tree, right, &mut session);
    assert_eq!(record.region_ids(), vec![0, 1, 2]);
    assert_eq!(session.root(), Some(right));
    assert!(!tree.has_class(h1, EDITABLE_CLASS));
    assert_eq!(
        session.sink().as_slice(),
        &[ChangeRecord {
            position: vec![0],
            new_content: DocItem::Node(DocNode::new(tagdoc::TypeTag::H1).with_child("Left")),
        }]
    );
    assert!(!session.on_input(&mut tree, h1));
}

#[test]
fn reopening_the_same_root_restarts_ids() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    open(&mut tree, root, &mut session);
    let stale = session.region(0).unwrap().node;

    for child in tree.children(root).to_vec() {
        tree.remove_child(root, child);
    }
    let record = open(&mut tree, root, &mut session);
    assert_eq!(record.region_ids(), vec![0, 1, 2]);
    assert_ne!(session.region(0).unwrap().node, stale);
    assert!(session.sink().is_empty());
}

#[test]
fn events_from_foreign_trees_or_outside_regions_are_ignored() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    open(&mut tree, root, &mut session);
    let h1 = session.region(0).unwrap().node;

    let mut other = LiveTree::new("div");
    assert!(!session.on_input(&mut other, h1));
    assert_eq!(session.commit(&mut other), 0);

    let section = tree.find_descendant(root, "section").unwrap();
    assert!(!session.on_input(&mut tree, section));
    assert!(!session.on_input(&mut tree, root));
    assert!(!session.is_dirty(0));
}

#[test]
fn decoding_without_edit_mode_registers_nothing() {
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let record = Decoder::new(&mut tree).decode(root, &document());
    assert!(record.region_ids().is_empty());
    assert!(
        tree.descendants(root)
            .into_iter()
            .all(|node| !tree.has_class(node, EDITABLE_CLASS))
    );
}

#[test]
fn nodes_two_levels_below_a_region_get_their_own_region() {
    let doc: DocItem = serde_json::from_value(json!({
        "type": "body",
        "children": [
            {"type": "p", "children": [
                {"type": "strong", "children": [{"type": "em", "children": ["deep"]}]}
            ]},
            {"type": "ul", "children": [{"type": "li", "children": ["item"]}]}
        ]
    }))
    .unwrap();
    let mut tree = LiveTree::new("div");
    let root = tree.root();
    let mut session = EditSession::new();
    let record = Decoder::new(&mut tree).editing(&mut session).decode(root, &doc);

    assert_eq!(record.region_ids(), vec![0, 1, 2]);
    let paths: Vec<_> = session.regions().map(|(_, region)| region.path.clone()).collect();
    assert_eq!(paths, vec![vec![0], vec![0, 0, 0], vec![1, 0]]);
    let strong = tree.find_descendant(root, "strong").unwrap();
    let em = tree.find_descendant(root, "em").unwrap();
    assert!(!tree.has_class(strong, EDITABLE_CLASS));
    assert!(tree.has_class(em, EDITABLE_CLASS));
    assert_eq!(session.region_id(em), Some(1));

    let deep = tree.child(em, 0).unwrap();
    tree.set_text_content(deep, "deeper");
    assert!(session.on_input(&mut tree, deep));
    assert!(!session.is_dirty(0));
    assert_eq!(session.commit(&mut tree), 1);
    assert_eq!(
        serde_json::to_value(session.sink()).unwrap(),
        json!([{
            "position": [0, 0, 0],
            "newContent": {"type": "em", "children": ["deeper"]}
        }])
    );
}
