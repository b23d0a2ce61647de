#![allow(clippy::float_cmp)]

use serde_json::json;
use uuid::Uuid;

use super::*;

fn make_element(kind: ElementKind, x: f64, y: f64) -> Element {
    make_element_with_id(Uuid::new_v4(), kind, x, y)
}

fn make_element_with_id(id: Uuid, kind: ElementKind, x: f64, y: f64) -> Element {
    ElementDraft::new(kind, Point::new(x, y)).into_element(id, Uuid::new_v4(), "actor-1".to_owned(), "Ada".to_owned())
}

// =============================================================
// ElementKind
// =============================================================

#[test]
fn kind_serde_uses_lowercase_names() {
    let cases = [(ElementKind::Postit, "\"postit\""), (ElementKind::Text, "\"text\""), (ElementKind::Image, "\"image\"")];
    for (kind, expected) in cases {
        assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
        assert_eq!(ElementKind::parse(kind.as_str()), Some(kind));
    }
}

#[test]
fn kind_parse_rejects_unknown() {
    assert_eq!(ElementKind::parse("rect"), None);
    assert_eq!(ElementKind::parse(""), None);
}

// =============================================================
// ElementDraft
// =============================================================

#[test]
fn postit_draft_defaults() {
    let draft = ElementDraft::new(ElementKind::Postit, Point::new(100.0, 200.0));
    assert_eq!(draft.size, Size::new(200.0, 150.0));
    assert_eq!(draft.content, "New note");
    assert_eq!(draft.color.as_deref(), Some("#FEF3C7"));
    assert!(draft.validate().is_ok());
}

#[test]
fn text_draft_defaults_have_no_color() {
    let draft = ElementDraft::new(ElementKind::Text, Point::default());
    assert_eq!(draft.size, Size::new(150.0, 100.0));
    assert!(draft.color.is_none());
}

#[test]
fn image_draft_requires_reference() {
    let draft = ElementDraft::new(ElementKind::Image, Point::default());
    assert_eq!(draft.validate(), Err(DraftError::MissingImageRef));
    let draft = draft.with_image_ref("boards/abc/cat.png");
    assert!(draft.validate().is_ok());
}

#[test]
fn draft_rejects_long_content() {
    let draft = ElementDraft::new(ElementKind::Text, Point::default()).with_content("x".repeat(1001));
    assert_eq!(draft.validate(), Err(DraftError::ContentTooLong { max: 1000 }));
}

#[test]
fn draft_counts_characters_not_bytes() {
    let draft = ElementDraft::new(ElementKind::Text, Point::default()).with_content("한".repeat(1000));
    assert!(draft.validate().is_ok());
}

#[test]
fn draft_rejects_out_of_bounds_size() {
    let small = ElementDraft::new(ElementKind::Postit, Point::default()).with_size(Size::new(10.0, 100.0));
    assert!(matches!(small.validate(), Err(DraftError::SizeOutOfBounds { .. })));
    let tall = ElementDraft::new(ElementKind::Postit, Point::default()).with_size(Size::new(100.0, 601.0));
    assert!(matches!(tall.validate(), Err(DraftError::SizeOutOfBounds { .. })));
}

#[test]
fn into_element_carries_ids_and_fields() {
    let board_id = Uuid::new_v4();
    let id = Uuid::new_v4();
    let el = ElementDraft::new(ElementKind::Postit, Point::new(1.0, 2.0))
        .with_content("hello")
        .into_element(id, board_id, "owner".to_owned(), "Owner".to_owned());
    assert_eq!(el.id, id);
    assert_eq!(el.board_id, board_id);
    assert_eq!(el.position, Point::new(1.0, 2.0));
    assert_eq!(el.content, "hello");
    assert_eq!(el.owner_id, "owner");
}

// =============================================================
// ElementPatch
// =============================================================

#[test]
fn patch_applies_only_present_fields() {
    let mut el = make_element(ElementKind::Postit, 0.0, 0.0);
    let patch = ElementPatch { content: Some("edited".into()), ..ElementPatch::default() };
    patch.apply_to(&mut el);
    assert_eq!(el.content, "edited");
    assert_eq!(el.position, Point::new(0.0, 0.0));
    assert_eq!(el.color.as_deref(), Some("#FEF3C7"));
}

#[test]
fn patch_overwrites_content_wholesale() {
    let mut el = make_element(ElementKind::Text, 0.0, 0.0);
    el.content = "alpha beta".into();
    ElementPatch { content: Some("gamma".into()), ..ElementPatch::default() }.apply_to(&mut el);
    assert_eq!(el.content, "gamma");
}

#[test]
fn patch_recolors_but_null_color_keeps_existing() {
    let mut el = make_element(ElementKind::Postit, 0.0, 0.0);
    ElementPatch { color: Some("#DBEAFE".into()), ..ElementPatch::default() }.apply_to(&mut el);
    assert_eq!(el.color.as_deref(), Some("#DBEAFE"));

    let cleared: ElementPatch = serde_json::from_value(json!({"color": null})).unwrap();
    assert!(cleared.is_empty());
    cleared.apply_to(&mut el);
    assert_eq!(el.color.as_deref(), Some("#DBEAFE"));
}

#[test]
fn position_patch_is_position_only() {
    let patch = ElementPatch::position(Point::new(3.0, 4.0));
    assert_eq!(patch.position, Some(Point::new(3.0, 4.0)));
    assert!(patch.size.is_none() && patch.content.is_none() && patch.color.is_none());
    assert!(!patch.is_empty());
    assert!(ElementPatch::default().is_empty());
}

#[test]
fn patch_validation_checks_only_present_fields() {
    assert!(ElementPatch::position(Point::new(-1.0e6, 4.0)).validate().is_ok());
    let long = ElementPatch { content: Some("x".repeat(1001)), ..ElementPatch::default() };
    assert_eq!(long.validate(), Err(DraftError::ContentTooLong { max: 1000 }));
    let wide = ElementPatch { size: Some(Size::new(801.0, 100.0)), ..ElementPatch::default() };
    assert!(matches!(wide.validate(), Err(DraftError::SizeOutOfBounds { .. })));
}

#[test]
fn patch_serializes_without_absent_fields() {
    let patch = ElementPatch::position(Point::new(3.0, 4.0));
    let value = serde_json::to_value(&patch).unwrap();
    assert_eq!(value, json!({"position": {"x": 3.0, "y": 4.0}}));
}

// =============================================================
// DocStore
// =============================================================

#[test]
fn new_store_is_empty() {
    let store = DocStore::new();
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
}

#[test]
fn insert_is_idempotent_by_id() {
    let mut store = DocStore::new();
    let id = Uuid::new_v4();
    assert!(store.insert(make_element_with_id(id, ElementKind::Postit, 1.0, 1.0)));
    assert!(!store.insert(make_element_with_id(id, ElementKind::Postit, 9.0, 9.0)));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&id).map(|e| e.position), Some(Point::new(1.0, 1.0)));
}

#[test]
fn ordered_follows_insertion() {
    let mut store = DocStore::new();
    let a = make_element(ElementKind::Postit, 0.0, 0.0);
    let b = make_element(ElementKind::Text, 0.0, 0.0);
    let c = make_element(ElementKind::Postit, 0.0, 0.0);
    let ids = [a.id, b.id, c.id];
    store.insert(a);
    store.insert(b);
    store.insert(c);
    let got: Vec<_> = store.ordered().map(|e| e.id).collect();
    assert_eq!(got, ids);
}

#[test]
fn remove_returns_element_and_updates_order() {
    let mut store = DocStore::new();
    let a = make_element(ElementKind::Postit, 0.0, 0.0);
    let b = make_element(ElementKind::Postit, 0.0, 0.0);
    let (a_id, b_id) = (a.id, b.id);
    store.insert(a);
    store.insert(b);
    assert_eq!(store.remove(&a_id).map(|e| e.id), Some(a_id));
    assert!(store.remove(&a_id).is_none());
    let got: Vec<_> = store.ordered().map(|e| e.id).collect();
    assert_eq!(got, vec![b_id]);
}

#[test]
fn apply_patch_unknown_id_is_noop() {
    let mut store = DocStore::new();
    store.insert(make_element(ElementKind::Postit, 0.0, 0.0));
    let applied = store.apply_patch(&Uuid::new_v4(), &ElementPatch::position(Point::new(5.0, 5.0)));
    assert!(!applied);
    assert_eq!(store.len(), 1);
}

#[test]
fn apply_patch_known_id_updates() {
    let mut store = DocStore::new();
    let el = make_element(ElementKind::Postit, 0.0, 0.0);
    let id = el.id;
    store.insert(el);
    assert!(store.apply_patch(&id, &ElementPatch::position(Point::new(5.0, 6.0))));
    assert_eq!(store.get(&id).map(|e| e.position), Some(Point::new(5.0, 6.0)));
}

#[test]
fn set_position_unknown_id_is_false() {
    let mut store = DocStore::new();
    assert!(!store.set_position(&Uuid::new_v4(), Point::new(1.0, 1.0)));
}

#[test]
fn load_snapshot_replaces_and_dedupes() {
    let mut store = DocStore::new();
    store.insert(make_element(ElementKind::Text, 0.0, 0.0));
    let id = Uuid::new_v4();
    let first = make_element_with_id(id, ElementKind::Postit, 1.0, 1.0);
    let dup = make_element_with_id(id, ElementKind::Postit, 2.0, 2.0);
    let other = make_element(ElementKind::Image, 3.0, 3.0);
    let other_id = other.id;
    store.load_snapshot(vec![first, dup, other]);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&id).map(|e| e.position), Some(Point::new(1.0, 1.0)));
    let got: Vec<_> = store.ordered().map(|e| e.id).collect();
    assert_eq!(got, vec![id, other_id]);
}

#[test]
fn element_serde_round_trip_keeps_optional_fields() {
    let el = make_element(ElementKind::Image, 1.0, 2.0);
    let mut el = el;
    el.image_ref = Some("boards/x/y.png".into());
    let json = serde_json::to_string(&el).unwrap();
    let back: Element = serde_json::from_str(&json).unwrap();
    assert_eq!(back, el);
}
