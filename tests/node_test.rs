#![allow(missing_docs)]

use jsonapi::{
    Data, Document, JsonApiError, Link, Links, Meta, Node, NodeKey, OnePayload, Relationship,
};
use serde_json::{Value, json};

fn node_with(kind: &str, id: &str, attributes: Value) -> Node {
    let mut node = Node::new(kind, id);
    if let Value::Object(map) = attributes {
        node.attributes = map;
    }
    node
}

#[test]
fn test_merge_source_wins() {
    let mut target = node_with("posts", "1", json!({ "title": "old", "body": "kept" }));
    target.client_id = Some("tmp".into());
    let mut source = node_with("", "", json!({ "title": "new" }));
    source.links = Some(Links::new().href("self", "/posts/1"));
    source
        .relationships
        .insert("author".into(), Relationship::one(Some(Node::new("people", "9"))));

    target.merge(source);

    assert_eq!(target.kind, "posts");
    assert_eq!(target.id, "1");
    assert_eq!(target.client_id.as_deref(), Some("tmp"));
    assert_eq!(Value::Object(target.attributes.clone()), json!({ "title": "new", "body": "kept" }));
    assert!(target.relationships.contains_key("author"));
    assert_eq!(target.links.as_ref().map(Links::len), Some(1));
}

#[test]
fn test_combine_peers_drops_conflicts() {
    let first = node_with("records", "1", json!({ "shared": 1, "only_first": true }));
    let mut second = node_with("", "2", json!({ "shared": 2, "only_second": "x" }));
    second.meta = Some(Meta::new().with("from", "second"));
    let third = node_with("", "", json!({ "shared": 3 }));

    let combined = Node::combine_peers([first, second, third]);

    assert_eq!(combined.kind, "records");
    assert_eq!(combined.id, "1");
    assert_eq!(
        Value::Object(combined.attributes),
        json!({ "only_first": true, "only_second": "x" })
    );
    assert_eq!(
        combined.meta.as_ref().and_then(|m| m.get("from")),
        Some(&json!("second"))
    );
}

#[test]
fn test_combine_no_peers() {
    assert_eq!(Node::combine_peers(Vec::new()), Node::default());
}

/// Cloned nodes share no storage with the original.
#[test]
fn test_clone_is_deep() {
    let mut original = node_with("posts", "1", json!({ "tags": ["a"] }));
    original.meta = Some(Meta::new().with("v", 1));

    let mut copy = original.clone();
    copy.attributes.insert("tags".into(), json!(["b"]));
    if let Some(meta) = copy.meta.as_mut() {
        meta.insert("v", 2);
    }

    assert_eq!(original.attributes["tags"], json!(["a"]));
    assert_eq!(original.meta.as_ref().and_then(|m| m.get("v")), Some(&json!(1)));
}

#[test]
fn test_shallow_keeps_identity_only() {
    let mut node = node_with("posts", "1", json!({ "title": "t" }));
    node.client_id = Some("c".into());
    node.meta = Some(Meta::new());

    let shallow = node.shallow();

    assert!(shallow.is_shallow());
    assert!(!node.is_shallow());
    assert_eq!(
        shallow.key(),
        NodeKey {
            kind: "posts",
            id: "1",
            by_client_id: false
        }
    );
    assert_eq!(shallow.client_id.as_deref(), Some("c"));
}

#[test]
fn test_identity_falls_back_to_client_id() {
    let mut saved = Node::new("drafts", "7");
    saved.client_id = Some("tmp-1".into());
    let mut unsaved = Node::new("drafts", "");
    unsaved.client_id = Some("7".into());
    let anonymous = Node::new("drafts", "");

    assert_eq!(saved.identity(), Some(saved.key()));
    assert_eq!(
        unsaved.identity(),
        Some(NodeKey {
            kind: "drafts",
            id: "7",
            by_client_id: true
        })
    );
    assert_ne!(saved.identity(), unsaved.identity());
    assert_eq!(anonymous.identity(), None);
}

#[test]
fn test_links_validation() {
    let valid = Links::new().href("self", "/a").link(
        "related",
        Link {
            href: "/b".into(),
            meta: None,
        },
    );
    assert!(valid.validate().is_ok());

    for bad in [json!(null), json!(1), json!({ "meta": {} }), json!({ "href": 5 })] {
        let mut links = Links::new();
        links.insert("next", bad);
        assert!(matches!(
            links.validate(),
            Err(JsonApiError::MalformedLinks { ref key }) if key == "next"
        ));
    }
}

#[test]
fn test_relationship_data_shapes() -> jsonapi::Result<()> {
    let one: Relationship = serde_json::from_value(json!({ "data": { "type": "a", "id": "1" } }))?;
    let many: Relationship = serde_json::from_value(json!({ "data": [{ "type": "a", "id": "1" }] }))?;
    let null: Relationship = serde_json::from_value(json!({ "data": null }))?;
    let missing: Relationship = serde_json::from_value(json!({ "links": { "self": "/x" } }))?;

    assert!(matches!(one.data, Data::One(Some(_))));
    assert!(matches!(many.data, Data::Many(ref nodes) if nodes.len() == 1));
    assert!(matches!(null.data, Data::One(None)));
    assert!(matches!(missing.data, Data::One(None)));
    assert_eq!(many.data.nodes().count(), 1);
    assert_eq!(null.data.nodes().count(), 0);

    assert_eq!(
        serde_json::to_value(Relationship::one(None))?,
        json!({ "data": null })
    );
    assert_eq!(
        serde_json::to_value(Relationship::many(Vec::new()))?,
        json!({ "data": [] })
    );
    Ok(())
}

#[test]
fn test_node_wire_format() -> jsonapi::Result<()> {
    let mut node = Node::new("posts", "");
    node.client_id = Some("tmp-1".into());

    assert_eq!(
        serde_json::to_value(&node)?,
        json!({ "type": "posts", "client-id": "tmp-1" })
    );
    Ok(())
}

#[test]
fn test_document_narrowing() -> jsonapi::Result<()> {
    let one: Document = serde_json::from_value(json!({
        "data": { "type": "a", "id": "1" },
        "included": [{ "type": "b", "id": "2" }],
        "meta": { "total": 1 }
    }))?;
    let payload: OnePayload = one.clone().into_one()?;
    assert_eq!(payload.data.map(|n| n.id), Some("1".to_string()));
    assert_eq!(payload.included.len(), 1);
    assert!(payload.meta.is_some());
    assert!(matches!(one.into_many(), Err(JsonApiError::UnexpectedInputShape(_))));

    let many: Document = serde_json::from_value(json!({ "data": [] }))?;
    assert!(many.clone().into_many()?.data.is_empty());
    assert!(matches!(many.into_one(), Err(JsonApiError::UnexpectedInputShape(_))));
    Ok(())
}
