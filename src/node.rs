//! The normalized document representation.
//!
//! A [`Node`] is one resource object as it appears on the wire. The marshaler
//! produces nodes from models, the unmarshaler consumes them, and the payload
//! envelopes ([`OnePayload`], [`ManyPayload`], [`Document`]) bind root nodes to
//! the side-loaded `included` set.
//!
//! Nodes own all of their maps, so `Clone` is a deep copy: two nodes describing
//! the same entity never share attribute, relationship, links or meta storage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{JsonApiError, Result};

/// One resource object: `type`, `id`, `client-id`, attributes, relationships,
/// links and meta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// The document `type` of the resource.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// String form of the primary key. Omitted from the wire when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Client-generated identifier for resources that have no id yet.
    #[serde(rename = "client-id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Attribute values keyed by their document key.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    /// Relationship entries keyed by their document key.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub relationships: IndexMap<String, Relationship>,
    /// Resource-level links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// Resource-level meta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Node {
    /// Creates a node with the given type and id and nothing else.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns the shallow reference to this node: `type`, `id` and
    /// `client-id` only. Used inside relationship entries when the full node is
    /// side-loaded into `included`.
    pub fn shallow(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            ..Self::default()
        }
    }

    /// Returns true if the node carries only identity (no attributes, no
    /// relationships, no links, no meta).
    pub fn is_shallow(&self) -> bool {
        self.attributes.is_empty()
            && self.relationships.is_empty()
            && self.links.is_none()
            && self.meta.is_none()
    }

    /// The `(type, id)` key of the node.
    pub fn key(&self) -> NodeKey<'_> {
        NodeKey {
            kind: &self.kind,
            id: &self.id,
            by_client_id: false,
        }
    }

    /// The identity used to de-duplicate and resolve nodes: the `(type, id)`
    /// key, or `(type, client-id)` when the node has no id. Nodes with
    /// neither have no identity.
    pub fn identity(&self) -> Option<NodeKey<'_>> {
        if !self.id.is_empty() {
            return Some(self.key());
        }
        self.client_id.as_deref().map(|client_id| NodeKey {
            kind: &self.kind,
            id: client_id,
            by_client_id: true,
        })
    }

    /// Overlays `source` onto `self`.
    ///
    /// Non-empty `type`, `id`, `client-id`, links and meta of `source` replace
    /// those of `self`. Attribute and relationship maps are unioned with
    /// `source` winning per key.
    pub fn merge(&mut self, source: Node) {
        let Node {
            kind,
            id,
            client_id,
            attributes,
            relationships,
            links,
            meta,
        } = source;

        if !kind.is_empty() {
            self.kind = kind;
        }
        if !id.is_empty() {
            self.id = id;
        }
        if client_id.is_some() {
            self.client_id = client_id;
        }
        if links.is_some() {
            self.links = links;
        }
        if meta.is_some() {
            self.meta = meta;
        }
        self.attributes.extend(attributes);
        self.relationships.extend(relationships);
    }

    /// Folds sibling nodes (e.g. the contributions of several embedded
    /// structs at the same depth) into one node.
    ///
    /// Identity fields, relationships, links and meta keep the first non-empty
    /// contribution. Unlike [`Node::merge`], an attribute key contributed by
    /// more than one peer is ambiguous: it is marked as a conflict and left out
    /// of the combined node entirely.
    pub fn combine_peers(peers: impl IntoIterator<Item = Node>) -> Node {
        let mut combined = Node::default();
        let mut attributes: IndexMap<String, Slot> = IndexMap::new();

        for peer in peers {
            if combined.kind.is_empty() {
                combined.kind = peer.kind;
            }
            if combined.id.is_empty() {
                combined.id = peer.id;
            }
            if combined.client_id.is_none() {
                combined.client_id = peer.client_id;
            }
            if combined.links.is_none() {
                combined.links = peer.links;
            }
            if combined.meta.is_none() {
                combined.meta = peer.meta;
            }
            for (key, relationship) in peer.relationships {
                combined.relationships.entry(key).or_insert(relationship);
            }
            for (key, value) in peer.attributes {
                attributes
                    .entry(key)
                    .and_modify(|slot| *slot = Slot::Conflict)
                    .or_insert(Slot::Value(value));
            }
        }

        combined.attributes = attributes
            .into_iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Value(value) => Some((key, value)),
                Slot::Conflict => None,
            })
            .collect();
        combined
    }
}

/// Attribute slot used while combining peers.
enum Slot {
    Value(Value),
    Conflict,
}

/// Borrowed identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey<'a> {
    /// The node's `type`.
    pub kind: &'a str,
    /// The node's `id`, or its `client-id` when `by_client_id` is set.
    pub id: &'a str,
    /// Set when the node is identified by its `client-id`.
    pub by_client_id: bool,
}

/// A relationship entry: linkage data plus optional links and meta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// The linked node(s). A missing `data` member reads as a null to-one link.
    #[serde(default)]
    pub data: Data,
    /// Relationship-level links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// Relationship-level meta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Relationship {
    /// A to-one relationship entry.
    pub fn one(node: Option<Node>) -> Self {
        Self {
            data: Data::One(node.map(Box::new)),
            ..Self::default()
        }
    }

    /// A to-many relationship entry.
    pub fn many(nodes: Vec<Node>) -> Self {
        Self {
            data: Data::Many(nodes),
            ..Self::default()
        }
    }
}

/// Resource linkage: `null`, a single node, or an array of nodes.
///
/// Used both for relationship entries and for the top-level `data` member of
/// a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    /// An array of nodes.
    Many(Vec<Node>),
    /// A single node, or `null`.
    One(Option<Box<Node>>),
}

impl Default for Data {
    fn default() -> Self {
        Self::One(None)
    }
}

impl Data {
    /// Iterates the linked nodes regardless of cardinality.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        let (one, many) = match self {
            Self::One(node) => (node.as_deref(), Default::default()),
            Self::Many(nodes) => (None, nodes.iter()),
        };
        one.into_iter().chain(many)
    }
}

// --- LINKS & META ---

/// A links object. Every entry must be a string or a [`Link`] object; this is
/// checked by [`Links::validate`] before a document is emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(Map<String, Value>);

impl Links {
    /// Creates an empty links object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain URL entry.
    pub fn href(mut self, key: impl Into<String>, href: impl Into<String>) -> Self {
        self.0.insert(key.into(), Value::String(href.into()));
        self
    }

    /// Adds a structured link entry.
    pub fn link(mut self, key: impl Into<String>, link: Link) -> Self {
        let mut object = Map::new();
        object.insert("href".into(), Value::String(link.href));
        if let Some(meta) = link.meta {
            object.insert("meta".into(), Value::Object(meta.0));
        }
        self.0.insert(key.into(), Value::Object(object));
        self
    }

    /// Inserts an arbitrary value. Values that are not links are rejected when
    /// the document is marshaled.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that every entry is a string or an object with a string `href`.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.0 {
            let valid = match value {
                Value::String(_) => true,
                Value::Object(object) => matches!(object.get("href"), Some(Value::String(_))),
                _ => false,
            };
            if !valid {
                return Err(JsonApiError::MalformedLinks { key: key.clone() });
            }
        }
        Ok(())
    }
}

/// A structured link: `{"href": ..., "meta": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL.
    pub href: String,
    /// Optional link meta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A free-form meta object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(Map<String, Value>);

impl Meta {
    /// Creates an empty meta object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Meta {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// --- PAYLOAD ENVELOPES ---

/// A document whose primary data is a single resource (or `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnePayload {
    /// The root node.
    pub data: Option<Node>,
    /// De-duplicated side-loaded nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Node>,
    /// Top-level links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// Top-level meta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A document whose primary data is an array of resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManyPayload {
    /// The root nodes.
    pub data: Vec<Node>,
    /// De-duplicated side-loaded nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Node>,
    /// Top-level links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    /// Top-level meta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A received document of either shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary data.
    #[serde(default)]
    pub data: Data,
    /// Side-loaded nodes.
    #[serde(default)]
    pub included: Vec<Node>,
    /// Top-level links.
    #[serde(default)]
    pub links: Option<Links>,
    /// Top-level meta.
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl Document {
    /// Narrows the document to a single-resource payload.
    pub fn into_one(self) -> Result<OnePayload> {
        match self.data {
            Data::One(data) => Ok(OnePayload {
                data: data.map(|node| *node),
                included: self.included,
                links: self.links,
                meta: self.meta,
            }),
            Data::Many(_) => Err(JsonApiError::UnexpectedInputShape(
                "expected a single resource in `data`, found an array".into(),
            )),
        }
    }

    /// Narrows the document to a resource-collection payload.
    pub fn into_many(self) -> Result<ManyPayload> {
        match self.data {
            Data::Many(data) => Ok(ManyPayload {
                data,
                included: self.included,
                links: self.links,
                meta: self.meta,
            }),
            Data::One(_) => Err(JsonApiError::UnexpectedInputShape(
                "expected an array of resources in `data`, found a single resource".into(),
            )),
        }
    }
}
