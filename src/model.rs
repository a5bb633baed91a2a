//! Defines the model metadata the engine walks instead of runtime reflection.
//!
//! `#[derive(JsonApiModel)]` emits a static [`Schema`] per struct plus the
//! [`Resource`] accessors that hand out each annotated field as a [`FieldRef`]
//! or [`FieldMut`]. The field value traits ([`Identifier`], [`Attribute`],
//! [`Relation`]) say how a Rust type behaves in each document role.

use std::sync::Arc;

use serde_json::Value;

use crate::codec::{CodecContext, CodecError};
use crate::error::Result;
use crate::node::{Links, Meta, Node};
use crate::unmarshal::Decoder;

/// Static description of a model struct.
#[derive(Debug)]
pub struct Schema {
    /// Rust name of the struct.
    pub name: &'static str,
    /// Every annotated field, in declaration order. The position in this slice
    /// is the index passed to [`Resource::field`].
    pub fields: &'static [FieldSpec],
}

/// Static description of one annotated field.
#[derive(Debug)]
pub struct FieldSpec {
    /// Rust name of the field.
    pub ident: &'static str,
    /// Raw annotation parts: the role keyword followed by its arguments,
    /// e.g. `["attr", "created_at", "iso8601"]`.
    pub annotation: &'static [&'static str],
    /// What the field's Rust type can do.
    pub kind: FieldKind,
    /// Schema of the embedded struct, for `embed` fields.
    pub embedded: Option<fn() -> &'static Schema>,
}

/// The document capability of a field's Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Usable as primary key or client id.
    Identifier {
        /// Underlying key type.
        kind: IdKind,
        /// Wrapped in `Option`.
        nullable: bool,
    },
    /// Usable as an attribute.
    Attribute {
        /// Underlying value type.
        kind: ValueKind,
        /// Wrapped in `Option`.
        nullable: bool,
    },
    /// Usable as a relationship.
    Relation {
        /// To-one or to-many.
        cardinality: Cardinality,
        /// A to-one link that may be absent.
        nullable: bool,
    },
    /// An embedded model whose fields are flattened into the parent.
    Embedded,
    /// The annotation role was not recognized, so no accessor exists.
    Unknown,
}

impl FieldKind {
    /// Returns true for `Option`-wrapped values, the `IsPtr` flag of a field.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Identifier { nullable, .. }
            | Self::Attribute { nullable, .. }
            | Self::Relation { nullable, .. } => *nullable,
            Self::Embedded | Self::Unknown => false,
        }
    }
}

/// Primary key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// `String`.
    String,
    /// Signed integers.
    Signed,
    /// Unsigned integers.
    Unsigned,
    /// Floating point numbers; never a valid key.
    Float,
}

/// Attribute value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `bool`.
    Bool,
    /// Signed integers of any width.
    Signed,
    /// Unsigned integers of any width.
    Unsigned,
    /// `f32` / `f64`.
    Float,
    /// `String`.
    String,
    /// Timestamps.
    Time,
    /// `Vec` of attribute values.
    Sequence,
    /// String-keyed maps of attribute values.
    Map,
    /// Untyped `serde_json::Value`.
    Json,
    /// A type handled by a registered codec.
    Custom,
}

/// Relationship cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A single, possibly absent, related model.
    One,
    /// A sequence of related models.
    Many,
}

// --- MODEL TRAITS ---

/// Object-safe view of a model instance.
///
/// Implemented by `#[derive(JsonApiModel)]`. The capability hooks default to
/// `None`; the derive forwards them to [`Linkable`], [`Metable`],
/// [`RelationshipLinkable`] and [`RelationshipMetable`] when the struct is
/// annotated with `#[jsonapi(links, meta, relationship_links, relationship_meta)]`.
pub trait Resource {
    /// The static schema of the concrete type.
    fn schema(&self) -> &'static Schema;

    /// Shared access to the field at `index` in [`Schema::fields`].
    fn field(&self, index: usize) -> Option<FieldRef<'_>>;

    /// Exclusive access to the field at `index` in [`Schema::fields`].
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>>;

    /// Resource-level links.
    fn document_links(&self) -> Option<Links> {
        None
    }

    /// Resource-level meta.
    fn document_meta(&self) -> Option<Meta> {
        None
    }

    /// Links attached to the relationship entry `relation`.
    fn relation_links(&self, _relation: &str) -> Option<Links> {
        None
    }

    /// Meta attached to the relationship entry `relation`.
    fn relation_meta(&self, _relation: &str) -> Option<Meta> {
        None
    }
}

/// A concrete model type that the unmarshaler can allocate.
pub trait Model: Resource + Default + 'static {
    /// The static schema of this type.
    fn describe() -> &'static Schema;
}

/// Provides resource-level links.
pub trait Linkable {
    /// Links for this resource, if any.
    fn links(&self) -> Option<Links>;
}

/// Provides resource-level meta.
pub trait Metable {
    /// Meta for this resource, if any.
    fn meta(&self) -> Option<Meta>;
}

/// Provides links for individual relationship entries.
pub trait RelationshipLinkable {
    /// Links for the relationship named `relation`, if any.
    fn relationship_links(&self, relation: &str) -> Option<Links>;
}

/// Provides meta for individual relationship entries.
pub trait RelationshipMetable {
    /// Meta for the relationship named `relation`, if any.
    fn relationship_meta(&self, relation: &str) -> Option<Meta>;
}

/// Shared access to one annotated field.
pub enum FieldRef<'a> {
    /// A primary key or client id.
    Identifier(&'a dyn IdentifierField),
    /// An attribute.
    Attribute(&'a dyn AttributeField),
    /// A relationship.
    Relation(&'a dyn RelationField),
    /// An embedded model.
    Embedded(&'a dyn Resource),
}

/// Exclusive access to one annotated field.
pub enum FieldMut<'a> {
    /// A primary key or client id.
    Identifier(&'a mut dyn IdentifierField),
    /// An attribute.
    Attribute(&'a mut dyn AttributeField),
    /// A relationship.
    Relation(&'a mut dyn RelationField),
    /// An embedded model.
    Embedded(&'a mut dyn Resource),
}

// --- FIELD VALUE TRAITS ---

/// Types usable as a primary key or client id.
pub trait Identifier: Sized + 'static {
    /// Underlying key type.
    const KIND: IdKind;
    /// `true` for `Option` wrappers.
    const NULLABLE: bool = false;

    /// String form of the key, or `None` when there is no key.
    fn to_id(&self) -> Option<String>;

    /// Parses a document id. `None` if it does not fit the type.
    fn from_id(id: &str) -> Option<Self>;
}

/// Object-safe form of [`Identifier`].
pub trait IdentifierField {
    /// String form of the key.
    fn encode_id(&self) -> Option<String>;
    /// Replaces the key from a document id. Returns false if it does not fit.
    fn assign_id(&mut self, id: &str) -> bool;
}

impl<T: Identifier> IdentifierField for T {
    fn encode_id(&self) -> Option<String> {
        self.to_id()
    }

    fn assign_id(&mut self, id: &str) -> bool {
        match T::from_id(id) {
            Some(value) => {
                *self = value;
                true
            }
            None => false,
        }
    }
}

/// Types usable as attributes.
///
/// Custom scalar types only need an empty impl (`impl Attribute for Money {}`)
/// plus a codec registered in the [`CodecRegistry`](crate::CodecRegistry):
/// the default `encode`/`decode` report the missing codec.
pub trait Attribute: Sized + 'static {
    /// Underlying value type.
    const KIND: ValueKind = ValueKind::Custom;
    /// `true` for `Option` wrappers.
    const NULLABLE: bool = false;

    /// Whether `omitempty` suppresses this value.
    fn is_empty(&self) -> bool {
        false
    }

    /// Whether this is a zero timestamp, which is never written.
    fn is_zero_time(&self) -> bool {
        false
    }

    /// Built-in encoding. Consulted only when no codec is registered.
    fn encode(&self, _cx: &CodecContext<'_>) -> std::result::Result<Value, CodecError> {
        Err(CodecError::Unregistered(std::any::type_name::<Self>()))
    }

    /// Built-in decoding. Consulted only when no codec is registered.
    fn decode(_value: &Value, _cx: &CodecContext<'_>) -> std::result::Result<Self, CodecError> {
        Err(CodecError::Unregistered(std::any::type_name::<Self>()))
    }
}

/// Object-safe form of [`Attribute`].
pub trait AttributeField {
    /// See [`Attribute::is_empty`].
    fn empty(&self) -> bool;
    /// See [`Attribute::is_zero_time`].
    fn zero_time(&self) -> bool;
    /// Encodes through the registry, falling back to the built-in encoding.
    fn encode_value(&self, cx: &CodecContext<'_>) -> std::result::Result<Value, CodecError>;
    /// Decodes through the registry and replaces the current value.
    fn assign_value(
        &mut self,
        value: &Value,
        cx: &CodecContext<'_>,
    ) -> std::result::Result<(), CodecError>;
}

impl<T: Attribute> AttributeField for T {
    fn empty(&self) -> bool {
        self.is_empty()
    }

    fn zero_time(&self) -> bool {
        self.is_zero_time()
    }

    fn encode_value(&self, cx: &CodecContext<'_>) -> std::result::Result<Value, CodecError> {
        cx.encode(self)
    }

    fn assign_value(
        &mut self,
        value: &Value,
        cx: &CodecContext<'_>,
    ) -> std::result::Result<(), CodecError> {
        *self = cx.decode(value)?;
        Ok(())
    }
}

/// A pointer-like holder of a related model: the model itself, `Box` or `Arc`.
pub trait Related: Sized + 'static {
    /// The related model type.
    type Target: Model;

    /// Borrows the related model.
    fn target(&self) -> &Self::Target;

    /// Wraps a freshly decoded model.
    fn wrap(target: Self::Target) -> Self;
}

impl<T: Model> Related for Box<T> {
    type Target = T;

    fn target(&self) -> &T {
        self
    }

    fn wrap(target: T) -> Self {
        Box::new(target)
    }
}

impl<T: Model> Related for Arc<T> {
    type Target = T;

    fn target(&self) -> &T {
        self
    }

    fn wrap(target: T) -> Self {
        Arc::new(target)
    }
}

/// Types usable as relationships: `Option<P>` (to-one) and `Vec<P>` (to-many).
///
/// Relationship fields own their targets, so a model graph is always a tree.
pub trait Relation: Sized + 'static {
    /// To-one or to-many.
    const CARDINALITY: Cardinality;
    /// `true` when the link may be absent.
    const NULLABLE: bool;

    /// The related models, in order.
    fn targets(&self) -> Vec<&dyn Resource>;

    /// Replaces the relationship with models decoded from `nodes`.
    fn fill<'a>(&mut self, nodes: &[&'a Node], decoder: &mut Decoder<'a>) -> Result<()>;
}

/// Object-safe form of [`Relation`].
pub trait RelationField {
    /// See [`Relation::targets`].
    fn related(&self) -> Vec<&dyn Resource>;
    /// See [`Relation::fill`].
    fn link<'a>(&mut self, nodes: &[&'a Node], decoder: &mut Decoder<'a>) -> Result<()>;
}

impl<T: Relation> RelationField for T {
    fn related(&self) -> Vec<&dyn Resource> {
        self.targets()
    }

    fn link<'a>(&mut self, nodes: &[&'a Node], decoder: &mut Decoder<'a>) -> Result<()> {
        self.fill(nodes, decoder)
    }
}

impl<P: Related> Relation for Option<P> {
    const CARDINALITY: Cardinality = Cardinality::One;
    const NULLABLE: bool = true;

    fn targets(&self) -> Vec<&dyn Resource> {
        self.iter()
            .map(|related| related.target() as &dyn Resource)
            .collect()
    }

    fn fill<'a>(&mut self, nodes: &[&'a Node], decoder: &mut Decoder<'a>) -> Result<()> {
        *self = match nodes.first() {
            Some(node) => Some(P::wrap(decoder.materialize::<P::Target>(*node)?)),
            None => None,
        };
        Ok(())
    }
}

impl<P: Related> Relation for Vec<P> {
    const CARDINALITY: Cardinality = Cardinality::Many;
    const NULLABLE: bool = false;

    fn targets(&self) -> Vec<&dyn Resource> {
        self.iter()
            .map(|related| related.target() as &dyn Resource)
            .collect()
    }

    fn fill<'a>(&mut self, nodes: &[&'a Node], decoder: &mut Decoder<'a>) -> Result<()> {
        *self = nodes
            .iter()
            .map(|node| decoder.materialize::<P::Target>(*node).map(P::wrap))
            .collect::<Result<_>>()?;
        Ok(())
    }
}
