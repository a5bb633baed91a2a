//! # jsonapi
//!
//! Annotation-driven mapping between Rust models and JSON:API documents.
//!
//! ## Overview
//!
//! Models are plain structs. Field annotations say which field is the primary
//! key, which fields are attributes and which are relationships to other
//! models; `#[derive(JsonApiModel)]` turns those annotations into static
//! metadata. The engine walks that metadata instead of inspecting types at
//! runtime.
//!
//! ### Key Features
//!
//! *   **Side-loading:** related models are written once into the document's
//!     `included` set and referenced by `(type, id)` from relationship entries,
//!     no matter how many models point at them.
//! *   **Embedded mode:** relationships can instead be nested inline, the shape
//!     a client sends when creating a resource together with its children.
//! *   **Embedded structs:** `#[jsonapi(embed)]` flattens another model's
//!     fields into the parent, with outer declarations dominating and
//!     ambiguous sibling attributes dropped.
//! *   **Typed round trips:** every integer width, floats, timestamps in three
//!     encodings, collections and custom types via a [`CodecRegistry`].
//!
//! ## Architecture
//!
//! ```text
//! model ──[extract]──> ModelLayout ──[marshal::Encoder]──> Node + included ──> JSON
//! JSON ──> Document ──[unmarshal::Decoder + included index]──> model
//! ```
//!
//! - [`extract`] validates annotations and caches one [`extract::ModelLayout`]
//!   per model type.
//! - [`marshal`] builds a [`Node`] per model from its dominance-resolved
//!   fields, so embedded struct levels follow the [`Node::merge`] and
//!   [`Node::combine_peers`] rules even when a field is omitted as empty.
//! - [`unmarshal`] resolves relationship references against the included set
//!   and populates freshly allocated models.
//! - [`node`] holds the wire types.
//!
//! ## Usage Patterns
//!
//! ```rust
//! use jsonapi::{JsonApi, JsonApiModel};
//!
//! #[derive(Debug, Default, PartialEq, JsonApiModel)]
//! struct Comment {
//!     #[jsonapi(primary = "comments")]
//!     id: u32,
//!     #[jsonapi(attr = "body")]
//!     body: String,
//! }
//!
//! #[derive(Debug, Default, PartialEq, JsonApiModel)]
//! struct Post {
//!     #[jsonapi(primary = "posts")]
//!     id: u32,
//!     #[jsonapi(attr = "title")]
//!     title: String,
//!     #[jsonapi(relation = "comments")]
//!     comments: Vec<Comment>,
//! }
//!
//! let post = Post {
//!     id: 1,
//!     title: "Hello".into(),
//!     comments: vec![Comment { id: 7, body: "First".into() }],
//! };
//!
//! let bytes = JsonApi::marshal_one(&post)?;
//! let json: serde_json::Value = serde_json::from_slice(&bytes)?;
//! assert_eq!(json["data"]["relationships"]["comments"]["data"][0]["id"], "7");
//! assert_eq!(json["included"][0]["attributes"]["body"], "First");
//!
//! assert_eq!(JsonApi::unmarshal_one::<Post>(&bytes)?, post);
//! # Ok::<(), jsonapi::JsonApiError>(())
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **No unsafe code.**
//! * **No Panics:** no `unwrap()` or `panic!()` in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** every failure is a [`JsonApiError`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod codec;
pub mod error;
pub mod model;
pub mod node;

// --- ENGINE MODULES ---
pub mod extract;
pub mod marshal;
pub mod unmarshal;

// Private modules
mod model_impls;

// --- RE-EXPORTS ---

pub use api::{JsonApi, JsonApiOptions};
pub use codec::{CodecContext, CodecError, CodecRegistry, TimeFormat};
pub use error::{JsonApiError, Result};
pub use model::{
    Attribute, Cardinality, FieldKind, FieldMut, FieldRef, FieldSpec, IdKind, Identifier, Linkable,
    Metable, Model, Related, Relation, RelationshipLinkable, RelationshipMetable, Resource, Schema,
    ValueKind,
};
pub use node::{Data, Document, Link, Links, ManyPayload, Meta, Node, NodeKey, OnePayload, Relationship};

// Re-export the derive macro so it is accessible as `jsonapi::JsonApiModel`
pub use jsonapi_derive::JsonApiModel;
