//! Centralized error handling for the document engine.
//!
//! Every failure raised while extracting field layouts, walking a model graph or
//! rebuilding one from a received document is a [`JsonApiError`]. None of them
//! are retried internally: the call in progress is aborted and the error is
//! returned to the caller.
//!
//! ## Error Categories
//!
//! - **Layout errors** ([`JsonApiError::BadStructTag`], [`JsonApiError::UnsupportedAnnotation`]):
//!   a model's annotations have the wrong shape. These are programming errors and
//!   surface on the first marshal/unmarshal of the offending type.
//! - **Identity errors** ([`JsonApiError::BadPrimaryKeyType`], [`JsonApiError::BadId`],
//!   [`JsonApiError::TypeMismatch`]): primary keys that cannot be written or read.
//! - **Value errors** ([`JsonApiError::InvalidTime`], [`JsonApiError::DocumentShapeMismatch`],
//!   [`JsonApiError::Codec`]): a single attribute or relationship could not be converted.
//! - **Envelope errors** ([`JsonApiError::UnexpectedInputShape`], [`JsonApiError::MalformedLinks`],
//!   [`JsonApiError::Json`], [`JsonApiError::Io`]): the outer document is unusable.
//!
//! ## Usage Patterns
//!
//! ```rust
//! use jsonapi::{JsonApi, JsonApiError, JsonApiModel};
//!
//! #[derive(Debug, Default, JsonApiModel)]
//! struct Tag {
//!     #[jsonapi(primary = "tags")]
//!     id: u32,
//! }
//!
//! let doc = br#"{"data":{"type":"labels","id":"1"}}"#;
//! match JsonApi::unmarshal_one::<Tag>(doc) {
//!     Err(JsonApiError::TypeMismatch { found, .. }) => assert_eq!(found, "labels"),
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use std::io;

use thiserror::Error;

/// A specialized `Result` type for document operations.
pub type Result<T> = std::result::Result<T, JsonApiError>;

/// The master error enum covering every failure domain of the crate.
#[derive(Debug, Error)]
pub enum JsonApiError {
    /// A field annotation violates the expected shape (wrong argument count,
    /// unknown modifier, duplicated key, missing primary field).
    #[error("bad jsonapi annotation on `{model}.{field}`: {reason}")]
    BadStructTag {
        /// Rust name of the model type.
        model: &'static str,
        /// Rust name of the offending field.
        field: &'static str,
        /// What is wrong with the annotation.
        reason: String,
    },

    /// The annotation role keyword is not one of `primary`, `client-id`,
    /// `attr`, `relation` or `embed`.
    #[error("unsupported jsonapi annotation `{role}` on `{model}.{field}`")]
    UnsupportedAnnotation {
        /// Rust name of the model type.
        model: &'static str,
        /// Rust name of the offending field.
        field: &'static str,
        /// The unrecognized role keyword.
        role: String,
    },

    /// The primary field's type cannot be encoded as a document id.
    /// Only strings and integers (optionally wrapped in `Option`) are accepted.
    #[error("primary key of `{model}` must be a string or an integer, found {kind}")]
    BadPrimaryKeyType {
        /// Rust name of the model type.
        model: &'static str,
        /// Description of the unsupported key type.
        kind: &'static str,
    },

    /// A document id could not be converted into the model's primary key type.
    #[error("id {id:?} cannot be converted into the primary key of `{model}`")]
    BadId {
        /// Rust name of the model type.
        model: &'static str,
        /// The id found in the document.
        id: String,
    },

    /// The document `type` differs from the destination model's declared type.
    #[error("document type {found:?} does not match `{model}` (expected {expected:?})")]
    TypeMismatch {
        /// Rust name of the destination model type.
        model: &'static str,
        /// The type name declared by the model's primary annotation.
        expected: String,
        /// The type found in the document.
        found: String,
    },

    /// A timestamp attribute holds a value that cannot be decoded with the
    /// field's time encoding.
    #[error("invalid time value for attribute {key:?}: {reason}")]
    InvalidTime {
        /// Attribute key in the document.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The top-level document does not have the expected one/many shape.
    #[error("unexpected input shape: {0}")]
    UnexpectedInputShape(String),

    /// A links entry is neither a string nor a link object with an `href`.
    #[error("links entry {key:?} must be a string or a link object")]
    MalformedLinks {
        /// The offending links key.
        key: String,
    },

    /// The document's structure does not fit the destination model.
    #[error("document does not match `{model}.{field}`: {reason}")]
    DocumentShapeMismatch {
        /// Rust name of the destination model type.
        model: &'static str,
        /// Rust name of the destination field.
        field: &'static str,
        /// Description of the structural mismatch.
        reason: String,
    },

    /// A custom value codec failed, or a custom attribute type has no codec.
    #[error("codec error for `{model}.{field}`: {reason}")]
    Codec {
        /// Rust name of the model type.
        model: &'static str,
        /// Rust name of the field.
        field: &'static str,
        /// The codec's failure message.
        reason: String,
    },

    /// The serialized document is not valid JSON or not a JSON:API envelope.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the serialized document failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl JsonApiError {
    /// Classifies a `serde_json` failure from a reader or writer: transport
    /// failures become [`JsonApiError::Io`], everything else stays
    /// [`JsonApiError::Json`].
    pub fn from_stream(error: serde_json::Error) -> Self {
        if error.is_io() {
            Self::Io(io::Error::from(error))
        } else {
            Self::Json(error)
        }
    }
}
