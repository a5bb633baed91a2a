//! Pluggable value codecs.
//!
//! The [`CodecRegistry`] maps concrete Rust types to encode/decode functions.
//! Registered codecs take precedence over the built-in [`Attribute`] encodings,
//! including for values nested inside `Option`, `Vec` and maps, because every
//! attribute conversion goes through [`CodecContext::encode`] /
//! [`CodecContext::decode`].
//!
//! The registry is an explicit object injected through
//! [`JsonApiOptions::registry`](crate::JsonApiOptions::registry). Lookups take a
//! shared lock; registration takes the exclusive lock, so it never races with
//! in-flight marshal/unmarshal calls.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use crate::error::JsonApiError;
use crate::model::Attribute;

/// Failure of a single value conversion. The engine wraps it with the model
/// and field it happened on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The JSON value has the wrong type or is out of range for the field.
    #[error("expected {expected}, found {found}")]
    Mismatch {
        /// What the field accepts.
        expected: &'static str,
        /// What the document holds.
        found: String,
    },
    /// A timestamp could not be decoded with the field's time encoding.
    #[error("{0}")]
    InvalidTime(String),
    /// A custom attribute type has no registered codec.
    #[error("no codec registered for custom type `{0}`")]
    Unregistered(&'static str),
    /// A registered codec reported an error.
    #[error("{0}")]
    Custom(String),
}

impl CodecError {
    /// A codec failure with a free-form message.
    pub fn custom(message: impl fmt::Display) -> Self {
        Self::Custom(message.to_string())
    }

    /// A type mismatch against the given JSON value.
    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::Mismatch {
            expected,
            found: describe(found),
        }
    }

    /// Attaches model/field context.
    pub(crate) fn at(self, model: &'static str, field: &'static str, key: &str) -> JsonApiError {
        match self {
            Self::Mismatch { expected, found } => JsonApiError::DocumentShapeMismatch {
                model,
                field,
                reason: format!("expected {expected}, found {found}"),
            },
            Self::InvalidTime(reason) => JsonApiError::InvalidTime {
                key: key.to_owned(),
                reason,
            },
            other @ (Self::Unregistered(_) | Self::Custom(_)) => JsonApiError::Codec {
                model,
                field,
                reason: other.to_string(),
            },
        }
    }
}

/// Short description of a JSON value for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(_) => "a string".into(),
        Value::Array(_) => "an array".into(),
        Value::Object(_) => "an object".into(),
    }
}

/// How timestamp attributes are written and read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeFormat {
    /// Integer seconds since the Unix epoch.
    #[default]
    Unix,
    /// `YYYY-MM-DDTHH:MM:SSZ` in UTC.
    Iso8601,
    /// RFC 3339, sub-seconds kept, any offset accepted on input.
    Rfc3339,
}

/// Conversion context handed to [`Attribute`] implementations.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext<'a> {
    registry: &'a CodecRegistry,
    format: TimeFormat,
}

impl<'a> CodecContext<'a> {
    /// Creates a context for one field.
    pub fn new(registry: &'a CodecRegistry, format: TimeFormat) -> Self {
        Self { registry, format }
    }

    /// The field's time encoding.
    pub fn time_format(&self) -> TimeFormat {
        self.format
    }

    /// Encodes `value`, preferring a registered codec over the built-in encoding.
    pub fn encode<T: Attribute>(&self, value: &T) -> Result<Value, CodecError> {
        match self.registry.lookup(TypeId::of::<T>()) {
            Some(codec) => (codec.encode)(value as &dyn Any),
            None => value.encode(self),
        }
    }

    /// Decodes `value`, preferring a registered codec over the built-in decoding.
    pub fn decode<T: Attribute>(&self, value: &Value) -> Result<T, CodecError> {
        match self.registry.lookup(TypeId::of::<T>()) {
            Some(codec) => (codec.decode)(value)?
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| {
                    CodecError::custom(format_args!(
                        "codec for `{}` produced a value of another type",
                        codec.type_name
                    ))
                }),
            None => T::decode(value, self),
        }
    }
}

// --- REGISTRY ---

type EncodeFn = Box<dyn Fn(&dyn Any) -> Result<Value, CodecError> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&Value) -> Result<Box<dyn Any>, CodecError> + Send + Sync>;

struct Codec {
    type_name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Registry of custom value codecs keyed by concrete type.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: RwLock<HashMap<TypeId, Arc<Codec>>>,
}

impl CodecRegistry {
    /// Creates an empty registry. Built-in attribute types need no codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the codec for `T`, replacing any previous one.
    ///
    /// ```rust
    /// use jsonapi::{Attribute, CodecError, CodecRegistry};
    /// use serde_json::Value;
    ///
    /// #[derive(Debug, Default, PartialEq)]
    /// struct Cents(i64);
    /// impl Attribute for Cents {}
    ///
    /// let registry = CodecRegistry::new();
    /// registry.register::<Cents, _, _>(
    ///     |c| Ok(Value::String(format!("{}.{:02}", c.0 / 100, c.0 % 100))),
    ///     |v| {
    ///         let text = v.as_str().ok_or_else(|| CodecError::mismatch("a string", v))?;
    ///         let (units, cents) = text.split_once('.').ok_or_else(|| CodecError::custom("no decimal point"))?;
    ///         let units: i64 = units.parse().map_err(CodecError::custom)?;
    ///         let cents: i64 = cents.parse().map_err(CodecError::custom)?;
    ///         Ok(Cents(units * 100 + cents))
    ///     },
    /// );
    /// assert!(registry.contains::<Cents>());
    /// ```
    pub fn register<T, E, D>(&self, encode: E, decode: D)
    where
        T: Any,
        E: Fn(&T) -> Result<Value, CodecError> + Send + Sync + 'static,
        D: Fn(&Value) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        let type_name = type_name::<T>();
        let codec = Codec {
            type_name,
            encode: Box::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
                Some(typed) => encode(typed),
                None => Err(CodecError::custom(format_args!(
                    "codec for `{type_name}` received a value of another type"
                ))),
            }),
            decode: Box::new(move |value: &Value| {
                decode(value).map(|typed| Box::new(typed) as Box<dyn Any>)
            }),
        };

        let replaced = self
            .codecs
            .write()
            .insert(TypeId::of::<T>(), Arc::new(codec))
            .is_some();
        tracing::debug!(type_name, replaced, "registered value codec");
    }

    /// Removes the codec for `T`. Returns true if one was registered.
    pub fn unregister<T: Any>(&self) -> bool {
        self.codecs.write().remove(&TypeId::of::<T>()).is_some()
    }

    /// Returns true if a codec is registered for `T`.
    pub fn contains<T: Any>(&self) -> bool {
        self.codecs.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.codecs.read().len()
    }

    /// Returns true if no codec is registered.
    pub fn is_empty(&self) -> bool {
        self.codecs.read().is_empty()
    }

    /// The lock is released before the codec runs, so a codec may itself
    /// consult the registry.
    fn lookup(&self, id: TypeId) -> Option<Arc<Codec>> {
        self.codecs.read().get(&id).cloned()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codecs = self.codecs.read();
        f.debug_set()
            .entries(codecs.values().map(|codec| codec.type_name))
            .finish()
    }
}
