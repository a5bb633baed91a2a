//! Public entry points.
//!
//! [`JsonApi`] marshals and unmarshals with default options. For a custom
//! codec registry, embedded mode, pretty output or top-level links and meta,
//! build a [`JsonApiOptions`] with [`JsonApi::builder`].

use std::io::{Read, Write};
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::error::{JsonApiError, Result};
use crate::marshal::Encoder;
use crate::model::{Model, Resource};
use crate::node::{Document, Links, ManyPayload, Meta, OnePayload};
use crate::unmarshal::Decoder;

/// The main entry point, using default options.
///
/// ```rust
/// use jsonapi::{JsonApi, JsonApiModel};
///
/// #[derive(Debug, Default, PartialEq, JsonApiModel)]
/// struct Blog {
///     #[jsonapi(primary = "blogs")]
///     id: u64,
///     #[jsonapi(attr = "title")]
///     title: String,
/// }
///
/// let blog = Blog { id: 5, title: "T".into() };
/// let bytes = JsonApi::marshal_one(&blog)?;
/// assert_eq!(
///     std::str::from_utf8(&bytes).unwrap_or_default(),
///     r#"{"data":{"type":"blogs","id":"5","attributes":{"title":"T"}}}"#
/// );
/// assert_eq!(JsonApi::unmarshal_one::<Blog>(&bytes)?, blog);
/// # Ok::<(), jsonapi::JsonApiError>(())
/// ```
#[derive(Debug)]
pub struct JsonApi;

impl JsonApi {
    /// Starts building custom options.
    pub fn builder() -> JsonApiOptions {
        JsonApiOptions::default()
    }

    /// Marshals one model, side-loading its relationships.
    pub fn marshal_one(model: &dyn Resource) -> Result<Vec<u8>> {
        JsonApiOptions::default().marshal_one(model)
    }

    /// Marshals a collection of models, side-loading their relationships.
    pub fn marshal_many<T: Resource>(models: &[T]) -> Result<Vec<u8>> {
        JsonApiOptions::default().marshal_many(models)
    }

    /// Marshals one model with relationships nested inline.
    pub fn marshal_embedded(model: &dyn Resource) -> Result<Vec<u8>> {
        JsonApiOptions::default().marshal_embedded(model)
    }

    /// Unmarshals a single-resource document.
    pub fn unmarshal_one<T: Model>(bytes: &[u8]) -> Result<T> {
        JsonApiOptions::default().unmarshal_one(bytes)
    }

    /// Unmarshals a single-resource document into an existing model.
    pub fn unmarshal_into(bytes: &[u8], target: &mut dyn Resource) -> Result<()> {
        JsonApiOptions::default().unmarshal_into(bytes, target)
    }

    /// Unmarshals a resource-collection document.
    pub fn unmarshal_many<T: Model>(bytes: &[u8]) -> Result<Vec<T>> {
        JsonApiOptions::default().unmarshal_many(bytes)
    }
}

/// Marshal and unmarshal configuration.
#[derive(Debug, Clone)]
pub struct JsonApiOptions {
    registry: Arc<CodecRegistry>,
    side_load: bool,
    pretty: bool,
    links: Option<Links>,
    meta: Option<Meta>,
}

impl Default for JsonApiOptions {
    fn default() -> Self {
        Self {
            registry: Arc::new(CodecRegistry::new()),
            side_load: true,
            pretty: false,
            links: None,
            meta: None,
        }
    }
}

impl JsonApiOptions {
    /// Uses `registry` for custom value codecs.
    pub fn registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// `true` (the default) side-loads related models into `included`;
    /// `false` nests them inline.
    pub fn side_load(mut self, side_load: bool) -> Self {
        self.side_load = side_load;
        self
    }

    /// Pretty-prints marshaled documents.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Top-level document links.
    pub fn links(mut self, links: Links) -> Self {
        self.links = Some(links);
        self
    }

    /// Top-level document meta.
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// The codec registry in use.
    pub fn codecs(&self) -> &CodecRegistry {
        &self.registry
    }

    // --- MARSHAL ---

    /// Builds the single-resource payload for `model`.
    pub fn one_payload(&self, model: &dyn Resource) -> Result<OnePayload> {
        self.validate_links()?;
        let mut encoder = Encoder::new(&self.registry, self.side_load);
        let data = encoder.visit(model)?;
        let included = encoder.finish();
        tracing::debug!(kind = %data.kind, included = included.len(), "marshaled one");

        Ok(OnePayload {
            data: Some(data),
            included,
            links: self.links.clone(),
            meta: self.meta.clone(),
        })
    }

    /// Builds the collection payload for `models`. Related models shared by
    /// several roots appear once in `included`.
    pub fn many_payload<T: Resource>(&self, models: &[T]) -> Result<ManyPayload> {
        self.validate_links()?;
        let mut encoder = Encoder::new(&self.registry, self.side_load);
        let data = models
            .iter()
            .map(|model| encoder.visit(model))
            .collect::<Result<Vec<_>>>()?;
        let included = encoder.finish();
        tracing::debug!(roots = data.len(), included = included.len(), "marshaled many");

        Ok(ManyPayload {
            data,
            included,
            links: self.links.clone(),
            meta: self.meta.clone(),
        })
    }

    /// Marshals one model to JSON bytes.
    pub fn marshal_one(&self, model: &dyn Resource) -> Result<Vec<u8>> {
        let payload = self.one_payload(model)?;
        self.to_bytes(&payload)
    }

    /// Marshals a collection of models to JSON bytes.
    pub fn marshal_many<T: Resource>(&self, models: &[T]) -> Result<Vec<u8>> {
        let payload = self.many_payload(models)?;
        self.to_bytes(&payload)
    }

    /// Marshals one model with relationships nested inline, regardless of
    /// the `side_load` setting.
    pub fn marshal_embedded(&self, model: &dyn Resource) -> Result<Vec<u8>> {
        self.clone().side_load(false).marshal_one(model)
    }

    /// Marshals one model into `writer`.
    pub fn write_one<W: Write>(&self, writer: W, model: &dyn Resource) -> Result<()> {
        let payload = self.one_payload(model)?;
        self.write(writer, &payload)
    }

    /// Marshals a collection of models into `writer`.
    pub fn write_many<W: Write, T: Resource>(&self, writer: W, models: &[T]) -> Result<()> {
        let payload = self.many_payload(models)?;
        self.write(writer, &payload)
    }

    // --- UNMARSHAL ---

    /// Rebuilds a model from a parsed single-resource payload.
    pub fn populate_one<T: Model>(&self, payload: &OnePayload) -> Result<T> {
        let root = payload.data.as_ref().ok_or_else(|| {
            JsonApiError::UnexpectedInputShape("`data` is null".into())
        })?;
        let mut decoder = Decoder::new(&self.registry, &payload.included);
        let mut model = T::default();
        decoder.populate(root, &mut model)?;
        Ok(model)
    }

    /// Rebuilds models from a parsed collection payload.
    pub fn populate_many<T: Model>(&self, payload: &ManyPayload) -> Result<Vec<T>> {
        let mut decoder = Decoder::new(&self.registry, &payload.included);
        payload
            .data
            .iter()
            .map(|root| {
                let mut model = T::default();
                decoder.populate(root, &mut model)?;
                Ok(model)
            })
            .collect()
    }

    /// Unmarshals a single-resource document.
    pub fn unmarshal_one<T: Model>(&self, bytes: &[u8]) -> Result<T> {
        let payload = serde_json::from_slice::<Document>(bytes)?.into_one()?;
        self.populate_one(&payload)
    }

    /// Unmarshals a single-resource document into an existing model. Fields
    /// the document does not mention keep their values.
    pub fn unmarshal_into(&self, bytes: &[u8], target: &mut dyn Resource) -> Result<()> {
        let payload = serde_json::from_slice::<Document>(bytes)?.into_one()?;
        let root = payload.data.as_ref().ok_or_else(|| {
            JsonApiError::UnexpectedInputShape("`data` is null".into())
        })?;
        Decoder::new(&self.registry, &payload.included).populate(root, target)
    }

    /// Unmarshals a resource-collection document.
    pub fn unmarshal_many<T: Model>(&self, bytes: &[u8]) -> Result<Vec<T>> {
        let payload = serde_json::from_slice::<Document>(bytes)?.into_many()?;
        self.populate_many(&payload)
    }

    /// Reads and unmarshals a single-resource document.
    pub fn read_one<T: Model, R: Read>(&self, reader: R) -> Result<T> {
        let payload = serde_json::from_reader::<_, Document>(reader)
            .map_err(JsonApiError::from_stream)?
            .into_one()?;
        self.populate_one(&payload)
    }

    /// Reads and unmarshals a resource-collection document.
    pub fn read_many<T: Model, R: Read>(&self, reader: R) -> Result<Vec<T>> {
        let payload = serde_json::from_reader::<_, Document>(reader)
            .map_err(JsonApiError::from_stream)?
            .into_many()?;
        self.populate_many(&payload)
    }

    // --- HELPERS ---

    fn validate_links(&self) -> Result<()> {
        match &self.links {
            Some(links) => links.validate(),
            None => Ok(()),
        }
    }

    fn to_bytes<P: serde::Serialize>(&self, payload: &P) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(payload)?
        } else {
            serde_json::to_vec(payload)?
        };
        Ok(bytes)
    }

    fn write<W: Write, P: serde::Serialize>(&self, writer: W, payload: &P) -> Result<()> {
        let written = if self.pretty {
            serde_json::to_writer_pretty(writer, payload)
        } else {
            serde_json::to_writer(writer, payload)
        };
        written.map_err(JsonApiError::from_stream)
    }
}
