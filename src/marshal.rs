//! The Graph Marshaler.
//!
//! [`Encoder`] walks a model depth-first. Attributes and relationships are
//! emitted from the dominance-resolved layout, so a field shadowed by an outer
//! declaration, or made ambiguous by a sibling embedded struct, never reaches
//! the document. Identity (`type`, `id`, `client-id`) comes from the same
//! layout.
//!
//! In side-load mode every related model is pushed whole onto the included
//! list and only its shallow reference stays in the relationship entry. In
//! embedded mode the full node is nested in place and nothing is included.

use std::collections::HashSet;

use crate::codec::{CodecContext, CodecRegistry};
use crate::error::{JsonApiError, Result};
use crate::extract::{FieldDescriptor, Role, layout_of};
use crate::model::{AttributeField, Cardinality, FieldKind, FieldRef, RelationField, Resource};
use crate::node::{Links, Node, Relationship};

/// Accumulates the included set across one marshal call.
#[derive(Debug)]
pub struct Encoder<'r> {
    registry: &'r CodecRegistry,
    side_load: bool,
    included: Vec<Node>,
}

impl<'r> Encoder<'r> {
    /// Creates an encoder. `side_load = false` selects embedded mode.
    pub fn new(registry: &'r CodecRegistry, side_load: bool) -> Self {
        Self {
            registry,
            side_load,
            included: Vec::new(),
        }
    }

    /// Builds the node for `model`, side-loading its related models.
    pub fn visit(&mut self, model: &dyn Resource) -> Result<Node> {
        let layout = layout_of(model.schema())?;
        let mut node = Node::default();

        for descriptor in &layout.fields {
            match (descriptor.role, descriptor.get(model)) {
                (Role::Primary | Role::ClientId, _) => {}
                (Role::Attribute, Some(FieldRef::Attribute(value))) => {
                    self.attribute(&mut node, descriptor, value)?;
                }
                (Role::Relation, Some(FieldRef::Relation(relation))) => {
                    let owner = descriptor
                        .owner(model)
                        .ok_or_else(|| missing_accessor(descriptor))?;
                    self.relation(&mut node, owner, descriptor, relation)?;
                }
                _ => return Err(missing_accessor(descriptor)),
            }
        }

        node.kind = layout.type_name.clone();
        node.id = match layout.primary().and_then(|d| d.get(model)) {
            Some(FieldRef::Identifier(id)) => id.encode_id().unwrap_or_default(),
            _ => String::new(),
        };
        node.client_id = match layout.client_id().and_then(|d| d.get(model)) {
            Some(FieldRef::Identifier(client)) => client.encode_id(),
            _ => None,
        };

        if let Some(links) = model.document_links() {
            node.links = Some(checked(links)?);
        }
        if let Some(meta) = model.document_meta() {
            node.meta = Some(meta);
        }

        tracing::trace!(kind = %node.kind, id = %node.id, "visited model");
        Ok(node)
    }

    /// Returns the included set, de-duplicated by identity.
    ///
    /// The first node seen for a `(type, id)` pair is kept and later ones are
    /// dropped without merging. Nodes without an id fall back to their
    /// `client-id`; nodes with neither are all kept.
    pub fn finish(self) -> Vec<Node> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(self.included.len());

        for node in self.included {
            let fresh = match node.identity() {
                Some(identity) => seen.insert((
                    identity.kind.to_owned(),
                    identity.by_client_id,
                    identity.id.to_owned(),
                )),
                None => true,
            };
            if fresh {
                kept.push(node);
            } else {
                tracing::debug!(kind = %node.kind, id = %node.id, "dropped duplicate included node");
            }
        }
        kept
    }

    fn attribute(
        &self,
        node: &mut Node,
        descriptor: &FieldDescriptor,
        value: &dyn AttributeField,
    ) -> Result<()> {
        if value.zero_time() || (descriptor.omit_empty && value.empty()) {
            return Ok(());
        }

        let cx = CodecContext::new(self.registry, descriptor.time_format);
        let encoded = value
            .encode_value(&cx)
            .map_err(|e| e.at(descriptor.model, descriptor.ident, &descriptor.key))?;
        node.attributes.insert(descriptor.key.clone(), encoded);
        Ok(())
    }

    fn relation(
        &mut self,
        node: &mut Node,
        owner: &dyn Resource,
        descriptor: &FieldDescriptor,
        relation: &dyn RelationField,
    ) -> Result<()> {
        let targets = relation.related();
        if descriptor.omit_empty && targets.is_empty() {
            return Ok(());
        }

        let mut linked = Vec::with_capacity(targets.len());
        for target in targets {
            let full = self.visit(target)?;
            if self.side_load {
                linked.push(full.shallow());
                self.included.push(full);
            } else {
                linked.push(full);
            }
        }

        let mut entry = match descriptor.kind {
            FieldKind::Relation {
                cardinality: Cardinality::One,
                ..
            } => Relationship::one(linked.into_iter().next()),
            _ => Relationship::many(linked),
        };
        if let Some(links) = owner.relation_links(&descriptor.key) {
            entry.links = Some(checked(links)?);
        }
        if let Some(meta) = owner.relation_meta(&descriptor.key) {
            entry.meta = Some(meta);
        }

        node.relationships.insert(descriptor.key.clone(), entry);
        Ok(())
    }
}

fn checked(links: Links) -> Result<Links> {
    links.validate()?;
    Ok(links)
}

fn missing_accessor(descriptor: &FieldDescriptor) -> JsonApiError {
    JsonApiError::DocumentShapeMismatch {
        model: descriptor.model,
        field: descriptor.ident,
        reason: "field accessor does not match its annotation".into(),
    }
}
