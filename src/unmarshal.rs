//! The Graph Unmarshaler.
//!
//! A [`Decoder`] indexes the document's `included` set by identity (the
//! `(type, id)` key, or `(type, client-id)` for nodes without an id) and
//! rebuilds typed models from nodes. Relationship references are resolved
//! against that index before the target is populated, so shallow references
//! regain their attributes and relationships.
//!
//! The identities of nodes currently being populated are tracked. A reference back
//! to one of them (a cycle through `included`) is populated from the
//! reference itself instead of being resolved again, which bounds the walk.

use std::collections::{HashMap, HashSet};

use crate::codec::{CodecContext, CodecRegistry};
use crate::error::{JsonApiError, Result};
use crate::extract::{FieldDescriptor, ModelLayout, Role, layout_of};
use crate::model::{Cardinality, FieldKind, FieldMut, Model, Resource};
use crate::node::{Data, Node, NodeKey};

/// Rebuilds models from the nodes of one document.
#[derive(Debug)]
pub struct Decoder<'a> {
    registry: &'a CodecRegistry,
    included: HashMap<NodeKey<'a>, &'a Node>,
    active: HashSet<NodeKey<'a>>,
}

impl<'a> Decoder<'a> {
    /// Indexes `included`. When two included nodes share an identity the
    /// first one is used.
    pub fn new(registry: &'a CodecRegistry, included: &'a [Node]) -> Self {
        let mut index = HashMap::with_capacity(included.len());
        for node in included {
            if let Some(identity) = node.identity() {
                index.entry(identity).or_insert(node);
            }
        }
        Self {
            registry,
            included: index,
            active: HashSet::new(),
        }
    }

    /// Allocates a `T` and populates it from `reference`, resolved against
    /// the included set.
    pub fn materialize<T: Model>(&mut self, reference: &'a Node) -> Result<T> {
        let mut model = T::default();
        let source = self.resolve(reference);
        self.populate(source, &mut model)?;
        Ok(model)
    }

    /// Populates `target` from `node`, leaving fields the node does not
    /// mention untouched.
    pub fn populate(&mut self, node: &'a Node, target: &mut dyn Resource) -> Result<()> {
        let layout = layout_of(target.schema())?;
        let entered = node
            .identity()
            .filter(|identity| self.active.insert(*identity));

        tracing::trace!(kind = %node.kind, id = %node.id, "populating model");
        let result = self.populate_fields(node, &layout, target);

        if let Some(identity) = entered {
            self.active.remove(&identity);
        }
        result
    }

    fn resolve(&self, reference: &'a Node) -> &'a Node {
        let Some(identity) = reference.identity() else {
            return reference;
        };
        if self.active.contains(&identity) {
            return reference;
        }
        self.included.get(&identity).copied().unwrap_or(reference)
    }

    fn populate_fields(
        &mut self,
        node: &'a Node,
        layout: &ModelLayout,
        target: &mut dyn Resource,
    ) -> Result<()> {
        if node.kind != layout.type_name {
            return Err(JsonApiError::TypeMismatch {
                model: layout.model(),
                expected: layout.type_name.clone(),
                found: node.kind.clone(),
            });
        }

        for descriptor in &layout.fields {
            match descriptor.role {
                Role::Primary => {
                    if !node.id.is_empty() {
                        self.assign_id(descriptor, &node.id, target, layout.model())?;
                    }
                }
                Role::ClientId => {
                    if let Some(client) = &node.client_id {
                        self.assign_id(descriptor, client, target, layout.model())?;
                    }
                }
                Role::Attribute => {
                    let Some(value) = node.attributes.get(&descriptor.key) else {
                        continue;
                    };
                    if value.is_null() && !descriptor.kind.is_nullable() {
                        continue;
                    }
                    let Some(FieldMut::Attribute(field)) = descriptor.get_mut(target) else {
                        return Err(missing_accessor(descriptor));
                    };
                    let cx = CodecContext::new(self.registry, descriptor.time_format);
                    field
                        .assign_value(value, &cx)
                        .map_err(|e| e.at(descriptor.model, descriptor.ident, &descriptor.key))?;
                }
                Role::Relation => {
                    let Some(relationship) = node.relationships.get(&descriptor.key) else {
                        continue;
                    };
                    let linked = linked_nodes(descriptor, &relationship.data)?;
                    let Some(FieldMut::Relation(field)) = descriptor.get_mut(target) else {
                        return Err(missing_accessor(descriptor));
                    };
                    field.link(&linked, self)?;
                }
            }
        }
        Ok(())
    }

    fn assign_id(
        &self,
        descriptor: &FieldDescriptor,
        id: &str,
        target: &mut dyn Resource,
        model: &'static str,
    ) -> Result<()> {
        let Some(FieldMut::Identifier(field)) = descriptor.get_mut(target) else {
            return Err(missing_accessor(descriptor));
        };
        if field.assign_id(id) {
            Ok(())
        } else {
            Err(JsonApiError::BadId {
                model,
                id: id.to_owned(),
            })
        }
    }
}

/// Normalizes relationship linkage to the field's cardinality. A `null`
/// to-many linkage reads as empty.
fn linked_nodes<'a>(descriptor: &FieldDescriptor, data: &'a Data) -> Result<Vec<&'a Node>> {
    let cardinality = match descriptor.kind {
        FieldKind::Relation { cardinality, .. } => cardinality,
        _ => return Err(missing_accessor(descriptor)),
    };
    match (data, cardinality) {
        (Data::One(one), Cardinality::One) => Ok(one.as_deref().into_iter().collect()),
        (Data::One(None), Cardinality::Many) => Ok(Vec::new()),
        (Data::Many(many), Cardinality::Many) => Ok(many.iter().collect()),
        (Data::Many(_), Cardinality::One) => Err(JsonApiError::DocumentShapeMismatch {
            model: descriptor.model,
            field: descriptor.ident,
            reason: "expected a single resource, found an array".into(),
        }),
        (Data::One(Some(_)), Cardinality::Many) => Err(JsonApiError::DocumentShapeMismatch {
            model: descriptor.model,
            field: descriptor.ident,
            reason: "expected an array of resources, found a single resource".into(),
        }),
    }
}

fn missing_accessor(descriptor: &FieldDescriptor) -> JsonApiError {
    JsonApiError::DocumentShapeMismatch {
        model: descriptor.model,
        field: descriptor.ident,
        reason: "field accessor does not match its annotation".into(),
    }
}
