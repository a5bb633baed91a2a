//! The Field Extractor.
//!
//! Turns a model's static [`Schema`] into a validated [`ModelLayout`]: every
//! annotation is split into role and arguments, checked for shape, and
//! embedded structs are recursed into. The layout keeps the struct levels as
//! a tree and also carries the dominance-resolved flat field list that both
//! the marshaler and the unmarshaler walk. A field that loses a slot is never
//! written, even when the winner is itself omitted as empty.
//!
//! ## Dominance
//!
//! Flattening follows the [`Node::merge`](crate::Node::merge) and
//! [`Node::combine_peers`](crate::Node::combine_peers) rules:
//!
//! 1. Fields declared on a level beat anything inherited from its embedded
//!    structs.
//! 2. Among sibling embedded structs, the first contribution to a primary,
//!    client-id or relationship slot wins.
//! 3. An attribute key contributed by two sibling embedded structs is
//!    ambiguous and dropped from the layout.
//!
//! Layouts are cached per model type for the life of the process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::RwLock;

use crate::codec::TimeFormat;
use crate::error::{JsonApiError, Result};
use crate::model::{FieldKind, FieldMut, FieldRef, IdKind, Resource, Schema};

/// Document role of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The primary key; its key is the document `type`.
    Primary,
    /// The client-generated id.
    ClientId,
    /// An attribute.
    Attribute,
    /// A relationship.
    Relation,
}

/// One participating field, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Rust name of the struct declaring the field.
    pub model: &'static str,
    /// Rust name of the field.
    pub ident: &'static str,
    /// Field indices from the root model down through embedded structs.
    pub path: Vec<usize>,
    /// Document role.
    pub role: Role,
    /// Document `type` for the primary, `client-id` for the client id,
    /// otherwise the attribute or relationship key.
    pub key: String,
    /// Capability of the field's Rust type.
    pub kind: FieldKind,
    /// Suppress the field when empty.
    pub omit_empty: bool,
    /// Encoding of timestamp values.
    pub time_format: TimeFormat,
}

impl FieldDescriptor {
    /// Index of the field within its own struct.
    pub fn index(&self) -> usize {
        self.path.last().copied().unwrap_or_default()
    }

    /// Borrows the field from the root model.
    pub fn get<'m>(&self, root: &'m dyn Resource) -> Option<FieldRef<'m>> {
        field_at(root, &self.path)
    }

    /// Borrows the struct that declares the field: the root model itself or
    /// one of its embedded structs.
    pub fn owner<'m>(&self, root: &'m dyn Resource) -> Option<&'m dyn Resource> {
        let (_, parents) = self.path.split_last()?;
        parents
            .iter()
            .try_fold(root, |resource, index| match resource.field(*index)? {
                FieldRef::Embedded(inner) => Some(inner),
                _ => None,
            })
    }

    /// Mutably borrows the field from the root model.
    pub fn get_mut<'m>(&self, root: &'m mut dyn Resource) -> Option<FieldMut<'m>> {
        field_mut_at(root, &self.path)
    }

    fn slot(&self) -> Slot {
        match self.role {
            Role::Primary => Slot::Primary,
            Role::ClientId => Slot::ClientId,
            Role::Attribute => Slot::Attribute(self.key.clone()),
            Role::Relation => Slot::Relation(self.key.clone()),
        }
    }
}

fn field_at<'m>(resource: &'m dyn Resource, path: &[usize]) -> Option<FieldRef<'m>> {
    match path {
        [] => None,
        [last] => resource.field(*last),
        [first, rest @ ..] => match resource.field(*first)? {
            FieldRef::Embedded(inner) => field_at(inner, rest),
            _ => None,
        },
    }
}

fn field_mut_at<'m>(resource: &'m mut dyn Resource, path: &[usize]) -> Option<FieldMut<'m>> {
    match path {
        [] => None,
        [last] => resource.field_mut(*last),
        [first, rest @ ..] => match resource.field_mut(*first)? {
            FieldMut::Embedded(inner) => field_mut_at(inner, rest),
            _ => None,
        },
    }
}

/// Dominance slot: two fields in the same slot compete for one document member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Primary,
    ClientId,
    Attribute(String),
    Relation(String),
}

/// One struct level: its own fields plus its embedded structs.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Schema of this level's struct.
    pub schema: &'static Schema,
    /// Fields declared directly on this level, in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Embedded structs, keyed by the embedding field's index.
    pub embedded: Vec<(usize, Layout)>,
}

/// The validated layout of a model type.
#[derive(Debug, Clone)]
pub struct ModelLayout {
    /// The document `type` declared by the primary field.
    pub type_name: String,
    /// Struct levels.
    pub tree: Layout,
    /// Dominance-resolved fields, ordered by path.
    pub fields: Vec<FieldDescriptor>,
}

impl ModelLayout {
    /// The model's name.
    pub fn model(&self) -> &'static str {
        self.tree.schema.name
    }

    /// The winning primary field.
    pub fn primary(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|d| d.role == Role::Primary)
    }

    /// The winning client-id field, if any.
    pub fn client_id(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|d| d.role == Role::ClientId)
    }
}

// --- CACHE ---

/// Extracted layouts keyed by schema address. Each derived model owns exactly
/// one `static` schema.
static LAYOUTS: LazyLock<RwLock<HashMap<usize, Arc<ModelLayout>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Returns the layout for `schema`, extracting it on first use.
///
/// Extraction failures are not cached; every call with a broken model reports
/// the error again.
pub fn layout_of(schema: &'static Schema) -> Result<Arc<ModelLayout>> {
    let address = std::ptr::from_ref(schema) as usize;
    if let Some(layout) = LAYOUTS.read().get(&address) {
        return Ok(Arc::clone(layout));
    }

    let layout = Arc::new(extract(schema)?);
    tracing::debug!(
        model = schema.name,
        type_name = %layout.type_name,
        fields = layout.fields.len(),
        "extracted model layout"
    );
    Ok(Arc::clone(
        LAYOUTS.write().entry(address).or_insert(layout),
    ))
}

/// Extracts and validates a layout without consulting the cache.
pub fn extract(schema: &'static Schema) -> Result<ModelLayout> {
    let tree = extract_level(schema, &[])?;
    let fields = flatten(&tree);

    let primary = fields
        .iter()
        .find(|d| d.role == Role::Primary)
        .ok_or_else(|| JsonApiError::BadStructTag {
            model: schema.name,
            field: "*",
            reason: "model has no primary field".into(),
        })?;

    Ok(ModelLayout {
        type_name: primary.key.clone(),
        tree,
        fields,
    })
}

fn extract_level(schema: &'static Schema, prefix: &[usize]) -> Result<Layout> {
    let mut layout = Layout {
        schema,
        fields: Vec::new(),
        embedded: Vec::new(),
    };
    let mut claimed = HashSet::new();

    for (index, spec) in schema.fields.iter().enumerate() {
        let bad = |reason: String| JsonApiError::BadStructTag {
            model: schema.name,
            field: spec.ident,
            reason,
        };
        let mut path = prefix.to_vec();
        path.push(index);

        let Some((&role, args)) = spec.annotation.split_first() else {
            return Err(bad("empty annotation".into()));
        };

        let descriptor = match role {
            "primary" => {
                let [type_name] = args else {
                    return Err(bad(format!(
                        "`primary` takes exactly one argument (the document type), found {}",
                        args.len()
                    )));
                };
                let FieldKind::Identifier { kind, .. } = spec.kind else {
                    return Err(bad("`primary` on a field that is not an identifier".into()));
                };
                if kind == IdKind::Float {
                    return Err(JsonApiError::BadPrimaryKeyType {
                        model: schema.name,
                        kind: "a floating point number",
                    });
                }
                if type_name.is_empty() {
                    return Err(bad("`primary` document type is empty".into()));
                }
                FieldDescriptor {
                    model: schema.name,
                    ident: spec.ident,
                    path,
                    role: Role::Primary,
                    key: (*type_name).to_owned(),
                    kind: spec.kind,
                    omit_empty: false,
                    time_format: TimeFormat::default(),
                }
            }
            "client-id" => {
                if !args.is_empty() {
                    return Err(bad(format!("`client-id` takes no arguments, found {}", args.len())));
                }
                if !matches!(spec.kind, FieldKind::Identifier { kind: IdKind::String, .. }) {
                    return Err(bad("`client-id` must be a string field".into()));
                }
                FieldDescriptor {
                    model: schema.name,
                    ident: spec.ident,
                    path,
                    role: Role::ClientId,
                    key: "client-id".into(),
                    kind: spec.kind,
                    omit_empty: false,
                    time_format: TimeFormat::default(),
                }
            }
            "attr" | "relation" => {
                let is_attr = role == "attr";
                let Some((key, modifiers)) = args.split_first() else {
                    return Err(bad(format!("`{role}` requires a key argument")));
                };
                if key.is_empty() {
                    return Err(bad(format!("`{role}` key is empty")));
                }
                let kind_ok = match spec.kind {
                    FieldKind::Attribute { .. } => is_attr,
                    FieldKind::Relation { .. } => !is_attr,
                    _ => false,
                };
                if !kind_ok {
                    return Err(bad(format!("`{role}` does not match the field's type")));
                }

                let mut omit_empty = false;
                let mut time_format = None;
                for &modifier in modifiers {
                    let format = match modifier {
                        "omitempty" => {
                            omit_empty = true;
                            continue;
                        }
                        "unix" if is_attr => TimeFormat::Unix,
                        "iso8601" if is_attr => TimeFormat::Iso8601,
                        "rfc3339" if is_attr => TimeFormat::Rfc3339,
                        other => return Err(bad(format!("unknown `{role}` modifier `{other}`"))),
                    };
                    if time_format.replace(format).is_some() {
                        return Err(bad("more than one time encoding".into()));
                    }
                }

                FieldDescriptor {
                    model: schema.name,
                    ident: spec.ident,
                    path,
                    role: if is_attr { Role::Attribute } else { Role::Relation },
                    key: (*key).to_owned(),
                    kind: spec.kind,
                    omit_empty,
                    time_format: time_format.unwrap_or_default(),
                }
            }
            "embed" => {
                if !args.is_empty() {
                    return Err(bad(format!("`embed` takes no arguments, found {}", args.len())));
                }
                let (FieldKind::Embedded, Some(describe)) = (spec.kind, spec.embedded) else {
                    return Err(bad("`embed` on a field that is not a model".into()));
                };
                layout.embedded.push((index, extract_level(describe(), &path)?));
                continue;
            }
            other => {
                return Err(JsonApiError::UnsupportedAnnotation {
                    model: schema.name,
                    field: spec.ident,
                    role: other.to_owned(),
                });
            }
        };

        if !claimed.insert(descriptor.slot()) {
            return Err(bad(match descriptor.role {
                Role::Primary => "more than one primary field".into(),
                Role::ClientId => "more than one client-id field".into(),
                _ => format!("key {:?} is declared twice", descriptor.key),
            }));
        }
        layout.fields.push(descriptor);
    }

    Ok(layout)
}

/// Resolves dominance over a level and everything it embeds.
fn flatten(layout: &Layout) -> Vec<FieldDescriptor> {
    // `None` marks an attribute key that sibling embeds both claim.
    let mut slots: IndexMap<Slot, Option<FieldDescriptor>> = IndexMap::new();

    for (_, child) in &layout.embedded {
        for descriptor in flatten(child) {
            match slots.entry(descriptor.slot()) {
                Entry::Occupied(mut taken) => {
                    if descriptor.role == Role::Attribute {
                        *taken.get_mut() = None;
                    }
                }
                Entry::Vacant(free) => {
                    free.insert(Some(descriptor));
                }
            }
        }
    }
    for descriptor in &layout.fields {
        slots.insert(descriptor.slot(), Some(descriptor.clone()));
    }

    let mut fields: Vec<_> = slots.into_values().flatten().collect();
    fields.sort_by(|a, b| a.path.cmp(&b.path));
    fields
}
