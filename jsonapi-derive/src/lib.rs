//! # jsonapi Derive Macros
//!
//! This crate provides the procedural macro for `jsonapi`. It lowers the
//! `#[jsonapi(...)]` field annotations of a struct into a static `Schema` and
//! implements `Resource`, `Model` and `Related` on top of it.
//!
//! Annotation shape (argument counts, modifiers, unknown roles) is checked by
//! the runtime field extractor, not here, so a malformed annotation surfaces
//! as a `JsonApiError` on first use of the model.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Token, parse_macro_input};

/// Derives `Resource`, `Model` and `Related`.
///
/// Field annotations:
///
/// * `#[jsonapi(primary = "blogs")]`: primary key; the argument is the document type.
/// * `#[jsonapi(client_id)]`: client-generated id.
/// * `#[jsonapi(attr = "title", omitempty, iso8601)]`: attribute.
/// * `#[jsonapi(relation = "posts", omitempty)]`: relationship.
/// * `#[jsonapi(embed)]`: embedded model whose fields are flattened in.
///
/// Container annotation: `#[jsonapi(links, meta, relationship_links, relationship_meta)]`
/// forwards the document hooks to the matching user-implemented traits.
#[proc_macro_derive(JsonApiModel, attributes(jsonapi))]
pub fn derive_jsonapi_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    if !input.generics.params.is_empty() {
        return syn::Error::new(name.span(), "JsonApiModel does not support generic structs")
            .to_compile_error()
            .into();
    }

    let fields = match input.data {
        Data::Struct(ds) => match ds.fields {
            Fields::Named(named) => named.named,
            _ => {
                return syn::Error::new(name.span(), "JsonApiModel requires named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(name.span(), "JsonApiModel only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let hooks = match parse_container(&input.attrs) {
        Ok(res) => res,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut annotated = Vec::new();
    for field in fields {
        let annotation = match parse_annotation(&field.attrs) {
            Ok(res) => res,
            Err(e) => return e.to_compile_error().into(),
        };
        let Some(annotation) = annotation else {
            continue;
        };
        let Some(ident) = field.ident else {
            continue;
        };
        let role = FieldRole::from_keyword(&annotation[0]);
        annotated.push(AnnotatedField {
            ident,
            ty: field.ty,
            annotation,
            role,
        });
    }

    let impl_model = generate_model(&name, &annotated);
    let impl_resource = generate_resource(&name, &annotated, &hooks);
    let impl_related = generate_related(&name);

    let expanded = quote! {
        #impl_model
        #impl_resource
        #impl_related
    };

    TokenStream::from(expanded)
}

// --- Internal Data Structures ---

struct AnnotatedField {
    ident: syn::Ident,
    ty: syn::Type,
    /// Role keyword followed by its arguments.
    annotation: Vec<String>,
    role: FieldRole,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Identifier,
    Attribute,
    Relation,
    Embedded,
    Unknown,
}

impl FieldRole {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "primary" | "client-id" => Self::Identifier,
            "attr" => Self::Attribute,
            "relation" => Self::Relation,
            "embed" => Self::Embedded,
            _ => Self::Unknown,
        }
    }
}

#[derive(Default)]
struct Hooks {
    links: bool,
    meta: bool,
    relationship_links: bool,
    relationship_meta: bool,
}

/// Flattens every `#[jsonapi(...)]` on a field into annotation parts:
/// `key = "value"` contributes `key` then `value`, a bare `key` contributes
/// itself. `client_id` is spelled `client-id`.
fn parse_annotation(attrs: &[Attribute]) -> syn::Result<Option<Vec<String>>> {
    let mut parts = Vec::new();
    let mut found = false;

    for attr in attrs {
        if attr.path().is_ident("jsonapi") {
            found = true;
            attr.parse_nested_meta(|meta| {
                let Some(ident) = meta.path.get_ident() else {
                    return Err(meta.error("expected a jsonapi annotation keyword"));
                };
                let keyword = ident.to_string();
                parts.push(if keyword == "client_id" {
                    "client-id".to_owned()
                } else {
                    keyword
                });

                if meta.input.peek(Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    parts.push(value.value());
                }
                Ok(())
            })?;
        }
    }

    if found && parts.is_empty() {
        parts.push(String::new());
    }
    Ok(found.then_some(parts))
}

fn parse_container(attrs: &[Attribute]) -> syn::Result<Hooks> {
    let mut hooks = Hooks::default();

    for attr in attrs {
        if attr.path().is_ident("jsonapi") {
            attr.parse_nested_meta(|meta| {
                let flag = if meta.path.is_ident("links") {
                    &mut hooks.links
                } else if meta.path.is_ident("meta") {
                    &mut hooks.meta
                } else if meta.path.is_ident("relationship_links") {
                    &mut hooks.relationship_links
                } else if meta.path.is_ident("relationship_meta") {
                    &mut hooks.relationship_meta
                } else {
                    return Err(meta.error(
                        "Unknown jsonapi container key. Supported: links, meta, relationship_links, relationship_meta",
                    ));
                };
                *flag = true;
                Ok(())
            })?;
        }
    }
    Ok(hooks)
}

// --- Generator: Model (static schema) ---

fn generate_model(name: &syn::Ident, fields: &[AnnotatedField]) -> proc_macro2::TokenStream {
    let model_name = name.to_string();

    let specs = fields.iter().map(|f| {
        let ident = f.ident.to_string();
        let ty = &f.ty;
        let parts = &f.annotation;

        let kind = match f.role {
            FieldRole::Identifier => quote! {
                jsonapi::FieldKind::Identifier {
                    kind: <#ty as jsonapi::Identifier>::KIND,
                    nullable: <#ty as jsonapi::Identifier>::NULLABLE,
                }
            },
            FieldRole::Attribute => quote! {
                jsonapi::FieldKind::Attribute {
                    kind: <#ty as jsonapi::Attribute>::KIND,
                    nullable: <#ty as jsonapi::Attribute>::NULLABLE,
                }
            },
            FieldRole::Relation => quote! {
                jsonapi::FieldKind::Relation {
                    cardinality: <#ty as jsonapi::Relation>::CARDINALITY,
                    nullable: <#ty as jsonapi::Relation>::NULLABLE,
                }
            },
            FieldRole::Embedded => quote! { jsonapi::FieldKind::Embedded },
            FieldRole::Unknown => quote! { jsonapi::FieldKind::Unknown },
        };

        let embedded = if f.role == FieldRole::Embedded {
            quote! {
                Some(<#ty as jsonapi::Model>::describe as fn() -> &'static jsonapi::Schema)
            }
        } else {
            quote! { None }
        };

        quote! {
            jsonapi::FieldSpec {
                ident: #ident,
                annotation: &[#(#parts),*],
                kind: #kind,
                embedded: #embedded,
            }
        }
    });

    quote! {
        impl jsonapi::Model for #name {
            fn describe() -> &'static jsonapi::Schema {
                static SCHEMA: jsonapi::Schema = jsonapi::Schema {
                    name: #model_name,
                    fields: &[#(#specs),*],
                };
                &SCHEMA
            }
        }
    }
}

// --- Generator: Resource (field accessors + hooks) ---

fn generate_resource(
    name: &syn::Ident,
    fields: &[AnnotatedField],
    hooks: &Hooks,
) -> proc_macro2::TokenStream {
    let arms = |mutable: bool| {
        fields
            .iter()
            .enumerate()
            .filter_map(move |(index, f)| {
                let fname = &f.ident;
                let (enum_name, access) = if mutable {
                    (quote! { jsonapi::FieldMut }, quote! { &mut self.#fname })
                } else {
                    (quote! { jsonapi::FieldRef }, quote! { &self.#fname })
                };
                let variant = match f.role {
                    FieldRole::Identifier => quote! { Identifier },
                    FieldRole::Attribute => quote! { Attribute },
                    FieldRole::Relation => quote! { Relation },
                    FieldRole::Embedded => quote! { Embedded },
                    FieldRole::Unknown => return None,
                };
                Some(quote! { #index => Some(#enum_name::#variant(#access)), })
            })
            .collect::<Vec<_>>()
    };
    let ref_arms = arms(false);
    let mut_arms = arms(true);

    let links_hook = hooks.links.then(|| {
        quote! {
            fn document_links(&self) -> Option<jsonapi::Links> {
                jsonapi::Linkable::links(self)
            }
        }
    });
    let meta_hook = hooks.meta.then(|| {
        quote! {
            fn document_meta(&self) -> Option<jsonapi::Meta> {
                jsonapi::Metable::meta(self)
            }
        }
    });
    let relation_links_hook = hooks.relationship_links.then(|| {
        quote! {
            fn relation_links(&self, relation: &str) -> Option<jsonapi::Links> {
                jsonapi::RelationshipLinkable::relationship_links(self, relation)
            }
        }
    });
    let relation_meta_hook = hooks.relationship_meta.then(|| {
        quote! {
            fn relation_meta(&self, relation: &str) -> Option<jsonapi::Meta> {
                jsonapi::RelationshipMetable::relationship_meta(self, relation)
            }
        }
    });

    quote! {
        impl jsonapi::Resource for #name {
            fn schema(&self) -> &'static jsonapi::Schema {
                <Self as jsonapi::Model>::describe()
            }

            #[allow(clippy::match_single_binding)]
            fn field(&self, index: usize) -> Option<jsonapi::FieldRef<'_>> {
                match index {
                    #(#ref_arms)*
                    _ => None,
                }
            }

            #[allow(clippy::match_single_binding)]
            fn field_mut(&mut self, index: usize) -> Option<jsonapi::FieldMut<'_>> {
                match index {
                    #(#mut_arms)*
                    _ => None,
                }
            }

            #links_hook
            #meta_hook
            #relation_links_hook
            #relation_meta_hook
        }
    }
}

// --- Generator: Related ---

fn generate_related(name: &syn::Ident) -> proc_macro2::TokenStream {
    quote! {
        impl jsonapi::Related for #name {
            type Target = Self;

            fn target(&self) -> &Self {
                self
            }

            fn wrap(target: Self) -> Self {
                target
            }
        }
    }
}
