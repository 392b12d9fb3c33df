#![forbid(unsafe_code)]
//! Derive macros for daokit.
//!
//! [`Entity`](macro@Entity) wires a struct into the repository stack:
//! mapping metadata, identifier access and row conversion. [`Projection`]
//! turns a struct into a projection shape whose columns are classified by
//! their declared Rust types.
//!
//! Generated code refers to items through the `daokit` facade crate, so
//! derive users depend on `daokit`, not on the individual workspace
//! crates.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Type};

fn is_option(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn option_inner(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

/// Classifies a declared field type into a `ScalarKind`. `Option<T>`
/// classifies as `T`; unknown types fall back to text, mirroring the
/// mapping layer's default-to-string rule.
fn scalar_kind_for(ty: &Type) -> TokenStream2 {
    let base = option_inner(ty).unwrap_or(ty);
    let ty_str = quote!(#base).to_string().replace(' ', "");
    let kind = if ty_str == "i64" || ty_str.ends_with("::i64") {
        "BigInt"
    } else if ty_str == "i32" || ty_str.ends_with("::i32") {
        "Int"
    } else if ty_str == "f64" || ty_str == "f32" {
        "Double"
    } else if ty_str == "bool" {
        "Bool"
    } else if ty_str.contains("Decimal") {
        "Decimal"
    } else if ty_str.contains("NaiveDateTime") || ty_str.contains("DateTime") {
        "Timestamp"
    } else {
        "Text"
    };
    let ident = syn::Ident::new(kind, proc_macro2::Span::call_site());
    quote!(::daokit::ScalarKind::#ident)
}

fn named_fields<'a>(
    input: &'a DeriveInput,
    derive_name: &str,
) -> &'a syn::punctuated::Punctuated<syn::Field, syn::token::Comma> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => panic!("#[derive({derive_name})] requires named fields"),
        },
        _ => panic!("#[derive({derive_name})] can only be applied to structs"),
    }
}

struct EntityField<'a> {
    ident: &'a syn::Ident,
    ty: &'a Type,
    property: String,
    is_id: bool,
    is_skipped: bool,
}

/// Derives the entity wiring: `EntityDef`, `HasId`, `ToRow` and
/// `FromRow`.
///
/// Struct attribute: `#[entity(name = "...")]` overrides the mapped
/// entity name, which defaults to the struct identifier.
///
/// Field attributes under `#[orm(...)]`:
/// - `id`: marks the identifier field (exactly one required). The field
///   may be `Option<K>` or plain `K`.
/// - `property = "..."`: overrides the mapped property name.
/// - `skip`: leaves the field out of rows; it must implement `Default`
///   for materialization.
///
/// Supported field types are the `Value` scalars (`String`, `i32`,
/// `i64`, `f64`, `bool`, `Decimal`, `NaiveDateTime`) and `Option` of
/// them.
#[proc_macro_derive(Entity, attributes(entity, orm))]
pub fn entity_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let mut entity_name = name.to_string();
    for attr in &input.attrs {
        if attr.path().is_ident("entity") {
            let parsed = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    entity_name = value.value();
                    Ok(())
                } else {
                    Err(meta.error("unsupported #[entity(...)] key"))
                }
            });
            if let Err(err) = parsed {
                panic!("invalid #[entity(...)] attribute: {err}");
            }
        }
    }

    let fields = named_fields(&input, "Entity");
    let mut metas: Vec<EntityField> = Vec::new();
    for field in fields {
        let ident = field.ident.as_ref().expect("named field");
        let mut property = ident.to_string();
        let mut is_id = false;
        let mut is_skipped = false;
        for attr in &field.attrs {
            if attr.path().is_ident("orm") {
                let parsed = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("id") {
                        is_id = true;
                        Ok(())
                    } else if meta.path.is_ident("skip") {
                        is_skipped = true;
                        Ok(())
                    } else if meta.path.is_ident("property") {
                        let value: syn::LitStr = meta.value()?.parse()?;
                        property = value.value();
                        Ok(())
                    } else {
                        Err(meta.error("unsupported #[orm(...)] key"))
                    }
                });
                if let Err(err) = parsed {
                    panic!("invalid #[orm(...)] attribute: {err}");
                }
            }
        }
        metas.push(EntityField {
            ident,
            ty: &field.ty,
            property,
            is_id,
            is_skipped,
        });
    }

    let id_fields: Vec<&EntityField> = metas.iter().filter(|f| f.is_id).collect();
    if id_fields.len() != 1 {
        panic!(
            "#[derive(Entity)] requires exactly one #[orm(id)] field, found {}",
            id_fields.len()
        );
    }
    let id_field = id_fields[0];
    if id_field.is_skipped {
        panic!("the #[orm(id)] field cannot also be #[orm(skip)]");
    }

    let id_property = &id_field.property;
    let id_ident = id_field.ident;
    let (key_ty, id_expr) = match option_inner(id_field.ty) {
        Some(inner) => (quote!(#inner), quote!(self.#id_ident.clone())),
        None => {
            let ty = id_field.ty;
            (
                quote!(#ty),
                quote!(::std::option::Option::Some(self.#id_ident.clone())),
            )
        }
    };

    let property_names: Vec<&str> = metas
        .iter()
        .filter(|f| !f.is_skipped)
        .map(|f| f.property.as_str())
        .collect();

    let to_row_sets = metas.iter().filter(|f| !f.is_skipped).map(|f| {
        let ident = f.ident;
        let property = &f.property;
        quote! {
            row.set(#property, ::daokit::ToValue::to_value(&self.#ident));
        }
    });

    let from_row_fields = metas.iter().map(|f| {
        let ident = f.ident;
        let property = &f.property;
        if f.is_skipped {
            quote! { #ident: ::std::default::Default::default() }
        } else if is_option(f.ty) {
            quote! { #ident: ::daokit::row_field_opt(row, #property)? }
        } else {
            quote! { #ident: ::daokit::row_field(row, #property)? }
        }
    });

    let expanded = quote! {
        impl ::daokit::EntityDef for #name {
            const ENTITY_NAME: &'static str = #entity_name;
            const ID_PROPERTY: &'static str = #id_property;
            const PROPERTIES: &'static [&'static str] = &[#(#property_names),*];
        }

        impl ::daokit::HasId for #name {
            type Key = #key_ty;

            fn id(&self) -> ::std::option::Option<Self::Key> {
                #id_expr
            }
        }

        impl ::daokit::ToRow for #name {
            fn to_row(&self) -> ::daokit::Row {
                let mut row = ::daokit::Row::new();
                #(#to_row_sets)*
                row
            }
        }

        impl ::daokit::FromRow for #name {
            fn from_row(row: &::daokit::Row) -> ::daokit::OrmResult<Self> {
                ::std::result::Result::Ok(Self {
                    #(#from_row_fields),*
                })
            }
        }
    };
    expanded.into()
}

/// Derives `RowShape` for a projection target.
///
/// Each field's column kind comes from its declared type at expansion
/// time; row values never influence classification. At most one field
/// may carry `#[projection(parent)]`; its type must itself implement
/// `RowShape`, and only that parent's own columns join the projected
/// set. Parents of parents are never walked, so parent shapes should be
/// flat.
#[proc_macro_derive(Projection, attributes(projection))]
pub fn projection_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = named_fields(&input, "Projection");
    let mut direct: Vec<(&syn::Ident, &Type)> = Vec::new();
    let mut parent: Option<(&syn::Ident, &Type)> = None;
    for field in fields {
        let ident = field.ident.as_ref().expect("named field");
        let mut is_parent = false;
        for attr in &field.attrs {
            if attr.path().is_ident("projection") {
                let parsed = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("parent") {
                        is_parent = true;
                        Ok(())
                    } else {
                        Err(meta.error("unsupported #[projection(...)] key"))
                    }
                });
                if let Err(err) = parsed {
                    panic!("invalid #[projection(...)] attribute: {err}");
                }
            }
        }
        if is_parent {
            if parent.is_some() {
                panic!("#[derive(Projection)] allows at most one #[projection(parent)] field");
            }
            parent = Some((ident, &field.ty));
        } else {
            direct.push((ident, &field.ty));
        }
    }

    let direct_entries = direct.iter().map(|(ident, ty)| {
        let column = ident.to_string();
        let kind = scalar_kind_for(ty);
        quote! {
            ::daokit::ShapeField { name: #column, kind: #kind }
        }
    });

    let mut reads: Vec<TokenStream2> = direct
        .iter()
        .map(|(ident, ty)| {
            let column = ident.to_string();
            if is_option(ty) {
                quote! { #ident: ::daokit::row_field_opt(row, #column)? }
            } else {
                quote! { #ident: ::daokit::row_field(row, #column)? }
            }
        })
        .collect();

    let fields_fn = match parent {
        Some((parent_ident, parent_ty)) => {
            reads.push(quote! {
                #parent_ident: <#parent_ty as ::daokit::RowShape>::from_projected(row)?
            });
            quote! {
                fn fields() -> &'static [::daokit::ShapeField] {
                    static FIELDS: ::std::sync::OnceLock<
                        ::std::vec::Vec<::daokit::ShapeField>,
                    > = ::std::sync::OnceLock::new();
                    FIELDS.get_or_init(|| {
                        let mut all = ::std::vec::Vec::from(Self::DIRECT_FIELDS);
                        all.extend_from_slice(
                            <#parent_ty as ::daokit::RowShape>::DIRECT_FIELDS,
                        );
                        all
                    })
                }
            }
        }
        None => quote! {
            fn fields() -> &'static [::daokit::ShapeField] {
                Self::DIRECT_FIELDS
            }
        },
    };

    let expanded = quote! {
        impl ::daokit::RowShape for #name {
            const DIRECT_FIELDS: &'static [::daokit::ShapeField] = &[#(#direct_entries),*];

            #fields_fn

            fn from_projected(row: &::daokit::Row) -> ::daokit::OrmResult<Self> {
                ::std::result::Result::Ok(Self {
                    #(#reads),*
                })
            }
        }
    };
    expanded.into()
}
