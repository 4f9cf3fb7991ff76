//! Procedural macros for the docbridge project.
//!
//! - `#[derive(DocumentSchema)]` describes a document type for schema synthesis
//! - `#[derive(SchemaType)]` describes an embedded struct or a unit-only enum
//!
//! Field names follow serde: `#[serde(rename = "...")]`, container-level
//! `#[serde(rename_all = "...")]` and `#[serde(skip)]` are honored, so the
//! generated validator describes the serialized form.
//!
//! Validation constraints are declared with `#[schema(...)]`:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, DocumentSchema)]
//! #[schema(collection = "people")]
//! pub struct User {
//!     pub id: String,
//!     #[schema(required, min_length = 1, max_length = 50)]
//!     pub name: String,
//!     #[schema(range(min = 0, max = 150))]
//!     pub age: i32,
//!     #[schema(pattern = "^[^@]+@[^@]+$")]
//!     pub email: Option<String>,
//!     #[schema(one_of("admin", "member"))]
//!     pub role: String,
//!     #[schema(skip)]
//!     pub cache: HashMap<String, String>,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, FieldsNamed, LitStr, Token, meta::ParseNestedMeta,
    parse_macro_input, punctuated::Punctuated,
};

#[proc_macro_derive(DocumentSchema, attributes(schema))]
pub fn derive_document_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_document_schema(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(SchemaType, attributes(schema))]
pub fn derive_schema_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_schema_type(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_document_schema(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let container = ContainerAttrs::parse(&input.attrs)?;
    let fields = field_descriptors(named_fields(input, "DocumentSchema")?, &container)?;
    let type_name = ident.to_string();

    let collection_override = container.collection.map(|collection| {
        quote! {
            fn collection_override() -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#collection)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::docbridge::schema::DocumentSchema for #ident #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            #collection_override

            fn fields() -> ::std::vec::Vec<::docbridge::schema::FieldDescriptor> {
                ::std::vec![#(#fields),*]
            }
        }
    })
}

fn expand_schema_type(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let container = ContainerAttrs::parse(&input.attrs)?;

    let body = match &input.data {
        Data::Enum(data) => {
            let mut members = Vec::with_capacity(data.variants.len());

            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(syn::Error::new_spanned(
                        variant,
                        "SchemaType can only be derived for enums whose variants are all unit variants",
                    ));
                }

                let serde = SerdeAttrs::parse(&variant.attrs)?;
                if serde.skip {
                    continue;
                }
                members.push(serde.rename.unwrap_or_else(|| {
                    rename_variant(&variant.ident.to_string(), container.rename_all.as_deref())
                }));
            }

            quote! { ::docbridge::schema::FieldType::enumeration::<_, &'static str>([#(#members),*]) }
        }
        _ => {
            let fields = field_descriptors(named_fields(input, "SchemaType")?, &container)?;
            quote! { ::docbridge::schema::FieldType::object(::std::vec![#(#fields),*]) }
        }
    };

    Ok(quote! {
        impl #impl_generics ::docbridge::schema::SchemaType for #ident #ty_generics #where_clause {
            fn field_type() -> ::docbridge::schema::FieldType {
                #body
            }
        }
    })
}

fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> syn::Result<&'a FieldsNamed> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(fields),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                format!("{derive} requires a struct with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

fn field_descriptors(fields: &FieldsNamed, container: &ContainerAttrs) -> syn::Result<Vec<TokenStream2>> {
    let mut descriptors = Vec::with_capacity(fields.named.len());

    for field in &fields.named {
        let serde = SerdeAttrs::parse(&field.attrs)?;
        let schema = FieldAttrs::parse(&field.attrs)?;
        if serde.skip || schema.skip {
            continue;
        }

        let Some(ident) = &field.ident else {
            continue;
        };
        let raw = ident.to_string();
        let raw = raw.strip_prefix("r#").unwrap_or(&raw);
        let name = serde
            .rename
            .unwrap_or_else(|| rename_field(raw, container.rename_all.as_deref()));
        let ty = &field.ty;
        let constraints = schema.constraints;

        descriptors.push(quote! {
            ::docbridge::schema::FieldDescriptor::new(
                #name,
                <#ty as ::docbridge::schema::SchemaType>::field_type(),
            )
            #(.with_constraint(#constraints))*
        });
    }

    Ok(descriptors)
}

#[derive(Default)]
struct ContainerAttrs {
    collection: Option<String>,
    rename_all: Option<String>,
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = ContainerAttrs::default();

        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("collection") {
                        parsed.collection = Some(meta.value()?.parse::<LitStr>()?.value());
                        Ok(())
                    } else {
                        Err(meta.error("unsupported container attribute, expected `collection = \"...\"`"))
                    }
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                        parsed.rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
                        Ok(())
                    } else {
                        skip_meta_value(&meta)
                    }
                })?;
            }
        }

        Ok(parsed)
    }
}

#[derive(Default)]
struct SerdeAttrs {
    rename: Option<String>,
    skip: bool,
}

impl SerdeAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = SerdeAttrs::default();

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    parsed.skip = true;
                    Ok(())
                } else {
                    skip_meta_value(&meta)
                }
            })?;
        }

        Ok(parsed)
    }
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    constraints: Vec<TokenStream2>,
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = FieldAttrs::default();
        let constraint = quote! { ::docbridge::schema::Constraint };

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("schema")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    parsed.skip = true;
                } else if meta.path.is_ident("required") {
                    parsed.constraints.push(quote! { #constraint::Required });
                } else if meta.path.is_ident("min_length") {
                    let value: Expr = meta.value()?.parse()?;
                    parsed.constraints.push(quote! { #constraint::MinLength((#value) as u32) });
                } else if meta.path.is_ident("max_length") {
                    let value: Expr = meta.value()?.parse()?;
                    parsed.constraints.push(quote! { #constraint::MaxLength((#value) as u32) });
                } else if meta.path.is_ident("pattern") {
                    let value: LitStr = meta.value()?.parse()?;
                    parsed
                        .constraints
                        .push(quote! { #constraint::Pattern(::std::string::String::from(#value)) });
                } else if meta.path.is_ident("range") {
                    let mut min = quote! { ::core::option::Option::None };
                    let mut max = quote! { ::core::option::Option::None };

                    meta.parse_nested_meta(|bound| {
                        let value: Expr = bound.value()?.parse()?;
                        if bound.path.is_ident("min") {
                            min = quote! { ::core::option::Option::Some((#value) as i64) };
                        } else if bound.path.is_ident("max") {
                            max = quote! { ::core::option::Option::Some((#value) as i64) };
                        } else {
                            return Err(bound.error("expected `min` or `max`"));
                        }
                        Ok(())
                    })?;
                    parsed
                        .constraints
                        .push(quote! { #constraint::Range { min: #min, max: #max } });
                } else if meta.path.is_ident("one_of") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    let members = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                    let members = members.iter();
                    parsed.constraints.push(quote! {
                        #constraint::Enumeration(::std::vec![#(::std::string::String::from(#members)),*])
                    });
                } else {
                    return Err(meta.error(
                        "unsupported schema attribute, expected one of `required`, `min_length`, \
                         `max_length`, `pattern`, `range`, `one_of`, `skip`",
                    ));
                }
                Ok(())
            })?;
        }

        Ok(parsed)
    }
}

/// Consumes the value of a serde option this crate does not interpret.
fn skip_meta_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

fn rename_field(name: &str, rule: Option<&str>) -> String {
    match rule {
        Some(rule) => apply_rule(name.split('_').filter(|w| !w.is_empty()).collect(), rule)
            .unwrap_or_else(|| name.to_string()),
        None => name.to_string(),
    }
}

fn rename_variant(name: &str, rule: Option<&str>) -> String {
    let Some(rule) = rule else {
        return name.to_string();
    };

    let mut words = Vec::new();
    let mut start = 0;
    for (i, c) in name.char_indices().skip(1) {
        if c.is_uppercase() {
            words.push(&name[start..i]);
            start = i;
        }
    }
    words.push(&name[start..]);

    apply_rule(words, rule).unwrap_or_else(|| name.to_string())
}

/// Joins `words` using a serde `rename_all` rule. `None` for unknown rules.
fn apply_rule(words: Vec<&str>, rule: &str) -> Option<String> {
    let lower = words.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>();
    let upper = words.iter().map(|w| w.to_uppercase()).collect::<Vec<_>>();
    let capitalized = lower.iter().map(|w| capitalize(w)).collect::<Vec<_>>();

    Some(match rule {
        "lowercase" => lower.concat(),
        "UPPERCASE" => upper.concat(),
        "PascalCase" => capitalized.concat(),
        "camelCase" => match lower.split_first() {
            Some((first, rest)) => {
                first.clone() + &rest.iter().map(|w| capitalize(w)).collect::<String>()
            }
            None => String::new(),
        },
        "snake_case" => lower.join("_"),
        "SCREAMING_SNAKE_CASE" => upper.join("_"),
        "kebab-case" => lower.join("-"),
        "SCREAMING-KEBAB-CASE" => upper.join("-"),
        _ => return None,
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
