//! Derive macros for `fieldcipher`.
//!
//! `#[derive(Encrypted)]` implements `fieldcipher::EncryptedEntity` from
//! field attributes, so the encryption policy lives next to the data it
//! protects.

#![warn(clippy::pedantic, clippy::nursery)]

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitBool, LitInt,
    LitStr, PathArguments, PathSegment, Type,
};

const BACK_COLUMN_INFIX: &str = "_blind_index_";
const MAX_BITS: u32 = 256;

/// Derive macro for automatic field encryption.
///
/// # Example
///
/// ```rust,ignore
/// use fieldcipher::Encrypted;
///
/// #[derive(Encrypted)]
/// #[encrypted(table = "users")]
/// struct User {
///     id: u64,
///     #[encrypted(
///         blind_index(name = "last_four", transformer = "last-four-digits", bits = 16, fast),
///         blind_index(name = "full", transformer = "digits-only"),
///     )]
///     ssn: Option<String>,
///     #[blind_index]
///     ssn_blind_index_last_four: Option<String>,
///     #[blind_index(field = "ssn", name = "full")]
///     ssn_full_idx: Option<String>,
/// }
/// ```
///
/// - `table` defaults to the struct name in snake case.
/// - Encrypted fields and back-columns must be `Option<String>`.
/// - A bare `#[blind_index]` is read as `{field}_blind_index_{index}`.
/// - Indexes without a back-column are still derived but not stored.
#[proc_macro_derive(Encrypted, attributes(encrypted, blind_index))]
pub fn derive_encrypted(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

struct IndexAttr {
    name: String,
    transformer: Option<String>,
    bits: Option<u32>,
    fast: bool,
    span: Span,
}

struct EncryptedAttr {
    ident: Ident,
    name: String,
    indexes: Vec<IndexAttr>,
}

struct BackColumn {
    ident: Ident,
    field: String,
    index: String,
    span: Span,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let table = container_table(input)?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(&input.ident, "Encrypted can only be derived for structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Encrypted requires a struct with named fields",
        ));
    };

    let mut encrypted = Vec::new();
    let mut columns = Vec::new();
    for field in &named.named {
        let Some(ident) = field.ident.clone() else { continue };
        let name = ident.unraw().to_string();
        for attr in &field.attrs {
            if attr.path().is_ident("encrypted") {
                if encrypted.iter().any(|e: &EncryptedAttr| e.name == name) {
                    return Err(syn::Error::new_spanned(
                        attr,
                        format!("field `{name}` is already declared `#[encrypted]`"),
                    ));
                }
                check_slot_type(&field.ty)?;
                encrypted.push(parse_encrypted(attr, ident.clone(), name.clone())?);
            } else if attr.path().is_ident("blind_index") {
                check_slot_type(&field.ty)?;
                columns.push(parse_back_column(attr, ident.clone(), &name)?);
            }
        }
    }

    validate(&encrypted, &columns)?;

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let index_consts = encrypted.iter().enumerate().map(|(i, field)| {
        let const_ident = format_ident!("__FIELDCIPHER_INDEXES_{}", i);
        let specs = field.indexes.iter().map(index_spec);
        quote! {
            const #const_ident: &[::fieldcipher::BlindIndexSpec] = &[#(#specs),*];
        }
    });
    let declarations = encrypted.iter().enumerate().map(|(i, field)| {
        let const_ident = format_ident!("__FIELDCIPHER_INDEXES_{}", i);
        let name = &field.name;
        quote! {
            ::fieldcipher::EncryptedFieldDeclaration::new(#table, #name)
                .with_blind_indexes(#const_ident)
        }
    });
    let value_arms = encrypted.iter().map(|field| {
        let name = &field.name;
        let ident = &field.ident;
        quote! { #name => ::core::option::Option::Some(&mut self.#ident), }
    });
    let slot_arms = columns.iter().map(|column| {
        let (field, index, ident) = (&column.field, &column.index, &column.ident);
        quote! { (#field, #index) => ::core::option::Option::Some(&mut self.#ident), }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::fieldcipher::EncryptedEntity for #ident #ty_generics #where_clause {
            fn encrypted_fields() -> &'static [::fieldcipher::EncryptedFieldDeclaration] {
                #(#index_consts)*
                const __FIELDCIPHER_FIELDS: &[::fieldcipher::EncryptedFieldDeclaration] =
                    &[#(#declarations),*];
                __FIELDCIPHER_FIELDS
            }

            fn encrypted_value_mut(
                &mut self,
                field: &str,
            ) -> ::core::option::Option<&mut ::core::option::Option<::std::string::String>> {
                match field {
                    #(#value_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn blind_index_slot_mut(
                &mut self,
                field: &str,
                index: &str,
            ) -> ::core::option::Option<&mut ::core::option::Option<::std::string::String>> {
                match (field, index) {
                    #(#slot_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

fn index_spec(index: &IndexAttr) -> TokenStream2 {
    let name = &index.name;
    let mut spec = quote! { ::fieldcipher::BlindIndexSpec::new(#name) };
    if let Some(transformer) = &index.transformer {
        spec = quote! { #spec.with_transformer(#transformer) };
    }
    if let Some(bits) = index.bits {
        spec = quote! { #spec.with_bits(#bits) };
    }
    if index.fast {
        spec = quote! { #spec.with_fast(true) };
    }
    spec
}

fn container_table(input: &DeriveInput) -> syn::Result<String> {
    let mut table = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("encrypted")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported container attribute, expected `table`"))
            }
        })?;
    }
    Ok(table.unwrap_or_else(|| snake_case(&input.ident.unraw().to_string())))
}

fn parse_encrypted(attr: &Attribute, ident: Ident, name: String) -> syn::Result<EncryptedAttr> {
    let mut indexes = Vec::new();

    // Bare `#[encrypted]` declares a field without blind indexes
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(EncryptedAttr { ident, name, indexes });
    }

    attr.parse_nested_meta(|meta| {
        if !meta.path.is_ident("blind_index") {
            return Err(meta.error("unsupported field attribute, expected `blind_index(...)`"));
        }

        let span = meta.path.span();
        let mut index_name = None;
        let mut transformer = None;
        let mut bits = None;
        let mut fast = false;
        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("name") {
                index_name = Some(inner.value()?.parse::<LitStr>()?.value());
            } else if inner.path.is_ident("transformer") {
                transformer = Some(inner.value()?.parse::<LitStr>()?.value());
            } else if inner.path.is_ident("bits") {
                let lit = inner.value()?.parse::<LitInt>()?;
                let value = lit.base10_parse::<u32>()?;
                if !(1..=MAX_BITS).contains(&value) {
                    return Err(syn::Error::new(lit.span(), "bits must be within 1..=256"));
                }
                bits = Some(value);
            } else if inner.path.is_ident("fast") {
                fast = if inner.input.peek(syn::Token![=]) {
                    inner.value()?.parse::<LitBool>()?.value
                } else {
                    true
                };
            } else {
                return Err(inner.error(
                    "unsupported blind_index key, expected `name`, `transformer`, `bits` or `fast`",
                ));
            }
            Ok(())
        })?;

        let Some(index_name) = index_name else {
            return Err(syn::Error::new(span, "blind_index requires `name = \"...\"`"));
        };
        indexes.push(IndexAttr { name: index_name, transformer, bits, fast, span });
        Ok(())
    })?;

    Ok(EncryptedAttr { ident, name, indexes })
}

fn parse_back_column(attr: &Attribute, ident: Ident, name: &str) -> syn::Result<BackColumn> {
    let span = ident.span();

    if matches!(attr.meta, syn::Meta::Path(_)) {
        return match name.split_once(BACK_COLUMN_INFIX) {
            Some((field, index)) if !field.is_empty() && !index.is_empty() => Ok(BackColumn {
                ident,
                field: field.to_string(),
                index: index.to_string(),
                span,
            }),
            _ => Err(syn::Error::new(
                span,
                "cannot infer blind index from field name, expected `{field}_blind_index_{index}` \
                 or `#[blind_index(field = \"...\", name = \"...\")]`",
            )),
        };
    }

    let mut field = None;
    let mut index = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("field") {
            field = Some(meta.value()?.parse::<LitStr>()?.value());
        } else if meta.path.is_ident("name") {
            index = Some(meta.value()?.parse::<LitStr>()?.value());
        } else {
            return Err(meta.error("unsupported blind_index key, expected `field` or `name`"));
        }
        Ok(())
    })?;

    match (field, index) {
        (Some(field), Some(index)) => Ok(BackColumn { ident, field, index, span }),
        _ => Err(syn::Error::new(span, "blind_index requires both `field` and `name`")),
    }
}

fn validate(encrypted: &[EncryptedAttr], columns: &[BackColumn]) -> syn::Result<()> {
    for field in encrypted {
        for (i, index) in field.indexes.iter().enumerate() {
            if field.indexes[..i].iter().any(|other| other.name == index.name) {
                return Err(syn::Error::new(
                    index.span,
                    format!("duplicate blind index `{}` on field `{}`", index.name, field.name),
                ));
            }
        }
    }

    for (i, column) in columns.iter().enumerate() {
        let declared = encrypted
            .iter()
            .find(|f| f.name == column.field)
            .is_some_and(|f| f.indexes.iter().any(|idx| idx.name == column.index));
        if !declared {
            return Err(syn::Error::new(
                column.span,
                format!(
                    "no blind index `{}` declared on encrypted field `{}`",
                    column.index, column.field
                ),
            ));
        }
        if columns[..i].iter().any(|c| c.field == column.field && c.index == column.index) {
            return Err(syn::Error::new(
                column.span,
                format!("blind index `{}.{}` already has a back-column", column.field, column.index),
            ));
        }
    }

    Ok(())
}

/// Encrypted values and back-columns are stored as `Option<String>`.
fn check_slot_type(ty: &Type) -> syn::Result<()> {
    let inner = last_segment(ty)
        .filter(|seg| seg.ident == "Option")
        .and_then(|seg| match &seg.arguments {
            PathArguments::AngleBracketed(args) if args.args.len() == 1 => args.args.first(),
            _ => None,
        });
    match inner {
        Some(GenericArgument::Type(arg))
            if last_segment(arg).is_some_and(|seg| seg.ident == "String") =>
        {
            Ok(())
        }
        _ => Err(syn::Error::new_spanned(
            ty,
            "encrypted fields and blind index columns must be `Option<String>`",
        )),
    }
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
