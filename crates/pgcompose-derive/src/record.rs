//! Record derive macro implementation

use crate::attrs::field_attr;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut calls = Vec::new();
    for field in fields {
        let attr = field_attr(field)?;
        if attr.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        let call = if attr.embed {
            quote! { .embed(|r: &#name| &r.#ident) }
        } else {
            let column = attr
                .column
                .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
            if attr.untyped {
                quote! { .untyped(#column, |r: &#name| &r.#ident) }
            } else {
                quote! { .field(#column, |r: &#name| &r.#ident) }
            }
        };
        calls.push(call);
    }

    Ok(quote! {
        impl ::pgcompose::Record for #name {
            fn fields() -> ::pgcompose::Fields<Self> {
                ::pgcompose::Fields::<#name>::new()
                    #(#calls)*
            }
        }
    })
}
