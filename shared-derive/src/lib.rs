//! Derive macros shared by the nvme-admin crates
//!
//! `#[derive(U8Enum)]` implements `TryFrom<u8>` and `From<Enum> for u8` for a
//! fieldless `#[repr(u8)]` enum. Every variant must carry an explicit
//! discriminant, since those are the values read out of command and completion
//! dwords.
//!
//! The generated `TryFrom` uses `crate::primitive_enum::InvalidValue` as its
//! error type, so the deriving crate has to provide that module.

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Error, Fields};

#[proc_macro_derive(U8Enum)]
pub fn derive_u8_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_u8_enum(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_u8_enum(input: &DeriveInput) -> Result<proc_macro2::TokenStream, Error> {
    let ident = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(Error::new(input.span(), "U8Enum is only allowed on enums"));
    };

    let mut arms = Vec::with_capacity(data.variants.len());
    for variant in data.variants.iter() {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new(
                variant.span(),
                "U8Enum variants can not carry data",
            ));
        }
        let Some((_, disc)) = variant.discriminant.as_ref() else {
            return Err(Error::new(
                variant.span(),
                "U8Enum variants need an explicit discriminant",
            ));
        };
        let var = &variant.ident;
        arms.push(quote! {
            #disc => Ok(#ident::#var)
        });
    }

    Ok(quote! {
        impl TryFrom<u8> for #ident {
            type Error = crate::primitive_enum::InvalidValue<u8>;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    #(#arms,)*
                    v => Err(crate::primitive_enum::InvalidValue { value: v }),
                }
            }
        }

        impl From<#ident> for u8 {
            #[inline]
            fn from(value: #ident) -> u8 {
                value as u8
            }
        }
    })
}
