//! Implementation of the `#[make_package]` attribute macro
//!
//! This macro transforms a module containing `#[make_fn]` items into a package
//! with an auto-generated registration function.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Item, ItemMod, parse_macro_input};

use crate::common::{find_attr_tokens, parse_fn_options, parse_ident_option};
use crate::make_fn::struct_name_for;

/// Information about a function marked with `#[make_fn]`
struct MakeFnInfo {
    /// The make name (explicit or derived)
    make_name: String,
    /// The generated struct
    struct_name: syn::Ident,
}

pub fn make_package_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_mod = parse_macro_input!(item as ItemMod);

    let register_name = match parse_ident_option(attr.into(), "register") {
        Ok(name) => name.unwrap_or_else(|| format_ident!("register")),
        Err(err) => return err.to_compile_error().into(),
    };

    match generate_package(&register_name, input_mod) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Generate the package with its registration function
fn generate_package(register_name: &syn::Ident, mut input_mod: ItemMod) -> syn::Result<TokenStream2> {
    let content = match &mut input_mod.content {
        Some((_, items)) => items,
        None => {
            return Err(syn::Error::new_spanned(
                &input_mod,
                "[gnumake] make_package requires a module with inline content (not a file module)",
            ));
        }
    };

    let mut functions: Vec<MakeFnInfo> = Vec::new();
    for item in content.iter() {
        let Item::Fn(item_fn) = item else {
            continue;
        };
        let Some(tokens) = find_attr_tokens(&item_fn.attrs, "make_fn")? else {
            continue;
        };
        let options = parse_fn_options(tokens)?;
        functions.push(MakeFnInfo {
            make_name: options
                .name
                .unwrap_or_else(|| item_fn.sig.ident.to_string()),
            struct_name: struct_name_for(&item_fn.sig.ident),
        });
    }

    content.push(syn::parse2(generate_register_function(register_name, &functions))?);
    content.push(syn::parse2(generate_names_const(&functions))?);

    let mod_name = &input_mod.ident;
    let mod_vis = &input_mod.vis;
    let mod_attrs = &input_mod.attrs;

    Ok(quote! {
        #(#mod_attrs)*
        #mod_vis mod #mod_name {
            #(#content)*
        }
    })
}

/// Generate the registration function
fn generate_register_function(register_name: &syn::Ident, functions: &[MakeFnInfo]) -> TokenStream2 {
    let registrations: Vec<_> = functions
        .iter()
        .map(|f| {
            let struct_name = &f.struct_name;
            quote! {
                bridge.export(#struct_name)?;
            }
        })
        .collect();

    quote! {
        /// Export every function of this package.
        pub fn #register_name(
            bridge: &::gnumake_core::bridge::Bridge,
        ) -> ::core::result::Result<(), ::gnumake_core::error::RegistrationError> {
            #(#registrations)*
            ::core::result::Result::Ok(())
        }
    }
}

/// Generate the list of make names
fn generate_names_const(functions: &[MakeFnInfo]) -> TokenStream2 {
    let names: Vec<_> = functions.iter().map(|f| &f.make_name).collect();
    quote! {
        /// Make names of the functions in this package.
        pub const FUNCTION_NAMES: &[&str] = &[#(#names),*];
    }
}
