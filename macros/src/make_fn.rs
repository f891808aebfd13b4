//! Implementation of the `#[make_fn]` attribute macro
//!
//! Parses function signatures, validates them, and directly generates the wrapper struct
//! and glue code needed to export Rust functions to make.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    FnArg, GenericArgument, ItemFn, Pat, PatType, PathArguments, ReturnType, Type,
    parse_macro_input,
};

use crate::common::{FnOptions, parse_fn_options, to_pascal_case};

/// Entry point for the `#[make_fn]` attribute macro.
pub fn make_fn_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    let options = match parse_fn_options(attr.into()) {
        Ok(options) => options,
        Err(err) => return err.to_compile_error().into(),
    };

    let sig = match parse_signature(&input_fn) {
        Ok(sig) => sig,
        Err(err) => return err.to_compile_error().into(),
    };

    generate_output(&input_fn, &options, &sig).into()
}

/// Name of the struct `#[make_fn]` generates for `fn_name`.
pub(crate) fn struct_name_for(fn_name: &syn::Ident) -> syn::Ident {
    format_ident!("{}", to_pascal_case(&fn_name.to_string()), span = fn_name.span())
}

// ============================================================================
// Data Structures
// ============================================================================

/// Parsed function signature information
struct ParsedSignature {
    /// The Rust function name
    fn_name: syn::Ident,
    /// Whether the first parameter is &CallContext
    has_context: bool,
    /// Make-visible parameters (excluding the context)
    params: Vec<(syn::Ident, Box<Type>)>,
    /// The "okay" return type - unwrapped if Result<T, E>
    ok_return_type: Box<Type>,
    /// Whether the function returns Result<T, E>
    is_fallible: bool,
}

// ============================================================================
// Signature Parsing
// ============================================================================

/// Parse and validate the function signature.
fn parse_signature(func: &ItemFn) -> syn::Result<ParsedSignature> {
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "[gnumake] generic parameters are not supported, elide lifetimes instead",
        ));
    }
    if let Some(asyncness) = &func.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "[gnumake] async functions cannot be exported",
        ));
    }

    let return_type = match &func.sig.output {
        ReturnType::Default => Box::new(syn::parse_quote!(())),
        ReturnType::Type(_, ty) => ty.clone(),
    };
    let (ok_return_type, is_fallible) = match extract_result_ok_type(&return_type) {
        Some(ok_type) => (ok_type, true),
        None => (return_type, false),
    };

    let (has_context, params) = parse_params(&func.sig)?;

    Ok(ParsedSignature {
        fn_name: func.sig.ident.clone(),
        has_context,
        params,
        ok_return_type,
        is_fallible,
    })
}

/// Check if a type is `Result<T, E>` and extract the Ok type `T`.
fn extract_result_ok_type(ty: &Type) -> Option<Box<Type>> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let last_segment = type_path.path.segments.last()?;
    if last_segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last_segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(ok_type)) => Some(Box::new(ok_type.clone())),
        _ => None,
    }
}

/// Detect if first param is CallContext and extract the make parameters.
fn parse_params(sig: &syn::Signature) -> syn::Result<(bool, Vec<(syn::Ident, Box<Type>)>)> {
    let mut params = Vec::new();
    let mut has_context = false;

    for (i, input) in sig.inputs.iter().enumerate() {
        let FnArg::Typed(PatType { pat, ty, .. }) = input else {
            return Err(syn::Error::new_spanned(
                input,
                "[gnumake] normal typed argument expected (name: type)",
            ));
        };
        let Pat::Ident(pat_ident) = &**pat else {
            return Err(syn::Error::new_spanned(
                pat,
                "[gnumake] no pattern matching supported in make functions",
            ));
        };

        if i == 0 && is_call_context_type(ty) {
            has_context = true;
            continue;
        }

        params.push((pat_ident.ident.clone(), ty.clone()));
    }

    Ok((has_context, params))
}

/// Check if a type looks like `&CallContext`.
fn is_call_context_type(ty: &Type) -> bool {
    let Type::Reference(type_ref) = ty else {
        return false;
    };
    let Type::Path(type_path) = &*type_ref.elem else {
        return false;
    };
    type_path
        .path
        .segments
        .last()
        .is_some_and(|s| s.ident == "CallContext")
}

// ============================================================================
// Code Generation
// ============================================================================

fn option_tokens(value: Option<i64>) -> TokenStream2 {
    match value {
        Some(n) => quote! { ::core::option::Option::Some(#n) },
        None => quote! { ::core::option::Option::None },
    }
}

/// Generate the output: original function + wrapper struct + trait impls.
fn generate_output(input_fn: &ItemFn, options: &FnOptions, sig: &ParsedSignature) -> TokenStream2 {
    let fn_name = &sig.fn_name;
    let struct_name = struct_name_for(fn_name);
    let vis = &input_fn.vis;
    let make_name = options
        .name
        .clone()
        .unwrap_or_else(|| fn_name.to_string());
    let struct_doc = format!("The make function `{make_name}`, exported from [`{fn_name}`].");

    let param_names: Vec<_> = sig.params.iter().map(|(name, _)| name).collect();
    let param_types: Vec<_> = sig.params.iter().map(|(_, ty)| ty).collect();
    let param_indices: Vec<_> = (0..sig.params.len()).collect();
    let param_count = sig.params.len();
    let ok_ty = &sig.ok_return_type;

    let policy = if options.expand.unwrap_or(true) {
        quote! { ::gnumake_core::engine::ExpandPolicy::ExpandArgs }
    } else {
        quote! { ::gnumake_core::engine::ExpandPolicy::VerbatimArgs }
    };
    let min_args = option_tokens(options.min_args);
    let max_args = option_tokens(options.max_args);

    let call_expr = if sig.has_context {
        quote! { #fn_name(__ctx, #(#param_names),*) }
    } else {
        quote! { #fn_name(#(#param_names),*) }
    };

    let result_handling = if sig.is_fallible {
        quote! {
            let __ok_result: #ok_ty = match __call_result {
                ::core::result::Result::Ok(value) => value,
                ::core::result::Result::Err(err) => {
                    return ::core::result::Result::Err(
                        ::core::convert::Into::<::gnumake_core::error::CallError>::into(err),
                    );
                }
            };
        }
    } else {
        quote! {
            let __ok_result: #ok_ty = __call_result;
        }
    };

    quote! {
        #input_fn

        #[doc = #struct_doc]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #struct_name;

        impl ::gnumake_core::registry::Callable for #struct_name {
            #[allow(unused_variables)]
            fn call(
                &self,
                __ctx: &::gnumake_core::bridge::CallContext<'_>,
                __args: &[::std::string::String],
            ) -> ::core::result::Result<
                ::gnumake_core::codec::MakeValue,
                ::gnumake_core::error::CallError,
            > {
                // Extract parameters
                #(
                    let #param_names: #param_types =
                        ::gnumake_core::arity::FromArg::from_args(__args, #param_indices);
                )*

                // Call the user function
                let __call_result = #call_expr;

                // Handle the result
                #result_handling

                ::core::result::Result::Ok(
                    ::gnumake_core::codec::IntoMakeValue::into_make_value(__ok_result),
                )
            }
        }

        impl ::gnumake_core::registry::MakeFunction for #struct_name {
            fn name(&self) -> &'static str {
                #make_name
            }

            fn signature(&self) -> ::gnumake_core::arity::Signature {
                let __kinds: [::gnumake_core::arity::ParamKind; #param_count] = [
                    #( <#param_types as ::gnumake_core::arity::FromArg<'_>>::KIND ),*
                ];
                ::gnumake_core::arity::Signature::new(__kinds)
            }

            fn policy(&self) -> ::gnumake_core::engine::ExpandPolicy {
                #policy
            }

            fn arity(
                &self,
            ) -> ::core::result::Result<
                ::gnumake_core::arity::Arity,
                ::gnumake_core::error::RegistrationError,
            > {
                ::gnumake_core::arity::resolve_arity(#min_args, #max_args, ::core::option::Option::Some(&self.signature()))
            }
        }
    }
}
