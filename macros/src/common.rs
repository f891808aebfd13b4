//! Shared utilities for the gnumake procedural macros.

use proc_macro2::TokenStream as TokenStream2;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprLit, ExprUnary, Ident, Lit, Meta, MetaNameValue, Token, UnOp};

/// Options accepted by `#[make_fn(...)]`.
#[derive(Default)]
pub(crate) struct FnOptions {
    /// `name = "..."`: the make-visible name.
    pub name: Option<String>,
    /// `expand = true|false`: whether make expands the arguments.
    pub expand: Option<bool>,
    /// `min_args = N`
    pub min_args: Option<i64>,
    /// `max_args = N`
    pub max_args: Option<i64>,
}

/// Parse `key = value, ...` pairs.
fn parse_pairs(tokens: TokenStream2) -> syn::Result<Vec<MetaNameValue>> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated.parse2(tokens)?;
    Ok(pairs.into_iter().collect())
}

/// Parse the options of `#[make_fn(...)]`.
pub(crate) fn parse_fn_options(tokens: TokenStream2) -> syn::Result<FnOptions> {
    let mut options = FnOptions::default();

    for pair in parse_pairs(tokens)? {
        let key = pair
            .path
            .get_ident()
            .map(Ident::to_string)
            .unwrap_or_default();

        match key.as_str() {
            "name" => options.name = Some(parse_str(&pair.value)?),
            "expand" => options.expand = Some(parse_bool(&pair.value)?),
            "min_args" => options.min_args = Some(parse_int(&pair.value)?),
            "max_args" => options.max_args = Some(parse_int(&pair.value)?),
            _ => {
                return Err(syn::Error::new_spanned(
                    &pair.path,
                    "[gnumake] expected one of `name`, `expand`, `min_args`, `max_args`",
                ));
            }
        }
    }

    Ok(options)
}

/// Parse a single `key = identifier`, or nothing.
pub(crate) fn parse_ident_option(tokens: TokenStream2, key: &str) -> syn::Result<Option<Ident>> {
    let mut found = None;

    for pair in parse_pairs(tokens)? {
        if !pair.path.is_ident(key) {
            return Err(syn::Error::new_spanned(
                &pair.path,
                format!("[gnumake] expected `{key} = identifier`, or no arguments"),
            ));
        }
        let Expr::Path(expr_path) = &pair.value else {
            return Err(syn::Error::new_spanned(
                &pair.value,
                format!("[gnumake] {key} must be an identifier"),
            ));
        };
        let Some(ident) = expr_path.path.get_ident() else {
            return Err(syn::Error::new_spanned(
                &pair.value,
                format!("[gnumake] {key} must be an identifier"),
            ));
        };
        found = Some(ident.clone());
    }

    Ok(found)
}

/// The tokens inside an attribute's parentheses, if it is `attr_name`.
pub(crate) fn find_attr_tokens(
    attrs: &[Attribute],
    attr_name: &str,
) -> syn::Result<Option<TokenStream2>> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident(attr_name)) else {
        return Ok(None);
    };

    match &attr.meta {
        Meta::Path(_) => Ok(Some(TokenStream2::new())),
        Meta::List(list) => Ok(Some(list.tokens.clone())),
        Meta::NameValue(_) => Err(syn::Error::new_spanned(
            attr,
            format!("[gnumake] invalid attribute syntax for `#[{attr_name}]`"),
        )),
    }
}

fn parse_str(value: &Expr) -> syn::Result<String> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(lit), ..
        }) => Ok(lit.value()),
        _ => Err(syn::Error::new_spanned(
            value,
            "[gnumake] expected a string literal",
        )),
    }
}

fn parse_bool(value: &Expr) -> syn::Result<bool> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Bool(lit), ..
        }) => Ok(lit.value),
        _ => Err(syn::Error::new_spanned(
            value,
            "[gnumake] expected `true` or `false`",
        )),
    }
}

fn parse_int(value: &Expr) -> syn::Result<i64> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Int(lit), ..
        }) => lit.base10_parse(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => parse_int(expr).map(|n| -n),
        _ => Err(syn::Error::new_spanned(
            value,
            "[gnumake] expected an integer literal",
        )),
    }
}

/// Convert snake_case to PascalCase.
///
/// Examples:
/// - `strlen` -> `Strlen`
/// - `str_center` -> `StrCenter`
/// - `get_first_word` -> `GetFirstWord`
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("strlen"), "Strlen");
        assert_eq!(to_pascal_case("str_center"), "StrCenter");
        assert_eq!(to_pascal_case("get_first_word"), "GetFirstWord");
        // Edge cases - underscores are stripped
        assert_eq!(to_pascal_case("_private"), "Private");
        assert_eq!(to_pascal_case("foo__bar"), "FooBar");
    }

    #[test]
    fn test_parse_fn_options() {
        let options = parse_fn_options(quote! {
            name = "str-len", expand = false, min_args = 1, max_args = -2
        })
        .unwrap();
        assert_eq!(options.name.as_deref(), Some("str-len"));
        assert_eq!(options.expand, Some(false));
        assert_eq!(options.min_args, Some(1));
        assert_eq!(options.max_args, Some(-2));

        let empty = parse_fn_options(TokenStream2::new()).unwrap();
        assert!(empty.name.is_none() && empty.expand.is_none());
    }

    #[test]
    fn test_parse_fn_options_rejects_unknown_keys() {
        assert!(parse_fn_options(quote! { flavor = "simple" }).is_err());
        assert!(parse_fn_options(quote! { name = 3 }).is_err());
        assert!(parse_fn_options(quote! { expand = "no" }).is_err());
    }

    #[test]
    fn test_parse_ident_option() {
        let ident = parse_ident_option(quote! { register = install }, "register").unwrap();
        assert_eq!(ident.unwrap().to_string(), "install");
        assert!(parse_ident_option(TokenStream2::new(), "register").unwrap().is_none());
        assert!(parse_ident_option(quote! { other = x }, "register").is_err());
    }
}
