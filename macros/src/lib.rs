//! Procedural macros for exporting Rust functions to GNU make.
//!
//! This crate provides attribute macros for generating the glue between a plain
//! Rust function and the make calling convention:
//!
//! - `#[make_fn]` - Generate an exportable function from a Rust signature
//! - `#[make_package]` - Generate a registration function from a module

extern crate proc_macro;

use proc_macro::TokenStream;

mod common;
mod make_fn;
mod make_package;

/// Generate an exportable make function.
///
/// This attribute macro keeps the Rust function as is and adds a unit struct
/// implementing both [`Callable`] and [`MakeFunction`], so the function can be
/// exported with `bridge.export(Struct)`.
///
/// [`Callable`]: gnumake_core::registry::Callable
/// [`MakeFunction`]: gnumake_core::registry::MakeFunction
///
/// # Basic Example
///
/// ```ignore
/// use gnumake_macros::make_fn;
///
/// #[make_fn(name = "str-upper")]
/// fn upper(s: &str) -> String {
///     s.to_uppercase()
/// }
///
/// // Generated struct can be used as:
/// bridge.export(Upper)?;
/// ```
///
/// # Naming
///
/// The struct name is the function name in PascalCase:
/// - `upper` → `Upper`
/// - `str_center` → `StrCenter`
///
/// The make name defaults to the Rust function name and can be set with `name`.
///
/// # Arguments
///
/// Each parameter type decides how many make arguments the function takes:
///
/// | Type                       | Kind     |
/// |----------------------------|----------|
/// | `&str`, `String`           | required |
/// | `Option<&str>`, `Option<String>` | optional |
/// | `&[String]`, `Vec<String>` | rest     |
///
/// The inferred range can be overridden with `min_args = N` and `max_args = N`
/// (`0` is unlimited). `expand = false` asks make to pass arguments verbatim.
///
/// # Context Access
///
/// If your function needs to evaluate or expand make text, add `&CallContext`
/// as the first parameter:
///
/// ```ignore
/// use gnumake_core::bridge::CallContext;
///
/// #[make_fn(name = "expand-twice")]
/// fn expand_twice(ctx: &CallContext, text: &str) -> Result<String, BridgeError> {
///     ctx.expand(text)
/// }
/// ```
///
/// # Fallible Functions
///
/// Functions can return `Result<T, E>` where `E: Into<CallError>`, which holds
/// for every `std::error::Error`. An `Err` becomes the error variable's value.
///
/// # Return Values
///
/// The return type must implement [`IntoMakeValue`]: booleans become `1` or
/// nothing, numbers and strings their text, `Option::None` and `()` nothing.
///
/// [`IntoMakeValue`]: gnumake_core::codec::IntoMakeValue
///
/// # Restrictions
///
/// - Generic parameters (lifetimes included) are not supported
/// - Pattern matching in parameters is not supported
/// - Async functions are not supported
#[proc_macro_attribute]
pub fn make_fn(attr: TokenStream, item: TokenStream) -> TokenStream {
    make_fn::make_fn_impl(attr, item)
}

/// Generate a registration function from a module.
///
/// This attribute macro transforms a module containing `#[make_fn]` items into
/// a package with an auto-generated `register` function and a
/// `FUNCTION_NAMES` constant.
///
/// # Example
///
/// ```ignore
/// #[make_package]
/// mod text {
///     use super::*;
///
///     #[make_fn(name = "text-upper")]
///     fn upper(s: &str) -> String {
///         s.to_uppercase()
///     }
/// }
///
/// // Generated: pub fn register(bridge: &Bridge) -> Result<(), RegistrationError>
/// text::register(&bridge)?;
/// ```
///
/// # Optional Attribute
///
/// - `register`: Custom name for the registration function (default: `register`)
#[proc_macro_attribute]
pub fn make_package(attr: TokenStream, item: TokenStream) -> TokenStream {
    make_package::make_package_impl(attr, item)
}
