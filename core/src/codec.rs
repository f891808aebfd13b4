//! Conversion of values across the make boundary.
//!
//! Make only has strings. Arguments arrive as NUL-terminated bytes and are
//! decoded as UTF-8; results leave as bytes, or as "no value" which make
//! expands to nothing.

use core::ffi::CStr;
use core::fmt::{self, Write as _};
use std::borrow::Cow;

use crate::error::CallError;

/// A result produced by an exported function, before it is handed to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MakeValue {
    /// No value. Make expands the call to the empty string.
    None,
    /// `true` becomes `1`, `false` becomes no value.
    Bool(bool),
    /// Raw bytes, passed through verbatim.
    Bytes(Vec<u8>),
    /// Text, passed as its UTF-8 encoding.
    Text(String),
}

impl MakeValue {
    pub fn text(text: impl Into<String>) -> Self {
        MakeValue::Text(text.into())
    }

    /// Any contiguous byte view.
    pub fn bytes(view: impl AsRef<[u8]>) -> Self {
        MakeValue::Bytes(view.as_ref().to_vec())
    }

    /// The generic textual rendering of `value`.
    ///
    /// A `Display` impl that reports an error degrades to no value.
    pub fn display(value: impl fmt::Display) -> Self {
        let mut text = String::new();
        match write!(text, "{value}") {
            Ok(()) => MakeValue::Text(text),
            Err(_) => MakeValue::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, MakeValue::None)
    }
}

impl Default for MakeValue {
    fn default() -> Self {
        MakeValue::None
    }
}

/// Conversion into a [`MakeValue`].
///
/// This is what lets `#[make_fn]` functions return plain Rust types.
pub trait IntoMakeValue {
    fn into_make_value(self) -> MakeValue;
}

impl IntoMakeValue for MakeValue {
    fn into_make_value(self) -> MakeValue {
        self
    }
}

impl IntoMakeValue for () {
    fn into_make_value(self) -> MakeValue {
        MakeValue::None
    }
}

impl IntoMakeValue for bool {
    fn into_make_value(self) -> MakeValue {
        MakeValue::Bool(self)
    }
}

impl IntoMakeValue for String {
    fn into_make_value(self) -> MakeValue {
        MakeValue::Text(self)
    }
}

impl IntoMakeValue for &str {
    fn into_make_value(self) -> MakeValue {
        MakeValue::Text(self.to_owned())
    }
}

impl IntoMakeValue for Cow<'_, str> {
    fn into_make_value(self) -> MakeValue {
        MakeValue::Text(self.into_owned())
    }
}

impl IntoMakeValue for Vec<u8> {
    fn into_make_value(self) -> MakeValue {
        MakeValue::Bytes(self)
    }
}

impl IntoMakeValue for &[u8] {
    fn into_make_value(self) -> MakeValue {
        MakeValue::bytes(self)
    }
}

/// Word lists join with single spaces, the way make functions return them.
impl IntoMakeValue for Vec<String> {
    fn into_make_value(self) -> MakeValue {
        MakeValue::Text(self.join(" "))
    }
}

impl<T: IntoMakeValue> IntoMakeValue for Option<T> {
    fn into_make_value(self) -> MakeValue {
        match self {
            Some(value) => value.into_make_value(),
            None => MakeValue::None,
        }
    }
}

macro_rules! impl_display_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoMakeValue for $ty {
                fn into_make_value(self) -> MakeValue {
                    MakeValue::display(self)
                }
            }
        )*
    };
}

impl_display_value!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char
);

/// Encode a value for the engine. `None` means "no value".
pub fn encode(value: MakeValue) -> Option<Vec<u8>> {
    match value {
        MakeValue::Bool(true) => Some(b"1".to_vec()),
        MakeValue::Bool(false) | MakeValue::None => None,
        MakeValue::Bytes(bytes) => Some(bytes),
        MakeValue::Text(text) => Some(text.into_bytes()),
    }
}

/// The text a value contributes to a variable assignment.
///
/// Same mapping as [`encode`], with "no value" as the empty string.
pub fn to_make_string(value: MakeValue) -> String {
    match value {
        MakeValue::Bool(true) => "1".to_owned(),
        MakeValue::Bool(false) | MakeValue::None => String::new(),
        MakeValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        },
        MakeValue::Text(text) => text,
    }
}

/// Decode one argument received from the engine.
pub fn decode(raw: &CStr) -> Result<String, CallError> {
    Ok(raw.to_str()?.to_owned())
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
