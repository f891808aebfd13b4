//! Error types.
//!
//! [`RegistrationError`] and [`BridgeError`] are returned to the host side.
//! [`CallError`] is the failure of an exported function; it never reaches
//! the host as a `Result` but is written into make's error variable by the
//! dispatcher.

use core::any::{Any, type_name};
use core::fmt::{self, Write as _};
use std::borrow::Cow;
use std::ffi::NulError;
use std::string::FromUtf8Error;

use thiserror::Error;

/// An export that the engine would reject (or abort on).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("function name must not be empty")]
    EmptyName,

    #[error("function name is {0} bytes long, at most 255 are allowed")]
    NameTooLong(usize),

    #[error("function name {name:?} contains illegal character {ch:?}")]
    IllegalNameChar { name: String, ch: char },

    #[error("negative argument count (min_args={min_args}, max_args={max_args})")]
    NegativeArgs { min_args: i64, max_args: i64 },

    #[error("too many arguments (min_args={min_args}, max_args={max_args}), at most 255 are allowed")]
    TooManyArgs { min_args: i64, max_args: i64 },

    #[error("max_args ({max_args}) is less than min_args ({min_args})")]
    MaxLessThanMin { min_args: i64, max_args: i64 },

    #[error("min_args must be at least 1")]
    MinArgsZero,

    #[error("function must take at least one parameter")]
    NoParameters,

    #[error("argument counts were not given and the signature is unknown")]
    UnknownSignature,
}

/// Failures of the host-facing operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("text passed to make contains a NUL byte")]
    InteriorNul(#[from] NulError),

    #[error("make returned text that is not valid UTF-8")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("illegal variable name {0:?}")]
    IllegalVariableName(String),

    #[error("valid flavors are 'recursive' and 'simple'")]
    InvalidFlavor,

    #[error("make reported unknown flavor {0:?}")]
    UnexpectedFlavor(String),

    #[error("make reported unknown origin {0:?}")]
    UnexpectedOrigin(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// The failure of an exported function.
///
/// It renders as `<kind>: <message>`, which is what build scripts read from
/// the error variable. Any `std::error::Error` converts into it with `?`,
/// taking the error's type name as the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    kind: Cow<'static, str>,
    message: String,
    trace: Option<String>,
}

impl CallError {
    pub fn new(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
        }
    }

    /// An argument had the right count but an unusable value.
    pub fn value(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    /// Attach the detail printed when traces are enabled.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "exported function panicked".to_owned()
        };
        Self::new("Panic", message)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl<E> From<E> for CallError
where
    E: core::error::Error + 'static,
{
    fn from(err: E) -> Self {
        let mut trace = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(trace, "caused by: {cause}");
            source = cause.source();
        }

        Self {
            kind: Cow::Borrowed(short_type_name::<E>()),
            message: err.to_string(),
            trace: (!trace.is_empty()).then_some(trace),
        }
    }
}

/// `core::str::error::Utf8Error` becomes `Utf8Error`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_display() {
        let err = CallError::new("KeyError", "missing");
        assert_eq!(err.to_string(), "KeyError: missing");
        assert_eq!(err.trace(), None);
    }

    #[test]
    fn test_from_std_error_uses_type_name() {
        let err: CallError = "x".parse::<i32>().unwrap_err().into();
        assert_eq!(err.kind(), "ParseIntError");
        assert_eq!(err.message(), "invalid digit found in string");
    }

    #[test]
    fn test_from_bridge_error() {
        let err: CallError = BridgeError::InvalidFlavor.into();
        assert_eq!(
            err.to_string(),
            "BridgeError: valid flavors are 'recursive' and 'simple'"
        );
    }

    #[test]
    fn test_from_panic_payload() {
        let err = CallError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Panic: boom");

        let err = CallError::from_panic(Box::new(format!("code {}", 7)));
        assert_eq!(err.message(), "code 7");
    }
}
