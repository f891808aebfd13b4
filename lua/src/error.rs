//! Error types for the Lua runtime.

use std::path::PathBuf;

use gnumake_core::{BridgeError, CallError, RegistrationError};
use thiserror::Error;

/// Errors raised while installing or driving the Lua runtime.
#[derive(Debug, Error)]
pub enum LuaError {
    /// Lua runtime error.
    #[error("lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// A script given to `lua-file` could not be read.
    #[error("cannot read script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl LuaError {
    /// The value recorded in make's error variable when this error escapes an
    /// exported function.
    pub fn into_call_error(self) -> CallError {
        match self {
            LuaError::Lua(err) => call_error(err),
            LuaError::Script { path, source } => {
                CallError::new("IOError", format!("{}: {source}", path.display()))
            }
            LuaError::Bridge(err) => err.into(),
            LuaError::Registration(err) => err.into(),
        }
    }
}

/// Map an interpreter error to the kind and message make sees.
///
/// Errors raised inside Rust callbacks are reported as their cause, so a
/// failing `make.expand` inside a Lua function reads the same as the
/// failure itself. The Lua traceback, when present, becomes the trace.
pub fn call_error(err: mlua::Error) -> CallError {
    match err {
        mlua::Error::SyntaxError { message, .. } => CallError::new("SyntaxError", message),
        mlua::Error::RuntimeError(message) => {
            let (message, trace) = split_traceback(&message);
            let error = CallError::new("RuntimeError", message);
            match trace {
                Some(trace) => error.with_trace(trace),
                None => error,
            }
        }
        mlua::Error::MemoryError(message) => CallError::new("MemoryError", message),
        mlua::Error::CallbackError { traceback, cause } => {
            let error = call_error(unwrap_shared(cause));
            match error.trace() {
                Some(_) => error,
                None => error.with_trace(traceback),
            }
        }
        mlua::Error::WithContext { context, cause } => {
            let error = call_error(unwrap_shared(cause));
            let message = format!("{context}: {}", error.message());
            let renamed = CallError::new(error.kind().to_owned(), message);
            match error.trace() {
                Some(trace) => renamed.with_trace(trace),
                None => renamed,
            }
        }
        other => CallError::new("LuaError", other.to_string()),
    }
}

fn unwrap_shared(cause: std::sync::Arc<mlua::Error>) -> mlua::Error {
    std::sync::Arc::try_unwrap(cause).unwrap_or_else(|shared| (*shared).clone())
}

/// Split `msg\nstack traceback:\n...` into the message and the traceback.
fn split_traceback(message: &str) -> (&str, Option<&str>) {
    match message.find("\nstack traceback:") {
        Some(at) => (&message[..at], Some(&message[at + 1..])),
        None => (message, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_runtime_error_splits_traceback() {
        let err = call_error(mlua::Error::RuntimeError(
            "chunk:1: boom\nstack traceback:\n\t[C]: in ?".to_owned(),
        ));
        assert_eq!(err.to_string(), "RuntimeError: chunk:1: boom");
        assert_eq!(err.trace(), Some("stack traceback:\n\t[C]: in ?"));
    }

    #[test]
    fn test_callback_error_reports_cause() {
        let err = call_error(mlua::Error::CallbackError {
            traceback: "stack traceback:\n\tin make.expand".to_owned(),
            cause: Arc::new(mlua::Error::RuntimeError("bad name".to_owned())),
        });
        assert_eq!(err.to_string(), "RuntimeError: bad name");
        assert_eq!(err.trace(), Some("stack traceback:\n\tin make.expand"));
    }

    #[test]
    fn test_syntax_error_kind() {
        let err = call_error(mlua::Error::SyntaxError {
            message: "[string]:1: unexpected symbol".to_owned(),
            incomplete_input: false,
        });
        assert_eq!(err.kind(), "SyntaxError");
    }

    #[test]
    fn test_script_errors() {
        let err = LuaError::Script {
            path: PathBuf::from("missing.lua"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cannot read script missing.lua: not found");
        assert_eq!(err.into_call_error().to_string(), "IOError: missing.lua: not found");
    }
}
