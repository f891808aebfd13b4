//! Core of the GNU make bridge.
//!
//! GNU make can load shared objects that add new functions to its expression
//! language. The calling convention on the make side is narrow: every
//! function receives an array of NUL-terminated strings, returns a single
//! buffer allocated with make's own allocator (or nothing), and is registered
//! with a fixed `(min_args, max_args)` range. This crate is everything between
//! that ABI and a host callable:
//!
//! - [`engine`]: the make entry points as a trait, plus owned engine buffers
//! - [`codec`]: converting arguments and results across the boundary
//! - [`escape`]: making arbitrary text safe inside a `define ... endef` block
//! - [`arity`]: argument-count inference and validation
//! - [`registry`]: exported functions and their calling contract
//! - [`bridge`]: the dispatcher, the error channel and `evaluate`/`expand`
//! - [`variables`]: get/set/append/undefine/origin/flavor on make variables
//! - [`stdlib`]: string functions exported through the same API
//! - [`testing`]: an in-process engine implementing enough of make for tests
//!
//! Nothing in this crate binds to a real make process; see the plugin crate
//! for that.

// Needed so that macros can uniformly refer to `::gnumake_core` and still work
// from within this crate or a different one.
extern crate self as gnumake_core;

pub mod arity;
pub mod bridge;
pub mod codec;
pub mod engine;
pub mod error;
pub mod escape;
pub mod registry;
pub mod stdlib;
pub mod testing;
pub mod variables;

pub use arity::{Arity, ParamKind, Signature};
pub use bridge::{Bridge, BridgeOptions, CallContext};
pub use codec::{IntoMakeValue, MakeValue};
pub use engine::{Engine, EngineBuffer, ExpandPolicy, FunctionHost};
pub use error::{BridgeError, CallError, RegistrationError};
pub use registry::{Callable, MakeFunction};
pub use variables::{Flavor, Origin, Variables};

pub use gnumake_macros::{make_fn, make_package};

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
