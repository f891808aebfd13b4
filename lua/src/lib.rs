//! Lua scripting for GNU make.
//!
//! Installs an embedded Lua 5.4 interpreter into a [`Bridge`] and exposes
//! four make functions:
//!
//! ```make
//! # Evaluate an expression
//! JOBS := $(lua-eval math.max(2, 4))
//!
//! # Run a chunk; whatever it prints is the result
//! $(lua-exec for i = 1, 3 do print(i) end)
//!
//! # Run a script with arguments (arg[0] is the script)
//! VERSION := $(lua-file scripts/version.lua,--short)
//!
//! # Load a module from package.path, usually to export functions
//! $(lua-mod buildutils)
//! ```
//!
//! Lua code reaches back into make through the `make` module: `make.eval`,
//! `make.expand`, `make.export`, `make.escape`, `make.escape_fully` and the
//! `make.var` table. Functions exported with `make.export` are called like
//! any other make function, with their argument range taken from the Lua
//! function's parameters.
//!
//! [`Bridge`]: gnumake_core::Bridge

mod convert;
mod error;
mod module;
mod runtime;

pub use convert::to_make_value;
pub use error::{LuaError, call_error};
pub use runtime::{ENTRY_POINTS, LuaOptions, LuaRuntime};

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
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
