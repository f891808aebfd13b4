//! gnumake - extend GNU make with Rust and Lua functions
//!
//! # Overview
//!
//! GNU make 4.0 and later can `load` shared objects that add functions to
//! the makefile language. This workspace is the glue between that interface
//! and ordinary code:
//!
//! - export Rust closures or `#[make_fn]` functions as make functions
//! - evaluate and expand makefile text from inside those functions
//! - read and write make variables
//! - run Lua from makefiles (`$(lua-eval ...)`, `$(lua-exec ...)`, ...)
//!
//! Failures never abort the build by default: the failing call expands to
//! nothing and `.GNUMAKE_LAST_ERROR` holds `<kind>: <message>`. Setting
//! `.GNUMAKE_FATAL_ERRORS` turns failures into `$(error ...)`.
//!
//! # Quick Start
//!
//! ```
//! use gnumake::testing::FakeEngine;
//! use gnumake::{Arity, BridgeOptions, CallContext, CallError, ExpandPolicy, MakeValue};
//!
//! // FakeEngine stands in for make; the plugin crate binds the real one.
//! let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
//!
//! let greet = |_: &CallContext<'_>, args: &[String]| -> Result<MakeValue, CallError> {
//!     Ok(MakeValue::text(format!("hello {}", args[0])))
//! };
//! bridge
//!     .register("greet", Arity::exactly(1).unwrap(), ExpandPolicy::ExpandArgs, greet)
//!     .unwrap();
//!
//! assert_eq!(engine.expand_str("$(greet world)"), "hello world");
//! ```
//!
//! # Exporting Functions
//!
//! `#[make_fn]` derives the argument range from the Rust signature:
//!
//! ```
//! use gnumake::testing::FakeEngine;
//! use gnumake::{BridgeOptions, CallError, make_fn};
//!
//! #[make_fn(name = "div")]
//! fn div(a: &str, b: &str) -> Result<i64, CallError> {
//!     let (a, b): (i64, i64) = (a.parse()?, b.parse()?);
//!     a.checked_div(b)
//!         .ok_or_else(|| CallError::new("ZeroDivisionError", "division by zero"))
//! }
//!
//! let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
//! bridge.export(Div).unwrap();
//!
//! assert_eq!(engine.expand_str("$(div 84,2)"), "42");
//! assert_eq!(engine.expand_str("$(div 1,0)"), "");
//! assert_eq!(
//!     engine.expand_str("$(.GNUMAKE_LAST_ERROR)"),
//!     "ZeroDivisionError: division by zero"
//! );
//! ```
//!
//! # Lua
//!
//! ```
//! use gnumake::testing::FakeEngine;
//! use gnumake::{BridgeOptions, LuaOptions, LuaRuntime};
//!
//! let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
//! let _lua = LuaRuntime::install(&bridge, LuaOptions::default()).unwrap();
//!
//! engine.expand_str("$(lua-exec make.export('rev', function(s) return s:reverse() end))");
//! assert_eq!(engine.expand_str("$(rev abc)"), "cba");
//! ```

// Re-export public API from gnumake_core
pub use gnumake_core::{
    Arity, Bridge, BridgeError, BridgeOptions, CallContext, CallError, Callable, Engine,
    EngineBuffer, ExpandPolicy, Flavor, FunctionHost, IntoMakeValue, MakeFunction, MakeValue,
    Origin, ParamKind, RegistrationError, Signature, Variables,
};
pub use gnumake_core::{arity, codec, escape, stdlib, testing};

// Attribute macros
pub use gnumake_core::{make_fn, make_package};

// Lua runtime
pub use gnumake_lua::{LuaError, LuaOptions, LuaRuntime};
