//! The bridge between one engine and the functions exported into it.
//!
//! [`Bridge`] owns the engine handle and the [`Registry`]. Host code uses it
//! to export functions, evaluate makefile syntax and expand text; the engine
//! calls back through [`FunctionHost`], which routes to [`Bridge::dispatch`].
//!
//! # Error channel
//!
//! Exported functions cannot raise into make. Every call therefore ends by
//! updating the error variable (`.GNUMAKE_LAST_ERROR` by default):
//!
//! - on success it is undefined;
//! - on failure it is defined to `<kind>: <message>`, the call expands to
//!   nothing, a trace is printed when the traceback variable expands
//!   non-empty, and make stops with that message when the fatal-errors
//!   variable expands non-empty.
//!
//! # Re-entrancy
//!
//! A callable may evaluate or expand text that calls further exported
//! functions. No registry borrow is held across a call, so that works to
//! any depth, including a callable re-exporting itself.

use core::ffi::CStr;
use std::cell::RefCell;
use std::ffi::CString;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::arity::Arity;
use crate::codec;
use crate::engine::{Engine, EngineBuffer, ExpandPolicy, FunctionHost};
use crate::error::{BridgeError, CallError, RegistrationError};
use crate::escape;
use crate::registry::{Callable, FunctionName, MakeFunction, RegisteredFunction, Registry};
use crate::variables::Variables;

pub const DEFAULT_ERROR_VARIABLE: &str = ".GNUMAKE_LAST_ERROR";
pub const DEFAULT_TRACEBACK_VARIABLE: &str = ".GNUMAKE_PRINT_TRACEBACK";
pub const DEFAULT_FATAL_ERRORS_VARIABLE: &str = ".GNUMAKE_FATAL_ERRORS";

/// Names of the make variables the dispatcher reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    pub error_variable: String,
    pub traceback_variable: String,
    pub fatal_errors_variable: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            error_variable: DEFAULT_ERROR_VARIABLE.to_owned(),
            traceback_variable: DEFAULT_TRACEBACK_VARIABLE.to_owned(),
            fatal_errors_variable: DEFAULT_FATAL_ERRORS_VARIABLE.to_owned(),
        }
    }
}

impl BridgeOptions {
    pub fn with_error_variable(mut self, name: impl Into<String>) -> Self {
        self.error_variable = name.into();
        self
    }

    pub fn with_traceback_variable(mut self, name: impl Into<String>) -> Self {
        self.traceback_variable = name.into();
        self
    }

    pub fn with_fatal_errors_variable(mut self, name: impl Into<String>) -> Self {
        self.fatal_errors_variable = name.into();
        self
    }
}

/// What an exported function sees of the bridge while it runs.
#[derive(Clone, Copy)]
pub struct CallContext<'b> {
    bridge: &'b Bridge,
    name: &'b str,
}

impl<'b> CallContext<'b> {
    pub fn new(bridge: &'b Bridge, name: &'b str) -> Self {
        Self { bridge, name }
    }

    pub fn bridge(&self) -> &'b Bridge {
        self.bridge
    }

    /// The make name the function was called under.
    pub fn name(&self) -> &'b str {
        self.name
    }

    pub fn evaluate(&self, text: &str) -> Result<(), BridgeError> {
        self.bridge.evaluate(text)
    }

    pub fn expand(&self, text: &str) -> Result<String, BridgeError> {
        self.bridge.expand(text)
    }

    pub fn variables(&self) -> Variables<'b> {
        self.bridge.variables()
    }
}

impl core::fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallContext")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// See the [module documentation](self).
pub struct Bridge {
    engine: Box<dyn Engine>,
    registry: RefCell<Registry>,
    options: BridgeOptions,
}

impl Bridge {
    pub fn new(engine: impl Engine + 'static, options: BridgeOptions) -> Self {
        Self {
            engine: Box::new(engine),
            registry: RefCell::new(Registry::new()),
            options,
        }
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn engine(&self) -> &dyn Engine {
        &*self.engine
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Export `callable` to make under `name`.
    ///
    /// Registering a name again replaces the previous callable.
    pub fn register(
        &self,
        name: &str,
        arity: Arity,
        policy: ExpandPolicy,
        callable: impl Callable + 'static,
    ) -> Result<(), RegistrationError> {
        self.register_rc(name, arity, policy, Rc::new(callable))
    }

    pub fn register_rc(
        &self,
        name: &str,
        arity: Arity,
        policy: ExpandPolicy,
        callable: Rc<dyn Callable>,
    ) -> Result<(), RegistrationError> {
        let name = FunctionName::new(name)?;
        let function = RegisteredFunction::new(name.clone(), callable, arity, policy);
        let replaced = self.registry.borrow_mut().insert(function).is_some();

        self.engine.add_function(
            name.as_c_str(),
            arity.min_args(),
            arity.raw_max(),
            policy,
        );

        info!(
            function = name.as_str(),
            min_args = arity.min_args(),
            max_args = arity.raw_max(),
            ?policy,
            replaced,
            "exported function"
        );
        Ok(())
    }

    /// Export a function that carries its own name and signature.
    pub fn export<F: MakeFunction>(&self, function: F) -> Result<(), RegistrationError> {
        let arity = function.arity()?;
        let policy = function.policy();
        let name = function.name();
        self.register(name, arity, policy, function)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.borrow().contains(name)
    }

    /// Exported names in sorted order.
    pub fn function_names(&self) -> Vec<String> {
        self.registry.borrow().names()
    }

    // ========================================================================
    // Evaluate / expand
    // ========================================================================

    /// Evaluate `text` as makefile syntax.
    pub fn evaluate(&self, text: &str) -> Result<(), BridgeError> {
        let text = CString::new(text)?;
        trace!(text = ?text, "eval");
        self.engine.eval(&text);
        Ok(())
    }

    /// Expand `text`, returning the raw bytes make produced.
    pub fn expand_bytes(&self, text: &str) -> Result<Vec<u8>, BridgeError> {
        let text = CString::new(text)?;
        let Some(ptr) = self.engine.expand(&text) else {
            return Ok(Vec::new());
        };
        // SAFETY: `gmk_expand` hands the caller a fresh NUL-terminated buffer.
        let buffer = unsafe { EngineBuffer::from_raw(&*self.engine, ptr) };
        trace!(text = ?text, result = ?buffer.as_c_str(), "expand");
        Ok(buffer.as_bytes().to_vec())
    }

    /// Expand `text` and decode the result as UTF-8.
    pub fn expand(&self, text: &str) -> Result<String, BridgeError> {
        Ok(String::from_utf8(self.expand_bytes(text)?)?)
    }

    pub fn variables(&self) -> Variables<'_> {
        Variables::new(self)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handle one call from the engine.
    ///
    /// Never panics and never returns an error: failures go to the error
    /// variable, and the call expands to nothing.
    pub fn dispatch(&self, name: &CStr, argv: &[&CStr]) -> Option<EngineBuffer<'_>> {
        let Some(function) = self.lookup(name) else {
            warn!(function = ?name, "call of a function that was never exported");
            self.clear_error();
            return None;
        };

        debug!(function = function.name().as_str(), argc = argv.len(), "dispatch");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.invoke(&function, argv)))
            .unwrap_or_else(|payload| Err(CallError::from_panic(payload)));

        match outcome {
            Ok(bytes) => {
                let result = bytes.and_then(|bytes| EngineBuffer::copy_from(&*self.engine, &bytes));
                self.clear_error();
                result
            }
            Err(err) => {
                self.record_error(function.name().as_str(), &err);
                None
            }
        }
    }

    fn lookup(&self, name: &CStr) -> Option<RegisteredFunction> {
        let name = name.to_str().ok()?;
        self.registry.borrow().get(name).cloned()
    }

    fn invoke(
        &self,
        function: &RegisteredFunction,
        argv: &[&CStr],
    ) -> Result<Option<Vec<u8>>, CallError> {
        let args = argv
            .iter()
            .map(|arg| codec::decode(arg))
            .collect::<Result<SmallVec<[String; 4]>, _>>()?;
        let ctx = CallContext::new(self, function.name().as_str());
        let value = function.callable().call(&ctx, &args)?;
        Ok(codec::encode(value))
    }

    fn clear_error(&self) {
        let text = format!("undefine {}", self.options.error_variable);
        if let Err(err) = self.evaluate(&text) {
            warn!(%err, "could not clear the error variable");
        }
    }

    fn record_error(&self, function: &str, err: &CallError) {
        warn!(function, error = %err, "exported function failed");

        if self.flag_enabled(&self.options.traceback_variable) {
            eprintln!("{function}: {err}");
            if let Some(trace) = err.trace() {
                eprintln!("{}", trace.trim_end());
            }
        }

        // NUL cannot travel through eval.
        let description = err.to_string().replace('\0', "");
        let text = format!(
            "define {}\n{}\nendef",
            self.options.error_variable,
            escape::escape_fully(&description)
        );
        if let Err(err) = self.evaluate(&text) {
            warn!(%err, "could not record the error");
            return;
        }

        if self.flag_enabled(&self.options.fatal_errors_variable) {
            let text = format!("$(error $({}))", self.options.error_variable);
            if let Err(err) = self.evaluate(&text) {
                warn!(%err, "could not raise a fatal error");
            }
        }
    }

    fn flag_enabled(&self, variable: &str) -> bool {
        self.expand_bytes(&format!("$({variable})"))
            .is_ok_and(|value| !value.is_empty())
    }
}

impl FunctionHost for Bridge {
    fn call(&self, name: &CStr, argv: &[&CStr]) -> Option<EngineBuffer<'_>> {
        self.dispatch(name, argv)
    }
}

impl core::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;
