//! The embedded interpreter and its make entry points.

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use gnumake_core::{Arity, Bridge, CallContext, CallError, ExpandPolicy, MakeValue};
use mlua::{Function, Lua, StdLib, Table, Value, Variadic};
use tracing::{debug, warn};

use crate::convert::{display, to_make_value};
use crate::error::LuaError;
use crate::module::create_module;

/// Names of the make functions the runtime registers.
pub const ENTRY_POINTS: [&str; 4] = ["lua-eval", "lua-exec", "lua-file", "lua-mod"];

/// Interpreter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LuaOptions {
    /// Prepended to `package.path`.
    pub package_path: Option<String>,
    /// Prepended to `package.cpath`.
    pub package_cpath: Option<String>,
}

impl LuaOptions {
    pub fn with_package_path(mut self, path: impl Into<String>) -> Self {
        self.package_path = Some(path.into());
        self
    }

    pub fn with_package_cpath(mut self, path: impl Into<String>) -> Self {
        self.package_cpath = Some(path.into());
        self
    }
}

/// A Lua interpreter wired to a bridge.
///
/// Code from `lua-eval`, `lua-exec` and `lua-file` runs with one shared
/// globals table, so definitions made in one call are visible to the next.
/// That table falls back to the interpreter's own globals for the standard
/// library and the `make` module, but assignments never reach them.
#[derive(Clone)]
pub struct LuaRuntime {
    state: Rc<RuntimeState>,
}

struct RuntimeState {
    lua: Lua,
    env: Table,
    output: Rc<OutputCapture>,
}

impl LuaRuntime {
    /// Create the interpreter and register the entry points with `bridge`.
    pub fn install(bridge: &Rc<Bridge>, options: LuaOptions) -> Result<Self, LuaError> {
        // SAFETY: the interpreter only runs build-script code, which may load
        // C modules from package.cpath; export() needs the debug library.
        let lua = unsafe { Lua::unsafe_new_with(StdLib::ALL, mlua::LuaOptions::new()) };

        let package: Table = lua.globals().get("package")?;
        prepend_search_path(&package, "path", options.package_path.as_deref())?;
        prepend_search_path(&package, "cpath", options.package_cpath.as_deref())?;

        let output = Rc::new(OutputCapture::default());
        let globals = lua.globals();
        globals.set("print", create_print(&lua, &output)?)?;

        let module = create_module(&lua, bridge)?;
        globals.set("make", module.clone())?;
        package.get::<Table>("loaded")?.set("make", module)?;

        let env = lua.create_table()?;
        let fallback = lua.create_table()?;
        fallback.set("__index", globals.clone())?;
        let setmetatable: Function = globals.get("setmetatable")?;
        setmetatable.call::<()>((env.clone(), fallback))?;

        let runtime = Self {
            state: Rc::new(RuntimeState { lua, env, output }),
        };
        runtime.register_entry_points(bridge)?;
        Ok(runtime)
    }

    fn register_entry_points(&self, bridge: &Bridge) -> Result<(), LuaError> {
        let policy = ExpandPolicy::ExpandArgs;

        let state = Rc::clone(&self.state);
        let eval = move |_: &CallContext<'_>, args: &[String]| {
            state.eval(first(args)).map_err(LuaError::into_call_error)
        };
        bridge.register("lua-eval", Arity::exactly(1)?, policy, eval)?;

        let state = Rc::clone(&self.state);
        let exec = move |_: &CallContext<'_>, args: &[String]| text(state.exec(first(args)));
        bridge.register("lua-exec", Arity::exactly(1)?, policy, exec)?;

        let state = Rc::clone(&self.state);
        let file = move |_: &CallContext<'_>, args: &[String]| {
            let script = Path::new(first(args));
            text(state.run_file(script, args.get(1..).unwrap_or_default()))
        };
        bridge.register("lua-file", Arity::at_least(1)?, policy, file)?;

        let state = Rc::clone(&self.state);
        let module = move |_: &CallContext<'_>, args: &[String]| {
            text(state.run_module(first(args), args.get(1..).unwrap_or_default()))
        };
        bridge.register("lua-mod", Arity::at_least(1)?, policy, module)?;

        Ok(())
    }

    pub fn lua(&self) -> &Lua {
        &self.state.lua
    }

    /// The globals table shared by build-script code.
    pub fn globals(&self) -> &Table {
        &self.state.env
    }

    /// `$(lua-eval EXPR)`
    pub fn eval(&self, expr: &str) -> Result<MakeValue, LuaError> {
        self.state.eval(expr)
    }

    /// `$(lua-exec CODE)`: the captured output of `print`.
    pub fn exec(&self, code: &str) -> Result<String, LuaError> {
        self.state.exec(code)
    }

    /// `$(lua-file SCRIPT, ARGS...)`
    pub fn run_file(&self, script: &Path, args: &[String]) -> Result<String, LuaError> {
        self.state.run_file(script, args)
    }

    /// `$(lua-mod MODULE, ARGS...)`
    pub fn run_module(&self, module: &str, args: &[String]) -> Result<String, LuaError> {
        self.state.run_module(module, args)
    }
}

impl std::fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("capturing", &self.state.output.depth())
            .finish_non_exhaustive()
    }
}

impl RuntimeState {
    fn eval(&self, expr: &str) -> Result<MakeValue, LuaError> {
        debug!(len = expr.len(), "lua-eval");
        let value: Value = self
            .lua
            .load(expr)
            .set_name("=lua-eval")
            .set_environment(self.env.clone())
            .eval()?;
        Ok(to_make_value(&self.lua, value))
    }

    fn exec(&self, code: &str) -> Result<String, LuaError> {
        debug!(len = code.len(), "lua-exec");
        self.captured(|| {
            self.lua
                .load(code)
                .set_name("=lua-exec")
                .set_environment(self.env.clone())
                .exec()?;
            Ok(())
        })
    }

    fn run_file(&self, script: &Path, args: &[String]) -> Result<String, LuaError> {
        debug!(script = %script.display(), args = args.len(), "lua-file");
        let source = std::fs::read(script).map_err(|source| LuaError::Script {
            path: script.to_owned(),
            source,
        })?;
        let name = script.to_string_lossy();

        self.with_arg(&self.env, &name, args, || {
            self.captured(|| {
                self.lua
                    .load(source)
                    .set_name(format!("@{name}"))
                    .set_environment(self.env.clone())
                    .exec()?;
                Ok(())
            })
        })
    }

    fn run_module(&self, module: &str, args: &[String]) -> Result<String, LuaError> {
        debug!(module, args = args.len(), "lua-mod");
        let globals = self.lua.globals();
        let package: Table = globals.get("package")?;
        let (loader, extra) = find_loader(&package, module)?;

        self.with_arg(&globals, module, args, || {
            self.captured(|| {
                let exports: Value = loader.call((module, extra))?;
                let loaded: Table = package.get("loaded")?;
                if !exports.is_nil() {
                    loaded.set(module, exports)?;
                } else if loaded.get::<Value>(module)?.is_nil() {
                    loaded.set(module, true)?;
                }
                Ok(())
            })
        })
    }

    /// Run `body` with everything it prints collected instead of written.
    fn captured(&self, body: impl FnOnce() -> Result<(), LuaError>) -> Result<String, LuaError> {
        let capture = OutputCapture::begin(&self.output);
        body()?;
        let mut text = capture.finish();
        text.truncate(text.trim_end_matches('\n').len());
        Ok(text)
    }

    /// Run `body` with `arg` set in `table` the way the standalone
    /// interpreter sets it, restoring the previous value afterwards.
    fn with_arg<T>(
        &self,
        table: &Table,
        script: &str,
        args: &[String],
        body: impl FnOnce() -> Result<T, LuaError>,
    ) -> Result<T, LuaError> {
        let arg = self.lua.create_table()?;
        arg.raw_set(0, script)?;
        for (i, value) in args.iter().enumerate() {
            arg.raw_set(i + 1, value.as_str())?;
        }

        let previous: Value = table.raw_get("arg")?;
        table.raw_set("arg", arg)?;
        let result = body();
        table.raw_set("arg", previous)?;
        result
    }
}

fn first(args: &[String]) -> &str {
    args.first().map_or("", String::as_str)
}

fn text(result: Result<String, LuaError>) -> Result<MakeValue, CallError> {
    result.map(MakeValue::Text).map_err(LuaError::into_call_error)
}

/// Find `module` through `package.searchers` as `require` does, but
/// without looking in `package.loaded`: every `lua-mod` runs the module.
fn find_loader(package: &Table, module: &str) -> Result<(Function, Value), LuaError> {
    let searchers: Table = package.get("searchers")?;
    let mut tried = String::new();

    for searcher in searchers.sequence_values::<Function>() {
        let (found, extra): (Value, Value) = searcher?.call(module)?;
        match found {
            Value::Function(loader) => return Ok((loader, extra)),
            Value::String(message) => tried.push_str(&message.to_string_lossy()),
            _ => {}
        }
    }

    Err(mlua::Error::runtime(format!("module '{module}' not found:{tried}")).into())
}

fn prepend_search_path(package: &Table, key: &str, extra: Option<&str>) -> mlua::Result<()> {
    let Some(extra) = extra.filter(|extra| !extra.is_empty()) else {
        return Ok(());
    };
    let current: String = package.get(key)?;
    package.set(key, format!("{extra};{current}"))
}

// ============================================================================
// Output capture
// ============================================================================

/// Destination of `print`: the innermost active capture, or stdout.
#[derive(Debug, Default)]
struct OutputCapture {
    frames: RefCell<Vec<String>>,
}

impl OutputCapture {
    fn begin(this: &Rc<Self>) -> Capture {
        this.frames.borrow_mut().push(String::new());
        Capture {
            output: Rc::clone(this),
            finished: false,
        }
    }

    fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    fn write(&self, text: &str) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.push_str(text);
            return;
        }

        let mut stdout = std::io::stdout().lock();
        if let Err(err) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            warn!(error = %err, "lost output of print");
        }
    }
}

/// An active capture frame; dropping it without `finish` discards the text.
struct Capture {
    output: Rc<OutputCapture>,
    finished: bool,
}

impl Capture {
    fn finish(mut self) -> String {
        self.finished = true;
        self.output.frames.borrow_mut().pop().unwrap_or_default()
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if !self.finished {
            self.output.frames.borrow_mut().pop();
        }
    }
}

fn create_print(lua: &Lua, output: &Rc<OutputCapture>) -> mlua::Result<Function> {
    let output = Rc::clone(output);
    lua.create_function(move |lua, values: Variadic<Value>| {
        let mut line = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                line.push('\t');
            }
            line.push_str(&display(lua, value.clone())?);
        }
        line.push('\n');
        output.write(&line);
        Ok(())
    })
}

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;
