//! The `make` Lua module.
//!
//! ```lua
//! make.eval("CFLAGS += -O2")
//! local objs = make.expand("$(SRCS:.c=.o)")
//!
//! make.export("newer", function(a, b) ... end)
//! make.export("join", function(...) ... end, { min_args = 1 })
//!
//! make.var.set("MODE", "release", "simple")
//! make.var.OUT = "build"           -- recursive assignment
//! make.var.OUT = nil               -- undefine
//! print(make.var.get("CC", "cc"))  -- with a default
//! ```

use std::rc::{Rc, Weak};

use gnumake_core::arity::{ParamKind, Signature, resolve_arity};
use gnumake_core::escape::{escape, escape_fully};
use gnumake_core::{Bridge, CallContext, CallError, Callable, ExpandPolicy, Flavor, MakeValue};
use mlua::{Function, Lua, Table, Value, Variadic};

use crate::convert::to_make_value;
use crate::error::call_error;

/// Build the `make` table. Its functions hold the bridge weakly; they fail
/// with a runtime error once the bridge is gone.
pub(crate) fn create_module(lua: &Lua, bridge: &Rc<Bridge>) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    let weak = Rc::downgrade(bridge);

    let b = weak.clone();
    module.set(
        "eval",
        lua.create_function(move |_, text: String| {
            upgrade(&b)?.evaluate(&text).map_err(runtime_error)
        })?,
    )?;

    let b = weak.clone();
    module.set(
        "expand",
        lua.create_function(move |lua, text: String| {
            let bytes = upgrade(&b)?.expand_bytes(&text).map_err(runtime_error)?;
            lua.create_string(bytes)
        })?,
    )?;

    let getinfo: Function = lua.globals().get::<Table>("debug")?.get("getinfo")?;
    let b = weak.clone();
    module.set(
        "export",
        lua.create_function(
            move |lua, (name, function, options): (String, Function, Option<Table>)| {
                let bridge = upgrade(&b)?;
                export(lua, &bridge, &getinfo, name, function, options)
            },
        )?,
    )?;

    module.set(
        "escape",
        lua.create_function(|_, text: String| Ok(escape(&text)))?,
    )?;
    module.set(
        "escape_fully",
        lua.create_function(|_, text: String| Ok(escape_fully(&text)))?,
    )?;

    module.set("var", create_var_table(lua, weak)?)?;
    Ok(module)
}

// ============================================================================
// Exported Lua functions
// ============================================================================

/// A Lua function called from make.
struct LuaFunction {
    lua: Lua,
    function: Function,
}

impl Callable for LuaFunction {
    fn call(&self, _ctx: &CallContext<'_>, args: &[String]) -> Result<MakeValue, CallError> {
        let args: Variadic<&str> = args.iter().map(String::as_str).collect();
        let value: Value = self.function.call(args).map_err(call_error)?;
        Ok(to_make_value(&self.lua, value))
    }
}

fn export(
    lua: &Lua,
    bridge: &Bridge,
    getinfo: &Function,
    name: String,
    function: Function,
    options: Option<Table>,
) -> mlua::Result<()> {
    let (min_args, max_args, expand) = match &options {
        Some(options) => (
            options.get::<Option<i64>>("min_args")?,
            options.get::<Option<i64>>("max_args")?,
            options.get::<Option<bool>>("expand")?.unwrap_or(true),
        ),
        None => (None, None, true),
    };

    let signature = signature_of(getinfo, &function)?;
    let arity = resolve_arity(min_args, max_args, Some(&signature)).map_err(runtime_error)?;
    let callable = LuaFunction {
        lua: lua.clone(),
        function,
    };
    bridge
        .register(&name, arity, ExpandPolicy::from_expand(expand), callable)
        .map_err(runtime_error)
}

/// Declared parameters are required; `...` accepts any number more.
fn signature_of(getinfo: &Function, function: &Function) -> mlua::Result<Signature> {
    let info: Table = getinfo.call((function.clone(), "u"))?;
    let nparams: usize = info.get("nparams")?;
    let vararg: bool = info.get("isvararg")?;

    let rest = vararg.then_some(ParamKind::Rest);
    Ok(Signature::new(
        std::iter::repeat_n(ParamKind::Required, nparams).chain(rest),
    ))
}

// ============================================================================
// make.var
// ============================================================================

fn create_var_table(lua: &Lua, bridge: Weak<Bridge>) -> mlua::Result<Table> {
    let var = lua.create_table()?;

    let b = bridge.clone();
    let get = lua.create_function(
        move |_, (name, default, expand): (String, Option<String>, Option<bool>)| {
            upgrade(&b)?
                .variables()
                .get(&name, default.as_deref().unwrap_or(""), expand.unwrap_or(true))
                .map_err(runtime_error)
        },
    )?;

    let b = bridge.clone();
    let set = lua.create_function(
        move |lua, (name, value, flavor): (String, Value, Option<String>)| {
            let flavor = match flavor.as_deref() {
                None => Flavor::Recursive,
                Some(flavor) => flavor.parse().unwrap_or(Flavor::Undefined),
            };
            let bridge = upgrade(&b)?;
            let value = to_make_value(lua, value);
            bridge.variables().set(&name, value, flavor).map_err(runtime_error)
        },
    )?;

    let b = bridge.clone();
    let append = lua.create_function(move |lua, (name, value): (String, Value)| {
        let bridge = upgrade(&b)?;
        let value = to_make_value(lua, value);
        bridge.variables().append(&name, value).map_err(runtime_error)
    })?;

    let b = bridge.clone();
    let undefine = lua.create_function(move |_, name: String| {
        upgrade(&b)?.variables().undefine(&name).map_err(runtime_error)
    })?;

    let b = bridge.clone();
    let origin = lua.create_function(move |_, name: String| {
        let origin = upgrade(&b)?.variables().origin(&name).map_err(runtime_error)?;
        Ok(origin.as_str())
    })?;

    let b = bridge.clone();
    let flavor = lua.create_function(move |_, name: String| {
        let flavor = upgrade(&b)?.variables().flavor(&name).map_err(runtime_error)?;
        Ok(flavor.as_str())
    })?;

    let b = bridge;
    let defined = lua.create_function(move |_, name: String| {
        upgrade(&b)?.variables().defined(&name).map_err(runtime_error)
    })?;

    // make.var.NAME reads, make.var.NAME = v assigns, make.var.NAME = nil undefines
    let metatable = lua.create_table()?;
    let index_get = get.clone();
    metatable.set(
        "__index",
        lua.create_function(move |_, (_, name): (Table, String)| {
            index_get.call::<String>(name)
        })?,
    )?;
    let newindex_set = set.clone();
    let newindex_undefine = undefine.clone();
    metatable.set(
        "__newindex",
        lua.create_function(move |_, (_, name, value): (Table, String, Value)| match value {
            Value::Nil => newindex_undefine.call::<()>(name),
            value => newindex_set.call::<()>((name, value)),
        })?,
    )?;

    var.set("get", get)?;
    var.set("set", set)?;
    var.set("append", append)?;
    var.set("undefine", undefine)?;
    var.set("origin", origin)?;
    var.set("flavor", flavor)?;
    var.set("defined", defined)?;

    let setmetatable: Function = lua.globals().get("setmetatable")?;
    setmetatable.call::<()>((var.clone(), metatable))?;
    Ok(var)
}

// ============================================================================
// Helpers
// ============================================================================

fn upgrade(bridge: &Weak<Bridge>) -> mlua::Result<Rc<Bridge>> {
    bridge
        .upgrade()
        .ok_or_else(|| mlua::Error::RuntimeError("the make bridge has been shut down".to_owned()))
}

fn runtime_error(err: impl std::fmt::Display) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}
