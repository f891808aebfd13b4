//! The Lua entry points and the `make` module, driven from make text.

use std::fs;
use std::rc::Rc;

use gnumake_core::testing::FakeEngine;
use gnumake_core::{Bridge, BridgeOptions, ExpandPolicy};
use gnumake_lua::{LuaOptions, LuaRuntime};
use pretty_assertions::assert_eq;

fn setup() -> (Rc<FakeEngine>, Rc<Bridge>, LuaRuntime) {
    let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
    let runtime = LuaRuntime::install(&bridge, LuaOptions::default()).unwrap();
    (engine, bridge, runtime)
}

fn last_error(engine: &FakeEngine) -> Option<String> {
    engine.variable(".GNUMAKE_LAST_ERROR")
}

// ============================================================================
// lua-eval / lua-exec
// ============================================================================

#[test]
fn test_lua_eval() {
    let (engine, _bridge, _runtime) = setup();

    assert_eq!(engine.expand_str("$(lua-eval 6 * 7)"), "42");
    assert_eq!(engine.expand_str("$(lua-eval ('make'):upper())"), "MAKE");
    assert_eq!(engine.expand_str("[$(lua-eval 1 < 2)][$(lua-eval 1 > 2)]"), "[1][]");
    assert_eq!(engine.expand_str("[$(lua-eval nil)]"), "[]");
    assert_eq!(last_error(&engine), None);
}

#[test]
fn test_lua_eval_keeps_commas() {
    let (engine, _bridge, _runtime) = setup();

    assert_eq!(engine.expand_str("$(lua-eval math.max(3, 9, 4))"), "9");
}

#[test]
fn test_lua_exec_output() {
    let (engine, _bridge, _runtime) = setup();

    assert_eq!(
        engine.expand_str("$(lua-exec for i = 1, 3 do print(i) end)"),
        "1\n2\n3"
    );
}

#[test]
fn test_globals_persist_between_calls() {
    let (engine, _bridge, _runtime) = setup();

    engine.expand_str("$(lua-exec total = 10)");
    engine.expand_str("$(lua-exec total = total + 5)");
    assert_eq!(engine.expand_str("$(lua-eval total)"), "15");
}

#[test]
fn test_runtime_errors_reach_the_error_variable() {
    let (engine, _bridge, _runtime) = setup();

    assert_eq!(engine.expand_str("[$(lua-eval error('boom'))]"), "[]");
    assert_eq!(
        last_error(&engine).as_deref(),
        Some("RuntimeError: lua-eval:1: boom")
    );

    engine.expand_str("$(lua-eval 1)");
    assert_eq!(last_error(&engine), None);
}

#[test]
fn test_syntax_errors() {
    let (engine, _bridge, _runtime) = setup();

    engine.expand_str("$(lua-exec if then)");
    let error = last_error(&engine).unwrap();
    assert!(error.starts_with("SyntaxError: "), "{error}");
}

#[test]
fn test_traceback_is_printed_only_on_request() {
    let (engine, _bridge, _runtime) = setup();
    engine.run(".GNUMAKE_PRINT_TRACEBACK = 1");

    engine.expand_str("$(lua-exec error('traced'))");
    assert_eq!(
        last_error(&engine).as_deref(),
        Some("RuntimeError: lua-exec:1: traced")
    );
}

// ============================================================================
// make module
// ============================================================================

#[test]
fn test_make_eval_and_expand() {
    let (engine, _bridge, _runtime) = setup();

    engine.expand_str("$(lua-exec make.eval('GREETING := hello'))");
    assert_eq!(engine.variable("GREETING").as_deref(), Some("hello"));
    assert_eq!(
        engine.expand_str("$(lua-eval make.expand('$$(GREETING) world'))"),
        "hello world"
    );
}

#[test]
fn test_make_escape() {
    let (engine, _bridge, runtime) = setup();

    let escaped = runtime.eval("make.escape_fully('a$b')").unwrap();
    assert_eq!(escaped, gnumake_core::MakeValue::Bytes(b"a$$b".to_vec()));
    let escaped = runtime.eval("make.escape('endef')").unwrap();
    assert_eq!(escaped, gnumake_core::MakeValue::Bytes(b"$()endef".to_vec()));
    assert_eq!(engine.fatal_error(), None);
}

#[test]
fn test_make_var() {
    let (engine, _bridge, runtime) = setup();

    runtime
        .exec(
            r#"
            make.var.set("MODE", "release", "simple")
            make.var.OUT = "build/$(MODE)"
            make.var.append("OUT", "x86")
            make.var.COUNT = 3
            "#,
        )
        .unwrap();

    assert_eq!(engine.expand_str("$(flavor MODE)"), "simple");
    assert_eq!(engine.expand_str("$(flavor OUT)"), "recursive");
    assert_eq!(engine.expand_str("$(OUT)"), "build/release x86");
    assert_eq!(engine.variable("COUNT").as_deref(), Some("3"));

    let output = runtime
        .exec(
            r#"
            print(make.var.OUT)
            print(make.var.get("OUT", "", false))
            print(make.var.get("MISSING", "fallback"))
            print(make.var.origin("MODE"), make.var.flavor("MISSING"))
            print(make.var.defined("MODE"), make.var.defined("MISSING"))
            "#,
        )
        .unwrap();
    assert_eq!(
        output,
        "build/release x86\nbuild/$(MODE) x86\nfallback\nfile\tundefined\ntrue\tfalse"
    );

    runtime.exec("make.var.OUT = nil").unwrap();
    assert_eq!(engine.variable("OUT"), None);
}

#[test]
fn test_make_var_errors() {
    let (_engine, _bridge, runtime) = setup();

    let error = runtime
        .exec("make.var.set('BAD NAME', 'x')")
        .unwrap_err()
        .into_call_error();
    assert_eq!(error.kind(), "RuntimeError");
    assert!(error.message().contains("BAD NAME"), "{error}");

    let error = runtime
        .exec("make.var.set('OK', 'x', 'lazy')")
        .unwrap_err()
        .into_call_error();
    assert!(error.message().contains("valid flavors"), "{error}");
}

// ============================================================================
// make.export
// ============================================================================

#[test]
fn test_export_infers_arity() {
    let (engine, _bridge, runtime) = setup();

    runtime
        .exec(
            r##"
            make.export("twice", function(s) return s .. s end)
            make.export("pair", function(a, b) return a .. "+" .. (b or "?") end)
            make.export("words", function(first, ...) return select("#", ...) + 1 end)
            "##,
        )
        .unwrap();

    let twice = engine.function("twice").unwrap();
    assert_eq!((twice.min_args, twice.max_args), (1, 1));
    let pair = engine.function("pair").unwrap();
    assert_eq!((pair.min_args, pair.max_args), (2, 2));
    let words = engine.function("words").unwrap();
    assert_eq!((words.min_args, words.max_args), (1, 0));

    assert_eq!(engine.expand_str("$(twice ab)"), "abab");
    assert_eq!(engine.expand_str("$(pair x,y)"), "x+y");
    assert_eq!(engine.expand_str("$(words a,b,c,d)"), "4");
}

#[test]
fn test_export_options() {
    let (engine, _bridge, runtime) = setup();

    runtime
        .exec(
            r#"
            make.export("show", function(a, b) return a .. "|" .. (b or "") end,
                { min_args = 1, max_args = 2, expand = false })
            "#,
        )
        .unwrap();

    let show = engine.function("show").unwrap();
    assert_eq!((show.min_args, show.max_args), (1, 2));
    assert_eq!(show.policy, ExpandPolicy::VerbatimArgs);

    engine.run("X = value");
    assert_eq!(engine.expand_str("$(show $(X))"), "$(X)|");
}

#[test]
fn test_export_rejects_functions_without_parameters() {
    let (_engine, bridge, runtime) = setup();

    let error = runtime
        .exec("make.export('nothing', function() end)")
        .unwrap_err()
        .into_call_error();
    assert!(
        error.message().contains("at least one parameter"),
        "{error}"
    );
    assert!(!bridge.is_registered("nothing"));
}

#[test]
fn test_exported_function_errors() {
    let (engine, _bridge, runtime) = setup();

    runtime
        .exec(r#"make.export("fail", function(msg) error(msg, 0) end)"#)
        .unwrap();

    assert_eq!(engine.expand_str("[$(fail oops)]"), "[]");
    assert_eq!(last_error(&engine).as_deref(), Some("RuntimeError: oops"));
}

#[test]
fn test_exported_function_reenters_make() {
    let (engine, _bridge, runtime) = setup();

    runtime
        .exec(
            r#"
            make.export("upper-var", function(name)
                return make.var.get(name):upper()
            end)
            "#,
        )
        .unwrap();
    engine.run("NAME = $(lua-eval 'dyn' .. 'amic')");

    assert_eq!(engine.expand_str("$(upper-var NAME)"), "DYNAMIC");
}

// ============================================================================
// lua-file / lua-mod
// ============================================================================

#[test]
fn test_lua_file_with_arguments() {
    let (engine, _bridge, _runtime) = setup();
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("args.lua");
    fs::write(&script, "print(#arg)\nfor i = 1, #arg do print(arg[i]) end\n").unwrap();

    let result = engine.expand_str(&format!("$(lua-file {},one,two)", script.display()));
    assert_eq!(result, "2\none\ntwo");
}

#[test]
fn test_lua_file_missing() {
    let (engine, _bridge, _runtime) = setup();

    engine.expand_str("$(lua-file /nonexistent/script.lua)");
    let error = last_error(&engine).unwrap();
    assert!(error.starts_with("IOError: /nonexistent/script.lua"), "{error}");
}

#[test]
fn test_lua_mod_exports_functions() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("buildutils.lua"),
        r#"
        print("loading " .. arg[0])
        make.export("basename", function(path) return (path:gsub(".*/", "")) end)
        return {}
        "#,
    )
    .unwrap();

    let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
    let options =
        LuaOptions::default().with_package_path(format!("{}/?.lua", dir.path().display()));
    let _runtime = LuaRuntime::install(&bridge, options).unwrap();

    assert_eq!(engine.expand_str("$(lua-mod buildutils)"), "loading buildutils");
    assert_eq!(engine.expand_str("$(basename src/lib/util.c)"), "util.c");
}

#[test]
fn test_lua_mod_runs_the_module_every_time() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("counter.lua"),
        r#"
        runs = (runs or 0) + 1
        print(arg[0] .. " run " .. runs .. " with " .. #arg .. " args")
        return { runs = runs }
        "#,
    )
    .unwrap();

    let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
    let options =
        LuaOptions::default().with_package_path(format!("{}/?.lua", dir.path().display()));
    let _runtime = LuaRuntime::install(&bridge, options).unwrap();

    assert_eq!(engine.expand_str("$(lua-mod counter)"), "counter run 1 with 0 args");
    assert_eq!(engine.expand_str("$(lua-mod counter,a,b)"), "counter run 2 with 2 args");
    // require sees the exports of the latest run.
    assert_eq!(engine.expand_str("$(lua-eval require('counter').runs)"), "2");
}

#[test]
fn test_lua_mod_unknown_module() {
    let (engine, _bridge, _runtime) = setup();

    engine.expand_str("$(lua-mod no_such_module_here)");
    let error = last_error(&engine).unwrap();
    assert!(error.contains("no_such_module_here"), "{error}");
}
