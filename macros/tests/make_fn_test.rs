//! End-to-end tests for #[make_fn]: the generated structs are exported to a
//! bridge backed by the fake engine and called from make text.

use std::rc::Rc;

use gnumake_core::testing::FakeEngine;
use gnumake_core::{
    Bridge, BridgeError, BridgeOptions, CallContext, CallError, ExpandPolicy, MakeFunction,
};
use gnumake_macros::make_fn;
use pretty_assertions::assert_eq;

fn setup() -> (Rc<FakeEngine>, Rc<Bridge>) {
    FakeEngine::with_bridge(BridgeOptions::default())
}

// ============================================================================
// Plain functions
// ============================================================================

#[make_fn]
fn greet(name: &str) -> String {
    format!("hello {name}")
}

#[make_fn(name = "is-empty")]
fn is_empty(text: String) -> bool {
    text.trim().is_empty()
}

#[make_fn(name = "nothing")]
fn nothing(_ignored: &str) {}

#[test]
fn test_default_name_is_the_rust_name() {
    assert_eq!(Greet.name(), "greet");
    let (engine, bridge) = setup();
    bridge.export(Greet).unwrap();

    assert_eq!(engine.expand_str("$(greet world)"), "hello world");
}

#[test]
fn test_bool_results() {
    let (engine, bridge) = setup();
    bridge.export(IsEmpty).unwrap();

    assert_eq!(engine.expand_str("[$(is-empty  )]"), "[1]");
    assert_eq!(engine.expand_str("[$(is-empty x)]"), "[]");
}

#[test]
fn test_unit_result_is_empty() {
    let (engine, bridge) = setup();
    bridge.export(Nothing).unwrap();

    assert_eq!(engine.expand_str("[$(nothing x)]"), "[]");
    assert_eq!(engine.variable(".GNUMAKE_LAST_ERROR"), None);
}

// ============================================================================
// Parameter kinds
// ============================================================================

#[make_fn(name = "pick")]
fn pick(first: &str, second: Option<&str>) -> String {
    match second {
        Some(second) => format!("{first}/{second}"),
        None => first.to_string(),
    }
}

#[make_fn(name = "count-rest")]
fn count_rest(head: &str, rest: &[String]) -> String {
    format!("{head}:{}", rest.len())
}

#[make_fn(name = "owned-rest")]
fn owned_rest(rest: Vec<String>) -> Vec<String> {
    rest.into_iter().rev().collect()
}

#[test]
fn test_optional_parameters() {
    let (engine, bridge) = setup();
    bridge.export(Pick).unwrap();

    let arity = Pick.arity().unwrap();
    assert_eq!((arity.min_args(), arity.max_args()), (1, Some(2)));
    assert_eq!(engine.expand_str("$(pick a)"), "a");
    assert_eq!(engine.expand_str("$(pick a,b)"), "a/b");
}

#[test]
fn test_rest_parameters_are_unlimited() {
    let (engine, bridge) = setup();
    bridge.export(CountRest).unwrap();
    bridge.export(OwnedRest).unwrap();

    let arity = CountRest.arity().unwrap();
    assert_eq!((arity.min_args(), arity.max_args()), (1, None));
    assert_eq!(engine.function("count-rest").unwrap().max_args, 0);

    assert_eq!(engine.expand_str("$(count-rest h)"), "h:0");
    assert_eq!(engine.expand_str("$(count-rest h,a,b,c)"), "h:3");
    assert_eq!(engine.expand_str("$(owned-rest a,b,c)"), "c b a");
}

// ============================================================================
// Options
// ============================================================================

#[make_fn(name = "raw-text", expand = false)]
fn raw_text(text: &str) -> String {
    text.to_string()
}

#[make_fn(name = "wide", min_args = 1, max_args = 0)]
fn wide(first: &str, second: &str) -> String {
    format!("<{first}><{second}>")
}

#[test]
fn test_verbatim_option() {
    let (engine, bridge) = setup();
    bridge.export(RawText).unwrap();

    assert_eq!(RawText.policy(), ExpandPolicy::VerbatimArgs);
    assert_eq!(
        engine.function("raw-text").unwrap().policy,
        ExpandPolicy::VerbatimArgs
    );
    engine.run("X = expanded");
    assert_eq!(engine.expand_str("$(raw-text $(X))"), "$(X)");
}

#[test]
fn test_explicit_range_overrides_inference() {
    let (engine, bridge) = setup();
    bridge.export(Wide).unwrap();

    let arity = Wide.arity().unwrap();
    assert_eq!((arity.min_args(), arity.max_args()), (1, None));
    assert_eq!(engine.expand_str("$(wide a)"), "<a><>");
    assert_eq!(engine.expand_str("$(wide a,b,c)"), "<a><b>");
}

// ============================================================================
// Context and fallible functions
// ============================================================================

#[make_fn(name = "expand-twice")]
fn expand_twice(ctx: &CallContext, text: &str) -> Result<String, BridgeError> {
    ctx.expand(text)
}

#[make_fn(name = "whoami")]
fn whoami(ctx: &CallContext, _unused: &str) -> String {
    ctx.name().to_string()
}

#[make_fn(name = "parse-num")]
fn parse_num(text: &str) -> Result<i64, std::num::ParseIntError> {
    text.trim().parse()
}

#[make_fn(name = "checked")]
fn checked(text: &str) -> Result<Option<String>, CallError> {
    if text == "bad" {
        return Err(CallError::value("bad input"));
    }
    Ok((!text.is_empty()).then(|| text.to_uppercase()))
}

#[test]
fn test_context_parameter_is_not_a_make_argument() {
    let (engine, bridge) = setup();
    bridge.export(ExpandTwice).unwrap();
    bridge.export(Whoami).unwrap();

    let arity = ExpandTwice.arity().unwrap();
    assert_eq!((arity.min_args(), arity.max_args()), (1, Some(1)));

    engine.run("INNER = deep");
    engine.run("OUTER = $$(INNER)");
    assert_eq!(engine.expand_str("$(expand-twice $(OUTER))"), "deep");
    assert_eq!(engine.expand_str("$(whoami x)"), "whoami");
}

#[test]
fn test_errors_from_std_types() {
    let (engine, bridge) = setup();
    bridge.export(ParseNum).unwrap();

    assert_eq!(engine.expand_str("$(parse-num 12)"), "12");
    assert_eq!(engine.expand_str("$(parse-num twelve)"), "");
    assert_eq!(
        engine.expand_str("$(.GNUMAKE_LAST_ERROR)"),
        "ParseIntError: invalid digit found in string"
    );
}

#[test]
fn test_call_errors_pass_through() {
    let (engine, bridge) = setup();
    bridge.export(Checked).unwrap();

    assert_eq!(engine.expand_str("$(checked ok)"), "OK");
    assert_eq!(engine.expand_str("$(checked bad)"), "");
    assert_eq!(
        engine.expand_str("$(.GNUMAKE_LAST_ERROR)"),
        "ValueError: bad input"
    );
}
