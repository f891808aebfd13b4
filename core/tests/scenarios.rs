//! End-to-end scenarios through the fake engine.
//!
//! These tests drive the bridge the way make does: build-script text is
//! evaluated and expanded by the engine, which calls back into exported
//! functions.

use std::rc::Rc;

use gnumake_core::arity::{ParamKind, Signature, infer, resolve_arity};
use gnumake_core::codec::{MakeValue, encode};
use gnumake_core::testing::FakeEngine;
use gnumake_core::{
    Arity, Bridge, BridgeOptions, CallContext, CallError, ExpandPolicy, Flavor, IntoMakeValue,
    MakeFunction, make_fn,
};
use pretty_assertions::assert_eq;
use thiserror::Error;

fn setup() -> (Rc<FakeEngine>, Rc<Bridge>) {
    FakeEngine::with_bridge(BridgeOptions::default())
}

#[derive(Debug, Error)]
#[error("division by zero")]
struct DivisionError;

#[make_fn(name = "divide")]
fn divide(a: &str, b: &str) -> Result<i64, CallError> {
    let a: i64 = a.trim().parse()?;
    let b: i64 = b.trim().parse()?;
    if b == 0 {
        return Err(DivisionError.into());
    }
    Ok(a / b)
}

#[make_fn(name = "pair")]
fn pair(a: &str, b: &str) -> String {
    format!("{a}+{b}")
}

#[test]
fn test_scenario_a_arity_is_enforced_by_the_engine() {
    let (engine, bridge) = setup();
    bridge.export(Pair).unwrap();

    assert_eq!(engine.expand_str("$(pair one)"), "");
    assert!(
        engine
            .fatal_error()
            .unwrap()
            .contains("insufficient number of arguments")
    );
    assert_eq!(engine.dispatch_count(), 0);

    engine.take_fatal_error();
    assert_eq!(engine.expand_str("$(pair one,two)"), "one+two");
    assert_eq!(engine.dispatch_count(), 1);
    assert_eq!(engine.expand_str("$(origin .GNUMAKE_LAST_ERROR)"), "undefined");
}

#[test]
fn test_scenario_a_extra_commas_stay_in_the_last_argument() {
    let (engine, bridge) = setup();
    bridge.export(Pair).unwrap();

    assert_eq!(engine.expand_str("$(pair a,b,c)"), "a+b,c");
}

#[test]
fn test_scenario_b_errors_are_reported_and_cleared() {
    let (engine, bridge) = setup();
    bridge.export(Divide).unwrap();

    assert_eq!(engine.expand_str("[$(divide 10,0)]"), "[]");
    assert_eq!(
        engine.expand_str("$(.GNUMAKE_LAST_ERROR)"),
        "DivisionError: division by zero"
    );

    assert_eq!(engine.expand_str("$(divide 10,3)"), "3");
    assert_eq!(engine.variable(".GNUMAKE_LAST_ERROR"), None);
}

#[test]
fn test_scenario_b_error_slot_tracks_every_dispatch() {
    let (engine, bridge) = setup();
    bridge.export(Divide).unwrap();

    let calls = [("8,2", false), ("1,0", true), ("x,1", true), ("9,3", false)];
    for (args, fails) in calls {
        engine.expand_str(&format!("$(divide {args})"));
        assert_eq!(
            engine.variable(".GNUMAKE_LAST_ERROR").is_some(),
            fails,
            "after divide {args}"
        );
    }
}

#[test]
fn test_scenario_c_weak_escape_keeps_dollar_text() {
    let (engine, bridge) = setup();
    let vars = bridge.variables();

    vars.set("FOO", "a$b", Flavor::Recursive).unwrap();
    assert_eq!(vars.get("FOO", "", false).unwrap(), "a$b");
    assert_eq!(engine.variable("FOO").as_deref(), Some("a$b"));

    engine.run("b = X");
    assert_eq!(bridge.expand("$(FOO)").unwrap(), "aX");
}

#[test]
fn test_codec_table() {
    assert_eq!(encode(true.into_make_value()), Some(b"1".to_vec()));
    assert_eq!(encode(false.into_make_value()), None);
    assert_eq!(encode(MakeValue::None), None);
    assert_eq!(encode("x".into_make_value()), Some(b"x".to_vec()));
    assert_eq!(encode(42.into_make_value()), Some(b"42".to_vec()));
}

#[test]
fn test_arity_inference_table() {
    use ParamKind::*;

    let inferred = infer(&Signature::new([Required, Required, Optional]));
    assert_eq!((inferred.min, inferred.max), (2, Some(3)));

    let inferred = infer(&Signature::new([Rest]));
    assert_eq!((inferred.min, inferred.max), (0, None));

    let inferred = infer(&Signature::new([KeywordOnly, KeywordOnly]));
    assert_eq!((inferred.min, inferred.max), (0, Some(0)));
}

#[test]
fn test_valid_ranges_register_and_engine_checks_calls() {
    let echo = |_: &CallContext<'_>, args: &[String]| -> Result<MakeValue, CallError> {
        Ok(MakeValue::display(args.len()))
    };
    let echo = Rc::new(echo);

    for (min, max) in [(1, 1), (1, 3), (2, 0), (255, 255)] {
        let (engine, bridge) = setup();
        let arity = resolve_arity(Some(min), Some(max), None).unwrap();
        bridge
            .register_rc("count", arity, ExpandPolicy::ExpandArgs, echo.clone())
            .unwrap();

        let args = vec!["x"; min as usize].join(",");
        assert_eq!(engine.expand_str(&format!("$(count {args})")), min.to_string());

        if min > 1 {
            let short = vec!["x"; min as usize - 1].join(",");
            engine.expand_str(&format!("$(count {short})"));
            assert!(engine.fatal_error().is_some(), "({min}, {max}) accepted too few");
        }
    }
}

#[test]
fn test_unlimited_functions_take_any_number_of_arguments() {
    let (engine, bridge) = setup();
    let count = |_: &CallContext<'_>, args: &[String]| -> Result<MakeValue, CallError> {
        Ok(MakeValue::display(args.len()))
    };
    bridge
        .register("count", Arity::at_least(1).unwrap(), ExpandPolicy::ExpandArgs, count)
        .unwrap();

    let args = vec!["w"; 300].join(",");
    assert_eq!(engine.expand_str(&format!("$(count {args})")), "300");
}

#[test]
fn test_verbatim_arguments() {
    let (engine, bridge) = setup();
    let show = |_: &CallContext<'_>, args: &[String]| -> Result<MakeValue, CallError> {
        Ok(MakeValue::text(args[0].replace('$', "<dollar>")))
    };
    let arity = Arity::exactly(1).unwrap();
    bridge.register("raw", arity, ExpandPolicy::VerbatimArgs, show).unwrap();
    bridge.register("cooked", arity, ExpandPolicy::ExpandArgs, show).unwrap();
    engine.run("X = value");

    assert_eq!(engine.expand_str("$(raw $(X))"), "<dollar>(X)");
    assert_eq!(engine.expand_str("$(cooked $(X))"), "value");
}

#[test]
fn test_macro_exports_carry_their_own_contract() {
    assert_eq!(Divide.name(), "divide");
    assert_eq!(Divide.policy(), ExpandPolicy::ExpandArgs);
    let arity = Divide.arity().unwrap();
    assert_eq!((arity.min_args(), arity.max_args()), (2, Some(2)));
}
