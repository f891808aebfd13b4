use super::*;
use pretty_assertions::assert_eq;

fn noop(_: &CallContext<'_>, _: &[String]) -> Result<MakeValue, CallError> {
    Ok(MakeValue::None)
}

fn entry(name: &str, min: i64, max: i64) -> RegisteredFunction {
    RegisteredFunction::new(
        FunctionName::new(name).unwrap(),
        Rc::new(noop),
        Arity::new(min, max).unwrap(),
        ExpandPolicy::ExpandArgs,
    )
}

#[test]
fn test_function_name_validation() {
    assert_eq!(FunctionName::new(""), Err(RegistrationError::EmptyName));
    assert_eq!(
        FunctionName::new(&"x".repeat(256)),
        Err(RegistrationError::NameTooLong(256))
    );
    assert!(FunctionName::new(&"x".repeat(255)).is_ok());
    assert_eq!(
        FunctionName::new("has space"),
        Err(RegistrationError::IllegalNameChar {
            name: "has space".to_owned(),
            ch: ' '
        })
    );
    assert!(matches!(
        FunctionName::new("a,b"),
        Err(RegistrationError::IllegalNameChar { ch: ',', .. })
    ));
    assert!(matches!(
        FunctionName::new("nul\0"),
        Err(RegistrationError::IllegalNameChar { ch: '\0', .. })
    ));
}

#[test]
fn test_function_name_accepts_make_style_names() {
    for name in ["lua-eval", "str.lower", "my_fn2", "a/b", "ünï"] {
        let parsed = FunctionName::new(name).unwrap();
        assert_eq!(parsed.as_str(), name);
        assert_eq!(parsed.as_c_str().to_str().unwrap(), name);
    }
}

#[test]
fn test_insert_replaces() {
    let mut registry = Registry::new();
    assert!(registry.insert(entry("f", 1, 1)).is_none());

    let previous = registry.insert(entry("f", 1, 3)).unwrap();
    assert_eq!(previous.arity().max_args(), Some(1));
    assert_eq!(registry.get("f").unwrap().arity().max_args(), Some(3));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_names_are_sorted() {
    let mut registry = Registry::new();
    for name in ["zeta", "alpha", "mid"] {
        registry.insert(entry(name, 1, 0));
    }
    assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
    assert!(registry.contains("mid"));
    assert!(!registry.contains("other"));
}
