//! Lua values at the make boundary.
//!
//! Results follow the value codec: `nil` is no value, booleans stay
//! booleans, strings pass through as raw bytes and numbers use Lua's own
//! formatting (`3`, `2.5`, `1e+100`). Anything else is rendered with
//! `tostring`, so tables with a `__tostring` metamethod control their own
//! text. A failing `__tostring` produces no value.

use gnumake_core::MakeValue;
use mlua::{Function, Lua, Value};
use tracing::debug;

/// Convert a Lua result to the value make receives.
pub fn to_make_value(lua: &Lua, value: Value) -> MakeValue {
    match value {
        Value::Nil => MakeValue::None,
        Value::Boolean(flag) => MakeValue::Bool(flag),
        Value::String(text) => MakeValue::Bytes(text.as_bytes().to_vec()),
        number @ (Value::Integer(_) | Value::Number(_)) => match lua.coerce_string(number) {
            Ok(Some(text)) => MakeValue::Bytes(text.as_bytes().to_vec()),
            _ => MakeValue::None,
        },
        other => match display(lua, other) {
            Ok(text) => MakeValue::Text(text),
            Err(err) => {
                debug!(error = %err, "tostring failed, returning no value");
                MakeValue::None
            }
        },
    }
}

/// `tostring(value)`, decoded lossily.
pub fn display(lua: &Lua, value: Value) -> mlua::Result<String> {
    let tostring: Function = lua.globals().get("tostring")?;
    let text: mlua::String = tostring.call(value)?;
    Ok(String::from_utf8_lossy(&text.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnumake_core::codec::encode;
    use pretty_assertions::assert_eq;

    fn encoded(lua: &Lua, code: &str) -> Option<String> {
        let value: Value = lua.load(code).eval().unwrap();
        encode(to_make_value(lua, value)).map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_scalars() {
        let lua = Lua::new();
        assert_eq!(encoded(&lua, "nil"), None);
        assert_eq!(encoded(&lua, "true"), Some("1".to_owned()));
        assert_eq!(encoded(&lua, "false"), None);
        assert_eq!(encoded(&lua, "'text'"), Some("text".to_owned()));
        assert_eq!(encoded(&lua, "''"), Some(String::new()));
    }

    #[test]
    fn test_numbers_use_lua_formatting() {
        let lua = Lua::new();
        assert_eq!(encoded(&lua, "40 + 2"), Some("42".to_owned()));
        assert_eq!(encoded(&lua, "5 / 2"), Some("2.5".to_owned()));
        assert_eq!(encoded(&lua, "4 / 2"), Some("2.0".to_owned()));
    }

    #[test]
    fn test_tostring_metamethod() {
        let lua = Lua::new();
        let code = "setmetatable({}, { __tostring = function() return 'custom' end })";
        assert_eq!(encoded(&lua, code), Some("custom".to_owned()));

        let failing = "setmetatable({}, { __tostring = function() error('no') end })";
        assert_eq!(encoded(&lua, failing), None);
    }

    #[test]
    fn test_tables_render_with_tostring() {
        let lua = Lua::new();
        let text = encoded(&lua, "{}").unwrap();
        assert!(text.starts_with("table: "), "{text}");
    }
}
