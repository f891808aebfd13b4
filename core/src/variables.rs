//! Make variables as seen from the host.
//!
//! Everything here goes through `eval` and `expand`, so it sees exactly
//! what a makefile would: `$(value ...)`, `$(origin ...)`, `$(flavor ...)`
//! and `define` blocks.

use core::fmt;
use core::str::FromStr;

use crate::bridge::Bridge;
use crate::codec::{self, IntoMakeValue};
use crate::error::BridgeError;
use crate::escape;

const ILLEGAL_NAME_CHARS: &[char] = &[':', '#', '=', '$', '(', ')'];

/// Whether `name` can be used in a `define` or a reference unquoted.
pub fn is_legal_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || ILLEGAL_NAME_CHARS.contains(&c))
}

/// How a variable's value is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flavor {
    /// `=`: expanded on every reference.
    #[default]
    Recursive,
    /// `:=`: expanded once, at assignment.
    Simple,
    Undefined,
}

impl Flavor {
    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Recursive => "recursive",
            Flavor::Simple => "simple",
            Flavor::Undefined => "undefined",
        }
    }
}

impl FromStr for Flavor {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recursive" => Ok(Flavor::Recursive),
            "simple" => Ok(Flavor::Simple),
            "undefined" => Ok(Flavor::Undefined),
            other => Err(BridgeError::UnexpectedFlavor(other.to_owned())),
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a variable's value came from, as reported by `$(origin ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Undefined,
    Default,
    Environment,
    EnvironmentOverride,
    File,
    CommandLine,
    Override,
    Automatic,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Undefined => "undefined",
            Origin::Default => "default",
            Origin::Environment => "environment",
            Origin::EnvironmentOverride => "environment override",
            Origin::File => "file",
            Origin::CommandLine => "command line",
            Origin::Override => "override",
            Origin::Automatic => "automatic",
        }
    }
}

impl FromStr for Origin {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "undefined" => Origin::Undefined,
            "default" => Origin::Default,
            "environment" => Origin::Environment,
            "environment override" => Origin::EnvironmentOverride,
            "file" => Origin::File,
            "command line" => Origin::CommandLine,
            "override" => Origin::Override,
            "automatic" => Origin::Automatic,
            other => return Err(BridgeError::UnexpectedOrigin(other.to_owned())),
        })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variable access through a [`Bridge`].
#[derive(Debug, Clone, Copy)]
pub struct Variables<'b> {
    bridge: &'b Bridge,
}

impl<'b> Variables<'b> {
    pub fn new(bridge: &'b Bridge) -> Self {
        Self { bridge }
    }

    /// Read `name`.
    ///
    /// Without `expand_value` the raw, unexpanded value is returned. The
    /// `default` is used only when the result is empty and the variable is
    /// not defined at all.
    pub fn get(&self, name: &str, default: &str, expand_value: bool) -> Result<String, BridgeError> {
        check_name(name)?;
        let reference = if expand_value {
            format!("$({name})")
        } else {
            format!("$(value {name})")
        };
        let value = self.bridge.expand(&reference)?;

        if value.is_empty() && !default.is_empty() && !self.defined(name)? {
            return Ok(default.to_owned());
        }
        Ok(value)
    }

    /// Assign `name` with a recursive or simple flavor.
    pub fn set(&self, name: &str, value: impl IntoMakeValue, flavor: Flavor) -> Result<(), BridgeError> {
        check_name(name)?;
        let operator = match flavor {
            Flavor::Recursive => "=",
            Flavor::Simple => ":=",
            Flavor::Undefined => return Err(BridgeError::InvalidFlavor),
        };
        self.define(name, operator, value)
    }

    /// Append to `name` the way `+=` does.
    pub fn append(&self, name: &str, value: impl IntoMakeValue) -> Result<(), BridgeError> {
        check_name(name)?;
        self.define(name, "+=", value)
    }

    pub fn undefine(&self, name: &str) -> Result<(), BridgeError> {
        check_name(name)?;
        self.bridge.evaluate(&format!("undefine {name}"))
    }

    pub fn origin(&self, name: &str) -> Result<Origin, BridgeError> {
        check_name(name)?;
        self.bridge.expand(&format!("$(origin {name})"))?.parse()
    }

    pub fn flavor(&self, name: &str) -> Result<Flavor, BridgeError> {
        check_name(name)?;
        self.bridge.expand(&format!("$(flavor {name})"))?.parse()
    }

    pub fn defined(&self, name: &str) -> Result<bool, BridgeError> {
        Ok(self.origin(name)? != Origin::Undefined)
    }

    fn define(&self, name: &str, operator: &str, value: impl IntoMakeValue) -> Result<(), BridgeError> {
        let value = codec::to_make_string(value.into_make_value());
        self.bridge.evaluate(&format!(
            "define {name} {operator}\n{}\nendef",
            escape::escape(&value)
        ))
    }
}

fn check_name(name: &str) -> Result<(), BridgeError> {
    if is_legal_name(name) {
        Ok(())
    } else {
        Err(BridgeError::IllegalVariableName(name.to_owned()))
    }
}

#[cfg(test)]
#[path = "variables_test.rs"]
mod variables_test;
