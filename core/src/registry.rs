//! Exported functions.
//!
//! A [`Callable`] is anything the dispatcher can invoke with decoded
//! arguments. The [`Registry`] maps make function names to callables, their
//! validated [`Arity`] and [`ExpandPolicy`]. Names and ranges are checked
//! here, before the engine sees them, because the engine aborts the whole
//! make process on a bad registration.

use std::ffi::{CStr, CString};
use std::rc::Rc;

use hashbrown::HashMap;

use crate::arity::{Arity, Signature, resolve_arity};
use crate::bridge::{Bridge, CallContext};
use crate::codec::MakeValue;
use crate::engine::ExpandPolicy;
use crate::error::{CallError, RegistrationError};

/// The longest function name the engine accepts, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// A function callable from make.
///
/// `args` has already been decoded; its length is within the registered
/// [`Arity`] because the engine checks the count before dispatching.
pub trait Callable {
    fn call(&self, ctx: &CallContext<'_>, args: &[String]) -> Result<MakeValue, CallError>;
}

impl<F> Callable for F
where
    F: Fn(&CallContext<'_>, &[String]) -> Result<MakeValue, CallError>,
{
    fn call(&self, ctx: &CallContext<'_>, args: &[String]) -> Result<MakeValue, CallError> {
        self(ctx, args)
    }
}

/// A callable that knows its own name and signature.
///
/// Implemented by the structs `#[make_fn]` generates, so a whole function
/// can be exported with [`Bridge::export`].
pub trait MakeFunction: Callable + 'static {
    /// The make-visible name.
    fn name(&self) -> &'static str;

    fn signature(&self) -> Signature;

    fn policy(&self) -> ExpandPolicy {
        ExpandPolicy::ExpandArgs
    }

    fn arity(&self) -> Result<Arity, RegistrationError> {
        resolve_arity(None, None, Some(&self.signature()))
    }

    fn export(self, bridge: &Bridge) -> Result<(), RegistrationError>
    where
        Self: Sized,
    {
        bridge.export(self)
    }
}

/// A function name the engine will accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionName {
    name: String,
    c_name: CString,
}

impl FunctionName {
    pub fn new(name: &str) -> Result<Self, RegistrationError> {
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(RegistrationError::NameTooLong(name.len()));
        }
        if let Some(ch) = name.chars().find(|&c| !is_name_char(c)) {
            return Err(RegistrationError::IllegalNameChar {
                name: name.to_owned(),
                ch,
            });
        }
        // No NUL can get past `is_name_char`.
        let c_name = CString::new(name).map_err(|_| RegistrationError::IllegalNameChar {
            name: name.to_owned(),
            ch: '\0',
        })?;

        Ok(Self {
            name: name.to_owned(),
            c_name,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.c_name
    }
}

fn is_name_char(c: char) -> bool {
    !c.is_control() && !c.is_whitespace() && !matches!(c, '$' | '(' | ')' | '{' | '}' | ',')
}

/// One entry of the [`Registry`]. Cloning shares the callable.
#[derive(Clone)]
pub struct RegisteredFunction {
    name: FunctionName,
    callable: Rc<dyn Callable>,
    arity: Arity,
    policy: ExpandPolicy,
}

impl RegisteredFunction {
    pub fn new(
        name: FunctionName,
        callable: Rc<dyn Callable>,
        arity: Arity,
        policy: ExpandPolicy,
    ) -> Self {
        Self {
            name,
            callable,
            arity,
            policy,
        }
    }

    pub fn name(&self) -> &FunctionName {
        &self.name
    }

    pub fn callable(&self) -> &Rc<dyn Callable> {
        &self.callable
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn policy(&self) -> ExpandPolicy {
        self.policy
    }
}

impl core::fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("name", &self.name.as_str())
            .field("arity", &self.arity)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Exported functions by name.
#[derive(Debug, Default)]
pub struct Registry {
    functions: HashMap<String, RegisteredFunction>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `function`, returning the entry it replaced.
    pub fn insert(&mut self, function: RegisteredFunction) -> Option<RegisteredFunction> {
        self.functions
            .insert(function.name().as_str().to_owned(), function)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
