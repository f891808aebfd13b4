//! Argument counts of exported functions.
//!
//! Make enforces a fixed `(min_args, max_args)` range per function, with
//! `max_args == 0` meaning unlimited. The range can be given explicitly or
//! inferred from a [`Signature`]: the kinds of parameters a callable
//! declares. [`resolve_arity`] combines both the way exports do.

use crate::error::RegistrationError;

/// The most arguments the engine can pass.
pub const MAX_ARGS: i64 = 255;

/// The kind of one declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Must be passed.
    Required,
    /// May be omitted.
    Optional,
    /// Collects every remaining argument.
    Rest,
    /// Cannot be passed positionally, so it never counts.
    KeywordOnly,
}

/// The declared parameters of a callable, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ParamKind>,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = ParamKind>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn infer(&self) -> InferredArity {
        infer(self)
    }
}

/// Argument counts read off a [`Signature`], before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferredArity {
    pub min: u32,
    /// `None` when a rest parameter accepts any number of arguments.
    pub max: Option<u32>,
}

/// Count required and positional parameters.
///
/// A rest parameter makes the maximum unlimited and ends the scan.
pub fn infer(signature: &Signature) -> InferredArity {
    let mut min = 0;
    let mut max = Some(0);

    for kind in signature.params() {
        match kind {
            ParamKind::Required => {
                min += 1;
                max = max.map(|n| n + 1);
            }
            ParamKind::Optional => max = max.map(|n| n + 1),
            ParamKind::Rest => {
                max = None;
                break;
            }
            ParamKind::KeywordOnly => {}
        }
    }

    InferredArity { min, max }
}

/// A validated argument range as the engine understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arity {
    min: u8,
    max: u8,
}

impl Arity {
    /// Validate an explicit range. `max_args == 0` means unlimited.
    ///
    /// A function must accept at least one argument.
    pub fn new(min_args: i64, max_args: i64) -> Result<Self, RegistrationError> {
        if min_args < 0 || max_args < 0 {
            return Err(RegistrationError::NegativeArgs { min_args, max_args });
        }
        if min_args > MAX_ARGS || max_args > MAX_ARGS {
            return Err(RegistrationError::TooManyArgs { min_args, max_args });
        }
        if max_args != 0 && max_args < min_args {
            return Err(RegistrationError::MaxLessThanMin { min_args, max_args });
        }
        if min_args == 0 {
            return Err(RegistrationError::MinArgsZero);
        }

        Ok(Self {
            min: min_args as u8,
            max: max_args as u8,
        })
    }

    pub fn exactly(count: u8) -> Result<Self, RegistrationError> {
        Self::new(count.into(), count.into())
    }

    pub fn at_least(count: u8) -> Result<Self, RegistrationError> {
        Self::new(count.into(), 0)
    }

    pub fn min_args(&self) -> u8 {
        self.min
    }

    /// `None` when unlimited.
    pub fn max_args(&self) -> Option<u8> {
        (self.max != 0).then_some(self.max)
    }

    /// The maximum as passed to the engine, `0` for unlimited.
    pub fn raw_max(&self) -> u8 {
        self.max
    }

    pub fn accepts(&self, argc: usize) -> bool {
        argc >= usize::from(self.min) && self.max_args().is_none_or(|max| argc <= usize::from(max))
    }
}

/// Work out the range of an export.
///
/// Explicit bounds win. A missing maximum is taken from the signature
/// (unlimited stays unlimited), and a signature without positional
/// parameters is rejected. A missing minimum is the number of required
/// parameters, raised to one.
pub fn resolve_arity(
    min_args: Option<i64>,
    max_args: Option<i64>,
    signature: Option<&Signature>,
) -> Result<Arity, RegistrationError> {
    let inferred = match (min_args, max_args) {
        (Some(_), Some(_)) => None,
        _ => Some(
            signature
                .ok_or(RegistrationError::UnknownSignature)?
                .infer(),
        ),
    };

    let max_args = match (max_args, inferred) {
        (Some(max), _) => max,
        (None, Some(InferredArity { max: Some(0), .. })) => {
            return Err(RegistrationError::NoParameters);
        }
        (None, Some(InferredArity { max: Some(max), .. })) => i64::from(max),
        (None, _) => 0,
    };

    let min_args = match (min_args, inferred) {
        (Some(min), _) => min,
        (None, Some(inferred)) => i64::from(inferred.min).max(1),
        (None, None) => 1,
    };

    Arity::new(min_args, max_args)
}

/// Extraction of one declared parameter from the decoded arguments.
///
/// `#[make_fn]` calls this once per parameter, and reads [`FromArg::KIND`]
/// to build the function's [`Signature`]. The engine has already checked
/// the argument count, so required parameters fall back to the empty string
/// only when the range was widened explicitly.
pub trait FromArg<'a>: Sized {
    const KIND: ParamKind;

    fn from_args(args: &'a [String], index: usize) -> Self;
}

impl<'a> FromArg<'a> for &'a str {
    const KIND: ParamKind = ParamKind::Required;

    fn from_args(args: &'a [String], index: usize) -> Self {
        args.get(index).map_or("", String::as_str)
    }
}

impl<'a> FromArg<'a> for String {
    const KIND: ParamKind = ParamKind::Required;

    fn from_args(args: &'a [String], index: usize) -> Self {
        args.get(index).cloned().unwrap_or_default()
    }
}

impl<'a> FromArg<'a> for Option<&'a str> {
    const KIND: ParamKind = ParamKind::Optional;

    fn from_args(args: &'a [String], index: usize) -> Self {
        args.get(index).map(String::as_str)
    }
}

impl<'a> FromArg<'a> for Option<String> {
    const KIND: ParamKind = ParamKind::Optional;

    fn from_args(args: &'a [String], index: usize) -> Self {
        args.get(index).cloned()
    }
}

impl<'a> FromArg<'a> for &'a [String] {
    const KIND: ParamKind = ParamKind::Rest;

    fn from_args(args: &'a [String], index: usize) -> Self {
        args.get(index..).unwrap_or_default()
    }
}

impl<'a> FromArg<'a> for Vec<String> {
    const KIND: ParamKind = ParamKind::Rest;

    fn from_args(args: &'a [String], index: usize) -> Self {
        args.get(index..).map(<[String]>::to_vec).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "arity_test.rs"]
mod arity_test;
