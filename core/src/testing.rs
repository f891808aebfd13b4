//! An in-process stand-in for GNU make.
//!
//! [`FakeEngine`] implements [`Engine`] with enough of make's language to
//! exercise the bridge end to end:
//!
//! - assignments with `=`, `:=`, `::=`, `+=` and `?=`, plus `define`/`endef`
//!   blocks (nested blocks included) and `undefine`
//! - backslash-newline joining, both outside and inside `define` blocks
//! - `$$`, `$X`, `$(X)`, `${X}` and computed names such as `$($(X))`
//! - the `value`, `origin`, `flavor`, `error` and `info` functions
//! - functions registered with `add_function`: top-level comma splitting,
//!   the argument-count check, argument expansion per [`ExpandPolicy`], and
//!   calls into an attached [`FunctionHost`] (re-entrantly)
//!
//! Like make, a fatal error stops all further evaluation. The engine also
//! tracks every buffer it allocates so tests can check that nothing leaks
//! and nothing is freed twice.

use core::ffi::{CStr, c_char};
use core::ptr::NonNull;
use std::cell::{Cell, RefCell};
use std::ffi::CString;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use tracing::debug;

use crate::bridge::{Bridge, BridgeOptions};
use crate::engine::{Engine, EngineBuffer, ExpandPolicy, FunctionHost};
use crate::variables::{Flavor, Origin};

const MAX_EXPANSION_DEPTH: usize = 200;

#[derive(Debug, Clone)]
struct Variable {
    value: String,
    flavor: Flavor,
    origin: Origin,
}

/// A function as the engine recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeFunction {
    pub min_args: u8,
    pub max_args: u8,
    pub policy: ExpandPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assign {
    Recursive,
    Simple,
    Append,
    Conditional,
}

/// See the [module documentation](self).
#[derive(Default)]
pub struct FakeEngine {
    variables: RefCell<HashMap<String, Variable>>,
    functions: RefCell<HashMap<String, FakeFunction>>,
    host: RefCell<Option<Weak<dyn FunctionHost>>>,
    allocations: RefCell<HashMap<usize, usize>>,
    fatal: RefCell<Option<String>>,
    info: RefCell<Vec<String>>,
    dispatches: Cell<usize>,
}

impl FakeEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A fresh engine with a [`Bridge`] attached as its function host.
    pub fn with_bridge(options: BridgeOptions) -> (Rc<Self>, Rc<Bridge>) {
        let engine = Self::new();
        let bridge = Rc::new(Bridge::new(Rc::clone(&engine), options));
        let host: Rc<dyn FunctionHost> = bridge.clone();
        engine.attach(Rc::downgrade(&host));
        (engine, bridge)
    }

    /// Route calls of registered functions to `host`.
    pub fn attach(&self, host: Weak<dyn FunctionHost>) {
        *self.host.borrow_mut() = Some(host);
    }

    /// Evaluate makefile text.
    pub fn run(&self, text: &str) {
        if !self.stopped() {
            self.eval_text(text);
        }
    }

    /// Expand text without going through an engine buffer.
    pub fn expand_str(&self, text: &str) -> String {
        self.expand_text(text)
    }

    /// The raw value of `name`, if defined.
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.borrow().get(name).map(|v| v.value.clone())
    }

    /// Define a recursive variable with a given origin, as the command line
    /// or the environment would.
    pub fn define_variable(&self, name: &str, value: &str, origin: Origin) {
        self.variables.borrow_mut().insert(
            name.to_owned(),
            Variable {
                value: value.to_owned(),
                flavor: Flavor::Recursive,
                origin,
            },
        );
    }

    pub fn function(&self, name: &str) -> Option<FakeFunction> {
        self.functions.borrow().get(name).copied()
    }

    /// The message of the fatal error that stopped the engine, if any.
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal.borrow().clone()
    }

    /// Clear the fatal error so evaluation can continue.
    pub fn take_fatal_error(&self) -> Option<String> {
        self.fatal.borrow_mut().take()
    }

    /// Lines printed with `$(info ...)`.
    pub fn info_output(&self) -> Vec<String> {
        self.info.borrow().clone()
    }

    /// Buffers allocated and not yet freed.
    pub fn live_allocations(&self) -> usize {
        self.allocations.borrow().len()
    }

    /// How many calls were handed to the function host.
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.get()
    }

    fn stopped(&self) -> bool {
        self.fatal.borrow().is_some()
    }

    fn fail(&self, message: &str) {
        let mut fatal = self.fatal.borrow_mut();
        if fatal.is_none() {
            debug!(message, "fake make stopped");
            *fatal = Some(message.to_owned());
        }
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    fn eval_text(&self, text: &str) {
        let mut lines = text.split('\n');

        while let Some(first) = lines.next() {
            if self.stopped() {
                return;
            }
            let line = join_continuations(first, &mut lines);
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = directive(line, "define") {
                let Some(body) = read_define_body(&mut lines) else {
                    self.fail("missing 'endef', unterminated 'define'");
                    return;
                };
                let (name, op) = parse_define_header(header);
                let name = self.expand_text(name);
                self.assign(name.trim(), op, body);
            } else if let Some(rest) = directive(line, "undefine") {
                let name = self.expand_text(rest);
                self.undefine(name.trim());
            } else if let Some((name, op, value)) = split_assignment(line) {
                let name = self.expand_text(name);
                self.assign(name.trim(), op, value.trim_start().to_owned());
            } else {
                let residue = self.expand_text(line);
                if !residue.trim().is_empty() {
                    self.fail("missing separator");
                }
            }
        }
    }

    fn assign(&self, name: &str, op: Assign, value: String) {
        if name.is_empty() {
            self.fail("empty variable name");
            return;
        }

        let existing = self.variables.borrow().get(name).cloned();
        if existing
            .as_ref()
            .is_some_and(|v| v.origin == Origin::CommandLine)
        {
            debug!(name, "assignment to a command line variable ignored");
            return;
        }

        let variable = match (op, existing) {
            (Assign::Recursive, _) | (Assign::Append, None) | (Assign::Conditional, None) => {
                Variable {
                    value,
                    flavor: Flavor::Recursive,
                    origin: Origin::File,
                }
            }
            (Assign::Simple, _) => Variable {
                value: self.expand_text(&value),
                flavor: Flavor::Simple,
                origin: Origin::File,
            },
            (Assign::Conditional, Some(_)) => return,
            (Assign::Append, Some(old)) => {
                let addition = match old.flavor {
                    Flavor::Simple => self.expand_text(&value),
                    _ => value,
                };
                let value = if old.value.is_empty() {
                    addition
                } else {
                    format!("{} {addition}", old.value)
                };
                Variable {
                    value,
                    flavor: old.flavor,
                    origin: Origin::File,
                }
            }
        };

        self.variables.borrow_mut().insert(name.to_owned(), variable);
    }

    fn undefine(&self, name: &str) {
        let mut variables = self.variables.borrow_mut();
        if variables
            .get(name)
            .is_some_and(|v| v.origin != Origin::CommandLine)
        {
            variables.remove(name);
        }
    }

    // ========================================================================
    // Expansion
    // ========================================================================

    fn expand_text(&self, text: &str) -> String {
        self.expand_depth(text, 0)
    }

    fn expand_depth(&self, text: &str, depth: usize) -> String {
        if depth > MAX_EXPANSION_DEPTH {
            self.fail("recursive variable references itself (eventually)");
            return String::new();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if self.stopped() {
                return String::new();
            }
            if c != '$' {
                out.push(c);
                rest = &rest[c.len_utf8()..];
                continue;
            }

            let after = &rest[1..];
            match after.chars().next() {
                None => rest = after,
                Some('$') => {
                    out.push('$');
                    rest = &after[1..];
                }
                Some(open @ ('(' | '{')) => {
                    let close = if open == '(' { ')' } else { '}' };
                    let Some(end) = find_closing(&after[1..], open, close) else {
                        self.fail("unterminated variable reference");
                        return String::new();
                    };
                    let inner = &after[1..1 + end];
                    out.push_str(&self.expand_reference(inner, depth));
                    rest = &after[2 + end..];
                }
                Some(name) => {
                    let len = name.len_utf8();
                    out.push_str(&self.variable_value(&after[..len], depth));
                    rest = &after[len..];
                }
            }
        }

        out
    }

    fn expand_reference(&self, inner: &str, depth: usize) -> String {
        let (head, args) = match inner.find([' ', '\t']) {
            Some(i) => (&inner[..i], Some(inner[i..].trim_start_matches([' ', '\t']))),
            None => (inner, None),
        };

        match (head, args) {
            ("value", Some(arg)) => {
                let name = self.expand_depth(arg, depth + 1);
                self.variable(name.trim()).unwrap_or_default()
            }
            ("origin", Some(arg)) => {
                let name = self.expand_depth(arg, depth + 1);
                let origin = self.variables.borrow().get(name.trim()).map(|v| v.origin);
                origin.unwrap_or(Origin::Undefined).as_str().to_owned()
            }
            ("flavor", Some(arg)) => {
                let name = self.expand_depth(arg, depth + 1);
                let flavor = self.variables.borrow().get(name.trim()).map(|v| v.flavor);
                flavor.unwrap_or(Flavor::Undefined).as_str().to_owned()
            }
            ("error", Some(arg)) => {
                let message = self.expand_depth(arg, depth + 1);
                self.fail(&message);
                String::new()
            }
            ("info", Some(arg)) => {
                let message = self.expand_depth(arg, depth + 1);
                self.info.borrow_mut().push(message);
                String::new()
            }
            _ => match self.function(head) {
                Some(function) => self.call_function(head, function, args, depth),
                None => {
                    let name = self.expand_depth(inner, depth + 1);
                    self.variable_value(&name, depth)
                }
            },
        }
    }

    fn variable_value(&self, name: &str, depth: usize) -> String {
        let variable = self.variables.borrow().get(name).cloned();
        match variable {
            Some(Variable {
                value,
                flavor: Flavor::Recursive,
                ..
            }) => self.expand_depth(&value, depth + 1),
            Some(variable) => variable.value,
            None => String::new(),
        }
    }

    fn call_function(
        &self,
        name: &str,
        function: FakeFunction,
        args: Option<&str>,
        depth: usize,
    ) -> String {
        let raw_args = args.map_or_else(Vec::new, |args| split_args(args, function.max_args));
        if raw_args.len() < usize::from(function.min_args) {
            self.fail(&format!(
                "insufficient number of arguments ({}) to function '{name}'",
                raw_args.len()
            ));
            return String::new();
        }

        let args: Vec<String> = match function.policy {
            ExpandPolicy::ExpandArgs => raw_args
                .iter()
                .map(|arg| self.expand_depth(arg, depth + 1))
                .collect(),
            ExpandPolicy::VerbatimArgs => raw_args.iter().map(|arg| (*arg).to_owned()).collect(),
        };
        if self.stopped() {
            return String::new();
        }

        let Some(host) = self.host.borrow().as_ref().and_then(Weak::upgrade) else {
            self.fail(&format!("no host for function '{name}'"));
            return String::new();
        };

        let c_name = CString::new(name).unwrap_or_default();
        let c_args: Vec<CString> = args
            .into_iter()
            .map(|arg| CString::new(arg).unwrap_or_default())
            .collect();
        let argv: Vec<&CStr> = c_args.iter().map(CString::as_c_str).collect();

        self.dispatches.set(self.dispatches.get() + 1);
        host.call(&c_name, &argv)
            .map(|buffer| String::from_utf8_lossy(buffer.as_bytes()).into_owned())
            .unwrap_or_default()
    }
}

impl Engine for FakeEngine {
    fn add_function(&self, name: &CStr, min_args: u8, max_args: u8, policy: ExpandPolicy) {
        let name = name.to_string_lossy();
        if name.len() > 255 {
            self.fail("function name too long");
            return;
        }
        if max_args != 0 && max_args < min_args {
            self.fail("invalid maximum argument count");
            return;
        }
        self.functions.borrow_mut().insert(
            name.into_owned(),
            FakeFunction {
                min_args,
                max_args,
                policy,
            },
        );
    }

    fn alloc(&self, len: usize) -> Option<NonNull<c_char>> {
        let buffer = vec![0_u8; len.max(1)].into_boxed_slice();
        let len = buffer.len();
        let ptr = NonNull::new(Box::into_raw(buffer).cast::<c_char>())?;
        self.allocations
            .borrow_mut()
            .insert(ptr.as_ptr() as usize, len);
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<c_char>) {
        let len = self.allocations.borrow_mut().remove(&(ptr.as_ptr() as usize));
        let Some(len) = len else {
            self.fail("free of a buffer make did not allocate");
            return;
        };
        let slice = core::ptr::slice_from_raw_parts_mut(ptr.as_ptr().cast::<u8>(), len);
        // SAFETY: `slice` is exactly the boxed slice leaked by `alloc`.
        drop(unsafe { Box::from_raw(slice) });
    }

    fn eval(&self, text: &CStr) {
        self.run(&text.to_string_lossy());
    }

    fn expand(&self, text: &CStr) -> Option<NonNull<c_char>> {
        let expanded = self.expand_text(&text.to_string_lossy());
        let buffer = EngineBuffer::copy_from(self, expanded.as_bytes())?;
        NonNull::new(buffer.into_raw())
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        for (addr, len) in self.allocations.get_mut().drain() {
            let slice = core::ptr::slice_from_raw_parts_mut(addr as *mut u8, len);
            // SAFETY: every tracked allocation is a boxed slice leaked by `alloc`.
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}

// ============================================================================
// Line-level parsing
// ============================================================================

/// `Some(rest)` if `line` starts with the directive `word`.
fn directive<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '#' => Some(rest.trim_start()),
        Some(_) => None,
    }
}

fn join_continuations<'a>(first: &'a str, lines: &mut impl Iterator<Item = &'a str>) -> String {
    let mut line = first.to_owned();
    while let Some(stripped) = line.strip_suffix('\\') {
        match lines.next() {
            Some(next) => line = format!("{} {}", stripped.trim_end(), next.trim_start()),
            None => {
                line = stripped.to_owned();
                break;
            }
        }
    }
    line
}

fn read_define_body<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Option<String> {
    let mut body = Vec::new();
    let mut nested = 0_usize;

    while let Some(first) = lines.next() {
        let line = join_continuations(first, lines);
        let trimmed = line.trim();
        if directive(trimmed, "endef").is_some() {
            if nested == 0 {
                return Some(body.join("\n"));
            }
            nested -= 1;
        } else if directive(trimmed, "define").is_some() {
            nested += 1;
        }
        body.push(line);
    }

    None
}

fn parse_define_header(header: &str) -> (&str, Assign) {
    let header = header.trim();
    let operators = [
        ("::=", Assign::Simple),
        (":=", Assign::Simple),
        ("+=", Assign::Append),
        ("?=", Assign::Conditional),
        ("=", Assign::Recursive),
    ];
    for (operator, op) in operators {
        if let Some(name) = header.strip_suffix(operator) {
            return (name.trim_end(), op);
        }
    }
    (header, Assign::Recursive)
}

fn split_assignment(line: &str) -> Option<(&str, Assign, &str)> {
    let mut depth = 0_usize;

    for (i, c) in line.char_indices() {
        match c {
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => {
                let before = &line[..i];
                let (name, op) = if let Some(name) = before.strip_suffix("::") {
                    (name, Assign::Simple)
                } else if let Some(name) = before.strip_suffix(':') {
                    (name, Assign::Simple)
                } else if let Some(name) = before.strip_suffix('+') {
                    (name, Assign::Append)
                } else if let Some(name) = before.strip_suffix('?') {
                    (name, Assign::Conditional)
                } else {
                    (before, Assign::Recursive)
                };
                let name = name.trim();
                return (!name.is_empty()).then_some((name, op, &line[i + 1..]));
            }
            ':' if depth == 0 => {
                let next = &line[i + 1..];
                if !next.starts_with('=') && !next.starts_with(":=") {
                    return None;
                }
            }
            _ => {}
        }
    }

    None
}

/// Byte offset of the `close` matching an already consumed `open`.
fn find_closing(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0_usize;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

/// Split at top-level commas. With a bounded `max_args` the last argument
/// keeps any further commas.
fn split_args(text: &str, max_args: u8) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 && (max_args == 0 || args.len() + 1 < usize::from(max_args)) => {
                args.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&text[start..]);
    args
}

#[cfg(test)]
#[path = "testing_test.rs"]
mod testing_test;
