//! The engine side of the bridge.
//!
//! GNU make exposes five C entry points to loaded objects (`gmk_add_function`,
//! `gmk_alloc`, `gmk_free`, `gmk_eval` and `gmk_expand`) and calls back into
//! the object through the function pointer handed to `gmk_add_function`.
//! [`Engine`] abstracts the former and [`FunctionHost`] the latter, so the rest
//! of the bridge never touches a raw symbol and can run against
//! [`FakeEngine`](crate::testing::FakeEngine) in tests.

use core::ffi::{CStr, c_char};
use core::fmt;
use core::ptr::NonNull;
use std::rc::Rc;

/// How the engine treats the arguments of an exported function.
///
/// The discriminant is the flag byte passed to `gmk_add_function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ExpandPolicy {
    /// Arguments are expanded by make before the call.
    #[default]
    ExpandArgs = 0x00,
    /// Arguments are passed verbatim, `$(references)` and all.
    VerbatimArgs = 0x01,
}

impl ExpandPolicy {
    pub const fn from_expand(expand: bool) -> Self {
        if expand {
            ExpandPolicy::ExpandArgs
        } else {
            ExpandPolicy::VerbatimArgs
        }
    }

    /// The ABI flag byte.
    pub const fn flags(self) -> u8 {
        self as u8
    }
}

/// The make entry points a loaded object may call.
///
/// Implementations must follow make's own contract: `eval` of malformed
/// syntax and a malformed `add_function` call terminate the process, so
/// callers validate everything before reaching this trait.
pub trait Engine {
    /// Install `name` as a make function dispatched to this object.
    ///
    /// `max_args == 0` means "any number of arguments".
    fn add_function(&self, name: &CStr, min_args: u8, max_args: u8, policy: ExpandPolicy);

    /// Allocate `len` bytes with make's allocator.
    fn alloc(&self, len: usize) -> Option<NonNull<c_char>>;

    /// Release a buffer allocated by make.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Engine::alloc`] or [`Engine::expand`] on this
    /// engine and must not be used, or freed again, afterwards.
    unsafe fn free(&self, ptr: NonNull<c_char>);

    /// Evaluate `text` as makefile syntax, like `$(eval ...)`.
    fn eval(&self, text: &CStr);

    /// Expand `text` and return a NUL-terminated buffer owned by the caller.
    fn expand(&self, text: &CStr) -> Option<NonNull<c_char>>;
}

impl<E: Engine + ?Sized> Engine for Rc<E> {
    fn add_function(&self, name: &CStr, min_args: u8, max_args: u8, policy: ExpandPolicy) {
        (**self).add_function(name, min_args, max_args, policy)
    }

    fn alloc(&self, len: usize) -> Option<NonNull<c_char>> {
        (**self).alloc(len)
    }

    unsafe fn free(&self, ptr: NonNull<c_char>) {
        unsafe { (**self).free(ptr) }
    }

    fn eval(&self, text: &CStr) {
        (**self).eval(text)
    }

    fn expand(&self, text: &CStr) -> Option<NonNull<c_char>> {
        (**self).expand(text)
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn add_function(&self, name: &CStr, min_args: u8, max_args: u8, policy: ExpandPolicy) {
        (**self).add_function(name, min_args, max_args, policy)
    }

    fn alloc(&self, len: usize) -> Option<NonNull<c_char>> {
        (**self).alloc(len)
    }

    unsafe fn free(&self, ptr: NonNull<c_char>) {
        unsafe { (**self).free(ptr) }
    }

    fn eval(&self, text: &CStr) {
        (**self).eval(text)
    }

    fn expand(&self, text: &CStr) -> Option<NonNull<c_char>> {
        (**self).expand(text)
    }
}

/// The object make calls into when a build script references an exported
/// function.
pub trait FunctionHost {
    /// Handle a call of `name` with the given arguments.
    ///
    /// `None` is "no value": make expands the reference to nothing.
    fn call(&self, name: &CStr, argv: &[&CStr]) -> Option<EngineBuffer<'_>>;
}

/// A NUL-terminated buffer allocated by the engine.
///
/// Dropping the buffer frees it through the engine. [`EngineBuffer::into_raw`]
/// hands ownership back to the engine instead, which is how results travel
/// out of the dispatcher.
pub struct EngineBuffer<'e> {
    engine: &'e dyn Engine,
    ptr: NonNull<c_char>,
}

impl<'e> EngineBuffer<'e> {
    /// Copy `bytes` into a fresh engine allocation and terminate it.
    ///
    /// Returns `None` if the engine cannot allocate.
    pub fn copy_from(engine: &'e dyn Engine, bytes: &[u8]) -> Option<Self> {
        let ptr = engine.alloc(bytes.len() + 1)?;
        // SAFETY: the engine handed out at least `bytes.len() + 1` writable bytes.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().cast::<u8>(), bytes.len());
            *ptr.as_ptr().add(bytes.len()) = 0;
        }
        Some(Self { engine, ptr })
    }

    /// Take ownership of a buffer the engine returned.
    ///
    /// # Safety
    ///
    /// `ptr` must be a NUL-terminated buffer allocated by `engine` that
    /// nobody else will free.
    pub unsafe fn from_raw(engine: &'e dyn Engine, ptr: NonNull<c_char>) -> Self {
        Self { engine, ptr }
    }

    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the buffer is NUL-terminated and alive while `self` is.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.as_c_str().to_bytes()
    }

    /// Give the buffer back to the engine without freeing it.
    pub fn into_raw(self) -> *mut c_char {
        let ptr = self.ptr.as_ptr();
        core::mem::forget(self);
        ptr
    }
}

impl Drop for EngineBuffer<'_> {
    fn drop(&mut self) {
        // SAFETY: the buffer came from this engine and is freed exactly once.
        unsafe { self.engine.free(self.ptr) }
    }
}

impl fmt::Debug for EngineBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineBuffer").field(&self.as_c_str()).finish()
    }
}
