//! make's loadable-object API, looked up in the running program.
//!
//! The plugin does not link against make. The `gmk_*` functions are
//! resolved from the executable that loaded us, which is only make when
//! the object is loaded with make's `load` directive.

use std::ffi::{CStr, c_char, c_uint, c_ulong, c_void};
use std::ptr::{self, NonNull};

use gnumake_core::{Engine, ExpandPolicy};
use libloading::os::unix::Library;
use static_assertions::{assert_eq_size, assert_impl_all};

use crate::error::PluginError;

/// `gmk_floc` from `gnumake.h`.
#[repr(C)]
#[derive(Debug)]
pub struct GmkFloc {
    pub filenm: *const c_char,
    pub lineno: c_ulong,
}

/// `gmk_func_ptr`: the signature of every function make dispatches to us.
pub type GmkFuncPtr =
    unsafe extern "C" fn(name: *const c_char, argc: c_uint, argv: *mut *mut c_char) -> *mut c_char;

type AddFunction = unsafe extern "C" fn(
    name: *const c_char,
    func: GmkFuncPtr,
    min_args: c_uint,
    max_args: c_uint,
    flags: c_uint,
);
type Alloc = unsafe extern "C" fn(len: c_uint) -> *mut c_char;
type Free = unsafe extern "C" fn(str: *mut c_char);
type Eval = unsafe extern "C" fn(buffer: *const c_char, floc: *const GmkFloc);
type Expand = unsafe extern "C" fn(str: *const c_char) -> *mut c_char;

assert_eq_size!(GmkFuncPtr, *const c_void);

/// The make API, as an [`Engine`].
pub struct GmkApi {
    // Keeps the symbols below valid.
    _program: Library,
    add_function: AddFunction,
    alloc: Alloc,
    free: Free,
    eval: Eval,
    expand: Expand,
    dispatcher: GmkFuncPtr,
}

assert_impl_all!(GmkApi: Engine);

impl GmkApi {
    /// Resolve the API in the running program. Every exported function is
    /// registered with `dispatcher` as its entry point.
    pub fn load(dispatcher: GmkFuncPtr) -> Result<Self, PluginError> {
        let program = Library::this();

        // SAFETY: the types are the declarations of gnumake.h; the pointers
        // stay valid as long as `program` is open.
        let (add_function, alloc, free, eval, expand) = unsafe {
            (
                symbol::<AddFunction>(&program, "gmk_add_function")?,
                symbol::<Alloc>(&program, "gmk_alloc")?,
                symbol::<Free>(&program, "gmk_free")?,
                symbol::<Eval>(&program, "gmk_eval")?,
                symbol::<Expand>(&program, "gmk_expand")?,
            )
        };

        Ok(Self {
            _program: program,
            add_function,
            alloc,
            free,
            eval,
            expand,
            dispatcher,
        })
    }
}

/// # Safety
///
/// `T` must be the type of the symbol called `name`.
unsafe fn symbol<T: Copy>(program: &Library, name: &'static str) -> Result<T, PluginError> {
    // SAFETY: guaranteed by the caller.
    let found = unsafe { program.get::<T>(name.as_bytes()) }
        .map_err(|source| PluginError::MissingSymbol { name, source })?;
    Ok(*found)
}

impl Engine for GmkApi {
    fn add_function(&self, name: &CStr, min_args: u8, max_args: u8, policy: ExpandPolicy) {
        // SAFETY: name is NUL-terminated and make copies it.
        unsafe {
            (self.add_function)(
                name.as_ptr(),
                self.dispatcher,
                min_args.into(),
                max_args.into(),
                policy.flags().into(),
            )
        }
    }

    fn alloc(&self, len: usize) -> Option<NonNull<c_char>> {
        let len = c_uint::try_from(len).ok()?;
        // SAFETY: gmk_alloc has no preconditions; it aborts on exhaustion.
        NonNull::new(unsafe { (self.alloc)(len) })
    }

    unsafe fn free(&self, ptr: NonNull<c_char>) {
        // SAFETY: the caller hands over a pointer make allocated.
        unsafe { (self.free)(ptr.as_ptr()) }
    }

    fn eval(&self, text: &CStr) {
        // SAFETY: text is NUL-terminated; a null floc means "no location".
        unsafe { (self.eval)(text.as_ptr(), ptr::null()) }
    }

    fn expand(&self, text: &CStr) -> Option<NonNull<c_char>> {
        // SAFETY: text is NUL-terminated; the result is ours to free.
        NonNull::new(unsafe { (self.expand)(text.as_ptr()) })
    }
}

impl std::fmt::Debug for GmkApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmkApi").finish_non_exhaustive()
    }
}
