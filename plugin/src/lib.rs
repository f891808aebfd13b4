//! GNU make plugin.
//!
//! Build the `cdylib` and load it from a makefile:
//!
//! ```make
//! LUA_PATH := $(CURDIR)/lua/?.lua
//! load libgnumake_plugin.so(gnumake_gmk_setup)
//!
//! $(info $(strupper hello) $(lua-eval 6 * 7))
//! ```
//!
//! Loading resolves make's `gmk_*` API in the running program, builds the
//! [`Bridge`], exports the string library and installs the Lua runtime.
//! make runs build scripts on a single thread, so the loaded plugin lives in
//! a thread-local cell that the dispatcher reads on every call.

use std::ffi::{CStr, c_char, c_int, c_uint};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::Rc;

use gnumake_core::stdlib::register_stdlib;
use gnumake_core::{Bridge, BridgeOptions, EngineBuffer};
use gnumake_lua::LuaRuntime;
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;
use tracing::{debug, info};

pub mod api;
pub mod config;
mod error;

pub use api::{GmkApi, GmkFloc};
pub use config::PluginConfig;
pub use error::PluginError;

/// Required by make before it runs the setup function.
#[allow(non_upper_case_globals)]
#[unsafe(no_mangle)]
pub static plugin_is_GPL_compatible: c_int = 0;

thread_local! {
    static PLUGIN: OnceCell<Plugin> = const { OnceCell::new() };
}

/// Everything the loaded object keeps alive.
#[derive(Debug)]
pub struct Plugin {
    bridge: Rc<Bridge>,
    lua: LuaRuntime,
}

impl Plugin {
    /// Configure `bridge` from the build script and export every function.
    pub fn with_bridge(bridge: Rc<Bridge>) -> Result<Self, PluginError> {
        let config = PluginConfig::from_bridge(&bridge)?;
        config.init_logging();

        register_stdlib(&bridge)?;
        let lua = LuaRuntime::install(&bridge, config.lua)?;

        info!(functions = bridge.function_names().len(), "gnumake plugin ready");
        Ok(Self { bridge, lua })
    }

    pub fn bridge(&self) -> &Rc<Bridge> {
        &self.bridge
    }

    pub fn lua(&self) -> &LuaRuntime {
        &self.lua
    }

    /// Make `self` the plugin the dispatcher uses on this thread.
    ///
    /// Returns `false`, dropping `self`, when a plugin is already installed.
    pub fn install(self) -> bool {
        PLUGIN.with(|cell| cell.set(self).is_ok())
    }

    /// Whether a plugin is installed on this thread.
    pub fn is_installed() -> bool {
        PLUGIN.with(|cell| cell.get().is_some())
    }
}

/// Entry point make calls after `load`.
///
/// Returns 1 on success and 0 on failure, after printing the reason.
#[unsafe(no_mangle)]
pub extern "C" fn gnumake_gmk_setup(_floc: *const GmkFloc) -> c_int {
    if Plugin::is_installed() {
        return 1;
    }

    match panic::catch_unwind(setup) {
        Ok(Ok(())) => 1,
        Ok(Err(err)) => {
            eprintln!("gnumake: {err}");
            0
        }
        Err(_) => {
            eprintln!("gnumake: setup panicked");
            0
        }
    }
}

fn setup() -> Result<(), PluginError> {
    let api = GmkApi::load(dispatch)?;
    let bridge = Rc::new(Bridge::new(api, BridgeOptions::default()));
    let plugin = Plugin::with_bridge(bridge)?;
    if !plugin.install() {
        debug!("plugin set up twice, keeping the first");
    }
    Ok(())
}

/// The function make calls for every exported name.
///
/// # Safety
///
/// `name` and the first `argc` entries of `argv` must be NUL-terminated
/// strings, as make guarantees.
pub unsafe extern "C" fn dispatch(
    name: *const c_char,
    argc: c_uint,
    argv: *mut *mut c_char,
) -> *mut c_char {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: see the function contract.
        let name = unsafe { CStr::from_ptr(name) };
        let args: SmallVec<[&CStr; 4]> = (0..argc as usize)
            .map(|i| unsafe { CStr::from_ptr(*argv.add(i)) })
            .collect();

        PLUGIN.with(|cell| match cell.get() {
            Some(plugin) => plugin
                .bridge
                .dispatch(name, &args)
                .map_or(ptr::null_mut(), EngineBuffer::into_raw),
            None => ptr::null_mut(),
        })
    }));
    outcome.unwrap_or(ptr::null_mut())
}
