//! Settings read from the build script when the plugin is loaded.
//!
//! | variable      | effect                                             |
//! |---------------|----------------------------------------------------|
//! | `GNUMAKE_LOG` | log filter, e.g. `debug` or `gnumake_core=trace`   |
//! | `LUA_PATH`    | prepended to `package.path`                        |
//! | `LUA_CPATH`   | prepended to `package.cpath`                       |
//!
//! `GNUMAKE_LOG` is read from the environment first and then from make, so
//! `GNUMAKE_LOG=debug make` works without editing the makefile. The Lua paths
//! are make variables; set them before the `load` line.

use gnumake_core::{Bridge, BridgeError};
use gnumake_lua::LuaOptions;
use tracing_subscriber::EnvFilter;

pub const LOG_VARIABLE: &str = "GNUMAKE_LOG";
pub const LUA_PATH_VARIABLE: &str = "LUA_PATH";
pub const LUA_CPATH_VARIABLE: &str = "LUA_CPATH";

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginConfig {
    pub log_filter: Option<String>,
    pub lua: LuaOptions,
}

impl PluginConfig {
    pub fn from_bridge(bridge: &Bridge) -> Result<Self, BridgeError> {
        let vars = bridge.variables();
        let non_empty = |value: String| (!value.trim().is_empty()).then_some(value);

        let log_filter = match std::env::var(LOG_VARIABLE).ok().and_then(non_empty) {
            Some(filter) => Some(filter),
            None => non_empty(vars.get(LOG_VARIABLE, "", true)?),
        };

        let mut lua = LuaOptions::default();
        lua.package_path = non_empty(vars.get(LUA_PATH_VARIABLE, "", true)?);
        lua.package_cpath = non_empty(vars.get(LUA_CPATH_VARIABLE, "", true)?);

        Ok(Self { log_filter, lua })
    }

    /// Install the stderr logger. A second call keeps the first logger.
    pub fn init_logging(&self) {
        let filter = self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
        let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
            eprintln!("gnumake: ignoring {LOG_VARIABLE}={filter:?}: {err}");
            EnvFilter::new(DEFAULT_LOG_FILTER)
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    }
}
