use gnumake_core::{BridgeError, RegistrationError};
use gnumake_lua::LuaError;
use thiserror::Error;

/// Reasons the plugin cannot start.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{name} not found; load this object from GNU make 4.0 or later ({source})")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Lua(#[from] LuaError),
}
