//! Standard library of make functions
//!
//! Functions exported through the same registration API as any host
//! callable:
//! - strings: `str*` string manipulation (`strlen`, `strsplit`, `strindex`, ...)
//!
//! Each package is a module of `#[make_fn]` functions with a generated
//! `register` function, built with `#[make_package]`.

use crate::bridge::Bridge;
use crate::error::RegistrationError;

pub mod strings;

// Re-export for convenience
pub use strings::strings::{FUNCTION_NAMES as STRING_FUNCTIONS, register as register_strings};

/// Export every standard library package.
pub fn register_stdlib(bridge: &Bridge) -> Result<(), RegistrationError> {
    register_strings(bridge)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeOptions;
    use crate::testing::FakeEngine;

    #[test]
    fn test_register_stdlib() {
        let (engine, bridge) = FakeEngine::with_bridge(BridgeOptions::default());
        register_stdlib(&bridge).unwrap();

        for name in STRING_FUNCTIONS {
            assert!(bridge.is_registered(name), "{name} missing");
        }
        assert_eq!(engine.fatal_error(), None);
    }
}
