//! # Lowering Configuration
//!
//! Switches that vary between compilations. Every field has a default so partial
//! configurations deserialize.

use cinder_compiler_semantic::ResolverOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringConfig {
    /// Consider extension `GetEnumerator` methods after the interface route
    pub extension_get_enumerator: bool,
    /// Let stack-only types use extension `Dispose` methods
    pub pattern_dispose_for_ref_like: bool,
    /// Run the `Validation` pass on every lowered function
    pub run_validation: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            extension_get_enumerator: true,
            pattern_dispose_for_ref_like: true,
            run_validation: true,
        }
    }
}

impl LoweringConfig {
    /// The protocol lookup switches this configuration implies
    pub const fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            extension_get_enumerator: self.extension_get_enumerator,
            pattern_dispose_for_ref_like: self.pattern_dispose_for_ref_like,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LoweringConfig =
            serde_json::from_str(r#"{ "extension_get_enumerator": false }"#).unwrap();
        assert!(!config.extension_get_enumerator);
        assert!(config.pattern_dispose_for_ref_like);
        assert!(config.run_validation);
        assert!(!config.resolver_options().extension_get_enumerator);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = LoweringConfig {
            run_validation: false,
            ..LoweringConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"extension_get_enumerator":true,"pattern_dispose_for_ref_like":true,"run_validation":false}"#
        );
    }
}
