//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PropError, Result};

/// Tunables for a [`PropTree`](crate::PropTree).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust,ignore
/// let config = EngineConfig::from_json(r#"{ "trace_dispatch": true }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the engine's global root, used as the first path segment.
    pub global_name: String,

    /// Thread name of the lazily created default courier.
    pub default_courier_name: String,

    /// Dispatches slower than this (microseconds) are logged at debug level.
    pub slow_dispatch_debug_us: u64,

    /// Dispatches slower than this (microseconds) are logged at info level.
    pub slow_dispatch_info_us: u64,

    /// Log every batch a courier dispatches.
    pub trace_dispatch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_name: "global".to_string(),
            default_courier_name: "prop-dispatch".to_string(),
            slow_dispatch_debug_us: 10_000,
            slow_dispatch_info_us: 100_000,
            trace_dispatch: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.global_name.is_empty() {
            return Err(PropError::Config("global_name must not be empty".into()));
        }
        if self.global_name.contains('.') {
            return Err(PropError::Config("global_name must not contain '.'".into()));
        }
        if self.slow_dispatch_info_us < self.slow_dispatch_debug_us {
            return Err(PropError::Config(
                "slow_dispatch_info_us must be >= slow_dispatch_debug_us".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "trace_dispatch": true }"#).unwrap();
        assert!(config.trace_dispatch);
        assert_eq!(config.global_name, "global");
        assert_eq!(config.slow_dispatch_debug_us, 10_000);
    }

    #[test]
    fn dotted_global_name_is_rejected() {
        let err = EngineConfig::from_json(r#"{ "global_name": "a.b" }"#).unwrap_err();
        assert!(matches!(err, PropError::Config(_)));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = EngineConfig::from_json(
            r#"{ "slow_dispatch_debug_us": 500, "slow_dispatch_info_us": 10 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PropError::Config(_)));
    }
}
