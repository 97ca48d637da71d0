//! Engine configuration.
//!
//! Loadable from JSON; every field has a default, so partial documents work:
//!
//! ```
//! use arduino2j::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{
//!     "byte_timeout_ms": 250,
//!     "features": { "echo": false },
//!     "properties": [["BOARD", "mega2560"], ["FW", "1.4"]]
//! }"#).unwrap();
//!
//! assert_eq!(config.byte_timeout().as_millis(), 250);
//! assert!(!config.features.echo);
//! assert!(config.features.many);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default per-byte timeout in milliseconds.
pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 100;

/// Default sleep between idle polls in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Built-in handlers and paths that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Register the name-mapping query and keep the name table.
    pub mapping: bool,
    /// Register the Many dispatcher.
    pub many: bool,
    /// Register the property-table query (needs `many`).
    pub properties: bool,
    /// Register the echo handlers.
    pub echo: bool,
    /// Allow server-initiated frames.
    pub sif: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            mapping: true,
            many: true,
            properties: true,
            echo: true,
            sif: true,
        }
    }
}

impl Features {
    /// Everything off; only application handlers are registered.
    pub fn none() -> Self {
        Self {
            mapping: false,
            many: false,
            properties: false,
            echo: false,
            sif: false,
        }
    }
}

/// Configuration for the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum wait for each raw byte of a frame.
    pub byte_timeout_ms: u64,
    /// Service interval override for the transport's maintenance task.
    pub service_interval_ms: Option<u64>,
    /// Sleep between polls of the run loop when no frame is pending.
    pub poll_interval_ms: u64,
    /// Optional built-ins.
    pub features: Features,
    /// Static key/value properties served by the property query.
    pub properties: Vec<(String, String)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            byte_timeout_ms: DEFAULT_BYTE_TIMEOUT_MS,
            service_interval_ms: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            features: Features::default(),
            properties: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.features.properties && !config.features.many {
            tracing::warn!("Property query enabled without the Many dispatcher; it is unreachable");
        }
        Ok(config)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn byte_timeout(&self) -> Duration {
        Duration::from_millis(self.byte_timeout_ms)
    }

    #[inline]
    pub fn service_interval(&self) -> Option<Duration> {
        self.service_interval_ms.map(Duration::from_millis)
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::A2jError;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.byte_timeout(), Duration::from_millis(100));
        assert_eq!(config.service_interval(), None);
        assert_eq!(config.features, Features::default());
        assert!(config.properties.is_empty());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_features() {
        let config = EngineConfig::from_json(r#"{"features": {"sif": false}}"#).unwrap();
        assert!(!config.features.sif);
        assert!(config.features.mapping);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = EngineConfig::default();
        config.service_interval_ms = Some(30);
        config.properties.push(("KEY".to_string(), "VALUE".to_string()));

        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        let result = EngineConfig::from_json("{ not json");
        assert!(matches!(result, Err(A2jError::Json(_))));
    }
}
