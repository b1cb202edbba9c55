//! Configuration module for Faultline
//!
//! Handles loading, validation, persistence, and hot-reloading of the
//! endpoint table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod store;
pub mod validation;
pub mod watcher;

pub use store::ConfigStore;
pub use watcher::spawn_config_watcher;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

/// The behavior bound to an endpoint path.
///
/// Unknown `type` tags fail deserialization, which the control plane
/// reports as a 400.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndpointConfig {
    Error {
        status_code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Delay {
        delay_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
    ConditionalError {
        error_every_n: u64,
        status_code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success_response: Option<Value>,
    },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Seed configuration written when no config file exists yet.
    pub fn default_config() -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            "/api/error".to_string(),
            EndpointConfig::Error {
                status_code: 500,
                message: Some("Internal Server Error".to_string()),
            },
        );
        endpoints.insert(
            "/api/delay".to_string(),
            EndpointConfig::Delay {
                delay_ms: 2000,
                response: None,
            },
        );
        endpoints.insert(
            "/api/flaky".to_string(),
            EndpointConfig::ConditionalError {
                error_every_n: 3,
                status_code: 500,
                success_response: None,
            },
        );

        Self {
            server: ServerConfig::default(),
            endpoints,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    "./static".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_tag_roundtrip() {
        let endpoint = EndpointConfig::ConditionalError {
            error_every_n: 3,
            status_code: 503,
            success_response: Some(json!({"ok": true})),
        };

        let encoded = serde_json::to_value(&endpoint).unwrap();
        assert_eq!(encoded["type"], "conditional_error");
        assert_eq!(encoded["error_every_n"], 3);

        let decoded: EndpointConfig = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, endpoint);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let raw = json!({"type": "teapot", "status_code": 418});
        assert!(serde_json::from_value::<EndpointConfig>(raw).is_err());
    }

    #[test]
    fn test_absent_optionals_not_serialized() {
        let endpoint = EndpointConfig::Error {
            status_code: 500,
            message: None,
        };

        let encoded = serde_json::to_value(&endpoint).unwrap();
        assert!(encoded.get("message").is_none());
    }

    #[test]
    fn test_default_config_seeds() {
        let config = Config::default_config();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.endpoints.len(), 3);
        assert!(config.endpoints.contains_key("/api/error"));
        assert!(config.endpoints.contains_key("/api/delay"));
        assert!(config.endpoints.contains_key("/api/flaky"));
    }

    #[test]
    fn test_endpoint_table_display_order_is_lexicographic() {
        let mut config = Config::default();
        config.endpoints.insert("/b".into(), EndpointConfig::Delay { delay_ms: 0, response: None });
        config.endpoints.insert("/a".into(), EndpointConfig::Delay { delay_ms: 0, response: None });

        let encoded = serde_json::to_string(&config).unwrap();
        assert!(encoded.find("/a").unwrap() < encoded.find("/b").unwrap());
    }
}
