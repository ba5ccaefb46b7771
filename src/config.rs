// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the registry submission client.
//!
//! Everything here is plain data supplied by the hosting application. The
//! library itself never reads the environment; see `main.rs` for the
//! environment overrides used by the `registry-submit` binary.

use crate::error::{ConfigError, GateError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registry endpoint and credentials
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Shared submission rate limit
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Check the values a coordinator would be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.limit == 0 {
            return Err(GateError::InvalidLimit.into());
        }
        if self.rate_limit.window_ms == 0 {
            return Err(GateError::InvalidWindow.into());
        }
        self.registry.endpoint()?;
        Ok(())
    }
}

/// Where and how documents are submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Scheme and host of the registry (default: https://example.ru)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the document creation endpoint
    #[serde(default = "default_create_path")]
    pub create_path: String,

    /// Bearer token sent with every submission
    #[serde(default)]
    pub token: String,

    /// Per-request timeout in milliseconds (default: 30000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Sliding-window limit: at most `limit` submissions per `window_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admissions per window (default: 10)
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Window length in milliseconds (default: 1000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_base_url() -> String {
    "https://example.ru".to_string()
}

fn default_create_path() -> String {
    "/api/v3/lk/documents/create".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_limit() -> u32 {
    10
}

fn default_window_ms() -> u64 {
    1000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            create_path: default_create_path(),
            token: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_ms: default_window_ms(),
        }
    }
}

impl RegistryConfig {
    /// Full URL of the document creation endpoint.
    ///
    /// `create_path` is appended to whatever path `base_url` already has,
    /// so a gateway prefix such as `https://host/gw` is kept.
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(self.create_path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Get the per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let config = RegistryConfig::default();
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "https://example.ru/api/v3/lk/documents/create"
        );
    }

    #[test]
    fn test_endpoint_rejects_bad_base() {
        let config = RegistryConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        for base_url in ["https://registry.test/gw", "https://registry.test/gw/"] {
            let config = RegistryConfig {
                base_url: base_url.to_string(),
                ..Default::default()
            };
            assert_eq!(
                config.endpoint().unwrap().as_str(),
                "https://registry.test/gw/api/v3/lk/documents/create"
            );
        }
    }

    #[test]
    fn test_endpoint_path_without_leading_slash() {
        let config = RegistryConfig {
            base_url: "https://registry.test".to_string(),
            create_path: "documents/create".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "https://registry.test/documents/create"
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.rate_limit.limit = 0;
        assert_eq!(config.validate(), Err(ConfigError::Gate(GateError::InvalidLimit)));

        let mut config = Config::default();
        config.rate_limit.window_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::Gate(GateError::InvalidWindow)));

        let mut config = Config::default();
        config.registry.base_url = "registry.test".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Endpoint(_))));
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: Config =
            serde_json::from_str(r#"{"rate_limit": {"limit": 3}}"#).unwrap();
        assert_eq!(config.rate_limit.limit, 3);
        assert_eq!(config.rate_limit.window_duration(), Duration::from_secs(1));
        assert_eq!(config.registry.create_path, "/api/v3/lk/documents/create");
        assert!(config.registry.token.is_empty());
    }
}
