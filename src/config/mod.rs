//! Configuration for the three daemons.
//!
//! One TOML file carries a section per daemon plus `[logging]`. Every field
//! has a default, so an empty file (or none at all) yields a runnable local
//! setup. Configuration is immutable after load; rollup suffix regexes are
//! checked here so a bad rule is fatal at startup instead of a silent miss
//! at render time.

pub mod error;
pub mod logging;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Root configuration struct holding all sub-configurations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub relay: RelayConfig,
    pub proxy: ProxyConfig,
}

/// carbonapi gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen: String,
    pub prometheus_url: String,
    /// Cap on a single backend response body, in bytes.
    pub prometheus_max_body: usize,
    /// Ingest cadence in seconds; render steps are multiples of it.
    pub statsd_flush_interval: f64,
    /// Backstop timeout for backend calls, in seconds. Generous on
    /// purpose: cancellation normally comes from the client request.
    pub request_timeout_seconds: u64,
    pub default_rollup_func: String,
    pub rollups: Vec<RollupRuleConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            prometheus_url: "http://127.0.0.1:8428".to_string(),
            prometheus_max_body: 10 * 1024 * 1024,
            statsd_flush_interval: 10.0,
            request_timeout_seconds: 600,
            default_rollup_func: "avg_over_time".to_string(),
            rollups: Vec::new(),
        }
    }
}

/// One rollup rule: the first rule whose suffix matches a render target
/// picks the aggregation function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupRuleConfig {
    pub match_suffix: String,
    pub rollup_func: String,
}

/// Carbon ingest relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen: String,
    /// The backend's plaintext carbon ingest address.
    pub carbon_addr: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:2004".to_string(),
            carbon_addr: "127.0.0.1:2003".to_string(),
        }
    }
}

/// Prometheus query proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen: String,
    pub prometheus_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8481".to_string(),
            prometheus_url: "http://127.0.0.1:8428".to_string(),
            request_timeout_seconds: 600,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides. Invalid values are silently
    /// ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("CARBONGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CARBONGATE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(url) = std::env::var("CARBONGATE_PROMETHEUS_URL") {
            self.gateway.prometheus_url = url.clone();
            self.proxy.prometheus_url = url;
        }
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, listen) in [
            ("gateway.listen", &self.gateway.listen),
            ("relay.listen", &self.relay.listen),
            ("proxy.listen", &self.proxy.listen),
        ] {
            if listen.is_empty() {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "listen address cannot be empty".to_string(),
                });
            }
        }

        for (field, raw) in [
            ("gateway.prometheus_url", &self.gateway.prometheus_url),
            ("proxy.prometheus_url", &self.proxy.prometheus_url),
        ] {
            if let Err(e) = Url::parse(raw) {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: e.to_string(),
                });
            }
        }

        if self.relay.carbon_addr.is_empty() {
            return Err(ConfigError::Validation {
                field: "relay.carbon_addr".to_string(),
                message: "carbon address cannot be empty".to_string(),
            });
        }

        if self.gateway.statsd_flush_interval <= 0.0 {
            return Err(ConfigError::Validation {
                field: "gateway.statsd_flush_interval".to_string(),
                message: "flush interval must be positive".to_string(),
            });
        }

        for (i, rule) in self.gateway.rollups.iter().enumerate() {
            // Suffix rules are anchored the same way the render path
            // compiles them.
            if let Err(e) = regex::Regex::new(&format!("{}$", rule.match_suffix)) {
                return Err(ConfigError::Validation {
                    field: format!("gateway.rollups[{}].match_suffix", i),
                    message: e.to_string(),
                });
            }
            if rule.rollup_func.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("gateway.rollups[{}].rollup_func", i),
                    message: "rollup function cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.gateway.listen, "0.0.0.0:8080");
        assert_eq!(config.gateway.statsd_flush_interval, 10.0);
        assert_eq!(config.relay.carbon_addr, "127.0.0.1:2003");
        assert!(config.gateway.rollups.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [gateway]
        listen = "127.0.0.1:9090"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.listen, "127.0.0.1:9090");
        assert_eq!(config.proxy.listen, "0.0.0.0:8481"); // Default
    }

    #[test]
    fn test_config_parse_rollup_rules() {
        let toml = r#"
        [gateway]
        default_rollup_func = "avg_over_time"

        [[gateway.rollups]]
        match_suffix = "\\.count"
        rollup_func = "sum_over_time"

        [[gateway.rollups]]
        match_suffix = "\\.upper(_\\d+)?"
        rollup_func = "max_over_time"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.rollups.len(), 2);
        assert_eq!(config.gateway.rollups[0].rollup_func, "sum_over_time");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_rollup_regex() {
        let config = Config {
            gateway: GatewayConfig {
                rollups: vec![RollupRuleConfig {
                    match_suffix: "(".to_string(),
                    rollup_func: "sum_over_time".to_string(),
                }],
                ..GatewayConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_config_rejects_bad_url() {
        let config = Config {
            gateway: GatewayConfig {
                prometheus_url: "not a url".to_string(),
                ..GatewayConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_non_positive_flush_interval() {
        let config = Config {
            gateway: GatewayConfig {
                statsd_flush_interval: 0.0,
                ..GatewayConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[relay]\nlisten = \"127.0.0.1:2014\"").unwrap();

        let config = Config::load(Some(temp.path())).unwrap();
        assert_eq!(config.relay.listen, "127.0.0.1:2014");
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
