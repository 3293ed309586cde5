//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::client::launcher::VersionCode;
use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Scripting server address and socket timeouts.
    #[serde(default)]
    pub server: ServerConfig,

    /// Workbench launch and health-check settings.
    #[serde(default)]
    pub launch: LaunchConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be non-zero"));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }

        if self.server.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.connect_timeout_ms",
                "must be non-zero",
            ));
        }

        if let Some(ref version) = self.launch.version {
            if VersionCode::parse(version).is_err() {
                return Err(ConfigError::invalid(
                    "launch.version",
                    format!("'{version}' is not a release such as 2022.2"),
                ));
            }
        }

        if let Some([start, stop]) = self.launch.port_range {
            if start >= stop {
                return Err(ConfigError::invalid(
                    "launch.port_range",
                    format!("start {start} must be below stop {stop}"),
                ));
            }
        }

        if self.launch.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("launch.poll_interval_ms", "must be non-zero"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!(
                    "'{}' must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

/// Scripting server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host the scripting engine listens on.
    /// Default: "localhost"
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the scripting engine listens on.
    /// Default: 8001
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Reply timeout in milliseconds. `None` waits for as long as the
    /// remote engine takes.
    #[serde(default)]
    pub reply_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Reply timeout as a [`Duration`], if one is configured.
    #[must_use]
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reply_timeout_ms: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    8001
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Workbench launch configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchConfig {
    /// Workbench release, e.g. "2022.2". Selects the `AWP_ROOT` variable.
    #[serde(default)]
    pub version: Option<String>,

    /// Explicit installation root; skips environment discovery.
    #[serde(default)]
    pub install_root: Option<PathBuf>,

    /// Launch without a window and in batch mode.
    #[serde(default = "default_true")]
    pub non_graphical: bool,

    /// Delay between spawning the executable and the first probe.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Overall bound on the health check, in seconds.
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    /// Delay between two probes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after a successful probe before commands are sent.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Time the workbench gets to exit after `Exit` before it is killed.
    #[serde(default = "default_exit_grace_ms")]
    pub exit_grace_ms: u64,

    /// Range to pick a free port from when launching, `[start, stop]`.
    #[serde(default)]
    pub port_range: Option<[u16; 2]>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            version: None,
            install_root: None,
            non_graphical: default_true(),
            startup_delay_ms: default_startup_delay_ms(),
            health_timeout_secs: default_health_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            exit_grace_ms: default_exit_grace_ms(),
            port_range: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_startup_delay_ms() -> u64 {
    2_000
}

const fn default_health_timeout_secs() -> u64 {
    180
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

const fn default_settle_delay_ms() -> u64 {
    3_000
}

const fn default_exit_grace_ms() -> u64 {
    10_000
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "server": {
                "host": "127.0.0.1",
                "port": 40001,
                "connect_timeout_ms": 1000,
                "reply_timeout_ms": 60000
            },
            "launch": {
                "version": "2022.2",
                "install_root": "/opt/ansys/v222",
                "non_graphical": false,
                "startup_delay_ms": 500,
                "health_timeout_secs": 60,
                "poll_interval_ms": 1000,
                "settle_delay_ms": 0,
                "exit_grace_ms": 2000,
                "port_range": [40001, 50000]
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 40001);
        assert_eq!(config.server.reply_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.launch.version.as_deref(), Some("2022.2"));
        assert_eq!(
            config.launch.install_root,
            Some(PathBuf::from("/opt/ansys/v222"))
        );
        assert!(!config.launch.non_graphical);
        assert_eq!(config.launch.port_range, Some([40001, 50000]));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn launch_config_defaults() {
        let config = LaunchConfig::default();
        assert!(config.non_graphical);
        assert_eq!(config.health_timeout_secs, 180);
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.settle_delay_ms, 3_000);
        assert!(config.version.is_none());
    }

    #[test]
    fn server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8001);
        assert!(config.reply_timeout().is_none());
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_invalid_version() {
        let json = r#"{ "launch": { "version": "twenty-two" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_reversed_port_range() {
        let json = r#"{ "launch": { "port_range": [50000, 40001] } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_connect_timeout() {
        let json = r#"{ "server": { "connect_timeout_ms": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("server.connect_timeout_ms"));
    }

    #[test]
    fn accept_unbounded_health_timeout() {
        let json = r#"{ "launch": { "health_timeout_secs": 18446744073709551615 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.launch.health_timeout_secs, u64::MAX);
    }

    #[test]
    fn reject_unknown_log_level() {
        let json = r#"{ "logging": { "level": "loud" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
