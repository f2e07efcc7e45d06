//! Shared configuration for the Conflux integration daemon.
//!
//! Two layers of configuration live here. [`Config`] holds the daemon's own
//! runtime settings and is resolved through `ortho_config`, so values merge
//! from built-in defaults, an optional TOML file (`--config-path` or
//! `CONFLUX_CONFIG_PATH`), `CONFLUX_*` environment variables, and finally
//! command-line flags. The connector registrations hosted by the daemon come
//! from a separate YAML manifest described by [`ConnectorManifest`]; the
//! manifest path itself is part of [`Config`].

mod defaults;
mod logging;
mod manifest;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_DAEMON_NAME, DEFAULT_ENGAGE_PAUSE_MS, DEFAULT_LOG_FILTER, DEFAULT_TICK_INTERVAL_MS,
    default_daemon_name, default_engage_pause, default_log_filter, default_log_filter_string,
    default_log_format, default_tick_interval,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use manifest::{ConnectorConfig, ConnectorManifest, ManifestError};

/// Runtime configuration for the integration daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CONFLUX")]
pub struct Config {
    /// Name the daemon reports in audit events and status summaries.
    #[ortho_config(default = defaults::default_daemon_name())]
    pub daemon_name: String,
    /// `tracing` filter expression applied to daemon telemetry.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for daemon telemetry.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Milliseconds between scheduler ticks.
    #[ortho_config(default = DEFAULT_TICK_INTERVAL_MS)]
    pub tick_interval_ms: u64,
    /// Milliseconds to pause between consecutive `engage` calls.
    #[ortho_config(default = DEFAULT_ENGAGE_PAUSE_MS)]
    pub engage_pause_ms: u64,
    /// Path to the YAML manifest listing the hosted connectors.
    pub connectors_path: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_name: default_daemon_name(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            engage_pause_ms: DEFAULT_ENGAGE_PAUSE_MS,
            connectors_path: None,
        }
    }
}

impl Config {
    /// Name the daemon reports in audit events.
    #[must_use]
    pub fn daemon_name(&self) -> &str {
        self.daemon_name.as_str()
    }

    /// Telemetry filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Interval between scheduler ticks.
    ///
    /// A zero interval is clamped to one millisecond so the scheduler never
    /// spins without yielding.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Pause between consecutive `engage` calls on one connector.
    #[must_use]
    pub fn engage_pause(&self) -> Duration {
        Duration::from_millis(self.engage_pause_ms.max(1))
    }

    /// Location of the connector manifest, when configured.
    #[must_use]
    pub fn connectors_path(&self) -> Option<&Utf8Path> {
        self.connectors_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = Config::default();
        assert_eq!(config.daemon_name(), DEFAULT_DAEMON_NAME);
        assert_eq!(config.log_filter(), default_log_filter());
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.tick_interval(), default_tick_interval());
        assert_eq!(config.engage_pause(), default_engage_pause());
        assert!(config.connectors_path().is_none());
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config = Config {
            tick_interval_ms: 0,
            engage_pause_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert_eq!(config.engage_pause(), Duration::from_millis(1));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("COMPACT".parse::<LogFormat>().ok(), Some(LogFormat::Compact));
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
