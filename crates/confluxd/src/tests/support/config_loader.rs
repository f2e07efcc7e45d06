//! Configuration loaders used by bootstrap and process scenarios.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};

use conflux_config::Config;

use crate::bootstrap::ConfigLoader;

pub const TEST_DAEMON_NAME: &str = "test-daemon";

/// Loader returning a configuration with fast ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestConfigLoader;

impl TestConfigLoader {
    pub fn config() -> Config {
        Config {
            daemon_name: TEST_DAEMON_NAME.to_owned(),
            log_filter: "warn".to_owned(),
            tick_interval_ms: 10,
            engage_pause_ms: 5,
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Self::config())
    }
}

/// Loader that intentionally fails by passing an invalid log format.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("confluxd"),
            OsString::from("--log-format"),
            OsString::from("xml"),
        ])
    }
}
