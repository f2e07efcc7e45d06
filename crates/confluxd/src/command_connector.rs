//! Built-in provider that turns shell commands into connector operations.
//!
//! Each lifecycle phase maps to an optional property holding a command line.
//! The command runs through the platform shell and a non-zero exit fails the
//! phase. Only `refresh` is required. Each successful phase bumps a
//! `<phase>_commands` counter and a `last_<phase>` timestamp statistic.
//!
//! ```yaml
//! - name: inventory
//!   service_marker: asset-sync
//!   provider: command
//!   min_seconds_between_refresh: 300
//!   properties:
//!     start: ./bin/login
//!     refresh: ./bin/sync-inventory
//!     disconnect: ./bin/logout
//!     working_dir: /srv/inventory
//! ```

use std::process::Command;
use std::sync::Arc;
use std::time::SystemTime;

use once_cell::sync::OnceCell;
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn};

use conflux_config::ConnectorConfig;

use crate::connector::{Connector, ConnectorError, ConnectorProvider};
use crate::statistics::ConnectorStatistics;

/// Provider name under which the command connector is registered.
pub const COMMAND_PROVIDER: &str = "command";

const WORKING_DIR_PROPERTY: &str = "working_dir";
const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

#[cfg(unix)]
const SHELL: (&str, &str) = ("sh", "-c");
#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");

/// Lifecycle phase a command is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
enum Phase {
    Start,
    Engage,
    Refresh,
    Disconnect,
}

/// Provider building [`CommandConnector`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandConnectorProvider;

impl CommandConnectorProvider {
    /// Builds a new provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConnectorProvider for CommandConnectorProvider {
    fn create(&self, config: &ConnectorConfig) -> Result<Arc<dyn Connector>, ConnectorError> {
        Ok(Arc::new(CommandConnector::from_config(config)?))
    }
}

/// Connector whose lifecycle phases run shell commands.
#[derive(Debug)]
pub struct CommandConnector {
    name: String,
    working_dir: Option<String>,
    start: Option<String>,
    engage: Option<String>,
    refresh: String,
    disconnect: Option<String>,
    statistics: OnceCell<ConnectorStatistics>,
}

impl CommandConnector {
    /// Reads the phase commands from the registration properties.
    ///
    /// # Errors
    ///
    /// Fails when the `refresh` property is missing or blank.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let command = |phase: Phase| {
            config
                .property(phase.into())
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
        };
        let refresh = command(Phase::Refresh).ok_or_else(|| {
            ConnectorError::new(format!(
                "command connector '{}' requires a '{}' property",
                config.name,
                Phase::Refresh
            ))
        })?;
        Ok(Self {
            name: config.name.clone(),
            working_dir: config.property(WORKING_DIR_PROPERTY).map(str::to_owned),
            start: command(Phase::Start),
            engage: command(Phase::Engage),
            refresh,
            disconnect: command(Phase::Disconnect),
            statistics: OnceCell::new(),
        })
    }

    fn run(&self, phase: Phase, line: Option<&str>) -> Result<(), ConnectorError> {
        let Some(line) = line else {
            return Ok(());
        };
        let (shell, flag) = SHELL;
        let mut command = Command::new(shell);
        command.arg(flag).arg(line);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        debug!(
            target: COMMAND_TARGET,
            connector = %self.name,
            %phase,
            command = line,
            "running connector command"
        );
        let status = command.status().map_err(|source| {
            ConnectorError::with_source(format!("failed to launch {phase} command"), source)
        })?;
        if status.success() {
            self.count(phase, line);
            Ok(())
        } else {
            Err(ConnectorError::new(format!(
                "{phase} command exited with {status}"
            )))
        }
    }

    fn count(&self, phase: Phase, line: &str) {
        let Some(statistics) = self.statistics.get() else {
            return;
        };
        let recorded = statistics
            .increment_counter(&format!("{phase}_commands"))
            .and_then(|_| statistics.set_timestamp(&format!("last_{phase}"), SystemTime::now()));
        if let Err(error) = recorded {
            warn!(
                target: COMMAND_TARGET,
                connector = %self.name,
                %phase,
                command = line,
                %error,
                "could not record command statistics"
            );
        }
    }
}

impl Connector for CommandConnector {
    fn start(&self, statistics: &ConnectorStatistics) -> Result<(), ConnectorError> {
        self.statistics.get_or_init(|| statistics.clone());
        self.run(Phase::Start, self.start.as_deref())
    }

    fn engage(&self) -> Result<(), ConnectorError> {
        self.run(Phase::Engage, self.engage.as_deref())
    }

    fn refresh(&self) -> Result<(), ConnectorError> {
        self.run(Phase::Refresh, Some(self.refresh.as_str()))
    }

    fn disconnect(&self) -> Result<(), ConnectorError> {
        self.run(Phase::Disconnect, self.disconnect.as_deref())
    }
}
