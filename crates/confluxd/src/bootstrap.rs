//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use conflux_config::{Config, ConnectorConfig, ConnectorManifest, ManifestError};

use crate::audit::{AuditSink, StructuredAuditSink};
use crate::clock::{Clock, SystemClock};
use crate::connector::ConnectorCatalog;
use crate::daemon::{DaemonError, DaemonSettings, IntegrationDaemon};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns a pre-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already-loaded configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors raised while locating connector registrations.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// No manifest path was configured.
    #[error("no connector manifest configured; set --connectors-path or CONFLUX_CONNECTORS_PATH")]
    NotConfigured,
    /// The manifest could not be read or was invalid.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Supplies the connector registrations the daemon should host.
pub trait RegistrationSource: Send + Sync {
    /// Returns registrations in the order the daemon should visit them.
    fn load(&self, config: &Config) -> Result<Vec<ConnectorConfig>, RegistrationError>;
}

/// Reads registrations from the manifest named by
/// [`Config::connectors_path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestFileSource;

impl RegistrationSource for ManifestFileSource {
    fn load(&self, config: &Config) -> Result<Vec<ConnectorConfig>, RegistrationError> {
        let path = config
            .connectors_path()
            .ok_or(RegistrationError::NotConfigured)?;
        Ok(ConnectorManifest::load(path)?.into_connectors())
    }
}

/// Registrations supplied directly, bypassing the manifest file.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistrations {
    registrations: Vec<ConnectorConfig>,
}

impl StaticRegistrations {
    /// Wraps a fixed list of registrations.
    #[must_use]
    pub const fn new(registrations: Vec<ConnectorConfig>) -> Self {
        Self { registrations }
    }
}

impl RegistrationSource for StaticRegistrations {
    fn load(&self, _config: &Config) -> Result<Vec<ConnectorConfig>, RegistrationError> {
        Ok(self.registrations.clone())
    }
}

/// Collaborators the daemon is assembled from.
#[derive(Clone)]
pub struct DaemonServices {
    /// Providers available to registrations.
    pub catalog: ConnectorCatalog,
    /// Receives bootstrap health events.
    pub reporter: Arc<dyn HealthReporter>,
    /// Receives audit events.
    pub audit: Arc<dyn AuditSink>,
    /// Time source for refresh bookkeeping.
    pub clock: Arc<dyn Clock>,
}

impl DaemonServices {
    /// Built-in providers with `tracing`-backed reporting and the system
    /// clock.
    #[must_use]
    pub fn production() -> Self {
        Self {
            catalog: ConnectorCatalog::with_builtin(),
            reporter: Arc::new(StructuredHealthReporter::new()),
            audit: Arc::new(StructuredAuditSink::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Connector registrations could not be loaded.
    #[error("failed to load connector registrations: {source}")]
    Registrations {
        /// Underlying registration error.
        #[source]
        source: RegistrationError,
    },
    /// The daemon rejected the registrations.
    #[error("failed to assemble integration daemon: {source}")]
    Daemon {
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    telemetry: TelemetryHandle,
    runtime: IntegrationDaemon,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The assembled integration daemon.
    #[must_use]
    pub const fn runtime(&self) -> &IntegrationDaemon {
        &self.runtime
    }

    /// Mutable access for starting and stopping the daemon.
    #[must_use]
    pub const fn runtime_mut(&mut self) -> &mut IntegrationDaemon {
        &mut self.runtime
    }

    /// Consumes the bootstrap result, yielding the daemon.
    #[must_use]
    pub fn into_runtime(self) -> IntegrationDaemon {
        self.runtime
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// Loads configuration, installs telemetry, loads the registrations, and
/// builds and starts every connector. The scheduler is not started; call
/// [`IntegrationDaemon::start`] on the result.
///
/// # Errors
///
/// Returns a [`BootstrapError`] naming the first step that failed. A
/// connector that fails to start does not fail the bootstrap.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    registrations: &dyn RegistrationSource,
    services: DaemonServices,
) -> Result<Daemon, BootstrapError> {
    let DaemonServices {
        catalog,
        reporter,
        audit,
        clock,
    } = services;
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let connectors = match registrations.load(&config) {
        Ok(connectors) => connectors,
        Err(source) => {
            let error = BootstrapError::Registrations { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };
    let connector_count = connectors.len();

    let settings = DaemonSettings::from_config(&config);
    let runtime = match IntegrationDaemon::new(settings, connectors, &catalog, audit, clock) {
        Ok(runtime) => runtime,
        Err(source) => {
            let error = BootstrapError::Daemon { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };
    reporter.bootstrap_succeeded(&config, connector_count);

    Ok(Daemon {
        config,
        telemetry,
        runtime,
    })
}
