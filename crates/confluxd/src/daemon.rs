//! The integration daemon: registrations, scheduler, and engage workers.

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{info, warn};

use conflux_config::{Config, ConnectorConfig, ConnectorManifest, ManifestError};

use crate::audit::{AuditSink, DaemonContext};
use crate::cancel::ShutdownToken;
use crate::clock::Clock;
use crate::connector::{ConnectorCatalog, ConnectorProvider};
use crate::control::{ControlError, DaemonControl, InvalidParameter};
use crate::engage::EngageWorker;
use crate::handler::ConnectorHandler;
use crate::registry::HandlerRegistry;
use crate::scheduler::{ScheduledRefresh, SchedulerError, SchedulerHandle, SchedulerLoop};

const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

/// Runtime settings the daemon needs from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Name reported in audit events.
    pub daemon_name: String,
    /// Interval between scheduler ticks.
    pub tick_interval: Duration,
    /// Pause between consecutive `engage` calls.
    pub engage_pause: Duration,
}

impl DaemonSettings {
    /// Extracts the daemon settings from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            daemon_name: config.daemon_name().to_owned(),
            tick_interval: config.tick_interval(),
            engage_pause: config.engage_pause(),
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Errors raised while assembling or running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The registrations were empty, blank, or duplicated.
    #[error("invalid connector registrations: {source}")]
    Registrations {
        /// Validation failure.
        #[source]
        source: ManifestError,
    },
    /// A registration named a provider missing from the catalog.
    #[error("connector '{connector}' uses unknown provider '{provider}'; known providers: {known}")]
    UnknownProvider {
        /// Connector name.
        connector: String,
        /// Requested provider.
        provider: String,
        /// Comma-separated catalog contents.
        known: String,
    },
    /// [`IntegrationDaemon::start`] was called twice.
    #[error("integration daemon is already running")]
    AlreadyStarted,
    /// The scheduler thread could not be started or joined.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// An engage thread could not be spawned.
    #[error("failed to spawn engage thread for connector '{connector}': {source}")]
    EngageSpawn {
        /// Connector name.
        connector: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Hosts the configured connectors and drives them.
///
/// Connectors are built and started when the daemon is assembled; the
/// scheduler and engage threads run between [`start`](Self::start) and
/// [`stop`](Self::stop). Dropping the daemon performs the same teardown as
/// `stop`, so connectors are disconnected even when startup fails part way.
pub struct IntegrationDaemon {
    settings: DaemonSettings,
    context: Arc<DaemonContext>,
    registry: HandlerRegistry,
    token: ShutdownToken,
    scheduler: Option<SchedulerHandle>,
    engage_workers: Vec<EngageWorker>,
    stopped: bool,
}

impl IntegrationDaemon {
    /// Validates `registrations` and builds a handler for each.
    ///
    /// # Errors
    ///
    /// Fails when the registrations are empty, contain blank or duplicate
    /// names, or reference a provider missing from `catalog`.
    pub fn new(
        settings: DaemonSettings,
        registrations: Vec<ConnectorConfig>,
        catalog: &ConnectorCatalog,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DaemonError> {
        let registrations = ConnectorManifest::new(registrations)
            .map_err(|source| DaemonError::Registrations { source })?
            .into_connectors();
        let providers = resolve_providers(&registrations, catalog)?;

        let context = Arc::new(DaemonContext::new(
            settings.daemon_name.clone(),
            audit,
            clock,
        ));
        let handlers = registrations
            .into_iter()
            .zip(providers)
            .map(|(config, provider)| {
                Arc::new(ConnectorHandler::start(config, provider, Arc::clone(&context)))
            })
            .collect();

        Ok(Self {
            settings,
            context,
            registry: HandlerRegistry::new(handlers),
            token: ShutdownToken::new(),
            scheduler: None,
            engage_workers: Vec::new(),
            stopped: false,
        })
    }

    /// Spawns the scheduler and one engage thread per blocking connector.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::AlreadyStarted`] on a second call, or a spawn
    /// error if a thread cannot be created. Threads spawned before a spawn
    /// failure are stopped again.
    pub fn start(&mut self) -> Result<(), DaemonError> {
        if self.scheduler.is_some() || self.token.is_cancelled() {
            return Err(DaemonError::AlreadyStarted);
        }
        let handlers = self.registry.snapshot().unwrap_or_default();
        for handler in handlers.iter().filter(|handler| handler.uses_blocking_calls()) {
            match EngageWorker::spawn(
                Arc::clone(handler),
                self.token.clone(),
                self.settings.engage_pause,
            ) {
                Ok(worker) => self.engage_workers.push(worker),
                Err(source) => {
                    self.abort_workers();
                    return Err(DaemonError::EngageSpawn {
                        connector: handler.name().to_owned(),
                        source,
                    });
                }
            }
        }

        match self.scheduler_loop().start(self.token.clone()) {
            Ok(scheduler) => self.scheduler = Some(scheduler),
            Err(error) => {
                self.abort_workers();
                return Err(error.into());
            }
        }
        info!(
            target: DAEMON_TARGET,
            daemon = %self.settings.daemon_name,
            connectors = handlers.len(),
            engage_threads = self.engage_workers.len(),
            "integration daemon started"
        );
        Ok(())
    }

    /// Stops the scheduler, disconnects every connector, and joins the
    /// engage threads.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ThreadPanic`] (wrapped) if the scheduler
    /// thread panicked. Connectors are disconnected either way.
    pub fn stop(&mut self) -> Result<(), DaemonError> {
        self.teardown().map_err(DaemonError::from)
    }

    /// Control handle for operator requests.
    #[must_use]
    pub fn control(&self) -> DaemonControl {
        DaemonControl::new(self.registry.clone())
    }

    /// Runs one scheduling pass at `now` on the calling thread.
    pub fn tick(&self, now: SystemTime) -> Vec<ScheduledRefresh> {
        self.scheduler_loop().tick(now)
    }

    /// Disconnects and removes a connector from the daemon.
    ///
    /// The scheduler stops visiting the connector from its next tick.
    ///
    /// # Errors
    ///
    /// Rejects a blank or unknown connector name.
    pub fn remove_connector(&mut self, connector_name: &str) -> Result<(), ControlError> {
        if connector_name.trim().is_empty() {
            return Err(InvalidParameter::Blank {
                parameter: "connector_name",
            }
            .into());
        }
        let Some(handler) = self.registry.remove(connector_name)? else {
            return Err(InvalidParameter::UnknownConnectorName {
                connector_name: connector_name.to_owned(),
            }
            .into());
        };
        handler.shutdown();
        if let Some(index) = self
            .engage_workers
            .iter()
            .position(|worker| worker.connector_name() == connector_name)
        {
            self.engage_workers.swap_remove(index).join();
        }
        info!(
            target: DAEMON_TARGET,
            connector = connector_name,
            "connector removed"
        );
        Ok(())
    }

    /// Resolved daemon settings.
    #[must_use]
    pub const fn settings(&self) -> &DaemonSettings {
        &self.settings
    }

    /// Shared audit and clock context.
    #[must_use]
    pub fn context(&self) -> &DaemonContext {
        &self.context
    }

    fn scheduler_loop(&self) -> SchedulerLoop {
        SchedulerLoop::new(
            self.registry.clone(),
            Arc::clone(&self.context),
            self.settings.tick_interval,
        )
    }

    fn teardown(&mut self) -> Result<(), SchedulerError> {
        self.token.cancel();
        let joined = self.scheduler.take().map_or(Ok(()), SchedulerHandle::join);
        if self.stopped {
            return joined;
        }
        self.stopped = true;
        for handler in self.registry.snapshot().unwrap_or_default() {
            handler.shutdown();
        }
        for worker in self.engage_workers.drain(..) {
            worker.join();
        }
        info!(
            target: DAEMON_TARGET,
            daemon = %self.settings.daemon_name,
            "integration daemon stopped"
        );
        joined
    }

    fn abort_workers(&mut self) {
        self.token.cancel();
        for worker in self.engage_workers.drain(..) {
            worker.join();
        }
    }
}

impl Drop for IntegrationDaemon {
    fn drop(&mut self) {
        if let Err(error) = self.teardown() {
            warn!(
                target: DAEMON_TARGET,
                daemon = %self.settings.daemon_name,
                %error,
                "scheduler did not stop cleanly"
            );
        }
    }
}

fn resolve_providers(
    registrations: &[ConnectorConfig],
    catalog: &ConnectorCatalog,
) -> Result<Vec<Arc<dyn ConnectorProvider>>, DaemonError> {
    registrations
        .iter()
        .map(|config| {
            catalog
                .get(&config.provider)
                .ok_or_else(|| DaemonError::UnknownProvider {
                    connector: config.name.clone(),
                    provider: config.provider.clone(),
                    known: catalog.names().join(", "),
                })
        })
        .collect()
}
