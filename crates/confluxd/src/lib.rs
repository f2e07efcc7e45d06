//! The Conflux integration daemon.
//!
//! The daemon hosts a set of pluggable connectors, each registered under an
//! integration service, and keeps them working without operator attention.
//! A scheduler thread refreshes every connector on its first tick and then
//! whenever its minimum refresh interval has elapsed. Connectors that make
//! blocking calls get a dedicated engage thread. Operators drive the daemon
//! through [`DaemonControl`]: refresh everything, refresh or restart one
//! service (or one connector in it), and read a status report.
//!
//! Refreshes of one connector never overlap, whichever mix of scheduler
//! ticks and control requests triggers them. A connector that fails is
//! halted and left alone until it is restarted; other connectors keep
//! running.
//!
//! Startup follows the usual bootstrap sequence: configuration is resolved
//! through `ortho_config`, structured telemetry is installed, the connector
//! manifest is loaded, and every connector is built and started before the
//! scheduler begins.

mod audit;
mod bootstrap;
mod cancel;
mod clock;
mod command_connector;
mod connector;
mod control;
mod daemon;
mod engage;
mod handler;
mod health;
mod process;
mod registry;
mod scheduler;
mod statistics;
mod telemetry;

pub use audit::{AuditEvent, AuditEventKind, AuditSink, DaemonContext, StructuredAuditSink};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, DaemonServices, ManifestFileSource, RegistrationError,
    RegistrationSource, StaticConfigLoader, StaticRegistrations, SystemConfigLoader,
    bootstrap_with,
};
pub use cancel::ShutdownToken;
pub use clock::{Clock, SystemClock};
pub use command_connector::{COMMAND_PROVIDER, CommandConnector, CommandConnectorProvider};
pub use connector::{CatalogError, Connector, ConnectorCatalog, ConnectorError, ConnectorProvider};
pub use control::{ControlError, DaemonControl, InvalidParameter};
pub use daemon::{DaemonError, DaemonSettings, IntegrationDaemon};
pub use handler::{ConnectorHandler, EngageOutcome, RefreshOutcome};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use registry::RegistryPoisoned;
pub use scheduler::{ScheduledRefresh, SchedulerError, SchedulerHandle, SchedulerLoop, is_due};
pub use statistics::{ConnectorStatistics, StatisticsError};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
