//! Test doubles and harnesses shared by the daemon test suites.

mod audit;
mod clock;
mod config_loader;
mod connector;
mod reporter;
mod shutdown;
mod world;

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use conflux_config::ConnectorConfig;
use conflux_daemon_types::IntegrationConnectorReport;

use crate::control::DaemonControl;
use crate::daemon::{DaemonSettings, IntegrationDaemon};
use crate::scheduler::ScheduledRefresh;

pub use audit::RecordingAuditSink;
pub use clock::ManualClock;
pub use config_loader::{FailingConfigLoader, TEST_DAEMON_NAME, TestConfigLoader};
pub use connector::{ConnectorTally, RECORDING_PROVIDER, RecordingProvider, RefreshGate};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use shutdown::TestShutdownSignal;
pub use world::TestWorld;

pub const OPERATOR: &str = "ops";

const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Builds the scenario world.
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

/// Registration served by the recording provider.
pub fn registration(name: &str, service_marker: &str, min_seconds: u64) -> ConnectorConfig {
    ConnectorConfig::new(name, service_marker, RECORDING_PROVIDER)
        .with_min_seconds_between_refresh(min_seconds)
}

/// Settings with short intervals so threaded tests finish quickly.
pub fn fast_settings() -> DaemonSettings {
    DaemonSettings {
        daemon_name: TEST_DAEMON_NAME.to_owned(),
        tick_interval: Duration::from_millis(10),
        engage_pause: Duration::from_millis(5),
    }
}

/// Polls `condition` until it holds or a generous timeout expires.
pub fn eventually(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + EVENTUALLY_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {description}");
        thread::sleep(POLL_INTERVAL);
    }
}

/// A daemon wired to recording collaborators and a manual clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub audit: Arc<RecordingAuditSink>,
    pub provider: RecordingProvider,
    pub daemon: IntegrationDaemon,
}

impl Harness {
    pub fn assemble(registrations: Vec<ConnectorConfig>) -> Self {
        Self::with_provider(RecordingProvider::default(), registrations)
    }

    pub fn with_provider(provider: RecordingProvider, registrations: Vec<ConnectorConfig>) -> Self {
        let clock = Arc::new(ManualClock::new());
        let audit = Arc::new(RecordingAuditSink::default());
        let daemon = IntegrationDaemon::new(
            fast_settings(),
            registrations,
            &provider.catalog(),
            audit.clone(),
            clock.clone(),
        )
        .expect("daemon assembles");
        Self {
            clock,
            audit,
            provider,
            daemon,
        }
    }

    pub fn tally(&self, name: &str) -> Arc<ConnectorTally> {
        self.provider.tally(name)
    }

    pub fn control(&self) -> DaemonControl {
        self.daemon.control()
    }

    pub fn tick(&self) -> Vec<ScheduledRefresh> {
        self.daemon.tick(crate::clock::Clock::now(&*self.clock))
    }

    pub fn advance_secs(&self, seconds: u64) {
        self.clock.advance(Duration::from_secs(seconds));
    }

    pub fn advance_millis(&self, millis: u64) {
        self.clock.advance(Duration::from_millis(millis));
    }

    pub fn report(&self, name: &str) -> IntegrationConnectorReport {
        self.control()
            .get_integration_daemon_status(OPERATOR)
            .expect("status is available")
            .iter()
            .find_map(|summary| summary.connector(name).cloned())
            .unwrap_or_else(|| panic!("connector '{name}' missing from status"))
    }
}

/// Names of the connectors a tick refreshed, in visiting order.
pub fn refreshed_names(ticked: &[ScheduledRefresh]) -> Vec<&str> {
    ticked
        .iter()
        .map(|refresh| refresh.connector_name.as_str())
        .collect()
}
