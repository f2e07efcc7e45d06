//! Per-registration wrapper around one hosted connector.
//!
//! [`ConnectorHandler`] owns the connector instance and its status. Every
//! connector call happens outside the state lock, so status reads never wait
//! on a slow connector. A refresh claims the handler under the lock and
//! reports [`ConnectorStatus::Refreshing`]; a second caller finding the claim
//! taken backs off, so refreshes of one registration never overlap. Restart
//! and shutdown wait for the claim to be released before touching the
//! instance.
//!
//! Each instance gets its own [`ConnectorStatistics`], so a restart starts
//! the published statistics afresh.
//!
//! Restarts bump a generation counter. A failing `engage` call made against
//! an earlier generation is discarded instead of failing the replacement
//! instance.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use conflux_config::ConnectorConfig;
use conflux_daemon_types::{ConnectorStatus, IntegrationConnectorReport};

use crate::audit::{AuditEventKind, DaemonContext};
use crate::connector::{Connector, ConnectorError, ConnectorProvider};
use crate::statistics::ConnectorStatistics;

pub(crate) const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handler");

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The connector refreshed successfully.
    Refreshed,
    /// Another refresh of the same registration was already in flight.
    AlreadyRefreshing,
    /// The handler was not in a state that accepts refreshes.
    Skipped(ConnectorStatus),
    /// Another call failed the handler while the refresh was in flight, so
    /// the refresh result was discarded.
    Interrupted,
    /// The connector failed; the handler is now [`ConnectorStatus::Failed`].
    Failed(String),
}

/// Result of one `engage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngageOutcome {
    /// `engage` returned successfully.
    Engaged,
    /// The handler was halted or between instances.
    Skipped(ConnectorStatus),
    /// `engage` returned after a restart replaced the instance.
    Superseded,
    /// The connector failed; the handler is now [`ConnectorStatus::Failed`].
    Failed(String),
}

struct HandlerState {
    connector: Option<Arc<dyn Connector>>,
    status: ConnectorStatus,
    last_status_change: SystemTime,
    last_refresh_time: Option<SystemTime>,
    failure_reason: Option<String>,
    refreshing: bool,
    generation: u64,
    statistics: ConnectorStatistics,
}

impl HandlerState {
    fn set_status(&mut self, status: ConnectorStatus, now: SystemTime) {
        if self.status != status {
            self.status = status;
            self.last_status_change = now;
        }
    }
}

/// Wraps one connector registration.
pub struct ConnectorHandler {
    config: ConnectorConfig,
    provider: Arc<dyn ConnectorProvider>,
    context: Arc<DaemonContext>,
    state: Mutex<HandlerState>,
    idle: Condvar,
    lifecycle: Mutex<()>,
}

impl ConnectorHandler {
    /// Builds the connector through `provider` and starts it.
    ///
    /// Construction and start failures leave the handler in
    /// [`ConnectorStatus::Failed`] rather than failing the daemon, so one
    /// broken registration cannot stop the others from running.
    #[must_use]
    pub fn start(
        config: ConnectorConfig,
        provider: Arc<dyn ConnectorProvider>,
        context: Arc<DaemonContext>,
    ) -> Self {
        let now = context.now();
        let handler = Self {
            config,
            provider,
            context,
            state: Mutex::new(HandlerState {
                connector: None,
                status: ConnectorStatus::Initializing,
                last_status_change: now,
                last_refresh_time: None,
                failure_reason: None,
                refreshing: false,
                generation: 0,
                statistics: ConnectorStatistics::new(),
            }),
            idle: Condvar::new(),
            lifecycle: Mutex::new(()),
        };
        handler.install_instance(0);
        handler
    }

    /// Connector name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    /// Marker of the owning integration service.
    #[must_use]
    pub fn service_marker(&self) -> &str {
        self.config.service_marker.as_str()
    }

    /// Minimum seconds between scheduled refreshes.
    #[must_use]
    pub const fn min_seconds_between_refresh(&self) -> u64 {
        self.config.min_seconds_between_refresh
    }

    /// Whether the registration needs an engage thread.
    #[must_use]
    pub const fn uses_blocking_calls(&self) -> bool {
        self.config.uses_blocking_calls
    }

    /// Current status. Never waits on a connector call.
    #[must_use]
    pub fn status(&self) -> ConnectorStatus {
        self.lock_state().status
    }

    /// Completion time of the last successful refresh.
    #[must_use]
    pub fn last_refresh_time(&self) -> Option<SystemTime> {
        self.lock_state().last_refresh_time
    }

    /// Reason recorded when the handler entered [`ConnectorStatus::Failed`].
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        self.lock_state().failure_reason.clone()
    }

    /// Snapshot of the handler for status queries.
    #[must_use]
    pub fn report(&self) -> IntegrationConnectorReport {
        let state = self.lock_state();
        IntegrationConnectorReport {
            connector_name: self.config.name.clone(),
            connector_status: state.status,
            last_status_change: OffsetDateTime::from(state.last_status_change),
            last_refresh_time: state.last_refresh_time.map(OffsetDateTime::from),
            min_seconds_between_refresh: self.config.min_seconds_between_refresh,
            failing_exception_message: state.failure_reason.clone(),
            statistics: state.statistics.snapshot(),
        }
    }

    /// Refreshes the connector unless a refresh is already running.
    ///
    /// `reason` labels the caller in telemetry, for example `"scheduled"`
    /// or `"requested by ops"`.
    pub fn refresh_connector(&self, reason: &str) -> RefreshOutcome {
        self.refresh(reason, None)
    }

    /// Scheduler entry point: records `announce` once the refresh is
    /// claimed, so skipped attempts leave no audit trace.
    pub(crate) fn refresh_scheduled(&self, announce: AuditEventKind) -> RefreshOutcome {
        self.refresh("scheduled", Some(announce))
    }

    fn refresh(&self, reason: &str, announce: Option<AuditEventKind>) -> RefreshOutcome {
        let connector = {
            let mut state = self.lock_state();
            if state.refreshing {
                debug!(
                    target: HANDLER_TARGET,
                    connector = %self.name(),
                    reason,
                    "refresh already in flight"
                );
                return RefreshOutcome::AlreadyRefreshing;
            }
            if !state.status.accepts_refresh() {
                return RefreshOutcome::Skipped(state.status);
            }
            let Some(connector) = state.connector.clone() else {
                return RefreshOutcome::Skipped(state.status);
            };
            state.refreshing = true;
            state.set_status(ConnectorStatus::Refreshing, self.context.now());
            connector
        };

        if let Some(kind) = announce {
            self.context.audit(Some(self.name()), kind);
        }
        debug!(
            target: HANDLER_TARGET,
            connector = %self.name(),
            reason,
            "refreshing connector"
        );
        let result = invoke("refresh", || connector.refresh());
        let now = self.context.now();

        let mut state = self.lock_state();
        state.refreshing = false;
        let outcome = match result {
            _ if state.status != ConnectorStatus::Refreshing => RefreshOutcome::Interrupted,
            Ok(()) => {
                state.last_refresh_time = Some(now);
                state.set_status(ConnectorStatus::Running, now);
                RefreshOutcome::Refreshed
            }
            Err(error) => {
                let reason = error.describe();
                state.failure_reason = Some(reason.clone());
                state.set_status(ConnectorStatus::Failed, now);
                RefreshOutcome::Failed(reason)
            }
        };
        drop(state);
        self.idle.notify_all();

        if let RefreshOutcome::Failed(reason) = &outcome {
            self.report_failure("refresh", reason);
        }
        outcome
    }

    /// Makes one `engage` call on the current instance.
    pub fn engage_connector(&self) -> EngageOutcome {
        let (connector, generation) = {
            let state = self.lock_state();
            if state.status.is_halted() {
                return EngageOutcome::Skipped(state.status);
            }
            let Some(connector) = state.connector.clone() else {
                return EngageOutcome::Skipped(state.status);
            };
            (connector, state.generation)
        };

        match invoke("engage", || connector.engage()) {
            Ok(()) => EngageOutcome::Engaged,
            Err(error) => {
                let reason = error.describe();
                if self.fail(generation, &reason) {
                    self.report_failure("engage", &reason);
                    EngageOutcome::Failed(reason)
                } else {
                    EngageOutcome::Superseded
                }
            }
        }
    }

    /// Disconnects the current instance and starts a fresh one.
    ///
    /// Waits for an in-flight refresh to finish first. Disconnect failures
    /// are logged and do not stop the restart. Has no effect once the
    /// handler is stopped.
    pub fn restart(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let (previous, generation) = {
            let mut state = self.wait_until_idle();
            if state.status == ConnectorStatus::Stopped {
                return;
            }
            state.generation += 1;
            state.last_refresh_time = None;
            state.failure_reason = None;
            state.set_status(ConnectorStatus::Initializing, self.context.now());
            (state.connector.take(), state.generation)
        };

        info!(
            target: HANDLER_TARGET,
            connector = %self.name(),
            generation,
            "restarting connector"
        );
        if let Some(previous) = previous {
            self.disconnect_quietly(&previous);
        }
        self.install_instance(generation);
        self.context
            .audit(Some(self.name()), AuditEventKind::ConnectorRestarted);
    }

    /// Disconnects the connector and marks the handler stopped for good.
    pub fn shutdown(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let previous = {
            let mut state = self.wait_until_idle();
            if state.status == ConnectorStatus::Stopped {
                return;
            }
            state.generation += 1;
            state.set_status(ConnectorStatus::Stopped, self.context.now());
            state.connector.take()
        };
        if let Some(previous) = previous {
            self.disconnect_quietly(&previous);
        }
        info!(
            target: HANDLER_TARGET,
            connector = %self.name(),
            "connector stopped"
        );
    }

    fn install_instance(&self, generation: u64) {
        let statistics = ConnectorStatistics::new();
        let started = self.provider.create(&self.config).and_then(|connector| {
            invoke("start", || connector.start(&statistics)).map(|()| connector)
        });
        let now = self.context.now();
        let mut state = self.lock_state();
        if state.generation != generation {
            drop(state);
            if let Ok(stale) = started {
                self.disconnect_quietly(&stale);
            }
            return;
        }
        state.statistics = statistics;
        match started {
            Ok(connector) => {
                state.connector = Some(connector);
                state.set_status(ConnectorStatus::Initializing, now);
            }
            Err(error) => {
                let reason = error.describe();
                state.failure_reason = Some(reason.clone());
                state.set_status(ConnectorStatus::Failed, now);
                drop(state);
                self.report_failure("start", &reason);
            }
        }
    }

    /// Marks the handler failed if `generation` is still current.
    fn fail(&self, generation: u64, reason: &str) -> bool {
        let now = self.context.now();
        let mut state = self.lock_state();
        if state.generation != generation || state.status.is_halted() {
            return false;
        }
        state.failure_reason = Some(reason.to_owned());
        state.set_status(ConnectorStatus::Failed, now);
        true
    }

    fn report_failure(&self, operation: &str, reason: &str) {
        warn!(
            target: HANDLER_TARGET,
            connector = %self.name(),
            service = %self.service_marker(),
            operation,
            reason,
            "connector call failed"
        );
        self.context.audit(
            Some(self.name()),
            AuditEventKind::ConnectorFailed {
                reason: reason.to_owned(),
            },
        );
    }

    fn disconnect_quietly(&self, connector: &Arc<dyn Connector>) {
        if let Err(error) = invoke("disconnect", || connector.disconnect()) {
            warn!(
                target: HANDLER_TARGET,
                connector = %self.name(),
                error = %error.describe(),
                "connector failed to disconnect"
            );
        }
    }

    fn wait_until_idle(&self) -> MutexGuard<'_, HandlerState> {
        let state = self.lock_state();
        self.idle
            .wait_while(state, |state| state.refreshing)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, HandlerState> {
        lock(&self.state)
    }
}

// The state lock is never held across a connector call, so a poisoned guard
// can only come from a panic in the bookkeeping above and the data is intact.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a connector call, converting a panic into a [`ConnectorError`].
fn invoke<F>(operation: &str, call: F) -> Result<(), ConnectorError>
where
    F: FnOnce() -> Result<(), ConnectorError>,
{
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Err(ConnectorError::new(format!(
            "connector panicked during {operation}: {detail}"
        )))
    })
}

impl std::fmt::Debug for ConnectorHandler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConnectorHandler")
            .field("name", &self.config.name)
            .field("service_marker", &self.config.service_marker)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
