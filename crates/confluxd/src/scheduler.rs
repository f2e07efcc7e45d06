//! The scheduler loop that drives periodic refreshes.
//!
//! One background thread wakes every tick interval and walks the registry
//! in registration order. A connector that has never refreshed is refreshed
//! on the first tick that finds it; afterwards it is refreshed once its
//! minimum interval has elapsed. A minimum interval of zero leaves the
//! connector to manual refreshes after that first one.
//!
//! Shutdown uses the shared [`ShutdownToken`], so a stopping daemon does not
//! wait out the remainder of a tick.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::audit::{AuditEventKind, DaemonContext};
use crate::cancel::ShutdownToken;
use crate::handler::{ConnectorHandler, RefreshOutcome};
use crate::registry::HandlerRegistry;

pub(crate) const SCHEDULER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scheduler");

/// Errors surfaced while running the scheduler thread.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Spawning the scheduler thread failed.
    #[error("failed to spawn scheduler thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The scheduler thread panicked.
    #[error("scheduler thread panicked")]
    ThreadPanic,
}

/// Returns `true` when a connector is due for a scheduled refresh at `now`.
///
/// Never-refreshed connectors are always due. After the first refresh a
/// zero interval disables scheduling; otherwise the connector is due once
/// `min_seconds_between_refresh` seconds have passed since the last
/// refresh completed.
#[must_use]
pub fn is_due(
    last_refresh_time: Option<SystemTime>,
    min_seconds_between_refresh: u64,
    now: SystemTime,
) -> bool {
    match last_refresh_time {
        None => true,
        Some(_) if min_seconds_between_refresh == 0 => false,
        Some(last) => last
            .checked_add(Duration::from_secs(min_seconds_between_refresh))
            .is_some_and(|next| next <= now),
    }
}

/// Record of one refresh started by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRefresh {
    /// Connector that was due.
    pub connector_name: String,
    /// What the refresh attempt produced.
    pub outcome: RefreshOutcome,
}

/// Scheduler state shared between the tick loop and direct callers.
#[derive(Clone)]
pub struct SchedulerLoop {
    registry: HandlerRegistry,
    context: Arc<DaemonContext>,
    tick_interval: Duration,
}

impl SchedulerLoop {
    pub(crate) fn new(
        registry: HandlerRegistry,
        context: Arc<DaemonContext>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            registry,
            context,
            tick_interval,
        }
    }

    /// Runs one scheduling pass against `now`.
    ///
    /// Handlers that are refreshing, failed, or stopped are left alone. The
    /// returned records list every refresh this pass attempted.
    pub fn tick(&self, now: SystemTime) -> Vec<ScheduledRefresh> {
        let handlers = match self.registry.snapshot() {
            Ok(handlers) => handlers,
            Err(poisoned) => {
                error!(
                    target: SCHEDULER_TARGET,
                    error = %poisoned,
                    "skipping scheduler tick"
                );
                return Vec::new();
            }
        };
        handlers
            .iter()
            .filter_map(|handler| self.visit(handler, now))
            .collect()
    }

    fn visit(&self, handler: &ConnectorHandler, now: SystemTime) -> Option<ScheduledRefresh> {
        if !handler.status().accepts_refresh() {
            return None;
        }
        let last_refresh_time = handler.last_refresh_time();
        if !is_due(last_refresh_time, handler.min_seconds_between_refresh(), now) {
            return None;
        }
        let kind = if last_refresh_time.is_none() {
            AuditEventKind::FirstRefresh
        } else {
            AuditEventKind::ScheduledRefresh
        };
        let outcome = handler.refresh_scheduled(kind);
        debug!(
            target: SCHEDULER_TARGET,
            connector = %handler.name(),
            ?outcome,
            "scheduled refresh finished"
        );
        Some(ScheduledRefresh {
            connector_name: handler.name().to_owned(),
            outcome,
        })
    }

    /// Spawns the scheduler thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the thread cannot be created.
    pub fn start(self, token: ShutdownToken) -> Result<SchedulerHandle, SchedulerError> {
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name("conflux-scheduler".to_owned())
            .spawn(move || self.run(&thread_token))
            .map_err(|source| SchedulerError::Spawn { source })?;
        Ok(SchedulerHandle {
            token,
            handle: Some(handle),
        })
    }

    fn run(&self, token: &ShutdownToken) {
        let connector_count = self.registry.snapshot().map_or(0, |handlers| handlers.len());
        self.context
            .audit(None, AuditEventKind::DaemonStarting { connector_count });
        info!(
            target: SCHEDULER_TARGET,
            tick_interval = ?self.tick_interval,
            connector_count,
            "scheduler started"
        );
        while !token.is_cancelled() {
            self.tick(self.context.now());
            if token.wait_timeout(self.tick_interval) {
                break;
            }
        }
        self.context.audit(None, AuditEventKind::DaemonStopping);
        info!(target: SCHEDULER_TARGET, "scheduler stopped");
    }
}

/// Handle to the running scheduler thread.
#[derive(Debug)]
pub struct SchedulerHandle {
    token: ShutdownToken,
    handle: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Requests that the scheduler stop after its current tick.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Waits for the scheduler thread to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ThreadPanic`] if the thread panicked.
    pub fn join(mut self) -> Result<(), SchedulerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SchedulerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const T0: Duration = Duration::from_secs(1_700_000_000);

    fn at(offset_secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + T0 + Duration::from_secs(offset_secs)
    }

    #[rstest]
    #[case(None, 0, 0, true)]
    #[case(None, 60, 0, true)]
    #[case(Some(0), 0, 10_000, false)]
    #[case(Some(0), 60, 59, false)]
    #[case(Some(0), 60, 60, true)]
    #[case(Some(0), 60, 61, true)]
    #[case(Some(100), 5, 104, false)]
    #[case(Some(100), 5, 105, true)]
    fn due_calculation(
        #[case] last_refresh: Option<u64>,
        #[case] min_seconds: u64,
        #[case] now: u64,
        #[case] expected: bool,
    ) {
        assert_eq!(is_due(last_refresh.map(at), min_seconds, at(now)), expected);
    }

    #[test]
    fn overflowing_interval_is_never_due() {
        assert!(!is_due(Some(at(0)), u64::MAX, at(1)));
    }
}
