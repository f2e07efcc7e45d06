//! Audit trail for daemon and connector lifecycle events.
//!
//! Events flow through the write-only [`AuditSink`] seam. The daemon ships
//! [`StructuredAuditSink`], which records events with `tracing`; tests and
//! embedders substitute their own sink.

use std::sync::Arc;
use std::time::SystemTime;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::clock::Clock;

pub(crate) const AUDIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::audit");

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEventKind {
    /// The scheduler thread started.
    DaemonStarting {
        /// Number of registrations the daemon hosts.
        connector_count: usize,
    },
    /// The scheduler thread is exiting.
    DaemonStopping,
    /// The scheduler is refreshing a connector for the first time.
    FirstRefresh,
    /// The scheduler is refreshing a connector whose interval elapsed.
    ScheduledRefresh,
    /// A connector call failed and the connector is now halted.
    ConnectorFailed {
        /// Failure description.
        reason: String,
    },
    /// A connector was restarted on request.
    ConnectorRestarted,
}

impl AuditEventKind {
    /// Stable identifier used as the `event` field in telemetry.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DaemonStarting { .. } => "daemon_starting",
            Self::DaemonStopping => "daemon_stopping",
            Self::FirstRefresh => "first_refresh",
            Self::ScheduledRefresh => "scheduled_refresh",
            Self::ConnectorFailed { .. } => "connector_failed",
            Self::ConnectorRestarted => "connector_restarted",
        }
    }
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// When the event was raised.
    pub timestamp: SystemTime,
    /// Name of the daemon raising the event.
    pub daemon_name: String,
    /// Connector the event concerns, if any.
    pub connector_name: Option<String>,
    /// Event payload.
    pub kind: AuditEventKind,
}

/// Write-only destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Records `event`. Implementations must not block for long.
    fn record(&self, event: &AuditEvent);
}

impl<T> AuditSink for Arc<T>
where
    T: AuditSink + ?Sized,
{
    fn record(&self, event: &AuditEvent) {
        (**self).record(event);
    }
}

/// Default sink that records audit events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredAuditSink;

impl StructuredAuditSink {
    /// Builds a new sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for StructuredAuditSink {
    fn record(&self, event: &AuditEvent) {
        let at = OffsetDateTime::from(event.timestamp);
        let connector = event.connector_name.as_deref().unwrap_or_default();
        match &event.kind {
            AuditEventKind::DaemonStarting { connector_count } => info!(
                target: AUDIT_TARGET,
                event = event.kind.code(),
                daemon = %event.daemon_name,
                connector_count,
                %at,
                "integration daemon starting"
            ),
            AuditEventKind::DaemonStopping => info!(
                target: AUDIT_TARGET,
                event = event.kind.code(),
                daemon = %event.daemon_name,
                %at,
                "integration daemon stopping"
            ),
            AuditEventKind::FirstRefresh => info!(
                target: AUDIT_TARGET,
                event = event.kind.code(),
                daemon = %event.daemon_name,
                connector,
                %at,
                "first refresh of connector"
            ),
            AuditEventKind::ScheduledRefresh => info!(
                target: AUDIT_TARGET,
                event = event.kind.code(),
                daemon = %event.daemon_name,
                connector,
                %at,
                "scheduled refresh of connector"
            ),
            AuditEventKind::ConnectorFailed { reason } => warn!(
                target: AUDIT_TARGET,
                event = event.kind.code(),
                daemon = %event.daemon_name,
                connector,
                reason = %reason,
                %at,
                "connector failed"
            ),
            AuditEventKind::ConnectorRestarted => info!(
                target: AUDIT_TARGET,
                event = event.kind.code(),
                daemon = %event.daemon_name,
                connector,
                %at,
                "connector restarted"
            ),
        }
    }
}

/// Shared collaborators every handler and the scheduler need.
pub struct DaemonContext {
    daemon_name: String,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl DaemonContext {
    /// Bundles the daemon name, audit sink, and clock.
    #[must_use]
    pub fn new(
        daemon_name: impl Into<String>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            daemon_name: daemon_name.into(),
            audit,
            clock,
        }
    }

    /// Name reported in audit events.
    #[must_use]
    pub fn daemon_name(&self) -> &str {
        self.daemon_name.as_str()
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    pub(crate) fn audit(&self, connector_name: Option<&str>, kind: AuditEventKind) {
        self.audit.record(&AuditEvent {
            timestamp: self.now(),
            daemon_name: self.daemon_name.clone(),
            connector_name: connector_name.map(str::to_owned),
            kind,
        });
    }
}
