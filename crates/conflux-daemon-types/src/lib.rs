//! Status types shared between the integration daemon and its callers.
//!
//! The daemon builds these values from live connector state whenever a
//! caller asks for status. They serialise with RFC 3339 timestamps so a
//! transport layer can forward them without further mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// Lifecycle state of a hosted connector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ConnectorStatus {
    /// Started (or restarted) but not yet refreshed successfully.
    Initializing,
    /// Refreshed at least once and idle.
    Running,
    /// A refresh call is in flight.
    Refreshing,
    /// A connector call failed; only a restart clears this state.
    Failed,
    /// Disconnected during shutdown or removal.
    Stopped,
}

impl ConnectorStatus {
    /// Returns `true` when a refresh may begin from this state.
    #[must_use]
    pub const fn accepts_refresh(self) -> bool {
        matches!(self, Self::Initializing | Self::Running)
    }

    /// Returns `true` when the daemon must not call the connector at all.
    #[must_use]
    pub const fn is_halted(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}

/// Kind of value a connector statistic holds.
///
/// A statistic name keeps its kind for the life of the connector instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatisticKind {
    /// Monotonic count.
    Counter,
    /// Free-form text value.
    Property,
    /// Point in time.
    Timestamp,
}

/// One named statistic published by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConnectorStatistic {
    /// Monotonic count.
    Counter(u64),
    /// Free-form text value.
    Property(String),
    /// Point in time, serialised as RFC 3339.
    Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
}

impl ConnectorStatistic {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> StatisticKind {
        match self {
            Self::Counter(_) => StatisticKind::Counter,
            Self::Property(_) => StatisticKind::Property,
            Self::Timestamp(_) => StatisticKind::Timestamp,
        }
    }
}

/// Point-in-time report for one connector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IntegrationConnectorReport {
    /// Connector name, unique within the daemon.
    pub connector_name: String,
    /// Status at the time the report was taken.
    pub connector_status: ConnectorStatus,
    /// When the status last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub last_status_change: OffsetDateTime,
    /// Completion time of the last successful refresh.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_refresh_time: Option<OffsetDateTime>,
    /// Minimum interval between scheduled refreshes.
    pub min_seconds_between_refresh: u64,
    /// Reason recorded when the connector entered [`ConnectorStatus::Failed`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_exception_message: Option<String>,
    /// Statistics published by the current connector instance.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statistics: BTreeMap<String, ConnectorStatistic>,
}

/// Reports for every connector of one integration service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IntegrationServiceSummary {
    /// Marker identifying the integration service.
    pub service_marker: String,
    /// Connector reports in registration order.
    pub connectors: Vec<IntegrationConnectorReport>,
}

impl IntegrationServiceSummary {
    /// Builds an empty summary for `service_marker`.
    #[must_use]
    pub fn new(service_marker: impl Into<String>) -> Self {
        Self {
            service_marker: service_marker.into(),
            connectors: Vec::new(),
        }
    }

    /// Looks up the report for `connector_name`.
    #[must_use]
    pub fn connector(&self, connector_name: &str) -> Option<&IntegrationConnectorReport> {
        self.connectors
            .iter()
            .find(|report| report.connector_name == connector_name)
    }

    /// Groups `(service_marker, report)` pairs into summaries.
    ///
    /// Services appear in the order their first connector appears, and
    /// reports keep their input order within each service.
    #[must_use]
    pub fn group<I>(reports: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (String, IntegrationConnectorReport)>,
    {
        let mut summaries: Vec<Self> = Vec::new();
        for (service_marker, report) in reports {
            match summaries
                .iter_mut()
                .find(|summary| summary.service_marker == service_marker)
            {
                Some(summary) => summary.connectors.push(report),
                None => {
                    let mut summary = Self::new(service_marker);
                    summary.connectors.push(report);
                    summaries.push(summary);
                }
            }
        }
        summaries
    }
}
