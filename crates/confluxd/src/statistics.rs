//! Named statistics a connector publishes through the daemon.
//!
//! The daemon hands each connector instance a fresh [`ConnectorStatistics`]
//! when it starts. The connector records counters, text properties and
//! timestamps under names of its choosing, and the status report carries a
//! snapshot of them. A name keeps the kind it was first recorded with.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use thiserror::Error;
use time::OffsetDateTime;

use conflux_daemon_types::{ConnectorStatistic, StatisticKind};

/// Rejected statistic update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatisticsError {
    /// Statistic names must contain a non-whitespace character.
    #[error("statistic name must not be blank")]
    BlankName,
    /// The name already holds a value of another kind.
    #[error(
        "'{name}' is already in use as a {existing} statistic and cannot be used by \
         {method} to record a {requested}"
    )]
    NameInUse {
        /// Contested statistic name.
        name: String,
        /// Kind already recorded under the name.
        existing: StatisticKind,
        /// Kind the caller tried to record.
        requested: StatisticKind,
        /// Recording method that was called.
        method: &'static str,
    },
}

/// Statistics store shared between one connector instance and its handler.
///
/// Clones share the same values.
#[derive(Debug, Clone, Default)]
pub struct ConnectorStatistics {
    values: Arc<Mutex<BTreeMap<String, ConnectorStatistic>>>,
}

impl ConnectorStatistics {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to the counter `name`, starting it at zero.
    ///
    /// # Errors
    ///
    /// Fails when `name` is blank or already holds a non-counter value.
    pub fn increment_counter(&self, name: &str) -> Result<u64, StatisticsError> {
        self.add_to_counter(name, 1)
    }

    /// Adds `amount` to the counter `name`, saturating at `u64::MAX`.
    ///
    /// # Errors
    ///
    /// Fails when `name` is blank or already holds a non-counter value.
    pub fn add_to_counter(&self, name: &str, amount: u64) -> Result<u64, StatisticsError> {
        let mut total = amount;
        self.record(
            "add_to_counter",
            name,
            StatisticKind::Counter,
            |current| {
                if let Some(ConnectorStatistic::Counter(value)) = current {
                    total = value.saturating_add(amount);
                }
                ConnectorStatistic::Counter(total)
            },
        )?;
        Ok(total)
    }

    /// Sets the text property `name`.
    ///
    /// # Errors
    ///
    /// Fails when `name` is blank or already holds a non-property value.
    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), StatisticsError> {
        let value = value.into();
        self.record("set_property", name, StatisticKind::Property, |_| {
            ConnectorStatistic::Property(value)
        })
    }

    /// Sets the timestamp `name`.
    ///
    /// # Errors
    ///
    /// Fails when `name` is blank or already holds a non-timestamp value.
    pub fn set_timestamp(&self, name: &str, at: SystemTime) -> Result<(), StatisticsError> {
        self.record("set_timestamp", name, StatisticKind::Timestamp, |_| {
            ConnectorStatistic::Timestamp(OffsetDateTime::from(at))
        })
    }

    /// Current value of `name`, if recorded.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ConnectorStatistic> {
        self.lock().get(name).cloned()
    }

    /// Copy of every recorded statistic, ordered by name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, ConnectorStatistic> {
        self.lock().clone()
    }

    fn record(
        &self,
        method: &'static str,
        name: &str,
        requested: StatisticKind,
        update: impl FnOnce(Option<&ConnectorStatistic>) -> ConnectorStatistic,
    ) -> Result<(), StatisticsError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StatisticsError::BlankName);
        }
        let mut values = self.lock();
        let current = values.get(name);
        match current.map(ConnectorStatistic::kind) {
            Some(existing) if existing != requested => {
                return Err(StatisticsError::NameInUse {
                    name: name.to_owned(),
                    existing,
                    requested,
                    method,
                });
            }
            _ => {}
        }
        let next = update(current);
        values.insert(name.to_owned(), next);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ConnectorStatistic>> {
        // Values stay consistent across a panicking caller; every update is
        // a single insert.
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
