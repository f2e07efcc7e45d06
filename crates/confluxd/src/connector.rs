//! Connector contract and the catalog of providers that build connectors.
//!
//! A connector is the pluggable unit of integration work hosted by the
//! daemon. The daemon never constructs connectors itself: each registration
//! names a provider, and the provider builds a fresh connector instance on
//! startup and on every restart.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use conflux_config::ConnectorConfig;

use crate::command_connector::{COMMAND_PROVIDER, CommandConnectorProvider};
use crate::statistics::ConnectorStatistics;

/// Lifecycle operations the daemon invokes on a hosted connector.
///
/// Implementations are called from the scheduler thread, from control
/// requests, and (for blocking connectors) from a dedicated engage thread.
/// The daemon guarantees that `refresh` never overlaps itself for one
/// registration; `engage` may run alongside `refresh`.
pub trait Connector: Send + Sync {
    /// Prepares the connector for work.
    ///
    /// `statistics` belongs to this instance; values recorded through it
    /// appear in status reports until the connector is restarted.
    fn start(&self, statistics: &ConnectorStatistics) -> Result<(), ConnectorError>;

    /// Performs one unit of long-running work on the engage thread.
    ///
    /// Only called for registrations with `uses_blocking_calls` set.
    fn engage(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Performs one unit of periodic or requested work.
    fn refresh(&self) -> Result<(), ConnectorError>;

    /// Releases resources held by the connector.
    fn disconnect(&self) -> Result<(), ConnectorError>;
}

/// Failure reported by a connector or a connector provider.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectorError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ConnectorError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Message followed by every source in the chain, joined by `": "`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut description = self.message.clone();
        let mut source = self.source();
        while let Some(cause) = source {
            description.push_str(": ");
            description.push_str(&cause.to_string());
            source = cause.source();
        }
        description
    }
}

/// Builds connector instances from their registration.
pub trait ConnectorProvider: Send + Sync {
    /// Creates a fresh, unstarted connector.
    fn create(&self, config: &ConnectorConfig) -> Result<Arc<dyn Connector>, ConnectorError>;
}

impl<F> ConnectorProvider for F
where
    F: Fn(&ConnectorConfig) -> Result<Arc<dyn Connector>, ConnectorError> + Send + Sync,
{
    fn create(&self, config: &ConnectorConfig) -> Result<Arc<dyn Connector>, ConnectorError> {
        self(config)
    }
}

/// Errors raised while registering providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A provider with the same name is already registered.
    #[error("connector provider '{name}' is already registered")]
    DuplicateProvider {
        /// Provider name.
        name: String,
    },
    /// The provider name was blank.
    #[error("connector provider names must not be blank")]
    BlankName,
}

/// Named connector providers available to the daemon.
#[derive(Clone, Default)]
pub struct ConnectorCatalog {
    providers: HashMap<String, Arc<dyn ConnectorProvider>>,
}

impl ConnectorCatalog {
    /// Builds an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog holding the providers shipped with the daemon.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut providers: HashMap<String, Arc<dyn ConnectorProvider>> = HashMap::new();
        providers.insert(
            COMMAND_PROVIDER.to_owned(),
            Arc::new(CommandConnectorProvider::new()),
        );
        Self { providers }
    }

    /// Registers `provider` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateProvider`] if the name is taken and
    /// [`CatalogError::BlankName`] if it is blank.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: impl ConnectorProvider + 'static,
    ) -> Result<(), CatalogError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CatalogError::BlankName);
        }
        if self.providers.contains_key(&name) {
            return Err(CatalogError::DuplicateProvider { name });
        }
        self.providers.insert(name, Arc::new(provider));
        Ok(())
    }

    /// Looks up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ConnectorProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` when no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ConnectorCatalog {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectorCatalog")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct IdleConnector;

    impl Connector for IdleConnector {
        fn start(&self, _statistics: &ConnectorStatistics) -> Result<(), ConnectorError> {
            Ok(())
        }

        fn refresh(&self) -> Result<(), ConnectorError> {
            Ok(())
        }

        fn disconnect(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    fn idle_provider(_config: &ConnectorConfig) -> Result<Arc<dyn Connector>, ConnectorError> {
        Ok(Arc::new(IdleConnector))
    }

    #[test]
    fn builtin_catalog_offers_command_provider() {
        let catalog = ConnectorCatalog::with_builtin();
        assert_eq!(catalog.names(), vec![COMMAND_PROVIDER]);
        assert!(catalog.get(COMMAND_PROVIDER).is_some());
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let mut catalog = ConnectorCatalog::new();
        catalog
            .register("idle", idle_provider)
            .expect("first registration succeeds");
        let error = catalog
            .register("idle", idle_provider)
            .expect_err("duplicate registration fails");
        assert_eq!(
            error,
            CatalogError::DuplicateProvider {
                name: "idle".to_owned()
            }
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn blank_provider_name_is_rejected() {
        let mut catalog = ConnectorCatalog::new();
        assert_eq!(
            catalog.register("  ", idle_provider),
            Err(CatalogError::BlankName)
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn closures_act_as_providers() {
        let mut catalog = ConnectorCatalog::new();
        catalog
            .register("idle", idle_provider)
            .expect("registration succeeds");
        let provider = catalog.get("idle").expect("provider registered");
        let connector = provider
            .create(&ConnectorConfig::new("c1", "svc", "idle"))
            .expect("connector builds");
        assert!(connector.engage().is_ok());
    }

    #[test]
    fn describe_walks_the_source_chain() {
        let error = ConnectorError::with_source(
            "refresh failed",
            io::Error::new(io::ErrorKind::TimedOut, "upstream timed out"),
        );
        assert_eq!(error.to_string(), "refresh failed");
        assert_eq!(error.describe(), "refresh failed: upstream timed out");
    }
}
