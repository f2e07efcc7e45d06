//! Operator-facing control operations.
//!
//! [`DaemonControl`] is a cheap, cloneable handle onto the running daemon.
//! Every operation names the requesting user for the audit trail; requests
//! are validated before any connector is touched.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use conflux_daemon_types::IntegrationServiceSummary;

use crate::handler::ConnectorHandler;
use crate::registry::{HandlerRegistry, RegistryPoisoned};

const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");

/// Reasons a control request was rejected as malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidParameter {
    /// A required parameter was empty or whitespace.
    #[error("parameter '{parameter}' must not be blank")]
    Blank {
        /// Parameter name.
        parameter: &'static str,
    },
    /// No registration carries the requested service marker.
    #[error(
        "integration service '{service_marker}' is not running in this daemon; valid services are: {valid}"
    )]
    UnknownService {
        /// Requested marker.
        service_marker: String,
        /// Comma-separated list of known markers.
        valid: String,
    },
    /// The named connector does not belong to the requested service.
    #[error("connector '{connector_name}' is not running in integration service '{service_marker}'")]
    UnknownConnector {
        /// Requested service marker.
        service_marker: String,
        /// Requested connector name.
        connector_name: String,
    },
    /// No registration carries the requested connector name.
    #[error("connector '{connector_name}' is not registered with this daemon")]
    UnknownConnectorName {
        /// Requested connector name.
        connector_name: String,
    },
}

/// Errors returned by control operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The request was malformed or named an unknown target.
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] InvalidParameter),
    /// The daemon's internal state could not be read.
    #[error("daemon state unavailable: {source}")]
    PropertyServer {
        /// Underlying failure.
        #[source]
        source: RegistryPoisoned,
    },
}

impl From<RegistryPoisoned> for ControlError {
    fn from(source: RegistryPoisoned) -> Self {
        Self::PropertyServer { source }
    }
}

/// Handle exposing the daemon's control operations.
#[derive(Debug, Clone)]
pub struct DaemonControl {
    registry: HandlerRegistry,
}

impl DaemonControl {
    pub(crate) const fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Refreshes every connector in the daemon, in registration order.
    ///
    /// Connector failures do not fail the request; they are reflected in
    /// the connectors' status.
    ///
    /// # Errors
    ///
    /// Rejects a blank `user_id`.
    pub fn refresh_all_services(&self, user_id: &str) -> Result<(), ControlError> {
        require("user_id", user_id)?;
        let handlers = self.registry.snapshot()?;
        info!(
            target: CONTROL_TARGET,
            user = user_id,
            connectors = handlers.len(),
            "refreshing all services"
        );
        refresh_each(&handlers, user_id);
        Ok(())
    }

    /// Refreshes the connectors of one service, or one connector within it.
    ///
    /// # Errors
    ///
    /// Rejects blank parameters, an unknown service marker, or a connector
    /// name that does not belong to the service.
    pub fn refresh_service(
        &self,
        user_id: &str,
        service_marker: &str,
        connector_name: Option<&str>,
    ) -> Result<(), ControlError> {
        let targets = self.resolve(user_id, service_marker, connector_name)?;
        info!(
            target: CONTROL_TARGET,
            user = user_id,
            service = service_marker,
            connector = connector_name,
            "refreshing service"
        );
        refresh_each(&targets, user_id);
        Ok(())
    }

    /// Restarts the connectors of one service, or one connector within it.
    ///
    /// Each connector is disconnected, rebuilt, and started again, which
    /// clears a [`Failed`](conflux_daemon_types::ConnectorStatus::Failed)
    /// status.
    ///
    /// # Errors
    ///
    /// Same validation as [`refresh_service`](Self::refresh_service).
    pub fn restart_service(
        &self,
        user_id: &str,
        service_marker: &str,
        connector_name: Option<&str>,
    ) -> Result<(), ControlError> {
        let targets = self.resolve(user_id, service_marker, connector_name)?;
        info!(
            target: CONTROL_TARGET,
            user = user_id,
            service = service_marker,
            connector = connector_name,
            "restarting service"
        );
        for handler in &targets {
            handler.restart();
        }
        Ok(())
    }

    /// Reports the status of every connector, grouped by service.
    ///
    /// Returns without waiting for in-flight connector calls.
    ///
    /// # Errors
    ///
    /// Rejects a blank `user_id`.
    pub fn get_integration_daemon_status(
        &self,
        user_id: &str,
    ) -> Result<Vec<IntegrationServiceSummary>, ControlError> {
        require("user_id", user_id)?;
        let handlers = self.registry.snapshot()?;
        Ok(IntegrationServiceSummary::group(handlers.iter().map(
            |handler| (handler.service_marker().to_owned(), handler.report()),
        )))
    }

    fn resolve(
        &self,
        user_id: &str,
        service_marker: &str,
        connector_name: Option<&str>,
    ) -> Result<Vec<Arc<ConnectorHandler>>, ControlError> {
        require("user_id", user_id)?;
        require("service_marker", service_marker)?;
        if let Some(name) = connector_name {
            require("connector_name", name)?;
        }

        let handlers = self.registry.snapshot()?;
        let in_service: Vec<Arc<ConnectorHandler>> = handlers
            .iter()
            .filter(|handler| handler.service_marker() == service_marker)
            .cloned()
            .collect();
        if in_service.is_empty() {
            return Err(InvalidParameter::UnknownService {
                service_marker: service_marker.to_owned(),
                valid: known_markers(&handlers),
            }
            .into());
        }

        let Some(name) = connector_name else {
            return Ok(in_service);
        };
        let matching: Vec<Arc<ConnectorHandler>> = in_service
            .into_iter()
            .filter(|handler| handler.name() == name)
            .collect();
        if matching.is_empty() {
            return Err(InvalidParameter::UnknownConnector {
                service_marker: service_marker.to_owned(),
                connector_name: name.to_owned(),
            }
            .into());
        }
        Ok(matching)
    }
}

fn require(parameter: &'static str, value: &str) -> Result<(), InvalidParameter> {
    if value.trim().is_empty() {
        Err(InvalidParameter::Blank { parameter })
    } else {
        Ok(())
    }
}

fn refresh_each(handlers: &[Arc<ConnectorHandler>], user_id: &str) {
    let reason = format!("requested by {user_id}");
    for handler in handlers {
        handler.refresh_connector(&reason);
    }
}

fn known_markers(handlers: &[Arc<ConnectorHandler>]) -> String {
    let mut markers: Vec<&str> = Vec::new();
    for handler in handlers {
        if !markers.contains(&handler.service_marker()) {
            markers.push(handler.service_marker());
        }
    }
    markers.join(", ")
}
