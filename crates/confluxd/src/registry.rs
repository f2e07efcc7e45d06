//! Shared, ordered collection of connector handlers.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::handler::ConnectorHandler;

/// The registry lock was poisoned by a panicking writer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("connector registry lock was poisoned")]
pub struct RegistryPoisoned;

impl<T> From<PoisonError<T>> for RegistryPoisoned {
    fn from(_: PoisonError<T>) -> Self {
        Self
    }
}

/// Handlers in registration order, shared by the scheduler and control API.
#[derive(Debug, Clone, Default)]
pub(crate) struct HandlerRegistry {
    handlers: Arc<RwLock<Vec<Arc<ConnectorHandler>>>>,
}

impl HandlerRegistry {
    pub(crate) fn new(handlers: Vec<Arc<ConnectorHandler>>) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(handlers)),
        }
    }

    /// Copies the current handler list so callers can iterate without
    /// holding the lock across connector calls.
    pub(crate) fn snapshot(&self) -> Result<Vec<Arc<ConnectorHandler>>, RegistryPoisoned> {
        Ok(self.handlers.read()?.clone())
    }

    /// Removes the handler named `connector_name`, returning it.
    pub(crate) fn remove(
        &self,
        connector_name: &str,
    ) -> Result<Option<Arc<ConnectorHandler>>, RegistryPoisoned> {
        let mut handlers = self.handlers.write()?;
        let position = handlers
            .iter()
            .position(|handler| handler.name() == connector_name);
        Ok(position.map(|index| handlers.remove(index)))
    }
}
