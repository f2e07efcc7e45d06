//! Dedicated threads for connectors that make blocking calls.
//!
//! Each registration with `uses_blocking_calls` gets one worker that calls
//! `engage` repeatedly, pausing between calls. A failed handler idles until
//! it is restarted; a stopped handler ends the worker.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use conflux_daemon_types::ConnectorStatus;

use crate::cancel::ShutdownToken;
use crate::handler::{ConnectorHandler, EngageOutcome};

const ENGAGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engage");

/// Running engage thread for one connector.
#[derive(Debug)]
pub(crate) struct EngageWorker {
    connector_name: String,
    handle: JoinHandle<()>,
}

impl EngageWorker {
    pub(crate) fn spawn(
        handler: Arc<ConnectorHandler>,
        token: ShutdownToken,
        pause: Duration,
    ) -> io::Result<Self> {
        let connector_name = handler.name().to_owned();
        let handle = thread::Builder::new()
            .name(format!("conflux-engage-{connector_name}"))
            .spawn(move || run(&handler, &token, pause))?;
        Ok(Self {
            connector_name,
            handle,
        })
    }

    pub(crate) fn connector_name(&self) -> &str {
        self.connector_name.as_str()
    }

    /// Waits for the worker to exit, logging a panic instead of propagating.
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            warn!(
                target: ENGAGE_TARGET,
                connector = %self.connector_name,
                "engage thread panicked"
            );
        }
    }
}

fn run(handler: &ConnectorHandler, token: &ShutdownToken, pause: Duration) {
    debug!(target: ENGAGE_TARGET, connector = %handler.name(), "engage thread started");
    while !token.is_cancelled() {
        match handler.status() {
            ConnectorStatus::Stopped => break,
            ConnectorStatus::Failed => {}
            _ => {
                if let EngageOutcome::Failed(reason) = handler.engage_connector() {
                    debug!(
                        target: ENGAGE_TARGET,
                        connector = %handler.name(),
                        reason = %reason,
                        "engage failed; waiting for restart"
                    );
                }
            }
        }
        if token.wait_timeout(pause) {
            break;
        }
    }
    debug!(target: ENGAGE_TARGET, connector = %handler.name(), "engage thread stopped");
}
