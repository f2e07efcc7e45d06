//! Scenario world shared across the scheduling and control BDD steps.

use std::sync::Arc;

use conflux_config::ConnectorConfig;
use conflux_daemon_types::IntegrationConnectorReport;

use crate::audit::AuditEventKind;
use crate::control::ControlError;

use super::{ConnectorTally, Harness, RecordingProvider, registration};

pub struct TestWorld {
    provider: RecordingProvider,
    registrations: Vec<ConnectorConfig>,
    harness: Option<Harness>,
    control_result: Option<Result<(), ControlError>>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            provider: RecordingProvider::default(),
            registrations: Vec::new(),
            harness: None,
            control_result: None,
        }
    }

    pub fn register(&mut self, name: &str, service_marker: &str, min_seconds: u64) {
        self.registrations
            .push(registration(name, service_marker, min_seconds));
    }

    pub fn tally(&self, name: &str) -> Arc<ConnectorTally> {
        self.provider.tally(name)
    }

    pub fn assemble(&mut self) -> Result<(), String> {
        if self.harness.is_some() {
            return Err("daemon already assembled".to_owned());
        }
        self.harness = Some(Harness::with_provider(
            self.provider.clone(),
            self.registrations.clone(),
        ));
        Ok(())
    }

    pub fn harness(&self) -> Result<&Harness, String> {
        self.harness
            .as_ref()
            .ok_or_else(|| "daemon has not been assembled".to_owned())
    }

    pub fn tick(&self) -> Result<(), String> {
        self.harness()?.tick();
        Ok(())
    }

    pub fn advance_secs(&self, seconds: u64) -> Result<(), String> {
        self.harness()?.advance_secs(seconds);
        Ok(())
    }

    pub fn record_control(&mut self, result: Result<(), ControlError>) {
        self.control_result = Some(result);
    }

    pub fn control_result(&self) -> Result<&Result<(), ControlError>, String> {
        self.control_result
            .as_ref()
            .ok_or_else(|| "no control request was made".to_owned())
    }

    pub fn report(&self, name: &str) -> Result<IntegrationConnectorReport, String> {
        Ok(self.harness()?.report(name))
    }

    pub fn audit_kinds(&self, name: &str) -> Result<Vec<AuditEventKind>, String> {
        Ok(self.harness()?.audit.kinds_for(name))
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
