//! Recording connector and provider with injectable failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use conflux_config::ConnectorConfig;
use once_cell::sync::OnceCell;

use crate::connector::{Connector, ConnectorCatalog, ConnectorError, ConnectorProvider};
use crate::statistics::ConnectorStatistics;

/// Provider name the recording provider registers under.
pub const RECORDING_PROVIDER: &str = "recording";

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters and failure switches shared by every instance of one connector.
#[derive(Debug, Default)]
pub struct ConnectorTally {
    starts: AtomicUsize,
    engages: AtomicUsize,
    refreshes: AtomicUsize,
    disconnects: AtomicUsize,
    fail_start: AtomicBool,
    fail_engage: AtomicBool,
    fail_refresh: AtomicBool,
    fail_disconnect: AtomicBool,
    panic_on_refresh: AtomicBool,
    gate: Mutex<Option<GateEnds>>,
}

#[derive(Debug)]
struct GateEnds {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Test-side ends of a blocked refresh.
pub struct RefreshGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl RefreshGate {
    /// Waits until the blocked refresh has begun.
    pub fn wait_until_entered(&self) {
        self.entered
            .recv_timeout(GATE_TIMEOUT)
            .expect("blocked refresh never started");
    }

    /// Lets the blocked refresh return.
    pub fn release(&self) {
        self.release
            .send(())
            .expect("blocked refresh is no longer waiting");
    }
}

impl ConnectorTally {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn engages(&self) -> usize {
        self.engages.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_engage(&self, fail: bool) {
        self.fail_engage.store(fail, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn panic_on_refresh(&self) {
        self.panic_on_refresh.store(true, Ordering::SeqCst);
    }

    /// Makes the next refresh block until the returned gate is released.
    pub fn block_next_refresh(&self) -> RefreshGate {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().expect("gate mutex poisoned") = Some(GateEnds {
            entered: entered_tx,
            release: release_rx,
        });
        RefreshGate {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

/// Publishes `starts` and `refreshes` counters for its own instance.
struct RecordingConnector {
    tally: Arc<ConnectorTally>,
    statistics: OnceCell<ConnectorStatistics>,
}

impl RecordingConnector {
    fn count(&self, name: &str) {
        if let Some(statistics) = self.statistics.get() {
            statistics
                .increment_counter(name)
                .expect("recording counters keep their kind");
        }
    }
}

impl Connector for RecordingConnector {
    fn start(&self, statistics: &ConnectorStatistics) -> Result<(), ConnectorError> {
        self.statistics.get_or_init(|| statistics.clone());
        self.count("starts");
        self.tally.starts.fetch_add(1, Ordering::SeqCst);
        if self.tally.fail_start.load(Ordering::SeqCst) {
            return Err(ConnectorError::new("start refused"));
        }
        Ok(())
    }

    fn engage(&self) -> Result<(), ConnectorError> {
        self.tally.engages.fetch_add(1, Ordering::SeqCst);
        if self.tally.fail_engage.load(Ordering::SeqCst) {
            return Err(ConnectorError::new("engage lost its session"));
        }
        Ok(())
    }

    fn refresh(&self) -> Result<(), ConnectorError> {
        self.tally.refreshes.fetch_add(1, Ordering::SeqCst);
        let gate = self.tally.gate.lock().expect("gate mutex poisoned").take();
        if let Some(gate) = gate {
            gate.entered.send(()).expect("gate receiver dropped");
            gate.release
                .recv_timeout(GATE_TIMEOUT)
                .expect("blocked refresh was never released");
        }
        if self.tally.panic_on_refresh.load(Ordering::SeqCst) {
            panic!("refresh exploded");
        }
        if self.tally.fail_refresh.load(Ordering::SeqCst) {
            return Err(ConnectorError::new("upstream rejected refresh"));
        }
        self.count("refreshes");
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ConnectorError> {
        self.tally.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.tally.fail_disconnect.load(Ordering::SeqCst) {
            return Err(ConnectorError::new("disconnect timed out"));
        }
        Ok(())
    }
}

/// Provider that hands out recording connectors keyed by connector name.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    tallies: Arc<Mutex<HashMap<String, Arc<ConnectorTally>>>>,
    refused: Arc<Mutex<HashSet<String>>>,
    creations: Arc<AtomicUsize>,
}

impl RecordingProvider {
    /// Returns the tally for `name`, creating it on first use.
    pub fn tally(&self, name: &str) -> Arc<ConnectorTally> {
        let mut tallies = self.tallies.lock().expect("tally mutex poisoned");
        Arc::clone(tallies.entry(name.to_owned()).or_default())
    }

    /// Makes construction of `name` fail.
    pub fn refuse(&self, name: &str) {
        self.refused
            .lock()
            .expect("refusal mutex poisoned")
            .insert(name.to_owned());
    }

    /// Lets construction of `name` succeed again.
    pub fn allow(&self, name: &str) {
        self.refused
            .lock()
            .expect("refusal mutex poisoned")
            .remove(name);
    }

    /// Number of connector instances created so far.
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    /// Catalog holding only this provider.
    pub fn catalog(&self) -> ConnectorCatalog {
        let mut catalog = ConnectorCatalog::new();
        catalog
            .register(RECORDING_PROVIDER, self.clone())
            .expect("recording provider registers");
        catalog
    }
}

impl ConnectorProvider for RecordingProvider {
    fn create(&self, config: &ConnectorConfig) -> Result<Arc<dyn Connector>, ConnectorError> {
        let refused = self
            .refused
            .lock()
            .expect("refusal mutex poisoned")
            .contains(&config.name);
        if refused {
            return Err(ConnectorError::new(format!(
                "cannot build connector '{}'",
                config.name
            )));
        }
        self.creations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingConnector {
            tally: self.tally(&config.name),
            statistics: OnceCell::new(),
        }))
    }
}
