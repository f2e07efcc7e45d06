//! Shutdown signal the tests trigger by hand.

use std::sync::{Arc, Condvar, Mutex};

use crate::process::{ShutdownError, ShutdownSignal};

#[derive(Clone, Default)]
pub struct TestShutdownSignal {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (lock, condvar) = &*self.state;
        *lock.lock().expect("shutdown mutex poisoned") = true;
        condvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, condvar) = &*self.state;
        let triggered = lock.lock().expect("shutdown mutex poisoned");
        let _triggered = condvar
            .wait_while(triggered, |triggered| !*triggered)
            .expect("shutdown mutex poisoned");
        Ok(())
    }
}
