//! Manually advanced clock.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;

const START: Duration = Duration::from_secs(1_700_000_000);

pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(SystemTime::UNIX_EPOCH + START),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock mutex poisoned")
    }
}
