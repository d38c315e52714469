use crate::time::{Duration, Time};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now(&self) -> Time;
}

pub struct SystemClock {}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {}
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Time {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Time(d.as_secs() as i64 * 1_000_000_000 + i64::from(d.subsec_nanos())),
            Err(_) => Time(0),
        }
    }
}

#[derive(Clone)]
pub struct MockClock {
    ts: Arc<AtomicI64>,
}

impl MockClock {
    pub fn new(ts: Time) -> MockClock {
        MockClock {
            ts: Arc::new(AtomicI64::new(ts.nanos())),
        }
    }

    pub fn tick(&self, d: Duration) {
        self.ts.fetch_add(d.nanos(), Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Time {
        Time(self.ts.load(Ordering::SeqCst))
    }
}
