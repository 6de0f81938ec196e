use std::sync::Arc;

use portable_atomic::{AtomicU64, Ordering};

use crate::TimeSource;

/// A clock that only moves when told to, in either direction.
#[derive(Clone, Debug, Default)]
pub(crate) struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub(crate) fn new(millis: u64) -> Self {
        Self(Arc::new(AtomicU64::new(millis)))
    }

    pub(crate) fn set(&self, millis: u64) {
        self.0.store(millis, Ordering::Release);
    }

    pub(crate) fn advance(&self, millis: u64) {
        self.0.fetch_add(millis, Ordering::AcqRel);
    }
}

impl TimeSource for ManualClock {
    fn current_millis(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// A clock that follows tokio's (pausable) timer from a settable base, so
/// tests can step it back and then let sleeps carry it forward.
#[derive(Clone, Debug)]
pub(crate) struct TokioClock {
    origin: tokio::time::Instant,
    base: Arc<AtomicU64>,
}

impl TokioClock {
    pub(crate) fn new(millis: u64) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            base: Arc::new(AtomicU64::new(millis)),
        }
    }

    pub(crate) fn rewind(&self, millis: u64) {
        self.base.fetch_sub(millis, Ordering::AcqRel);
    }
}

impl TimeSource for TokioClock {
    fn current_millis(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.base.load(Ordering::Acquire) + elapsed
    }
}
