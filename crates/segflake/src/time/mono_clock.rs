use core::time::Duration;
use std::{
    sync::{Arc, Weak},
    thread,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use portable_atomic::{AtomicU64, Ordering};

use crate::TimeSource;

/// Milliseconds since the clock's origin, published by a background thread.
#[derive(Debug, Default)]
struct Ticker {
    elapsed_millis: AtomicU64,
}

/// A wall-clock aligned time source that never goes backwards.
///
/// The Unix time is sampled once at construction. From then on the clock is
/// advanced from elapsed [`Instant`] time, so NTP or manual adjustments of
/// the system clock are not observed. The trade-off is drift: a long-running
/// process follows its monotonic timer, not the corrected wall clock.
///
/// Reads come from an atomic refreshed once per millisecond by a ticker
/// thread. If that thread cannot be spawned, reads measure the elapsed time
/// themselves.
///
/// Cloning is cheap and clones share the same ticker. The ticker thread exits
/// once every clone has been dropped.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
    unix_offset: u64, // in milliseconds
    ticker: Option<Arc<Ticker>>,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Constructs a clock anchored at the current system time.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use segflake::{MonotonicClock, TimeSource};
    ///
    /// let clock = MonotonicClock::new();
    /// let before = clock.current_millis();
    /// std::thread::sleep(Duration::from_millis(5));
    /// assert!(clock.current_millis() >= before);
    /// ```
    pub fn new() -> Self {
        let origin = Instant::now();
        let unix_offset = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, millis);

        let ticker = Arc::new(Ticker::default());
        let weak = Arc::downgrade(&ticker);
        let spawned = thread::Builder::new()
            .name(String::from("segflake-clock"))
            .spawn(move || tick(&weak, origin));

        Self {
            origin,
            unix_offset,
            ticker: spawned.ok().map(|_| ticker),
        }
    }

    fn elapsed_millis(&self) -> u64 {
        match &self.ticker {
            Some(ticker) => ticker.elapsed_millis.load(Ordering::Acquire),
            None => millis(self.origin.elapsed()),
        }
    }
}

/// Publishes elapsed milliseconds until every clock sharing the ticker is
/// gone.
fn tick(weak: &Weak<Ticker>, origin: Instant) {
    while let Some(ticker) = weak.upgrade() {
        let elapsed = origin.elapsed();
        ticker
            .elapsed_millis
            .store(millis(elapsed), Ordering::Release);
        drop(ticker);

        // Wake on the next millisecond boundary relative to `origin`.
        let into_tick = elapsed.subsec_nanos() % 1_000_000;
        thread::sleep(Duration::from_nanos(u64::from(1_000_000 - into_tick)));
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl TimeSource for MonotonicClock {
    fn current_millis(&self) -> u64 {
        self.unix_offset + self.elapsed_millis()
    }
}
