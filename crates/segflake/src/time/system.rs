use std::time::{SystemTime, UNIX_EPOCH};

use crate::TimeSource;

/// A raw wall-clock time source.
///
/// Reads [`SystemTime::now`] on every call, so NTP corrections or manual
/// adjustments show up as-is, including jumps backwards. Pair it with a
/// [`ClockBackwardsPolicy`] that matches how your hosts are operated.
///
/// [`ClockBackwardsPolicy`]: crate::ClockBackwardsPolicy
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        // A clock set before 1970 reads as zero, which every layout rejects
        // as being before its epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
