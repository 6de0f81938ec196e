use core::time::Duration;

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{Error, Result};

/// Largest ID any generator hands out.
///
/// IDs stay within the positive range of a signed 64-bit integer so they can
/// be stored in `BIGINT` columns and passed through languages without
/// unsigned integers.
pub const MAX_ID: u64 = i64::MAX as u64;

/// A contiguous range of IDs granted by a [`SegmentRepository`].
///
/// The range is `[max_value - step + 1, max_value]`, both ends inclusive.
///
/// [`SegmentRepository`]: crate::SegmentRepository
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    pub namespace: String,
    pub max_value: u64,
    pub step: u64,
}

impl Segment {
    pub fn new(namespace: impl Into<String>, max_value: u64, step: u64) -> Self {
        Self {
            namespace: namespace.into(),
            max_value,
            step,
        }
    }

    /// First value of the range, or `None` if the range is malformed.
    pub fn min_value(&self) -> Option<u64> {
        self.max_value.checked_sub(self.step)?.checked_add(1)
    }
}

/// Runtime cursor over a granted [`Segment`].
///
/// The cursor holds the last value handed out and only moves forward. Each
/// advance is a compare-and-swap, so concurrent callers never receive the
/// same value and the cursor never passes `max_value`.
#[derive(Debug)]
pub struct IdSegment {
    max_value: u64,
    step: u64,
    /// Last issued value; starts one below the range.
    cursor: AtomicU64,
    fetched_at: Instant,
    ttl: Option<Duration>,
}

impl IdSegment {
    /// Validates a granted segment and opens a cursor on it.
    ///
    /// # Errors
    ///
    /// - [`Error::SegmentOverflow`] if the range leaves `[1, MAX_ID]`.
    /// - [`Error::InvalidConfig`] if the range is empty.
    pub fn new(segment: &Segment, ttl: Option<Duration>) -> Result<Self> {
        if segment.step == 0 {
            return Err(Error::invalid_config(format!(
                "repository granted an empty segment for namespace `{}`",
                segment.namespace
            )));
        }
        if segment.max_value > MAX_ID || segment.max_value < segment.step {
            return Err(Error::SegmentOverflow {
                namespace: segment.namespace.clone(),
                max_value: segment.max_value,
                step: segment.step,
            });
        }
        let offset = segment.max_value - segment.step;
        Ok(Self {
            max_value: segment.max_value,
            step: segment.step,
            cursor: AtomicU64::new(offset),
            fetched_at: Instant::now(),
            ttl,
        })
    }

    /// Claims the next value, or `None` once the segment is exhausted or has
    /// outlived its TTL.
    #[inline]
    pub fn try_next(&self) -> Option<u64> {
        if self.is_expired() {
            return None;
        }
        self.cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max_value).then(|| current + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub fn min_value(&self) -> u64 {
        self.max_value - self.step + 1
    }

    pub const fn max_value(&self) -> u64 {
        self.max_value
    }

    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Last value handed out (one below [`Self::min_value`] before the first
    /// claim).
    pub fn value(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Values still available in this segment.
    pub fn remaining(&self) -> u64 {
        self.max_value - self.value()
    }

    pub fn is_expired(&self) -> bool {
        self.ttl
            .is_some_and(|ttl| self.fetched_at.elapsed() >= ttl)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0 || self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_walks_the_whole_range_then_stops() {
        let segment = IdSegment::new(&Segment::new("ns", 10, 5), None).unwrap();
        assert_eq!(segment.min_value(), 6);
        let issued: Vec<_> = core::iter::from_fn(|| segment.try_next()).collect();
        assert_eq!(issued, vec![6, 7, 8, 9, 10]);
        assert!(segment.is_exhausted());
        assert_eq!(segment.try_next(), None);
        assert_eq!(segment.value(), 10);
    }

    #[test]
    fn rejects_segments_outside_the_domain() {
        let err = IdSegment::new(&Segment::new("ns", MAX_ID + 1, 10), None).unwrap_err();
        assert!(matches!(err, Error::SegmentOverflow { .. }));

        let err = IdSegment::new(&Segment::new("ns", 5, 10), None).unwrap_err();
        assert!(matches!(err, Error::SegmentOverflow { .. }));

        let err = IdSegment::new(&Segment::new("ns", 5, 0), None).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn cursor_stops_at_the_domain_ceiling() {
        let segment = IdSegment::new(&Segment::new("ns", MAX_ID, 2), None).unwrap();
        assert_eq!(segment.try_next(), Some(MAX_ID - 1));
        assert_eq!(segment.try_next(), Some(MAX_ID));
        assert_eq!(segment.try_next(), None);
    }

    #[test]
    fn concurrent_claims_never_repeat() {
        let segment = IdSegment::new(&Segment::new("ns", 40_000, 40_000), None).unwrap();
        let seen = std::sync::Mutex::new(std::collections::HashSet::new());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(id) = segment.try_next() {
                        assert!(seen.lock().unwrap().insert(id));
                    }
                });
            }
        });
        assert_eq!(seen.lock().unwrap().len(), 40_000);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_segment_stops_issuing() {
        let segment =
            IdSegment::new(&Segment::new("ns", 100, 100), Some(Duration::from_secs(1))).unwrap();
        assert_eq!(segment.try_next(), Some(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(segment.is_exhausted());
        assert_eq!(segment.try_next(), None);
    }
}
