use core::{future::Future, time::Duration};
use std::collections::HashMap;

use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{BackendError, Segment, SegmentRepository};

/// An in-process [`SegmentRepository`] backed by a mutex-guarded map.
///
/// Useful for tests, single-process deployments, and for simulating a remote
/// store: [`with_latency`] delays every claim to model a network round trip,
/// and [`set_available`] lets a test take the "store" offline.
///
/// [`with_latency`]: InMemorySegmentRepository::with_latency
/// [`set_available`]: InMemorySegmentRepository::set_available
#[derive(Debug, Default)]
pub struct InMemorySegmentRepository {
    counters: Mutex<HashMap<String, u64>>,
    latency: Option<Duration>,
    claims: AtomicU64,
    attempts: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemorySegmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every claim by `latency` (on the tokio clock).
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Starts `namespace` at `max_value`, as if earlier segments had already
    /// been claimed.
    pub fn seed(&self, namespace: impl Into<String>, max_value: u64) {
        self.counters.lock().insert(namespace.into(), max_value);
    }

    /// Makes subsequent calls fail (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Release);
    }

    /// Number of successful claims served so far, across all namespaces.
    pub fn claims(&self) -> u64 {
        self.claims.load(Ordering::Acquire)
    }

    /// Number of claims requested so far, including failed ones.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(BackendError::new("segment store is unavailable"));
        }
        Ok(())
    }
}

impl SegmentRepository for InMemorySegmentRepository {
    fn claim_next(
        &self,
        namespace: &str,
        step: u64,
    ) -> impl Future<Output = Result<Segment, BackendError>> + Send {
        async move {
            self.attempts.fetch_add(1, Ordering::AcqRel);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.check_available()?;

            let max_value = {
                let mut counters = self.counters.lock();
                let counter = counters.entry(namespace.to_owned()).or_insert(0);
                let next = counter.checked_add(step).ok_or_else(|| {
                    BackendError::new(format!("counter for `{namespace}` is exhausted"))
                })?;
                *counter = next;
                next
            };
            self.claims.fetch_add(1, Ordering::AcqRel);

            #[cfg(feature = "tracing")]
            tracing::trace!(namespace, max_value, step, "claimed segment");
            Ok(Segment::new(namespace, max_value, step))
        }
    }

    fn current_max(&self, namespace: &str) -> impl Future<Output = Result<u64, BackendError>> + Send {
        async move {
            self.check_available()?;
            Ok(self.counters.lock().get(namespace).copied().unwrap_or(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claims_are_disjoint_and_sequential() {
        let repo = InMemorySegmentRepository::new();
        let first = repo.claim_next("orders", 100).await.unwrap();
        let second = repo.claim_next("orders", 100).await.unwrap();
        let other = repo.claim_next("users", 10).await.unwrap();

        assert_eq!(first.min_value(), Some(1));
        assert_eq!(first.max_value, 100);
        assert_eq!(second.min_value(), Some(101));
        assert_eq!(other.max_value, 10);
        assert_eq!(repo.current_max("orders").await.unwrap(), 200);
        assert_eq!(repo.current_max("missing").await.unwrap(), 0);
        assert_eq!(repo.claims(), 3);
    }

    #[tokio::test]
    async fn unavailable_store_fails_claims() {
        let repo = InMemorySegmentRepository::new();
        repo.set_available(false);
        assert!(repo.claim_next("orders", 10).await.is_err());
        repo.set_available(true);
        assert!(repo.claim_next("orders", 10).await.is_ok());
        assert_eq!(repo.claims(), 1);
        assert_eq!(repo.attempts(), 2);
    }

    #[tokio::test]
    async fn counter_overflow_is_an_error() {
        let repo = InMemorySegmentRepository::new();
        repo.seed("orders", u64::MAX - 5);
        assert!(repo.claim_next("orders", 10).await.is_err());
        assert_eq!(repo.current_max("orders").await.unwrap(), u64::MAX - 5);
    }
}
