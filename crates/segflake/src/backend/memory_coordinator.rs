use core::{future::Future, time::Duration};
use std::collections::HashMap;

use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};
use tokio::time::Instant;

use crate::{BackendError, CoordinationService, InstanceId};

#[derive(Debug, Clone)]
struct LeaseRecord {
    holder: InstanceId,
    expires_at: Instant,
}

impl LeaseRecord {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// An in-process [`CoordinationService`].
///
/// Every operation runs under one mutex, which makes claims trivially
/// linearizable. Expiry is measured on the tokio clock, so tests using a
/// paused runtime can move leases through their lifecycle deterministically.
#[derive(Debug, Default)]
pub struct InMemoryCoordinator {
    leases: Mutex<HashMap<(String, u64), LeaseRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Release);
    }

    /// Live leases in `namespace` as `(slot, holder)`, ordered by slot.
    pub fn live_leases(&self, namespace: &str) -> Vec<(u64, InstanceId)> {
        let now = Instant::now();
        let mut live: Vec<_> = self
            .leases
            .lock()
            .iter()
            .filter(|((ns, _), record)| ns == namespace && record.is_live(now))
            .map(|((_, slot), record)| (*slot, record.holder.clone()))
            .collect();
        live.sort_by_key(|(slot, _)| *slot);
        live
    }

    /// Forcibly hands `slot` to `holder`, simulating a lease that expired and
    /// was reassigned behind the original holder's back.
    pub fn steal(&self, namespace: &str, slot: u64, holder: &InstanceId, ttl: Duration) {
        self.leases.lock().insert(
            (namespace.to_owned(), slot),
            LeaseRecord {
                holder: holder.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(BackendError::new("coordination service is unavailable"));
        }
        Ok(())
    }
}

impl CoordinationService for InMemoryCoordinator {
    fn try_claim(
        &self,
        namespace: &str,
        slot: u64,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send {
        async move {
            self.check_available()?;
            let now = Instant::now();
            let mut leases = self.leases.lock();
            let key = (namespace.to_owned(), slot);
            let claimable = leases
                .get(&key)
                .is_none_or(|record| !record.is_live(now) || record.holder == *instance_id);
            if claimable {
                leases.insert(
                    key,
                    LeaseRecord {
                        holder: instance_id.clone(),
                        expires_at: now + ttl,
                    },
                );
            }
            Ok(claimable)
        }
    }

    fn renew(
        &self,
        namespace: &str,
        slot: u64,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send {
        async move {
            self.check_available()?;
            let now = Instant::now();
            let mut leases = self.leases.lock();
            // An expired lease is not renewed even if nobody took it: another
            // instance may already have observed the slot as free.
            match leases.get_mut(&(namespace.to_owned(), slot)) {
                Some(record) if record.holder == *instance_id && record.is_live(now) => {
                    record.expires_at = now + ttl;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn release(
        &self,
        namespace: &str,
        slot: u64,
        instance_id: &InstanceId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        async move {
            self.check_available()?;
            let mut leases = self.leases.lock();
            let key = (namespace.to_owned(), slot);
            if leases
                .get(&key)
                .is_some_and(|record| record.holder == *instance_id)
            {
                leases.remove(&key);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn slot_is_exclusive_until_expiry() {
        let coordinator = InMemoryCoordinator::new();
        let a = InstanceId::new("a");
        let b = InstanceId::new("b");

        assert!(coordinator.try_claim("ns", 0, &a, TTL).await.unwrap());
        assert!(!coordinator.try_claim("ns", 0, &b, TTL).await.unwrap());
        assert!(coordinator.try_claim("other", 0, &b, TTL).await.unwrap());

        tokio::time::advance(TTL).await;
        assert!(coordinator.try_claim("ns", 0, &b, TTL).await.unwrap());
        assert!(!coordinator.renew("ns", 0, &a, TTL).await.unwrap());
        assert_eq!(coordinator.live_leases("ns"), vec![(0, b)]);
    }

    #[tokio::test(start_paused = true)]
    async fn renew_extends_and_release_is_idempotent() {
        let coordinator = InMemoryCoordinator::new();
        let a = InstanceId::new("a");

        assert!(coordinator.try_claim("ns", 3, &a, TTL).await.unwrap());
        tokio::time::advance(TTL / 2).await;
        assert!(coordinator.renew("ns", 3, &a, TTL).await.unwrap());
        tokio::time::advance(TTL / 2 + Duration::from_secs(1)).await;
        assert_eq!(coordinator.live_leases("ns").len(), 1);

        coordinator.release("ns", 3, &a).await.unwrap();
        coordinator.release("ns", 3, &a).await.unwrap();
        assert!(coordinator.live_leases("ns").is_empty());
        assert!(!coordinator.renew("ns", 3, &a, TTL).await.unwrap());
    }

    #[tokio::test]
    async fn release_does_not_drop_someone_elses_lease() {
        let coordinator = InMemoryCoordinator::new();
        let a = InstanceId::new("a");
        let b = InstanceId::new("b");
        assert!(coordinator.try_claim("ns", 1, &a, TTL).await.unwrap());
        coordinator.release("ns", 1, &b).await.unwrap();
        assert_eq!(coordinator.live_leases("ns"), vec![(1, a)]);
    }
}
