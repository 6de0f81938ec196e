use core::{future::Future, time::Duration};

use crate::{BackendError, InstanceId, Segment};

/// A durable, per-namespace counter handing out disjoint ID ranges.
///
/// This is the only thing a [`SegmentChainIdGenerator`] needs from a
/// database, key-value store or HTTP service.
///
/// # Contract
///
/// [`claim_next`] must be atomic: for a given namespace, no two calls may
/// ever return overlapping ranges, whether they come from the same process
/// or from different ones. A compare-and-swap or atomic increment on the
/// stored maximum is the usual way to guarantee this.
///
/// [`SegmentChainIdGenerator`]: crate::SegmentChainIdGenerator
/// [`claim_next`]: SegmentRepository::claim_next
pub trait SegmentRepository: Send + Sync + 'static {
    /// Atomically advances the namespace's maximum by `step` and returns the
    /// newly granted range `[max_value - step + 1, max_value]`.
    fn claim_next(
        &self,
        namespace: &str,
        step: u64,
    ) -> impl Future<Output = Result<Segment, BackendError>> + Send;

    /// Returns the namespace's current maximum without claiming anything.
    fn current_max(&self, namespace: &str) -> impl Future<Output = Result<u64, BackendError>> + Send;
}

/// A lease store handing out integer slots per namespace.
///
/// # Contract
///
/// Claims must be linearizable: at any instant at most one live
/// (non-expired) lease may exist for a `(namespace, slot)` pair. If the
/// backing store cannot offer that, machine-bit uniqueness cannot be
/// guaranteed and Snowflake IDs may collide.
pub trait CoordinationService: Send + Sync + 'static {
    /// Claims `slot` for `instance_id` if it is free or its lease expired.
    /// Returns `false` when another live instance holds it.
    fn try_claim(
        &self,
        namespace: &str,
        slot: u64,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Extends a live lease held by `instance_id`. Returns `false` when the
    /// service no longer recognises the lease.
    fn renew(
        &self,
        namespace: &str,
        slot: u64,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Drops the lease if `instance_id` still holds it. Releasing a lease
    /// that is gone is not an error.
    fn release(
        &self,
        namespace: &str,
        slot: u64,
        instance_id: &InstanceId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
