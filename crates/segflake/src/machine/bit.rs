use tokio::time::Instant;

use crate::InstanceId;

/// Largest machine id representable in `bits` bits.
pub const fn max_machine_id(bits: u8) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Number of machine ids representable in `bits` bits.
pub const fn total_machine_ids(bits: u8) -> u64 {
    if bits >= 64 { u64::MAX } else { 1u64 << bits }
}

/// A leased machine id.
///
/// `lease_expire_at` is the local view of the lease deadline. It is derived
/// from the moment the claim or renewal was *sent*, so it never runs later
/// than the coordination service's own deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineBit {
    pub namespace: String,
    pub instance_id: InstanceId,
    pub value: u64,
    pub lease_expire_at: Instant,
}

impl MachineBit {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.lease_expire_at
    }
}
