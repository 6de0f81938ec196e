use std::sync::Arc;

use tokio::time::Instant;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    BackendError, CoordinationService, DistributorConfig, Error, InstanceId, MachineBit,
    MachineLease, Result, total_machine_ids,
};

/// Leases machine ids from a [`CoordinationService`].
///
/// Each namespace has `2^machine_bits` slots. [`acquire`](Self::acquire)
/// claims the lowest free one, [`renew`](Self::renew) extends it, and
/// [`release`](Self::release) gives it back. Most callers want
/// [`start`](Self::start), which does the acquisition and keeps the lease
/// alive on a background task until the returned [`MachineLease`] is shut
/// down.
pub struct MachineIdDistributor<C> {
    coordinator: Arc<C>,
    config: DistributorConfig,
}

impl<C> Clone for MachineIdDistributor<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            config: self.config.clone(),
        }
    }
}

impl<C: CoordinationService> MachineIdDistributor<C> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(coordinator: Arc<C>, config: DistributorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coordinator,
            config,
        })
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    /// Leases the lowest free slot in `namespace` for `instance_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoAvailableMachineBit`] if every slot is held by another
    ///   live lease.
    /// - [`Error::CoordinationUnavailable`] if the service fails.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub async fn acquire(&self, namespace: &str, instance_id: &InstanceId) -> Result<MachineBit> {
        let ttl = self.config.lease_ttl;
        let total = total_machine_ids(self.config.machine_bits);
        for slot in 0..total {
            let sent_at = Instant::now();
            let claimed = self
                .coordinator
                .try_claim(namespace, slot, instance_id, ttl)
                .await
                .map_err(unavailable)?;
            if claimed {
                #[cfg(feature = "tracing")]
                tracing::debug!(namespace, machine_id = slot, "acquired machine bit");
                return Ok(MachineBit {
                    namespace: namespace.to_owned(),
                    instance_id: instance_id.clone(),
                    value: slot,
                    lease_expire_at: sent_at + ttl,
                });
            }
        }
        #[cfg(feature = "tracing")]
        tracing::warn!(namespace, total, "no machine bit available");
        Err(Error::NoAvailableMachineBit {
            namespace: namespace.to_owned(),
            total,
        })
    }

    /// Extends the lease on `bit`.
    ///
    /// # Errors
    ///
    /// - [`Error::LeaseLost`] if the service no longer holds the lease for
    ///   this instance (it expired or was reassigned).
    /// - [`Error::CoordinationUnavailable`] if the service fails; the lease
    ///   may still be live until `bit.lease_expire_at`.
    pub async fn renew(&self, bit: &MachineBit) -> Result<MachineBit> {
        let sent_at = Instant::now();
        let renewed = self
            .coordinator
            .renew(
                &bit.namespace,
                bit.value,
                &bit.instance_id,
                self.config.lease_ttl,
            )
            .await
            .map_err(unavailable)?;
        if !renewed {
            return Err(Error::LeaseLost {
                namespace: bit.namespace.clone(),
                machine_id: bit.value,
            });
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(namespace = %bit.namespace, machine_id = bit.value, "renewed machine bit");
        Ok(MachineBit {
            lease_expire_at: sent_at + self.config.lease_ttl,
            ..bit.clone()
        })
    }

    /// Gives `bit` back. Releasing a lease that is already gone is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinationUnavailable`] if the service fails; the
    /// lease then simply runs out.
    pub async fn release(&self, bit: &MachineBit) -> Result<()> {
        self.coordinator
            .release(&bit.namespace, bit.value, &bit.instance_id)
            .await
            .map_err(unavailable)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(namespace = %bit.namespace, machine_id = bit.value, "released machine bit");
        Ok(())
    }

    /// Acquires a slot in the configured namespace and spawns the task that
    /// keeps it alive.
    ///
    /// # Errors
    ///
    /// Same as [`Self::acquire`].
    pub async fn start(&self, instance_id: InstanceId) -> Result<MachineLease<C>> {
        let bit = self.acquire(&self.config.namespace, &instance_id).await?;
        Ok(MachineLease::spawn(self.clone(), bit))
    }
}

fn unavailable(err: BackendError) -> Error {
    Error::CoordinationUnavailable {
        reason: err.to_string(),
    }
}

impl<C> core::fmt::Debug for MachineIdDistributor<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MachineIdDistributor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
