use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{CoordinationService, Error, MachineBit, MachineIdDistributor, Result};

/// Lifecycle of a leased machine bit, as published by its keep-alive task.
///
/// Transitions only go `Active → Active` (renewed), `Active → Lost` and
/// `* → Released`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseState {
    /// Held until at least `expires_at`, unless renewed again.
    Active { expires_at: Instant },
    /// Expired or taken away. Generators relying on it must stop.
    Lost,
    /// Given back on shutdown.
    Released,
}

/// A machine bit kept alive by a background renewal task.
///
/// Dropping the lease stops renewal and marks it released for every
/// subscriber; call [`shutdown`](Self::shutdown) to also give the slot back
/// right away instead of letting it expire.
pub struct MachineLease<C: CoordinationService> {
    bit: MachineBit,
    distributor: MachineIdDistributor<C>,
    state: Arc<watch::Sender<LeaseState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<C: CoordinationService> MachineLease<C> {
    pub(crate) fn spawn(distributor: MachineIdDistributor<C>, bit: MachineBit) -> Self {
        let (tx, _) = watch::channel(LeaseState::Active {
            expires_at: bit.lease_expire_at,
        });
        let state = Arc::new(tx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(keep_alive(
            distributor.clone(),
            bit.clone(),
            Arc::clone(&state),
            cancel.clone(),
        ));
        Self {
            bit,
            distributor,
            state,
            cancel,
            task: Some(task),
        }
    }

    pub fn machine_id(&self) -> u64 {
        self.bit.value
    }

    /// The bit as originally granted.
    pub fn bit(&self) -> &MachineBit {
        &self.bit
    }

    pub fn state(&self) -> LeaseState {
        *self.state.borrow()
    }

    /// A cheap handle for checking the lease from generators.
    pub fn subscribe(&self) -> LeaseWatch {
        LeaseWatch {
            namespace: Arc::from(self.bit.namespace.as_str()),
            machine_id: self.bit.value,
            rx: self.state.subscribe(),
        }
    }

    /// Stops renewal, releases the slot and publishes
    /// [`LeaseState::Released`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinationUnavailable`] if the release call failed.
    /// Subscribers see `Released` either way and the slot expires on its
    /// own.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(_e) = task.await {
                #[cfg(feature = "tracing")]
                tracing::warn!("lease keep-alive task ended abnormally: {_e}");
            }
        }
        self.state.send_replace(LeaseState::Released);
        let released = self.distributor.release(&self.bit).await;
        if let Err(_e) = &released {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                namespace = %self.bit.namespace,
                machine_id = self.bit.value,
                "failed to release machine bit: {_e}"
            );
        }
        released
    }
}

impl<C: CoordinationService> Drop for MachineLease<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.state.send_if_modified(|state| {
            let active = matches!(state, LeaseState::Active { .. });
            if active {
                *state = LeaseState::Released;
            }
            active
        });
    }
}

impl<C: CoordinationService> core::fmt::Debug for MachineLease<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MachineLease")
            .field("bit", &self.bit)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn keep_alive<C: CoordinationService>(
    distributor: MachineIdDistributor<C>,
    mut bit: MachineBit,
    state: Arc<watch::Sender<LeaseState>>,
    cancel: CancellationToken,
) {
    let interval = distributor.config().renewal_interval();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
        let renewed = tokio::select! {
            () = cancel.cancelled() => break,
            renewed = distributor.renew(&bit) => renewed,
        };
        match renewed {
            Ok(next) => {
                bit = next;
                state.send_replace(LeaseState::Active {
                    expires_at: bit.lease_expire_at,
                });
            }
            Err(Error::LeaseLost { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    namespace = %bit.namespace,
                    machine_id = bit.value,
                    "machine bit lease was lost"
                );
                state.send_replace(LeaseState::Lost);
                break;
            }
            Err(_e) => {
                if bit.is_expired() {
                    #[cfg(feature = "tracing")]
                    tracing::error!(
                        namespace = %bit.namespace,
                        machine_id = bit.value,
                        "machine bit lease expired while the coordinator was unreachable: {_e}"
                    );
                    state.send_replace(LeaseState::Lost);
                    break;
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    namespace = %bit.namespace,
                    machine_id = bit.value,
                    "failed to renew machine bit, retrying: {_e}"
                );
            }
        }
    }
}

/// Read side of a [`MachineLease`]'s state.
#[derive(Clone, Debug)]
pub struct LeaseWatch {
    namespace: Arc<str>,
    machine_id: u64,
    rx: watch::Receiver<LeaseState>,
}

impl LeaseWatch {
    pub fn machine_id(&self) -> u64 {
        self.machine_id
    }

    pub fn state(&self) -> LeaseState {
        *self.rx.borrow()
    }

    /// Succeeds only while the lease is active and not past its local
    /// deadline.
    ///
    /// # Errors
    ///
    /// - [`Error::LeaseLost`] once the lease is lost or past its deadline.
    /// - [`Error::ShutDown`] once the lease was released.
    pub fn check(&self) -> Result<()> {
        match self.state() {
            LeaseState::Active { expires_at } if Instant::now() < expires_at => Ok(()),
            LeaseState::Active { .. } | LeaseState::Lost => Err(Error::LeaseLost {
                namespace: self.namespace.to_string(),
                machine_id: self.machine_id,
            }),
            LeaseState::Released => Err(Error::ShutDown),
        }
    }

    /// Resolves once the lease stops being usable: with `Lost` when it is
    /// lost or its deadline passes without renewal, with `Released` on
    /// shutdown.
    pub async fn wait_lost(&mut self) -> LeaseState {
        loop {
            let expires_at = match *self.rx.borrow_and_update() {
                LeaseState::Active { expires_at } => expires_at,
                other => return other,
            };
            tokio::select! {
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return LeaseState::Released;
                    }
                }
                () = tokio::time::sleep_until(expires_at) => return LeaseState::Lost,
            }
        }
    }
}
