use core::{cmp::Ordering, time::Duration};

use parking_lot::Mutex;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    ClockBackwardsPolicy, CoordinationService, Error, IdGenStatus, LeaseWatch, MachineLease,
    Result, SleepProvider, SnowflakeConfig, SnowflakeLayout, SnowflakeParts, TimeSource,
    TokioSleep,
};

/// Mutable generator state, touched only under the generator's lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct SnowflakeState {
    /// Last timestamp issued, relative to the layout epoch.
    last_timestamp: u64,
    /// Last sequence issued at `last_timestamp`.
    sequence: u64,
    /// Issuing from the reserved sequence range after a backward jump.
    offset_mode: bool,
    /// Milliseconds of `Pending` handed out since the clock fell behind.
    waited_millis: u64,
}

/// A Snowflake ID generator: timestamp, machine id and per-millisecond
/// sequence packed into one `u64`.
///
/// IDs from one generator are strictly increasing. IDs from generators with
/// distinct machine ids never collide, which is what a [`MachineLease`]
/// guarantees across a fleet. When the clock moves backwards the configured
/// [`ClockBackwardsPolicy`] decides between failing, waiting, and issuing
/// from a reserved sequence range.
///
/// State lives behind a single mutex held only for the arithmetic of one
/// call, never across I/O or sleeps.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Any layout up to 63 bits
/// - ✅ Fail-closed when built from a lease
///
/// # Example
/// ```
/// use segflake::{ClockBackwardsPolicy, MonotonicClock, SnowflakeIdGenerator, SnowflakeLayout};
///
/// let generator = SnowflakeIdGenerator::new(
///     SnowflakeLayout::default(),
///     7,
///     ClockBackwardsPolicy::default(),
///     MonotonicClock::default(),
/// )?;
///
/// let a = generator.next_id_blocking()?;
/// let b = generator.next_id_blocking()?;
/// assert!(a < b);
/// assert_eq!(generator.parse(a)?.machine_id, 7);
/// # Ok::<_, segflake::Error>(())
/// ```
pub struct SnowflakeIdGenerator<T> {
    layout: SnowflakeLayout,
    machine_id: u64,
    policy: ClockBackwardsPolicy,
    /// Sequence values below this are for normal operation.
    offset_base: Option<u64>,
    lease: Option<LeaseWatch>,
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<SnowflakeState>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<SnowflakeState>,
    time: T,
}

impl<T: TimeSource> SnowflakeIdGenerator<T> {
    /// Creates a generator with a fixed machine id.
    ///
    /// # Errors
    ///
    /// - [`Error::MachineIdExhausted`] if `machine_id` does not fit the
    ///   layout's machine bits.
    /// - [`Error::InvalidConfig`] if `policy` does not fit the layout.
    pub fn new(
        layout: SnowflakeLayout,
        machine_id: u64,
        policy: ClockBackwardsPolicy,
        time: T,
    ) -> Result<Self> {
        if machine_id > layout.max_machine_id() {
            return Err(Error::MachineIdExhausted {
                machine_id,
                max: layout.max_machine_id(),
            });
        }
        policy.validate(&layout)?;
        let offset_base = policy.offset_base(&layout);
        Ok(Self {
            layout,
            machine_id,
            policy,
            offset_base,
            lease: None,
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(SnowflakeState::default())),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(SnowflakeState::default()),
            time,
        })
    }

    /// Creates a generator whose machine id comes from `lease`.
    ///
    /// Every call checks the lease first; once it is lost or released the
    /// generator fails with [`Error::LeaseLost`] or [`Error::ShutDown`]
    /// instead of risking a duplicate.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_lease<C: CoordinationService>(
        layout: SnowflakeLayout,
        lease: &MachineLease<C>,
        policy: ClockBackwardsPolicy,
        time: T,
    ) -> Result<Self> {
        let mut generator = Self::new(layout, lease.machine_id(), policy, time)?;
        generator.lease = Some(lease.subscribe());
        Ok(generator)
    }

    /// Creates a generator from flat configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`], plus [`Error::InvalidConfig`] for an invalid
    /// layout.
    pub fn from_config(config: &SnowflakeConfig, machine_id: u64, time: T) -> Result<Self> {
        Self::new(config.layout()?, machine_id, config.policy()?, time)
    }

    pub const fn layout(&self) -> &SnowflakeLayout {
        &self.layout
    }

    pub const fn machine_id(&self) -> u64 {
        self.machine_id
    }

    pub const fn policy(&self) -> ClockBackwardsPolicy {
        self.policy
    }

    /// Decodes an ID produced with this generator's layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] if `id` does not fit the layout.
    pub fn parse(&self, id: u64) -> Result<SnowflakeParts> {
        self.layout.decompose(id)
    }

    /// Attempts to generate the next ID without waiting.
    ///
    /// # Returns
    /// - `Ok(IdGenStatus::Ready { id })`: A new ID is available
    /// - `Ok(IdGenStatus::Pending { yield_for })`: The time to wait (in
    ///   milliseconds) before trying again
    ///
    /// # Errors
    /// - [`Error::LeaseLost`] / [`Error::ShutDown`] if the backing lease is
    ///   gone.
    /// - [`Error::ClockBeforeEpoch`] if the clock reads before the epoch.
    /// - [`Error::TimestampOverflow`] once the timestamp field is full.
    /// - [`Error::ClockMovedBackwards`] when the policy refuses a backward
    ///   jump.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        if let Some(lease) = &self.lease {
            lease.check()?;
        }

        let now_millis = self.time.current_millis();
        let now = now_millis
            .checked_sub(self.layout.epoch_millis())
            .ok_or(Error::ClockBeforeEpoch {
                now_millis,
                epoch_millis: self.layout.epoch_millis(),
            })?;

        let mut state = self.state.lock();
        if now >= state.last_timestamp {
            state.waited_millis = 0;
        }
        match now.cmp(&state.last_timestamp) {
            Ordering::Equal if state.offset_mode => self.next_offset(&mut state),
            Ordering::Equal => {
                let limit = self
                    .offset_base
                    .map_or(self.layout.max_sequence(), |base| base - 1);
                if state.sequence < limit {
                    state.sequence += 1;
                    Ok(self.ready(&state))
                } else {
                    Ok(IdGenStatus::Pending { yield_for: 1 })
                }
            }
            Ordering::Greater => {
                if now > self.layout.max_timestamp() {
                    return Err(Error::TimestampOverflow {
                        timestamp: now,
                        max: self.layout.max_timestamp(),
                    });
                }
                #[cfg(feature = "tracing")]
                if state.offset_mode {
                    tracing::debug!(timestamp = now, "clock caught up, leaving offset mode");
                }
                *state = SnowflakeState {
                    last_timestamp: now,
                    ..SnowflakeState::default()
                };
                Ok(self.ready(&state))
            }
            Ordering::Less => self.cold_clock_behind(&mut state, now),
        }
    }

    /// Returns the next ID, sleeping on the tokio timer while pending.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::try_poll_id`].
    pub async fn next_id(&self) -> Result<u64>
    where
        T: Sync,
    {
        self.next_id_with::<TokioSleep>().await
    }

    /// Returns the next ID, waiting out pending states with `S`.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::try_poll_id`].
    pub async fn next_id_with<S: SleepProvider>(&self) -> Result<u64>
    where
        T: Sync,
    {
        loop {
            let dur = match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { yield_for } => Duration::from_millis(yield_for),
            };
            S::sleep_for(dur).await;
        }
    }

    /// Returns the next ID, blocking the thread while pending.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::try_poll_id`].
    pub fn next_id_blocking(&self) -> Result<u64> {
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { yield_for } => {
                    std::thread::sleep(Duration::from_millis(yield_for));
                }
            }
        }
    }

    #[inline]
    fn ready(&self, state: &SnowflakeState) -> IdGenStatus {
        IdGenStatus::Ready {
            id: self
                .layout
                .compose(state.last_timestamp, self.machine_id, state.sequence),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(&self, state: &mut SnowflakeState, now: u64) -> Result<IdGenStatus> {
        let drift_millis = state.last_timestamp - now;
        let moved_backwards = Error::ClockMovedBackwards {
            last_timestamp: state.last_timestamp,
            now,
            drift_millis,
        };
        match self.policy {
            ClockBackwardsPolicy::Reject => {
                #[cfg(feature = "tracing")]
                tracing::warn!(drift_millis, "clock moved backwards, rejecting");
                Err(moved_backwards)
            }
            ClockBackwardsPolicy::Wait { max_drift_millis } => {
                // Bound the total wait as well as each jump, so a clock that
                // stays behind cannot stall callers forever.
                let waited = state.waited_millis.saturating_add(drift_millis);
                if drift_millis <= max_drift_millis && waited <= max_drift_millis {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(drift_millis, "clock moved backwards, waiting");
                    state.waited_millis = waited;
                    Ok(IdGenStatus::Pending {
                        yield_for: drift_millis,
                    })
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        drift_millis,
                        waited_millis = state.waited_millis,
                        max_drift_millis,
                        "clock moved backwards past the tolerated drift"
                    );
                    Err(moved_backwards)
                }
            }
            ClockBackwardsPolicy::ForwardOffset { .. } if state.offset_mode => {
                self.next_offset(state)
            }
            ClockBackwardsPolicy::ForwardOffset { .. } => {
                #[cfg(feature = "tracing")]
                tracing::warn!(drift_millis, "clock moved backwards, entering offset mode");
                state.offset_mode = true;
                state.sequence = self.offset_base.unwrap_or(0);
                Ok(self.ready(state))
            }
        }
    }

    /// Next ID from the reserved range, borrowing one logical millisecond
    /// from the future when the range is spent.
    fn next_offset(&self, state: &mut SnowflakeState) -> Result<IdGenStatus> {
        if state.sequence < self.layout.max_sequence() {
            state.sequence += 1;
            return Ok(self.ready(state));
        }
        let next = state.last_timestamp + 1;
        if next > self.layout.max_timestamp() {
            return Err(Error::TimestampOverflow {
                timestamp: next,
                max: self.layout.max_timestamp(),
            });
        }
        state.last_timestamp = next;
        state.sequence = self.offset_base.unwrap_or(0);
        Ok(self.ready(state))
    }
}

impl<T> core::fmt::Debug for SnowflakeIdGenerator<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnowflakeIdGenerator")
            .field("layout", &self.layout)
            .field("machine_id", &self.machine_id)
            .field("policy", &self.policy)
            .field("leased", &self.lease.is_some())
            .finish_non_exhaustive()
    }
}
