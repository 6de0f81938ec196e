use core::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::watch, time::Instant};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Error, IdSegment, Result, SegmentConfig, SegmentRepository};

/// Value slot written exactly once by a fetch task.
type FetchSlot = Option<Result<Arc<IdSegment>>>;

/// Minimum gap between background retries of a transiently failed fetch.
pub const PREFETCH_RETRY_INTERVAL: Duration = Duration::from_millis(100);

enum Standby {
    Empty,
    Fetching {
        id: u64,
        rx: watch::Receiver<FetchSlot>,
    },
}

impl Standby {
    /// A fetch that failed transiently or whose task went away without
    /// reporting. Fatal failures stay put so every caller sees them.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Fetching { rx, .. } => match &*rx.borrow() {
                Some(Ok(_)) => false,
                Some(Err(err)) => err.is_transient(),
                None => rx.has_changed().is_err(),
            },
        }
    }

    fn has_failed(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Fetching { rx, .. } => match &*rx.borrow() {
                Some(result) => result.is_err(),
                None => rx.has_changed().is_err(),
            },
        }
    }
}

struct ChainState {
    active: Option<Arc<IdSegment>>,
    standby: Standby,
    generation: u64,
    next_fetch_id: u64,
    last_fetch_at: Option<Instant>,
}

/// Where the standby segment of a chain currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandbyStatus {
    /// Nothing requested yet.
    Empty,
    /// A repository claim is in flight.
    Fetching,
    /// The next segment is claimed and waiting for the active one to run out.
    Ready,
    /// The last claim failed. Transient failures are retried in the
    /// background at most once per [`PREFETCH_RETRY_INTERVAL`]; anything else
    /// is returned by every call once the active segment runs out.
    Failed,
}

/// Point-in-time view of one namespace's chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub namespace: String,
    pub min_value: u64,
    pub max_value: u64,
    /// Last value handed out from the active segment.
    pub value: u64,
    pub remaining: u64,
    pub standby: StandbyStatus,
    /// Number of active→standby swaps so far.
    pub generation: u64,
}

/// Active + standby segments for a single namespace.
///
/// Values come from the active segment's atomic cursor without taking the
/// chain lock for longer than an `Arc` clone. The lock guards the segment
/// pointers and the standby slot; it is never held across an `.await`.
pub(crate) struct SegmentChain<R> {
    namespace: Arc<str>,
    repository: Arc<R>,
    step: u64,
    safe_distance: u64,
    ttl: Option<Duration>,
    state: Mutex<ChainState>,
}

impl<R: SegmentRepository> SegmentChain<R> {
    pub(crate) fn new(namespace: &str, repository: Arc<R>, config: &SegmentConfig) -> Self {
        Self {
            namespace: Arc::from(namespace),
            repository,
            step: config.step,
            safe_distance: config.safe_distance,
            ttl: config.ttl,
            state: Mutex::new(ChainState {
                active: None,
                standby: Standby::Empty,
                generation: 0,
                next_fetch_id: 0,
                last_fetch_at: None,
            }),
        }
    }

    pub(crate) async fn next(&self) -> Result<u64> {
        loop {
            let active = self.state.lock().active.clone();
            if let Some(segment) = &active {
                if let Some(value) = segment.try_next() {
                    if segment.max_value() - value < self.safe_distance {
                        self.prefetch();
                    }
                    return Ok(value);
                }
            }
            self.advance(active.as_ref()).await?;
        }
    }

    pub(crate) fn snapshot(&self) -> Option<ChainSnapshot> {
        let state = self.state.lock();
        let active = state.active.as_ref()?;
        let standby = match &state.standby {
            Standby::Empty => StandbyStatus::Empty,
            standby if standby.has_failed() => StandbyStatus::Failed,
            Standby::Fetching { rx, .. } if rx.borrow().is_some() => StandbyStatus::Ready,
            Standby::Fetching { .. } => StandbyStatus::Fetching,
        };
        Some(ChainSnapshot {
            namespace: self.namespace.to_string(),
            min_value: active.min_value(),
            max_value: active.max_value(),
            value: active.value(),
            remaining: active.remaining(),
            standby,
            generation: state.generation,
        })
    }

    /// Starts a standby fetch unless one is in flight, done, failed fatally,
    /// or failed transiently less than [`PREFETCH_RETRY_INTERVAL`] ago.
    fn prefetch(&self) {
        let mut state = self.state.lock();
        let start = match &state.standby {
            Standby::Empty => true,
            standby if standby.is_retryable() => state
                .last_fetch_at
                .is_none_or(|at| at.elapsed() >= PREFETCH_RETRY_INTERVAL),
            Standby::Fetching { .. } => false,
        };
        if start {
            if let Err(_e) = self.start_fetch(&mut state) {
                #[cfg(feature = "tracing")]
                tracing::warn!(namespace = %self.namespace, "unable to start prefetch: {_e}");
            }
        }
    }

    /// Swaps the standby in for `exhausted`, waiting for the fetch if needed.
    ///
    /// Returns `Ok(())` without doing anything when another caller already
    /// replaced `exhausted`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(namespace = %self.namespace))
    )]
    async fn advance(&self, exhausted: Option<&Arc<IdSegment>>) -> Result<()> {
        let (fetch_id, mut rx) = {
            let mut state = self.state.lock();
            if !same_segment(state.active.as_ref(), exhausted) {
                return Ok(());
            }
            // A fatal result is still `Fetching`, so it is handed back below
            // instead of being claimed again.
            let pending = match &state.standby {
                Standby::Fetching { id, rx } if !state.standby.is_retryable() => {
                    Some((*id, rx.clone()))
                }
                _ => None,
            };
            match pending {
                Some(pending) => pending,
                None => self.start_fetch(&mut state)?,
            }
        };

        let result = match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or_else(|| Err(self.aborted())),
            Err(_) => Err(self.aborted()),
        };

        let mut state = self.state.lock();
        let still_current =
            matches!(&state.standby, Standby::Fetching { id, .. } if *id == fetch_id);
        match result {
            Ok(segment) => {
                if still_current && same_segment(state.active.as_ref(), exhausted) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        namespace = %self.namespace,
                        min_value = segment.min_value(),
                        max_value = segment.max_value(),
                        generation = state.generation + 1,
                        "swapped in standby segment"
                    );
                    state.active = Some(segment);
                    state.standby = Standby::Empty;
                    state.generation += 1;
                }
                Ok(())
            }
            Err(err) => {
                if still_current && err.is_transient() {
                    state.standby = Standby::Empty;
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(namespace = %self.namespace, "segment fetch failed: {err}");
                Err(err)
            }
        }
    }

    /// Spawns the repository claim. Must be called with the chain lock held
    /// so at most one fetch exists per chain.
    fn start_fetch(&self, state: &mut ChainState) -> Result<(u64, watch::Receiver<FetchSlot>)> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::invalid_config("segment prefetch requires a tokio runtime"))?;

        let id = state.next_fetch_id;
        state.next_fetch_id += 1;
        state.last_fetch_at = Some(Instant::now());

        let (tx, rx) = watch::channel(None);
        let repository = Arc::clone(&self.repository);
        let namespace = Arc::clone(&self.namespace);
        let (step, ttl) = (self.step, self.ttl);
        handle.spawn(async move {
            let result = fetch_segment(&*repository, &namespace, step, ttl).await;
            tx.send_replace(Some(result));
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(namespace = %self.namespace, fetch_id = id, step, "requested standby segment");

        state.standby = Standby::Fetching { id, rx: rx.clone() };
        Ok((id, rx))
    }

    fn aborted(&self) -> Error {
        Error::SegmentRepositoryUnavailable {
            namespace: self.namespace.to_string(),
            reason: String::from("segment fetch was aborted"),
        }
    }
}

async fn fetch_segment<R: SegmentRepository>(
    repository: &R,
    namespace: &str,
    step: u64,
    ttl: Option<Duration>,
) -> Result<Arc<IdSegment>> {
    let segment = repository
        .claim_next(namespace, step)
        .await
        .map_err(|e| Error::SegmentRepositoryUnavailable {
            namespace: namespace.to_owned(),
            reason: e.to_string(),
        })?;
    IdSegment::new(&segment, ttl).map(Arc::new)
}

fn same_segment(a: Option<&Arc<IdSegment>>, b: Option<&Arc<IdSegment>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
