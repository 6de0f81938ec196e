use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{ChainSnapshot, Result, SegmentChain, SegmentConfig, SegmentRepository};

/// Hands out IDs from ranges claimed in bulk from a [`SegmentRepository`].
///
/// Each namespace gets its own chain: an active segment that callers drain
/// through an atomic cursor, and a standby segment fetched in the background
/// once fewer than `safe_distance` IDs remain. When the active segment runs
/// out, the standby is swapped in; the repository is only on the hot path
/// when a fetch has not finished by then.
///
/// IDs are unique across every generator sharing the same repository, and
/// strictly increasing per namespace within one generator. They are not
/// dense: whatever remains of a segment when the process stops is skipped.
///
/// Fetches run on the current tokio runtime, so [`next`] must be called from
/// within one.
///
/// ```
/// use std::sync::Arc;
/// use segflake::{InMemorySegmentRepository, SegmentChainIdGenerator, SegmentConfig};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let repo = Arc::new(InMemorySegmentRepository::new());
/// let generator = SegmentChainIdGenerator::new(repo, SegmentConfig::new("orders", 1000, 100))?;
///
/// assert_eq!(generator.next("orders").await?, 1);
/// assert_eq!(generator.next("orders").await?, 2);
/// # Ok::<_, segflake::Error>(())
/// # }).unwrap();
/// ```
///
/// [`next`]: Self::next
pub struct SegmentChainIdGenerator<R> {
    repository: Arc<R>,
    config: SegmentConfig,
    chains: RwLock<HashMap<String, Arc<SegmentChain<R>>>>,
}

impl<R: SegmentRepository> SegmentChainIdGenerator<R> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    ///
    /// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
    pub fn new(repository: Arc<R>, config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            config,
            chains: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the next ID for `namespace`.
    ///
    /// The first call for a namespace waits for its first segment.
    ///
    /// # Errors
    ///
    /// - [`Error::SegmentRepositoryUnavailable`] if the active segment is
    ///   exhausted and the repository could not provide another. The failed
    ///   fetch is discarded; the next call tries again.
    /// - [`Error::SegmentOverflow`] if the repository granted a range outside
    ///   `[1, MAX_ID]`.
    ///
    /// [`Error::SegmentRepositoryUnavailable`]: crate::Error::SegmentRepositoryUnavailable
    /// [`Error::SegmentOverflow`]: crate::Error::SegmentOverflow
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn next(&self, namespace: &str) -> Result<u64> {
        self.chain(namespace).next().await
    }

    /// Like [`next`](Self::next), for the configured default namespace.
    pub async fn next_default(&self) -> Result<u64> {
        self.next(&self.config.namespace).await
    }

    /// Snapshot of `namespace`'s active segment, or `None` before its first
    /// segment has been claimed.
    pub fn current(&self, namespace: &str) -> Option<ChainSnapshot> {
        self.chains.read().get(namespace)?.snapshot()
    }

    /// Namespaces this generator has served so far.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<_> = self.chains.read().keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn chain(&self, namespace: &str) -> Arc<SegmentChain<R>> {
        if let Some(chain) = self.chains.read().get(namespace) {
            return Arc::clone(chain);
        }
        let mut chains = self.chains.write();
        let chain = chains.entry(namespace.to_owned()).or_insert_with(|| {
            #[cfg(feature = "tracing")]
            tracing::debug!(namespace, "creating segment chain");
            Arc::new(SegmentChain::new(
                namespace,
                Arc::clone(&self.repository),
                &self.config,
            ))
        });
        Arc::clone(chain)
    }
}

impl<R> core::fmt::Debug for SegmentChainIdGenerator<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SegmentChainIdGenerator")
            .field("config", &self.config)
            .field("namespaces", &self.chains.read().len())
            .finish_non_exhaustive()
    }
}
