//! Error types for ID generation.
//!
//! Every failure a generator, distributor or converter can report is a
//! variant of [`Error`]. Generators never hand out a partially valid or
//! sentinel ID: a call either yields a usable ID or one of these errors.
//!
//! ## Error Classes
//! - Transient: [`Error::SegmentRepositoryUnavailable`],
//!   [`Error::CoordinationUnavailable`]. The caller decides whether and how
//!   to retry; nothing here retries without bound.
//! - Capacity/configuration: [`Error::SegmentOverflow`],
//!   [`Error::TimestampOverflow`], [`Error::NoAvailableMachineBit`],
//!   [`Error::MachineIdExhausted`], [`Error::InvalidConfig`].
//! - Policy dependent: [`Error::ClockMovedBackwards`].
//! - Fail-closed: [`Error::LeaseLost`], [`Error::ShutDown`].

use std::sync::Arc;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `segflake` can emit.
#[derive(Clone, thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No usable segment is available and the repository could not be
    /// reached.
    #[error("segment repository unavailable for namespace `{namespace}`: {reason}")]
    SegmentRepositoryUnavailable { namespace: String, reason: String },

    /// The repository granted a range that does not fit the ID domain.
    #[error("segment for namespace `{namespace}` overflows the id domain (max_value={max_value}, step={step})")]
    SegmentOverflow {
        namespace: String,
        max_value: u64,
        step: u64,
    },

    /// `now - epoch` no longer fits in the layout's timestamp bits.
    #[error("timestamp {timestamp} exceeds the layout maximum {max}")]
    TimestampOverflow { timestamp: u64, max: u64 },

    /// The clock reports a time before the layout's epoch.
    #[error("clock reads {now_millis} which is before the epoch {epoch_millis}")]
    ClockBeforeEpoch { now_millis: u64, epoch_millis: u64 },

    /// The clock moved backwards and the configured policy refused to
    /// resolve it.
    #[error("clock moved backwards by {drift_millis}ms (last={last_timestamp}, now={now})")]
    ClockMovedBackwards {
        last_timestamp: u64,
        now: u64,
        drift_millis: u64,
    },

    /// Every machine bit in the namespace is leased by another live instance.
    #[error("no machine bit available in namespace `{namespace}` ({total} slots leased)")]
    NoAvailableMachineBit { namespace: String, total: u64 },

    /// The machine id does not fit the layout's machine bits.
    #[error("machine id {machine_id} exceeds the layout maximum {max}")]
    MachineIdExhausted { machine_id: u64, max: u64 },

    /// The lease backing a machine bit is gone; generation must stop.
    #[error("lease on machine bit {machine_id} in namespace `{namespace}` was lost")]
    LeaseLost { namespace: String, machine_id: u64 },

    /// The coordination service could not be reached.
    #[error("coordination service unavailable: {reason}")]
    CoordinationUnavailable { reason: String },

    /// A configuration value was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A string could not be decoded back into an ID.
    #[error("invalid encoding: {reason}")]
    InvalidEncoding { reason: String },

    /// The generator or lease was shut down.
    #[error("generator has been shut down")]
    ShutDown,
}

impl Error {
    /// Returns `true` for failures that may succeed if retried later.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SegmentRepositoryUnavailable { .. } | Self::CoordinationUnavailable { .. }
        )
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Error returned by backend contracts ([`SegmentRepository`],
/// [`CoordinationService`]).
///
/// Backends wrap whatever their client produced; generators translate it
/// into the matching [`Error`] variant.
///
/// [`SegmentRepository`]: crate::SegmentRepository
/// [`CoordinationService`]: crate::CoordinationService
#[derive(Clone, thiserror::Error, Debug)]
#[error("{message}{}", .source.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Arc<dyn core::error::Error + Send + Sync + 'static>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(Arc::from(source.into())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_classified() {
        let err = Error::SegmentRepositoryUnavailable {
            namespace: "orders".into(),
            reason: "timeout".into(),
        };
        assert!(err.is_transient());
        assert!(!Error::ShutDown.is_transient());
        assert!(
            !Error::LeaseLost {
                namespace: "orders".into(),
                machine_id: 3
            }
            .is_transient()
        );
    }

    #[test]
    fn backend_error_displays_source() {
        let io = std::io::Error::other("connection reset");
        let err = BackendError::with_source("claim failed", io);
        assert_eq!(err.to_string(), "claim failed: connection reset");
        assert!(core::error::Error::source(&err).is_some());
        assert_eq!(BackendError::new("plain").to_string(), "plain");
    }
}
