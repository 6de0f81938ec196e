use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, MAX_ID, Result};

/// Default number of IDs claimed from the repository per round trip.
pub const DEFAULT_STEP: u64 = 100;

/// Default remaining-ID threshold that triggers a standby prefetch.
pub const DEFAULT_SAFE_DISTANCE: u64 = 25;

/// Tuning for a [`SegmentChainIdGenerator`].
///
/// `step` trades repository round trips against IDs abandoned on restart:
/// the unused tail of a claimed segment is simply skipped, which is fine
/// because the contract is uniqueness, not density.
///
/// [`SegmentChainIdGenerator`]: crate::SegmentChainIdGenerator
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentConfig {
    /// Namespace used when a caller does not name one.
    pub namespace: String,
    /// Size of each claimed range.
    pub step: u64,
    /// Prefetch once fewer than this many IDs remain in the active segment.
    pub safe_distance: u64,
    /// Abandon a segment this long after it was fetched, if set.
    pub ttl: Option<Duration>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            namespace: String::from("default"),
            step: DEFAULT_STEP,
            safe_distance: DEFAULT_SAFE_DISTANCE,
            ttl: None,
        }
    }
}

impl SegmentConfig {
    pub fn new(namespace: impl Into<String>, step: u64, safe_distance: u64) -> Self {
        Self {
            namespace: namespace.into(),
            step,
            safe_distance,
            ttl: None,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the step is zero or outside the
    /// ID domain, the safe distance exceeds the step, or the TTL is zero.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::invalid_config("segment namespace must not be empty"));
        }
        if self.step == 0 || self.step > MAX_ID {
            return Err(Error::invalid_config(format!(
                "segment step must be in 1..={MAX_ID}, got {}",
                self.step
            )));
        }
        if self.safe_distance > self.step {
            return Err(Error::invalid_config(format!(
                "safe distance ({}) must not exceed the step ({})",
                self.safe_distance, self.step
            )));
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(Error::invalid_config("segment ttl must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SegmentConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_tuning() {
        assert!(SegmentConfig::new("ns", 0, 0).validate().is_err());
        assert!(SegmentConfig::new("ns", 10, 11).validate().is_err());
        assert!(SegmentConfig::new("", 10, 1).validate().is_err());
        assert!(
            SegmentConfig::new("ns", 10, 1)
                .with_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_with_defaults() {
        let config: SegmentConfig = serde_json::from_str(r#"{"step": 1000}"#).unwrap();
        assert_eq!(config.step, 1000);
        assert_eq!(config.safe_distance, DEFAULT_SAFE_DISTANCE);
        assert_eq!(config.namespace, "default");
    }
}
