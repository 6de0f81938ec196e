use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    CUSTOM_EPOCH, ClockBackwardsMode, ClockBackwardsPolicy, DEFAULT_MAX_DRIFT_MILLIS, Result,
    SnowflakeLayout,
};

/// Flat, deserializable settings for a [`SnowflakeIdGenerator`].
///
/// Use [`layout`](Self::layout) and [`policy`](Self::policy) to turn it into
/// validated building blocks.
///
/// [`SnowflakeIdGenerator`]: crate::SnowflakeIdGenerator
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SnowflakeConfig {
    /// Unix milliseconds that timestamp zero stands for.
    pub epoch_millis: u64,
    pub timestamp_bits: u8,
    pub machine_bits: u8,
    pub sequence_bits: u8,
    pub clock_backwards: ClockBackwardsMode,
    /// Bound used by [`ClockBackwardsMode::Wait`].
    pub max_tolerated_drift_millis: u64,
    /// Reserved sequence bits used by [`ClockBackwardsMode::ForwardOffset`].
    pub reserved_offset_bits: u8,
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            epoch_millis: CUSTOM_EPOCH.as_millis() as u64,
            timestamp_bits: 41,
            machine_bits: 10,
            sequence_bits: 12,
            clock_backwards: ClockBackwardsMode::default(),
            max_tolerated_drift_millis: DEFAULT_MAX_DRIFT_MILLIS,
            reserved_offset_bits: 1,
        }
    }
}

impl SnowflakeConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// bit widths do not form a valid layout.
    pub fn layout(&self) -> Result<SnowflakeLayout> {
        SnowflakeLayout::new(
            Duration::from_millis(self.epoch_millis),
            self.timestamp_bits,
            self.machine_bits,
            self.sequence_bits,
        )
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// layout is invalid or the policy does not fit its sequence field.
    pub fn policy(&self) -> Result<ClockBackwardsPolicy> {
        let policy = match self.clock_backwards {
            ClockBackwardsMode::Reject => ClockBackwardsPolicy::Reject,
            ClockBackwardsMode::Wait => ClockBackwardsPolicy::Wait {
                max_drift_millis: self.max_tolerated_drift_millis,
            },
            ClockBackwardsMode::ForwardOffset => ClockBackwardsPolicy::ForwardOffset {
                reserved_bits: self.reserved_offset_bits,
            },
        };
        policy.validate(&self.layout()?)?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn default_config_builds_the_default_layout() {
        let config = SnowflakeConfig::default();
        assert_eq!(config.layout().unwrap(), SnowflakeLayout::default());
        assert_eq!(
            config.policy().unwrap(),
            ClockBackwardsPolicy::Wait {
                max_drift_millis: 10
            }
        );
    }

    #[test]
    fn policy_follows_the_mode() {
        let config = SnowflakeConfig {
            clock_backwards: ClockBackwardsMode::ForwardOffset,
            reserved_offset_bits: 3,
            ..SnowflakeConfig::default()
        };
        assert_eq!(
            config.policy().unwrap(),
            ClockBackwardsPolicy::ForwardOffset { reserved_bits: 3 }
        );

        let config = SnowflakeConfig {
            clock_backwards: ClockBackwardsMode::ForwardOffset,
            reserved_offset_bits: 12,
            ..SnowflakeConfig::default()
        };
        assert!(matches!(config.policy(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn late_epoch_is_rejected_before_parse() {
        let config = SnowflakeConfig {
            epoch_millis: u64::MAX - 10,
            ..SnowflakeConfig::default()
        };
        assert!(matches!(config.layout(), Err(Error::InvalidConfig { .. })));
        assert!(matches!(config.policy(), Err(Error::InvalidConfig { .. })));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_kebab_case_modes() {
        let config: SnowflakeConfig =
            serde_json::from_str(r#"{"clock_backwards": "forward-offset", "machine_bits": 8}"#)
                .unwrap();
        assert_eq!(config.clock_backwards, ClockBackwardsMode::ForwardOffset);
        assert_eq!(config.machine_bits, 8);
        assert_eq!(config.sequence_bits, 12);
    }
}
