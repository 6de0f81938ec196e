use core::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result, SnowflakeLayout};

/// What a Snowflake generator does when the clock reads earlier than the
/// last timestamp it issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockBackwardsPolicy {
    /// Fail with [`Error::ClockMovedBackwards`].
    Reject,
    /// Report *pending* for the drift while both the jump and the total
    /// time spent pending stay within `max_drift_millis`, otherwise fail with
    /// [`Error::ClockMovedBackwards`].
    Wait { max_drift_millis: u64 },
    /// Keep issuing at the last timestamp from a reserved part of the
    /// sequence field.
    ///
    /// The top `reserved_bits` of the sequence are set aside: normal
    /// operation only uses sequences below `1 << (sequence_bits -
    /// reserved_bits)`. After a backward jump the generator continues above
    /// that boundary, moving the logical timestamp forward one millisecond at
    /// a time whenever the reserved range runs out, until the wall clock
    /// catches up.
    ForwardOffset { reserved_bits: u8 },
}

impl Default for ClockBackwardsPolicy {
    fn default() -> Self {
        Self::Wait {
            max_drift_millis: DEFAULT_MAX_DRIFT_MILLIS,
        }
    }
}

/// Default bound for [`ClockBackwardsPolicy::Wait`].
pub const DEFAULT_MAX_DRIFT_MILLIS: u64 = 10;

impl ClockBackwardsPolicy {
    /// Checks the policy against the sequence field it will run on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a forward-offset policy reserves
    /// no bits or the whole sequence field.
    pub fn validate(&self, layout: &SnowflakeLayout) -> Result<()> {
        if let Self::ForwardOffset { reserved_bits } = *self {
            if reserved_bits == 0 || reserved_bits >= layout.sequence_bits() {
                return Err(Error::invalid_config(format!(
                    "forward-offset needs 1..{} reserved bits, got {reserved_bits}",
                    layout.sequence_bits()
                )));
            }
        }
        Ok(())
    }

    /// First sequence value of the reserved range, if this policy has one.
    pub(crate) fn offset_base(&self, layout: &SnowflakeLayout) -> Option<u64> {
        match *self {
            Self::ForwardOffset { reserved_bits } => {
                Some(1u64 << (layout.sequence_bits() - reserved_bits))
            }
            _ => None,
        }
    }

    pub const fn mode(&self) -> ClockBackwardsMode {
        match self {
            Self::Reject => ClockBackwardsMode::Reject,
            Self::Wait { .. } => ClockBackwardsMode::Wait,
            Self::ForwardOffset { .. } => ClockBackwardsMode::ForwardOffset,
        }
    }
}

/// The policy names accepted in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ClockBackwardsMode {
    Reject,
    #[default]
    Wait,
    ForwardOffset,
}

impl ClockBackwardsMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Wait => "wait",
            Self::ForwardOffset => "forward-offset",
        }
    }
}

impl fmt::Display for ClockBackwardsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClockBackwardsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "wait" => Ok(Self::Wait),
            "forward-offset" | "forward_offset" | "offset" => Ok(Self::ForwardOffset),
            other => Err(Error::invalid_config(format!(
                "unknown clock-backwards policy `{other}` (expected reject, wait or forward-offset)"
            ))),
        }
    }
}
