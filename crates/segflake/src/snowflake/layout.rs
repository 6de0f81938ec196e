use core::{fmt, time::Duration};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CUSTOM_EPOCH, Error, Result, TWITTER_EPOCH};

/// Bit layout of a Snowflake-style ID.
///
/// ```text
///  Bit Index:  63           63 62          S+M S+M-1       S S-1          0
///              +--------------+---------------+-------------+-------------+
///  Field:      | reserved (1) | timestamp (T) | machine (M) | sequence (S)|
///              +--------------+---------------+-------------+-------------+
/// ```
///
/// The reserved sign bit is always zero, and `T + M + S <= 63`. Narrower
/// layouts leave the bits above `T + M + S` zero as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnowflakeLayout {
    epoch_millis: u64,
    timestamp_bits: u8,
    machine_bits: u8,
    sequence_bits: u8,
}

impl Default for SnowflakeLayout {
    /// 41 timestamp bits, 10 machine bits and 12 sequence bits counted from
    /// [`CUSTOM_EPOCH`].
    fn default() -> Self {
        Self {
            epoch_millis: CUSTOM_EPOCH.as_millis() as u64,
            timestamp_bits: 41,
            machine_bits: 10,
            sequence_bits: 12,
        }
    }
}

impl SnowflakeLayout {
    /// Number of payload bits available below the sign bit.
    pub const MAX_BITS: u8 = 63;

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the fields do not fit in 63 bits,
    /// the timestamp or sequence field is empty, or the epoch is so late
    /// that the largest timestamp overflows Unix milliseconds.
    pub fn new(
        epoch: Duration,
        timestamp_bits: u8,
        machine_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self> {
        let epoch_millis = u64::try_from(epoch.as_millis()).map_err(|_| {
            Error::invalid_config(format!("epoch {epoch:?} does not fit in u64 millis"))
        })?;
        let layout = Self {
            epoch_millis,
            timestamp_bits,
            machine_bits,
            sequence_bits,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// The classic Twitter layout: 41/10/12 from [`TWITTER_EPOCH`].
    pub fn twitter() -> Self {
        Self {
            epoch_millis: TWITTER_EPOCH.as_millis() as u64,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timestamp_bits == 0 || self.sequence_bits == 0 {
            return Err(Error::invalid_config(
                "timestamp and sequence fields need at least one bit each",
            ));
        }
        let total =
            u16::from(self.timestamp_bits) + u16::from(self.machine_bits) + u16::from(self.sequence_bits);
        if total > u16::from(Self::MAX_BITS) {
            return Err(Error::invalid_config(format!(
                "layout uses {total} bits but only {} fit below the sign bit",
                Self::MAX_BITS
            )));
        }
        if self.epoch_millis.checked_add(self.max_timestamp()).is_none() {
            return Err(Error::invalid_config(format!(
                "epoch {} ms plus a {}-bit timestamp overflows u64 millis",
                self.epoch_millis, self.timestamp_bits
            )));
        }
        Ok(())
    }

    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_millis
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn machine_bits(&self) -> u8 {
        self.machine_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    pub const fn total_bits(&self) -> u8 {
        self.timestamp_bits + self.machine_bits + self.sequence_bits
    }

    pub const fn max_timestamp(&self) -> u64 {
        mask(self.timestamp_bits)
    }

    pub const fn max_machine_id(&self) -> u64 {
        mask(self.machine_bits)
    }

    pub const fn max_sequence(&self) -> u64 {
        mask(self.sequence_bits)
    }

    pub const fn machine_shift(&self) -> u8 {
        self.sequence_bits
    }

    pub const fn timestamp_shift(&self) -> u8 {
        self.machine_bits + self.sequence_bits
    }

    /// Packs the three fields. Callers guarantee each fits its width.
    #[inline]
    pub const fn compose(&self, timestamp: u64, machine_id: u64, sequence: u64) -> u64 {
        debug_assert!(timestamp <= self.max_timestamp());
        debug_assert!(machine_id <= self.max_machine_id());
        debug_assert!(sequence <= self.max_sequence());
        (timestamp << self.timestamp_shift()) | (machine_id << self.machine_shift()) | sequence
    }

    /// Splits `id` into its fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] if `id` has bits set above the
    /// layout, i.e. it cannot have been produced with it.
    pub fn decompose(&self, id: u64) -> Result<SnowflakeParts> {
        if id >> self.total_bits() != 0 {
            return Err(Error::InvalidEncoding {
                reason: format!(
                    "{id} has bits set above the {}-bit layout",
                    self.total_bits()
                ),
            });
        }
        let timestamp = (id >> self.timestamp_shift()) & self.max_timestamp();
        Ok(SnowflakeParts {
            timestamp,
            unix_millis: timestamp + self.epoch_millis,
            machine_id: (id >> self.machine_shift()) & self.max_machine_id(),
            sequence: id & self.max_sequence(),
        })
    }
}

const fn mask(bits: u8) -> u64 {
    (1u64 << bits) - 1
}

/// The decoded fields of a Snowflake ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SnowflakeParts {
    /// Milliseconds since the layout's epoch.
    pub timestamp: u64,
    /// `timestamp` shifted back to Unix time.
    pub unix_millis: u64,
    pub machine_id: u64,
    pub sequence: u64,
}

impl fmt::Display for SnowflakeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timestamp={} unix_millis={} machine_id={} sequence={}",
            self.timestamp, self.unix_millis, self.machine_id, self.sequence
        )
    }
}
