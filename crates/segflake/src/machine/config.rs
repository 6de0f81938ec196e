use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on machine bits a distributor will scan.
pub const MAX_MACHINE_BITS: u8 = 20;

/// Settings for a [`MachineIdDistributor`].
///
/// [`MachineIdDistributor`]: crate::MachineIdDistributor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DistributorConfig {
    /// Namespace leases are taken in by [`MachineIdDistributor::start`].
    ///
    /// [`MachineIdDistributor::start`]: crate::MachineIdDistributor::start
    pub namespace: String,
    /// Width of the machine id; `2^machine_bits` slots are available.
    pub machine_bits: u8,
    /// How long a lease lives without renewal.
    pub lease_ttl: Duration,
    /// Renew every `lease_ttl * renewal_fraction`.
    pub renewal_fraction: f64,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            namespace: String::from("default"),
            machine_bits: 10,
            lease_ttl: Duration::from_secs(30),
            renewal_fraction: 1.0 / 3.0,
        }
    }
}

impl DistributorConfig {
    pub fn new(namespace: impl Into<String>, machine_bits: u8, lease_ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            machine_bits,
            lease_ttl,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_renewal_fraction(mut self, renewal_fraction: f64) -> Self {
        self.renewal_fraction = renewal_fraction;
        self
    }

    /// Time between two renewals of a held lease.
    pub fn renewal_interval(&self) -> Duration {
        self.lease_ttl.mul_f64(self.renewal_fraction)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty namespace, a machine
    /// width outside `1..=20`, a zero TTL, or a renewal fraction outside
    /// `(0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::invalid_config("distributor namespace must not be empty"));
        }
        if self.machine_bits == 0 || self.machine_bits > MAX_MACHINE_BITS {
            return Err(Error::invalid_config(format!(
                "machine bits must be in 1..={MAX_MACHINE_BITS}, got {}",
                self.machine_bits
            )));
        }
        if self.lease_ttl.is_zero() {
            return Err(Error::invalid_config("lease ttl must be non-zero"));
        }
        if !(self.renewal_fraction > 0.0 && self.renewal_fraction < 1.0) {
            return Err(Error::invalid_config(format!(
                "renewal fraction must be in (0, 1), got {}",
                self.renewal_fraction
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renews_three_times_per_ttl_by_default() {
        let config = DistributorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.renewal_interval(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_settings() {
        let base = DistributorConfig::new("ns", 4, Duration::from_secs(3));
        base.validate().unwrap();

        assert!(DistributorConfig { machine_bits: 0, ..base.clone() }.validate().is_err());
        assert!(DistributorConfig { machine_bits: 21, ..base.clone() }.validate().is_err());
        assert!(DistributorConfig { lease_ttl: Duration::ZERO, ..base.clone() }.validate().is_err());
        assert!(base.clone().with_renewal_fraction(1.0).validate().is_err());
        assert!(base.clone().with_renewal_fraction(f64::NAN).validate().is_err());
        assert!(DistributorConfig { namespace: String::new(), ..base }.validate().is_err());
    }
}
