use core::time::Duration;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use segflake::{
    ClockBackwardsMode, DistributorConfig, GeneratorKind, IdConverter, SegmentConfig,
    SnowflakeConfig,
};

/// Generate or inspect IDs from the command line.
///
/// Generators run against in-memory backends, so IDs are unique within one
/// invocation only. Every flag can also be set through the environment or a
/// `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "segflake",
    version,
    about = "Generate and parse segment-chain and Snowflake IDs"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Generator family: `segment` or `snowflake`.
    ///
    /// Environment variable: `ID_KIND`
    #[arg(long, global = true, env = "ID_KIND", default_value = "segment")]
    pub kind: GeneratorKind,

    /// String form for IDs: `radix62`, `base32`, or `<prefix>:<encoding>`.
    /// IDs are printed as plain integers when unset.
    ///
    /// Environment variable: `ID_FORMAT`
    #[arg(long, global = true, env = "ID_FORMAT")]
    pub format: Option<IdConverter>,

    #[command(flatten)]
    pub segment: SegmentArgs,

    #[command(flatten)]
    pub snowflake: SnowflakeArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print freshly generated IDs, one per line.
    Generate {
        /// Number of IDs to generate.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,
    },
    /// Break an ID into its parts.
    Parse {
        /// The ID, as an integer or in `--format`.
        id: String,

        /// Print the breakdown as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    /// Namespace segments are claimed in.
    ///
    /// Environment variable: `SEGMENT_NAMESPACE`
    #[arg(long, global = true, env = "SEGMENT_NAMESPACE", default_value_t = String::from("default"))]
    pub namespace: String,

    /// IDs claimed per repository round trip.
    ///
    /// Environment variable: `SEGMENT_STEP`
    #[arg(long, global = true, env = "SEGMENT_STEP", default_value_t = segflake::DEFAULT_STEP)]
    pub step: u64,

    /// Prefetch the next segment once fewer than this many IDs remain.
    ///
    /// Environment variable: `SEGMENT_SAFE_DISTANCE`
    #[arg(long, global = true, env = "SEGMENT_SAFE_DISTANCE", default_value_t = segflake::DEFAULT_SAFE_DISTANCE)]
    pub safe_distance: u64,

    /// Abandon segments this many milliseconds after they were claimed.
    ///
    /// Environment variable: `SEGMENT_TTL_MS`
    #[arg(long, global = true, env = "SEGMENT_TTL_MS")]
    pub segment_ttl_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct SnowflakeArgs {
    /// Unix milliseconds that timestamp zero stands for.
    ///
    /// Environment variable: `SNOWFLAKE_EPOCH_MS`
    #[arg(long, global = true, env = "SNOWFLAKE_EPOCH_MS")]
    pub epoch_ms: Option<u64>,

    /// Environment variable: `SNOWFLAKE_TIMESTAMP_BITS`
    #[arg(long, global = true, env = "SNOWFLAKE_TIMESTAMP_BITS", default_value_t = 41)]
    pub timestamp_bits: u8,

    /// Environment variable: `SNOWFLAKE_MACHINE_BITS`
    #[arg(long, global = true, env = "SNOWFLAKE_MACHINE_BITS", default_value_t = 10)]
    pub machine_bits: u8,

    /// Environment variable: `SNOWFLAKE_SEQUENCE_BITS`
    #[arg(long, global = true, env = "SNOWFLAKE_SEQUENCE_BITS", default_value_t = 12)]
    pub sequence_bits: u8,

    /// What to do when the clock steps back: `reject`, `wait`, or
    /// `forward-offset`.
    ///
    /// Environment variable: `CLOCK_BACKWARDS`
    #[arg(long, global = true, env = "CLOCK_BACKWARDS", default_value = "wait")]
    pub clock_backwards: ClockBackwardsMode,

    /// Largest backward jump `wait` sleeps through, in milliseconds.
    ///
    /// Environment variable: `MAX_DRIFT_MS`
    #[arg(long, global = true, env = "MAX_DRIFT_MS", default_value_t = segflake::DEFAULT_MAX_DRIFT_MILLIS)]
    pub max_drift_ms: u64,

    /// Sequence bits `forward-offset` keeps for IDs issued after a backward
    /// jump.
    ///
    /// Environment variable: `RESERVED_OFFSET_BITS`
    #[arg(long, global = true, env = "RESERVED_OFFSET_BITS", default_value_t = 1)]
    pub reserved_offset_bits: u8,

    /// Fixed machine id. When unset, one is leased from an in-memory
    /// coordinator.
    ///
    /// Environment variable: `MACHINE_ID`
    #[arg(long, global = true, env = "MACHINE_ID")]
    pub machine_id: Option<u64>,

    /// Lease lifetime in seconds when leasing a machine id.
    ///
    /// Environment variable: `LEASE_TTL_SECS`
    #[arg(long, global = true, env = "LEASE_TTL_SECS", default_value_t = 30)]
    pub lease_ttl_secs: u64,
}

/// Where a Snowflake generator's machine id comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineSource {
    Static(u64),
    Leased(DistributorConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Generate { count: u64 },
    Parse { id: String, json: bool },
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub action: Action,
    pub kind: GeneratorKind,
    pub converter: Option<IdConverter>,
    pub segment: SegmentConfig,
    pub snowflake: SnowflakeConfig,
    pub machine: MachineSource,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let action = match args.command {
            Command::Generate { count } => {
                if count == 0 {
                    bail!("--count must be greater than 0");
                }
                Action::Generate { count }
            }
            Command::Parse { id, json } => Action::Parse { id, json },
        };

        let mut segment = SegmentConfig::new(
            args.segment.namespace,
            args.segment.step,
            args.segment.safe_distance,
        );
        if let Some(ttl) = args.segment.segment_ttl_ms {
            segment = segment.with_ttl(Duration::from_millis(ttl));
        }
        segment.validate()?;

        let defaults = SnowflakeConfig::default();
        let snowflake = SnowflakeConfig {
            epoch_millis: args.snowflake.epoch_ms.unwrap_or(defaults.epoch_millis),
            timestamp_bits: args.snowflake.timestamp_bits,
            machine_bits: args.snowflake.machine_bits,
            sequence_bits: args.snowflake.sequence_bits,
            clock_backwards: args.snowflake.clock_backwards,
            max_tolerated_drift_millis: args.snowflake.max_drift_ms,
            reserved_offset_bits: args.snowflake.reserved_offset_bits,
        };
        let layout = snowflake.layout()?;
        snowflake.policy()?;

        let machine = match args.snowflake.machine_id {
            Some(machine_id) => {
                if machine_id > layout.max_machine_id() {
                    bail!(
                        "MACHINE_ID ({}) exceeds the {}-bit machine field (max = {})",
                        machine_id,
                        layout.machine_bits(),
                        layout.max_machine_id()
                    );
                }
                MachineSource::Static(machine_id)
            }
            None => {
                let distributor = DistributorConfig::new(
                    segment.namespace.clone(),
                    layout.machine_bits(),
                    Duration::from_secs(args.snowflake.lease_ttl_secs),
                );
                // Only a Snowflake generator needs the lease.
                if args.kind == GeneratorKind::Snowflake {
                    distributor.validate()?;
                }
                MachineSource::Leased(distributor)
            }
        };

        Ok(Self {
            action,
            kind: args.kind,
            converter: args.format,
            segment,
            snowflake,
            machine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> anyhow::Result<CliConfig> {
        let args = CliArgs::try_parse_from(core::iter::once("segflake").chain(args.iter().copied()))?;
        CliConfig::try_from(args)
    }

    #[test]
    fn defaults_to_one_segment_id() {
        let config = config(&["generate"]).unwrap();
        assert_eq!(config.action, Action::Generate { count: 1 });
        assert_eq!(config.kind, GeneratorKind::SegmentChain);
        assert_eq!(config.segment, SegmentConfig::default());
        assert_eq!(config.snowflake, SnowflakeConfig::default());
        assert!(config.converter.is_none());
    }

    #[test]
    fn snowflake_flags_build_the_layout() {
        let config = config(&[
            "generate",
            "--kind",
            "snowflake",
            "--machine-bits",
            "4",
            "--machine-id",
            "15",
            "--clock-backwards",
            "forward-offset",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(config.action, Action::Generate { count: 3 });
        assert_eq!(config.snowflake.machine_bits, 4);
        assert_eq!(config.snowflake.clock_backwards, ClockBackwardsMode::ForwardOffset);
        assert_eq!(config.machine, MachineSource::Static(15));
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(config(&["generate", "--count", "0"]).is_err());
        assert!(config(&["generate", "--step", "10", "--safe-distance", "11"]).is_err());
        assert!(config(&["generate", "--machine-bits", "4", "--machine-id", "16"]).is_err());
        assert!(config(&["generate", "--timestamp-bits", "60", "--kind", "snowflake"]).is_err());
        assert!(config(&["generate", "--kind", "uuid"]).is_err());
    }

    #[test]
    fn parse_takes_a_format() {
        let config = config(&["parse", "--format", "ord_:base32", "ord_000000000001A"]).unwrap();
        assert_eq!(
            config.action,
            Action::Parse {
                id: String::from("ord_000000000001A"),
                json: false
            }
        );
        assert_eq!(
            config.converter,
            Some(IdConverter::prefixed("ord_", IdConverter::Base32))
        );
    }
}
