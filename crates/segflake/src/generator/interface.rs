use core::{fmt, future::Future, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    Error, MAX_ID, Result, SegmentChainIdGenerator, SegmentRepository, SnowflakeIdGenerator,
    SnowflakeParts, TimeSource,
};

/// Which family of generator produced an ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum GeneratorKind {
    SegmentChain,
    Snowflake,
}

impl GeneratorKind {
    /// Whether IDs sort by creation time across instances.
    ///
    /// Segment IDs only increase within one generator; two generators sharing
    /// a repository interleave whole segments.
    pub const fn is_time_ordered(&self) -> bool {
        matches!(self, Self::Snowflake)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SegmentChain => "segment",
            Self::Snowflake => "snowflake",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "segment" | "segment-chain" => Ok(Self::SegmentChain),
            "snowflake" => Ok(Self::Snowflake),
            other => Err(Error::invalid_config(format!(
                "unknown generator kind `{other}` (expected segment or snowflake)"
            ))),
        }
    }
}

/// What an ID says about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "kebab-case"))]
pub enum IdBreakdown {
    /// Segment IDs are opaque counters.
    Segment { value: u64 },
    Snowflake(SnowflakeParts),
}

impl fmt::Display for IdBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment { value } => write!(f, "value={value}"),
            Self::Snowflake(parts) => fmt::Display::fmt(parts, f),
        }
    }
}

/// The surface shared by every generator.
pub trait IdGenerator: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    /// Generates the next ID, in `namespace` where the generator has
    /// namespaces.
    ///
    /// # Errors
    ///
    /// Whatever the underlying generator reports; no sentinel IDs.
    fn generate(&self, namespace: Option<&str>) -> impl Future<Output = Result<u64>> + Send;

    /// Describes an ID this generator could have produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] for IDs outside the generator's
    /// domain.
    fn parse(&self, id: u64) -> Result<IdBreakdown>;
}

impl<R: SegmentRepository> IdGenerator for SegmentChainIdGenerator<R> {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::SegmentChain
    }

    /// Uses the configured namespace when `namespace` is `None`.
    fn generate(&self, namespace: Option<&str>) -> impl Future<Output = Result<u64>> + Send {
        async move {
            match namespace {
                Some(namespace) => self.next(namespace).await,
                None => self.next_default().await,
            }
        }
    }

    fn parse(&self, id: u64) -> Result<IdBreakdown> {
        if id == 0 || id > MAX_ID {
            return Err(Error::InvalidEncoding {
                reason: format!("{id} is outside the id domain [1, {MAX_ID}]"),
            });
        }
        Ok(IdBreakdown::Segment { value: id })
    }
}

impl<T: TimeSource + Send + Sync> IdGenerator for SnowflakeIdGenerator<T> {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Snowflake
    }

    /// Snowflake IDs are partitioned by machine id, so `namespace` is
    /// ignored.
    fn generate(&self, _namespace: Option<&str>) -> impl Future<Output = Result<u64>> + Send {
        async move { self.next_id().await }
    }

    fn parse(&self, id: u64) -> Result<IdBreakdown> {
        self.layout().decompose(id).map(IdBreakdown::Snowflake)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ClockBackwardsPolicy, InMemorySegmentRepository, SegmentConfig, SnowflakeLayout,
        test_support::ManualClock,
    };

    async fn generate_three<G: IdGenerator>(generator: &G, namespace: Option<&str>) -> Vec<u64> {
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(generator.generate(namespace).await.unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn segment_generator_through_the_trait() {
        let repo = Arc::new(InMemorySegmentRepository::new());
        let generator =
            SegmentChainIdGenerator::new(repo, SegmentConfig::new("orders", 10, 2)).unwrap();

        assert_eq!(generator.kind(), GeneratorKind::SegmentChain);
        assert!(!generator.kind().is_time_ordered());
        assert_eq!(generate_three(&generator, None).await, vec![1, 2, 3]);
        assert_eq!(generate_three(&generator, Some("users")).await, vec![1, 2, 3]);

        assert_eq!(
            IdGenerator::parse(&generator, 3).unwrap(),
            IdBreakdown::Segment { value: 3 }
        );
        assert!(IdGenerator::parse(&generator, 0).is_err());
        assert!(IdGenerator::parse(&generator, MAX_ID + 1).is_err());
    }

    #[tokio::test]
    async fn snowflake_generator_through_the_trait() {
        let layout = SnowflakeLayout::default();
        let clock = ManualClock::new(layout.epoch_millis() + 100);
        let generator =
            SnowflakeIdGenerator::new(layout, 4, ClockBackwardsPolicy::Reject, clock).unwrap();

        assert_eq!(generator.kind(), GeneratorKind::Snowflake);
        assert!(generator.kind().is_time_ordered());

        let ids = generate_three(&generator, Some("ignored")).await;
        let IdBreakdown::Snowflake(parts) = IdGenerator::parse(&generator, ids[2]).unwrap() else {
            panic!("expected a snowflake breakdown");
        };
        assert_eq!(parts.timestamp, 100);
        assert_eq!(parts.machine_id, 4);
        assert_eq!(parts.sequence, 2);
    }

    #[test]
    fn kind_parses_from_cli_strings() {
        assert_eq!("segment".parse::<GeneratorKind>().unwrap(), GeneratorKind::SegmentChain);
        assert_eq!("Snowflake".parse::<GeneratorKind>().unwrap(), GeneratorKind::Snowflake);
        assert!("uuid".parse::<GeneratorKind>().is_err());
        assert_eq!(GeneratorKind::SegmentChain.to_string(), "segment");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn breakdown_serializes_with_a_kind_tag() {
        let json = serde_json::to_value(IdBreakdown::Segment { value: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "segment", "value": 7}));
    }
}
