mod chain;
mod config;
mod generator;
mod id_segment;

pub(crate) use chain::SegmentChain;
pub use chain::{ChainSnapshot, PREFETCH_RETRY_INTERVAL, StandbyStatus};
pub use config::*;
pub use generator::*;
pub use id_segment::*;
