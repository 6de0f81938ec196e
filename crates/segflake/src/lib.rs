//! Distributed ID generation.
//!
//! - [`SegmentChainIdGenerator`] hands out numbers from segments claimed in
//!   bulk from a [`SegmentRepository`], prefetching the next segment in the
//!   background so callers rarely wait on storage.
//! - [`SnowflakeIdGenerator`] packs a timestamp, machine id, and sequence
//!   into a `u64`, with a [`ClockBackwardsPolicy`] deciding what happens
//!   when the wall clock steps back.
//! - [`MachineIdDistributor`] leases machine ids from a
//!   [`CoordinationService`] and keeps them alive, so Snowflake generators
//!   on different hosts never share one.
//!
//! [`IdConverter`] turns IDs into fixed-width strings that sort like the
//! numbers they encode.

mod backend;
mod convert;
mod error;
mod futures;
mod generator;
mod machine;
mod segment;
mod snowflake;
#[cfg(test)]
mod test_support;
mod time;

pub use crate::backend::*;
pub use crate::convert::*;
pub use crate::error::*;
pub use crate::futures::*;
pub use crate::generator::*;
pub use crate::machine::*;
pub use crate::segment::*;
pub use crate::snowflake::*;
pub use crate::time::*;
