/// Represents the result of polling a [`SnowflakeIdGenerator`] once.
///
/// - [`IdGenStatus::Ready`] indicates a new ID was generated.
/// - [`IdGenStatus::Pending`] means the generator cannot issue an ID right
///   now: either the sequence for the current millisecond is spent, or a
///   bounded clock-backwards wait is in effect. Poll again after
///   `yield_for` milliseconds.
///
/// This allows non-blocking generation loops and clean backoff strategies.
///
/// # Example
///
/// ```
/// use segflake::{ClockBackwardsPolicy, IdGenStatus, SnowflakeIdGenerator, SnowflakeLayout, SystemClock};
///
/// let generator = SnowflakeIdGenerator::new(
///     SnowflakeLayout::default(),
///     1,
///     ClockBackwardsPolicy::default(),
///     SystemClock,
/// )?;
/// match generator.try_poll_id()? {
///     IdGenStatus::Ready { id } => println!("ID: {id}"),
///     IdGenStatus::Pending { yield_for } => println!("Back off for {yield_for}ms"),
/// }
/// # Ok::<_, segflake::Error>(())
/// ```
///
/// [`SnowflakeIdGenerator`]: crate::SnowflakeIdGenerator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated ID.
        id: u64,
    },
    /// No ID could be generated yet.
    Pending {
        /// Milliseconds to wait before polling again.
        yield_for: u64,
    },
}
