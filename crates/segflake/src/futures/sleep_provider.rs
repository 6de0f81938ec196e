use core::{future::Future, time::Duration};

/// Abstracts over how an async caller waits out a pending generator.
///
/// Snowflake generation reports *pending* when the sequence for the current
/// millisecond is spent or when a bounded clock-backwards wait is in effect.
/// The provider decides whether that wait is a timer sleep or a scheduler
/// yield.
pub trait SleepProvider {
    /// Returns a future that completes after roughly `dur`. The future must
    /// be `Send` so generator futures can move between worker threads.
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;
}
