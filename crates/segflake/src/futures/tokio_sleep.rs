use core::{future::Future, time::Duration};

use crate::futures::SleepProvider;

/// Waits on tokio's timer. The default for [`SnowflakeIdGenerator::next_id`].
///
/// [`SnowflakeIdGenerator::next_id`]: crate::SnowflakeIdGenerator::next_id
pub struct TokioSleep;
impl SleepProvider for TokioSleep {
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}

/// Ignores the requested duration and yields back to the scheduler.
///
/// Sub-millisecond waits are common when a sequence rolls over, and tokio's
/// timer rounds them up to a full millisecond. Yielding retries sooner at the
/// cost of busier polling when many tasks share a generator.
pub struct TokioYield;
impl SleepProvider for TokioYield {
    fn sleep_for(_dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::task::yield_now()
    }
}
