use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::try_join_all;
use segflake::{
    ClockBackwardsPolicy, IdConverter, IdGenStatus, InMemorySegmentRepository, MonotonicClock,
    Result, SegmentChainIdGenerator, SegmentConfig, SnowflakeIdGenerator, SnowflakeLayout,
    TimeSource,
};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tokio::runtime::{Builder, Runtime};

#[derive(Clone)]
struct FixedMockTime {
    millis: u64,
}

impl TimeSource for FixedMockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

fn runtime(worker_threads: usize) -> Runtime {
    Builder::new_multi_thread()
        .enable_all()
        .worker_threads(worker_threads)
        .build()
        .unwrap()
}

fn snowflake<T: TimeSource>(machine_id: u64, time: T) -> SnowflakeIdGenerator<T> {
    SnowflakeIdGenerator::new(
        SnowflakeLayout::default(),
        machine_id,
        ClockBackwardsPolicy::default(),
        time,
    )
    .unwrap()
}

fn segments(step: u64) -> SegmentChainIdGenerator<InMemorySegmentRepository> {
    let repository = Arc::new(InMemorySegmentRepository::new());
    SegmentChainIdGenerator::new(repository, SegmentConfig::new("bench", step, step / 5)).unwrap()
}

/// Hot path with a frozen clock: every poll is `Ready` because the layout's
/// sequence space covers `TOTAL_IDS`.
fn benchmark_mock_sequential_snowflake(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock/sequential/snowflake");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    let layout = SnowflakeLayout::new(core::time::Duration::ZERO, 40, 10, 13).unwrap();
    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = SnowflakeIdGenerator::new(
                    layout,
                    1,
                    ClockBackwardsPolicy::Reject,
                    FixedMockTime { millis: 1 },
                )
                .unwrap();
                for _ in 0..TOTAL_IDS {
                    match generator.try_poll_id().unwrap() {
                        IdGenStatus::Ready { id } => {
                            black_box(id);
                        }
                        IdGenStatus::Pending { .. } => unreachable!(),
                    }
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Shared generator on the real clock, spinning on `Pending`.
fn benchmark_mono_threaded_snowflake(c: &mut Criterion) {
    let mut group = c.benchmark_group("mono/threaded/snowflake");

    for thread_count in [1, 2, 4, 8, num_cpus::get()] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_IDS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let generator = Arc::new(snowflake(0, MonotonicClock::default()));
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let generator = Arc::clone(&generator);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        loop {
                                            match generator.try_poll_id().unwrap() {
                                                IdGenStatus::Ready { id } => {
                                                    black_box(id);
                                                    break;
                                                }
                                                IdGenStatus::Pending { .. } => {
                                                    core::hint::spin_loop()
                                                }
                                            }
                                        }
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

/// Single async snowflake generator on one tokio worker.
fn benchmark_mono_sequential_tokio_snowflake(c: &mut Criterion) {
    let mut group = c.benchmark_group("mono/sequential/async/tokio/snowflake");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        let rt = runtime(1);

        b.to_async(&rt).iter_custom(|iters| async move {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = snowflake(0, MonotonicClock::default());
                for _ in 0..TOTAL_IDS {
                    let id = generator.next_id().await.unwrap();
                    black_box(id);
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Single segment chain, varying the step so the prefetch path runs at
/// different rates.
fn benchmark_sequential_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("mem/sequential/async/tokio/segment");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for step in [64_u64, 512, 4096] {
        group.bench_function(format!("elems/{}/step/{}", TOTAL_IDS, step), |b| {
            let rt = runtime(1);

            b.to_async(&rt).iter_custom(move |iters| async move {
                let start = Instant::now();

                for _ in 0..iters {
                    let generator = segments(step);
                    for _ in 0..TOTAL_IDS {
                        let id = generator.next_default().await.unwrap();
                        black_box(id);
                    }
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

/// One segment chain shared by many tasks.
fn benchmark_contended_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("mem/contended/async/tokio/segment");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);

    let total_ids = TOTAL_IDS * 64;

    for num_tasks in [1, 4, 16, 64] {
        let ids_per_task = total_ids / num_tasks;

        group.throughput(Throughput::Elements(total_ids as u64));
        group.bench_function(format!("elems/{}/tasks/{}", total_ids, num_tasks), |b| {
            let rt = runtime(num_cpus::get());

            b.to_async(&rt).iter_custom(move |iters| async move {
                let start = Instant::now();

                for _ in 0..iters {
                    let generator = Arc::new(segments(1_000));
                    let mut tasks: Vec<tokio::task::JoinHandle<Result<()>>> =
                        Vec::with_capacity(num_tasks);

                    for _ in 0..num_tasks {
                        let generator = Arc::clone(&generator);
                        tasks.push(tokio::spawn(async move {
                            for _ in 0..ids_per_task {
                                let id = generator.next_default().await?;
                                black_box(id);
                            }
                            Ok(())
                        }));
                    }

                    for result in try_join_all(tasks).await.unwrap() {
                        result.unwrap();
                    }
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

fn benchmark_converters(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for converter in [IdConverter::Radix62, IdConverter::Base32] {
        group.bench_function(format!("{}/elems/{}", converter, TOTAL_IDS), |b| {
            b.iter(|| {
                for id in 0..TOTAL_IDS as u64 {
                    let encoded = converter.encode(black_box(id << 22));
                    black_box(converter.decode(&encoded).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    // Snowflake
    benchmark_mock_sequential_snowflake,
    benchmark_mono_threaded_snowflake,
    benchmark_mono_sequential_tokio_snowflake,
    // Segment chain
    benchmark_sequential_segment,
    benchmark_contended_segment,
    // Converters
    benchmark_converters,
);
criterion_main!(benches);
