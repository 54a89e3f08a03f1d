use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_quiesce::{
    BoxError, ForceStoppable, Participant, ShutdownCoordinator, Sleeper, Stoppable,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stops as soon as it is asked to
struct Prompt {
    stopped: AtomicBool,
}

impl Prompt {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            stopped: AtomicBool::new(false),
        })
    }
}

impl Stoppable for Prompt {
    fn request_graceful_stop(&self) -> Result<(), BoxError> {
        self.stopped.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

impl ForceStoppable for Prompt {
    fn force_stop(&self) -> Result<(), BoxError> {
        self.stopped.store(true, Ordering::Relaxed);
        Ok(())
    }
}

fn populated(count: usize) -> ShutdownCoordinator {
    let coordinator = ShutdownCoordinator::new().with_sleeper(Sleeper::system());
    for i in 0..count {
        if i % 2 == 0 {
            coordinator.register(Participant::forceable(Prompt::new()));
        } else {
            coordinator.register(Participant::graceful(Prompt::new()));
        }
    }
    coordinator
}

fn graceful_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("shutdown_gracefully");

    for &count in &[10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("prompt", count), &count, |b, &n| {
            b.iter_batched(
                || populated(n),
                |coordinator| black_box(coordinator.shutdown_gracefully()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn now_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("shutdown_now");

    for &count in &[10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("fan_out", count), &count, |b, &n| {
            let coordinator = populated(n);
            b.iter(|| black_box(coordinator.shutdown_now()))
        });
    }

    group.finish();
}

criterion_group!(coordinator_benches, graceful_benchmark, now_benchmark);
criterion_main!(coordinator_benches);
