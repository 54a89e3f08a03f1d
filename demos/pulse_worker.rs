//! Pulse Worker Demo
//!
//! Runs a producer and two consumers as pulse loops, then shuts them down:
//! the producer stops gracefully, the consumers are blocked on an empty queue
//! and get force-stopped once the grace period runs out.

use crossbeam_channel::unbounded;
use rust_quiesce::{
    BoxError, ForceStopFn, PulseContext, PulseCounter, PulseError, PulseLoop, ShutdownCoordinator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("Pulse Worker Demo");
    println!("=================");

    let last_resort = Arc::new(ForceStopFn::new("demo-exit", || {
        println!("   last resort: nothing left to clean up");
        Ok::<(), BoxError>(())
    }));
    let coordinator = ShutdownCoordinator::new().with_last_resort(last_resort);
    coordinator.set_max_grace_seconds(2);

    let (tx, rx) = unbounded::<usize>();
    // keeps the queue connected so idle consumers stay blocked
    let _queue_open = tx.clone();
    let produced = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));

    let producer = {
        let produced = produced.clone();
        PulseLoop::builder(move |ctx: &PulseContext| -> Result<(), PulseError> {
            let n = produced.fetch_add(1, Ordering::SeqCst);
            if n < 20 {
                tx.send(n).map_err(PulseError::failed)?;
            }
            ctx.sleep(Duration::from_millis(25))
        })
        .name("producer")
        .build()
    };

    let mut handles = Vec::new();
    for i in 0..2 {
        let rx = rx.clone();
        let consumed = consumed.clone();
        let counter = PulseCounter::new();
        let consumer = PulseLoop::builder(move |ctx: &PulseContext| -> Result<(), PulseError> {
            let job = ctx.recv(&rx)?;
            if job % 7 == 6 {
                return Err(PulseError::failed(format!("job {job} is unlucky")));
            }
            consumed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .name(format!("consumer-{i}"))
        .hooks(counter)
        .build();
        handles.push(coordinator.spawn(consumer)?);
    }
    // registered last so it is asked to stop first
    handles.push(coordinator.spawn(producer)?);

    std::thread::sleep(Duration::from_secs(1));
    println!(
        "\nproduced {} / consumed {}, shutting down",
        produced.load(Ordering::SeqCst).min(20),
        consumed.load(Ordering::SeqCst)
    );

    let started = Instant::now();
    let problems = coordinator.shutdown_gracefully();
    println!("shutdown took {:?}", started.elapsed());
    for problem in &problems {
        println!("   problem: {problem}");
    }

    for handle in handles {
        handle.join().map_err(|_| "pulse loop panicked")??;
    }
    println!("all loops joined");
    Ok(())
}
