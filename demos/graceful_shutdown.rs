//! Example demonstrating graceful shutdown via signal handling
//!
//! This example shows how to turn SIGTERM/SIGINT into a two-phase shutdown.
//! Press Ctrl+C once for a graceful shutdown, twice to force it.

#[cfg(feature = "signal")]
use rust_quiesce::signal::SignalHandler;
#[cfg(feature = "signal")]
use rust_quiesce::{BoxError, ForceStopFn, PulseContext, PulseError, PulseLoop, ShutdownCoordinator};
#[cfg(feature = "signal")]
use std::sync::Arc;
#[cfg(feature = "signal")]
use std::time::Duration;

#[cfg(feature = "signal")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let coordinator = ShutdownCoordinator::global();
    coordinator.set_max_grace_seconds(5);
    coordinator.set_last_resort(Arc::new(ForceStopFn::new("flush-logs", || {
        println!("Flushing logs before exit");
        Ok::<(), BoxError>(())
    })));

    let mut counter = 0u64;
    let worker = PulseLoop::builder(move |ctx: &PulseContext| -> Result<(), PulseError> {
        counter += 1;
        println!("Working... iteration {}", counter);
        ctx.sleep(Duration::from_millis(500))
    })
    .name("worker")
    .build();
    let handle = coordinator.spawn(worker)?;

    let requests = SignalHandler::new().start()?;
    let request = requests.recv()?;
    println!("Received {:?}, shutting down...", request);

    // a second signal while we wait escalates to an immediate shutdown
    let escalation = std::thread::spawn(move || {
        if let Ok(next) = requests.recv() {
            next.execute(ShutdownCoordinator::global());
        }
    });

    let problems = request.execute(coordinator);
    handle.join().map_err(|_| "worker panicked")??;
    drop(escalation);

    println!("Cleanup completed with {} problems, exiting", problems.len());
    std::process::exit(if problems.is_empty() { 0 } else { 1 });
}

#[cfg(not(feature = "signal"))]
fn main() {
    println!("Signal handling example requires the 'signal' feature");
    println!("Run with: cargo run --features signal --example graceful_shutdown");
}
