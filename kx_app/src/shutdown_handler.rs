use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Sets up a Ctrl+C handler that sets the running flag to false on shutdown signal
pub fn setup(running: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        running.store(false, Ordering::Relaxed);
    })
}

/// Block the calling thread until `running` is cleared
pub fn wait(running: &AtomicBool, poll: Duration) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(poll);
    }
}
