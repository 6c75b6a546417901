//! Cooperative stop handle passed to stream callbacks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Capability to request that a running stream stop.
///
/// The flag is one-way: once stop is requested it stays requested. Clones
/// share the same flag. The session checks it after each dispatched event,
/// so no event is dispatched after the callback that requested stop returns.
#[derive(Debug, Clone, Default)]
pub struct Signaller {
    stop: Arc<AtomicBool>,
}

impl Signaller {
    /// Creates a signaller with stop not requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the stream to stop. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns true once stop has been requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_one_way_and_idempotent() {
        let signal = Signaller::new();
        assert!(!signal.stop_requested());

        signal.stop();
        signal.stop();
        assert!(signal.stop_requested());
    }

    #[test]
    fn test_clones_share_flag() {
        let signal = Signaller::new();
        let handle = signal.clone();
        handle.stop();
        assert!(signal.stop_requested());

        let fresh = Signaller::new();
        assert!(!fresh.stop_requested());
    }

    #[test]
    fn test_stop_from_another_thread() {
        let signal = Signaller::new();
        let handle = signal.clone();
        std::thread::spawn(move || handle.stop()).join().unwrap();
        assert!(signal.stop_requested());
    }
}
