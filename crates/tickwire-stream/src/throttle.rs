//! Process-wide spacing of new streaming connections.
//!
//! The streaming API limits how quickly a token may open connections, so all
//! sessions in the process share one throttle.

use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global throttle instance.
static THROTTLE: OnceLock<ConnectThrottle> = OnceLock::new();

/// Enforces a minimum interval between connection attempts.
#[derive(Debug, Default)]
pub struct ConnectThrottle {
    last_attempt: Mutex<Option<Instant>>,
}

impl ConnectThrottle {
    /// Creates a throttle with no recorded attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide throttle.
    #[must_use]
    pub fn global() -> &'static Self {
        THROTTLE.get_or_init(Self::new)
    }

    /// Waits until `interval` has passed since the previous attempt, then
    /// records a new attempt. Returns how long the caller waited.
    ///
    /// The lock is held while waiting, so concurrent callers are released
    /// one interval apart.
    pub async fn acquire(&self, interval: Duration) -> Duration {
        let mut last_attempt = self.last_attempt.lock().await;
        let started = Instant::now();

        if let Some(previous) = *last_attempt {
            let ready_at = previous + interval;
            if ready_at > started {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        *last_attempt = Some(now);
        now - started
    }
}
