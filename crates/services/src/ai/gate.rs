use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between outbound generation requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Serializes outbound AI requests and enforces a minimum interval between
/// their start times.
///
/// `acquire` holds the internal lock across the spacing sleep, so waiters
/// proceed strictly in arrival order and each dispatch starts at least
/// `min_interval` after the previous one, process-wide when the gate is
/// shared.
pub struct RequestGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl RequestGate {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait for this caller's turn, then mark the dispatch time.
    ///
    /// Returns once the caller is clear to send. The first caller passes
    /// immediately.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
