//! Backoff/retry policy for calls to external services.
//!
//! Transient failures (classified by `ErrorCode`, or by message pattern for
//! errors without a code) are retried with exponential backoff; everything
//! else propagates on the first attempt. Unknown errors default to
//! non-retryable so an unexpected failure is surfaced instead of masked
//! behind a retry loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use spark_core::error::Classify;

/// Default total retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Ceiling for any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);
/// Default wait for connectivity to come back.
pub const DEFAULT_ONLINE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Message fragments that mark an uncoded error as transient.
const RETRYABLE_MESSAGE_PATTERNS: [&str; 6] = [
    "network error",
    "connection error",
    "timeout",
    "temporarily unavailable",
    "service unavailable",
    "no internet connection",
];

/// Tuning knobs for `retry_with_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Deterministic retryability classification.
///
/// The classification code wins when present; otherwise the lower-cased
/// message is scanned for known transient-failure fragments; otherwise the
/// error is treated as permanent.
pub fn classify_retryable<E>(error: &E) -> bool
where
    E: Classify + fmt::Display,
{
    if let Some(code) = error.error_code() {
        return code.is_retryable();
    }
    let message = error.to_string().to_lowercase();
    RETRYABLE_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Run `operation` with exponential backoff between failed attempts.
///
/// Makes up to `max_retries + 1` attempts. A failure on the last attempt,
/// or one that `should_retry` rejects, propagates immediately with no
/// further delay. Otherwise the call sleeps `min(base_delay * 2^attempt,
/// max_delay)` (attempt is 0-indexed) and tries again. Returns the first
/// success, or the last observed error once attempts are exhausted.
///
/// There is no per-attempt timeout and no cancellation token; callers
/// cancel by dropping the returned future.
///
/// # Errors
///
/// Returns the operation's error after exhausting attempts or on a
/// non-retryable failure.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    options: RetryOptions,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= options.max_retries || !should_retry(&error) {
                    return Err(error);
                }
                let delay = backoff_delay(options, attempt);
                warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// `retry_with_backoff` with the default classifier.
///
/// # Errors
///
/// See [`retry_with_backoff`].
pub async fn retry_classified<T, E, F, Fut>(options: RetryOptions, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    retry_with_backoff(options, classify_retryable, operation).await
}

fn backoff_delay(options: RetryOptions, attempt: u32) -> Duration {
    options
        .base_delay
        .saturating_mul(2_u32.saturating_pow(attempt))
        .min(options.max_delay)
}

/// Process-wide connectivity state, observable by any number of waiters.
///
/// Backed by a watch channel; each `wait_for_online` call takes its own
/// subscription and drops it on return, so neither outcome leaks a
/// listener.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    online: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self {
            online: Arc::new(tx),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.send_replace(online);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.subscribe().borrow()
    }

    /// Resolve `true` as soon as the monitor reports online, or `false`
    /// once the timeout elapses. Resolves immediately when already online.
    pub async fn wait_for_online(&self, timeout: Duration) -> bool {
        let mut rx = self.online.subscribe();
        if *rx.borrow() {
            return true;
        }
        tokio::time::timeout(timeout, async move {
            loop {
                if rx.changed().await.is_err() {
                    return false;
                }
                if *rx.borrow() {
                    return true;
                }
            }
        })
        .await
        .unwrap_or(false)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
