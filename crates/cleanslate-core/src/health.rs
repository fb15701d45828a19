//! Readiness checks with linear backoff.

use crate::ports::Connection;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Linear backoff policy: the wait after failed attempt `k` is `k * base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max_attempts: 20,
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }

    /// Upper bound on total sleep time: `base * n(n+1)/2`, saturating at
    /// [`Duration::MAX`].
    pub fn total_budget(&self) -> Duration {
        let n = u128::from(self.max_attempts);
        let nanos = self.base.as_nanos().saturating_mul(n * (n + 1) / 2);
        u64::try_from(nanos)
            .map(Duration::from_nanos)
            .unwrap_or(Duration::MAX)
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// The first attempt runs immediately and nothing is slept after the last
/// one. Exhaustion yields [`Error::NotReady`] carrying the last failure.
pub async fn retry<T, F, Fut>(backoff: &Backoff, target: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = backoff.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(target_name = %target, attempt, "Ready after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= attempts => {
                warn!(target_name = %target, attempts, error = %e, "Giving up");
                return Err(Error::NotReady {
                    target: target.to_string(),
                    attempts,
                    last_error: e.to_string(),
                });
            }
            Err(e) => {
                let delay = backoff.delay_after(attempt);
                debug!(
                    target_name = %target,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Not ready, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Block until `conn` answers a ping or attempts run out.
pub async fn wait_until_ready<C>(conn: &C, backoff: &Backoff) -> Result<()>
where
    C: Connection + ?Sized,
{
    retry(backoff, "database", || conn.ping()).await
}

/// Like [`wait_until_ready`], but an unavailable database aborts the calling
/// test.
pub async fn ensure_ready<C>(conn: &C, backoff: &Backoff)
where
    C: Connection + ?Sized,
{
    if let Err(e) = wait_until_ready(conn, backoff).await {
        panic!("database is not ready: {}", e);
    }
}
