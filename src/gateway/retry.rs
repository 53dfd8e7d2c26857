//! Bounded retry for transient collaborator errors.

use parley_core::error::ParleyError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Back-off before each retry: 500ms, 1s, 2s.
pub const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// How often, and how patiently, a failed call is repeated.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_delays(RETRY_DELAYS_MS.iter().map(|ms| Duration::from_millis(*ms)))
    }
}

impl RetryPolicy {
    /// One retry per delay.
    pub fn with_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Run `op`, retrying while it fails with a transient error.
    ///
    /// Non-transient errors are returned immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ParleyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ParleyError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => match self.delays.get(attempt) {
                    Some(delay) => {
                        attempt += 1;
                        warn!(
                            "{what} attempt {attempt}/{} failed: {e}, retrying in {}ms",
                            self.max_attempts(),
                            delay.as_millis()
                        );
                        tokio::time::sleep(*delay).await;
                    }
                    None => {
                        error!(
                            "{what} attempt {}/{} failed: {e}, giving up",
                            attempt + 1,
                            self.max_attempts()
                        );
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}
