//! Bounded polling with a constant interval

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Outcome of a single poll attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

/// Maximum attempt count and constant delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn constant(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Total time the policy may wait before giving up
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    /// Poll `check` until it reports ready.
    ///
    /// An error from `check` aborts immediately. Exhausting the attempts
    /// yields [`CloudError::Timeout`] carrying `hint`.
    pub async fn wait_until<T, F, Fut>(&self, what: &str, hint: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<T>>>,
    {
        for attempt in 0..self.max_attempts {
            match check().await? {
                PollStatus::Ready(value) => {
                    tracing::debug!(what, attempts = attempt + 1, "Poll completed");
                    return Ok(value);
                }
                PollStatus::Pending => {
                    tracing::debug!(what, attempt = attempt + 1, "Still waiting");
                }
            }

            if attempt + 1 < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        Err(CloudError::Timeout(format!(
            "{} did not complete after {} attempts ({}s). {}",
            what,
            self.max_attempts,
            self.budget().as_secs(),
            hint
        )))
    }
}
