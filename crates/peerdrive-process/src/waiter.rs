//! Bounded polling for callers that must block until a process finishes.

use std::time::Duration;

use crate::{ProcessError, Result};

/// Counts down a maximum wait in fixed ticks (one second by default).
#[derive(Debug, Clone)]
pub struct Waiter {
    max_wait: Duration,
    granularity: Duration,
    waited: Duration,
}

impl Waiter {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            granularity: Duration::from_secs(1),
            waited: Duration::ZERO,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Poll more often than once a second.
    #[must_use]
    pub fn with_granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity.max(Duration::from_millis(1));
        self
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Sleep one tick, or fail with [`ProcessError::Timeout`] once the
    /// maximum wait is used up.
    pub async fn tick(&mut self) -> Result<()> {
        if self.waited >= self.max_wait {
            return Err(ProcessError::Timeout(self.max_wait));
        }
        tokio::time::sleep(self.granularity).await;
        self.waited += self.granularity;
        Ok(())
    }
}
