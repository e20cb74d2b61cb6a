use crate::metrics::SystemMetrics;
use crate::{Error, Result};

use log::warn;

use std::io;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed for a single chunk.
    pub io_retries: u32,
    /// Retries allowed for the whole run.
    pub error_budget: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            io_retries: 0,
            error_budget: 10,
            delay: Duration::from_millis(10),
        }
    }
}

/// Tracks the run-global error budget across chunk writes.
#[derive(Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    budget_left: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            budget_left: policy.error_budget,
        }
    }

    pub fn budget_left(&self) -> u32 {
        self.budget_left
    }

    /// Runs `op` until it succeeds. Every retry consumes one unit of the per-chunk allowance and
    /// one unit of the global budget; running out of either turns the last failure fatal.
    pub fn run<F>(&mut self, metrics: &dyn SystemMetrics, mut op: F) -> Result<()>
    where
        F: FnMut() -> io::Result<()>,
    {
        let mut retries_left = self.policy.io_retries;
        loop {
            let err = match op() {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if retries_left == 0 || self.budget_left == 0 {
                return Err(Error::from(err));
            }
            retries_left -= 1;
            self.budget_left -= 1;
            warn!(
                "Write failed ({}), retrying ({} left for this chunk, {} left overall)",
                err, retries_left, self.budget_left
            );
            metrics.sleep(self.policy.delay);
        }
    }
}
