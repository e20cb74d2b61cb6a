//! Soft and hard resource ceilings shared by every write strategy.
//!
//! Rate and CPU limits are soft: the writer sleeps in short bounded increments until the
//! measured value falls back under the ceiling. The RAM limit is hard and aborts the run.

use crate::metrics::{cpu_percent, SystemMetrics};
use crate::{Error, ErrorKind, Result};

use log::warn;

use std::time::Duration;

const MIN_RATE_SLEEP: Duration = Duration::from_millis(1);
const MAX_RATE_SLEEP: Duration = Duration::from_millis(100);
const CPU_SLEEP: Duration = Duration::from_millis(5);

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Limits {
    /// Bytes per second.
    pub rate: Option<u64>,
    /// Percent of the whole machine, 0..=100.
    pub cpu_percent: Option<f64>,
    /// Resident memory ceiling in bytes.
    pub ram: Option<u64>,
}

pub struct Throttle<'a> {
    limits: Limits,
    metrics: &'a dyn SystemMetrics,
    wall_start: Duration,
    cpu_start: Duration,
}

impl<'a> Throttle<'a> {
    pub fn new(mut limits: Limits, metrics: &'a dyn SystemMetrics) -> Self {
        if limits.rate == Some(0) {
            limits.rate = None;
        }
        let cpu_start = match metrics.cpu_time() {
            Some(t) => t,
            None => {
                if limits.cpu_percent.take().is_some() {
                    warn!("Process CPU time is unavailable, --cpu-limit is ignored");
                }
                Duration::from_secs(0)
            }
        };
        if limits.ram.is_some() && metrics.resident_memory().is_none() {
            warn!("Process memory usage is unavailable, --ram-limit is ignored");
            limits.ram = None;
        }
        Self {
            limits,
            metrics,
            wall_start: metrics.wall_time(),
            cpu_start,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn metrics(&self) -> &'a dyn SystemMetrics {
        self.metrics
    }

    pub fn elapsed(&self) -> Duration {
        self.metrics
            .wall_time()
            .checked_sub(self.wall_start)
            .unwrap_or_default()
    }

    /// Blocks until `written` bytes fit into `rate * elapsed`.
    pub fn pace(&self, written: u64) {
        let rate = match self.limits.rate {
            Some(r) => r as f64,
            None => return,
        };
        loop {
            let allowed = rate * self.elapsed().as_secs_f64();
            let ahead = written as f64 - allowed;
            if ahead <= 0.0 {
                return;
            }
            let wait = Duration::from_secs_f64(ahead / rate);
            self.metrics.sleep(wait.max(MIN_RATE_SLEEP).min(MAX_RATE_SLEEP));
        }
    }

    /// CPU usage of this process since the throttle was created.
    pub fn cpu_usage(&self) -> Option<f64> {
        let cpu = self.metrics.cpu_time()?;
        Some(cpu_percent(
            cpu.checked_sub(self.cpu_start).unwrap_or_default(),
            self.elapsed(),
            self.metrics.cpu_count(),
        ))
    }

    /// Blocks while CPU usage is above the ceiling.
    pub fn cool_down(&self) {
        let limit = match self.limits.cpu_percent {
            Some(l) => l,
            None => return,
        };
        while let Some(usage) = self.cpu_usage() {
            if usage <= limit {
                break;
            }
            self.metrics.sleep(CPU_SLEEP);
        }
    }

    pub fn check_memory(&self) -> Result<()> {
        let limit = match self.limits.ram {
            Some(l) => l,
            None => return Ok(()),
        };
        match self.metrics.resident_memory() {
            Some(rss) if rss > limit => Err(Error::new(ErrorKind::RamLimitExceeded { rss, limit })),
            _ => Ok(()),
        }
    }

    /// All post-write checks in the order the writers apply them.
    pub fn after_write(&self, written: u64) -> Result<()> {
        self.pace(written);
        self.cool_down();
        self.check_memory()
    }

    /// Delay a single worker takes before writing `len` bytes, given an even share of the rate.
    pub fn worker_delay(&self, len: usize, workers: usize) -> Option<Duration> {
        let rate = self.limits.rate?;
        let share = (rate / workers.max(1) as u64).max(1);
        Some(Duration::from_secs_f64(len as f64 / share as f64))
    }

    pub fn hold(&self, d: Duration) {
        if d > Duration::from_secs(0) {
            self.metrics.sleep(d);
        }
    }
}
