use crate::sys;

use std::thread;
use std::time::{Duration, Instant};

/// Process-wide measurements the writers poll for throttling and benchmarking.
pub trait SystemMetrics: Send + Sync {
    /// Monotonic wall time since an arbitrary origin.
    fn wall_time(&self) -> Duration;

    /// Total CPU time (user + kernel) consumed by this process, if available.
    fn cpu_time(&self) -> Option<Duration>;

    /// Resident set size of this process in bytes, if available.
    fn resident_memory(&self) -> Option<u64>;

    fn cpu_count(&self) -> usize;

    fn sleep(&self, d: Duration);
}

pub struct ProcessMetrics {
    origin: Instant,
    cpus: usize,
}

impl ProcessMetrics {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            cpus: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetrics for ProcessMetrics {
    fn wall_time(&self) -> Duration {
        self.origin.elapsed()
    }

    fn cpu_time(&self) -> Option<Duration> {
        sys::cpu_time()
    }

    fn resident_memory(&self) -> Option<u64> {
        sys::resident_memory()
    }

    fn cpu_count(&self) -> usize {
        self.cpus
    }

    fn sleep(&self, d: Duration) {
        thread::sleep(d)
    }
}

/// CPU usage between two samples as a percentage of the whole machine.
pub fn cpu_percent(cpu: Duration, wall: Duration, cpus: usize) -> f64 {
    let wall = wall.as_secs_f64();
    if wall <= 0.0 {
        return 0.0;
    }
    cpu.as_secs_f64() / wall * 100.0 / cpus.max(1) as f64
}
