use crate::metrics::SystemMetrics;

use std::io::{self, Write};
use std::time::Duration;

/// Counters shared between the writer threads and the progress monitor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressState {
    pub written: u64,
    pub produced: u64,
    pub remaining: Option<u64>,
    pub chunks: u64,
    pub done: bool,
    pub failed: bool,
}

/// Renders periodic progress lines on stderr.
pub struct ProgressLine<'a> {
    total: Option<u64>,
    interval: Duration,
    metrics: &'a dyn SystemMetrics,
    start: Duration,
    last: Duration,
    printed: bool,
}

impl<'a> ProgressLine<'a> {
    pub fn new(total: Option<u64>, interval: Duration, metrics: &'a dyn SystemMetrics) -> Self {
        let now = metrics.wall_time();
        Self {
            total,
            interval,
            metrics,
            start: now,
            last: now,
            printed: false,
        }
    }

    /// Prints a line if the interval has passed since the previous one.
    pub fn tick(&mut self, written: u64) {
        let now = self.metrics.wall_time();
        if now.checked_sub(self.last).unwrap_or_default() < self.interval {
            return;
        }
        self.last = now;
        self.print(written);
    }

    pub fn print(&mut self, written: u64) {
        let elapsed = self.metrics.wall_time().checked_sub(self.start).unwrap_or_default();
        let line = format_progress(written, self.total, elapsed);
        let mut stderr = io::stderr();
        let _ = write!(stderr, "\r{}", line);
        let _ = stderr.flush();
        self.printed = true;
    }

    pub fn finish(&mut self, written: u64) {
        self.print(written);
        if self.printed {
            eprintln!();
        }
    }
}

pub fn format_progress(written: u64, total: Option<u64>, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { written as f64 / secs } else { 0.0 };
    match total {
        Some(total) if total > 0 => {
            let pct = written as f64 * 100.0 / total as f64;
            let eta = if rate > 0.0 {
                Some(total.saturating_sub(written) as f64 / rate)
            } else {
                None
            };
            format!(
                "Progress: {} ({:.1}%) @ {}/s ETA {}",
                fmt_bytes(written),
                pct,
                fmt_bytes(rate as u64),
                fmt_eta(eta)
            )
        }
        _ => format!("Progress: {} @ {}/s", fmt_bytes(written), fmt_bytes(rate as u64)),
    }
}

pub fn fmt_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn fmt_eta(secs: Option<f64>) -> String {
    let secs = match secs {
        Some(s) if s.is_finite() && s >= 0.0 => s as u64,
        _ => return "--:--".to_string(),
    };
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(1536), "1.5 KiB");
        assert_eq!(fmt_bytes(64 * 1024 * 1024), "64.0 MiB");
    }

    #[test]
    fn eta() {
        assert_eq!(fmt_eta(None), "--:--");
        assert_eq!(fmt_eta(Some(75.0)), "01:15");
        assert_eq!(fmt_eta(Some(3725.0)), "01:02:05");
    }

    #[test]
    fn line_without_total() {
        let line = format_progress(2048, None, Duration::from_secs(2));
        assert_eq!(line, "Progress: 2.0 KiB @ 1.0 KiB/s");
    }
}
