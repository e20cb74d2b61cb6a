use std::time::Duration;

pub fn b2mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

pub fn dur2sec(d: &Duration) -> f64 {
    d.as_secs_f64()
}

/// Bytes per second, or zero when no time has passed.
pub fn throughput(bytes: u64, d: &Duration) -> f64 {
    let secs = dur2sec(d);
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}
