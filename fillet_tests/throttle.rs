use crate::common::FakeMetrics;

use fillet::concurrent::ConcurrentWriter;
use fillet::metrics::SystemMetrics;
use fillet::sink::MemorySink;
use fillet::source::RepeatSource;
use fillet::stream::StreamWriter;
use fillet::throttle::{Limits, Throttle};
use fillet::{Bound, ErrorKind, WriteOptions};

use std::time::Duration;

fn limited(limits: Limits) -> WriteOptions {
    WriteOptions {
        limits,
        ..WriteOptions::default()
    }
}

#[test]
fn rate_limit_paces_writes() {
    let metrics = FakeMetrics::new();
    let opts = limited(Limits {
        rate: Some(1000),
        ..Limits::default()
    });
    let mut source = RepeatSource::new(vec![b'r'; 100]);
    let mut sink = MemorySink::default();
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(4000))
        .unwrap();
    assert_eq!(outcome.written, 4000);
    assert_approx_eq!(outcome.elapsed.as_secs_f64(), 4.0, 0.05);
}

#[test]
fn zero_rate_is_unlimited() {
    let metrics = FakeMetrics::new();
    let opts = limited(Limits {
        rate: Some(0),
        ..Limits::default()
    });
    let mut source = RepeatSource::new(vec![b'r'; 100]);
    let mut sink = MemorySink::default();
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(4000))
        .unwrap();
    assert_eq!(outcome.elapsed, Duration::from_secs(0));
}

#[test]
fn concurrent_workers_share_the_rate() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = limited(Limits {
        rate: Some(2000),
        ..Limits::default()
    });
    let mut source = RepeatSource::new(vec![b'c'; 100]);
    let mut sink = MemorySink::default();
    let outcome = ConcurrentWriter::new(&opts, 4, &metrics)
        .write(&mut source, &mut sink, Bound::Size(4000))
        .unwrap();
    assert_eq!(outcome.written, 4000);
    assert!(outcome.elapsed.as_secs_f64() >= 1.99);
}

#[test]
fn cpu_limit_sleeps_until_usage_drops() {
    let metrics = FakeMetrics::new();
    let throttle = Throttle::new(
        Limits {
            cpu_percent: Some(50.0),
            ..Limits::default()
        },
        &metrics,
    );
    metrics.advance(Duration::from_secs(1));
    metrics.set_cpu(Some(Duration::from_secs(1)));
    assert_approx_eq!(throttle.cpu_usage().unwrap(), 100.0, 0.01);

    throttle.cool_down();
    assert!(throttle.cpu_usage().unwrap() <= 50.0);
    assert_approx_eq!(throttle.elapsed().as_secs_f64(), 2.0, 0.01);
}

#[test]
fn cpu_limit_ignored_without_cpu_time() {
    let metrics = FakeMetrics::new();
    metrics.set_cpu(None);
    let throttle = Throttle::new(
        Limits {
            cpu_percent: Some(10.0),
            ..Limits::default()
        },
        &metrics,
    );
    assert_eq!(throttle.limits().cpu_percent, None);
    throttle.cool_down();
    assert_eq!(metrics.wall_time(), Duration::from_secs(0));
}

#[test]
fn ram_limit_is_a_hard_stop() {
    let metrics = FakeMetrics::new();
    metrics.set_rss(Some(2048));
    let opts = limited(Limits {
        ram: Some(1024),
        ..Limits::default()
    });
    let mut source = RepeatSource::new(vec![b'm'; 10]);
    let mut sink = MemorySink::default();
    let err = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(100))
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);
    match err.kind() {
        ErrorKind::RamLimitExceeded { rss, limit } => {
            assert_eq!(*rss, 2048);
            assert_eq!(*limit, 1024);
        }
        _ => unreachable!(),
    }
    assert_eq!(sink.data.len(), 10);
}

#[test]
fn ram_limit_ignored_without_rss() {
    let metrics = FakeMetrics::new();
    metrics.set_rss(None);
    let throttle = Throttle::new(
        Limits {
            ram: Some(1),
            ..Limits::default()
        },
        &metrics,
    );
    assert!(throttle.check_memory().is_ok());
}

#[test]
fn worker_delay_splits_rate() {
    let metrics = FakeMetrics::new();
    let throttle = Throttle::new(
        Limits {
            rate: Some(1000),
            ..Limits::default()
        },
        &metrics,
    );
    assert_eq!(throttle.worker_delay(250, 4), Some(Duration::from_secs(1)));
    assert_eq!(throttle.worker_delay(500, 1), Some(Duration::from_millis(500)));

    let unlimited = Throttle::new(Limits::default(), &metrics);
    assert_eq!(unlimited.worker_delay(250, 4), None);
}
