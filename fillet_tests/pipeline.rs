use crate::common::{FakeMetrics, FlakySink};

use fillet::pipeline::{default_capacity, PipelineWriter};
use fillet::retry::RetryPolicy;
use fillet::sink::MemorySink;
use fillet::source::{FnSource, RepeatSource};
use fillet::{Bound, WriteOptions};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn size_bound_is_exact() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();
    for &capacity in &[1usize, 4] {
        for &producers in &[1usize, 3] {
            for &size in &[0u64, 1, 332, 333, 10_000] {
                let mut source = RepeatSource::new(vec![b'p'; 333]);
                let mut sink = MemorySink::default();
                let outcome = PipelineWriter::new(&opts, producers, capacity, &metrics)
                    .write(&mut source, &mut sink, Bound::Size(size))
                    .unwrap();
                assert_eq!(outcome.written, size);
                assert_eq!(sink.data.len() as u64, size);
            }
        }
    }
}

#[test]
fn count_bound_pulls_exactly_n_chunks() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut source = FnSource(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(b"token ".to_vec())
    });
    let mut sink = MemorySink::default();
    let bound = Bound::Count {
        count: 250,
        size_cap: None,
    };
    let outcome = PipelineWriter::new(&opts, 3, 2, &metrics)
        .write(&mut source, &mut sink, bound)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 250);
    assert_eq!(outcome.chunks, 250);
    assert_eq!(sink.data, b"token ".repeat(250));
}

#[test]
fn single_producer_keeps_source_order() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let mut next = 0u8;
    let mut source = FnSource(move || {
        let chunk = vec![next, next.wrapping_add(1)];
        next = next.wrapping_add(2);
        Ok(chunk)
    });
    let mut sink = MemorySink::default();
    PipelineWriter::new(&opts, 1, 1, &metrics)
        .write(&mut source, &mut sink, Bound::Size(200))
        .unwrap();
    let expected: Vec<u8> = (0..200).map(|i| i as u8).collect();
    assert_eq!(sink.data, expected);
}

#[test]
fn producer_error_stops_the_writer() {
    let metrics = FakeMetrics::with_cpus(2);
    let opts = WriteOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut source = FnSource(move || {
        if counter.fetch_add(1, Ordering::SeqCst) >= 10 {
            Err(fillet::Error::from("generator failed"))
        } else {
            Ok(vec![3u8; 16])
        }
    });
    let mut sink = MemorySink::default();
    let err = PipelineWriter::new(&opts, 2, 1, &metrics)
        .write(&mut source, &mut sink, Bound::Size(1 << 20))
        .unwrap_err();
    assert_eq!(err.to_string(), "generator failed");
    assert!(sink.data.len() <= 160);
}

#[test]
fn write_error_unblocks_producers() {
    let metrics = FakeMetrics::with_cpus(2);
    let opts = WriteOptions {
        retry: RetryPolicy {
            io_retries: 0,
            ..RetryPolicy::default()
        },
        ..WriteOptions::default()
    };
    let mut source = RepeatSource::new(vec![4u8; 64]);
    let mut sink = FlakySink::new(u32::max_value());
    assert!(PipelineWriter::new(&opts, 2, 1, &metrics)
        .write(&mut source, &mut sink, Bound::Size(1 << 20))
        .is_err());
    assert_eq!(sink.attempts, 1);
}

#[test]
fn queue_depth_defaults() {
    assert_eq!(default_capacity(64 * 1024), 16);
    assert_eq!(default_capacity(1024 * 1024), 8);
    assert_eq!(default_capacity(1024), 1024);
    assert_eq!(default_capacity(0), 1024 * 1024);
}
