use crate::common::{read_bytes, FakeMetrics, TmpDir};

use fillet::concurrent::ConcurrentWriter;
use fillet::hash::{HashAlgorithm, Hasher};
use fillet::sink::{FileSink, MemorySink, OpenMode};
use fillet::source::{FnSource, RepeatSource};
use fillet::{Bound, WriteOptions};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn count_bound_pulls_exactly_n_chunks() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();
    for &workers in &[1usize, 2, 4, 8] {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut source = FnSource(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![b'z'; 3])
        });
        let mut sink = MemorySink::default();
        let bound = Bound::Count {
            count: 100,
            size_cap: None,
        };
        let outcome = ConcurrentWriter::new(&opts, workers, &metrics)
            .write(&mut source, &mut sink, bound)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 100);
        assert_eq!(outcome.chunks, 100);
        assert_eq!(outcome.written, 300);
        assert_eq!(sink.data.len(), 300);
    }
}

#[test]
fn size_bound_is_exact_with_forked_sources() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();
    for &size in &[0u64, 1, 63, 64, 1000, 65536] {
        let mut source = RepeatSource::new(vec![b'q'; 64]);
        let mut sink = MemorySink::default();
        let outcome = ConcurrentWriter::new(&opts, 4, &metrics)
            .write(&mut source, &mut sink, Bound::Size(size))
            .unwrap();
        assert_eq!(outcome.written, size);
        assert_eq!(sink.data, vec![b'q'; size as usize]);
    }
}

#[test]
fn size_cap_stops_count_bound() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();
    let mut source = RepeatSource::new(vec![b'w'; 10]);
    let mut sink = MemorySink::default();
    let bound = Bound::Count {
        count: 1000,
        size_cap: Some(95),
    };
    let outcome = ConcurrentWriter::new(&opts, 3, &metrics)
        .write(&mut source, &mut sink, bound)
        .unwrap();
    assert_eq!(outcome.written, 95);
    assert_eq!(sink.data.len(), 95);
}

#[test]
fn source_error_is_reported() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut source = FnSource(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 5 {
            Err(fillet::Error::from("broken source"))
        } else {
            Ok(vec![1u8; 8])
        }
    });
    let mut sink = MemorySink::default();
    let err = ConcurrentWriter::new(&opts, 4, &metrics)
        .write(&mut source, &mut sink, Bound::Size(1 << 20))
        .unwrap_err();
    assert_eq!(err.to_string(), "broken source");
}

#[test]
fn empty_chunk_fails_size_bound() {
    let metrics = FakeMetrics::with_cpus(4);
    let opts = WriteOptions::default();

    let mut shared = FnSource(|| Ok(Vec::new()));
    let mut sink = MemorySink::default();
    let err = ConcurrentWriter::new(&opts, 2, &metrics)
        .write(&mut shared, &mut sink, Bound::Size(10))
        .unwrap_err();
    assert_eq!(err.to_string(), "Chunk source produced an empty chunk");

    let mut forked = RepeatSource::new(Vec::new());
    let mut sink = MemorySink::default();
    assert!(ConcurrentWriter::new(&opts, 4, &metrics)
        .write(&mut forked, &mut sink, Bound::Size(10))
        .is_err());
    assert!(sink.data.is_empty());
}

#[test]
fn digest_matches_file() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::with_cpus(4);
    let path = tmp.file("hashed.bin");
    let opts = WriteOptions {
        hash: Some(HashAlgorithm::Sha256),
        ..WriteOptions::default()
    };
    let mut source = RepeatSource::new(vec![0xA5; 512]);
    let mut sink = FileSink::open(&path, OpenMode::Truncate, false).unwrap();
    let outcome = ConcurrentWriter::new(&opts, 4, &metrics)
        .write(&mut source, &mut sink, Bound::Size(10_000))
        .unwrap();

    let data = read_bytes(&path);
    assert_eq!(data.len(), 10_000);
    let mut h = Hasher::new(HashAlgorithm::Sha256);
    h.update(&data);
    assert_eq!(outcome.digest, Some(h.finish()));
}
