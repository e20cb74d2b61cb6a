use crate::common::{read_bytes, FakeMetrics, FlakySink, TmpDir};

use fillet::hash::{HashAlgorithm, Hasher};
use fillet::retry::RetryPolicy;
use fillet::sink::{FileSink, MemorySink, OpenMode};
use fillet::source::{FnSource, RepeatSource};
use fillet::stream::{verify_written, StreamWriter};
use fillet::{Bound, ErrorKind, WriteOptions};

fn sha256(data: &[u8]) -> String {
    let mut h = Hasher::new(HashAlgorithm::Sha256);
    h.update(data);
    h.finish()
}

#[test]
fn size_bound_is_exact() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    for &size in &[0u64, 1, 6, 7, 100, 1000] {
        let mut sink = MemorySink::default();
        let mut source = RepeatSource::new(b"abcdefg".to_vec());
        let outcome = StreamWriter::new(&opts, &metrics)
            .write(&mut source, &mut sink, Bound::Size(size))
            .unwrap();
        assert_eq!(outcome.written, size);
        assert_eq!(sink.data.len() as u64, size);
        assert_eq!(outcome.chunks, (size + 6) / 7);
    }
}

#[test]
fn count_bound_writes_every_chunk() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let mut sink = MemorySink::default();
    let mut source = RepeatSource::new(b"word\n".to_vec());
    let bound = Bound::Count {
        count: 12,
        size_cap: None,
    };
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, bound)
        .unwrap();
    assert_eq!(outcome.chunks, 12);
    assert_eq!(sink.data, b"word\n".repeat(12));
}

#[test]
fn size_cap_clips_count_bound() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let mut sink = MemorySink::default();
    let mut source = RepeatSource::new(vec![b'x'; 10]);
    let bound = Bound::Count {
        count: 10,
        size_cap: Some(35),
    };
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, bound)
        .unwrap();
    assert_eq!(outcome.written, 35);
    assert_eq!(outcome.chunks, 4);
}

#[test]
fn empty_chunk_fails_size_bound() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let mut sink = MemorySink::default();
    let mut source = RepeatSource::new(Vec::new());
    assert!(StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(10))
        .is_err());
}

#[test]
fn source_error_aborts() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let mut sink = MemorySink::default();
    let mut calls = 0;
    let mut source = FnSource(move || {
        calls += 1;
        if calls > 3 {
            Err(fillet::Error::from("dictionary vanished"))
        } else {
            Ok(vec![1u8; 4])
        }
    });
    let err = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(100))
        .unwrap_err();
    assert_eq!(err.to_string(), "dictionary vanished");
    assert_eq!(sink.data.len(), 12);
}

#[test]
fn digest_covers_written_bytes() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions {
        hash: Some(HashAlgorithm::Sha256),
        ..WriteOptions::default()
    };
    let mut sink = MemorySink::default();
    let mut source = RepeatSource::new(b"0123456789".to_vec());
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(25))
        .unwrap();
    assert_eq!(outcome.digest, Some(sha256(&sink.data)));
}

#[test]
fn fsync_every_interval() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions {
        fsync_interval: Some(20),
        ..WriteOptions::default()
    };
    let mut sink = MemorySink::default();
    let mut source = RepeatSource::new(vec![7u8; 10]);
    StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(50))
        .unwrap();
    // After 20 and 40 bytes, then the trailing 10 on finish.
    assert_eq!(sink.syncs, 3);
}

#[test]
fn no_fsync_by_default() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let mut sink = MemorySink::default();
    let mut source = RepeatSource::new(vec![7u8; 10]);
    StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(50))
        .unwrap();
    assert_eq!(sink.syncs, 0);
}

#[test]
fn transient_failures_are_retried() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions {
        retry: RetryPolicy {
            io_retries: 3,
            ..RetryPolicy::default()
        },
        ..WriteOptions::default()
    };
    let mut sink = FlakySink::new(2);
    let mut source = RepeatSource::new(b"abc".to_vec());
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(9))
        .unwrap();
    assert_eq!(outcome.written, 9);
    assert_eq!(sink.inner.data, b"abcabcabc".to_vec());
    assert_eq!(sink.attempts, 5);
}

#[test]
fn retries_stop_at_smaller_allowance() {
    let metrics = FakeMetrics::new();
    for &(io_retries, error_budget) in &[(0u32, 10u32), (5, 2), (1, 10), (3, 3), (4, 0)] {
        let opts = WriteOptions {
            retry: RetryPolicy {
                io_retries,
                error_budget,
                ..RetryPolicy::default()
            },
            ..WriteOptions::default()
        };
        let mut sink = FlakySink::new(u32::max_value());
        let mut source = RepeatSource::new(b"abc".to_vec());
        let err = StreamWriter::new(&opts, &metrics)
            .write(&mut source, &mut sink, Bound::Size(9))
            .unwrap_err();
        match err.kind() {
            ErrorKind::Io(_) => {}
            _ => unreachable!(),
        }
        assert_eq!(sink.attempts, io_retries.min(error_budget) + 1);
    }
}

#[test]
fn budget_is_shared_across_chunks() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions {
        retry: RetryPolicy {
            io_retries: 5,
            error_budget: 1,
            ..RetryPolicy::default()
        },
        ..WriteOptions::default()
    };
    // One failure is absorbed, the second one exhausts the budget.
    let mut sink = FlakySink::new(1);
    let mut source = RepeatSource::new(b"abc".to_vec());
    let outcome = StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(6))
        .unwrap();
    assert_eq!(outcome.written, 6);

    let mut sink = FlakySink::new(u32::max_value());
    assert!(StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(6))
        .is_err());
    assert_eq!(sink.attempts, 2);
}

#[test]
fn sparse_file_matches_dense_file() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let pattern: Vec<Vec<u8>> = vec![vec![0; 4096], vec![1; 100], vec![0; 4096], vec![0; 50]];

    let mut outputs = Vec::new();
    for &sparse in &[false, true] {
        let path = tmp.file(format!("out-{}.bin", sparse));
        let opts = WriteOptions {
            sparse,
            ..WriteOptions::default()
        };
        let mut i = 0;
        let chunks = pattern.clone();
        let mut source = FnSource(move || {
            let chunk = chunks[i % chunks.len()].clone();
            i += 1;
            Ok(chunk)
        });
        let mut sink = FileSink::open(&path, OpenMode::Truncate, sparse).unwrap();
        let outcome = StreamWriter::new(&opts, &metrics)
            .write(
                &mut source,
                &mut sink,
                Bound::Count {
                    count: 4,
                    size_cap: None,
                },
            )
            .unwrap();
        assert_eq!(outcome.written, 4096 + 100 + 4096 + 50);
        outputs.push(read_bytes(&path));
    }
    assert_eq!(outputs[0].len(), 4096 + 100 + 4096 + 50);
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn offset_overwrites_in_place() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let path = tmp.file("data.txt");
    crate::common::write_all(&path, "..........");

    let opts = WriteOptions::default();
    let mut sink = FileSink::open(&path, OpenMode::At(3), false).unwrap();
    let mut source = RepeatSource::new(b"ab".to_vec());
    StreamWriter::new(&opts, &metrics)
        .write(&mut source, &mut sink, Bound::Size(4))
        .unwrap();
    assert_eq!(read_bytes(&path), b"...abab...".to_vec());
}

#[test]
fn verify_detects_mismatch() {
    let tmp = TmpDir::new();
    let path = tmp.file("data.bin");
    crate::common::write_all(&path, "hello world");

    let good = sha256(b"world");
    verify_written(&path, 6, 5, HashAlgorithm::Sha256, &good).unwrap();

    let err = verify_written(&path, 0, 5, HashAlgorithm::Sha256, &good).unwrap_err();
    assert_eq!(err.exit_code(), 5);

    // The region extends past the end of the file.
    assert!(verify_written(&path, 6, 50, HashAlgorithm::Sha256, &good).is_err());
}
