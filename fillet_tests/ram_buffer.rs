use crate::common::{read_bytes, FakeMetrics, FakeProbe, TmpDir};

use fillet::hash::HashAlgorithm;
use fillet::ram_buffer::RamBufferWriter;
use fillet::sink::{FileSink, OpenMode, Sink};
use fillet::source::RepeatSource;
use fillet::{
    Bound, BufferMode, ChunkSource, ErrorKind, Pump, PumpOptions, Result, Strategy, WriteOptions,
    WriteTarget,
};

use std::cell::Cell;
use std::path::Path;

fn open_file(path: &str) -> Result<Box<dyn Sink>> {
    Ok(Box::new(FileSink::open(path, OpenMode::Truncate, false)?))
}

#[test]
fn size_bound_is_exact() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    for &size in &[1u64, 9, 10, 11, 4096] {
        let path = tmp.file(format!("{}.txt", size));
        let mut source = RepeatSource::new(b"0123456789".to_vec());
        let outcome = RamBufferWriter::new(&opts, 1 << 20, &metrics)
            .write(&mut source, Bound::Size(size), || open_file(&path))
            .unwrap();
        assert_eq!(outcome.written, size);
        assert_eq!(outcome.chunks, (size + 9) / 10);
        assert_eq!(read_bytes(&path).len() as u64, size);
    }
}

#[test]
fn count_bound_with_cap() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let path = tmp.file("capped.txt");
    let mut source = RepeatSource::new(b"abcd".to_vec());
    let bound = Bound::Count {
        count: 100,
        size_cap: Some(10),
    };
    let outcome = RamBufferWriter::new(&opts, 1 << 20, &metrics)
        .write(&mut source, bound, || open_file(&path))
        .unwrap();
    assert_eq!(outcome.written, 10);
    assert_eq!(outcome.chunks, 3);
    assert_eq!(read_bytes(&path), b"abcdabcdab".to_vec());
}

#[test]
fn overflow_never_opens_target() {
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let opened = Cell::new(false);
    let mut source = RepeatSource::new(vec![1u8; 16]);
    let err = RamBufferWriter::new(&opts, 50, &metrics)
        .write(&mut source, Bound::Size(100), || {
            opened.set(true);
            Err(fillet::Error::from("must not open"))
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), 6);
    match err.kind() {
        ErrorKind::RamBufferOverflow {
            buffered,
            chunk,
            limit,
        } => {
            assert_eq!(*buffered, 48);
            assert_eq!(*chunk, 16);
            assert_eq!(*limit, 50);
        }
        _ => unreachable!(),
    }
    assert!(!opened.get());
}

#[test]
fn buffer_may_fill_exactly() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let opts = WriteOptions::default();
    let path = tmp.file("full.bin");
    let mut source = RepeatSource::new(vec![2u8; 25]);
    let outcome = RamBufferWriter::new(&opts, 50, &metrics)
        .write(&mut source, Bound::Size(50), || open_file(&path))
        .unwrap();
    assert_eq!(outcome.written, 50);
}

#[test]
fn zero_chunks_are_written_verbatim() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let opts = WriteOptions {
        sparse: true,
        hash: Some(HashAlgorithm::Sha512),
        ..WriteOptions::default()
    };
    let path = tmp.file("zeros.bin");
    let mut source = RepeatSource::new(vec![0u8; 1000]);
    let outcome = RamBufferWriter::new(&opts, 1 << 20, &metrics)
        .write(&mut source, Bound::Size(3000), || open_file(&path))
        .unwrap();
    assert_eq!(read_bytes(&path), vec![0u8; 3000]);
    assert_eq!(outcome.digest.map(|d| d.len()), Some(128));
}

fn pump_options(bound: Bound) -> PumpOptions {
    PumpOptions {
        bound,
        buffer_mode: BufferMode::Ram,
        ram_max: 64,
        disk_margin: 0,
        ..PumpOptions::default()
    }
}

#[test]
fn pump_overflow_leaves_no_file() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let probe = FakeProbe::new(u64::max_value());
    let path = tmp.file("never.bin");
    let opts = pump_options(Bound::Size(1000));
    assert_eq!(opts.strategy(), Strategy::RamBuffer);

    let targets = vec![WriteTarget::Path(path.clone().into())];
    let err = Pump::new(&opts, &metrics, &probe)
        .run(&targets, || {
            let source: Box<dyn ChunkSource> = Box::new(RepeatSource::new(vec![9u8; 10]));
            Ok(source)
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), 6);
    assert!(!Path::new(&path).exists());
}

#[test]
fn pump_streams_when_expected_size_exceeds_cap() {
    let mut opts = pump_options(Bound::Size(1000));
    opts.expected_bytes = Some(1000);
    assert_eq!(opts.strategy(), Strategy::Stream);
    opts.workers = 3;
    assert_eq!(opts.strategy(), Strategy::Concurrent(3));

    opts.expected_bytes = Some(64);
    assert_eq!(opts.strategy(), Strategy::RamBuffer);
}
