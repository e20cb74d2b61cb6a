//! Strategy selection and per-target orchestration.

use crate::admission::{AdmissionController, SpaceProbe};
use crate::bench::Concurrency;
use crate::concurrent::ConcurrentWriter;
use crate::hash::HashAlgorithm;
use crate::metrics::SystemMetrics;
use crate::pipeline::{default_capacity, PipelineWriter};
use crate::progress::fmt_bytes;
use crate::ram_buffer::RamBufferWriter;
use crate::retry::RetryPolicy;
use crate::sink::{self, Compression, FileSink, GzipSink, OpenMode, Sink, StdoutSink};
use crate::source::ChunkSource;
use crate::stream::{verify_written, StreamWriter};
use crate::throttle::Limits;
use crate::{Error, Result};

use log::{info, warn};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WriteTarget {
    Path(PathBuf),
    Stdout,
}

/// When a run stops.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    /// Exactly `count` chunk writes, ending early once `size_cap` bytes are written.
    Count { count: u64, size_cap: Option<u64> },
    /// Exactly this many bytes; the last chunk is clipped to fit.
    Size(u64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteOptions {
    pub limits: Limits,
    pub retry: RetryPolicy,
    /// Bytes between fsyncs; `None` disables fsync.
    pub fsync_interval: Option<u64>,
    pub sparse: bool,
    pub hash: Option<HashAlgorithm>,
    /// Progress line interval; `None` disables progress output.
    pub progress: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteOutcome {
    pub written: u64,
    pub chunks: u64,
    pub elapsed: Duration,
    pub digest: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferMode {
    Stream,
    Ram,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    Stream,
    RamBuffer,
    Concurrent(usize),
    Pipeline(usize),
}

#[derive(Clone, Debug)]
pub struct PumpOptions {
    pub bound: Bound,
    /// Bytes each target is expected to receive, if that can be known up front.
    pub expected_bytes: Option<u64>,
    pub write: WriteOptions,
    pub buffer_mode: BufferMode,
    pub ram_max: u64,
    pub concurrency: Concurrency,
    pub workers: usize,
    pub gen_workers: usize,
    pub chunk_size: usize,
    pub queue_capacity: Option<usize>,
    pub open_mode: OpenMode,
    pub compress: Compression,
    pub truncate: Option<u64>,
    pub preallocate: Option<u64>,
    pub verify: bool,
    pub disk_guard: bool,
    pub disk_margin: u64,
}

#[derive(Clone, Debug)]
pub struct TargetReport {
    pub target: WriteTarget,
    pub strategy: Strategy,
    pub outcome: WriteOutcome,
}

pub struct Pump<'a> {
    opts: &'a PumpOptions,
    metrics: &'a dyn SystemMetrics,
    probe: &'a dyn SpaceProbe,
}

impl Bound {
    pub fn count(&self) -> Option<u64> {
        match *self {
            Bound::Count { count, .. } => Some(count),
            Bound::Size(_) => None,
        }
    }

    pub fn byte_limit(&self) -> Option<u64> {
        match *self {
            Bound::Count { size_cap, .. } => size_cap,
            Bound::Size(size) => Some(size),
        }
    }

    /// Bytes still allowed once `written` bytes are out, or `None` if unlimited.
    pub fn room(&self, written: u64) -> Option<u64> {
        self.byte_limit().map(|l| l.saturating_sub(written))
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            retry: RetryPolicy::default(),
            fsync_interval: None,
            sparse: false,
            hash: None,
            progress: None,
        }
    }
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            bound: Bound::Count {
                count: 1,
                size_cap: None,
            },
            expected_bytes: None,
            write: WriteOptions::default(),
            buffer_mode: BufferMode::Ram,
            ram_max: 256 * 1024 * 1024,
            concurrency: Concurrency::Write,
            workers: 1,
            gen_workers: 1,
            chunk_size: 64 * 1024,
            queue_capacity: None,
            open_mode: OpenMode::Append,
            compress: Compression::None,
            truncate: None,
            preallocate: None,
            verify: false,
            disk_guard: true,
            disk_margin: 100 * 1024 * 1024,
        }
    }
}

impl PumpOptions {
    /// Picks the writer for this configuration. RAM buffering falls back to streaming when the
    /// expected size exceeds the buffer cap, and always runs on a single thread. Compressed
    /// output needs a single writer, so concurrent writes become a stream.
    pub fn strategy(&self) -> Strategy {
        if self.buffer_mode == BufferMode::Ram {
            match self.expected_bytes {
                Some(expected) if expected > self.ram_max => {}
                _ => return Strategy::RamBuffer,
            }
        }
        match self.concurrency {
            Concurrency::Write if self.workers > 1 && self.compress == Compression::None => {
                Strategy::Concurrent(self.workers)
            }
            Concurrency::Write => Strategy::Stream,
            Concurrency::Generate => Strategy::Pipeline(self.gen_workers.max(1)),
        }
    }
}

impl<'a> Pump<'a> {
    pub fn new(
        opts: &'a PumpOptions,
        metrics: &'a dyn SystemMetrics,
        probe: &'a dyn SpaceProbe,
    ) -> Self {
        Self {
            opts,
            metrics,
            probe,
        }
    }

    /// Writes every target in turn, each from a fresh source.
    pub fn run<F>(&self, targets: &[WriteTarget], mut make_source: F) -> Result<Vec<TargetReport>>
    where
        F: FnMut() -> Result<Box<dyn ChunkSource>>,
    {
        if targets.is_empty() {
            return Err(Error::config("No targets resolved to pump"));
        }

        let strategy = self.opts.strategy();
        self.log_strategy(strategy);

        let admission =
            AdmissionController::new(self.probe, self.opts.disk_margin, self.opts.disk_guard);
        let demands: Vec<_> = targets
            .iter()
            .map(|t| (t.clone(), self.opts.expected_bytes))
            .collect();
        admission.check_all(&demands)?;

        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            if let WriteTarget::Path(path) = target {
                prepare_parent(path)?;
            }
            admission.check_target(target, self.opts.expected_bytes)?;
            info!(
                "target={} start: strategy={} bound={:?}",
                target, strategy, self.opts.bound
            );
            let mut source = make_source()?;
            let outcome = self.run_target(target, strategy, source.as_mut())?;
            info!(
                "target={} done: {} in {} chunks",
                target,
                fmt_bytes(outcome.written),
                outcome.chunks
            );
            reports.push(TargetReport {
                target: target.clone(),
                strategy,
                outcome,
            });
        }
        Ok(reports)
    }

    fn log_strategy(&self, strategy: Strategy) {
        let opts = self.opts;
        if opts.buffer_mode == BufferMode::Ram && strategy != Strategy::RamBuffer {
            if let Some(expected) = opts.expected_bytes {
                info!(
                    "Falling back to streaming: expected {} exceeds --ram-max {}",
                    fmt_bytes(expected),
                    fmt_bytes(opts.ram_max)
                );
            }
        }
        if strategy == Strategy::RamBuffer && opts.workers > 1 {
            info!("--buffer-mode ram forces single-thread; ignoring --workers > 1");
        } else if strategy == Strategy::Stream
            && opts.workers > 1
            && opts.compress != Compression::None
        {
            info!("Forcing single writer due to {} compression", opts.compress);
        }
        if opts.compress != Compression::None && opts.write.sparse {
            info!("Sparse holes are written as compressed zeros");
        }
    }

    fn run_target(
        &self,
        target: &WriteTarget,
        strategy: Strategy,
        source: &mut dyn ChunkSource,
    ) -> Result<WriteOutcome> {
        let opts = self.opts;
        let write = &opts.write;
        if let WriteTarget::Path(path) = target {
            if let Some(len) = opts.truncate {
                sink::truncate(path, len)?;
            }
            if let Some(len) = opts.preallocate {
                sink::preallocate(path, len)?;
            }
        }

        let outcome = match strategy {
            Strategy::RamBuffer => RamBufferWriter::new(write, opts.ram_max, self.metrics)
                .write(source, opts.bound, || self.open(target))?,
            Strategy::Stream => StreamWriter::new(write, self.metrics).write(
                source,
                self.open(target)?.as_mut(),
                opts.bound,
            )?,
            Strategy::Concurrent(workers) => ConcurrentWriter::new(write, workers, self.metrics)
                .write(source, self.open(target)?.as_mut(), opts.bound)?,
            Strategy::Pipeline(producers) => {
                let capacity = opts
                    .queue_capacity
                    .unwrap_or_else(|| default_capacity(opts.chunk_size));
                PipelineWriter::new(write, producers, capacity, self.metrics).write(
                    source,
                    self.open(target)?.as_mut(),
                    opts.bound,
                )?
            }
        };

        if opts.verify {
            self.verify(target, &outcome)?;
        }
        Ok(outcome)
    }

    fn open(&self, target: &WriteTarget) -> Result<Box<dyn Sink>> {
        let gzip = self.opts.compress == Compression::Gzip;
        Ok(match target {
            WriteTarget::Path(path) => {
                let sparse = self.opts.write.sparse && !gzip;
                let file = FileSink::open(path, self.opts.open_mode, sparse)?;
                if gzip {
                    Box::new(GzipSink::new(file))
                } else {
                    Box::new(file)
                }
            }
            WriteTarget::Stdout if gzip => Box::new(GzipSink::new(StdoutSink::new())),
            WriteTarget::Stdout => Box::new(StdoutSink::new()),
        })
    }

    /// Re-reads the region this run wrote and compares it with the running digest.
    fn verify(&self, target: &WriteTarget, outcome: &WriteOutcome) -> Result<()> {
        let path = match target {
            WriteTarget::Path(p) => p,
            WriteTarget::Stdout => {
                warn!("Cannot verify data written to stdout");
                return Ok(());
            }
        };
        if self.opts.compress != Compression::None {
            warn!("Cannot verify {} compressed output; skipped", self.opts.compress);
            return Ok(());
        }
        let (algo, digest) = match (self.opts.write.hash, outcome.digest.as_ref()) {
            (Some(algo), Some(digest)) => (algo, digest),
            _ => {
                warn!("--verify requires --hash; skipped");
                return Ok(());
            }
        };
        let start = match self.opts.open_mode {
            OpenMode::Truncate => 0,
            OpenMode::At(offset) => offset,
            OpenMode::Append => fs::metadata(path)?.len().saturating_sub(outcome.written),
        };
        verify_written(path, start, outcome.written, algo, digest)?;
        info!("target={} verified ({} {})", target, algo, digest);
        Ok(())
    }
}

fn prepare_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteTarget::Path(p) => write!(f, "{}", p.display()),
            WriteTarget::Stdout => f.write_str("-"),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Strategy::Stream => f.write_str("stream"),
            Strategy::RamBuffer => f.write_str("ram"),
            Strategy::Concurrent(n) => write!(f, "concurrent({})", n),
            Strategy::Pipeline(n) => write!(f, "pipeline({})", n),
        }
    }
}
