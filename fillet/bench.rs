//! Self-benchmark over chunk sizes, worker counts and concurrency modes.

use crate::concurrent::ConcurrentWriter;
use crate::metrics::{cpu_percent, SystemMetrics};
use crate::pipeline::{default_capacity, PipelineWriter};
use crate::pump::{Bound, WriteOptions};
use crate::sink::{FileSink, OpenMode};
use crate::source::ChunkSource;
use crate::stream::StreamWriter;
use crate::Result;

use log::{debug, info};

use tempfile::TempDir;

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Concurrency {
    /// Several writer threads share the file.
    Write,
    /// Several generator threads feed one writer.
    Generate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BenchResult {
    pub chunk_size: usize,
    pub workers: usize,
    pub concurrency: Concurrency,
    /// Bytes per second.
    pub throughput: f64,
    pub cpu_percent: f64,
    pub rss_delta: u64,
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    /// Bytes written by every trial.
    pub size: u64,
    pub chunk_sizes: Vec<usize>,
    pub workers: Vec<usize>,
    pub modes: Vec<Concurrency>,
    /// Directory for scratch files; the system temp dir if `None`.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct BenchReport {
    pub results: Vec<BenchResult>,
    pub best: Option<BenchResult>,
}

pub struct BenchRunner<'a> {
    config: BenchConfig,
    metrics: &'a dyn SystemMetrics,
}

/// Removes a trial's scratch file however the trial ends.
struct Scratch(PathBuf);

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            size: 64 * 1024 * 1024,
            chunk_sizes: vec![32 * 1024, 64 * 1024, 256 * 1024, 1024 * 1024],
            workers: vec![1, 2, 4, 8],
            modes: vec![Concurrency::Write, Concurrency::Generate],
            scratch_dir: None,
        }
    }
}

impl<'a> BenchRunner<'a> {
    pub fn new(config: BenchConfig, metrics: &'a dyn SystemMetrics) -> Self {
        Self { config, metrics }
    }

    /// Worker counts that fit the available cores. A single worker is always tried.
    pub fn worker_counts(&self) -> Vec<usize> {
        let cpus = self.metrics.cpu_count().max(1);
        let mut counts: Vec<usize> = self
            .config
            .workers
            .iter()
            .cloned()
            .filter(|&w| w >= 1 && w <= cpus)
            .collect();
        if counts.is_empty() {
            counts.push(1);
        }
        counts
    }

    /// Runs every trial of the grid. `make_source` builds a source producing chunks of the
    /// given size.
    pub fn run<F>(&self, mut make_source: F) -> Result<BenchReport>
    where
        F: FnMut(usize) -> Result<Box<dyn ChunkSource>>,
    {
        let scratch = match self.config.scratch_dir {
            Some(ref dir) => tempfile::Builder::new().prefix("fillet-bench").tempdir_in(dir)?,
            None => TempDir::new()?,
        };

        let workers = self.worker_counts();
        let mut results = Vec::new();
        for &chunk_size in &self.config.chunk_sizes {
            for &w in &workers {
                for &mode in &self.config.modes {
                    let path = scratch.path().join(format!("trial-{}.bin", results.len()));
                    let mut source = make_source(chunk_size)?;
                    let result = self.trial(&path, source.as_mut(), chunk_size, w, mode)?;
                    debug!("Benchmark trial: {:?}", result);
                    results.push(result);
                }
            }
        }

        let best = select_best(&results).cloned();
        if let Some(ref b) = best {
            info!("Benchmark recommendation: {}", b.flags());
        }
        Ok(BenchReport { results, best })
    }

    fn trial(
        &self,
        path: &Path,
        source: &mut dyn ChunkSource,
        chunk_size: usize,
        workers: usize,
        mode: Concurrency,
    ) -> Result<BenchResult> {
        let _scratch = Scratch(path.to_path_buf());
        let opts = WriteOptions::default();
        let bound = Bound::Size(self.config.size);
        let mut sink = FileSink::open(path, OpenMode::Truncate, false)?;

        let rss_before = self.metrics.resident_memory().unwrap_or(0);
        let cpu_before = self.metrics.cpu_time().unwrap_or_default();
        let wall_before = self.metrics.wall_time();

        let outcome = match (mode, workers) {
            (Concurrency::Write, 1) => {
                StreamWriter::new(&opts, self.metrics).write(source, &mut sink, bound)?
            }
            (Concurrency::Write, w) => {
                ConcurrentWriter::new(&opts, w, self.metrics).write(source, &mut sink, bound)?
            }
            (Concurrency::Generate, w) => {
                PipelineWriter::new(&opts, w, default_capacity(chunk_size), self.metrics)
                    .write(source, &mut sink, bound)?
            }
        };

        let wall = self
            .metrics
            .wall_time()
            .checked_sub(wall_before)
            .unwrap_or_default();
        let cpu = self
            .metrics
            .cpu_time()
            .unwrap_or_default()
            .checked_sub(cpu_before)
            .unwrap_or_default();
        let rss_after = self.metrics.resident_memory().unwrap_or(0);

        let secs = wall.as_secs_f64();
        Ok(BenchResult {
            chunk_size,
            workers,
            concurrency: mode,
            throughput: if secs > 0.0 {
                outcome.written as f64 / secs
            } else {
                f64::INFINITY
            },
            cpu_percent: cpu_percent(cpu, wall, self.metrics.cpu_count()).max(0.0).min(100.0),
            rss_delta: rss_after.saturating_sub(rss_before),
        })
    }
}

/// Highest throughput wins; ties go to lower CPU, then lower RSS growth, then grid order.
pub fn select_best(results: &[BenchResult]) -> Option<&BenchResult> {
    let mut best: Option<&BenchResult> = None;
    for r in results {
        best = match best {
            Some(b) if rank(r, b) != Ordering::Greater => Some(b),
            _ => Some(r),
        };
    }
    best
}

fn rank(a: &BenchResult, b: &BenchResult) -> Ordering {
    a.throughput
        .partial_cmp(&b.throughput)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.rss_delta.cmp(&a.rss_delta))
}

impl BenchResult {
    /// The winning configuration as command line flags.
    pub fn flags(&self) -> String {
        match self.concurrency {
            Concurrency::Write => format!(
                "--chunk {} --concurrency write --workers {}",
                self.chunk_size, self.workers
            ),
            Concurrency::Generate => format!(
                "--chunk {} --concurrency generate --gen-workers {}",
                self.chunk_size, self.workers
            ),
        }
    }
}

impl FromStr for Concurrency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "write" => Ok(Concurrency::Write),
            "generate" => Ok(Concurrency::Generate),
            _ => Err(format!(
                "Unknown concurrency mode '{}' expected one of: write, generate",
                s
            )),
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Concurrency::Write => "write",
            Concurrency::Generate => "generate",
        })
    }
}
