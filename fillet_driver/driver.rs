use crate::cmd::{Command, PumpMode};
use crate::generators::{PatternSource, SourceFactory};
use crate::targets;

use fillet::admission::SpaceProbe;
use fillet::bench::{BenchConfig, BenchReport, BenchRunner};
use fillet::metrics::SystemMetrics;
use fillet::retry::RetryPolicy;
use fillet::sink::OpenMode;
use fillet::throttle::Limits;
use fillet::{
    Bound, ChunkSource, Error, Pump, PumpOptions, Result, TargetReport, WriteOptions, WriteTarget,
};

use log::{debug, info};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A resolved pumping job: options, targets and the source factory.
pub struct Driver {
    opts: PumpOptions,
    targets: Vec<WriteTarget>,
    factory: SourceFactory,
}

fn master_rng(cmd: &Command) -> StdRng {
    match cmd.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Repetition count from `--times` or `--times-range`, checked against `--max-times`.
pub fn resolve_times(cmd: &Command, rng: &mut StdRng) -> Result<Option<u64>> {
    let times = match cmd.times_range {
        Some((min, max)) => Some(rng.gen_range(min..=max)),
        None => cmd.times,
    };
    match times {
        Some(n) if n > cmd.max_times => Err(Error::config(format!(
            "Refusing to write {} times (over --max-times {})",
            n, cmd.max_times
        ))),
        _ => Ok(times),
    }
}

pub fn bound(times: Option<u64>, size_limit: Option<u64>) -> Result<Bound> {
    match (times, size_limit) {
        (Some(count), size_cap) => Ok(Bound::Count { count, size_cap }),
        (None, Some(size)) => Ok(Bound::Size(size)),
        (None, None) => Err(Error::config(
            "Nothing to write: specify --times, --times-range or --size",
        )),
    }
}

pub fn open_mode(cmd: &Command) -> OpenMode {
    match cmd.offset {
        Some(offset) => OpenMode::At(offset),
        None if cmd.resume => OpenMode::Append,
        None if cmd.truncates() => OpenMode::Truncate,
        None => OpenMode::Append,
    }
}

pub fn write_options(cmd: &Command) -> WriteOptions {
    WriteOptions {
        limits: Limits {
            rate: cmd.rate,
            cpu_percent: cmd.cpu_limit,
            ram: cmd.ram_limit,
        },
        retry: RetryPolicy {
            io_retries: cmd.io_retries,
            error_budget: cmd.error_budget,
            ..RetryPolicy::default()
        },
        fsync_interval: if cmd.fsync_enable {
            Some(cmd.fsync_interval.max(1))
        } else {
            None
        },
        sparse: cmd.sparse,
        hash: cmd.hash,
        progress: if cmd.progress {
            Some(cmd.progress_interval)
        } else {
            None
        },
    }
}

impl Driver {
    pub fn from_cmd(cmd: &Command) -> Result<Self> {
        if cmd.path.is_none() && cmd.filelist.is_none() {
            return Err(Error::config("Missing target path"));
        }
        let mut rng = master_rng(cmd);
        let times = resolve_times(cmd, &mut rng)?;
        let size_limit = cmd.max_bytes.or(cmd.size);
        let bound = bound(times, size_limit)?;

        let factory = SourceFactory::from_cmd(cmd, rng)?;
        let expected_bytes = match (size_limit, times) {
            (Some(size), _) => Some(size),
            (None, Some(n)) => factory.chunk_len()?.and_then(|len| len.checked_mul(n)),
            (None, None) => None,
        };
        let targets = targets::resolve(
            cmd.path.as_ref().map(String::as_str),
            cmd.filelist.as_ref().map(String::as_str),
            cmd.recursive,
        )?;
        debug!(
            "Resolved {} targets, pump mode {}, expected {:?} bytes each",
            targets.len(),
            cmd.pump_mode(),
            expected_bytes
        );

        let opts = PumpOptions {
            bound,
            expected_bytes,
            write: write_options(cmd),
            buffer_mode: cmd.buffer_mode,
            ram_max: cmd.ram_max,
            concurrency: cmd.concurrency,
            workers: cmd.workers.max(1),
            gen_workers: cmd.gen_workers.max(1),
            chunk_size: cmd.chunk.max(1) as usize,
            queue_capacity: cmd.queue_size.map(|q| q.max(1)),
            open_mode: open_mode(cmd),
            compress: cmd.compress,
            truncate: cmd.truncate,
            preallocate: cmd.fallocate,
            verify: cmd.verify,
            disk_guard: !cmd.disable_disk_guard,
            disk_margin: cmd.disk_guard_margin,
        };

        Ok(Self {
            opts,
            targets,
            factory,
        })
    }

    pub fn options(&self) -> &PumpOptions {
        &self.opts
    }

    pub fn targets(&self) -> &[WriteTarget] {
        &self.targets
    }

    pub fn run(
        &mut self,
        metrics: &dyn SystemMetrics,
        probe: &dyn SpaceProbe,
    ) -> Result<Vec<TargetReport>> {
        let factory = &mut self.factory;
        Pump::new(&self.opts, metrics, probe).run(&self.targets, || factory.source())
    }
}

pub fn benchmark(cmd: &Command, metrics: &dyn SystemMetrics) -> Result<BenchReport> {
    info!("Running local benchmark; this writes temporary files and deletes them");
    let config = BenchConfig {
        size: cmd.bench_size,
        ..BenchConfig::default()
    };
    let mut rng = master_rng(cmd);
    BenchRunner::new(config, metrics).run(|chunk| {
        let seed = rng.gen();
        let source: Box<dyn ChunkSource> = Box::new(PatternSource::new(
            PumpMode::RandBin,
            chunk,
            StdRng::seed_from_u64(seed),
        ));
        Ok(source)
    })
}
