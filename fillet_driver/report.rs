use crate::misc::{b2mib, dur2sec, throughput};

use fillet::bench::{BenchReport, BenchResult};
use fillet::progress::fmt_bytes;
use fillet::TargetReport;

use json::{object, JsonValue};

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum ReportKind {
    Json,
    Text,
}

#[derive(Debug)]
pub enum ReportBody {
    Pump {
        targets: Vec<TargetReport>,
        elapsed: Duration,
    },
    Benchmark(BenchReport),
}

#[derive(Debug)]
pub struct Report {
    pub kind: ReportKind,
    pub body: ReportBody,
}

struct Mib(u64);
struct FltSecs(f64);
struct MibPerSec(f64);

macro_rules! line {
    ($f:expr, $name:expr, $val:expr) => {
        write!($f, "{0: <16}{1}\n", $name, $val)
    };
}

impl ReportKind {
    pub fn is_json(&self) -> bool {
        *self == ReportKind::Json
    }
}

impl Report {
    pub fn new(kind: ReportKind, body: ReportBody) -> Self {
        Self { kind, body }
    }

    /// Bytes written across all targets.
    pub fn total_written(&self) -> u64 {
        match self.body {
            ReportBody::Pump { ref targets, .. } => {
                targets.iter().map(|t| t.outcome.written).sum()
            }
            ReportBody::Benchmark(_) => 0,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self.body {
            ReportBody::Pump {
                ref targets,
                ref elapsed,
            } => object! {
                "Targets" => JsonValue::Array(targets.iter().map(target_json).collect()),
                "TotalBytesWritten" => self.total_written(),
                "WallClockTime" => dur2sec(elapsed),
            },
            ReportBody::Benchmark(ref bench) => object! {
                "Results" => JsonValue::Array(bench.results.iter().map(bench_json).collect()),
                "Recommendation" => match bench.best {
                    Some(ref best) => object! {
                        "Result" => bench_json(best),
                        "Flags" => best.flags(),
                    },
                    None => JsonValue::Null,
                },
            },
        }
    }
}

fn target_json(t: &TargetReport) -> JsonValue {
    let mut value = object! {
        "Target" => t.target.to_string(),
        "Strategy" => t.strategy.to_string(),
        "BytesWritten" => t.outcome.written,
        "Chunks" => t.outcome.chunks,
        "WallClockTime" => dur2sec(&t.outcome.elapsed),
        "Throughput" => throughput(t.outcome.written, &t.outcome.elapsed),
    };
    if let Some(ref digest) = t.outcome.digest {
        value["Digest"] = digest.clone().into();
    }
    value
}

fn bench_json(r: &BenchResult) -> JsonValue {
    object! {
        "Chunk" => r.chunk_size,
        "Workers" => r.workers,
        "Concurrency" => r.concurrency.to_string(),
        "Throughput" => r.throughput,
        "CpuPercent" => r.cpu_percent,
        "RssDelta" => r.rss_delta,
        "Flags" => r.flags(),
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.kind.is_json() {
            return write!(f, "{:#}", self.to_json());
        }
        match self.body {
            ReportBody::Pump {
                ref targets,
                ref elapsed,
            } => {
                for t in targets {
                    write_target(f, t)?;
                }
                write!(f, "----------------------------------------\n")?;
                line!(f, "Targets:", targets.len())?;
                line!(f, "TotalWritten:", Mib(self.total_written()))?;
                line!(f, "WallClockTime:", FltSecs(dur2sec(elapsed)))
            }
            ReportBody::Benchmark(ref bench) => write_bench(f, bench),
        }
    }
}

fn write_target(f: &mut Formatter, t: &TargetReport) -> fmt::Result {
    let out = &t.outcome;
    write!(f, "\n--------------- fillet report ----------\n")?;
    line!(f, "Target:", t.target)?;
    line!(f, "Strategy:", t.strategy)?;
    line!(f, "Written:", Mib(out.written))?;
    line!(f, "Chunks:", out.chunks)?;
    line!(f, "Time:", FltSecs(dur2sec(&out.elapsed)))?;
    line!(f, "Throughput:", MibPerSec(throughput(out.written, &out.elapsed)))?;
    if let Some(ref digest) = out.digest {
        line!(f, "Digest:", digest)?;
    }
    Ok(())
}

/// CSV table of all trials followed by the recommended flags.
fn write_bench(f: &mut Formatter, bench: &BenchReport) -> fmt::Result {
    write!(f, "chunk,workers,concurrency,throughput_mibs,cpu_pct,rss_mib\n")?;
    for r in &bench.results {
        write!(
            f,
            "{},{},{},{:.2},{:.1},{:.1}\n",
            r.chunk_size,
            r.workers,
            r.concurrency,
            r.throughput / (1024.0 * 1024.0),
            r.cpu_percent,
            b2mib(r.rss_delta)
        )?;
    }
    if let Some(ref best) = bench.best {
        write!(f, "\nRecommendation:\n{}\n", best.flags())?;
    }
    Ok(())
}

impl Display for Mib {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes)", fmt_bytes(self.0), self.0)
    }
}

impl Display for FltSecs {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:.6} (sec)", self.0)
    }
}

impl Display for MibPerSec {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:.2} (MiB/s)", self.0 / (1024.0 * 1024.0))
    }
}
