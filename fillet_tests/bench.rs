use crate::common::{FakeMetrics, TmpDir};

use fillet::bench::{select_best, BenchConfig, BenchResult, BenchRunner, Concurrency};
use fillet::source::RepeatSource;
use fillet::ChunkSource;

use std::fs;

fn result(throughput: f64, cpu_percent: f64, rss_delta: u64) -> BenchResult {
    BenchResult {
        chunk_size: 64 * 1024,
        workers: 1,
        concurrency: Concurrency::Write,
        throughput,
        cpu_percent,
        rss_delta,
    }
}

#[test]
fn highest_throughput_wins() {
    let results = vec![result(10.0, 5.0, 0), result(30.0, 90.0, 100), result(20.0, 1.0, 0)];
    assert_eq!(select_best(&results), Some(&results[1]));
}

#[test]
fn ties_prefer_lower_cpu_then_lower_rss() {
    let results = vec![result(50.0, 40.0, 0), result(50.0, 20.0, 10), result(50.0, 20.0, 5)];
    assert_eq!(select_best(&results), Some(&results[2]));
}

#[test]
fn full_ties_keep_grid_order() {
    let mut results = vec![result(50.0, 20.0, 5), result(50.0, 20.0, 5)];
    results[1].workers = 2;
    assert_eq!(select_best(&results).map(|r| r.workers), Some(1));
    assert_eq!(select_best(&[]), None);
}

#[test]
fn flags_name_the_configuration() {
    let mut r = result(1.0, 1.0, 0);
    r.workers = 4;
    assert_eq!(r.flags(), "--chunk 65536 --concurrency write --workers 4");
    r.concurrency = Concurrency::Generate;
    r.chunk_size = 1024;
    assert_eq!(r.flags(), "--chunk 1024 --concurrency generate --gen-workers 4");
}

#[test]
fn worker_counts_fit_cores() {
    let metrics = FakeMetrics::with_cpus(2);
    let runner = BenchRunner::new(BenchConfig::default(), &metrics);
    assert_eq!(runner.worker_counts(), vec![1, 2]);

    let metrics = FakeMetrics::with_cpus(1);
    let config = BenchConfig {
        workers: vec![4, 8],
        ..BenchConfig::default()
    };
    let runner = BenchRunner::new(config, &metrics);
    assert_eq!(runner.worker_counts(), vec![1]);
}

#[test]
fn runs_whole_grid_and_cleans_up() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::with_cpus(2);
    let config = BenchConfig {
        size: 64 * 1024,
        chunk_sizes: vec![4096, 8192],
        workers: vec![1, 2],
        modes: vec![Concurrency::Write, Concurrency::Generate],
        scratch_dir: Some(tmp.path().to_path_buf()),
    };

    let mut requested = Vec::new();
    let report = BenchRunner::new(config, &metrics)
        .run(|chunk| {
            requested.push(chunk);
            let source: Box<dyn ChunkSource> = Box::new(RepeatSource::new(vec![0x5A; chunk]));
            Ok(source)
        })
        .unwrap();

    assert_eq!(report.results.len(), 8);
    assert_eq!(requested, vec![4096, 4096, 4096, 4096, 8192, 8192, 8192, 8192]);
    let grid: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.chunk_size, r.workers, r.concurrency))
        .collect();
    assert_eq!(grid[0], (4096, 1, Concurrency::Write));
    assert_eq!(grid[1], (4096, 1, Concurrency::Generate));
    assert_eq!(grid[2], (4096, 2, Concurrency::Write));
    assert_eq!(grid[7], (8192, 2, Concurrency::Generate));

    // The fake clock never advances, so every trial ties and the first one wins.
    assert_eq!(report.best.as_ref(), Some(&report.results[0]));

    // Only the emptied scratch directory is left behind.
    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    for dir in leftovers {
        assert_eq!(fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0), 0);
    }
}
