//! Several worker threads sharing one file handle.
//!
//! One lock guards the sink and the counters. A worker reserves its next chunk under the lock
//! (decrementing the remaining count or checking the written total), produces it outside the
//! lock, then clips and commits it under the lock again. Write order between workers is
//! unspecified.

use crate::commit::Commit;
use crate::lock;
use crate::metrics::SystemMetrics;
use crate::progress::{ProgressLine, ProgressState};
use crate::pump::{Bound, WriteOptions, WriteOutcome};
use crate::sink::Sink;
use crate::source::{feeds, fork_all, ChunkSource, Feed};
use crate::stream::clip;
use crate::throttle::Throttle;
use crate::{Error, Result};

use log::debug;

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

pub struct ConcurrentWriter<'a> {
    opts: &'a WriteOptions,
    workers: usize,
    metrics: &'a dyn SystemMetrics,
}

struct Shared<'a> {
    commit: Commit<'a>,
    state: ProgressState,
    error: Option<Error>,
}

impl<'a> Shared<'a> {
    fn fail(&mut self, e: Error) {
        self.state.failed = true;
        if self.error.is_none() {
            self.error = Some(e);
        }
    }
}

enum Reservation {
    Go,
    Stop,
}

impl<'a> ConcurrentWriter<'a> {
    pub fn new(opts: &'a WriteOptions, workers: usize, metrics: &'a dyn SystemMetrics) -> Self {
        Self {
            opts,
            workers: workers.max(1),
            metrics,
        }
    }

    pub fn write(
        &self,
        source: &mut dyn ChunkSource,
        sink: &mut dyn Sink,
        bound: Bound,
    ) -> Result<WriteOutcome> {
        let throttle = Throttle::new(self.opts.limits, self.metrics);
        let forks = fork_all(source, self.workers);
        if forks.is_none() {
            debug!("Chunk source cannot fork, workers share it");
        }
        let source = Mutex::new(source);
        let shared = Mutex::new(Shared {
            commit: Commit::new(sink, self.opts, self.metrics),
            state: ProgressState {
                remaining: bound.count(),
                ..ProgressState::default()
            },
            error: None,
        });

        let panicked = thread::scope(|s| {
            let monitor = self.opts.progress.map(|interval| {
                let shared = &shared;
                let metrics = self.metrics;
                s.spawn(move || watch(shared, bound, interval, metrics))
            });

            let handles: Vec<_> = feeds(forks, &source, self.workers)
                .into_iter()
                .map(|feed| {
                    let (shared, throttle) = (&shared, &throttle);
                    s.spawn(move || self.work(feed, shared, throttle, bound))
                })
                .collect();
            let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            let panicked = joined.iter().any(|r| r.is_err());

            lock(&shared).state.done = true;
            if let Some(m) = monitor {
                let _ = m.join();
            }
            panicked
        });

        let mut shared = shared.into_inner().unwrap_or_else(|e| e.into_inner());
        if let Some(e) = shared.error.take() {
            return Err(e);
        }
        if panicked {
            return Err(Error::from("Writer thread panicked"));
        }
        shared.commit.finish()?;
        Ok(WriteOutcome {
            written: shared.commit.written,
            chunks: shared.commit.chunks,
            elapsed: throttle.elapsed(),
            digest: shared.commit.digest(),
        })
    }

    fn work(&self, mut feed: Feed, shared: &Mutex<Shared>, throttle: &Throttle, bound: Bound) {
        loop {
            if let Reservation::Stop = reserve(&mut lock(shared), bound) {
                return;
            }

            let mut chunk = match feed.next_chunk() {
                Ok(c) => c,
                Err(e) => return lock(shared).fail(e),
            };
            if chunk.is_empty() && bound.count().is_none() {
                return lock(shared).fail(Error::from("Chunk source produced an empty chunk"));
            }
            if let Some(d) = throttle.worker_delay(chunk.len(), self.workers) {
                throttle.hold(d);
            }

            let written = {
                let mut guard = lock(shared);
                if guard.state.failed {
                    return;
                }
                if let Some(room) = bound.room(guard.commit.written) {
                    if room == 0 {
                        return;
                    }
                    clip(&mut chunk, room);
                }
                if let Err(e) = guard.commit.write(&chunk) {
                    return guard.fail(e);
                }
                guard.state.written = guard.commit.written;
                guard.state.chunks = guard.commit.chunks;
                guard.commit.written
            };

            if let Err(e) = throttle.after_write(written) {
                return lock(shared).fail(e);
            }
        }
    }
}

fn reserve(shared: &mut Shared, bound: Bound) -> Reservation {
    if shared.state.failed {
        return Reservation::Stop;
    }
    match bound {
        Bound::Size(total) => {
            if shared.commit.written >= total {
                return Reservation::Stop;
            }
        }
        Bound::Count { .. } => {
            if bound.room(shared.commit.written) == Some(0) {
                return Reservation::Stop;
            }
            match shared.state.remaining {
                Some(0) | None => return Reservation::Stop,
                Some(ref mut n) => *n -= 1,
            }
        }
    }
    Reservation::Go
}

fn watch(shared: &Mutex<Shared>, bound: Bound, interval: Duration, metrics: &dyn SystemMetrics) {
    let mut line = ProgressLine::new(bound.byte_limit(), interval, metrics);
    loop {
        thread::sleep(interval);
        let state = lock(shared).state.clone();
        if state.done {
            line.finish(state.written);
            return;
        }
        line.print(state.written);
    }
}
