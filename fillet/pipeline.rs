//! Producer threads feeding a single writer through a bounded queue.

use crate::commit::Commit;
use crate::lock;
use crate::metrics::SystemMetrics;
use crate::progress::{ProgressLine, ProgressState};
use crate::pump::{Bound, WriteOptions, WriteOutcome};
use crate::sink::Sink;
use crate::source::{feeds, fork_all, Chunk, ChunkSource, Feed};
use crate::stream::clip;
use crate::throttle::Throttle;
use crate::{Error, Result};

use log::debug;

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Mutex;
use std::thread;

enum Message {
    Chunk(Chunk),
    Done,
}

struct Plan {
    state: ProgressState,
    error: Option<Error>,
}

impl Plan {
    fn fail(&mut self, e: Error) {
        self.state.failed = true;
        if self.error.is_none() {
            self.error = Some(e);
        }
    }
}

pub struct PipelineWriter<'a> {
    opts: &'a WriteOptions,
    producers: usize,
    capacity: usize,
    metrics: &'a dyn SystemMetrics,
}

/// Queue depth that keeps roughly 1 MiB in flight, never fewer than 8 chunks.
pub fn default_capacity(chunk_size: usize) -> usize {
    (1024 * 1024 / chunk_size.max(1)).max(8)
}

impl<'a> PipelineWriter<'a> {
    pub fn new(
        opts: &'a WriteOptions,
        producers: usize,
        capacity: usize,
        metrics: &'a dyn SystemMetrics,
    ) -> Self {
        Self {
            opts,
            producers: producers.max(1),
            capacity: capacity.max(1),
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
        let forks = fork_all(source, self.producers);
        if forks.is_none() {
            debug!("Chunk source cannot fork, producers share it");
        }
        let source = Mutex::new(source);
        let plan = Mutex::new(Plan {
            state: ProgressState {
                remaining: bound.count(),
                ..ProgressState::default()
            },
            error: None,
        });
        let mut commit = Commit::new(sink, self.opts, self.metrics);
        let (tx, rx) = sync_channel::<Message>(self.capacity);

        thread::scope(|s| {
            let producers: Vec<_> = feeds(forks, &source, self.producers)
                .into_iter()
                .map(|feed| {
                    let (tx, plan) = (tx.clone(), &plan);
                    s.spawn(move || produce(feed, tx, plan, bound))
                })
                .collect();
            let closer = {
                let plan = &plan;
                s.spawn(move || {
                    for p in producers {
                        if p.join().is_err() {
                            lock(plan).fail(Error::from("Producer thread panicked"));
                        }
                    }
                    let _ = tx.send(Message::Done);
                })
            };

            let result = self.consume(rx, &mut commit, &throttle, bound);
            if let Err(e) = result {
                lock(&plan).fail(e);
            }
            let _ = closer.join();
        });

        let mut plan = plan.into_inner().unwrap_or_else(|e| e.into_inner());
        if let Some(e) = plan.error.take() {
            return Err(e);
        }
        commit.finish()?;
        Ok(WriteOutcome {
            written: commit.written,
            chunks: commit.chunks,
            elapsed: throttle.elapsed(),
            digest: commit.digest(),
        })
    }

    /// Writes chunks in arrival order until the end-of-stream marker. Dropping `rx` on return
    /// unblocks producers waiting on a full queue.
    fn consume(
        &self,
        rx: Receiver<Message>,
        commit: &mut Commit,
        throttle: &Throttle,
        bound: Bound,
    ) -> Result<()> {
        let mut progress = self
            .opts
            .progress
            .map(|i| ProgressLine::new(bound.byte_limit(), i, self.metrics));
        while let Ok(Message::Chunk(chunk)) = rx.recv() {
            commit.write(&chunk)?;
            throttle.after_write(commit.written)?;
            if let Some(p) = progress.as_mut() {
                p.tick(commit.written);
            }
        }
        if let Some(p) = progress.as_mut() {
            p.finish(commit.written);
        }
        Ok(())
    }
}

fn produce(mut feed: Feed, tx: SyncSender<Message>, plan: &Mutex<Plan>, bound: Bound) {
    loop {
        {
            let mut plan = lock(plan);
            if plan.state.failed {
                return;
            }
            match bound {
                Bound::Size(total) => {
                    if plan.state.produced >= total {
                        return;
                    }
                }
                Bound::Count { .. } => match plan.state.remaining {
                    Some(0) | None => return,
                    Some(ref mut n) => *n -= 1,
                },
            }
        }

        let mut chunk = match feed.next_chunk() {
            Ok(c) => c,
            Err(e) => return lock(plan).fail(e),
        };

        {
            let mut plan = lock(plan);
            if let Some(room) = bound.room(plan.state.produced) {
                if room == 0 {
                    return;
                }
                clip(&mut chunk, room);
            }
            if chunk.is_empty() && bound.count().is_none() {
                return plan.fail(Error::from("Chunk source produced an empty chunk"));
            }
            plan.state.produced += chunk.len() as u64;
            plan.state.chunks += 1;
        }

        if tx.send(Message::Chunk(chunk)).is_err() {
            return;
        }
    }
}
