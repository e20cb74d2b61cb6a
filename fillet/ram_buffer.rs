//! Accumulates the whole payload in memory, then dumps it with a single write.

use crate::commit::Commit;
use crate::metrics::SystemMetrics;
use crate::progress::ProgressLine;
use crate::pump::{Bound, WriteOptions, WriteOutcome};
use crate::sink::Sink;
use crate::source::ChunkSource;
use crate::stream::clip;
use crate::throttle::Throttle;
use crate::{Error, ErrorKind, Result};

use log::debug;

pub struct RamBufferWriter<'a> {
    opts: &'a WriteOptions,
    ram_max: u64,
    metrics: &'a dyn SystemMetrics,
}

struct Buffer {
    data: Vec<u8>,
    limit: u64,
    chunks: u64,
}

impl Buffer {
    /// Appends `chunk` unless that would take the buffer past its limit.
    fn push(&mut self, chunk: &[u8]) -> Result<()> {
        let needed = self.data.len() as u64 + chunk.len() as u64;
        if needed > self.limit {
            return Err(Error::new(ErrorKind::RamBufferOverflow {
                buffered: self.data.len() as u64,
                chunk: chunk.len() as u64,
                limit: self.limit,
            }));
        }
        let needed = needed as usize;
        if needed > self.data.capacity() {
            let target = (self.data.capacity() * 2).max(needed).min(self.limit as usize);
            self.data.reserve_exact(target - self.data.len());
        }
        self.data.extend_from_slice(chunk);
        self.chunks += 1;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl<'a> RamBufferWriter<'a> {
    pub fn new(opts: &'a WriteOptions, ram_max: u64, metrics: &'a dyn SystemMetrics) -> Self {
        Self {
            opts,
            ram_max,
            metrics,
        }
    }

    /// Fills the buffer from `source`, then calls `open` and writes the buffer out. The
    /// destination is not touched if accumulation fails.
    pub fn write<F>(&self, source: &mut dyn ChunkSource, bound: Bound, open: F) -> Result<WriteOutcome>
    where
        F: FnOnce() -> Result<Box<dyn Sink>>,
    {
        let throttle = Throttle::new(self.opts.limits, self.metrics);
        let mut progress = self
            .opts
            .progress
            .map(|i| ProgressLine::new(bound.byte_limit(), i, self.metrics));
        let mut buffer = Buffer {
            data: Vec::new(),
            limit: self.ram_max,
            chunks: 0,
        };

        match bound {
            Bound::Size(total) => {
                while buffer.len() < total {
                    let mut chunk = source.next_chunk()?;
                    if chunk.is_empty() {
                        return Err(Error::from("Chunk source produced an empty chunk"));
                    }
                    clip(&mut chunk, total - buffer.len());
                    buffer.push(&chunk)?;
                    throttle.after_write(buffer.len())?;
                    if let Some(p) = progress.as_mut() {
                        p.tick(buffer.len());
                    }
                }
            }
            Bound::Count { count, .. } => {
                for _ in 0..count {
                    if bound.room(buffer.len()) == Some(0) {
                        break;
                    }
                    let mut chunk = source.next_chunk()?;
                    if let Some(room) = bound.room(buffer.len()) {
                        clip(&mut chunk, room);
                    }
                    buffer.push(&chunk)?;
                    throttle.after_write(buffer.len())?;
                    if let Some(p) = progress.as_mut() {
                        p.tick(buffer.len());
                    }
                }
            }
        }
        if let Some(p) = progress.as_mut() {
            p.finish(buffer.len());
        }

        debug!("Dumping {} buffered bytes", buffer.len());
        let mut sink = open()?;
        let mut commit = Commit::new(sink.as_mut(), self.opts, self.metrics).without_holes();
        commit.write(&buffer.data)?;
        commit.finish()?;
        Ok(WriteOutcome {
            written: commit.written,
            chunks: buffer.chunks,
            elapsed: throttle.elapsed(),
            digest: commit.digest(),
        })
    }
}
