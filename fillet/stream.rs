//! Single-threaded sequential writer.

use crate::commit::Commit;
use crate::hash::{digest_region, HashAlgorithm};
use crate::metrics::SystemMetrics;
use crate::progress::ProgressLine;
use crate::pump::{Bound, WriteOptions, WriteOutcome};
use crate::sink::Sink;
use crate::source::ChunkSource;
use crate::throttle::Throttle;
use crate::{Error, ErrorKind, Result};

use log::debug;

use std::path::Path;

pub struct StreamWriter<'a> {
    opts: &'a WriteOptions,
    metrics: &'a dyn SystemMetrics,
}

impl<'a> StreamWriter<'a> {
    pub fn new(opts: &'a WriteOptions, metrics: &'a dyn SystemMetrics) -> Self {
        Self { opts, metrics }
    }

    pub fn write(
        &self,
        source: &mut dyn ChunkSource,
        sink: &mut dyn Sink,
        bound: Bound,
    ) -> Result<WriteOutcome> {
        let throttle = Throttle::new(self.opts.limits, self.metrics);
        let mut commit = Commit::new(sink, self.opts, self.metrics);
        let mut progress = self
            .opts
            .progress
            .map(|i| ProgressLine::new(bound.byte_limit(), i, self.metrics));

        match bound {
            Bound::Size(total) => {
                while commit.written < total {
                    let mut chunk = source.next_chunk()?;
                    if chunk.is_empty() {
                        return Err(Error::from("Chunk source produced an empty chunk"));
                    }
                    clip(&mut chunk, total - commit.written);
                    commit.write(&chunk)?;
                    throttle.after_write(commit.written)?;
                    if let Some(p) = progress.as_mut() {
                        p.tick(commit.written);
                    }
                }
            }
            Bound::Count { count, size_cap } => {
                for _ in 0..count {
                    if let Some(cap) = size_cap {
                        if commit.written >= cap {
                            debug!("Size cap of {} bytes reached", cap);
                            break;
                        }
                    }
                    let mut chunk = source.next_chunk()?;
                    if let Some(room) = bound.room(commit.written) {
                        clip(&mut chunk, room);
                    }
                    commit.write(&chunk)?;
                    throttle.after_write(commit.written)?;
                    if let Some(p) = progress.as_mut() {
                        p.tick(commit.written);
                    }
                }
            }
        }

        commit.finish()?;
        if let Some(p) = progress.as_mut() {
            p.finish(commit.written);
        }
        Ok(WriteOutcome {
            written: commit.written,
            chunks: commit.chunks,
            elapsed: throttle.elapsed(),
            digest: commit.digest(),
        })
    }
}

pub(crate) fn clip(chunk: &mut Vec<u8>, room: u64) {
    if chunk.len() as u64 > room {
        chunk.truncate(room as usize);
    }
}

/// Re-reads `len` bytes written at `start` and compares their digest with `expected`.
pub fn verify_written<P: AsRef<Path>>(
    path: P,
    start: u64,
    len: u64,
    algo: HashAlgorithm,
    expected: &str,
) -> Result<()> {
    let actual = digest_region(path, start, len, algo)?;
    if actual != expected {
        return Err(Error::new(ErrorKind::HashMismatch {
            expected: expected.to_string(),
            actual,
        }));
    }
    Ok(())
}
