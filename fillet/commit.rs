use crate::hash::Hasher;
use crate::metrics::SystemMetrics;
use crate::pump::WriteOptions;
use crate::retry::RetryState;
use crate::sink::{is_zero, Sink};
use crate::Result;

use log::warn;

/// Write path for a single sink: hashing, retries, sparse holes and periodic fsync.
pub(crate) struct Commit<'a> {
    sink: &'a mut dyn Sink,
    metrics: &'a dyn SystemMetrics,
    retry: RetryState,
    sparse: bool,
    fsync_interval: Option<u64>,
    unsynced: u64,
    hasher: Option<Hasher>,
    pub written: u64,
    pub chunks: u64,
}

impl<'a> Commit<'a> {
    pub fn new(sink: &'a mut dyn Sink, opts: &WriteOptions, metrics: &'a dyn SystemMetrics) -> Self {
        Self {
            sink,
            metrics,
            retry: RetryState::new(opts.retry),
            sparse: opts.sparse,
            fsync_interval: opts.fsync_interval,
            unsynced: 0,
            hasher: opts.hash.map(Hasher::new),
            written: 0,
            chunks: 0,
        }
    }

    /// Dumps are written verbatim even when the target is sparse.
    pub fn without_holes(mut self) -> Self {
        self.sparse = false;
        self
    }

    pub fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
        let hole = self.sparse && is_zero(chunk);
        let len = chunk.len() as u64;
        let sink = &mut *self.sink;
        self.retry.run(self.metrics, || {
            if hole {
                sink.skip(len)
            } else {
                sink.write_chunk(chunk)
            }
        })?;

        self.written += len;
        self.chunks += 1;
        if let Some(interval) = self.fsync_interval {
            self.unsynced += len;
            if self.unsynced >= interval {
                self.sync();
            }
        }
        Ok(())
    }

    fn sync(&mut self) {
        if let Err(e) = self.sink.sync() {
            warn!("fsync failed: {}", e);
        }
        self.unsynced = 0;
    }

    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()?;
        if self.fsync_interval.is_some() && self.unsynced > 0 {
            self.sync();
        }
        Ok(())
    }

    pub fn digest(&mut self) -> Option<String> {
        self.hasher.take().map(Hasher::finish)
    }
}
