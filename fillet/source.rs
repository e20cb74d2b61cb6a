//! Pull-based chunk producers.
//!
//! A `ChunkSource` never ends on its own: writers stop pulling once their bound is reached.
//! Sources that can be replicated cheaply implement `fork`, which lets multi-threaded writers
//! give every thread an independent replica instead of sharing one source behind a lock.

use crate::{lock, Result};

use std::sync::Mutex;

pub type Chunk = Vec<u8>;

pub trait ChunkSource: Send {
    fn next_chunk(&mut self) -> Result<Chunk>;

    /// Returns an independent replica of this source, if the source supports it.
    fn fork(&mut self) -> Option<Box<dyn ChunkSource>> {
        None
    }
}

impl<'a> ChunkSource for Box<dyn ChunkSource + 'a> {
    fn next_chunk(&mut self) -> Result<Chunk> {
        (**self).next_chunk()
    }

    fn fork(&mut self) -> Option<Box<dyn ChunkSource>> {
        (**self).fork()
    }
}

/// Adapts a closure into a source.
pub struct FnSource<F>(pub F);

impl<F> ChunkSource for FnSource<F>
where
    F: FnMut() -> Result<Chunk> + Send,
{
    fn next_chunk(&mut self) -> Result<Chunk> {
        (self.0)()
    }
}

/// Repeats the same chunk forever.
#[derive(Clone, Debug)]
pub struct RepeatSource {
    chunk: Chunk,
}

impl RepeatSource {
    pub fn new(chunk: Chunk) -> Self {
        Self { chunk }
    }
}

impl ChunkSource for RepeatSource {
    fn next_chunk(&mut self) -> Result<Chunk> {
        Ok(self.chunk.clone())
    }

    fn fork(&mut self) -> Option<Box<dyn ChunkSource>> {
        Some(Box::new(self.clone()))
    }
}

/// Per-thread view of a source that is fanned out to several threads.
pub(crate) enum Feed<'s, 'a> {
    Own(Box<dyn ChunkSource>),
    Shared(&'s Mutex<&'a mut dyn ChunkSource>),
}

impl<'s, 'a> Feed<'s, 'a> {
    pub fn next_chunk(&mut self) -> Result<Chunk> {
        match self {
            Feed::Own(src) => src.next_chunk(),
            Feed::Shared(src) => lock(src).next_chunk(),
        }
    }
}

/// Forks `count` replicas of `source`, or `None` if the source cannot be forked.
pub(crate) fn fork_all(
    source: &mut dyn ChunkSource,
    count: usize,
) -> Option<Vec<Box<dyn ChunkSource>>> {
    let mut forks = Vec::with_capacity(count);
    for _ in 0..count {
        forks.push(source.fork()?);
    }
    Some(forks)
}

/// Builds one feed per thread: independent forks when possible, the shared source otherwise.
pub(crate) fn feeds<'s, 'a>(
    forks: Option<Vec<Box<dyn ChunkSource>>>,
    shared: &'s Mutex<&'a mut dyn ChunkSource>,
    count: usize,
) -> Vec<Feed<'s, 'a>> {
    match forks {
        Some(forks) => forks.into_iter().map(Feed::Own).collect(),
        None => (0..count).map(|_| Feed::Shared(shared)).collect(),
    }
}
