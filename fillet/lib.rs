extern crate backtrace;
extern crate cfg_if;
extern crate flate2;
extern crate hex;
extern crate log;
extern crate sha2;
extern crate tempfile;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(windows)] {
        extern crate winapi;
    } else if #[cfg(unix)] {
        extern crate libc;
        extern crate nix;
    }
}

pub mod admission;
pub mod bench;
pub mod concurrent;
pub mod hash;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod pump;
pub mod ram_buffer;
pub mod retry;
pub mod sink;
pub mod source;
pub mod stream;
pub mod throttle;

mod commit;
mod error;
mod sys;

pub use error::*;
pub use pump::*;
pub use source::{Chunk, ChunkSource};

pub type Result<T> = std::result::Result<T, self::Error>;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
