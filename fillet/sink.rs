use crate::sys;

use flate2::write::GzEncoder;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Destination of committed chunks.
pub trait Sink: Send {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Advances the logical position by `len` zero bytes without writing them.
    fn skip(&mut self, len: u64) -> io::Result<()> {
        let zeros = vec![0u8; len as usize];
        self.write_chunk(&zeros)
    }

    /// Flushes and persists everything written so far.
    fn sync(&mut self) -> io::Result<()>;

    /// Makes the logical length visible, e.g. after a trailing hole.
    fn finish(&mut self) -> io::Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Start from an empty file.
    Truncate,
    /// Continue after the current end of the file.
    Append,
    /// Overwrite from the given offset, keeping the rest of the file.
    At(u64),
}

/// Output encoding applied on top of the target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

pub struct FileSink {
    file: File,
    path: PathBuf,
    start: u64,
    pos: u64,
    reposition: bool,
}

impl FileSink {
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, sparse: bool) -> io::Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().write(true).create(true).open(path)?;
        let start = match mode {
            OpenMode::Truncate => {
                file.set_len(0)?;
                0
            }
            OpenMode::Append => file.seek(SeekFrom::End(0))?,
            OpenMode::At(offset) => file.seek(SeekFrom::Start(offset))?,
        };
        if sparse {
            sys::enable_sparse(&file)?;
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            start,
            pos: start,
            reposition: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset the first byte of this run lands at.
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    fn restore_position(&mut self) -> io::Result<()> {
        if self.reposition {
            self.file.seek(SeekFrom::Start(self.pos))?;
            self.reposition = false;
        }
        Ok(())
    }
}

impl Sink for FileSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.restore_position()?;
        // A failed write may have moved the cursor partway, retry from the last committed byte.
        if let Err(e) = self.file.write_all(chunk) {
            self.reposition = true;
            return Err(e);
        }
        self.pos += chunk.len() as u64;
        Ok(())
    }

    fn skip(&mut self, len: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.pos + len))?;
        self.reposition = false;
        self.pos += len;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.file.metadata()?.len() < self.pos {
            self.file.set_len(self.pos)?;
        }
        Ok(())
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

pub struct StdoutSink {
    out: io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StdoutSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.out.write_all(chunk)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Write for StdoutSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Gzip stream over another sink. Holes are written as compressed zeros.
pub struct GzipSink<S: Sink + Write> {
    encoder: GzEncoder<S>,
    finished: bool,
}

impl<S: Sink + Write> GzipSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            encoder: GzEncoder::new(inner, flate2::Compression::default()),
            finished: false,
        }
    }

    pub fn get_ref(&self) -> &S {
        self.encoder.get_ref()
    }
}

impl<S: Sink + Write> Sink for GzipSink<S> {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.encoder.write_all(chunk)
    }

    fn sync(&mut self) -> io::Result<()> {
        // The trailer is out once finished, a flush would start another block after it.
        if !self.finished {
            self.encoder.flush()?;
        }
        self.encoder.get_mut().sync()
    }

    fn finish(&mut self) -> io::Result<()> {
        if !self.finished {
            self.encoder.try_finish()?;
            self.finished = true;
        }
        self.encoder.get_mut().finish()
    }
}

/// In-memory sink, mostly useful for tests and dry runs.
#[derive(Default, Debug)]
pub struct MemorySink {
    pub data: Vec<u8>,
    pub syncs: usize,
}

impl Sink for MemorySink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.syncs += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Cuts or extends `path` to exactly `len` bytes, creating it if needed.
pub fn truncate<P: AsRef<Path>>(path: P, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).create(true).open(path)?;
    file.set_len(len)
}

/// Reserves `len` bytes for `path`, falling back to extending the file when the filesystem
/// cannot allocate ahead.
pub fn preallocate<P: AsRef<Path>>(path: P, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).create(true).open(path)?;
    sys::preallocate(&file, len)
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Compression::None => f.write_str("none"),
            Compression::Gzip => f.write_str("gzip"),
        }
    }
}

pub fn is_zero(chunk: &[u8]) -> bool {
    chunk.iter().all(|&b| b == 0)
}
