use backtrace::Backtrace;

use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ErrorKind {
    Io(io::Error),
    Config(String),
    SpaceExhausted {
        group: String,
        path: PathBuf,
        required: u64,
        free: u64,
    },
    RamLimitExceeded {
        rss: u64,
        limit: u64,
    },
    RamBufferOverflow {
        buffered: u64,
        chunk: u64,
        limit: u64,
    },
    HashMismatch {
        expected: String,
        actual: String,
    },
    Str(String),
    StaticStr(&'static str),
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    backtrace: Backtrace,
}

impl Error {
    pub fn new(k: ErrorKind) -> Self {
        Self {
            kind: k,
            backtrace: Backtrace::new(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Config(msg.into()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn call_stack(&self) -> String {
        format!("{:?}", self.backtrace)
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::Config(_) => 2,
            ErrorKind::SpaceExhausted { .. } => 3,
            ErrorKind::RamLimitExceeded { .. } => 4,
            ErrorKind::HashMismatch { .. } => 5,
            ErrorKind::RamBufferOverflow { .. } => 6,
            _ => 1,
        }
    }

    pub fn into_io_error(self) -> io::Error {
        match self.kind {
            ErrorKind::Io(e) => e,
            _ => io::Error::new(io::ErrorKind::Other, self.to_string()),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(e) => write!(f, "{}", e),
            ErrorKind::Config(s) => write!(f, "{}", s),
            ErrorKind::SpaceExhausted {
                group,
                path,
                required,
                free,
            } => write!(
                f,
                "Not enough free space on {} ({}): need {} bytes (incl. margin), {} available, \
                 short by {} bytes",
                group,
                path.display(),
                required,
                free,
                required.saturating_sub(*free)
            ),
            ErrorKind::RamLimitExceeded { rss, limit } => write!(
                f,
                "Resident memory {} bytes exceeds --ram-limit {} bytes",
                rss, limit
            ),
            ErrorKind::RamBufferOverflow {
                buffered,
                chunk,
                limit,
            } => write!(
                f,
                "RAM buffer would exceed --ram-max: {} buffered + {} incoming > {} bytes",
                buffered, chunk, limit
            ),
            ErrorKind::HashMismatch { expected, actual } => write!(
                f,
                "Verification failed: wrote {} but read back {}",
                expected, actual
            ),
            ErrorKind::Str(s) => write!(f, "{}", s),
            ErrorKind::StaticStr(s) => write!(f, "{}", s),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(ErrorKind::Io(err))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new(ErrorKind::Str(s))
    }
}

impl From<&'static str> for Error {
    fn from(s: &'static str) -> Self {
        Error::new(ErrorKind::StaticStr(s))
    }
}
