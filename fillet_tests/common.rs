use fillet::admission::SpaceProbe;
use fillet::metrics::SystemMetrics;
use fillet::sink::{MemorySink, Sink};

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use std::fs;
use std::io;
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

pub struct TmpDir {
    dir: PathBuf,
}

impl TmpDir {
    pub fn new() -> Self {
        let mut rng = thread_rng();
        let name: String = iter::repeat(())
            .map(|()| char::from(rng.sample(Alphanumeric)))
            .take(7)
            .collect();

        let dir = PathBuf::from(format!("fillet-{}", name));
        fs::create_dir(dir.as_path()).unwrap();

        Self {
            dir: dir.canonicalize().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn file<P: AsRef<Path>>(&self, filename: P) -> String {
        let mut path = self.dir.clone();
        path.push(filename);
        path.to_str().unwrap().to_string()
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        for _ in 0..5000 {
            match fs::remove_dir_all(self.dir.as_path()) {
                Err(_) => thread::sleep(Duration::from_millis(1)),
                Ok(_) => break,
            }
        }
    }
}

#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr, $diff:expr) => {{
        match (&$a, &$b, &$diff) {
            (a_val, b_val, diff_val) => {
                if (*a_val < (*b_val - *diff_val)) || (*a_val > (*b_val + *diff_val)) {
                    panic!(
                        "assertion failed: |a - b| < diff \
                         a: `{:?}`, b: `{:?}`, diff: `{:?}`",
                        a_val, b_val, diff_val
                    )
                }
            }
        }
    }};
}

pub fn read_bytes<P: AsRef<Path>>(path: P) -> Vec<u8> {
    fs::read(path).unwrap()
}

pub fn write_all<P, S>(filename: P, data: S)
where
    P: AsRef<Path>,
    S: AsRef<[u8]>,
{
    fs::write(filename, data).unwrap();
}

pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Metrics with a manual clock: `sleep` advances wall time instantly.
pub struct FakeMetrics {
    wall: Mutex<Duration>,
    cpu: Mutex<Option<Duration>>,
    rss: Mutex<Option<u64>>,
    cpus: usize,
}

impl FakeMetrics {
    pub fn new() -> Self {
        Self::with_cpus(1)
    }

    pub fn with_cpus(cpus: usize) -> Self {
        Self {
            wall: Mutex::new(Duration::from_secs(0)),
            cpu: Mutex::new(Some(Duration::from_secs(0))),
            rss: Mutex::new(Some(0)),
            cpus,
        }
    }

    pub fn set_cpu(&self, cpu: Option<Duration>) {
        *self.cpu.lock().unwrap() = cpu;
    }

    pub fn set_rss(&self, rss: Option<u64>) {
        *self.rss.lock().unwrap() = rss;
    }

    pub fn advance(&self, d: Duration) {
        *self.wall.lock().unwrap() += d;
    }
}

impl SystemMetrics for FakeMetrics {
    fn wall_time(&self) -> Duration {
        *self.wall.lock().unwrap()
    }

    fn cpu_time(&self) -> Option<Duration> {
        *self.cpu.lock().unwrap()
    }

    fn resident_memory(&self) -> Option<u64> {
        *self.rss.lock().unwrap()
    }

    fn cpu_count(&self) -> usize {
        self.cpus
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Memory sink whose first `fail_first` write attempts fail.
pub struct FlakySink {
    pub inner: MemorySink,
    pub fail_first: u32,
    pub attempts: u32,
}

impl FlakySink {
    pub fn new(fail_first: u32) -> Self {
        Self {
            inner: MemorySink::default(),
            fail_first,
            attempts: 0,
        }
    }
}

impl Sink for FlakySink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.attempts += 1;
        if self.attempts <= self.fail_first {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.inner.write_chunk(chunk)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.inner.sync()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }
}

/// Reports a fixed amount of free space; every directory belongs to `group`.
pub struct FakeProbe {
    pub group: Option<String>,
    pub free: Option<u64>,
}

impl FakeProbe {
    pub fn new(free: u64) -> Self {
        Self {
            group: Some(String::from("disk0")),
            free: Some(free),
        }
    }
}

impl SpaceProbe for FakeProbe {
    fn storage_group(&self, _dir: &Path) -> io::Result<String> {
        self.group
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "unknown device"))
    }

    fn free_space(&self, _dir: &Path) -> io::Result<u64> {
        self.free
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "statvfs failed"))
    }
}
