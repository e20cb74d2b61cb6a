use cfg_if::cfg_if;

use nix::sys::stat::stat;
use nix::sys::statvfs::statvfs;

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

cfg_if! {
    if #[cfg(target_os = "linux")] {
        use procfs::process::Process;

        pub fn cpu_time() -> Option<Duration> {
            let stat = Process::myself().and_then(|p| p.stat()).ok()?;
            let ticks = clock_ticks()?;
            let total = stat.utime + stat.stime;
            Some(Duration::from_micros(total * 1_000_000 / ticks))
        }

        pub fn resident_memory() -> Option<u64> {
            let stat = Process::myself().and_then(|p| p.stat()).ok()?;
            Some(stat.rss as u64 * page_size()?)
        }

        fn clock_ticks() -> Option<u64> {
            match unsafe { libc::sysconf(libc::_SC_CLK_TCK) } {
                t if t > 0 => Some(t as u64),
                _ => None,
            }
        }

        fn page_size() -> Option<u64> {
            match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
                p if p > 0 => Some(p as u64),
                _ => None,
            }
        }
    } else {
        pub fn cpu_time() -> Option<Duration> {
            let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
            if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
                return None;
            }
            let tv = |t: libc::timeval| {
                Duration::from_secs(t.tv_sec as u64) + Duration::from_micros(t.tv_usec as u64)
            };
            Some(tv(usage.ru_utime) + tv(usage.ru_stime))
        }

        pub fn resident_memory() -> Option<u64> {
            None
        }
    }
}

pub fn storage_id(dir: &Path) -> io::Result<String> {
    let st = stat(dir).map_err(io::Error::from)?;
    Ok(format!("device {}", st.st_dev))
}

pub fn free_space(dir: &Path) -> io::Result<u64> {
    let vfs = statvfs(dir).map_err(io::Error::from)?;
    Ok(vfs.blocks_available() as u64 * vfs.fragment_size() as u64)
}

pub fn enable_sparse(_file: &File) -> io::Result<()> {
    // Holes come for free on unix filesystems that support them.
    Ok(())
}

cfg_if! {
    if #[cfg(target_os = "linux")] {
        use nix::fcntl::posix_fallocate;
        use std::os::unix::io::AsRawFd;

        pub fn preallocate(file: &File, len: u64) -> io::Result<()> {
            match posix_fallocate(file.as_raw_fd(), 0, len as libc::off_t) {
                Ok(()) => Ok(()),
                Err(_) => extend(file, len),
            }
        }
    } else {
        pub fn preallocate(file: &File, len: u64) -> io::Result<()> {
            extend(file, len)
        }
    }
}

fn extend(file: &File, len: u64) -> io::Result<()> {
    if file.metadata()?.len() < len {
        file.set_len(len)?;
    }
    Ok(())
}
