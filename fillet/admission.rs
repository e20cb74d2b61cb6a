//! Free-space guard evaluated before anything is written.
//!
//! Targets are grouped by the storage device their directory lives on; the expected bytes of
//! each group plus a safety margin must fit into the free space of that device.

use crate::pump::WriteTarget;
use crate::sys;
use crate::{Error, ErrorKind, Result};

use log::{debug, warn};

use std::collections::BTreeMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

pub trait SpaceProbe {
    /// Identifier shared by every directory on the same storage device.
    fn storage_group(&self, dir: &Path) -> io::Result<String>;

    /// Bytes available to this process on the device holding `dir`.
    fn free_space(&self, dir: &Path) -> io::Result<u64>;
}

/// Queries the real filesystem.
pub struct FsProbe;

impl SpaceProbe for FsProbe {
    fn storage_group(&self, dir: &Path) -> io::Result<String> {
        sys::storage_id(dir)
    }

    fn free_space(&self, dir: &Path) -> io::Result<u64> {
        sys::free_space(dir)
    }
}

pub struct AdmissionController<'a> {
    probe: &'a dyn SpaceProbe,
    margin: u64,
    enabled: bool,
}

struct Group {
    dir: PathBuf,
    path: PathBuf,
    need: u64,
}

impl<'a> AdmissionController<'a> {
    pub fn new(probe: &'a dyn SpaceProbe, margin: u64, enabled: bool) -> Self {
        Self {
            probe,
            margin,
            enabled,
        }
    }

    /// Checks all targets at once, summing the demand of targets that share a device.
    pub fn check_all(&self, demands: &[(WriteTarget, Option<u64>)]) -> Result<()> {
        if !self.enabled {
            warn!("Disk-space guard disabled; writes may fail or fill disk");
            return Ok(());
        }

        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        for (target, expected) in demands {
            let (path, expected) = match (target, expected) {
                (WriteTarget::Path(p), Some(e)) => (p, *e),
                (WriteTarget::Path(p), None) => {
                    debug!("Expected size of {} is unknown, skipping space check", p.display());
                    continue;
                }
                (WriteTarget::Stdout, _) => continue,
            };
            let dir = probe_dir(path)?;
            let id = self.group_of(&dir);
            let group = groups.entry(id).or_insert_with(|| Group {
                dir,
                path: path.clone(),
                need: 0,
            });
            group.need = group.need.saturating_add(expected);
        }

        for (id, group) in groups {
            self.ensure(id, &group.dir, &group.path, group.need)?;
        }
        Ok(())
    }

    /// Checks a single target right before its writer starts.
    pub fn check_target(&self, target: &WriteTarget, expected: Option<u64>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let (path, expected) = match (target, expected) {
            (WriteTarget::Path(p), Some(e)) => (p, e),
            _ => return Ok(()),
        };
        let dir = probe_dir(path)?;
        let id = self.group_of(&dir);
        self.ensure(id, &dir, path, expected)
    }

    /// Falls back to one group per directory when the device cannot be identified.
    fn group_of(&self, dir: &Path) -> String {
        self.probe
            .storage_group(dir)
            .unwrap_or_else(|_| dir.display().to_string())
    }

    fn ensure(&self, group: String, dir: &Path, path: &Path, need: u64) -> Result<()> {
        let free = match self.probe.free_space(dir) {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot query free space of {}: {}", dir.display(), e);
                return Ok(());
            }
        };
        let required = need.saturating_add(self.margin);
        debug!(
            "Space check on {}: need {} + margin {}, free {}",
            group, need, self.margin, free
        );
        if required > free {
            return Err(Error::new(ErrorKind::SpaceExhausted {
                group,
                path: path.to_path_buf(),
                required,
                free,
            }));
        }
        Ok(())
    }
}

/// Nearest existing directory that will hold `path`.
fn probe_dir(path: &Path) -> io::Result<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    let mut dir = abs.parent().map(Path::to_path_buf).unwrap_or_else(|| abs.clone());
    while !dir.is_dir() {
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }
    Ok(dir)
}
