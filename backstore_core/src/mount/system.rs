use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use super::{ForceUnmounter, MountProbe};
use crate::error::Result;
use crate::exec::Executor;

const PROC_MOUNTS: &str = "/proc/self/mounts";

/// One line of a mounts table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// Probe backed by the running kernel: stat(2) for mount detection, the
/// mounts table for filesystem types, `umount` for detaching.
#[derive(Debug, Clone)]
pub struct SystemMounter {
    executor: Executor,
    mounts_table: PathBuf,
}

impl SystemMounter {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            mounts_table: PathBuf::from(PROC_MOUNTS),
        }
    }

    /// Read mounts from `path` instead of `/proc/self/mounts`.
    pub fn with_mounts_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.mounts_table = path.into();
        self
    }

    /// The mount whose mount point is the deepest ancestor of `path`.
    /// Later entries shadow earlier ones at the same mount point.
    pub fn find_mount(&self, path: &Path) -> io::Result<Option<MountEntry>> {
        let table = fs::read_to_string(&self.mounts_table)?;
        let path = fs::canonicalize(path)?;

        let mut best: Option<MountEntry> = None;
        for entry in parse_mounts(&table) {
            if !path.starts_with(&entry.mount_point) {
                continue;
            }
            let depth = entry.mount_point.components().count();
            let deeper = best
                .as_ref()
                .map_or(true, |b| depth >= b.mount_point.components().count());
            if deeper {
                best = Some(entry);
            }
        }
        Ok(best)
    }

    fn umount(&self, args: &[&OsStr], timeout: Duration) -> Result<()> {
        self.executor
            .run_with_timeout("umount", args, timeout)
            .map(|_| ())
    }
}

impl MountProbe for SystemMounter {
    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        // A path that does not exist yet is simply not mounted. ENOTCONN and
        // friends on a dead network mount still surface as errors.
        let path = match fs::canonicalize(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            other => other?,
        };
        let meta = match fs::metadata(&path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            other => other?,
        };
        let Some(parent) = path.parent() else {
            return Ok(true);
        };
        if meta.dev() != fs::metadata(parent)?.dev() {
            return Ok(true);
        }
        // Bind mounts share the parent's device.
        let table = fs::read_to_string(&self.mounts_table)?;
        Ok(parse_mounts(&table).iter().any(|e| e.mount_point == path))
    }

    fn filesystem_type(&self, path: &Path) -> io::Result<String> {
        self.find_mount(path)?.map(|e| e.fs_type).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mount found for {}", path.display()),
            )
        })
    }

    fn unmount(&self, path: &Path) -> Result<()> {
        self.umount(&[path.as_os_str()], self.executor.timeout())
    }

    fn as_force_unmounter(&self) -> Option<&dyn ForceUnmounter> {
        Some(self)
    }
}

impl ForceUnmounter for SystemMounter {
    /// Plain `umount` first; `umount -f` only if that does not finish within
    /// `timeout`.
    fn unmount_with_force(&self, path: &Path, timeout: Duration) -> Result<()> {
        match self.umount(&[path.as_os_str()], timeout) {
            Err(err) if err.is_timeout() => {
                warn!(path = %path.display(), "timed out waiting for unmount, trying with -f");
                self.umount(&[OsStr::new("-f"), path.as_os_str()], timeout)
            }
            other => other,
        }
    }
}

/// Whether `mount` lists `mount_point`. Any failure to run `mount` counts as
/// not mounted.
pub fn is_mounted(executor: &Executor, mount_point: &Path) -> bool {
    const NO_ARGS: [&str; 0] = [];
    let Ok(output) = executor.run("mount", &NO_ARGS) else {
        return false;
    };
    let needle = format!(" {} ", mount_point.display());
    output.lines().any(|line| line.contains(&needle))
}

/// Parse `/proc/mounts` format: `source mount_point fs_type options ...`.
/// Malformed lines are skipped.
pub fn parse_mounts(table: &str) -> Vec<MountEntry> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                source: unescape_octal(source),
                mount_point: PathBuf::from(unescape_octal(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode the `\ooo` escapes the kernel uses for spaces, tabs, newlines and
/// backslashes in mount fields.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_triplet(&bytes[i + 1..i + 4]) {
            let value = bytes[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            if let Ok(b) = u8::try_from(value) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(digits: &[u8]) -> bool {
    digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
