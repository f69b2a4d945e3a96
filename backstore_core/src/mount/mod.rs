//! Mount point validation and repair.
//!
//! Backends reached through a local mount (NFS, CIFS, ...) leave state behind
//! when they die: a mount of the wrong kind bound to the directory a backup
//! target expects, or a half-detached mount the kernel can no longer stat.
//! [`Reconciler::check_and_cleanup`] tells a healthy mount apart from both and
//! removes the stale ones.

#[cfg(unix)]
mod system;

#[cfg(unix)]
pub use system::{is_mounted, parse_mounts, MountEntry, SystemMounter};

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info};

use crate::config::{Timeouts, DEFAULT_MOUNT_CLEANUP_TIMEOUT};
use crate::error::{Error, Result};

/// Answers "is this path a mount point, and what filesystem backs it", and
/// knows how to detach it again.
pub trait MountProbe {
    /// Whether `path` is currently a mount point. An error means the state
    /// could not be read, which for a mount usually means it is corrupted.
    fn is_mount_point(&self, path: &Path) -> io::Result<bool>;

    /// Filesystem type of the mount backing `path`, e.g. `nfs4` or `cifs`.
    fn filesystem_type(&self, path: &Path) -> io::Result<String>;

    /// Detach the mount at `path`.
    fn unmount(&self, path: &Path) -> Result<()>;

    /// Forced unmount support, when the backend has it.
    fn as_force_unmounter(&self) -> Option<&dyn ForceUnmounter> {
        None
    }
}

/// Unmount that bypasses the usual busy checks. Needed for network mounts
/// stuck half-detached; never used unless the probe opts in.
pub trait ForceUnmounter {
    fn unmount_with_force(&self, path: &Path, timeout: Duration) -> Result<()>;
}

/// Validates a mount directory against the backend kind expected there.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    cleanup_timeout: Duration,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_CLEANUP_TIMEOUT)
    }
}

impl Reconciler {
    /// `cleanup_timeout` bounds forced unmounts.
    pub fn new(cleanup_timeout: Duration) -> Self {
        Self { cleanup_timeout }
    }

    pub fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.mount_cleanup)
    }

    /// Check `mount_dir` and clean it up if it is not a healthy `kind` mount.
    ///
    /// Returns `Ok(true)` when a mount whose filesystem type contains `kind` is
    /// in place, `Ok(false)` when nothing is mounted there (any more).
    ///
    /// If the probe cannot read the mount state, a cleanup is attempted and the
    /// probe error is returned whatever the cleanup outcome. If a mount of
    /// another kind is found and cannot be removed, the cleanup failure is
    /// returned wrapped in [`Error::StaleMountCleanup`].
    pub fn check_and_cleanup(
        &self,
        kind: &str,
        mount_dir: &Path,
        probe: &dyn MountProbe,
    ) -> Result<bool> {
        let mounted = match probe.is_mount_point(mount_dir) {
            Ok(mounted) => mounted,
            Err(source) => {
                if let Err(err) = self.cleanup(mount_dir, probe) {
                    error!(
                        error = %err,
                        mount_dir = %mount_dir.display(),
                        "failed to unmount corrupted mountpoint"
                    );
                }
                return Err(Error::MountProbe {
                    path: mount_dir.to_path_buf(),
                    source,
                });
            }
        };

        if !mounted {
            return Ok(false);
        }

        let fs_type = probe
            .filesystem_type(mount_dir)
            .map_err(|source| Error::MountLookup {
                path: mount_dir.to_path_buf(),
                source,
            })?;

        if fs_type.contains(kind) {
            return Ok(true);
        }

        info!(
            mount_dir = %mount_dir.display(),
            %fs_type,
            %kind,
            "mountpoint is bound to another filesystem"
        );
        self.cleanup(mount_dir, probe)
            .map_err(|source| Error::StaleMountCleanup {
                path: mount_dir.to_path_buf(),
                fs_type,
                kind: kind.to_string(),
                source: Box::new(source),
            })?;

        Ok(false)
    }

    /// Unmount `mount_dir` if needed and remove the directory.
    ///
    /// Uses the probe's forced unmount, bounded by the cleanup timeout, when it
    /// offers one, and its plain unmount otherwise.
    pub fn cleanup(&self, mount_dir: &Path, probe: &dyn MountProbe) -> Result<()> {
        match probe.as_force_unmounter() {
            Some(force) => {
                info!(mount_dir = %mount_dir.display(), "trying to force clean up mountpoint");
                cleanup_mount_point(mount_dir, probe, |path| {
                    force.unmount_with_force(path, self.cleanup_timeout)
                })
            }
            None => {
                info!(mount_dir = %mount_dir.display(), "trying to clean up mountpoint");
                cleanup_mount_point(mount_dir, probe, |path| probe.unmount(path))
            }
        }
    }
}

fn cleanup_mount_point(
    mount_dir: &Path,
    probe: &dyn MountProbe,
    unmount: impl Fn(&Path) -> Result<()>,
) -> Result<()> {
    let mounted = match probe.is_mount_point(mount_dir) {
        Ok(mounted) => mounted,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        // Unreadable usually means a corrupted mount; unmounting is the fix.
        Err(_) => true,
    };

    if mounted {
        unmount(mount_dir)?;
        match probe.is_mount_point(mount_dir) {
            Ok(false) => {}
            Ok(true) => {
                return Err(Error::StillMounted {
                    path: mount_dir.to_path_buf(),
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(Error::MountProbe {
                    path: mount_dir.to_path_buf(),
                    source,
                })
            }
        }
    }

    match fs::remove_dir(mount_dir) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}
