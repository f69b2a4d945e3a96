//! Error types shared by the codec pipeline, the command executor and the
//! mount reconciler.

use std::io;
use std::path::PathBuf;

/// Convenience alias used throughout `backstore_core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure this crate reports.
///
/// Unknown method, corrupt frame and checksum mismatch are separate variants,
/// as are a command that timed out and one that failed. Callers branch on them
/// to retry, quarantine a block or abort.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No codec is registered under the requested name.
    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(String),

    /// The codec could not produce a compressed stream.
    #[error("failed to compress block with {method}: {source}")]
    Compress {
        method: String,
        #[source]
        source: io::Error,
    },

    /// The compressed stream is malformed, truncated or not in `method` format.
    #[error("failed to decompress block with {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: io::Error,
    },

    /// The block decoded cleanly but its content does not match the checksum
    /// recorded when it was written.
    #[error("checksum verification failed for block: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// The external process outlived its deadline. `output` is whatever had
    /// been captured when the deadline passed and may be incomplete.
    #[error("timeout executing: {command}, output {output}")]
    Timeout { command: String, output: String },

    /// The external process could not be started or exited unsuccessfully.
    #[error("failed to execute: {command}, output {output}, error {source}")]
    Execution {
        command: String,
        output: String,
        #[source]
        source: io::Error,
    },

    /// The mount probe could not tell whether `path` is a mount point.
    #[error("failed to determine mount state of {}: {source}", path.display())]
    MountProbe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The filesystem backing a mounted `path` could not be resolved.
    #[error("failed to get mount for {}: {source}", path.display())]
    MountLookup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A mount of the wrong kind was found at `path` and could not be removed.
    #[error("failed to unmount mountpoint {} ({fs_type}) for {kind} protocol: {source}", path.display())]
    StaleMountCleanup {
        path: PathBuf,
        fs_type: String,
        kind: String,
        #[source]
        source: Box<Error>,
    },

    /// Unmount reported success but `path` is still a mount point.
    #[error("failed to unmount path {}: still mounted", path.display())]
    StillMounted { path: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True when an external command ran out of time rather than failing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True when stored bytes are known to be bad, either undecodable or not
    /// matching their checksum.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::IntegrityMismatch { .. })
    }
}
