use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by pxebootfs.
#[derive(Debug, Error)]
pub enum PxeBootError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or template.
    #[error("Configuration error: {msg}")]
    Config { msg: String },

    /// A required directory is missing or inaccessible.
    #[error("Permission error on {}: {reason}", .path.display())]
    Permission { path: PathBuf, reason: String },

    /// Path outside the namespace.
    #[error("No such entry: {path}")]
    NotFound { path: String },

    /// Not a dotted-quad IPv4 address.
    #[error("Invalid IPv4 address: {addr}")]
    InvalidAddress { addr: String },

    /// Request the entry cannot serve, or a malformed identifier.
    #[error("Invalid argument: {msg}")]
    InvalidArgument { msg: String },

    /// External command could not run or exited non-zero.
    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// External command exceeded its limit and was killed.
    #[error("Command `{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// Union mount of a node root failed.
    #[error("Union mount failed at {}: {reason}", .mountpoint.display())]
    MountFailed { mountpoint: PathBuf, reason: String },

    /// NFS export of a node root failed.
    #[error("Export of {} to {client} failed: {reason}", .mountpoint.display())]
    ExportFailed {
        mountpoint: PathBuf,
        client: String,
        reason: String,
    },

    /// Provisioning failed while serving a read.
    #[error("Provisioning node {node} failed: {source}")]
    Provision {
        node: String,
        #[source]
        source: Box<PxeBootError>,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PxeBootError>;

impl PxeBootError {
    /// errno reported to the kernel.
    pub fn to_errno(&self) -> i32 {
        use libc::*;
        match self {
            PxeBootError::Io(e) => e.raw_os_error().unwrap_or(EIO),
            PxeBootError::Config { .. } => EINVAL,
            PxeBootError::Permission { .. } => EACCES,
            PxeBootError::NotFound { .. } => ENOENT,
            PxeBootError::InvalidAddress { .. } => EINVAL,
            PxeBootError::InvalidArgument { .. } => EINVAL,
            PxeBootError::CommandFailed { .. } => EIO,
            PxeBootError::CommandTimeout { .. } => ETIMEDOUT,
            PxeBootError::MountFailed { .. } => EIO,
            PxeBootError::ExportFailed { .. } => EIO,
            PxeBootError::Provision { .. } => EIO,
        }
    }

    /// [`PxeBootError::NotFound`] for `path`.
    pub fn not_found(path: &str) -> Self {
        PxeBootError::NotFound {
            path: path.to_string(),
        }
    }
}
