//! NFS publication of node mount points via `exportfs(8)`.

use std::net::Ipv4Addr;
use std::path::Path;

use tracing::info;

use crate::command::CommandRunner;
use crate::error::{PxeBootError, Result};

/// Options for a single-client export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Export `ro` instead of `rw`.
    pub read_only: bool,
    /// Map the client's root to nobody.
    pub root_squash: bool,
    /// Value of `fsid=`.
    pub fsid: u64,
}

impl ExportOptions {
    /// Node roots are writable and the client's root stays root.
    pub fn node_root(fsid: u64) -> Self {
        Self {
            read_only: false,
            root_squash: false,
            fsid,
        }
    }

    /// The `-o` value passed to exportfs.
    pub fn to_option_string(&self) -> String {
        format!(
            "{},{},fsid={}",
            if self.read_only { "ro" } else { "rw" },
            if self.root_squash {
                "root_squash"
            } else {
                "no_root_squash"
            },
            self.fsid
        )
    }
}

/// The export subsystem as seen by the node manager.
pub trait Exporter: Send + Sync {
    /// Export `mountpoint` to exactly `client`.
    fn export(&self, mountpoint: &Path, client: Ipv4Addr, options: &ExportOptions) -> Result<()>;
}

/// `exportfs` argument vector for one client.
pub fn exportfs_args(mountpoint: &Path, client: Ipv4Addr, options: &ExportOptions) -> Vec<String> {
    vec![
        "-o".to_string(),
        options.to_option_string(),
        format!("{}:{}", client, mountpoint.display()),
    ]
}

/// Exports through `exportfs(8)`.
pub struct ExportFs {
    runner: CommandRunner,
}

impl ExportFs {
    /// Exporter using `runner`.
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

impl Exporter for ExportFs {
    fn export(&self, mountpoint: &Path, client: Ipv4Addr, options: &ExportOptions) -> Result<()> {
        let args = exportfs_args(mountpoint, client, options);
        self.runner
            .run("exportfs", &args)
            .map_err(|e| PxeBootError::ExportFailed {
                mountpoint: mountpoint.to_path_buf(),
                client: client.to_string(),
                reason: e.to_string(),
            })?;
        info!(
            "exported {} to {} fsid={}",
            mountpoint.display(),
            client,
            options.fsid
        );
        Ok(())
    }
}
