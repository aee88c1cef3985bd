//! Union mounts of the shared root with a per-node overlay.
//!
//! Mounting is done by `mount(8)`. Mount state is never cached; it is read
//! back from the filesystem each time so that mounts made or removed outside
//! this process are seen.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::CommandRunner;
use crate::error::{PxeBootError, Result};

/// Union filesystem used for node roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnionFsKind {
    /// aufs branches: overlay rw over root ro.
    #[default]
    Aufs,
    /// overlayfs with `upper` and `work` under the node's overlay.
    Overlay,
}

/// The mount subsystem as seen by the node manager.
pub trait UnionMounter: Send + Sync {
    /// Whether `path` is currently a mount point.
    fn is_mounted(&self, path: &Path) -> Result<bool>;

    /// Mount `root` read-only under `overlay` read-write at `mountpoint`.
    fn mount(&self, root: &Path, overlay: &Path, mountpoint: &Path) -> Result<()>;
}

/// True if `path` is the root of a mounted filesystem: it lives on a
/// different device than its parent, or it is its own parent.
pub fn is_mount_point(path: &Path) -> std::io::Result<bool> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(false);
    }
    let parent = std::fs::metadata(path.join(".."))?;
    Ok(meta.dev() != parent.dev() || meta.ino() == parent.ino())
}

/// `mount` argument vector for the given union filesystem.
pub fn mount_args(kind: UnionFsKind, root: &Path, overlay: &Path, mountpoint: &Path) -> Vec<String> {
    match kind {
        UnionFsKind::Aufs => vec![
            "-t".to_string(),
            "aufs".to_string(),
            "-o".to_string(),
            format!("br:{}=rw:{}=ro", overlay.display(), root.display()),
            "none".to_string(),
            mountpoint.display().to_string(),
        ],
        UnionFsKind::Overlay => vec![
            "-t".to_string(),
            "overlay".to_string(),
            "overlay".to_string(),
            "-o".to_string(),
            format!(
                "lowerdir={},upperdir={},workdir={}",
                root.display(),
                overlay.join("upper").display(),
                overlay.join("work").display()
            ),
            mountpoint.display().to_string(),
        ],
    }
}

/// Mounts through `mount(8)`.
pub struct CommandMounter {
    kind: UnionFsKind,
    runner: CommandRunner,
}

impl CommandMounter {
    /// Mounter for `kind` using `runner`.
    pub fn new(kind: UnionFsKind, runner: CommandRunner) -> Self {
        Self { kind, runner }
    }

    /// Configured union filesystem.
    pub fn kind(&self) -> UnionFsKind {
        self.kind
    }
}

impl UnionMounter for CommandMounter {
    fn is_mounted(&self, path: &Path) -> Result<bool> {
        match is_mount_point(path) {
            Ok(mounted) => Ok(mounted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn mount(&self, root: &Path, overlay: &Path, mountpoint: &Path) -> Result<()> {
        if self.kind == UnionFsKind::Overlay {
            for sub in ["upper", "work"] {
                match std::fs::create_dir(overlay.join(sub)) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let args = mount_args(self.kind, root, overlay, mountpoint);
        self.runner
            .run("mount", &args)
            .map_err(|e| PxeBootError::MountFailed {
                mountpoint: mountpoint.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!(
            "mounted {:?} {} + {} at {}",
            self.kind,
            root.display(),
            overlay.display(),
            mountpoint.display()
        );
        Ok(())
    }
}
