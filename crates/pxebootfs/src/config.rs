use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::unistd::{access, AccessFlags};
use serde::{Deserialize, Serialize};

use crate::error::{PxeBootError, Result};
use crate::fsid::DEFAULT_START_FSID;
use crate::node::NodeLayout;
use crate::union::UnionFsKind;

/// File name looked up in the working and home directories.
pub const CONFIG_FILE_NAME: &str = "pxebootfs.toml";
/// System-wide config location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pxebootfs/pxebootfs.toml";

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PxeBootConfig {
    /// pxelinux.cfg template containing one `<NODE>` marker.
    pub pxe_template: PathBuf,
    /// Per-client mount points.
    pub node_dir: PathBuf,
    /// Shared read-only root image.
    pub root_dir: PathBuf,
    /// Per-client writable layers.
    pub overlay_dir: PathBuf,
    /// First export fsid.
    pub start_fsid: u64,
    /// Union filesystem for node roots.
    pub union_fs: UnionFsKind,
    /// Limit on each mount/exportfs call.
    pub command_timeout_secs: u64,
    /// Open node files with direct I/O.
    pub direct_io: bool,
}

impl Default for PxeBootConfig {
    fn default() -> Self {
        Self {
            pxe_template: PathBuf::from("/etc/pxebootfs/pxelinux.tmpl"),
            node_dir: PathBuf::from("/srv/pxebootfs/nodes"),
            root_dir: PathBuf::from("/srv/pxebootfs/root"),
            overlay_dir: PathBuf::from("/srv/pxebootfs/overlay"),
            start_fsid: DEFAULT_START_FSID,
            union_fs: UnionFsKind::Aufs,
            command_timeout_secs: 30,
            direct_io: true,
        }
    }
}

impl PxeBootConfig {
    /// Parse a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: PxeBootConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: PxeBootConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Config file locations, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(format!(".{}", CONFIG_FILE_NAME)));
        }
        paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));
        paths
    }

    /// Load the first config file found in `paths`.
    pub fn discover(paths: &[PathBuf]) -> anyhow::Result<(PathBuf, Self)> {
        for path in paths {
            if path.is_file() {
                return Ok((path.clone(), Self::from_file(path)?));
            }
        }
        anyhow::bail!(
            "No config file found, looked in: {}",
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    /// Node directories.
    pub fn layout(&self) -> NodeLayout {
        NodeLayout {
            node_dir: self.node_dir.clone(),
            overlay_dir: self.overlay_dir.clone(),
            root_dir: self.root_dir.clone(),
        }
    }

    /// `command_timeout_secs` as a duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(PxeBootError::Config {
                msg: "command_timeout_secs must be > 0".to_string(),
            });
        }
        for (name, dir) in [
            ("node_dir", &self.node_dir),
            ("root_dir", &self.root_dir),
            ("overlay_dir", &self.overlay_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(PxeBootError::Config {
                    msg: format!("{} is empty", name),
                });
            }
        }
        Ok(())
    }

    /// All three directories must exist; nodes and overlays must be readable
    /// and writable by this process.
    pub fn verify_permissions(&self) -> Result<()> {
        for dir in [&self.node_dir, &self.root_dir, &self.overlay_dir] {
            if !dir.is_dir() {
                return Err(PxeBootError::Permission {
                    path: dir.clone(),
                    reason: "directory does not exist".to_string(),
                });
            }
        }
        for dir in [&self.node_dir, &self.overlay_dir] {
            if !can_read_write(dir) {
                return Err(PxeBootError::Permission {
                    path: dir.clone(),
                    reason: "no read/write permission".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn can_read_write(path: &Path) -> bool {
    access(path, AccessFlags::R_OK | AccessFlags::W_OK).is_ok()
}
