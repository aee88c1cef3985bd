//! In-process stand-ins for the mount and export subsystems.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tempfile::TempDir;

use crate::error::{PxeBootError, Result};
use crate::export::{ExportOptions, Exporter};
use crate::node::NodeLayout;
use crate::union::UnionMounter;

/// Temporary node/overlay/root directories.
pub struct TestLayout {
    dir: TempDir,
}

impl TestLayout {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["nodes", "overlay", "root"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn node_dir(&self) -> PathBuf {
        self.dir.path().join("nodes")
    }

    pub fn overlay_dir(&self) -> PathBuf {
        self.dir.path().join("overlay")
    }

    pub fn root_dir(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    pub fn layout(&self) -> NodeLayout {
        NodeLayout {
            node_dir: self.node_dir(),
            overlay_dir: self.overlay_dir(),
            root_dir: self.root_dir(),
        }
    }
}

/// Records mounts and reports those paths as mounted.
#[derive(Default)]
pub struct FakeMounter {
    mounted: Mutex<HashSet<PathBuf>>,
    mounts: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
    delay: Mutex<Duration>,
    fail: AtomicBool,
}

impl FakeMounter {
    pub fn mounts(&self) -> Vec<(PathBuf, PathBuf, PathBuf)> {
        self.mounts.lock().unwrap().clone()
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.lock().unwrap().len()
    }

    pub fn unmount(&self, path: &Path) {
        self.mounted.lock().unwrap().remove(path);
    }

    pub fn set_mount_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_mounts(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl UnionMounter for FakeMounter {
    fn is_mounted(&self, path: &Path) -> Result<bool> {
        Ok(self.mounted.lock().unwrap().contains(path))
    }

    fn mount(&self, root: &Path, overlay: &Path, mountpoint: &Path) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PxeBootError::MountFailed {
                mountpoint: mountpoint.to_path_buf(),
                reason: "unknown filesystem type 'aufs'".to_string(),
            });
        }
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.mounts.lock().unwrap().push((
            root.to_path_buf(),
            overlay.to_path_buf(),
            mountpoint.to_path_buf(),
        ));
        self.mounted.lock().unwrap().insert(mountpoint.to_path_buf());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedExport {
    pub mountpoint: PathBuf,
    pub client: Ipv4Addr,
    pub options: ExportOptions,
}

#[derive(Default)]
pub struct FakeExporter {
    exports: Mutex<Vec<RecordedExport>>,
    fail: AtomicBool,
}

impl FakeExporter {
    pub fn exports(&self) -> Vec<RecordedExport> {
        self.exports.lock().unwrap().clone()
    }

    pub fn fail_exports(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Exporter for FakeExporter {
    fn export(&self, mountpoint: &Path, client: Ipv4Addr, options: &ExportOptions) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PxeBootError::ExportFailed {
                mountpoint: mountpoint.to_path_buf(),
                client: client.to_string(),
                reason: "exportfs: Failed to stat".to_string(),
            });
        }
        self.exports.lock().unwrap().push(RecordedExport {
            mountpoint: mountpoint.to_path_buf(),
            client,
            options: options.clone(),
        });
        Ok(())
    }
}
