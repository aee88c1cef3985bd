//! Node provisioning.
//!
//! A node is the per-client unit: a mount point under `node_dir`, a private
//! overlay under `overlay_dir`, a union mount of the shared root with that
//! overlay, and an NFS export of the mount point to the client's address.
//! Nothing is tracked in memory; the filesystem is the source of truth.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::export::{ExportOptions, Exporter};
use crate::fsid::FsidAllocator;
use crate::node_id::NodeId;
use crate::union::UnionMounter;

/// The three directories nodes are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    /// Mount points, one per client.
    pub node_dir: PathBuf,
    /// Writable layers, one per client.
    pub overlay_dir: PathBuf,
    /// Shared read-only root.
    pub root_dir: PathBuf,
}

/// Result of a provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Identifier of the client.
    pub id: NodeId,
    /// `node_dir/<ID>`.
    pub mount_point: PathBuf,
    /// `overlay_dir/<ID>`.
    pub overlay: PathBuf,
    /// Shared root the union is built on.
    pub root: PathBuf,
    /// fsid of the export issued by this call.
    pub fsid: u64,
    /// Whether this call performed the union mount.
    pub newly_mounted: bool,
}

/// Creates, mounts, exports and sweeps nodes.
///
/// Work on one identifier is serialized; different identifiers proceed in
/// parallel.
pub struct NodeManager {
    layout: NodeLayout,
    fsids: Arc<FsidAllocator>,
    mounter: Arc<dyn UnionMounter>,
    exporter: Arc<dyn Exporter>,
    locks: DashMap<NodeId, Arc<Mutex<()>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    Mounted,
    Removed,
    Kept,
}

fn ensure_dir(path: &Path) -> std::io::Result<bool> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

impl NodeManager {
    /// Manager over `layout` using the given subsystems.
    pub fn new(
        layout: NodeLayout,
        fsids: Arc<FsidAllocator>,
        mounter: Arc<dyn UnionMounter>,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        Self {
            layout,
            fsids,
            mounter,
            exporter,
            locks: DashMap::new(),
        }
    }

    /// Directories in use.
    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    /// Mount point of `id`.
    pub fn node_path(&self, id: &NodeId) -> PathBuf {
        self.layout.node_dir.join(id.as_hex())
    }

    /// Writable layer of `id`.
    pub fn overlay_path(&self, id: &NodeId) -> PathBuf {
        self.layout.overlay_dir.join(id.as_hex())
    }

    fn node_lock(&self, id: &NodeId) -> Arc<Mutex<()>> {
        self.locks.entry(*id).or_default().clone()
    }

    /// Forget the lock of `id` unless someone else holds or waits on it.
    fn release_lock(&self, id: &NodeId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Nodes whose mount point is live, sorted by address.
    ///
    /// Every plain directory under `node_dir` that is not a mount point is
    /// removed on the way, whatever its name. Mounted entries that do not
    /// decode to a node are skipped.
    pub fn list_active_nodes(&self) -> Result<Vec<NodeId>> {
        let mut active = Vec::new();

        for entry in std::fs::read_dir(&self.layout.node_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let id = file_name.to_str().and_then(|n| n.parse::<NodeId>().ok());

            let Some(id) = id else {
                if self.sweep_entry(&entry) == Sweep::Mounted {
                    debug!("ignoring mounted entry {:?}", file_name);
                }
                continue;
            };

            let lock = self.node_lock(&id);
            let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let outcome = self.sweep_entry(&entry);
            drop(guard);
            drop(lock);

            match outcome {
                Sweep::Mounted => active.push(id),
                Sweep::Removed => self.release_lock(&id),
                Sweep::Kept => {}
            }
        }

        active.sort();
        Ok(active)
    }

    fn sweep_entry(&self, entry: &std::fs::DirEntry) -> Sweep {
        let path = entry.path();
        match self.mounter.is_mounted(&path) {
            Ok(true) => Sweep::Mounted,
            Ok(false) => {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    return Sweep::Kept;
                }
                match std::fs::remove_dir(&path) {
                    Ok(()) => {
                        info!("removed stale mount point {}", path.display());
                        Sweep::Removed
                    }
                    Err(e) => {
                        warn!("cannot remove stale mount point {}: {}", path.display(), e);
                        Sweep::Kept
                    }
                }
            }
            Err(e) => {
                warn!("cannot check mount state of {}: {}", path.display(), e);
                Sweep::Kept
            }
        }
    }

    /// Make sure `id` has a mounted root and export it to the client.
    ///
    /// The mount is skipped when already present; the export is always
    /// reissued with a fresh fsid. A failed step aborts the call without
    /// undoing earlier steps.
    pub fn provision(&self, id: &NodeId) -> Result<Node> {
        let lock = self.node_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mount_point = self.node_path(id);
        let overlay = self.overlay_path(id);

        if ensure_dir(&mount_point)? {
            debug!("created mount point {}", mount_point.display());
        }
        if ensure_dir(&overlay)? {
            debug!("created overlay {}", overlay.display());
        }

        let newly_mounted = if self.mounter.is_mounted(&mount_point)? {
            debug!("{} already mounted", mount_point.display());
            false
        } else {
            self.mounter
                .mount(&self.layout.root_dir, &overlay, &mount_point)?;
            true
        };

        let fsid = self.fsids.next_fsid();
        self.exporter
            .export(&mount_point, id.to_ip(), &ExportOptions::node_root(fsid))?;

        info!(
            "provisioned node {} ({}) fsid={} newly_mounted={}",
            id,
            id.to_ip(),
            fsid,
            newly_mounted
        );

        Ok(Node {
            id: *id,
            mount_point,
            overlay,
            root: self.layout.root_dir.clone(),
            fsid,
            newly_mounted,
        })
    }
}
