//! Inode numbering for path-addressed entries.
//!
//! The kernel speaks inode numbers; the router speaks paths. Numbers are
//! handed out on first sight of a path and dropped once the kernel forgets
//! them. `/` and `/by-ip` are fixed.

use std::collections::HashMap;

/// Kernel inode number.
pub type InodeId = u64;
/// Inode of `/`.
pub const ROOT_INODE: InodeId = 1;
/// Inode of `/by-ip`.
pub const BY_IP_INODE: InodeId = 2;

#[derive(Debug, Clone)]
struct InodeEntry {
    path: String,
    lookup_count: u64,
    pinned: bool,
}

/// Two-way map between inode numbers and paths.
pub struct InodeTable {
    entries: HashMap<InodeId, InodeEntry>,
    by_path: HashMap<String, InodeId>,
    next_ino: InodeId,
}

/// Join a directory path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent directory of `path`; the root is its own parent.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

impl InodeTable {
    /// Table holding only the fixed inodes.
    pub fn new() -> Self {
        let mut table = InodeTable {
            entries: HashMap::new(),
            by_path: HashMap::new(),
            next_ino: BY_IP_INODE + 1,
        };
        table.pin(ROOT_INODE, "/");
        table.pin(BY_IP_INODE, "/by-ip");
        table
    }

    fn pin(&mut self, ino: InodeId, path: &str) {
        self.entries.insert(
            ino,
            InodeEntry {
                path: path.to_string(),
                lookup_count: 1,
                pinned: true,
            },
        );
        self.by_path.insert(path.to_string(), ino);
    }

    /// Path of `ino`.
    pub fn path(&self, ino: InodeId) -> Option<&str> {
        self.entries.get(&ino).map(|e| e.path.as_str())
    }

    /// Path of `name` under `parent`.
    pub fn child_path(&self, parent: InodeId, name: &str) -> Option<String> {
        self.path(parent).map(|p| join_path(p, name))
    }

    /// Inode for `path`, allocating one if needed, without counting a lookup.
    pub fn ino_for(&mut self, path: &str) -> InodeId {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.entries.insert(
            ino,
            InodeEntry {
                path: path.to_string(),
                lookup_count: 0,
                pinned: false,
            },
        );
        self.by_path.insert(path.to_string(), ino);
        ino
    }

    /// Inode for `path` with one more kernel reference.
    pub fn lookup(&mut self, path: &str) -> InodeId {
        let ino = self.ino_for(path);
        if let Some(entry) = self.entries.get_mut(&ino) {
            entry.lookup_count += 1;
        }
        ino
    }

    /// Drop `n` kernel references; the inode goes away at zero.
    pub fn forget(&mut self, ino: InodeId, n: u64) {
        let remove = match self.entries.get_mut(&ino) {
            Some(entry) if !entry.pinned => {
                entry.lookup_count = entry.lookup_count.saturating_sub(n);
                entry.lookup_count == 0
            }
            _ => false,
        };
        if remove {
            if let Some(entry) = self.entries.remove(&ino) {
                self.by_path.remove(&entry.path);
            }
        }
    }

    /// Drop children of `dir` the kernel holds no reference to and that
    /// `keep` rejects.
    pub fn prune_children(&mut self, dir: &str, keep: impl Fn(&str) -> bool) {
        let stale: Vec<InodeId> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.pinned && e.lookup_count == 0)
            .filter(|(_, e)| e.path != dir && parent_path(&e.path) == dir)
            .filter(|(_, e)| !keep(e.path.rsplit('/').next().unwrap_or_default()))
            .map(|(&ino, _)| ino)
            .collect();
        for ino in stale {
            if let Some(entry) = self.entries.remove(&ino) {
                self.by_path.remove(&entry.path);
            }
        }
    }

    /// Number of live inodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the fixed inodes stay.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_inodes() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INODE), Some("/"));
        assert_eq!(table.path(BY_IP_INODE), Some("/by-ip"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join_path("/", "C0A80101"), "/C0A80101");
        assert_eq!(join_path("/by-ip", "10.0.0.1"), "/by-ip/10.0.0.1");
        assert_eq!(parent_path("/by-ip/10.0.0.1"), "/by-ip");
        assert_eq!(parent_path("/C0A80101"), "/");
        assert_eq!(parent_path("/"), "/");
    }

    #[test]
    fn test_child_path() {
        let table = InodeTable::new();
        assert_eq!(
            table.child_path(BY_IP_INODE, "10.0.0.1").as_deref(),
            Some("/by-ip/10.0.0.1")
        );
        assert_eq!(table.child_path(999, "x"), None);
    }

    #[test]
    fn test_lookup_is_stable() {
        let mut table = InodeTable::new();
        let a = table.lookup("/C0A80101");
        let b = table.lookup("/C0A80101");
        assert_eq!(a, b);
        assert!(a > BY_IP_INODE);
        assert_eq!(table.lookup("/"), ROOT_INODE);
    }

    #[test]
    fn test_forget_drops_after_last_reference() {
        let mut table = InodeTable::new();
        let ino = table.lookup("/C0A80101");
        table.lookup("/C0A80101");

        table.forget(ino, 1);
        assert_eq!(table.path(ino), Some("/C0A80101"));

        table.forget(ino, 1);
        assert_eq!(table.path(ino), None);

        let again = table.lookup("/C0A80101");
        assert_ne!(again, ino);
    }

    #[test]
    fn test_forget_never_drops_pinned() {
        let mut table = InodeTable::new();
        table.forget(ROOT_INODE, 100);
        table.forget(BY_IP_INODE, 100);
        assert_eq!(table.path(ROOT_INODE), Some("/"));
        assert_eq!(table.path(BY_IP_INODE), Some("/by-ip"));
    }

    #[test]
    fn test_ino_for_does_not_count_lookup() {
        let mut table = InodeTable::new();
        let ino = table.ino_for("/0A000001");
        assert_eq!(table.lookup("/0A000001"), ino);
        table.forget(ino, 1);
        assert_eq!(table.path(ino), None);
    }

    #[test]
    fn test_prune_children_spares_referenced_and_kept() {
        let mut table = InodeTable::new();
        let referenced = table.lookup("/0A000001");
        let listed = table.ino_for("/0A000002");
        let gone = table.ino_for("/0A000003");
        let other_dir = table.ino_for("/by-ip/10.0.0.3");

        table.prune_children("/", |name| name == "0A000002");

        assert_eq!(table.path(referenced), Some("/0A000001"));
        assert_eq!(table.path(listed), Some("/0A000002"));
        assert_eq!(table.path(gone), None);
        assert_eq!(table.path(other_dir), Some("/by-ip/10.0.0.3"));
        assert_eq!(table.path(BY_IP_INODE), Some("/by-ip"));
    }
}
