//! `fuser::Filesystem` binding for the router.
//!
//! Every request is translated from inode numbers to a path, answered by the
//! [`Router`], and translated back. No file content is cached here.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::os::raw::c_int;
use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, Request,
};
use nix::unistd::{getgid, getuid};
use tracing::debug;

use crate::attr::{kind_to_fuser, EntryKind, BLOCK_SIZE};
use crate::error::{PxeBootError, Result};
use crate::inode::{join_path, parent_path, InodeId, InodeTable};
use crate::router::Router;

/// Settings of the FUSE binding.
#[derive(Debug, Clone)]
pub struct PxeBootFsConfig {
    /// Owner reported for every entry.
    pub uid: u32,
    /// Group reported for every entry.
    pub gid: u32,
    /// Kernel attribute cache lifetime.
    pub attr_timeout: Duration,
    /// Kernel name cache lifetime.
    pub entry_timeout: Duration,
    /// Bypass the page cache so every read reaches the router.
    pub direct_io: bool,
}

impl Default for PxeBootFsConfig {
    fn default() -> Self {
        Self {
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
            attr_timeout: Duration::from_secs(1),
            entry_timeout: Duration::from_secs(1),
            direct_io: true,
        }
    }
}

/// One directory entry as handed to the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Inode number.
    pub ino: InodeId,
    /// Offset of the next entry.
    pub offset: i64,
    /// Entry type.
    pub kind: fuser::FileType,
    /// Entry name.
    pub name: String,
}

/// The mounted filesystem: an inode table in front of a [`Router`].
pub struct PxeBootFs {
    config: PxeBootFsConfig,
    router: Arc<Router>,
    inodes: InodeTable,
    mount_time: SystemTime,
}

impl PxeBootFs {
    /// Filesystem serving `router`.
    pub fn new(config: PxeBootFsConfig, router: Arc<Router>) -> Self {
        Self {
            config,
            router,
            inodes: InodeTable::new(),
            mount_time: SystemTime::now(),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &PxeBootFsConfig {
        &self.config
    }

    fn path_of(&self, ino: InodeId) -> Result<String> {
        self.inodes
            .path(ino)
            .map(str::to_string)
            .ok_or_else(|| PxeBootError::not_found(&format!("inode {}", ino)))
    }

    fn fuser_attr(&self, ino: InodeId, path: &str) -> Result<fuser::FileAttr> {
        let attr = self.router.getattr(path)?;
        Ok(attr.to_fuser(ino, self.config.uid, self.config.gid, self.mount_time))
    }

    /// Resolve `name` under `parent`, counting one kernel reference.
    pub fn lookup_entry(&mut self, parent: InodeId, name: &OsStr) -> Result<fuser::FileAttr> {
        let name = name.to_str().ok_or_else(|| PxeBootError::not_found("<non-utf8>"))?;
        let parent_path = self.path_of(parent)?;
        let path = join_path(&parent_path, name);
        // classify before allocating so misses do not grow the table
        self.router.getattr(&path)?;
        let ino = self.inodes.lookup(&path);
        self.fuser_attr(ino, &path)
    }

    /// Attributes of a known inode.
    pub fn attr_of(&self, ino: InodeId) -> Result<fuser::FileAttr> {
        let path = self.path_of(ino)?;
        self.fuser_attr(ino, &path)
    }

    /// Entries of a directory from `offset` on. Unreferenced inodes of children
        /// that are no longer listed are forgotten.
    pub fn list_dir(&mut self, ino: InodeId, offset: i64) -> Result<Vec<ListedEntry>> {
        let path = self.path_of(ino)?;
        let entries = self.router.readdir(&path)?;
        let names: HashSet<String> = entries.iter().map(|e| e.name.clone()).collect();
        self.inodes.prune_children(&path, |name| names.contains(name));

        let mut listed = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            let entry_ino = match entry.name.as_str() {
                "." => ino,
                ".." => self.inodes.ino_for(parent_path(&path)),
                name => self.inodes.ino_for(&join_path(&path, name)),
            };
            listed.push(ListedEntry {
                ino: entry_ino,
                offset: idx as i64 + 1,
                kind: kind_to_fuser(entry.kind),
                name: entry.name,
            });
        }
        Ok(listed)
    }

    /// Reply flags for opening a node file.
    pub fn open_flags(&self, ino: InodeId) -> Result<u32> {
        let path = self.path_of(ino)?;
        self.router.open(&path)?;
        Ok(if self.config.direct_io {
            fuser::consts::FOPEN_DIRECT_IO
        } else {
            0
        })
    }

    /// Bytes of a node file; provisions the node.
    pub fn read_data(&self, ino: InodeId, offset: i64, size: u32) -> Result<Vec<u8>> {
        let path = self.path_of(ino)?;
        self.router.read(&path, size, offset.max(0) as u64)
    }

    /// Target of a `by-ip` symlink.
    pub fn link_target(&self, ino: InodeId) -> Result<Vec<u8>> {
        let path = self.path_of(ino)?;
        Ok(self.router.readlink(&path).as_os_str().as_bytes().to_vec())
    }
}

impl Filesystem for PxeBootFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> std::result::Result<(), c_int> {
        self.mount_time = SystemTime::now();
        debug!("pxebootfs init");
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("lookup parent={} name={}", parent, name.to_string_lossy());
        match self.lookup_entry(parent, name) {
            Ok(attr) => reply.entry(&self.config.entry_timeout, &attr, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        debug!("forget ino={} nlookup={}", ino, nlookup);
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!("getattr ino={}", ino);
        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&self.config.attr_timeout, &attr),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        debug!("readlink ino={}", ino);
        match self.link_target(ino) {
            Ok(target) => reply.data(&target),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("open ino={} flags={}", ino, flags);
        match self.open_flags(ino) {
            Ok(open_flags) => reply.opened(0, open_flags),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read ino={} offset={} size={}", ino, offset, size);
        match self.read_data(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("release fh={}", fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir ino={}", ino);
        match self.attr_of(ino) {
            Ok(attr) if attr.kind == kind_to_fuser(EntryKind::Directory) => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir ino={} offset={}", ino, offset);
        match self.list_dir(ino, offset) {
            Ok(entries) => {
                for entry in entries {
                    if reply.add(entry.ino, entry.offset, entry.kind, &entry.name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        debug!("releasedir");
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        debug!("statfs");
        reply.statfs(0, 0, 0, self.inodes.len() as u64, 0, BLOCK_SIZE, 255, BLOCK_SIZE);
    }
}
