use std::time::SystemTime;

/// Size reported for directories.
pub const DIR_SIZE: u64 = 4096;
/// Block size reported to stat and statfs.
pub const BLOCK_SIZE: u32 = 4096;

/// The three kinds of entry the filesystem exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Directory.
    Directory,
    /// Regular file.
    RegularFile,
    /// Symbolic link.
    Symlink,
}

/// Attributes of a virtual entry, independent of inode numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryAttr {
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes.
    pub size: u64,
    /// Permission bits.
    pub perm: u16,
    /// Hard link count.
    pub nlink: u32,
}

impl EntryAttr {
    /// `0755` directory.
    pub fn directory() -> Self {
        EntryAttr {
            kind: EntryKind::Directory,
            size: DIR_SIZE,
            perm: 0o755,
            nlink: 2,
        }
    }

    /// `0666` regular file of `size` bytes.
    pub fn node_file(size: u64) -> Self {
        EntryAttr {
            kind: EntryKind::RegularFile,
            size,
            perm: 0o666,
            nlink: 1,
        }
    }

    /// `0777` symlink whose target is `target_len` bytes long.
    pub fn symlink(target_len: u64) -> Self {
        EntryAttr {
            kind: EntryKind::Symlink,
            size: target_len,
            perm: 0o777,
            nlink: 1,
        }
    }

    /// Convert to the kernel attribute record.
    pub fn to_fuser(&self, ino: u64, uid: u32, gid: u32, time: SystemTime) -> fuser::FileAttr {
        fuser::FileAttr {
            ino,
            size: self.size,
            blocks: blocks_for_size(self.size),
            atime: time,
            mtime: time,
            ctime: time,
            crtime: time,
            kind: kind_to_fuser(self.kind),
            perm: self.perm,
            nlink: self.nlink,
            uid,
            gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

/// Map an [`EntryKind`] to the fuser file type.
pub fn kind_to_fuser(kind: EntryKind) -> fuser::FileType {
    match kind {
        EntryKind::Directory => fuser::FileType::Directory,
        EntryKind::RegularFile => fuser::FileType::RegularFile,
        EntryKind::Symlink => fuser::FileType::Symlink,
    }
}

/// 512-byte blocks, as stat(2) reports them.
pub fn blocks_for_size(size: u64) -> u64 {
    size.div_ceil(512)
}
