//! NFS export filesystem identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default first fsid handed out when the config does not set one.
pub const DEFAULT_START_FSID: u64 = 100_000;

/// Hands out a fresh `fsid=` value for every export issued by this process.
///
/// The sequence restarts from the seed on restart; `exportfs` scopes fsids to
/// the running NFS server, so uniqueness is only needed per process.
#[derive(Debug)]
pub struct FsidAllocator {
    next: AtomicU64,
}

impl FsidAllocator {
    /// Allocator whose first value is `start`.
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Take the next fsid.
    pub fn next_fsid(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Value the next call to [`next_fsid`](Self::next_fsid) will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for FsidAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_START_FSID)
    }
}
