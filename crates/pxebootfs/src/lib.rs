#![warn(missing_docs)]

//! pxebootfs: a FUSE view of pxelinux.cfg that provisions a private,
//! NFS-exported root filesystem for each PXE client on first read.

/// Entry attributes.
pub mod attr;
/// Command line.
pub mod cli;
pub mod command;
/// Daemon configuration.
pub mod config;
/// Error type and errno mapping.
pub mod error;
pub mod export;
pub mod filesystem;
pub mod fsid;
pub mod inode;
pub mod node;
pub mod node_id;
pub mod router;
pub mod server;
pub mod template;
pub mod union;

#[cfg(test)]
mod testing;

pub use error::{PxeBootError, Result};
