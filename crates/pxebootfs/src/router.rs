//! Path-level view of the filesystem.
//!
//! ```text
//! /                      directory: by-ip + one file per active node
//! /by-ip                 directory: one symlink per active node
//! /by-ip/<a.b.c.d>       symlink -> <node_dir>/<ID>
//! /<ID>                  pxelinux config; reading it provisions the node
//! ```
//!
//! Reading `/<ID>` composes two steps: `NodeManager::provision` (effects) then
//! `Template::render` (pure). A provisioning failure is a read error, never
//! file content.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::attr::{EntryAttr, EntryKind};
use crate::error::{PxeBootError, Result};
use crate::node::NodeManager;
use crate::node_id::{is_node_name, parse_dotted_quad, NodeId};
use crate::template::Template;

/// Name of the address-indexed directory.
pub const BY_IP: &str = "by-ip";

/// What a request path refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`.
    Root,
    /// `/by-ip`.
    ByIpDir,
    /// `/by-ip/<a.b.c.d>`.
    ByIpLink(Ipv4Addr),
    /// A name of node-file shape. It may still fail to decode.
    NodeFile(String),
    /// Anything else.
    NotFound,
}

/// Classify a request path.
pub fn classify(path: &str) -> Route {
    if path == "/" {
        return Route::Root;
    }
    if path == "/by-ip" {
        return Route::ByIpDir;
    }
    if let Some(addr) = path.strip_prefix("/by-ip/") {
        return match parse_dotted_quad(addr) {
            Some(ip) => Route::ByIpLink(ip),
            None => Route::NotFound,
        };
    }
    match path.strip_prefix('/') {
        Some(name) if is_node_name(name) => Route::NodeFile(name.to_string()),
        _ => Route::NotFound,
    }
}

/// One name in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name.
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
}

impl DirEntry {
    fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Answers filesystem requests by path.
pub struct Router {
    template: Arc<Template>,
    nodes: Arc<NodeManager>,
}

impl Router {
    /// Router rendering `template` and provisioning through `nodes`.
    pub fn new(template: Arc<Template>, nodes: Arc<NodeManager>) -> Self {
        Self { template, nodes }
    }

    /// Template in use.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Node manager in use.
    pub fn nodes(&self) -> &NodeManager {
        &self.nodes
    }

    fn link_target(&self, addr: Ipv4Addr) -> PathBuf {
        self.nodes.node_path(&NodeId::from_addr(addr))
    }

    /// A failed scan of `node_dir` lists no nodes rather than failing the
    /// directory.
    fn active_nodes(&self) -> Vec<NodeId> {
        self.nodes.list_active_nodes().unwrap_or_else(|e| {
            warn!(
                "cannot list {}: {}",
                self.nodes.layout().node_dir.display(),
                e
            );
            Vec::new()
        })
    }

    /// Attributes of `path`; unmatched paths are not found.
    pub fn getattr(&self, path: &str) -> Result<EntryAttr> {
        match classify(path) {
            Route::Root | Route::ByIpDir => Ok(EntryAttr::directory()),
            Route::ByIpLink(addr) => {
                let target = self.link_target(addr);
                Ok(EntryAttr::symlink(target.as_os_str().len() as u64))
            }
            Route::NodeFile(_) => Ok(EntryAttr::node_file(self.template.rendered_len())),
            Route::NotFound => Err(PxeBootError::not_found(path)),
        }
    }

    /// Directory listing including `.` and `..`. Listing either directory
    /// sweeps stale mount points.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut entries = vec![
            DirEntry::new(".", EntryKind::Directory),
            DirEntry::new("..", EntryKind::Directory),
        ];

        match classify(path) {
            Route::Root => {
                entries.push(DirEntry::new(BY_IP, EntryKind::Directory));
                for id in self.active_nodes() {
                    entries.push(DirEntry::new(id.as_hex(), EntryKind::RegularFile));
                }
            }
            Route::ByIpDir => {
                for id in self.active_nodes() {
                    entries.push(DirEntry::new(id.to_ip().to_string(), EntryKind::Symlink));
                }
            }
            _ => {}
        }

        Ok(entries)
    }

    /// Shape check only; nothing is allocated.
    pub fn open(&self, path: &str) -> Result<()> {
        match classify(path) {
            Route::NodeFile(_) => Ok(()),
            Route::NotFound => Err(PxeBootError::not_found(path)),
            _ => Err(PxeBootError::InvalidArgument {
                msg: format!("not a node file: {}", path),
            }),
        }
    }

    /// Provision the node named by `path`, then return `size` bytes of its
    /// rendered config starting at `offset`.
    pub fn read(&self, path: &str, size: u32, offset: u64) -> Result<Vec<u8>> {
        let Route::NodeFile(name) = classify(path) else {
            return Ok(Vec::new());
        };
        let id: NodeId = name.parse()?;

        if let Err(e) = self.nodes.provision(&id) {
            error!("provisioning {} ({}) failed: {}", id, id.to_ip(), e);
            return Err(PxeBootError::Provision {
                node: id.as_hex(),
                source: Box::new(e),
            });
        }

        let data = self.template.render(&id);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(size as usize).min(data.len());
        debug!("read {} offset={} size={} -> {} bytes", path, offset, size, end - start);
        Ok(data[start..end].to_vec())
    }

    /// Symlink target, or `.` for anything that is not a `by-ip` link.
    pub fn readlink(&self, path: &str) -> PathBuf {
        match classify(path) {
            Route::ByIpLink(addr) => self.link_target(addr),
            _ => PathBuf::from("."),
        }
    }
}
