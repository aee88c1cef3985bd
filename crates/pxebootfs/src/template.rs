//! pxelinux.cfg template rendering.

use std::path::Path;

use tracing::debug;

use crate::error::{PxeBootError, Result};
use crate::node_id::{NodeId, NODE_ID_LEN};

/// Token replaced by the client identifier.
pub const NODE_MARKER: &str = "<NODE>";

/// Boot configuration template, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
    rendered_len: u64,
}

impl Template {
    /// Read and validate the template at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PxeBootError::Config {
            msg: format!("cannot read template {}: {}", path.display(), e),
        })?;
        let template = Self::from_text(text)?;
        debug!(
            "loaded template {} rendered_len={}",
            path.display(),
            template.rendered_len
        );
        Ok(template)
    }

    /// Validate in-memory template text. The marker must occur exactly once so
    /// that every rendering has the same length.
    pub fn from_text(text: String) -> Result<Self> {
        match text.matches(NODE_MARKER).count() {
            1 => {}
            0 => {
                return Err(PxeBootError::Config {
                    msg: format!("could not find {} in PXE config template", NODE_MARKER),
                })
            }
            n => {
                return Err(PxeBootError::Config {
                    msg: format!(
                        "{} appears {} times in PXE config template, expected once",
                        NODE_MARKER, n
                    ),
                })
            }
        }
        let rendered_len = (text.len() - NODE_MARKER.len() + NODE_ID_LEN) as u64;
        Ok(Self { text, rendered_len })
    }

    /// Size reported for every per-client file.
    pub fn rendered_len(&self) -> u64 {
        self.rendered_len
    }

    /// Template text with the marker replaced by `id`.
    pub fn render(&self, id: &NodeId) -> Vec<u8> {
        self.text.replace(NODE_MARKER, &id.as_hex()).into_bytes()
    }
}
