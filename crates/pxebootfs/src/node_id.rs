//! Client identifiers.
//!
//! pxelinux asks for its configuration by the client's IPv4 address written
//! as eight uppercase hex digits (`192.168.1.1` -> `C0A80101`). The same token
//! names the client's mount point and overlay directories on disk.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PxeBootError, Result};

/// Length of every identifier, two hex digits per octet.
pub const NODE_ID_LEN: usize = 8;

static NODE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{8}$").expect("static regex"));

/// Returns true if `name` has the shape of a per-client config file name.
///
/// This is the routing check only. A name can have the right shape and still
/// not decode (`ZZZZZZZZ`).
pub fn is_node_name(name: &str) -> bool {
    NODE_NAME_RE.is_match(name)
}

/// Parse `a.b.c.d` where each octet is decimal and at most 255. Leading
/// zeros are accepted (`192.168.001.001`), unlike `Ipv4Addr::from_str`.
pub fn parse_dotted_quad(addr: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = addr.split('.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// Canonical identifier of a PXE client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Identifier of `addr`.
    pub fn from_addr(addr: Ipv4Addr) -> Self {
        NodeId(u32::from(addr))
    }

    /// Encode a dotted quad.
    pub fn from_ip(addr: &str) -> Result<Self> {
        parse_dotted_quad(addr)
            .map(Self::from_addr)
            .ok_or_else(|| PxeBootError::InvalidAddress {
                addr: addr.to_string(),
            })
    }

    /// Decode back to the client address.
    pub fn to_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.0)
    }

    /// The on-disk and on-path form.
    pub fn as_hex(&self) -> String {
        format!("{:08X}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = PxeBootError;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == NODE_ID_LEN
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b));
        if !valid {
            return Err(PxeBootError::InvalidArgument {
                msg: format!("not a node identifier: {}", s),
            });
        }
        u32::from_str_radix(s, 16)
            .map(NodeId)
            .map_err(|e| PxeBootError::InvalidArgument {
                msg: format!("not a node identifier: {}: {}", s, e),
            })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_address() {
        let id = NodeId::from_ip("192.168.1.1").unwrap();
        assert_eq!(id.as_hex(), "C0A80101");
    }

    #[test]
    fn test_decode_known_identifier() {
        let id: NodeId = "C0A80101".parse().unwrap();
        assert_eq!(id.to_ip(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(id.to_ip().to_string(), "192.168.1.1");
    }

    #[test]
    fn test_encode_accepts_leading_zeros() {
        let id = NodeId::from_ip("192.168.001.001").unwrap();
        assert_eq!(id.as_hex(), "C0A80101");
        assert_eq!(parse_dotted_quad("010.000.000.005"), Some(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn test_dotted_quad_rejects_malformed() {
        for addr in ["", "1.2.3", "1.2.3.4.5", "1..3.4", "1.2.3.256", "1.2.3.0256", "+1.2.3.4", "1.2.3.4 "] {
            assert_eq!(parse_dotted_quad(addr), None, "{:?}", addr);
        }
    }

    #[test]
    fn test_encode_pads_small_octets() {
        let id = NodeId::from_ip("10.0.0.5").unwrap();
        assert_eq!(id.to_string(), "0A000005");
    }

    #[test]
    fn test_encode_extremes() {
        assert_eq!(NodeId::from_ip("0.0.0.0").unwrap().as_hex(), "00000000");
        assert_eq!(
            NodeId::from_ip("255.255.255.255").unwrap().as_hex(),
            "FFFFFFFF"
        );
    }

    #[test]
    fn test_encode_rejects_non_numeric_segment() {
        let result = NodeId::from_ip("192.168.one.1");
        assert!(matches!(result, Err(PxeBootError::InvalidAddress { .. })));
    }

    #[test]
    fn test_encode_rejects_wrong_segment_count() {
        assert!(NodeId::from_ip("192.168.1").is_err());
        assert!(NodeId::from_ip("192.168.1.1.1").is_err());
        assert!(NodeId::from_ip("").is_err());
    }

    #[test]
    fn test_encode_rejects_octet_overflow() {
        assert!(NodeId::from_ip("192.168.1.300").is_err());
    }

    #[test]
    fn test_decode_rejects_lowercase() {
        assert!("c0a80101".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_decode_rejects_non_hex_letters() {
        assert!("ZZZZZZZZ".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!("C0A801".parse::<NodeId>().is_err());
        assert!("C0A8010101".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_is_node_name_shape() {
        assert!(is_node_name("C0A80101"));
        assert!(is_node_name("ZZZZZZZZ"));
        assert!(!is_node_name("c0a80101"));
        assert!(!is_node_name("C0A8010"));
        assert!(!is_node_name("by-ip"));
        assert!(!is_node_name("default"));
    }

    #[test]
    fn test_ids_sort_by_address() {
        let mut ids = vec![
            NodeId::from_ip("10.0.0.2").unwrap(),
            NodeId::from_ip("10.0.0.1").unwrap(),
        ];
        ids.sort();
        assert_eq!(ids[0].to_ip(), Ipv4Addr::new(10, 0, 0, 1));
    }
}
