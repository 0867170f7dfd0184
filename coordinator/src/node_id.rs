use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

/// Number of random bytes in a node ID.
const ID_BYTES: usize = 16;

/// Unique ID for processes taking part in coordination.
///
/// Node IDs are primarily used for debugging and introspection purposes.
/// They are meant to be used as a way to relate locks, elections and other
/// records back to the process that owns them.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId {
    extra: BTreeMap<String, String>,
    id: String,
}

impl NodeId {
    pub fn new() -> NodeId {
        let bytes: [u8; ID_BYTES] = rand::thread_rng().gen();
        let id = bytes.iter().map(|byte| format!("{:02x}", byte)).collect();
        NodeId {
            extra: BTreeMap::new(),
            id,
        }
    }

    /// Set the extra attributes attached to this node ID.
    pub fn extra(&mut self, extra: BTreeMap<String, String>) {
        self.extra = extra;
    }

    /// Access the extra attributes attached to this node ID.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.extra
    }
}

impl Default for NodeId {
    fn default() -> NodeId {
        NodeId::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::NodeId;

    #[test]
    fn ids_are_unique() {
        let first = NodeId::new();
        let second = NodeId::new();
        assert_ne!(first, second);
    }

    #[test]
    fn display_is_hex_id() {
        let node = NodeId::new();
        let display = node.to_string();
        assert_eq!(display.len(), 32);
        assert!(display.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn json_round_trip_keeps_attributes() {
        let mut node = NodeId::new();
        let mut extra = BTreeMap::new();
        extra.insert("host".to_string(), "worker-1".to_string());
        node.extra(extra);
        let encoded = serde_json::to_vec(&node).unwrap();
        let decoded: NodeId = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.attributes().get("host").unwrap(), "worker-1");
    }
}
