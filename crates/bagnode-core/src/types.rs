use indexmap::{IndexMap, IndexSet};
use std::{fmt, sync::Arc};

/// Topics discovered on the graph, each with the ordered set of types
/// it was advertised with.
pub type TopicTypeTable = IndexMap<String, IndexSet<String>>;

/// Topics paired with their single message type.
pub type TopicTypes = IndexMap<String, String>;

/// The callback invoked with every message a subscription receives.
pub type MessageCallback = Arc<dyn Fn(Arc<SerializedMessage>) + Send + Sync>;

/// Globally unique identity of a publisher on the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gid([u8; 16]);

impl Gid {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Builds a gid from a participant id and a per-participant
    /// endpoint counter.
    pub fn from_parts(participant: u64, endpoint: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&participant.to_be_bytes());
        bytes[8..].copy_from_slice(&endpoint.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gid(")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// An opaque serialized message buffer.
///
/// The payload is never interpreted here; it is handed as-is between
/// publishers, the transport and subscription callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SerializedMessage {
    pub data: Vec<u8>,
}

impl SerializedMessage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for SerializedMessage {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for SerializedMessage {
    fn from(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

/// Locates a message stored in an intra-process manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntraProcessNotice {
    pub publisher_id: u64,
    pub sequence: u64,
}

/// Metadata accompanying a message delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Identity of the originating publisher.
    pub publisher_gid: Gid,

    /// Set when the publisher also stored the message in its
    /// intra-process manager.
    pub intra_process: Option<IntraProcessNotice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gid_from_parts_is_unique_per_endpoint() {
        let a = Gid::from_parts(1, 1);
        let b = Gid::from_parts(1, 2);
        let c = Gid::from_parts(2, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Gid::from_parts(1, 1));
    }

    #[test]
    fn test_gid_debug_is_hex() {
        let gid = Gid::from_parts(0, 255);
        assert_eq!(format!("{gid:?}"), "Gid(000000000000000000000000000000ff)");
    }
}
