//! # Persistence Format
//!
//! Binary serialization of the in-memory store.
//!
//! Format: Header (5 bytes) + postcard-serialized `MemoryGraph`.
//! - 4 bytes: Magic ("DSSR")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is parsed, so a
//! corrupted or hostile file fails fast without large allocations.

use crate::graph::MemoryGraph;
use crate::{DossierError, primitives};

/// Maximum allowed payload size for a store file (500 MB).
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all store data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), DossierError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(DossierError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(DossierError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DossierError> {
        let Some(head) = bytes.get(..HEADER_LEN) else {
            return Err(DossierError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        Ok(Self {
            magic,
            version: head[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a store to bytes (header + payload). No file I/O.
pub fn graph_to_bytes(graph: &MemoryGraph) -> Result<Vec<u8>, DossierError> {
    let payload = postcard::to_stdvec(graph)
        .map_err(|e| DossierError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a store from bytes. No file I/O.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<MemoryGraph, DossierError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(DossierError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    postcard::from_bytes(payload).map_err(|e| {
        DossierError::DeserializationError(format!("Failed to deserialize store data: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphFacade;
    use crate::{CommunicationRecord, EdgeBatch, LinkType, PersecutionEvent, RecordId, ReplyLink};

    fn sample() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph
            .put_communication(
                CommunicationRecord::new("m1", "org/a", "org/b", LinkType::RepliesTo)
                    .with_subject("person/x")
                    .with_date("1942-03~"),
            )
            .expect("put");
        graph
            .put_event(PersecutionEvent::new("e1", "person/x").with_date("1942-03/1942-05"))
            .expect("put");
        graph
            .replace_computed_edges(EdgeBatch::Reply(vec![ReplyLink {
                reply: RecordId::new("m1"),
                original: RecordId::new("m0"),
            }]))
            .expect("replace");
        graph
    }

    #[test]
    fn header_roundtrip() {
        let bytes = PersistenceHeader::new().to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored, PersistenceHeader::new());
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = sample();
        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");

        assert_eq!(restored, graph);
        assert_eq!(bytes1, bytes2, "save -> load -> save must be bit-exact");
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn short_input_rejected() {
        assert!(graph_from_bytes(b"DSS").is_err());
    }
}
