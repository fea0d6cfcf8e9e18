//! # Canonical Export Module
//!
//! > **The "Redb Compromise":**
//! > - Runtime: the persistent store uses `redb` for ACID transactions.
//! > - Verification: `redb` files are NOT guaranteed bit-identical across runs.
//! > - The canonical export serializes the computed edges to a sorted,
//! >   bit-exact `postcard` stream. **Its BLAKE3 fingerprint is the proof of
//! >   idempotence**: two runs over an unchanged snapshot with the same
//! >   configuration must produce the same fingerprint.

use crate::{
    CaseSequenceLink, ChainLink, ContextLink, DossierError, EdgeBatch, EdgeKind, EdgeSet,
    EntityRef, RecordId, ReplyLink,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for canonical export format.
pub const CANONICAL_MAGIC: [u8; 4] = *b"DSRX"; // Dossier Export

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Maximum allowed edge count in canonical imports.
pub const MAX_IMPORT_EDGE_COUNT: u64 = 10_000_000;

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    /// Snapshot revision the edges were computed from.
    pub revision: u64,
    /// Total number of edges over all kinds.
    pub edge_count: u64,
    /// BLAKE3 hash of the data section.
    pub hash: [u8; 32],
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(revision: u64, edge_count: u64, hash: [u8; 32]) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            revision,
            edge_count,
            hash,
        }
    }

    /// Validate the header.
    ///
    /// Error messages stay generic so they do not describe the format.
    pub fn validate(&self) -> Result<(), DossierError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(DossierError::DeserializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(DossierError::DeserializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.edge_count > MAX_IMPORT_EDGE_COUNT {
            return Err(DossierError::DeserializationError(format!(
                "Edge count {} exceeds maximum allowed {}",
                self.edge_count, MAX_IMPORT_EDGE_COUNT
            )));
        }
        Ok(())
    }
}

/// Every computed edge, one sorted list per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalEdgeSet {
    pub replies: Vec<ReplyLink>,
    pub chains: Vec<ChainLink>,
    pub contexts: Vec<ContextLink>,
    pub case_sequences: Vec<CaseSequenceLink>,
}

impl CanonicalEdgeSet {
    /// Sorted, deduplicated copy of an edge set. Missing kinds are empty.
    #[must_use]
    pub fn from_edges(edges: &EdgeSet) -> Self {
        fn canon<T: Ord + Clone>(v: &[T]) -> Vec<T> {
            let mut v = v.to_vec();
            v.sort();
            v.dedup();
            v
        }
        Self {
            replies: canon(edges.replies()),
            chains: canon(edges.chains()),
            contexts: canon(edges.contexts()),
            case_sequences: canon(edges.case_sequences()),
        }
    }

    #[must_use]
    pub fn to_edges(&self) -> EdgeSet {
        let mut edges = EdgeSet::new();
        edges.insert(EdgeBatch::Reply(self.replies.clone()));
        edges.insert(EdgeBatch::Chain(self.chains.clone()));
        edges.insert(EdgeBatch::Context(self.contexts.clone()));
        edges.insert(EdgeBatch::CaseSequence(self.case_sequences.clone()));
        edges
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.replies.len()
            + self.chains.len()
            + self.contexts.len()
            + self.case_sequences.len()
    }

    fn to_bytes(&self) -> Result<Vec<u8>, DossierError> {
        postcard::to_allocvec(self)
            .map_err(|e| DossierError::SerializationError(format!("Data: {}", e)))
    }
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export computed edges to canonical postcard format.
///
/// ```text
/// [header_len: u32 LE] [CanonicalHeader (postcard)] [CanonicalEdgeSet (postcard)]
/// ```
pub fn export_canonical(edges: &EdgeSet, revision: u64) -> Result<Vec<u8>, DossierError> {
    let canonical = CanonicalEdgeSet::from_edges(edges);
    let data_bytes = canonical.to_bytes()?;
    let header = CanonicalHeader::new(
        revision,
        canonical.edge_count() as u64,
        *blake3::hash(&data_bytes).as_bytes(),
    );

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| DossierError::SerializationError(format!("Header: {}", e)))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Import computed edges from canonical postcard format.
///
/// Returns the snapshot revision recorded in the header and the edges.
pub fn import_canonical(data: &[u8]) -> Result<(u64, EdgeSet), DossierError> {
    let too_short = || DossierError::DeserializationError("Data too short".to_string());

    let len_bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(too_short)?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = header_len.checked_add(4).ok_or_else(too_short)?;
    let header_bytes = data.get(4..header_end).ok_or_else(too_short)?;
    let data_bytes = data.get(header_end..).ok_or_else(too_short)?;

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| DossierError::DeserializationError(format!("Header: {}", e)))?;
    header.validate()?;

    if blake3::hash(data_bytes).as_bytes() != &header.hash {
        return Err(DossierError::DeserializationError(
            "Hash mismatch".to_string(),
        ));
    }

    let canonical: CanonicalEdgeSet = postcard::from_bytes(data_bytes)
        .map_err(|e| DossierError::DeserializationError(format!("Data: {}", e)))?;
    if canonical.edge_count() as u64 != header.edge_count {
        return Err(DossierError::DeserializationError(
            "Edge count mismatch".to_string(),
        ));
    }

    Ok((header.revision, canonical.to_edges()))
}

/// BLAKE3 fingerprint (hex, 64 characters) of the canonical edge set.
///
/// Independent of the snapshot revision: only the edges count.
pub fn canonical_fingerprint(edges: &EdgeSet) -> Result<String, DossierError> {
    let bytes = CanonicalEdgeSet::from_edges(edges).to_bytes()?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// FLAT EDGE VIEW
// =============================================================================

/// One computed edge in a flat, store-independent shape, for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Relationship name, e.g. `NEXT_IN_COMMUNICATION_CHAIN`.
    pub relation: String,
    pub from: RecordId,
    pub to: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_diff: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victim: Option<EntityRef>,
    /// Always `true`: every edge here is owned by the engine.
    pub computed: bool,
}

/// Flatten a batch into [`EdgeRecord`]s.
#[must_use]
pub fn edge_records(batch: &EdgeBatch) -> Vec<EdgeRecord> {
    let relation = batch.kind().relation_name();
    let record = |from: &RecordId, to: &RecordId| EdgeRecord {
        relation: relation.to_string(),
        from: from.clone(),
        to: to.clone(),
        days_diff: None,
        victim: None,
        computed: true,
    };
    match batch {
        EdgeBatch::Reply(v) => v.iter().map(|l| record(&l.reply, &l.original)).collect(),
        EdgeBatch::Chain(v) => v
            .iter()
            .map(|l| EdgeRecord {
                days_diff: Some(l.days_diff),
                ..record(&l.earlier, &l.later)
            })
            .collect(),
        EdgeBatch::Context(v) => v.iter().map(|l| record(&l.action, &l.event)).collect(),
        EdgeBatch::CaseSequence(v) => v
            .iter()
            .map(|l| EdgeRecord {
                victim: Some(l.victim.clone()),
                ..record(&l.earlier, &l.later)
            })
            .collect(),
    }
}

/// Flatten every batch of an edge set, kinds in canonical order.
#[must_use]
pub fn all_edge_records(edges: &EdgeSet) -> Vec<EdgeRecord> {
    EdgeKind::ALL
        .iter()
        .filter_map(|kind| edges.get(*kind))
        .flat_map(edge_records)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
