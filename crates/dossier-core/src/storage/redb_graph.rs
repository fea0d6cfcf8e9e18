//! # redb-backed Graph Storage
//!
//! A disk-backed implementation of [`GraphFacade`] on the redb embedded
//! database, providing:
//! - ACID transactions (one write transaction per edge replace, however
//!   many kinds it covers)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records and edges are stored as postcard bytes. Each edge kind owns
//! its own table, so replacing one kind never touches another.

use crate::graph::{GraphFacade, RecordFilter};
use crate::{
    CommunicationRecord, DossierError, EdgeBatch, EdgeKind, PersecutionEvent, RecordId,
};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Table for communications: record id -> serialized CommunicationRecord
const COMMUNICATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("communications");

/// Table for events: record id -> serialized PersecutionEvent
const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Computed edge tables: sequence number -> serialized link.
const REPLY_EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges_reply");
const CHAIN_EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges_chain");
const CONTEXT_EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges_context");
const CASE_EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges_case_sequence");

const REVISION_KEY: &str = "revision";

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;
type EdgeTable = TableDefinition<'static, u64, &'static [u8]>;

fn edge_table(kind: EdgeKind) -> EdgeTable {
    match kind {
        EdgeKind::Reply => REPLY_EDGES,
        EdgeKind::Chain => CHAIN_EDGES,
        EdgeKind::Context => CONTEXT_EDGES,
        EdgeKind::CaseSequence => CASE_EDGES,
    }
}

fn io_err(e: impl std::fmt::Display) -> DossierError {
    DossierError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DossierError> {
    postcard::to_allocvec(value).map_err(|e| DossierError::SerializationError(e.to_string()))
}

fn encode_rows(batch: &EdgeBatch) -> Result<Vec<Vec<u8>>, DossierError> {
    match batch {
        EdgeBatch::Reply(v) => v.iter().map(encode).collect(),
        EdgeBatch::Chain(v) => v.iter().map(encode).collect(),
        EdgeBatch::Context(v) => v.iter().map(encode).collect(),
        EdgeBatch::CaseSequence(v) => v.iter().map(encode).collect(),
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DossierError> {
    postcard::from_bytes(bytes).map_err(|e| DossierError::DeserializationError(e.to_string()))
}

/// A disk-backed graph store using redb.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
    /// Cached base-record revision.
    revision: u64,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph")
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(COMMUNICATIONS).map_err(io_err)?;
            let _ = write_txn.open_table(EVENTS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            for kind in EdgeKind::ALL {
                let _ = write_txn.open_table(edge_table(kind)).map_err(io_err)?;
            }
            write_txn.commit().map_err(io_err)?;
        }

        let revision = {
            let read_txn = db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get(REVISION_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        tracing::debug!(revision, "opened redb store");
        Ok(Self { db, revision })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), DossierError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    /// Number of stored communications and events.
    pub fn record_counts(&self) -> Result<(usize, usize), DossierError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let comms = read_txn.open_table(COMMUNICATIONS).map_err(io_err)?;
        let events = read_txn.open_table(EVENTS).map_err(io_err)?;
        Ok((
            comms.len().map_err(io_err)? as usize,
            events.len().map_err(io_err)? as usize,
        ))
    }

    /// Write a whole batch of base records in one transaction, bumping the
    /// revision once.
    pub fn put_records(
        &mut self,
        communications: &[CommunicationRecord],
        events: &[PersecutionEvent],
    ) -> Result<(), DossierError> {
        if communications.is_empty() && events.is_empty() {
            return Ok(());
        }
        let next_revision = self.revision.saturating_add(1);

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut comm_table = write_txn.open_table(COMMUNICATIONS).map_err(io_err)?;
            for record in communications {
                let bytes = encode(record)?;
                comm_table
                    .insert(record.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
            let mut event_table = write_txn.open_table(EVENTS).map_err(io_err)?;
            for event in events {
                let bytes = encode(event)?;
                event_table
                    .insert(event.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_err)?;
            meta_table
                .insert(REVISION_KEY, next_revision)
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        // Update in-memory state only after successful commit.
        self.revision = next_revision;
        Ok(())
    }

    fn put_one(
        &mut self,
        table: RecordTable,
        id: &RecordId,
        bytes: &[u8],
    ) -> Result<(), DossierError> {
        let next_revision = self.revision.saturating_add(1);
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut records = write_txn.open_table(table).map_err(io_err)?;
            records.insert(id.as_str(), bytes).map_err(io_err)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_err)?;
            meta_table
                .insert(REVISION_KEY, next_revision)
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        self.revision = next_revision;
        Ok(())
    }

    fn get_one<T: DeserializeOwned>(
        &self,
        table: RecordTable,
        id: &RecordId,
    ) -> Result<Option<T>, DossierError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let records = read_txn.open_table(table).map_err(io_err)?;
        let value = records.get(id.as_str()).map_err(io_err)?;
        value.map(|data| decode(data.value())).transpose()
    }

    fn scan<T: DeserializeOwned>(
        &self,
        table: RecordTable,
        mut keep: impl FnMut(&T) -> bool,
    ) -> Result<Vec<T>, DossierError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let records = read_txn.open_table(table).map_err(io_err)?;

        let mut result = Vec::new();
        for entry in records.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let record: T = decode(value.value())?;
            if keep(&record) {
                result.push(record);
            }
        }
        Ok(result)
    }
}

// =============================================================================
// GRAPH FACADE IMPLEMENTATION
// =============================================================================

impl GraphFacade for RedbGraph {
    fn put_communication(&mut self, record: CommunicationRecord) -> Result<(), DossierError> {
        let bytes = encode(&record)?;
        self.put_one(COMMUNICATIONS, &record.id, &bytes)
    }

    fn put_event(&mut self, event: PersecutionEvent) -> Result<(), DossierError> {
        let bytes = encode(&event)?;
        self.put_one(EVENTS, &event.id, &bytes)
    }

    fn fetch_communications(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<CommunicationRecord>, DossierError> {
        self.scan(COMMUNICATIONS, |c| filter.matches_communication(c))
    }

    fn fetch_events(&self, filter: &RecordFilter) -> Result<Vec<PersecutionEvent>, DossierError> {
        self.scan(EVENTS, |e| filter.matches_event(e))
    }

    fn communication(&self, id: &RecordId) -> Result<Option<CommunicationRecord>, DossierError> {
        self.get_one(COMMUNICATIONS, id)
    }

    fn event(&self, id: &RecordId) -> Result<Option<PersecutionEvent>, DossierError> {
        self.get_one(EVENTS, id)
    }

    fn replace_computed_edges(&mut self, batch: EdgeBatch) -> Result<usize, DossierError> {
        let kind = batch.kind();
        let written = self.replace_edge_kinds(vec![batch])?;
        Ok(written.get(&kind).copied().unwrap_or_default())
    }

    fn replace_edge_kinds(
        &mut self,
        batches: Vec<EdgeBatch>,
    ) -> Result<BTreeMap<EdgeKind, usize>, DossierError> {
        let mut encoded = BTreeMap::new();
        for batch in batches {
            let batch = batch.normalized();
            encoded.insert(batch.kind(), encode_rows(&batch)?);
        }

        // Every kind is deleted and rewritten inside one write transaction:
        // readers see either the old edge sets or the new ones, never a mix.
        let write_txn = self.db.begin_write().map_err(io_err)?;
        for (kind, rows) in &encoded {
            write_txn.delete_table(edge_table(*kind)).map_err(io_err)?;
            let mut table = write_txn.open_table(edge_table(*kind)).map_err(io_err)?;
            for (seq, row) in (0u64..).zip(rows.iter()) {
                table.insert(seq, row.as_slice()).map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;

        let written: BTreeMap<EdgeKind, usize> = encoded
            .iter()
            .map(|(kind, rows)| (*kind, rows.len()))
            .collect();
        for (kind, edges) in &written {
            tracing::debug!(kind = %kind, edges, "replaced computed edges");
        }
        Ok(written)
    }

    fn computed_edges(&self, kind: EdgeKind) -> Result<EdgeBatch, DossierError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(edge_table(kind)).map_err(io_err)?;

        let mut rows = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            rows.push(value.value().to_vec());
        }

        fn all<T: DeserializeOwned>(rows: &[Vec<u8>]) -> Result<Vec<T>, DossierError> {
            rows.iter().map(|r| decode(r)).collect()
        }
        let batch = match kind {
            EdgeKind::Reply => EdgeBatch::Reply(all(&rows)?),
            EdgeKind::Chain => EdgeBatch::Chain(all(&rows)?),
            EdgeKind::Context => EdgeBatch::Context(all(&rows)?),
            EdgeKind::CaseSequence => EdgeBatch::CaseSequence(all(&rows)?),
        };
        Ok(batch)
    }

    fn revision(&self) -> Result<u64, DossierError> {
        Ok(self.revision)
    }
}
