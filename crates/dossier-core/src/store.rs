//! # Store
//!
//! A `GraphFacade` that dispatches to one of two storage backends:
//! - `InMemory`: a [`MemoryGraph`] (fast, volatile unless explicitly saved)
//! - `Persistent`: a [`RedbGraph`] (disk-backed, ACID)

use crate::graph::{GraphFacade, MemoryGraph, RecordFilter, Snapshot};
use crate::storage::RedbGraph;
use crate::{
    CommunicationRecord, DossierError, EdgeBatch, EdgeKind, PersecutionEvent, RecordId,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Storage backend for a [`Store`].
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(MemoryGraph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryGraph::new())
    }
}

// NOTE: no Clone. A redb database handle cannot be cloned.

/// The graph store used by the CLI and the HTTP API.
#[derive(Debug, Default)]
pub struct Store {
    backend: StorageBackend,
}

impl Store {
    /// An empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_graph(graph: MemoryGraph) -> Self {
        Self {
            backend: StorageBackend::InMemory(graph),
        }
    }

    /// Open or create a redb store at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbGraph::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// The in-memory graph, `None` for the persistent backend.
    #[must_use]
    pub fn memory_graph(&self) -> Option<&MemoryGraph> {
        match &self.backend {
            StorageBackend::InMemory(g) => Some(g),
            StorageBackend::Persistent(_) => None,
        }
    }

    /// Write a batch of base records.
    ///
    /// The persistent backend commits the whole batch in one transaction.
    pub fn put_records(
        &mut self,
        communications: Vec<CommunicationRecord>,
        events: Vec<PersecutionEvent>,
    ) -> Result<(), DossierError> {
        match &mut self.backend {
            StorageBackend::InMemory(g) => {
                for record in communications {
                    g.put_communication(record)?;
                }
                for event in events {
                    g.put_event(event)?;
                }
                Ok(())
            }
            StorageBackend::Persistent(g) => g.put_records(&communications, &events),
        }
    }

    fn facade(&self) -> &dyn GraphFacade {
        match &self.backend {
            StorageBackend::InMemory(g) => g,
            StorageBackend::Persistent(g) => g,
        }
    }

    fn facade_mut(&mut self) -> &mut dyn GraphFacade {
        match &mut self.backend {
            StorageBackend::InMemory(g) => g,
            StorageBackend::Persistent(g) => g,
        }
    }
}

impl GraphFacade for Store {
    fn put_communication(&mut self, record: CommunicationRecord) -> Result<(), DossierError> {
        self.facade_mut().put_communication(record)
    }

    fn put_event(&mut self, event: PersecutionEvent) -> Result<(), DossierError> {
        self.facade_mut().put_event(event)
    }

    fn fetch_communications(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<CommunicationRecord>, DossierError> {
        self.facade().fetch_communications(filter)
    }

    fn fetch_events(&self, filter: &RecordFilter) -> Result<Vec<PersecutionEvent>, DossierError> {
        self.facade().fetch_events(filter)
    }

    fn communication(&self, id: &RecordId) -> Result<Option<CommunicationRecord>, DossierError> {
        self.facade().communication(id)
    }

    fn event(&self, id: &RecordId) -> Result<Option<PersecutionEvent>, DossierError> {
        self.facade().event(id)
    }

    fn replace_computed_edges(&mut self, batch: EdgeBatch) -> Result<usize, DossierError> {
        self.facade_mut().replace_computed_edges(batch)
    }

    fn replace_edge_kinds(
        &mut self,
        batches: Vec<EdgeBatch>,
    ) -> Result<BTreeMap<EdgeKind, usize>, DossierError> {
        self.facade_mut().replace_edge_kinds(batches)
    }

    fn computed_edges(&self, kind: EdgeKind) -> Result<EdgeBatch, DossierError> {
        self.facade().computed_edges(kind)
    }

    fn revision(&self) -> Result<u64, DossierError> {
        self.facade().revision()
    }

    fn snapshot(&self) -> Result<Snapshot, DossierError> {
        self.facade().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkType;
    use tempfile::tempdir;

    fn comm(id: &str) -> CommunicationRecord {
        CommunicationRecord::new(id, "org/a", "org/b", LinkType::Informs).with_date("1943-01-12")
    }

    #[test]
    fn in_memory_by_default() {
        let store = Store::new();
        assert!(!store.is_persistent());
        assert!(store.memory_graph().is_some());
    }

    #[test]
    fn backends_agree_on_put_records() {
        let temp = tempdir().expect("temp dir");
        let mut memory = Store::new();
        let mut persistent = Store::with_redb(temp.path().join("s.redb")).expect("open");
        assert!(persistent.is_persistent());

        for store in [&mut memory, &mut persistent] {
            store
                .put_records(
                    vec![comm("m2"), comm("m1")],
                    vec![PersecutionEvent::new("e1", "person/x")],
                )
                .expect("put");
        }

        let a = memory.snapshot().expect("snapshot");
        let b = persistent.snapshot().expect("snapshot");
        assert_eq!(a.communications(), b.communications());
        assert_eq!(a.events(), b.events());
    }
}
