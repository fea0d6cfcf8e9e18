//! # Graph Access Facade
//!
//! The only path by which the engine touches the base graph.
//!
//! This module defines the `GraphFacade` trait, the revisioned `Snapshot`
//! handed to the builders, and `MemoryGraph`, the in-memory store.
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::temporal::CalendarDate;
use crate::{
    CommunicationRecord, DossierError, EdgeBatch, EdgeKind, EntityRef, PersecutionEvent, RecordId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An immutable, owned view of the base graph at one revision.
///
/// Records are sorted by id, so iteration order never depends on the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    revision: u64,
    communications: Vec<CommunicationRecord>,
    events: Vec<PersecutionEvent>,
}

impl Snapshot {
    #[must_use]
    pub fn new(
        revision: u64,
        mut communications: Vec<CommunicationRecord>,
        mut events: Vec<PersecutionEvent>,
    ) -> Self {
        communications.sort_by(|a, b| a.id.cmp(&b.id));
        communications.dedup_by(|a, b| a.id == b.id);
        events.sort_by(|a, b| a.id.cmp(&b.id));
        events.dedup_by(|a, b| a.id == b.id);
        Self {
            revision,
            communications,
            events,
        }
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn communications(&self) -> &[CommunicationRecord] {
        &self.communications
    }

    #[must_use]
    pub fn events(&self) -> &[PersecutionEvent] {
        &self.events
    }

    #[must_use]
    pub fn communication(&self, id: &RecordId) -> Option<&CommunicationRecord> {
        self.communications
            .binary_search_by(|c| c.id.cmp(id))
            .ok()
            .and_then(|i| self.communications.get(i))
    }

    #[must_use]
    pub fn event(&self, id: &RecordId) -> Option<&PersecutionEvent> {
        self.events
            .binary_search_by(|e| e.id.cmp(id))
            .ok()
            .and_then(|i| self.events.get(i))
    }

    /// Whether any record, communication or event, carries this id.
    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.communication(id).is_some() || self.event(id).is_some()
    }
}

// =============================================================================
// RECORD FILTER
// =============================================================================

/// Selection criteria for `fetch_communications` / `fetch_events`.
///
/// Every set criterion must hold. A date range excludes undated records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    /// Actor or recipient of a communication; agent of an event.
    pub participant: Option<EntityRef>,
    /// Member of a communication's subject set; victim of an event.
    pub subject: Option<EntityRef>,
    /// Inclusive lower bound.
    pub from: Option<CalendarDate>,
    /// Inclusive upper bound.
    pub to: Option<CalendarDate>,
}

impl RecordFilter {
    /// The filter that selects everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_participant(mut self, entity: impl Into<String>) -> Self {
        self.participant = Some(EntityRef::new(entity));
        self
    }

    #[must_use]
    pub fn with_subject(mut self, person: impl Into<String>) -> Self {
        self.subject = Some(EntityRef::new(person));
        self
    }

    #[must_use]
    pub fn with_range(mut self, from: Option<CalendarDate>, to: Option<CalendarDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    fn overlaps(&self, span: Option<(CalendarDate, CalendarDate)>) -> bool {
        if !self.has_range() {
            return true;
        }
        let Some((start, end)) = span else {
            return false;
        };
        self.from.is_none_or(|from| end >= from) && self.to.is_none_or(|to| start <= to)
    }

    #[must_use]
    pub fn matches_communication(&self, record: &CommunicationRecord) -> bool {
        if let Some(p) = &self.participant
            && record.actor.as_ref() != Some(p)
            && record.recipient.as_ref() != Some(p)
        {
            return false;
        }
        if let Some(s) = &self.subject
            && !record.has_subject(s)
        {
            return false;
        }
        self.overlaps(record.date.as_ref().and_then(|d| d.span()))
    }

    #[must_use]
    pub fn matches_event(&self, event: &PersecutionEvent) -> bool {
        if let Some(p) = &self.participant
            && event.agent.as_ref() != Some(p)
        {
            return false;
        }
        if let Some(s) = &self.subject
            && &event.victim != s
        {
            return false;
        }
        self.overlaps(event.interval())
    }
}

// =============================================================================
// GRAPH FACADE TRAIT
// =============================================================================

/// The facade over the base graph store.
///
/// Implemented by the in-memory [`MemoryGraph`] and the disk-backed
/// [`crate::storage::RedbGraph`], so the engine is agnostic of storage.
pub trait GraphFacade {
    /// Insert or replace a communication. Bumps the revision.
    fn put_communication(&mut self, record: CommunicationRecord) -> Result<(), DossierError>;

    /// Insert or replace a persecution event. Bumps the revision.
    fn put_event(&mut self, event: PersecutionEvent) -> Result<(), DossierError>;

    /// Communications matching the filter, sorted by id.
    fn fetch_communications(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<CommunicationRecord>, DossierError>;

    /// Events matching the filter, sorted by id.
    fn fetch_events(&self, filter: &RecordFilter) -> Result<Vec<PersecutionEvent>, DossierError>;

    /// Lookup a single communication.
    fn communication(&self, id: &RecordId) -> Result<Option<CommunicationRecord>, DossierError>;

    /// Lookup a single event.
    fn event(&self, id: &RecordId) -> Result<Option<PersecutionEvent>, DossierError>;

    /// Delete every computed edge of the batch's kind and insert the batch,
    /// as one atomic operation. Returns the number of edges written.
    fn replace_computed_edges(&mut self, batch: EdgeBatch) -> Result<usize, DossierError>;

    /// Replace several edge kinds as one atomic operation. Returns the
    /// number of edges written per kind.
    ///
    /// The default applies the batches one by one and is only atomic when
    /// a single replace cannot fail halfway, as in memory.
    fn replace_edge_kinds(
        &mut self,
        batches: Vec<EdgeBatch>,
    ) -> Result<BTreeMap<EdgeKind, usize>, DossierError> {
        let mut written = BTreeMap::new();
        for batch in batches {
            let kind = batch.kind();
            written.insert(kind, self.replace_computed_edges(batch)?);
        }
        Ok(written)
    }

    /// The computed edges of one kind, in canonical order.
    fn computed_edges(&self, kind: EdgeKind) -> Result<EdgeBatch, DossierError>;

    /// Monotonic revision of the base records.
    fn revision(&self) -> Result<u64, DossierError>;

    /// Read the whole base graph as one snapshot.
    fn snapshot(&self) -> Result<Snapshot, DossierError> {
        let revision = self.revision()?;
        let communications = self.fetch_communications(&RecordFilter::all())?;
        let events = self.fetch_events(&RecordFilter::all())?;
        Ok(Snapshot::new(revision, communications, events))
    }
}

// =============================================================================
// IN-MEMORY GRAPH
// =============================================================================

/// The in-memory store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering and
/// bit-exact serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryGraph {
    communications: BTreeMap<RecordId, CommunicationRecord>,
    events: BTreeMap<RecordId, PersecutionEvent>,
    edges: BTreeMap<EdgeKind, EdgeBatch>,
    revision: u64,
}

impl MemoryGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn communication_count(&self) -> usize {
        self.communications.len()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl GraphFacade for MemoryGraph {
    fn put_communication(&mut self, record: CommunicationRecord) -> Result<(), DossierError> {
        self.communications.insert(record.id.clone(), record);
        self.revision = self.revision.saturating_add(1);
        Ok(())
    }

    fn put_event(&mut self, event: PersecutionEvent) -> Result<(), DossierError> {
        self.events.insert(event.id.clone(), event);
        self.revision = self.revision.saturating_add(1);
        Ok(())
    }

    fn fetch_communications(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<CommunicationRecord>, DossierError> {
        Ok(self
            .communications
            .values()
            .filter(|c| filter.matches_communication(c))
            .cloned()
            .collect())
    }

    fn fetch_events(&self, filter: &RecordFilter) -> Result<Vec<PersecutionEvent>, DossierError> {
        Ok(self
            .events
            .values()
            .filter(|e| filter.matches_event(e))
            .cloned()
            .collect())
    }

    fn communication(&self, id: &RecordId) -> Result<Option<CommunicationRecord>, DossierError> {
        Ok(self.communications.get(id).cloned())
    }

    fn event(&self, id: &RecordId) -> Result<Option<PersecutionEvent>, DossierError> {
        Ok(self.events.get(id).cloned())
    }

    fn replace_computed_edges(&mut self, batch: EdgeBatch) -> Result<usize, DossierError> {
        let batch = batch.normalized();
        let written = batch.len();
        self.edges.insert(batch.kind(), batch);
        Ok(written)
    }

    fn computed_edges(&self, kind: EdgeKind) -> Result<EdgeBatch, DossierError> {
        Ok(self
            .edges
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| EdgeBatch::empty(kind)))
    }

    fn revision(&self) -> Result<u64, DossierError> {
        Ok(self.revision)
    }
}

// =============================================================================
// TESTS
// =============================================================================
