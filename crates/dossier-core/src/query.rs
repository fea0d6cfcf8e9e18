//! # Query Module
//!
//! Read-only traversal of the computed edges.
//!
//! - A victim's case timeline along `FOLLOWS_IN_CASE`
//! - A correspondence chain along `NEXT_IN_COMMUNICATION_CHAIN`
//! - Record selection through a [`RecordFilter`]
//!
//! Every traversal is bounded by [`MAX_TRAVERSAL_DEPTH`].

use crate::graph::{GraphFacade, RecordFilter};
use crate::primitives::MAX_TRAVERSAL_DEPTH;
use crate::{
    ChainLink, CommunicationRecord, DossierError, EdgeBatch, EdgeKind, EntityRef,
    PersecutionEvent, RecordId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Query operations supported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// A victim's events in case order.
    Timeline { victim: EntityRef },
    /// Breadth-first walk of chain links starting at a communication.
    Chain { start: RecordId, depth: usize },
    /// Communications matching a filter.
    Communications { filter: RecordFilter },
    /// Events matching a filter.
    Events { filter: RecordFilter },
}

/// The result of a chain walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTrace {
    /// Visited records in breadth-first order, starting record first.
    pub records: Vec<RecordId>,
    /// Links traversed, in discovery order.
    pub links: Vec<ChainLink>,
}

/// The result of a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    Timeline { events: Vec<PersecutionEvent> },
    Chain { trace: Option<ChainTrace> },
    Communications { records: Vec<CommunicationRecord> },
    Events { records: Vec<PersecutionEvent> },
}

impl Query {
    /// Run the query against a store.
    pub fn execute<G: GraphFacade + ?Sized>(&self, graph: &G) -> Result<QueryResult, DossierError> {
        Ok(match self {
            Self::Timeline { victim } => QueryResult::Timeline {
                events: case_timeline(graph, victim)?,
            },
            Self::Chain { start, depth } => QueryResult::Chain {
                trace: chain_from(graph, start, *depth)?,
            },
            Self::Communications { filter } => QueryResult::Communications {
                records: graph.fetch_communications(filter)?,
            },
            Self::Events { filter } => QueryResult::Events {
                records: graph.fetch_events(filter)?,
            },
        })
    }
}

/// A victim's events, following the stored case-sequence links.
///
/// Events without links (undated, open-ended, or never recomputed) are not
/// part of the timeline.
pub fn case_timeline<G: GraphFacade + ?Sized>(
    graph: &G,
    victim: &EntityRef,
) -> Result<Vec<PersecutionEvent>, DossierError> {
    let EdgeBatch::CaseSequence(links) = graph.computed_edges(EdgeKind::CaseSequence)? else {
        return Ok(Vec::new());
    };
    let next: BTreeMap<&RecordId, &RecordId> = links
        .iter()
        .filter(|l| &l.victim == victim)
        .map(|l| (&l.earlier, &l.later))
        .collect();
    let targets: BTreeSet<&RecordId> = next.values().copied().collect();

    let mut ordered = Vec::new();
    let mut visited = BTreeSet::new();
    for head in next.keys().filter(|id| !targets.contains(*id)) {
        let mut current = Some(*head);
        while let Some(id) = current {
            if ordered.len() >= MAX_TRAVERSAL_DEPTH || !visited.insert(id) {
                break;
            }
            ordered.push(id.clone());
            current = next.get(id).copied();
        }
    }

    let mut events = Vec::with_capacity(ordered.len());
    for id in &ordered {
        if let Some(event) = graph.event(id)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Walk chain links forward from `start`, up to `depth` hops.
///
/// Returns `None` when `start` is not a stored communication.
pub fn chain_from<G: GraphFacade + ?Sized>(
    graph: &G,
    start: &RecordId,
    depth: usize,
) -> Result<Option<ChainTrace>, DossierError> {
    if graph.communication(start)?.is_none() {
        return Ok(None);
    }
    let depth = depth.min(MAX_TRAVERSAL_DEPTH);
    let EdgeBatch::Chain(links) = graph.computed_edges(EdgeKind::Chain)? else {
        return Ok(Some(ChainTrace {
            records: vec![start.clone()],
            links: Vec::new(),
        }));
    };
    let mut outgoing: BTreeMap<&RecordId, Vec<&ChainLink>> = BTreeMap::new();
    for link in &links {
        outgoing.entry(&link.earlier).or_default().push(link);
    }

    let mut trace = ChainTrace::default();
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((start, 0usize));
    visited.insert(start);

    while let Some((current, current_depth)) = queue.pop_front() {
        trace.records.push(current.clone());
        if current_depth >= depth {
            continue;
        }
        for link in outgoing.get(current).into_iter().flatten() {
            trace.links.push((*link).clone());
            if visited.insert(&link.later) {
                queue.push_back((&link.later, current_depth.saturating_add(1)));
            }
        }
    }
    Ok(Some(trace))
}
