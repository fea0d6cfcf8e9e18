//! # Graph Metrics
//!
//! Counts describing a store, for status output. Informational only.

use crate::graph::GraphFacade;
use crate::{DossierError, EdgeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot and edge counts of a store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub revision: u64,
    pub communication_count: usize,
    pub event_count: usize,
    /// Communications with a day, month or year date.
    pub dated_communications: usize,
    /// Events with a closed interval.
    pub dated_events: usize,
    /// Stored computed edges per kind.
    pub edges: BTreeMap<EdgeKind, usize>,
    /// Computed edges per base record, fixed-point millionths.
    pub edge_density_millionths: u64,
}

impl GraphMetrics {
    /// Compute metrics from a store.
    pub fn from_graph<G: GraphFacade + ?Sized>(graph: &G) -> Result<Self, DossierError> {
        let snapshot = graph.snapshot()?;
        let communication_count = snapshot.communications().len();
        let event_count = snapshot.events().len();
        let dated_communications = snapshot
            .communications()
            .iter()
            .filter(|c| c.point().is_some())
            .count();
        let dated_events = snapshot
            .events()
            .iter()
            .filter(|e| e.interval().is_some())
            .count();

        let mut edges = BTreeMap::new();
        for kind in EdgeKind::ALL {
            edges.insert(kind, graph.computed_edges(kind)?.len());
        }

        let records = communication_count.saturating_add(event_count) as u64;
        let edge_total: usize = edges.values().sum();
        let edge_density_millionths = if records > 0 {
            (edge_total as u64).saturating_mul(1_000_000) / records
        } else {
            0
        };

        Ok(Self {
            revision: snapshot.revision(),
            communication_count,
            event_count,
            dated_communications,
            dated_events,
            edges,
            edge_density_millionths,
        })
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::{
        CommunicationRecord, ContextLink, EdgeBatch, LinkType, PersecutionEvent, RecordId,
    };

    #[test]
    fn empty_graph() {
        let metrics = GraphMetrics::from_graph(&MemoryGraph::new()).expect("metrics");
        assert_eq!(metrics.communication_count, 0);
        assert_eq!(metrics.edge_density_millionths, 0);
        assert_eq!(metrics.edges.len(), 4);
    }

    #[test]
    fn counts_and_density() {
        let mut g = MemoryGraph::new();
        g.put_communication(
            CommunicationRecord::new("m1", "a", "b", LinkType::Informs).with_date("1942-05"),
        )
        .expect("put");
        g.put_communication(CommunicationRecord::new("m2", "a", "b", LinkType::Informs))
            .expect("put");
        g.put_event(PersecutionEvent::new("e1", "p/x").with_date("1942"))
            .expect("put");
        g.put_event(PersecutionEvent::new("e2", "p/x").with_date("1942/.."))
            .expect("put");
        g.replace_computed_edges(EdgeBatch::Context(vec![ContextLink {
            action: RecordId::new("m1"),
            event: RecordId::new("e1"),
        }]))
        .expect("replace");

        let metrics = GraphMetrics::from_graph(&g).expect("metrics");
        assert_eq!(metrics.revision, 4);
        assert_eq!(metrics.dated_communications, 1);
        assert_eq!(metrics.dated_events, 1);
        assert_eq!(metrics.edge_count(), 1);
        assert_eq!(metrics.edge_density_millionths, 250_000);
    }
}
