//! # Engine
//!
//! Orchestrates one recomputation run:
//!
//! 1. read a snapshot through the facade
//! 2. run each enabled builder over that snapshot; builders never see each
//!    other's output
//! 3. write each edge kind back with one atomic delete-then-insert
//! 4. validate the snapshot against the edges as stored
//! 5. return a [`RecomputeReport`]
//!
//! Derived edges are a pure function of the snapshot and the configuration.

use crate::chain::ChainBuilder;
use crate::config::EngineConfig;
use crate::context::ContextLinker;
use crate::export::canonical_fingerprint;
use crate::graph::{GraphFacade, Snapshot};
use crate::reply::ReplyMatcher;
use crate::report::{DaysDiffStats, RecomputeReport};
use crate::sequence::CaseSequencer;
use crate::validator::{ValidationReport, Validator};
use crate::{DossierError, EdgeBatch, EdgeKind, EdgeSet};

/// The derived-relationship engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Create an engine, rejecting an invalid configuration.
    pub fn new(config: EngineConfig) -> Result<Self, DossierError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute the edges of every enabled kind. Pure: touches no store.
    #[must_use]
    pub fn compute(&self, snapshot: &Snapshot) -> EdgeSet {
        let mut edges = EdgeSet::new();
        for kind in EdgeKind::ALL {
            if !self.config.is_enabled(kind) {
                continue;
            }
            let batch = match kind {
                EdgeKind::Reply => EdgeBatch::Reply(ReplyMatcher::build(snapshot, &self.config)),
                EdgeKind::Chain => EdgeBatch::Chain(ChainBuilder::build(snapshot, &self.config)),
                EdgeKind::Context => {
                    EdgeBatch::Context(ContextLinker::build(snapshot, &self.config))
                }
                EdgeKind::CaseSequence => EdgeBatch::CaseSequence(CaseSequencer::build(snapshot)),
            };
            edges.insert(batch);
        }
        edges
    }

    /// Recompute the enabled edge kinds of a store and validate the result.
    pub fn recompute<G: GraphFacade + ?Sized>(
        &self,
        graph: &mut G,
    ) -> Result<RecomputeReport, DossierError> {
        let snapshot = graph.snapshot()?;
        let _span = tracing::info_span!(
            "recompute",
            revision = snapshot.revision(),
            communications = snapshot.communications().len(),
            events = snapshot.events().len()
        )
        .entered();

        let computed = self.compute(&snapshot);
        let created = graph.replace_edge_kinds(computed.batches().cloned().collect())?;
        for (kind, written) in &created {
            tracing::info!(kind = %kind, written, "edge kind replaced");
        }

        let stored = stored_edges(graph)?;
        let validation = Validator::validate(&snapshot, &stored, &self.config);
        let fingerprint = canonical_fingerprint(&stored)?;

        Ok(RecomputeReport {
            snapshot_revision: snapshot.revision(),
            chain_window_days: self.config.chain_window_days,
            created,
            days_diff: DaysDiffStats::from_links(stored.chains()),
            validation,
            fingerprint,
        })
    }

    /// Validate the edges currently stored, without recomputing anything.
    pub fn validate_only<G: GraphFacade + ?Sized>(
        &self,
        graph: &G,
    ) -> Result<ValidationReport, DossierError> {
        let snapshot = graph.snapshot()?;
        let stored = stored_edges(graph)?;
        Ok(Validator::validate(&snapshot, &stored, &self.config))
    }
}

/// Every computed edge currently held by a store.
pub fn stored_edges<G: GraphFacade + ?Sized>(graph: &G) -> Result<EdgeSet, DossierError> {
    let mut edges = EdgeSet::new();
    for kind in EdgeKind::ALL {
        edges.insert(graph.computed_edges(kind)?);
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::{ChainLink, CommunicationRecord, LinkType, RecordId};

    fn comm(id: &str, date: &str) -> CommunicationRecord {
        CommunicationRecord::new(id, "org/a", "org/b", LinkType::Informs)
            .with_subject("p/x")
            .with_date(date)
    }

    fn graph() -> MemoryGraph {
        let mut g = MemoryGraph::new();
        for (id, date) in [("a", "1942-03-01"), ("b", "1942-03-05"), ("c", "1942-03-12")] {
            g.put_communication(comm(id, date)).expect("put");
        }
        g
    }

    #[test]
    fn invalid_config_rejected() {
        let result = Engine::new(EngineConfig::default().with_chain_window(0));
        assert!(matches!(result, Err(DossierError::InvalidConfig(_))));
    }

    #[test]
    fn recompute_writes_and_reports() {
        let mut g = graph();
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let report = engine.recompute(&mut g).expect("recompute");

        assert_eq!(report.snapshot_revision, 3);
        assert_eq!(report.created.get(&EdgeKind::Chain), Some(&2));
        assert_eq!(report.created.get(&EdgeKind::Reply), Some(&0));
        assert!(report.validation.is_clean());
        let stats = report.days_diff.expect("stats");
        assert_eq!((stats.min, stats.max), (4, 7));
    }

    #[test]
    fn disabled_kind_left_untouched() {
        let mut g = graph();
        let stale = ChainLink {
            earlier: RecordId::new("a"),
            later: RecordId::new("c"),
            days_diff: 11,
        };
        g.replace_computed_edges(EdgeBatch::Chain(vec![stale.clone()]))
            .expect("seed");

        let engine =
            Engine::new(EngineConfig::default().with_kinds([EdgeKind::Reply])).expect("engine");
        let report = engine.recompute(&mut g).expect("recompute");

        assert!(!report.created.contains_key(&EdgeKind::Chain));
        assert_eq!(
            g.computed_edges(EdgeKind::Chain).expect("get"),
            EdgeBatch::Chain(vec![stale])
        );
        // The stale link skips b and is reported, not fixed.
        assert!(!report.validation.is_clean());
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut g = graph();
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let first = engine.recompute(&mut g).expect("first");
        let second = engine.recompute(&mut g).expect("second");
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first, second);
    }

    #[test]
    fn validate_only_reads_stored_edges() {
        let g = graph();
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let report = engine.validate_only(&g).expect("validate");
        assert!(report.is_clean());
        assert_eq!(report.eligible_records, 3);
        assert_eq!(report.isolated_records.len(), 3);
    }
}
