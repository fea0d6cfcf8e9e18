//! # Scenario Tests (S0-S3)
//!
//! End-to-end behavior of a recomputation over small archives.
//!
//! ## Tiers
//! - S0: Temporal Fidelity
//! - S1: Edge Builders
//! - S2: Recomputation
//! - S3: Persistence and Export

use dossier_core::{
    CommunicationRecord, DossierError, EdgeBatch, EdgeKind, Engine, EngineConfig, GraphFacade,
    LinkType, MemoryGraph, PersecutionEvent, RecordId, Snapshot,
};

const GESTAPO: &str = "org/gestapo-wuerzburg";
const LANDRAT: &str = "org/landrat-kitzingen";
const VICTIM: &str = "person/leopold-w";

fn letter(id: &str, date: &str) -> CommunicationRecord {
    CommunicationRecord::new(id, GESTAPO, LANDRAT, LinkType::Informs)
        .with_subject(VICTIM)
        .with_date(date)
}

fn snapshot(records: Vec<CommunicationRecord>) -> Snapshot {
    Snapshot::new(1, records, Vec::new())
}

fn ids(pairs: &[(RecordId, RecordId)]) -> Vec<(&str, &str)> {
    pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect()
}

// =============================================================================
// TIER S0: TEMPORAL FIDELITY
// =============================================================================

mod s0_temporal {
    use dossier_core::{CalendarDate, DatePrecision, EdtfDate, day_diff};

    /// S0.1: Day differences across a leap day.
    #[test]
    fn leap_year_difference() {
        let from = CalendarDate::from_ymd(1940, 2, 28).expect("date");
        let to = CalendarDate::from_ymd(1940, 3, 1).expect("date");
        assert_eq!(day_diff(from, to), 2);
    }

    /// S0.2: Coarse dates anchor on the first day of their period.
    #[test]
    fn month_precision_anchors_first_day() {
        let date = EdtfDate::parse("1942-06");
        assert_eq!(date.precision(), DatePrecision::Month);
        assert_eq!(date.point(), CalendarDate::from_ymd(1942, 6, 1));
        assert_eq!(date.end(), CalendarDate::from_ymd(1942, 6, 30));
    }

    /// S0.3: Intervals never become linking points.
    #[test]
    fn intervals_have_no_point() {
        let date = EdtfDate::parse("1941-11-01/1942-03-15");
        assert_eq!(date.precision(), DatePrecision::Interval);
        assert!(date.point().is_none());
        assert!(date.interval().is_some());
    }
}

// =============================================================================
// TIER S1: EDGE BUILDERS
// =============================================================================

mod s1_builders {
    use super::*;
    use dossier_core::{ChainBuilder, ContextLinker, ReplyMatcher};

    fn chain_pairs(snap: &Snapshot, window: u32) -> Vec<(RecordId, RecordId)> {
        ChainBuilder::build(snap, &EngineConfig::default().with_chain_window(window))
            .into_iter()
            .map(|l| (l.earlier, l.later))
            .collect()
    }

    /// S1.1: Three letters ten days apart form two links, never a skip.
    #[test]
    fn three_link_chain() {
        let snap = snapshot(vec![
            letter("a", "1942-03-01"),
            letter("b", "1942-03-11"),
            letter("c", "1942-03-21"),
        ]);
        let links = ChainBuilder::build(&snap, &EngineConfig::default());
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.days_diff == 10));
        assert_eq!(ids(&chain_pairs(&snap, 14)), vec![("a", "b"), ("b", "c")]);

        // A wide window still does not skip the intermediate.
        assert_eq!(ids(&chain_pairs(&snap, 30)), vec![("a", "b"), ("b", "c")]);
    }

    /// S1.2: Two letters on the same day both follow the earlier one.
    #[test]
    fn same_day_fan_out() {
        let snap = snapshot(vec![
            letter("a", "1942-03-01"),
            letter("b1", "1942-03-11"),
            letter("b2", "1942-03-11"),
        ]);
        assert_eq!(ids(&chain_pairs(&snap, 14)), vec![("a", "b1"), ("a", "b2")]);
    }

    /// S1.3: A gap wider than the window creates no link.
    #[test]
    fn gap_exceeds_window() {
        let snap = snapshot(vec![letter("a", "1942-03-01"), letter("d", "1942-03-21")]);
        assert!(chain_pairs(&snap, 14).is_empty());
        assert_eq!(ids(&chain_pairs(&snap, 20)), vec![("a", "d")]);
    }

    /// S1.4: A reply answers the latest letter sent the other way.
    #[test]
    fn reply_selects_latest_original() {
        let original = |id: &str, date: &str| {
            CommunicationRecord::new(id, LANDRAT, GESTAPO, LinkType::Requests).with_date(date)
        };
        let snap = snapshot(vec![
            original("o1", "1942-03-01"),
            original("o2", "1942-03-10"),
            CommunicationRecord::new("r", GESTAPO, LANDRAT, LinkType::RepliesTo)
                .with_date("1942-03-12"),
        ]);
        let links = ReplyMatcher::build(&snap, &EngineConfig::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].reply.as_str(), "r");
        assert_eq!(links[0].original.as_str(), "o2");
    }

    /// S1.5: Letters written during an arrest link to it.
    #[test]
    fn context_overlap() {
        let snap = Snapshot::new(
            1,
            vec![letter("m1", "1942-04"), letter("m2", "1943-01-05")],
            vec![PersecutionEvent::new("arrest", VICTIM).with_date("1942-04-10/1942-06-30")],
        );
        let links = ContextLinker::build(&snap, &EngineConfig::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].action.as_str(), "m1");
        assert_eq!(links[0].event.as_str(), "arrest");
    }
}

// =============================================================================
// TIER S2: RECOMPUTATION
// =============================================================================

#[allow(clippy::panic)]
mod s2_recompute {
    use super::*;

    fn archive() -> MemoryGraph {
        let mut g = MemoryGraph::new();
        for (id, date) in [
            ("a", "1942-03-01"),
            ("b", "1942-03-11"),
            ("c", "1942-03-21"),
        ] {
            g.put_communication(letter(id, date)).expect("put");
        }
        g.put_event(PersecutionEvent::new("e1", VICTIM).with_date("1942-02-20"))
            .expect("put");
        g.put_event(PersecutionEvent::new("e2", VICTIM).with_date("1942-05-02"))
            .expect("put");
        g
    }

    /// S2.1: Repeated runs over an unchanged store agree bit for bit.
    #[test]
    fn identical_fingerprints() {
        let mut g = archive();
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let first = engine.recompute(&mut g).expect("first");
        let second = engine.recompute(&mut g).expect("second");
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.created, second.created);
    }

    /// S2.2: A narrower window replaces the previous chain edges.
    #[test]
    fn rerun_replaces_edges() {
        let mut g = archive();
        Engine::new(EngineConfig::default())
            .expect("engine")
            .recompute(&mut g)
            .expect("run");
        assert_eq!(g.computed_edges(EdgeKind::Chain).expect("get").len(), 2);

        let report = Engine::new(EngineConfig::default().with_chain_window(5))
            .expect("engine")
            .recompute(&mut g)
            .expect("rerun");
        assert_eq!(report.created.get(&EdgeKind::Chain), Some(&0));
        assert!(g.computed_edges(EdgeKind::Chain).expect("get").is_empty());
    }

    /// S2.3: The case sequence follows event dates.
    #[test]
    fn case_sequence_written() {
        let mut g = archive();
        Engine::new(EngineConfig::default())
            .expect("engine")
            .recompute(&mut g)
            .expect("run");
        let EdgeBatch::CaseSequence(links) =
            g.computed_edges(EdgeKind::CaseSequence).expect("get")
        else {
            panic!("wrong batch kind");
        };
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].earlier.as_str(), "e1");
        assert_eq!(links[0].later.as_str(), "e2");
    }

    /// S2.4: An invalid window is rejected before any work.
    #[test]
    fn invalid_window_rejected() {
        for window in [0, 366] {
            let result = Engine::new(EngineConfig::default().with_chain_window(window));
            assert!(matches!(result, Err(DossierError::InvalidConfig(_))));
        }
    }

    /// S2.5: An empty store is a valid, clean run.
    #[test]
    fn empty_store_is_clean() {
        let mut g = MemoryGraph::new();
        let report = Engine::new(EngineConfig::default())
            .expect("engine")
            .recompute(&mut g)
            .expect("run");
        assert_eq!(report.total_created(), 0);
        assert!(report.validation.is_clean());
    }
}

// =============================================================================
// TIER S3: PERSISTENCE AND EXPORT
// =============================================================================

#[allow(clippy::unwrap_used)]
mod s3_persistence {
    use super::*;
    use dossier_core::{
        Loader, RecordBatch, Store, canonical_fingerprint, export_canonical, import_canonical,
        stored_edges,
    };

    fn batch() -> RecordBatch {
        RecordBatch {
            communications: vec![
                letter("a", "1942-03-01"),
                letter("b", "1942-03-11"),
                letter("c", "1942-03-21"),
            ],
            events: vec![PersecutionEvent::new("e1", VICTIM).with_date("1942-03")],
        }
    }

    /// S3.1: Computed edges survive reopening the redb store.
    #[test]
    fn edges_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dossier.redb");

        let fingerprint = {
            let mut store = Store::with_redb(&path).unwrap();
            Loader::load(&mut store, batch()).unwrap();
            Engine::new(EngineConfig::default())
                .unwrap()
                .recompute(&mut store)
                .unwrap()
                .fingerprint
        };

        let store = Store::with_redb(&path).unwrap();
        assert!(store.is_persistent());
        // one batch, one revision
        assert_eq!(store.revision().unwrap(), 1);
        assert_eq!(store.computed_edges(EdgeKind::Chain).unwrap().len(), 2);
        assert_eq!(store.computed_edges(EdgeKind::Context).unwrap().len(), 3);
        let edges = stored_edges(&store).unwrap();
        assert_eq!(canonical_fingerprint(&edges).unwrap(), fingerprint);
    }

    /// S3.2: Memory and redb stores compute the same edges.
    #[test]
    fn backends_agree() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::default()).unwrap();

        let mut memory = Store::new();
        Loader::load(&mut memory, batch()).unwrap();
        let mut redb = Store::with_redb(dir.path().join("d.redb")).unwrap();
        Loader::load(&mut redb, batch()).unwrap();

        let a = engine.recompute(&mut memory).unwrap();
        let b = engine.recompute(&mut redb).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    /// S3.3: Canonical export reimports to the same edge set.
    #[test]
    fn export_round_trip() {
        let mut store = Store::new();
        Loader::load(&mut store, batch()).unwrap();
        Engine::new(EngineConfig::default())
            .unwrap()
            .recompute(&mut store)
            .unwrap();

        let edges = stored_edges(&store).unwrap();
        let bytes = export_canonical(&edges, store.revision().unwrap()).unwrap();
        let (revision, imported) = import_canonical(&bytes).unwrap();
        assert_eq!(revision, 4);
        assert_eq!(imported, edges);
    }

    /// S3.4: Corrupted exports are rejected.
    #[test]
    fn corrupted_export_rejected() {
        let edges = stored_edges(&Store::new()).unwrap();
        let mut bytes = export_canonical(&edges, 0).unwrap();
        if let Some(last) = bytes.last_mut() {
            *last ^= 0xff;
        }
        assert!(import_canonical(&bytes).is_err());
    }
}
