//! # Chain Builder
//!
//! Links consecutive correspondence between the same two parties about the
//! same persons.
//!
//! For an ordered pair `(earlier, later)` with identical actor and
//! recipient, point dates with `later > earlier` and a common subject:
//!
//! 1. `days_diff = day_diff(earlier, later)`; dropped when above the window.
//! 2. Dropped when a third record of the same actor/recipient pair, sharing
//!    a subject with both endpoints, is dated strictly between them.
//! 3. Survivors become `ChainLink(earlier -> later, days_diff)`.
//!
//! Records sharing a date are all kept, so fan-out and fan-in occur.
//!
//! Candidates come from an index keyed by `(actor, recipient, subject)`
//! whose lists are date-sorted; each record only scans forward until the
//! window closes.

use crate::config::EngineConfig;
use crate::graph::Snapshot;
use crate::temporal::{CalendarDate, day_diff};
use crate::{ChainLink, EntityRef, RecordId};
use std::collections::{BTreeMap, BTreeSet};

type ChainKey<'a> = (&'a EntityRef, &'a EntityRef, &'a EntityRef);

/// Date-sorted communications per `(actor, recipient, subject)`.
pub struct ChainIndex<'a> {
    snapshot: &'a Snapshot,
    lists: BTreeMap<ChainKey<'a>, Vec<(CalendarDate, &'a RecordId)>>,
}

impl<'a> ChainIndex<'a> {
    /// Index every communication with actor, recipient, a point date and
    /// at least one subject.
    #[must_use]
    pub fn build(snapshot: &'a Snapshot) -> Self {
        let mut lists: BTreeMap<ChainKey<'a>, Vec<_>> = BTreeMap::new();
        for record in snapshot.communications() {
            let (Some((actor, recipient)), Some(date)) = (record.pair(), record.point()) else {
                continue;
            };
            for subject in record.subjects() {
                lists
                    .entry((actor, recipient, subject))
                    .or_default()
                    .push((date, &record.id));
            }
        }
        for list in lists.values_mut() {
            list.sort();
        }
        Self { snapshot, lists }
    }

    /// Every `(earlier, later, days_diff)` within the window, before the
    /// nearest-neighbor filter. Deduplicated across shared subjects.
    #[must_use]
    pub fn candidates(&self, window_days: u32) -> BTreeSet<(&'a RecordId, &'a RecordId, u32)> {
        let window = i64::from(window_days);
        let mut out = BTreeSet::new();
        for list in self.lists.values() {
            for (i, (earlier_date, earlier)) in list.iter().enumerate() {
                for (later_date, later) in list.iter().skip(i.saturating_add(1)) {
                    let diff = day_diff(*earlier_date, *later_date);
                    if diff > window {
                        break;
                    }
                    if let Ok(days) = u32::try_from(diff)
                        && days > 0
                    {
                        out.insert((*earlier, *later, days));
                    }
                }
            }
        }
        out
    }

    /// Whether a record of the same actor/recipient pair, sharing a subject
    /// with both endpoints, is dated strictly between them.
    #[must_use]
    pub fn has_intermediate(&self, earlier: &RecordId, later: &RecordId) -> bool {
        self.intermediate(earlier, later).is_some()
    }

    /// The first intermediate record found, if any.
    #[must_use]
    pub fn intermediate(&self, earlier: &RecordId, later: &RecordId) -> Option<&'a RecordId> {
        let snapshot = self.snapshot;
        let first = snapshot.communication(earlier)?;
        let last = snapshot.communication(later)?;
        let (actor, recipient) = first.pair()?;
        if last.pair() != Some((actor, recipient)) {
            return None;
        }
        let (from, to) = (first.point()?, last.point()?);

        for subject in first.subjects() {
            let Some(list) = self.lists.get(&(actor, recipient, subject)) else {
                continue;
            };
            let lo = list.partition_point(|(date, _)| *date <= from);
            let hi = list.partition_point(|(date, _)| *date < to);
            let found = list.get(lo..hi).into_iter().flatten().find(|(_, id)| {
                snapshot
                    .communication(id)
                    .is_some_and(|middle| middle.shares_subject(last))
            });
            if let Some((_, id)) = found {
                return Some(*id);
            }
        }
        None
    }
}

/// Builds [`ChainLink`]s from a snapshot.
pub struct ChainBuilder;

impl ChainBuilder {
    #[must_use]
    pub fn build(snapshot: &Snapshot, config: &EngineConfig) -> Vec<ChainLink> {
        let _span = tracing::info_span!("chain_builder", window = config.chain_window_days).entered();
        let index = ChainIndex::build(snapshot);
        let candidates = index.candidates(config.chain_window_days);

        let mut rejected = 0usize;
        let mut links = Vec::new();
        for (earlier, later, days_diff) in candidates {
            if index.has_intermediate(earlier, later) {
                rejected = rejected.saturating_add(1);
                continue;
            }
            links.push(ChainLink {
                earlier: earlier.clone(),
                later: later.clone(),
                days_diff,
            });
        }

        tracing::debug!(
            links = links.len(),
            rejected_intermediate = rejected,
            "chain building done"
        );
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommunicationRecord, LinkType};

    fn comm(id: &str, date: &str, subject: &str) -> CommunicationRecord {
        CommunicationRecord::new(id, "org/gestapo", "org/landrat", LinkType::Informs)
            .with_subject(subject)
            .with_date(date)
    }

    fn build(comms: Vec<CommunicationRecord>) -> Vec<ChainLink> {
        ChainBuilder::build(&Snapshot::new(1, comms, Vec::new()), &EngineConfig::default())
    }

    fn link(a: &str, b: &str, days: u32) -> ChainLink {
        ChainLink {
            earlier: RecordId::new(a),
            later: RecordId::new(b),
            days_diff: days,
        }
    }

    #[test]
    fn three_link_chain() {
        let links = build(vec![
            comm("a", "1942-03-01", "p/x"),
            comm("b", "1942-03-10", "p/x"),
            comm("c", "1942-03-20", "p/x"),
            comm("d", "1942-03-31", "p/x"),
        ]);
        assert_eq!(
            links,
            vec![link("a", "b", 9), link("b", "c", 10), link("c", "d", 11)]
        );
    }

    #[test]
    fn same_day_fan_out() {
        let links = build(vec![
            comm("a", "1942-03-01", "p/x"),
            comm("b1", "1942-03-05", "p/x"),
            comm("b2", "1942-03-05", "p/x"),
        ]);
        assert_eq!(links, vec![link("a", "b1", 4), link("a", "b2", 4)]);
    }

    #[test]
    fn gap_exceeding_window() {
        let links = build(vec![
            comm("a", "1942-03-01", "p/x"),
            comm("b", "1942-03-16", "p/x"),
        ]);
        assert!(links.is_empty());

        let links = build(vec![
            comm("a", "1942-03-01", "p/x"),
            comm("b", "1942-03-15", "p/x"),
        ]);
        assert_eq!(links, vec![link("a", "b", 14)]);
    }

    #[test]
    fn no_common_subject_no_link() {
        let links = build(vec![
            comm("a", "1942-03-01", "p/x"),
            comm("b", "1942-03-05", "p/y"),
        ]);
        assert!(links.is_empty());
    }

    #[test]
    fn different_pair_no_link() {
        let other = CommunicationRecord::new("b", "org/landrat", "org/gestapo", LinkType::Informs)
            .with_subject("p/x")
            .with_date("1942-03-05");
        let links = build(vec![comm("a", "1942-03-01", "p/x"), other]);
        assert!(links.is_empty());
    }

    #[test]
    fn intermediate_must_share_subject_with_both() {
        // m shares only p/y with a, nothing with c: not an intermediate.
        let a = comm("a", "1942-03-01", "p/x").with_reference("p/y");
        let m = comm("m", "1942-03-03", "p/y");
        let c = comm("c", "1942-03-06", "p/x");
        let links = build(vec![a, m, c]);
        assert_eq!(links, vec![link("a", "c", 5), link("a", "m", 2)]);
    }

    #[test]
    fn reference_counts_as_subject() {
        let a = comm("a", "1942-03-01", "p/x");
        let b = CommunicationRecord::new("b", "org/gestapo", "org/landrat", LinkType::Informs)
            .with_reference("p/x")
            .with_date("1942-03-04");
        assert_eq!(build(vec![a, b]), vec![link("a", "b", 3)]);
    }

    #[test]
    fn non_point_dates_excluded() {
        let links = build(vec![
            comm("a", "1942-03-01", "p/x"),
            comm("b", "1942-03-05~", "p/x"),
            comm("c", "1942-03-01/1942-03-09", "p/x"),
        ]);
        assert!(links.is_empty());
    }

    #[test]
    fn index_reports_intermediate() {
        let snapshot = Snapshot::new(
            1,
            vec![
                comm("a", "1942-03-01", "p/x"),
                comm("b", "1942-03-05", "p/x"),
                comm("c", "1942-03-09", "p/x"),
            ],
            Vec::new(),
        );
        let index = ChainIndex::build(&snapshot);
        assert_eq!(
            index.intermediate(&RecordId::new("a"), &RecordId::new("c")),
            Some(&RecordId::new("b"))
        );
        assert!(!index.has_intermediate(&RecordId::new("a"), &RecordId::new("b")));
    }
}
