//! # Reply Matcher
//!
//! Pairs each reply or acknowledgment with the communication it answers.
//!
//! A reply from `A` to `B` answers the latest communication from `B` to
//! `A` dated strictly before it. Equal latest dates are resolved by the
//! smallest record id, so every reply gets at most one original.

use crate::config::EngineConfig;
use crate::graph::Snapshot;
use crate::temporal::{CalendarDate, day_diff};
use crate::{CommunicationRecord, EntityRef, RecordId, ReplyLink};
use std::collections::BTreeMap;

/// Date-sorted communications per `(actor, recipient)` pair.
struct PairIndex<'a> {
    by_pair: BTreeMap<(&'a EntityRef, &'a EntityRef), Vec<(CalendarDate, &'a RecordId)>>,
}

impl<'a> PairIndex<'a> {
    fn build(communications: &'a [CommunicationRecord]) -> Self {
        let mut by_pair: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for record in communications {
            let (Some(pair), Some(date)) = (record.pair(), record.point()) else {
                continue;
            };
            by_pair.entry(pair).or_default().push((date, &record.id));
        }
        for list in by_pair.values_mut() {
            list.sort();
        }
        Self { by_pair }
    }

    /// Latest entry of `(actor, recipient)` strictly before `before`,
    /// smallest id among equal dates.
    fn latest_before(
        &self,
        actor: &'a EntityRef,
        recipient: &'a EntityRef,
        before: CalendarDate,
    ) -> Option<(CalendarDate, &'a RecordId)> {
        let list = self.by_pair.get(&(actor, recipient))?;
        let end = list.partition_point(|(date, _)| *date < before);
        let (latest, _) = *list.get(end.checked_sub(1)?)?;
        let first = list.partition_point(|(date, _)| *date < latest);
        list.get(first).copied()
    }
}

/// Builds [`ReplyLink`]s from a snapshot.
pub struct ReplyMatcher;

impl ReplyMatcher {
    /// Compute every reply link of the snapshot.
    ///
    /// Replies without actor, recipient or a point date, and replies that
    /// already name their original in the source, are skipped.
    #[must_use]
    pub fn build(snapshot: &Snapshot, config: &EngineConfig) -> Vec<ReplyLink> {
        let _span = tracing::info_span!("reply_matcher").entered();
        let index = PairIndex::build(snapshot.communications());

        let mut links = Vec::new();
        let mut unmatched = 0usize;
        for reply in snapshot.communications() {
            if !reply.link_type.is_reply() || reply.replies_to.is_some() {
                continue;
            }
            let (Some((actor, recipient)), Some(date)) = (reply.pair(), reply.point()) else {
                continue;
            };

            let found = index
                .latest_before(recipient, actor, date)
                .filter(|(original_date, _)| {
                    config.reply_window_days.is_none_or(|window| {
                        day_diff(*original_date, date) <= i64::from(window)
                    })
                });

            match found {
                Some((_, original)) => links.push(ReplyLink {
                    reply: reply.id.clone(),
                    original: original.clone(),
                }),
                None => unmatched = unmatched.saturating_add(1),
            }
        }

        tracing::debug!(links = links.len(), unmatched, "reply matching done");
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LinkType, PersecutionEvent};

    const GESTAPO: &str = "org/gestapo";
    const MAYOR: &str = "org/mayor";

    fn comm(id: &str, from: &str, to: &str, lt: LinkType, date: &str) -> CommunicationRecord {
        CommunicationRecord::new(id, from, to, lt).with_date(date)
    }

    fn snapshot(comms: Vec<CommunicationRecord>) -> Snapshot {
        Snapshot::new(1, comms, Vec::<PersecutionEvent>::new())
    }

    fn build(comms: Vec<CommunicationRecord>) -> Vec<ReplyLink> {
        ReplyMatcher::build(&snapshot(comms), &EngineConfig::default())
    }

    fn link(reply: &str, original: &str) -> ReplyLink {
        ReplyLink {
            reply: RecordId::new(reply),
            original: RecordId::new(original),
        }
    }

    #[test]
    fn picks_latest_earlier_candidate() {
        let links = build(vec![
            comm("c1", GESTAPO, MAYOR, LinkType::Requests, "1942-03-01"),
            comm("c2", GESTAPO, MAYOR, LinkType::Requests, "1942-03-10"),
            comm("r", MAYOR, GESTAPO, LinkType::RepliesTo, "1942-03-15"),
        ]);
        assert_eq!(links, vec![link("r", "c2")]);
    }

    #[test]
    fn same_day_tie_breaks_on_smallest_id() {
        let links = build(vec![
            comm("c9", GESTAPO, MAYOR, LinkType::Requests, "1942-03-10"),
            comm("c3", GESTAPO, MAYOR, LinkType::Requests, "1942-03-10"),
            comm("r", MAYOR, GESTAPO, LinkType::AcknowledgesReceipt, "1942-03-15"),
        ]);
        assert_eq!(links, vec![link("r", "c3")]);
    }

    #[test]
    fn same_day_candidate_is_not_earlier() {
        let links = build(vec![
            comm("c1", GESTAPO, MAYOR, LinkType::Requests, "1942-03-15"),
            comm("r", MAYOR, GESTAPO, LinkType::RepliesTo, "1942-03-15"),
        ]);
        assert!(links.is_empty());
    }

    #[test]
    fn direction_must_be_swapped() {
        let links = build(vec![
            comm("c1", MAYOR, GESTAPO, LinkType::Requests, "1942-03-01"),
            comm("r", MAYOR, GESTAPO, LinkType::RepliesTo, "1942-03-15"),
        ]);
        assert!(links.is_empty());
    }

    #[test]
    fn non_reply_types_are_ignored() {
        let links = build(vec![
            comm("c1", GESTAPO, MAYOR, LinkType::Requests, "1942-03-01"),
            comm("r", MAYOR, GESTAPO, LinkType::Informs, "1942-03-15"),
        ]);
        assert!(links.is_empty());
    }

    #[test]
    fn source_asserted_replies_are_skipped() {
        let links = build(vec![
            comm("c1", GESTAPO, MAYOR, LinkType::Requests, "1942-03-01"),
            comm("r", MAYOR, GESTAPO, LinkType::RepliesTo, "1942-03-15").with_replies_to("c0"),
        ]);
        assert!(links.is_empty());
    }

    #[test]
    fn undated_and_coarse_dates() {
        let links = build(vec![
            comm("c1", GESTAPO, MAYOR, LinkType::Requests, "1942-02"),
            comm("c2", GESTAPO, MAYOR, LinkType::Requests, "1942-03~"),
            comm("r", MAYOR, GESTAPO, LinkType::RepliesTo, "1942-03-15"),
            CommunicationRecord::new("r2", MAYOR, GESTAPO, LinkType::RepliesTo),
        ]);
        assert_eq!(links, vec![link("r", "c1")]);
    }

    #[test]
    fn reply_window_bounds_search() {
        let comms = vec![
            comm("c1", GESTAPO, MAYOR, LinkType::Requests, "1942-01-01"),
            comm("r", MAYOR, GESTAPO, LinkType::RepliesTo, "1942-06-01"),
        ];
        let config = EngineConfig {
            reply_window_days: Some(90),
            ..EngineConfig::default()
        };
        assert!(ReplyMatcher::build(&snapshot(comms.clone()), &config).is_empty());
        assert_eq!(build(comms), vec![link("r", "c1")]);
    }
}
