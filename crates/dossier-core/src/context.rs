//! # Context Linker
//!
//! Associates communications with the persecution events they were written
//! around.
//!
//! A communication acts in the context of an event when the event's victim
//! is in the communication's subject set and the communication's span
//! intersects the event interval, widened on both sides by
//! `context_slack_days`. Every compatible event is linked.

use crate::config::EngineConfig;
use crate::graph::Snapshot;
use crate::temporal::{CalendarDate, day_diff};
use crate::{ContextLink, EntityRef, PersecutionEvent};
use std::collections::BTreeMap;

/// Whether `[a_start, a_end]` and `[b_start, b_end]` intersect once `b` is
/// widened by `slack` days on both sides.
#[must_use]
pub fn overlaps_with_slack(
    (a_start, a_end): (CalendarDate, CalendarDate),
    (b_start, b_end): (CalendarDate, CalendarDate),
    slack: u32,
) -> bool {
    let slack = i64::from(slack);
    day_diff(b_end, a_start) <= slack && day_diff(a_end, b_start) <= slack
}

/// Builds [`ContextLink`]s from a snapshot.
pub struct ContextLinker;

impl ContextLinker {
    #[must_use]
    pub fn build(snapshot: &Snapshot, config: &EngineConfig) -> Vec<ContextLink> {
        let _span = tracing::info_span!("context_linker", slack = config.context_slack_days)
            .entered();

        let mut by_victim: BTreeMap<&EntityRef, Vec<(&PersecutionEvent, (CalendarDate, CalendarDate))>> =
            BTreeMap::new();
        for event in snapshot.events() {
            if let Some(interval) = event.interval() {
                by_victim.entry(&event.victim).or_default().push((event, interval));
            }
        }

        let mut links = Vec::new();
        for record in snapshot.communications() {
            let Some(span) = record.date.as_ref().and_then(|d| d.span()) else {
                continue;
            };
            for subject in record.subjects() {
                let Some(events) = by_victim.get(subject) else {
                    continue;
                };
                links.extend(
                    events
                        .iter()
                        .filter(|(_, interval)| {
                            overlaps_with_slack(span, *interval, config.context_slack_days)
                        })
                        .map(|(event, _)| ContextLink {
                            action: record.id.clone(),
                            event: event.id.clone(),
                        }),
                );
            }
        }
        links.sort();
        links.dedup();

        tracing::debug!(links = links.len(), "context linking done");
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommunicationRecord, LinkType, RecordId};

    fn comm(id: &str, date: &str, subject: &str) -> CommunicationRecord {
        CommunicationRecord::new(id, "org/gestapo", "org/court", LinkType::Reports)
            .with_subject(subject)
            .with_date(date)
    }

    fn event(id: &str, victim: &str, date: &str) -> PersecutionEvent {
        PersecutionEvent::new(id, victim)
            .with_tags("persecution/deprivation_of_liberty/arrest")
            .with_date(date)
    }

    fn link(action: &str, event: &str) -> ContextLink {
        ContextLink {
            action: RecordId::new(action),
            event: RecordId::new(event),
        }
    }

    fn build(
        comms: Vec<CommunicationRecord>,
        events: Vec<PersecutionEvent>,
        config: &EngineConfig,
    ) -> Vec<ContextLink> {
        ContextLinker::build(&Snapshot::new(1, comms, events), config)
    }

    #[test]
    fn overlap_inside_interval() {
        let links = build(
            vec![comm("m1", "1942-04-02", "p/x")],
            vec![event("e1", "p/x", "1942-03-29/1942-04-27")],
            &EngineConfig::default(),
        );
        assert_eq!(links, vec![link("m1", "e1")]);
    }

    #[test]
    fn outside_interval_needs_slack() {
        let comms = vec![comm("m1", "1942-05-01", "p/x")];
        let events = vec![event("e1", "p/x", "1942-03-29/1942-04-27")];
        assert!(build(comms.clone(), events.clone(), &EngineConfig::default()).is_empty());

        let config = EngineConfig {
            context_slack_days: 4,
            ..EngineConfig::default()
        };
        assert_eq!(build(comms, events, &config), vec![link("m1", "e1")]);
    }

    #[test]
    fn victim_must_be_subject() {
        let links = build(
            vec![comm("m1", "1942-04-02", "p/y")],
            vec![event("e1", "p/x", "1942-04")],
            &EngineConfig::default(),
        );
        assert!(links.is_empty());
    }

    #[test]
    fn month_span_overlaps_day_event() {
        let links = build(
            vec![comm("m1", "1942-04", "p/x")],
            vec![event("e1", "p/x", "1942-04-30")],
            &EngineConfig::default(),
        );
        assert_eq!(links, vec![link("m1", "e1")]);
    }

    #[test]
    fn all_compatible_events_linked() {
        let links = build(
            vec![comm("m1", "1942-04-02", "p/x").with_reference("p/z")],
            vec![
                event("e1", "p/x", "1942-04"),
                event("e2", "p/x", "1942"),
                event("e3", "p/z", "1942-03-01/1942-04-10"),
                event("e4", "p/x", "../1942-05"),
            ],
            &EngineConfig::default(),
        );
        assert_eq!(
            links,
            vec![link("m1", "e1"), link("m1", "e2"), link("m1", "e3")]
        );
    }

    #[test]
    fn slack_is_symmetric() {
        let d = |s: &str| CalendarDate::parse_iso(s).expect("date");
        let event = (d("1942-04-10"), d("1942-04-20"));
        assert!(overlaps_with_slack((d("1942-04-08"), d("1942-04-08")), event, 2));
        assert!(!overlaps_with_slack((d("1942-04-07"), d("1942-04-07")), event, 2));
        assert!(overlaps_with_slack((d("1942-04-22"), d("1942-04-22")), event, 2));
        assert!(!overlaps_with_slack((d("1942-04-23"), d("1942-04-23")), event, 2));
    }
}
