//! # Case Sequencer
//!
//! Orders each victim's persecution events into a timeline.
//!
//! Events with a closed interval are sorted by `(start, id)` per victim and
//! each consecutive pair is linked. Undated and open-ended events do not
//! take part.

use crate::graph::Snapshot;
use crate::temporal::CalendarDate;
use crate::{CaseSequenceLink, EntityRef, RecordId};
use std::collections::BTreeMap;

/// Per victim, the usable events in timeline order.
#[must_use]
pub fn case_timelines(snapshot: &Snapshot) -> BTreeMap<&EntityRef, Vec<(CalendarDate, &RecordId)>> {
    let mut timelines: BTreeMap<&EntityRef, Vec<_>> = BTreeMap::new();
    for event in snapshot.events() {
        if let Some(start) = event.start() {
            timelines
                .entry(&event.victim)
                .or_default()
                .push((start, &event.id));
        }
    }
    for events in timelines.values_mut() {
        events.sort();
    }
    timelines
}

/// Builds [`CaseSequenceLink`]s from a snapshot.
pub struct CaseSequencer;

impl CaseSequencer {
    #[must_use]
    pub fn build(snapshot: &Snapshot) -> Vec<CaseSequenceLink> {
        let _span = tracing::info_span!("case_sequencer").entered();
        let timelines = case_timelines(snapshot);

        let mut links = Vec::new();
        for (victim, events) in &timelines {
            for pair in events.windows(2) {
                if let [(_, earlier), (_, later)] = pair {
                    links.push(CaseSequenceLink {
                        victim: (*victim).clone(),
                        earlier: (*earlier).clone(),
                        later: (*later).clone(),
                    });
                }
            }
        }

        tracing::debug!(
            victims = timelines.len(),
            links = links.len(),
            "case sequencing done"
        );
        links
    }
}
