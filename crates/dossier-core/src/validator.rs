//! # Validator
//!
//! Read-only checks over a snapshot and the edges as stored.
//!
//! The validator never mutates anything: it reports findings and a coverage
//! metric, and leaves correction to whoever reads the report.
//!
//! ## Checks
//!
//! - chain `days_diff` equals the recomputed day difference and lies
//!   within `[0, window]`
//! - no chain link has an intermediate record, and no record links both to
//!   `m` and `l` while `m -> l` is itself a link (skip link)
//! - at most one computed reply link per reply
//! - case-sequence links stay within one victim and never go back in time
//! - every computed edge endpoint exists in the snapshot
//! - coverage: dated, subject-bearing communications with no chain or
//!   reply link at all

use crate::chain::ChainIndex;
use crate::config::EngineConfig;
use crate::graph::Snapshot;
use crate::temporal::day_diff;
use crate::{EdgeKind, EdgeSet, EntityRef, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// FINDINGS
// =============================================================================

/// One problem detected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    /// Stored `days_diff` disagrees with the recomputed difference.
    DaysDiffMismatch {
        earlier: RecordId,
        later: RecordId,
        stored: u32,
        recomputed: i64,
    },
    /// `days_diff` above the configured window.
    OutsideWindow {
        earlier: RecordId,
        later: RecordId,
        days_diff: u32,
        window: u32,
    },
    /// A record sits strictly between the endpoints of a chain link.
    IntermediateRecord {
        earlier: RecordId,
        later: RecordId,
        intermediate: RecordId,
    },
    /// `from -> via`, `via -> to` and `from -> to` are all chain links.
    SkipLink {
        from: RecordId,
        via: RecordId,
        to: RecordId,
    },
    /// More than one computed reply link for the same reply.
    ReplyMultiplicity { reply: RecordId, count: usize },
    /// A case-sequence link going back in time.
    CaseOrderInversion {
        victim: EntityRef,
        earlier: RecordId,
        later: RecordId,
    },
    /// A case-sequence link between events of different victims.
    CaseVictimMismatch {
        victim: EntityRef,
        earlier: RecordId,
        later: RecordId,
    },
    /// An edge endpoint missing from the snapshot.
    DanglingEndpoint { kind: EdgeKind, id: RecordId },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DaysDiffMismatch {
                earlier,
                later,
                stored,
                recomputed,
            } => write!(
                f,
                "chain {earlier} -> {later}: days_diff {stored}, recomputed {recomputed}"
            ),
            Self::OutsideWindow {
                earlier,
                later,
                days_diff,
                window,
            } => write!(
                f,
                "chain {earlier} -> {later}: days_diff {days_diff} outside window {window}"
            ),
            Self::IntermediateRecord {
                earlier,
                later,
                intermediate,
            } => write!(
                f,
                "chain {earlier} -> {later}: intermediate record {intermediate}"
            ),
            Self::SkipLink { from, via, to } => {
                write!(f, "chain {from} -> {to} skips {via}")
            }
            Self::ReplyMultiplicity { reply, count } => {
                write!(f, "reply {reply} has {count} originals")
            }
            Self::CaseOrderInversion {
                victim,
                earlier,
                later,
            } => write!(f, "case of {victim}: {earlier} -> {later} goes back in time"),
            Self::CaseVictimMismatch {
                victim,
                earlier,
                later,
            } => write!(
                f,
                "case of {victim}: {earlier} -> {later} crosses victims"
            ),
            Self::DanglingEndpoint { kind, id } => {
                write!(f, "{kind} edge endpoint {id} not in snapshot")
            }
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Result of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// Communications with a point date and at least one subject.
    pub eligible_records: usize,
    /// Eligible communications with no chain or reply link.
    pub isolated_records: Vec<RecordId>,
    /// Linked share of eligible records, in per-mille. 1000 when nothing
    /// is eligible.
    pub coverage_per_mille: u32,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Runs every check over a snapshot and its stored edges.
pub struct Validator;

impl Validator {
    #[must_use]
    pub fn validate(snapshot: &Snapshot, edges: &EdgeSet, config: &EngineConfig) -> ValidationReport {
        let _span = tracing::info_span!("validator").entered();
        let mut findings = BTreeSet::new();

        check_endpoints(snapshot, edges, &mut findings);
        check_chains(snapshot, edges, config, &mut findings);
        check_replies(edges, &mut findings);
        check_case_sequences(snapshot, edges, &mut findings);

        let (eligible_records, isolated_records) = coverage(snapshot, edges);
        let linked = eligible_records.saturating_sub(isolated_records.len());
        let coverage_per_mille = if eligible_records == 0 {
            1000
        } else {
            (linked.saturating_mul(1000) / eligible_records) as u32
        };

        for finding in &findings {
            tracing::warn!(%finding, "validation finding");
        }
        tracing::info!(
            findings = findings.len(),
            eligible = eligible_records,
            isolated = isolated_records.len(),
            coverage_per_mille,
            "validation done"
        );

        ValidationReport {
            findings: findings.into_iter().collect(),
            eligible_records,
            isolated_records,
            coverage_per_mille,
        }
    }
}

fn check_endpoints(snapshot: &Snapshot, edges: &EdgeSet, findings: &mut BTreeSet<Finding>) {
    for batch in edges.batches() {
        for (from, to) in batch.endpoints() {
            for id in [from, to] {
                if !snapshot.contains(id) {
                    findings.insert(Finding::DanglingEndpoint {
                        kind: batch.kind(),
                        id: id.clone(),
                    });
                }
            }
        }
    }
}

fn check_chains(
    snapshot: &Snapshot,
    edges: &EdgeSet,
    config: &EngineConfig,
    findings: &mut BTreeSet<Finding>,
) {
    let index = ChainIndex::build(snapshot);
    let mut outgoing: BTreeMap<&RecordId, BTreeSet<&RecordId>> = BTreeMap::new();

    for link in edges.chains() {
        outgoing.entry(&link.earlier).or_default().insert(&link.later);

        if link.days_diff > config.chain_window_days {
            findings.insert(Finding::OutsideWindow {
                earlier: link.earlier.clone(),
                later: link.later.clone(),
                days_diff: link.days_diff,
                window: config.chain_window_days,
            });
        }

        let dates = snapshot
            .communication(&link.earlier)
            .and_then(|c| c.point())
            .zip(snapshot.communication(&link.later).and_then(|c| c.point()));
        if let Some((from, to)) = dates {
            let recomputed = day_diff(from, to);
            if recomputed != i64::from(link.days_diff) {
                findings.insert(Finding::DaysDiffMismatch {
                    earlier: link.earlier.clone(),
                    later: link.later.clone(),
                    stored: link.days_diff,
                    recomputed,
                });
            }
        }

        if let Some(intermediate) = index.intermediate(&link.earlier, &link.later) {
            findings.insert(Finding::IntermediateRecord {
                earlier: link.earlier.clone(),
                later: link.later.clone(),
                intermediate: intermediate.clone(),
            });
        }
    }

    for (from, targets) in &outgoing {
        for via in targets {
            let Some(next) = outgoing.get(via) else {
                continue;
            };
            for to in next.intersection(targets) {
                findings.insert(Finding::SkipLink {
                    from: (*from).clone(),
                    via: (*via).clone(),
                    to: (*to).clone(),
                });
            }
        }
    }
}

fn check_replies(edges: &EdgeSet, findings: &mut BTreeSet<Finding>) {
    let mut per_reply: BTreeMap<&RecordId, usize> = BTreeMap::new();
    for link in edges.replies() {
        let count = per_reply.entry(&link.reply).or_default();
        *count = count.saturating_add(1);
    }
    for (reply, count) in per_reply {
        if count > 1 {
            findings.insert(Finding::ReplyMultiplicity {
                reply: reply.clone(),
                count,
            });
        }
    }
}

fn check_case_sequences(snapshot: &Snapshot, edges: &EdgeSet, findings: &mut BTreeSet<Finding>) {
    for link in edges.case_sequences() {
        let (Some(earlier), Some(later)) =
            (snapshot.event(&link.earlier), snapshot.event(&link.later))
        else {
            continue;
        };
        if earlier.victim != link.victim || later.victim != link.victim {
            findings.insert(Finding::CaseVictimMismatch {
                victim: link.victim.clone(),
                earlier: link.earlier.clone(),
                later: link.later.clone(),
            });
        }
        if let (Some(a), Some(b)) = (earlier.start(), later.start())
            && a > b
        {
            findings.insert(Finding::CaseOrderInversion {
                victim: link.victim.clone(),
                earlier: link.earlier.clone(),
                later: link.later.clone(),
            });
        }
    }
}

/// `(eligible, isolated)` communications.
fn coverage(snapshot: &Snapshot, edges: &EdgeSet) -> (usize, Vec<RecordId>) {
    let mut linked: BTreeSet<&RecordId> = BTreeSet::new();
    for link in edges.chains() {
        linked.insert(&link.earlier);
        linked.insert(&link.later);
    }
    for link in edges.replies() {
        linked.insert(&link.reply);
        linked.insert(&link.original);
    }
    for record in snapshot.communications() {
        if let Some(original) = &record.replies_to {
            linked.insert(&record.id);
            linked.insert(original);
        }
    }

    let mut eligible = 0usize;
    let mut isolated = Vec::new();
    for record in snapshot.communications() {
        if record.point().is_none() || record.subjects().is_empty() {
            continue;
        }
        eligible = eligible.saturating_add(1);
        if !linked.contains(&record.id) {
            isolated.push(record.id.clone());
        }
    }
    (eligible, isolated)
}
