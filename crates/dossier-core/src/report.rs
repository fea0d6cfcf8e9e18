//! # Recompute Report
//!
//! Structured summary of one recomputation run: edge counts per kind,
//! `days_diff` distribution, validator findings, coverage, snapshot revision
//! and the fingerprint of the stored edge set.
//!
//! Averages are integer millionths of a day; no floating point.

use crate::validator::ValidationReport;
use crate::{ChainLink, EdgeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Distribution of chain `days_diff` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysDiffStats {
    pub count: usize,
    pub min: u32,
    pub max: u32,
    /// Mean `days_diff` in millionths of a day, truncated.
    pub mean_millionths: u64,
}

impl DaysDiffStats {
    /// `None` when there are no links.
    #[must_use]
    pub fn from_links(links: &[ChainLink]) -> Option<Self> {
        let min = links.iter().map(|l| l.days_diff).min()?;
        let max = links.iter().map(|l| l.days_diff).max()?;
        let sum: u64 = links.iter().map(|l| u64::from(l.days_diff)).sum();
        let count = links.len();
        let mean_millionths = sum.saturating_mul(1_000_000) / count as u64;
        Some(Self {
            count,
            min,
            max,
            mean_millionths,
        })
    }

    /// Mean rendered as a decimal with two places, e.g. `9.67`.
    #[must_use]
    pub fn mean_display(&self) -> String {
        let whole = self.mean_millionths / 1_000_000;
        let hundredths = (self.mean_millionths % 1_000_000) / 10_000;
        format!("{whole}.{hundredths:02}")
    }
}

/// The report returned by [`crate::Engine::recompute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub snapshot_revision: u64,
    pub chain_window_days: u32,
    /// Edges written per recomputed kind. Disabled kinds are absent.
    pub created: BTreeMap<EdgeKind, usize>,
    /// Over the stored chain links.
    pub days_diff: Option<DaysDiffStats>,
    pub validation: ValidationReport,
    /// BLAKE3 fingerprint of the stored edge set.
    pub fingerprint: String,
}

impl RecomputeReport {
    #[must_use]
    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }

    /// Human-readable multi-line rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Snapshot revision: {}", self.snapshot_revision);
        let _ = writeln!(out, "Chain window:      {} days", self.chain_window_days);
        let _ = writeln!(out, "Edges written:");
        for kind in EdgeKind::ALL {
            match self.created.get(&kind) {
                Some(n) => {
                    let _ = writeln!(out, "  {:<28} {}", kind.relation_name(), n);
                }
                None => {
                    let _ = writeln!(out, "  {:<28} (skipped)", kind.relation_name());
                }
            }
        }
        match &self.days_diff {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "days_diff:         min {} / max {} / mean {} over {} links",
                    s.min,
                    s.max,
                    s.mean_display(),
                    s.count
                );
            }
            None => {
                let _ = writeln!(out, "days_diff:         no chain links");
            }
        }
        let v = &self.validation;
        let _ = writeln!(
            out,
            "Coverage:          {}/{} linked ({}.{}%)",
            v.eligible_records.saturating_sub(v.isolated_records.len()),
            v.eligible_records,
            v.coverage_per_mille / 10,
            v.coverage_per_mille % 10
        );
        if v.findings.is_empty() {
            let _ = writeln!(out, "Findings:          none");
        } else {
            let _ = writeln!(out, "Findings:          {}", v.findings.len());
            for finding in &v.findings {
                let _ = writeln!(out, "  - {finding}");
            }
        }
        let _ = write!(out, "Fingerprint:       {}", self.fingerprint);
        out
    }
}

impl fmt::Display for RecomputeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_text())
    }
}
