//! # Engine Configuration
//!
//! The few runtime-tunable parameters of a recomputation run.
//! Everything else is fixed in [`crate::primitives`].

use crate::primitives::{
    DEFAULT_CHAIN_WINDOW_DAYS, MAX_CHAIN_WINDOW_DAYS, MAX_CONTEXT_SLACK_DAYS,
    MAX_REPLY_WINDOW_DAYS,
};
use crate::{DossierError, EdgeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration of one recomputation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest `days_diff` a chain link may carry.
    pub chain_window_days: u32,
    /// Edge kinds recomputed by a run. Disabled kinds are left untouched.
    pub enabled_kinds: BTreeSet<EdgeKind>,
    /// Upper bound on how far back a reply looks for its original.
    /// `None` is unbounded.
    pub reply_window_days: Option<u32>,
    /// Days by which an event interval is widened on both sides when
    /// matching communications against it.
    pub context_slack_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_window_days: DEFAULT_CHAIN_WINDOW_DAYS,
            enabled_kinds: EdgeKind::ALL.into_iter().collect(),
            reply_window_days: None,
            context_slack_days: 0,
        }
    }
}

impl EngineConfig {
    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), DossierError> {
        if !(1..=MAX_CHAIN_WINDOW_DAYS).contains(&self.chain_window_days) {
            return Err(DossierError::InvalidConfig(format!(
                "chain_window_days must be in 1..={}, got {}",
                MAX_CHAIN_WINDOW_DAYS, self.chain_window_days
            )));
        }
        if let Some(days) = self.reply_window_days
            && !(1..=MAX_REPLY_WINDOW_DAYS).contains(&days)
        {
            return Err(DossierError::InvalidConfig(format!(
                "reply_window_days must be in 1..={}, got {}",
                MAX_REPLY_WINDOW_DAYS, days
            )));
        }
        if self.context_slack_days > MAX_CONTEXT_SLACK_DAYS {
            return Err(DossierError::InvalidConfig(format!(
                "context_slack_days must be in 0..={}, got {}",
                MAX_CONTEXT_SLACK_DAYS, self.context_slack_days
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_enabled(&self, kind: EdgeKind) -> bool {
        self.enabled_kinds.contains(&kind)
    }

    /// Builder-style override of the chain window.
    #[must_use]
    pub fn with_chain_window(mut self, days: u32) -> Self {
        self.chain_window_days = days;
        self
    }

    /// Restrict the run to the given kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EdgeKind>) -> Self {
        self.enabled_kinds = kinds.into_iter().collect();
        self
    }
}
