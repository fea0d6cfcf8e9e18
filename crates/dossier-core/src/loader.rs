//! # Loader Module
//!
//! Validation and loading of base-record batches.
//!
//! - Validate every record before the store is touched
//! - Reject the whole batch on the first malformed record
//! - No enrichment: records are stored exactly as given

use crate::graph::GraphFacade;
use crate::primitives::{MAX_BATCH_LENGTH, MAX_DATE_LENGTH, MAX_ID_LENGTH};
use crate::store::Store;
use crate::temporal::EdtfDate;
use crate::{CommunicationRecord, DossierError, EntityRef, PersecutionEvent, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A batch of base records, as read from an import file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordBatch {
    pub communications: Vec<CommunicationRecord>,
    pub events: Vec<PersecutionEvent>,
}

impl RecordBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.communications.len().saturating_add(self.events.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a successful load wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub communications: usize,
    pub events: usize,
    /// Store revision after the load.
    pub revision: u64,
}

/// Validates and loads record batches.
pub struct Loader;

impl Loader {
    /// Validate a batch.
    ///
    /// A batch is valid if:
    /// - it holds at most `MAX_BATCH_LENGTH` records
    /// - every id and entity reference is non-empty and within length limits
    /// - no id occurs twice in the batch, across communications and events
    /// - no raw date exceeds `MAX_DATE_LENGTH`
    /// - no communication names itself as its reply target
    pub fn validate_batch(batch: &RecordBatch) -> Result<(), DossierError> {
        if batch.len() > MAX_BATCH_LENGTH {
            return Err(DossierError::InvalidRecord(format!(
                "batch of {} records exceeds maximum {}",
                batch.len(),
                MAX_BATCH_LENGTH
            )));
        }

        let mut seen: BTreeSet<&RecordId> = BTreeSet::new();
        for record in &batch.communications {
            check_id(&record.id)?;
            if !seen.insert(&record.id) {
                return Err(duplicate(&record.id));
            }
            for entity in [&record.actor, &record.recipient, &record.subject]
                .into_iter()
                .flatten()
                .chain(record.references.iter())
            {
                check_entity(&record.id, entity)?;
            }
            for date in [&record.date, &record.in_reply_to_date].into_iter().flatten() {
                check_date(&record.id, date)?;
            }
            if record.replies_to.as_ref() == Some(&record.id) {
                return Err(DossierError::InvalidRecord(format!(
                    "{} replies to itself",
                    record.id
                )));
            }
        }
        for event in &batch.events {
            check_id(&event.id)?;
            if !seen.insert(&event.id) {
                return Err(duplicate(&event.id));
            }
            for entity in std::iter::once(&event.victim).chain(event.agent.iter()) {
                check_entity(&event.id, entity)?;
            }
            if let Some(date) = &event.date {
                check_date(&event.id, date)?;
            }
        }
        Ok(())
    }

    /// Validate a batch and write it to the store.
    ///
    /// Nothing is written when validation fails.
    pub fn load(store: &mut Store, batch: RecordBatch) -> Result<LoadSummary, DossierError> {
        Self::validate_batch(&batch)?;
        let communications = batch.communications.len();
        let events = batch.events.len();
        store.put_records(batch.communications, batch.events)?;
        let revision = store.revision()?;

        tracing::info!(communications, events, revision, "batch loaded");
        Ok(LoadSummary {
            communications,
            events,
            revision,
        })
    }
}

fn duplicate(id: &RecordId) -> DossierError {
    DossierError::InvalidRecord(format!("duplicate id {} in batch", id))
}

fn check_id(id: &RecordId) -> Result<(), DossierError> {
    let s = id.as_str();
    if s.trim().is_empty() {
        return Err(DossierError::InvalidRecord("empty record id".to_string()));
    }
    if s.len() > MAX_ID_LENGTH {
        return Err(DossierError::InvalidRecord(format!(
            "record id longer than {} bytes",
            MAX_ID_LENGTH
        )));
    }
    Ok(())
}

fn check_entity(owner: &RecordId, entity: &EntityRef) -> Result<(), DossierError> {
    let s = entity.as_str();
    if s.trim().is_empty() || s.len() > MAX_ID_LENGTH {
        return Err(DossierError::InvalidRecord(format!(
            "{}: invalid entity reference",
            owner
        )));
    }
    Ok(())
}

fn check_date(owner: &RecordId, date: &EdtfDate) -> Result<(), DossierError> {
    if date.raw().len() > MAX_DATE_LENGTH {
        return Err(DossierError::InvalidRecord(format!(
            "{}: date longer than {} bytes",
            owner, MAX_DATE_LENGTH
        )));
    }
    Ok(())
}
