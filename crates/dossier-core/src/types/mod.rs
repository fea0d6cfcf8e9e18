//! # Core Type Definitions
//!
//! This module contains the record model of the Dossier engine:
//! - Identifiers (`RecordId`, `EntityRef`)
//! - Base records (`CommunicationRecord`, `PersecutionEvent`)
//! - Derived edges (`ReplyLink`, `ChainLink`, `ContextLink`, `CaseSequenceLink`)
//!   and their per-kind batches (`EdgeKind`, `EdgeBatch`, `EdgeSet`)
//! - Error types (`DossierError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are stored, for deterministic ordering in
//!   `BTreeMap`/`BTreeSet` and sorted edge batches

use crate::temporal::{CalendarDate, EdtfDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identity of a base record (communication or event), e.g.
/// `/id/microaction/3f1c...` or `/id/event/9ab2...`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a person or organization entity of the base graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(pub String);

impl EntityRef {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// VOCABULARIES
// =============================================================================

/// How a communication relates to the correspondence around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Informs,
    Requests,
    Forwards,
    AcknowledgesReceipt,
    Summarizes,
    Supports,
    RepliesTo,
    Orders,
    Reports,
    Transmits,
    /// Missing or outside the vocabulary.
    #[default]
    #[serde(other)]
    Other,
}

impl LinkType {
    /// Replies and acknowledgments look for the record they answer.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::RepliesTo | Self::AcknowledgesReceipt)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informs => "informs",
            Self::Requests => "requests",
            Self::Forwards => "forwards",
            Self::AcknowledgesReceipt => "acknowledges_receipt",
            Self::Summarizes => "summarizes",
            Self::Supports => "supports",
            Self::RepliesTo => "replies_to",
            Self::Orders => "orders",
            Self::Reports => "reports",
            Self::Transmits => "transmits",
            Self::Other => "other",
        }
    }
}

/// Confidence attached to an extracted assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

/// A path in the persecution event taxonomy, e.g.
/// `persecution/deprivation_of_liberty/arrest`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TaxonomyPath(pub String);

impl TaxonomyPath {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Non-empty `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The most specific segment (the event type).
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.segments().last()
    }
}

// =============================================================================
// BASE RECORDS
// =============================================================================

/// A communication between organizational actors ("micro-action").
///
/// Immutable from the engine's point of view: builders read it, never
/// write it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationRecord {
    pub id: RecordId,
    /// Sending organization. `None` when the source does not name it.
    #[serde(default)]
    pub actor: Option<EntityRef>,
    /// Receiving organization or person.
    #[serde(default)]
    pub recipient: Option<EntityRef>,
    /// The person the communication concerns.
    #[serde(default)]
    pub subject: Option<EntityRef>,
    /// Further persons referenced by the communication.
    #[serde(default)]
    pub references: BTreeSet<EntityRef>,
    #[serde(default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub date: Option<EdtfDate>,
    /// Reply target asserted by the source itself.
    #[serde(default)]
    pub replies_to: Option<RecordId>,
    /// Date of the answered letter as quoted in the source.
    #[serde(default)]
    pub in_reply_to_date: Option<EdtfDate>,
}

impl CommunicationRecord {
    /// Create a communication from `actor` to `recipient`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        actor: impl Into<String>,
        recipient: impl Into<String>,
        link_type: LinkType,
    ) -> Self {
        Self {
            id: RecordId::new(id),
            actor: Some(EntityRef::new(actor)),
            recipient: Some(EntityRef::new(recipient)),
            subject: None,
            references: BTreeSet::new(),
            link_type,
            date: None,
            replies_to: None,
            in_reply_to_date: None,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(EntityRef::new(subject));
        self
    }

    #[must_use]
    pub fn with_reference(mut self, person: impl Into<String>) -> Self {
        self.references.insert(EntityRef::new(person));
        self
    }

    #[must_use]
    pub fn with_date(mut self, edtf: &str) -> Self {
        self.date = Some(EdtfDate::parse(edtf));
        self
    }

    #[must_use]
    pub fn with_replies_to(mut self, original: impl Into<String>) -> Self {
        self.replies_to = Some(RecordId::new(original));
        self
    }

    /// The subject set: `subject` plus `references`.
    #[must_use]
    pub fn subjects(&self) -> BTreeSet<&EntityRef> {
        self.subject.iter().chain(self.references.iter()).collect()
    }

    #[must_use]
    pub fn has_subject(&self, person: &EntityRef) -> bool {
        self.subject.as_ref() == Some(person) || self.references.contains(person)
    }

    /// At least one person in common.
    #[must_use]
    pub fn shares_subject(&self, other: &Self) -> bool {
        self.subjects().iter().any(|p| other.has_subject(p))
    }

    /// The temporal point used for reply and chain linking.
    #[must_use]
    pub fn point(&self) -> Option<CalendarDate> {
        self.date.as_ref().and_then(EdtfDate::point)
    }

    /// `(actor, recipient)` when both are known.
    #[must_use]
    pub fn pair(&self) -> Option<(&EntityRef, &EntityRef)> {
        Some((self.actor.as_ref()?, self.recipient.as_ref()?))
    }
}

/// A persecution event suffered by a victim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersecutionEvent {
    pub id: RecordId,
    pub victim: EntityRef,
    /// Acting organization. `None` is the unknown authority.
    #[serde(default)]
    pub agent: Option<EntityRef>,
    #[serde(default)]
    pub tags: TaxonomyPath,
    #[serde(default)]
    pub date: Option<EdtfDate>,
    #[serde(default)]
    pub confidence: Confidence,
}

impl PersecutionEvent {
    #[must_use]
    pub fn new(id: impl Into<String>, victim: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            victim: EntityRef::new(victim),
            agent: None,
            tags: TaxonomyPath::default(),
            date: None,
            confidence: Confidence::default(),
        }
    }

    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(EntityRef::new(agent));
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = TaxonomyPath::new(tags);
        self
    }

    #[must_use]
    pub fn with_date(mut self, edtf: &str) -> Self {
        self.date = Some(EdtfDate::parse(edtf));
        self
    }

    /// The event's active interval, when closed.
    #[must_use]
    pub fn interval(&self) -> Option<(CalendarDate, CalendarDate)> {
        self.date.as_ref().and_then(EdtfDate::interval)
    }

    /// Start of the active interval, the sort key of case sequencing.
    #[must_use]
    pub fn start(&self) -> Option<CalendarDate> {
        self.interval().map(|(start, _)| start)
    }
}

// =============================================================================
// DERIVED EDGES
// =============================================================================

/// `reply → original`: the reply answers the original.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplyLink {
    pub reply: RecordId,
    pub original: RecordId,
}

/// `earlier → later`: next correspondence of the same exchange.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainLink {
    pub earlier: RecordId,
    pub later: RecordId,
    pub days_diff: u32,
}

/// `action → event`: the communication acted in the context of the event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextLink {
    pub action: RecordId,
    pub event: RecordId,
}

/// `earlier → later` in one victim's case timeline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseSequenceLink {
    pub victim: EntityRef,
    pub earlier: RecordId,
    pub later: RecordId,
}

/// The kinds of edges computed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Reply,
    Chain,
    Context,
    CaseSequence,
}

impl EdgeKind {
    /// Every kind, in recomputation order.
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Reply,
        EdgeKind::Chain,
        EdgeKind::Context,
        EdgeKind::CaseSequence,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Chain => "chain",
            Self::Context => "context",
            Self::CaseSequence => "case_sequence",
        }
    }

    /// Relationship name used by the graph store.
    #[must_use]
    pub fn relation_name(&self) -> &'static str {
        match self {
            Self::Reply => "REPLIES_TO",
            Self::Chain => "NEXT_IN_COMMUNICATION_CHAIN",
            Self::Context => "ACTED_IN_CONTEXT_OF",
            Self::CaseSequence => "FOLLOWS_IN_CASE",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reply" | "replies_to" => Ok(Self::Reply),
            "chain" | "next_in_communication_chain" => Ok(Self::Chain),
            "context" | "acted_in_context_of" => Ok(Self::Context),
            "case_sequence" | "case" | "follows_in_case" => Ok(Self::CaseSequence),
            other => Err(DossierError::InvalidConfig(format!(
                "Unknown edge kind '{}'. Use: reply, chain, context, case_sequence",
                other
            ))),
        }
    }
}

/// All computed edges of one kind.
///
/// This is the unit of the atomic delete-then-insert performed by
/// [`crate::graph::GraphFacade::replace_computed_edges`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeBatch {
    Reply(Vec<ReplyLink>),
    Chain(Vec<ChainLink>),
    Context(Vec<ContextLink>),
    CaseSequence(Vec<CaseSequenceLink>),
}

impl EdgeBatch {
    /// An empty batch of the given kind.
    #[must_use]
    pub fn empty(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Reply => Self::Reply(Vec::new()),
            EdgeKind::Chain => Self::Chain(Vec::new()),
            EdgeKind::Context => Self::Context(Vec::new()),
            EdgeKind::CaseSequence => Self::CaseSequence(Vec::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EdgeKind {
        match self {
            Self::Reply(_) => EdgeKind::Reply,
            Self::Chain(_) => EdgeKind::Chain,
            Self::Context(_) => EdgeKind::Context,
            Self::CaseSequence(_) => EdgeKind::CaseSequence,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Reply(v) => v.len(),
            Self::Chain(v) => v.len(),
            Self::Context(v) => v.len(),
            Self::CaseSequence(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sort and deduplicate, giving the batch its canonical order.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn canon<T: Ord>(mut v: Vec<T>) -> Vec<T> {
            v.sort();
            v.dedup();
            v
        }
        match self {
            Self::Reply(v) => Self::Reply(canon(v)),
            Self::Chain(v) => Self::Chain(canon(v)),
            Self::Context(v) => Self::Context(canon(v)),
            Self::CaseSequence(v) => Self::CaseSequence(canon(v)),
        }
    }

    /// `(from, to)` endpoints of every edge in the batch.
    #[must_use]
    pub fn endpoints(&self) -> Vec<(&RecordId, &RecordId)> {
        match self {
            Self::Reply(v) => v.iter().map(|l| (&l.reply, &l.original)).collect(),
            Self::Chain(v) => v.iter().map(|l| (&l.earlier, &l.later)).collect(),
            Self::Context(v) => v.iter().map(|l| (&l.action, &l.event)).collect(),
            Self::CaseSequence(v) => v.iter().map(|l| (&l.earlier, &l.later)).collect(),
        }
    }
}

/// The computed edges of one recomputation, one batch per kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeSet {
    batches: BTreeMap<EdgeKind, EdgeBatch>,
}

impl EdgeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a batch, replacing any previous batch of the same kind.
    pub fn insert(&mut self, batch: EdgeBatch) {
        let batch = batch.normalized();
        self.batches.insert(batch.kind(), batch);
    }

    #[must_use]
    pub fn get(&self, kind: EdgeKind) -> Option<&EdgeBatch> {
        self.batches.get(&kind)
    }

    /// Batches in kind order.
    pub fn batches(&self) -> impl Iterator<Item = &EdgeBatch> {
        self.batches.values()
    }

    #[must_use]
    pub fn replies(&self) -> &[ReplyLink] {
        match self.batches.get(&EdgeKind::Reply) {
            Some(EdgeBatch::Reply(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn chains(&self) -> &[ChainLink] {
        match self.batches.get(&EdgeKind::Chain) {
            Some(EdgeBatch::Chain(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn contexts(&self) -> &[ContextLink] {
        match self.batches.get(&EdgeKind::Context) {
            Some(EdgeBatch::Context(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn case_sequences(&self) -> &[CaseSequenceLink] {
        match self.batches.get(&EdgeKind::CaseSequence) {
            Some(EdgeBatch::CaseSequence(v)) => v,
            _ => &[],
        }
    }

    /// Edge count per kind present in the set.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<EdgeKind, usize> {
        self.batches.iter().map(|(k, b)| (*k, b.len())).collect()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.batches.values().map(EdgeBatch::len).sum()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Dossier engine.
///
/// Missing dates, subjects or actors are NOT errors: such records are
/// excluded from the computation that needs them.
#[derive(Debug, Error)]
pub enum DossierError {
    /// Engine configuration is out of range or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input record failed validation.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The requested record does not exist in the store.
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_link_types() {
        assert!(LinkType::RepliesTo.is_reply());
        assert!(LinkType::AcknowledgesReceipt.is_reply());
        assert!(!LinkType::Informs.is_reply());
        assert!(!LinkType::Other.is_reply());
    }

    #[test]
    fn unknown_link_type_deserializes_as_other() {
        let lt: LinkType = serde_json::from_str("\"threatens\"").expect("parse");
        assert_eq!(lt, LinkType::Other);
        let lt: LinkType = serde_json::from_str("\"acknowledges_receipt\"").expect("parse");
        assert_eq!(lt, LinkType::AcknowledgesReceipt);
    }

    #[test]
    fn subject_set_is_union() {
        let c = CommunicationRecord::new("m1", "org/a", "org/b", LinkType::Informs)
            .with_subject("p/1")
            .with_reference("p/2");
        let other = CommunicationRecord::new("m2", "org/a", "org/b", LinkType::Informs)
            .with_reference("p/2");
        assert_eq!(c.subjects().len(), 2);
        assert!(c.shares_subject(&other));
        assert!(other.shares_subject(&c));

        let stranger = CommunicationRecord::new("m3", "org/a", "org/b", LinkType::Informs)
            .with_subject("p/9");
        assert!(!c.shares_subject(&stranger));
    }

    #[test]
    fn communication_point_requires_point_precision() {
        let c = CommunicationRecord::new("m1", "a", "b", LinkType::Informs).with_date("1942-03~");
        assert_eq!(c.point(), None);
        let c = c.with_date("1942-03");
        assert!(c.point().is_some());
    }

    #[test]
    fn taxonomy_leaf() {
        let t = TaxonomyPath::new("persecution/deprivation_of_liberty/arrest");
        assert_eq!(t.leaf(), Some("arrest"));
        assert_eq!(t.segments().count(), 3);
        assert_eq!(TaxonomyPath::default().leaf(), None);
    }

    #[test]
    fn edge_kind_parse() {
        assert_eq!("chain".parse::<EdgeKind>().ok(), Some(EdgeKind::Chain));
        assert_eq!(
            "FOLLOWS_IN_CASE".parse::<EdgeKind>().ok(),
            Some(EdgeKind::CaseSequence)
        );
        assert!(matches!(
            "bogus".parse::<EdgeKind>(),
            Err(DossierError::InvalidConfig(_))
        ));
    }

    #[test]
    fn edge_batch_normalization_sorts_and_dedups() {
        let a = ReplyLink {
            reply: RecordId::new("r2"),
            original: RecordId::new("o1"),
        };
        let b = ReplyLink {
            reply: RecordId::new("r1"),
            original: RecordId::new("o1"),
        };
        let batch = EdgeBatch::Reply(vec![a.clone(), b.clone(), a.clone()]).normalized();
        assert_eq!(batch, EdgeBatch::Reply(vec![b, a]));
    }

    #[test]
    fn edge_set_replaces_per_kind() {
        let mut set = EdgeSet::new();
        set.insert(EdgeBatch::Context(vec![ContextLink {
            action: RecordId::new("m"),
            event: RecordId::new("e"),
        }]));
        set.insert(EdgeBatch::empty(EdgeKind::Context));
        assert!(set.contexts().is_empty());
        assert_eq!(set.counts().get(&EdgeKind::Context), Some(&0));
        assert!(set.chains().is_empty());
    }
}
