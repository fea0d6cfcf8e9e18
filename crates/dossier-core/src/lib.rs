//! # dossier-core
//!
//! The deterministic derived-relationship engine for Dossier.
//!
//! On top of a base graph of communications between organizational actors
//! and persecution events suffered by victims, this crate computes edges
//! that no source asserts but that follow from the graph's own temporal and
//! referential structure:
//!
//! - `REPLIES_TO`: reply pairing between communications
//! - `NEXT_IN_COMMUNICATION_CHAIN`: sequential correspondence between the
//!   same two parties about the same persons
//! - `ACTED_IN_CONTEXT_OF`: communications written around an event
//! - `FOLLOWS_IN_CASE`: chronological event order per victim
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - `BTreeMap`/`BTreeSet` only, integer arithmetic only
//! - Every day difference goes through [`temporal::day_diff`]
//! - Computed edges are replaced wholesale per kind, never patched

// =============================================================================
// MODULES
// =============================================================================

pub mod chain;
pub mod config;
pub mod context;
pub mod engine;
pub mod export;
pub mod formats;
pub mod graph;
pub mod loader;
pub mod metrics;
pub mod primitives;
pub mod query;
pub mod reply;
pub mod report;
pub mod sequence;
pub mod storage;
pub mod store;
pub mod temporal;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CaseSequenceLink, ChainLink, CommunicationRecord, Confidence, ContextLink, DossierError,
    EdgeBatch, EdgeKind, EdgeSet, EntityRef, LinkType, PersecutionEvent, RecordId, ReplyLink,
    TaxonomyPath,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use chain::{ChainBuilder, ChainIndex};
pub use config::EngineConfig;
pub use context::ContextLinker;
pub use engine::{Engine, stored_edges};
pub use export::{
    CanonicalEdgeSet, CanonicalHeader, EdgeRecord, all_edge_records, canonical_fingerprint,
    edge_records, export_canonical, import_canonical,
};
pub use graph::{GraphFacade, MemoryGraph, RecordFilter, Snapshot};
pub use loader::{LoadSummary, Loader, RecordBatch};
pub use metrics::GraphMetrics;
pub use query::{ChainTrace, Query, QueryResult};
pub use reply::ReplyMatcher;
pub use report::{DaysDiffStats, RecomputeReport};
pub use sequence::CaseSequencer;
pub use storage::RedbGraph;
pub use store::{StorageBackend, Store};
pub use temporal::{CalendarDate, DatePrecision, EdtfDate, day_diff};
pub use validator::{Finding, ValidationReport, Validator};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, graph_from_bytes, graph_to_bytes};
