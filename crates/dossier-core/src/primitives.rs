//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Dossier engine.
//!
//! The engine starts with zero edges but fixed logic. These values are
//! compiled into the binary; the only runtime-tunable parameters live in
//! [`crate::config::EngineConfig`] and are bounded by the limits below.

/// Number of seconds in one civil day.
///
/// Day differences are computed on the epoch-seconds line and divided by
/// this value, truncating toward zero.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default chain window in days.
///
/// In the reference corpus 80% of valid chain gaps fell between 8 and 11
/// days and the largest valid gap was 11 days.
pub const DEFAULT_CHAIN_WINDOW_DAYS: u32 = 14;

/// Largest chain window accepted by configuration validation.
pub const MAX_CHAIN_WINDOW_DAYS: u32 = 365;

/// Largest reply search window accepted by configuration validation.
pub const MAX_REPLY_WINDOW_DAYS: u32 = 3_650;

/// Largest context slack accepted by configuration validation.
pub const MAX_CONTEXT_SLACK_DAYS: u32 = 365;

/// Magic bytes for the Dossier store file format header.
///
/// - File Header = Magic Bytes ("DSSR") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"DSSR";

/// Current store file format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum traversal depth for timeline and chain queries.
pub const MAX_TRAVERSAL_DEPTH: usize = 1_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for record and entity identifiers.
///
/// Identifiers longer than this are rejected by the Loader.
pub const MAX_ID_LENGTH: usize = 512;

/// Maximum length for a raw EDTF date string.
pub const MAX_DATE_LENGTH: usize = 64;

/// Maximum number of records in a single load batch.
pub const MAX_BATCH_LENGTH: usize = 200_000;
