//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use dossier_core::{
    DossierError, EdgeKind, EdgeRecord, EngineConfig, GraphMetrics, LoadSummary, QueryResult,
    RecomputeReport, ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub revision: u64,
    pub persistent: bool,
    pub communications: usize,
    pub events: usize,
    pub dated_communications: usize,
    pub dated_events: usize,
    /// Stored edges per kind name.
    pub edges: BTreeMap<String, usize>,
    pub edge_density_millionths: u64,
    pub chain_window_days: u32,
}

impl StatusResponse {
    pub fn new(metrics: GraphMetrics, persistent: bool, config: &EngineConfig) -> Self {
        Self {
            revision: metrics.revision,
            persistent,
            communications: metrics.communication_count,
            events: metrics.event_count,
            dated_communications: metrics.dated_communications,
            dated_events: metrics.dated_events,
            edges: metrics
                .edges
                .iter()
                .map(|(kind, n)| (kind.as_str().to_string(), *n))
                .collect(),
            edge_density_millionths: metrics.edge_density_millionths,
            chain_window_days: config.chain_window_days,
        }
    }
}

// =============================================================================
// LOAD RESPONSE
// =============================================================================

/// Record batch load response. The request body is a `RecordBatch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub success: bool,
    pub communications: usize,
    pub events: usize,
    pub revision: Option<u64>,
    pub error: Option<String>,
}

impl LoadResponse {
    pub fn success(summary: LoadSummary) -> Self {
        Self {
            success: true,
            communications: summary.communications,
            events: summary.events,
            revision: Some(summary.revision),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            communications: 0,
            events: 0,
            revision: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// RECOMPUTE REQUEST/RESPONSE
// =============================================================================

/// Per-run overrides of the server's engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecomputeRequest {
    pub chain_window_days: Option<u32>,
    pub kinds: Option<Vec<EdgeKind>>,
}

impl RecomputeRequest {
    /// Apply the overrides to `base` and validate the result.
    pub fn to_config(&self, base: &EngineConfig) -> Result<EngineConfig, DossierError> {
        let mut config = base.clone();
        if let Some(days) = self.chain_window_days {
            config.chain_window_days = days;
        }
        if let Some(kinds) = &self.kinds {
            config.enabled_kinds = kinds.iter().copied().collect();
        }
        config.validate()?;
        Ok(config)
    }

    /// Whether the request changes nothing.
    pub fn is_empty(&self) -> bool {
        self.chain_window_days.is_none() && self.kinds.is_none()
    }
}

/// Recompute response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeResponse {
    pub success: bool,
    pub report: Option<RecomputeReport>,
    pub error: Option<String>,
}

impl RecomputeResponse {
    pub fn success(report: RecomputeReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// VALIDATE RESPONSE
// =============================================================================

/// Validation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub clean: bool,
    pub report: Option<ValidationReport>,
    pub error: Option<String>,
}

impl ValidateResponse {
    pub fn success(report: ValidationReport) -> Self {
        Self {
            success: true,
            clean: report.is_clean(),
            report: Some(report),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            clean: false,
            report: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EDGES RESPONSE
// =============================================================================

/// Stored edges of one kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgesResponse {
    pub kind: String,
    pub relation: String,
    pub count: usize,
    pub edges: Vec<EdgeRecord>,
}

impl EdgesResponse {
    pub fn new(kind: EdgeKind, edges: Vec<EdgeRecord>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            relation: kind.relation_name().to_string(),
            count: edges.len(),
            edges,
        }
    }
}

// =============================================================================
// QUERY RESPONSE
// =============================================================================

/// Query response. The request body is a `Query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub result: Option<QueryResult>,
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn success(result: QueryResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Canonical export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    /// Base64 encoded canonical bytes.
    pub data: Option<String>,
    /// BLAKE3 hex fingerprint of the edge set.
    pub fingerprint: Option<String>,
    pub revision: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], fingerprint: String, revision: u64) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            fingerprint: Some(fingerprint),
            revision: Some(revision),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            fingerprint: None,
            revision: None,
            error: Some(msg.into()),
        }
    }
}
