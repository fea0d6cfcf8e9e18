//! # Write Access
//!
//! Loading records, recomputing and exporting replace or dump whole edge
//! sets. When `DOSSIER_API_KEY` is set these routes require
//! `Authorization: Bearer <key>`; status, validation, edge listing and
//! queries stay open.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Environment variable holding the write key.
pub const API_KEY_ENV: &str = "DOSSIER_API_KEY";

/// The write key, kept only as its BLAKE3 digest.
#[derive(Clone, PartialEq, Eq)]
pub struct WriteKey {
    digest: [u8; 32],
}

impl WriteKey {
    /// `None` for a blank key.
    pub fn new(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self {
            digest: *blake3::hash(key.as_bytes()).as_bytes(),
        })
    }

    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .and_then(|key| Self::new(&key))
    }

    /// Digests are compared in constant time and always have the same
    /// length, whatever was presented.
    pub fn accepts(&self, presented: &str) -> bool {
        let digest = blake3::hash(presented.as_bytes());
        self.digest
            .as_slice()
            .ct_eq(digest.as_bytes().as_slice())
            .into()
    }
}

impl fmt::Debug for WriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WriteKey(..)")
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Lets a write through only with the configured key.
pub async fn require_write_key(
    State(key): State<Arc<WriteKey>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let rejection = match bearer(request.headers()) {
        Some(presented) if key.accepts(presented) => None,
        Some(_) => Some("wrong_key"),
        None => Some("missing_key"),
    };

    match rejection {
        None => next.run(request).await,
        Some(reason) => {
            tracing::warn!(path = %request.uri().path(), reason, "write rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "a valid write key is required" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_are_not_keys() {
        assert!(WriteKey::new("").is_none());
        assert!(WriteKey::new("   ").is_none());
    }

    #[test]
    fn accepts_only_the_exact_key() {
        let key = WriteKey::new("archive-key").expect("key");
        assert!(key.accepts("archive-key"));
        assert!(!key.accepts("archive-keY"));
        assert!(!key.accepts("archive-key-longer"));
        assert!(!key.accepts(""));
    }

    #[test]
    fn bearer_prefix_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "archive-key".parse().expect("header"));
        assert_eq!(bearer(&headers), None);
        headers.insert(
            header::AUTHORIZATION,
            "Bearer archive-key".parse().expect("header"),
        );
        assert_eq!(bearer(&headers), Some("archive-key"));
    }

    #[test]
    fn debug_hides_digest() {
        let key = WriteKey::new("archive-key").expect("key");
        assert_eq!(format!("{:?}", key), "WriteKey(..)");
    }
}
