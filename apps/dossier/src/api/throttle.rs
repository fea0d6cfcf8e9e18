//! # Write Throttle
//!
//! A recomputation rebuilds every enabled edge kind over the whole
//! snapshot, and record loads and exports cost about as much. These routes
//! share one per-minute budget (`server.writes_per_minute`, 0 disables it).
//! Reads are never throttled.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type WriteThrottle = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Throttle allowing `per_minute` writes, `None` when the budget is 0.
pub fn write_throttle(per_minute: u32) -> Option<WriteThrottle> {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute)?);
    Some(Arc::new(RateLimiter::direct(quota)))
}

/// Answers 429 with `Retry-After` once the budget is spent.
pub async fn throttle_writes(
    State(throttle): State<WriteThrottle>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match throttle.check() {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait.as_secs().saturating_add(1);
            tracing::warn!(path = %request.uri().path(), retry_after, "write throttled");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(serde_json::json!({ "error": "write budget exhausted, retry later" })),
            )
                .into_response()
        }
    }
}
