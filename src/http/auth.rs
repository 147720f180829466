//! API-key middleware guarding the drain endpoints (§4.5).

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    let Some(provided) = provided else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "API key required in X-API-Key header"})))
            .into_response();
    };

    let Some(expected) = state.settings.cloud_api_key.as_deref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "API key not configured on server"})))
            .into_response();
    };

    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "Invalid API key"}))).into_response();
    }

    next.run(req).await
}

/// Equal-length, branchless byte comparison so a mismatch doesn't leak
/// which byte differed through early return timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
