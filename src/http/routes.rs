//! Drain HTTP surface (C5): `GET /api/attendance/sync`,
//! `POST /api/attendance/mark-synced`, `GET /api/health`.

use axum::extract::{Query, State};
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::PunchFilter;

use super::auth::require_api_key;
use super::state::AppState;

const DEFAULT_SYNC_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub since: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MarkSyncedBody {
    #[serde(default)]
    pub ids: Vec<u64>,
}

pub fn router(state: AppState) -> Router {
    let drain = Router::new()
        .route("/api/attendance/sync", get(get_sync))
        .route("/api/attendance/mark-synced", post(post_mark_synced))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .merge(drain)
        .route("/api/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors_layer()))
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([HeaderName::from_static("x-api-key"), header::CONTENT_TYPE])
}

async fn get_sync(State(state): State<AppState>, Query(query): Query<SyncQuery>) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_SYNC_LIMIT) as usize;
    let filter = PunchFilter { synced_to_cloud: Some(false), start_date: query.since, ..Default::default() };
    let data = state.store.list_punches(&filter, limit, 0);

    (StatusCode::OK, Json(json!({ "success": true, "count": data.len(), "data": data }))).into_response()
}

async fn post_mark_synced(State(state): State<AppState>, Json(body): Json<MarkSyncedBody>) -> Response {
    if body.ids.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "ids array is required"}))).into_response();
    }

    match state.store.mark_synced(&body.ids) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": format!("Marked {} records as synced", body.ids.len())})),
        )
            .into_response(),
        Err(e) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}

async fn health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
            "version": "1.0.0",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::events::EventBus;
    use crate::models::NewDevice;
    use crate::scheduler::PollScheduler;
    use crate::store::Store;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(api_key: Option<&str>) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("store.json")).unwrap());
        std::mem::forget(dir);
        let mut settings = Settings::default();
        settings.cloud_api_key = api_key.map(str::to_string);
        let settings = Arc::new(settings);
        let scheduler = Arc::new(PollScheduler::new(store.clone(), EventBus::new(), settings.poll_interval));
        AppState { store, settings, scheduler }
    }

    #[tokio::test]
    async fn test_health_does_not_require_api_key() {
        let app = router(test_state(None));
        let response =
            app.oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sync_without_key_is_unauthorized() {
        let app = router(test_state(Some("secret")));
        let response = app
            .oneshot(Request::builder().uri("/api/attendance/sync").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sync_with_unconfigured_key_is_unavailable() {
        let app = router(test_state(None));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/attendance/sync")
                    .header("X-API-Key", "anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_sync_with_wrong_key_is_forbidden() {
        let app = router(test_state(Some("secret")));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/attendance/sync")
                    .header("X-API-Key", "nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_drain_round_trip_over_http() {
        let state = test_state(Some("secret"));
        state
            .store
            .add_device(NewDevice { name: "A".into(), ip: "10.0.0.1".into(), port: 4370, location: String::new(), active: true })
            .unwrap();
        state
            .store
            .add_punches_bulk(vec![
                crate::models::PunchDraft {
                    device_id: 1,
                    oder_id: 0,
                    oder_id2: 0,
                    oder_id3: 0,
                    user_id: "1".into(),
                    timestamp: chrono::Utc::now(),
                    status: 0,
                    punch: 0,
                },
                crate::models::PunchDraft {
                    device_id: 1,
                    oder_id: 0,
                    oder_id2: 0,
                    oder_id3: 0,
                    user_id: "2".into(),
                    timestamp: chrono::Utc::now(),
                    status: 0,
                    punch: 0,
                },
            ])
            .unwrap();

        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/attendance/sync")
                    .header("X-API-Key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["count"], 2);

        let ids: Vec<u64> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_u64().unwrap())
            .collect();

        let mark_body = serde_json::to_vec(&json!({ "ids": ids })).unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/attendance/mark-synced")
                    .header("X-API-Key", "secret")
                    .header("content-type", "application/json")
                    .body(Body::from(mark_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/attendance/sync")
                    .header("X-API-Key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_mark_synced_requires_ids() {
        let app = router(test_state(Some("secret")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/attendance/mark-synced")
                    .header("X-API-Key", "secret")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
