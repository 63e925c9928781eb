// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP routes.
//
//   POST /scan              run a scan, answer with the artifact metadata
//   GET  /list              attached devices
//   GET  /config?device=..  option declarations of one device
//   GET  /, /last, /image   last artifact (PNG, or metadata for JSON clients)
//   GET  /version           server version

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use scanwerk_core::types::{ScanArtifact, ScanRequest};
use scanwerk_scan::StoredScan;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Build the application router.
///
/// An empty `allowed_origins` list allows any origin.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/scan", post(scan))
        .route("/list", get(list))
        .route("/config", get(config))
        .route("/", get(last))
        .route("/last", get(last))
        .route("/image", get(last))
        .route("/version", get(version))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn scan(
    State(state): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "malformed scan request");
        ApiError::bad_request(rejection.body_text())
    })?;
    info!(device = %request.device, options = request.options.len(), "scan requested");

    let artifact = state.orchestrator.scan(request).await?;
    Ok(Json(metadata(&state, &artifact)).into_response())
}

async fn list(State(state): State<AppState>) -> ApiResult<Response> {
    let devices = state.orchestrator.list_devices().await?;
    if devices.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No devices found." })),
        )
            .into_response());
    }
    Ok(Json(devices).into_response())
}

#[derive(Debug, Deserialize)]
struct ConfigQuery {
    device: Option<String>,
}

async fn config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> ApiResult<Response> {
    let device = query
        .device
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("No device given"))?;

    // Any failure to reach the device is reported as a bad request here.
    let options = state
        .orchestrator
        .device_options(&device)
        .await
        .map_err(|err| ApiError::from(err).with_status(StatusCode::BAD_REQUEST))?;
    Ok(Json(options).into_response())
}

async fn last(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if accepts_json(&headers) {
        let artifact = state
            .store()
            .latest()
            .ok_or_else(|| ApiError::not_found("no scan has been made yet"))?;
        return Ok(Json(metadata(&state, &artifact)).into_response());
    }

    let store = std::sync::Arc::clone(state.store());
    let stored = tokio::task::spawn_blocking(move || store.load_latest())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??
        .ok_or_else(|| ApiError::not_found("no scan has been made yet"))?;
    image_response(stored)
}

async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("application/json"))
}

fn metadata(state: &AppState, artifact: &ScanArtifact) -> Value {
    json!({
        "path": state.store().directory(),
        "file": artifact.file_name,
        "width": artifact.width,
        "height": artifact.height,
        "created_at": artifact.created_at,
        "sha256": artifact.sha256,
        "size": artifact.size,
    })
}

fn image_response(stored: StoredScan) -> ApiResult<Response> {
    let artifact = &stored.artifact;
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type.as_str())
        .header(header::CONTENT_LENGTH, stored.bytes.len())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::ETAG, format!("\"{}\"", artifact.sha256))
        .body(Body::from(stored.bytes.to_vec()))
        .map_err(|e| ApiError::internal(e.to_string()))
}
