//! The keepstore HTTP surface's route handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

use keep_store::{PullListItem, TrashListItem, MAX_BLOCK_SIZE};
use keep_types::{KeepError, Locator};

use crate::middleware::RequestTimer;
use crate::util::now_unix;
use crate::{ApiError, AppState};

/// `GET /<locator>`: read the block, checking a buffer-pool permit out
/// first.
pub async fn get_block(State(state): State<AppState>, Path(locator_text): Path<String>) -> Result<Response, ApiError> {
    let loc = keep_types::parse(&locator_text).map_err(|e| KeepError::BadRequest(e.to_string()))?.strip_hints();
    let timer = RequestTimer::start();
    let _permit = state.buffer_pool.checkout().await;

    let result = state.manager.get(&loc).await;
    state.metrics.record_get(result.is_ok(), timer.elapsed_ms());
    let data = result?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(data))
        .expect("response with a content-length header and byte body is always valid"))
}

/// `HEAD /<locator>`: report whether the block exists and its length,
/// without ever writing a body. Doesn't consume a buffer-pool permit.
pub async fn head_block(State(state): State<AppState>, Path(locator_text): Path<String>) -> Result<Response, ApiError> {
    let loc = keep_types::parse(&locator_text).map_err(|e| KeepError::BadRequest(e.to_string()))?.strip_hints();
    let data = state.manager.get(&loc).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::empty())
        .expect("response with a content-length header and empty body is always valid"))
}

/// `PUT /<hash>`: store the request body under `hash`, verifying
/// `Content-Length` against the actual body and the digest against the
/// path, then returning a signed locator.
pub async fn put_block(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if state.config.readonly {
        return Err(KeepError::MethodDisabled("server is read-only".to_string()).into());
    }

    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(KeepError::SizeRequired)?;
    if declared_len != body.len() as u64 {
        return Err(KeepError::BadRequest("Content-Length does not match body size".to_string()).into());
    }
    if body.len() as u64 > MAX_BLOCK_SIZE {
        return Err(KeepError::TooLong { size: body.len() as u64, limit: MAX_BLOCK_SIZE }.into());
    }

    let timer = RequestTimer::start();
    let _permit = state.buffer_pool.checkout().await;

    let digest = keep_crypto::digest_hex(&body);
    if digest != hash {
        state.metrics.record_put(false, timer.elapsed_ms());
        return Err(KeepError::RequestHashMismatch { expected: hash, actual: digest }.into());
    }

    let loc = Locator { hash: hash.clone(), size: Some(body.len() as u64), hints: Vec::new() };
    let result = state.manager.put(&loc, &body).await;
    state.metrics.record_put(result.is_ok(), timer.elapsed_ms());
    result?;

    let signed = match &state.config.blob_signing_key {
        Some(key) => {
            let expiry = now_unix() + state.config.blob_signature_ttl.as_secs();
            keep_types::sign(key, &loc, "", expiry)
        }
        None => loc,
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("X-Keep-Replicas-Stored", "1")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(signed.to_string()))
        .expect("response with a status-code-only header set and text body is always valid"))
}

/// `DELETE /<locator>`: immediately trash every copy whose current mtime
/// is still what it was at request time. Honored only with a valid
/// data-manager token (enforced by [`crate::middleware::KeepAuthLayer`]
/// before this handler runs); refused outright under `-never-delete`.
pub async fn delete_block(State(state): State<AppState>, Path(locator_text): Path<String>) -> Result<Response, ApiError> {
    if state.config.never_delete || state.config.readonly {
        return Err(KeepError::MethodDisabled("deletion is disabled on this server".to_string()).into());
    }
    let loc = keep_types::parse(&locator_text).map_err(|e| KeepError::BadRequest(e.to_string()))?.strip_hints();

    let mut copies_deleted = 0usize;
    for volume in state.manager.all_readable() {
        if let Ok(mtime) = volume.mtime(&loc).await {
            if volume.trash(&loc, mtime).await.is_ok() {
                copies_deleted += 1;
            }
        }
    }
    state.metrics.record_delete();

    Ok(Json(serde_json::json!({ "copies_deleted": copies_deleted })).into_response())
}

/// `GET /index`: every block on every volume.
pub async fn index_all(State(state): State<AppState>) -> Result<Response, ApiError> {
    index_with_prefix(&state, "").await
}

/// `GET /index/<prefix>`: every block whose hash begins with `prefix`.
pub async fn index_prefix(State(state): State<AppState>, Path(prefix): Path<String>) -> Result<Response, ApiError> {
    index_with_prefix(&state, &prefix).await
}

async fn index_with_prefix(state: &AppState, prefix: &str) -> Result<Response, ApiError> {
    let mut body = String::new();
    for volume in state.manager.all_readable() {
        for entry in volume.index(prefix).await? {
            body.push_str(&entry.to_string());
            body.push('\n');
        }
    }
    body.push('\n');

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body))
        .expect("response with a content-type header and text body is always valid"))
}

/// `PUT /pull`: replace the pull worker's queue wholesale.
pub async fn pull_put(State(state): State<AppState>, Json(items): Json<Vec<PullListItem>>) -> StatusCode {
    state.pull.replace(items).await;
    StatusCode::OK
}

/// `PUT /trash`: replace the trash worker's queue wholesale.
pub async fn trash_put(
    State(state): State<AppState>,
    Json(items): Json<Vec<TrashListItem>>,
) -> Result<StatusCode, ApiError> {
    if state.config.never_delete || state.config.readonly {
        return Err(KeepError::MethodDisabled("trash is disabled on this server".to_string()).into());
    }
    state.trash.replace(items).await;
    Ok(StatusCode::OK)
}

/// `GET /status.json`: volume capacities, buffer-pool occupancy, and
/// request counters.
pub async fn status_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    let volumes = state.manager.statuses().await;
    Json(serde_json::json!({
        "volumes": volumes,
        "buffer_pool": {
            "available": state.buffer_pool.available(),
            "buffer_size": state.buffer_pool.buffer_size(),
        },
        "metrics": state.metrics.to_json(),
    }))
}
