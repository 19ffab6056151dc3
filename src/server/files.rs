// File serving
//
// Each request pins one snapshot and answers entirely from it, so the body,
// the ETag and X-Snapshot-Hash always agree.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::tree::DirEntry;

pub const SNAPSHOT_HASH_HEADER: &str = "x-snapshot-hash";

#[derive(Debug, Serialize)]
pub struct DirectoryListing {
    pub path: String,
    pub hash: String,
    pub entries: Vec<DirEntry>,
}

pub async fn serve_root(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve(&state, &name, "/", &headers)
}

pub async fn serve_path(
    State(state): State<AppState>,
    Path((name, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve(&state, &name, &path, &headers)
}

fn serve(state: &AppState, name: &str, path: &str, headers: &HeaderMap) -> ApiResult<Response> {
    let manager =
        state.registry.get(name).ok_or_else(|| ApiError::FilesystemNotFound(name.to_string()))?;
    let snapshot = manager.snapshot();
    let snapshot_hash = header_value(snapshot.hash.as_str())?;

    let handle = snapshot.tree.open(path)?;
    let metadata = handle.metadata();

    let mut response = if metadata.is_dir() {
        let listing = DirectoryListing {
            path: handle.path().to_string(),
            hash: snapshot.hash.to_string(),
            entries: snapshot.tree.read_dir(path)?,
        };
        Json(listing).into_response()
    } else {
        let etag = format!("\"{}\"", blake3::hash(handle.contents()).to_hex());
        let etag = header_value(&etag)?;

        let mut response = if if_none_match(headers, &etag) {
            StatusCode::NOT_MODIFIED.into_response()
        } else {
            let mut response = Body::from(handle.contents().to_vec()).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type(path)));
            response
        };

        let last_modified =
            metadata.modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let headers = response.headers_mut();
        headers.insert(header::ETAG, etag);
        headers.insert(header::LAST_MODIFIED, header_value(&last_modified)?);
        response
    };

    response.headers_mut().insert(SNAPSHOT_HASH_HEADER, snapshot_hash);
    Ok(response)
}

fn if_none_match(headers: &HeaderMap, etag: &HeaderValue) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').map(str::trim).any(|tag| tag == "*" || tag.as_bytes() == etag.as_bytes()))
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ApiError::Internal(e.to_string()))
}

fn content_type(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("md" | "markdown") => "text/markdown; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
