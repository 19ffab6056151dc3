use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use tracing::{error, info};

use super::AppState;
use super::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub name: String,
    pub hash: String,
}

/// Force a full re-clone of the named filesystem.
///
/// Concurrent calls are serialized by the manager.
pub async fn refresh(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<RefreshResponse>> {
    info!(filesystem = %name, "Received webhook request");

    let manager = state
        .registry
        .get(&name)
        .ok_or_else(|| ApiError::FilesystemNotFound(name.clone()))?;

    match manager.refresh().await {
        Ok(hash) => Ok(Json(RefreshResponse { name, hash: hash.to_string() })),
        Err(e) => {
            error!(filesystem = %name, error = %e, "Webhook refresh failed");
            Err(e.into())
        }
    }
}
