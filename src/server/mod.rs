//! HTTP surface: file serving, webhook refresh, health and metrics.

pub mod error;
pub mod files;
pub mod webhook;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{Method, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use prometheus::Registry;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::registry::FilesystemRegistry;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FilesystemRegistry>,
    pub metrics: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Arc<FilesystemRegistry>, metrics: Arc<Registry>) -> Self {
        Self { registry, metrics }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/fs/{name}", get(files::serve_root))
        .route("/fs/{name}/{*path}", get(files::serve_path))
        .route("/hooks/{name}", post(webhook::refresh))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_methods([Method::GET]).allow_origin(Any)),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let repos: Vec<_> = state
        .registry
        .names()
        .filter_map(|name| state.registry.get(name))
        .map(|manager| {
            let snapshot = manager.snapshot();
            json!({
                "name": manager.name(),
                "url": manager.reference().url,
                "ref": manager.reference().reference,
                "hash": snapshot.hash.to_string(),
                "fetched_at": snapshot.fetched_at,
            })
        })
        .collect();

    Json(json!({ "status": "ok", "repos": repos }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match crate::metrics::encode(&state.metrics) {
        Ok(body) => {
            ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
        }
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}

/// Bind `listen_addr` and serve until `shutdown` resolves.
pub async fn serve(
    listen_addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    tracing::info!("gitsnap listening on {}", listen_addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}
