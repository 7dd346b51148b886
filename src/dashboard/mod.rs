//! The dashboard REST layer: a JSON API over the store's pagination, stats,
//! and maintenance operations. Serves a single long-lived process; hook
//! processes coexist with it through the store's WAL + busy-timeout setup.

mod routes;

use crate::store::Store;
use anyhow::{Context, Result};
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub store: Arc<Store>,
}

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/memories", get(routes::list_memories))
        .route("/api/memories/:id", get(routes::get_memory))
        .route("/api/memories/:id", delete(routes::delete_memory))
        .route("/api/memories/delete", post(routes::bulk_delete))
        .route("/api/projects", get(routes::list_projects))
        .route("/api/projects/mode", put(routes::set_project_mode))
        .route("/api/sessions", get(routes::list_sessions))
        .route("/api/stats", get(routes::stats))
        .route("/api/config", get(routes::get_config))
        .route("/api/config", put(routes::put_config))
        .route("/api/prune", post(routes::prune))
        .route("/api/prune/preview", post(routes::prune_preview))
        .with_state(state)
}

/// Bind and serve until the process is killed.
pub async fn serve(port: u16) -> Result<()> {
    let store = Store::open(&crate::paths::db_path()?).context("open memory store")?;
    let state = AppState {
        store: Arc::new(store),
    };
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("bind dashboard port {port}"))?;
    tracing::info!("dashboard listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await.context("serve dashboard")?;
    Ok(())
}
