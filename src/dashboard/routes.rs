use super::AppState;
use crate::config::{self, ContextConfig};
use crate::store::ListParams;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Anyhow errors surface as 500s with the chain flattened into the body.
fn internal(err: &anyhow::Error) -> Response {
    tracing::error!("dashboard request failed: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": format!("{err:#}")})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    project: Option<String>,
    category: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    order: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

pub(super) async fn list_memories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let params = ListParams {
        project: query.project,
        category: query.category,
        search: query.search,
        sort: query.sort,
        order: query.order,
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(50),
    };
    match state.store.list_memories(&params) {
        Ok(page) => Json(page).into_response(),
        Err(err) => internal(&err),
    }
}

pub(super) async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    match state.store.get_memory(id) {
        Ok(Some(memory)) => Json(memory).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "memory not found"})),
        )
            .into_response(),
        Err(err) => internal(&err),
    }
}

pub(super) async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    match state.store.delete_memory(id) {
        Ok(deleted) => Json(json!({"deleted": deleted})).into_response(),
        Err(err) => internal(&err),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkDeleteBody {
    ids: Vec<i64>,
}

pub(super) async fn bulk_delete(
    State(state): State<AppState>,
    Json(body): Json<BulkDeleteBody>,
) -> Response {
    match state.store.delete_memories(&body.ids) {
        Ok(deleted) => Json(json!({"deleted": deleted})).into_response(),
        Err(err) => internal(&err),
    }
}

#[derive(Debug, Serialize)]
struct ProjectInfo {
    project: String,
    memories: i64,
}

pub(super) async fn list_projects(State(state): State<AppState>) -> Response {
    match state.store.projects() {
        Ok(projects) => {
            let info: Vec<ProjectInfo> = projects
                .into_iter()
                .map(|(project, memories)| ProjectInfo { project, memories })
                .collect();
            Json(info).into_response()
        }
        Err(err) => internal(&err),
    }
}

pub(super) async fn list_sessions(State(state): State<AppState>) -> Response {
    match state.store.all_sessions() {
        Ok(sessions) => Json(sessions).into_response(),
        Err(err) => internal(&err),
    }
}

pub(super) async fn stats(State(state): State<AppState>) -> Response {
    match state.store.stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => internal(&err),
    }
}

pub(super) async fn get_config() -> Response {
    Json(config::config().as_ref().clone()).into_response()
}

/// Partial config update. `{"reset": true}` restores defaults; any other
/// body shallow-merges into the stored document, is re-sanitized, and is
/// written atomically.
pub(super) async fn put_config(Json(body): Json<Value>) -> Response {
    let result = (|| -> anyhow::Result<ContextConfig> {
        let path = crate::paths::config_path()?;
        let updated = if body.get("reset").and_then(Value::as_bool) == Some(true) {
            ContextConfig::default()
        } else {
            let mut document = match std::fs::read_to_string(&path) {
                Ok(contents) => serde_json::from_str::<Value>(&contents).unwrap_or(json!({})),
                Err(_) => json!({}),
            };
            if !document.is_object() {
                document = json!({});
            }
            if let (Some(target), Some(source)) = (document.as_object_mut(), body.as_object()) {
                for (key, value) in source {
                    target.insert(key.clone(), value.clone());
                }
            }
            ContextConfig::from_json(&document.to_string())
        };
        updated.save_to(&path)?;
        config::reset_config();
        Ok(updated)
    })();
    match result {
        Ok(updated) => Json(updated).into_response(),
        Err(err) => internal(&err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProjectModeBody {
    project: String,
    extraction_mode: String,
}

pub(super) async fn set_project_mode(Json(body): Json<ProjectModeBody>) -> Response {
    let result = (|| -> anyhow::Result<ContextConfig> {
        let path = crate::paths::config_path()?;
        let mut document = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<Value>(&contents).unwrap_or(json!({})),
            Err(_) => json!({}),
        };
        if !document.is_object() {
            document = json!({});
        }
        {
            let root = document.as_object_mut().expect("document object");
            let projects = root.entry("projects").or_insert_with(|| json!({}));
            if !projects.is_object() {
                *projects = json!({});
            }
            let projects = projects.as_object_mut().expect("projects object");
            let entry = projects
                .entry(body.project.clone())
                .or_insert_with(|| json!({}));
            if !entry.is_object() {
                *entry = json!({});
            }
            entry
                .as_object_mut()
                .expect("project override object")
                .insert("extractionMode".into(), json!(body.extraction_mode));
        }
        let updated = ContextConfig::from_json(&document.to_string());
        updated.save_to(&path)?;
        config::reset_config();
        Ok(updated)
    })();
    match result {
        Ok(updated) => Json(updated).into_response(),
        Err(err) => internal(&err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PruneBody {
    below_score: Option<f64>,
    older_than: Option<f64>,
}

pub(super) async fn prune(
    State(state): State<AppState>,
    body: Option<Json<PruneBody>>,
) -> Response {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let result = if let Some(threshold) = body.below_score {
        state.store.prune_below_score(threshold)
    } else if body.older_than.is_some() {
        state.store.prune_old(body.older_than)
    } else {
        state.store.decay_and_prune(&config::config())
    };
    match result {
        Ok(pruned) => Json(json!({"pruned": pruned})).into_response(),
        Err(err) => internal(&err),
    }
}

pub(super) async fn prune_preview(
    State(state): State<AppState>,
    body: Option<Json<PruneBody>>,
) -> Response {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let result = if let Some(threshold) = body.below_score {
        state.store.count_below_score(threshold)
    } else if body.older_than.is_some() {
        state.store.count_old(body.older_than)
    } else {
        state
            .store
            .count_below_score(config::config().prune_threshold)
    };
    match result {
        Ok(count) => Json(json!({"wouldPrune": count})).into_response(),
        Err(err) => internal(&err),
    }
}
