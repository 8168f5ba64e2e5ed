//! Launch record endpoints.
//!
//! - List launches
//! - Create launch
//! - Get launch with task results
//! - Update launch status
//! - Delete launch and its results

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::routes::AppState;
use crate::store::{Deletion, Launch, NewLaunch, ResultStore, RunRegistry, Status, TaskResult};

/// Create launch routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_launches).post(create_launch))
        .route("/:id", get(get_launch).delete(delete_launch))
        .route("/:id/status", put(update_status))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Status,
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LaunchDetail {
    #[serde(flatten)]
    pub launch: Launch,
    pub agent_results: Vec<TaskResult>,
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!("Launch store error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn not_found(id: i64) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Launch {} not found", id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/launches - List launches.
async fn list_launches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Launch>>, (StatusCode, String)> {
    state
        .store
        .list_launches(query.skip, query.limit)
        .map(Json)
        .map_err(internal)
}

/// POST /api/launches - Create a launch.
async fn create_launch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewLaunch>,
) -> Result<(StatusCode, Json<Launch>), (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name cannot be empty".to_string()));
    }

    let launch = state.store.create_launch(&req).map_err(internal)?;
    tracing::info!("Created launch: {} ({})", launch.name, launch.id);
    Ok((StatusCode::CREATED, Json(launch)))
}

/// GET /api/launches/:id - Launch details with task results.
async fn get_launch(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<LaunchDetail>, (StatusCode, String)> {
    let launch = state
        .store
        .get_launch(id)
        .map_err(internal)?
        .ok_or_else(|| not_found(id))?;
    let agent_results = state.store.list_results(id).map_err(internal)?;
    Ok(Json(LaunchDetail {
        launch,
        agent_results,
    }))
}

/// PUT /api/launches/:id/status - Set the launch status.
async fn update_status(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Launch>, (StatusCode, String)> {
    let launch = state
        .store
        .set_launch_status(id, req.status, req.summary.as_deref())
        .map_err(internal)?
        .ok_or_else(|| not_found(id))?;
    tracing::info!("Set launch {} status to {}", id, launch.status);
    Ok(Json(launch))
}

/// DELETE /api/launches/:id - Delete a launch and its task results.
///
/// A launch with a run in flight cannot be deleted.
async fn delete_launch(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    match state.store.delete_launch(id).map_err(internal)? {
        Deletion::Deleted => Ok((StatusCode::OK, format!("Launch {} deleted successfully", id))),
        Deletion::Running => Err((
            StatusCode::BAD_REQUEST,
            format!("Launch {} is in progress and cannot be deleted", id),
        )),
        Deletion::NotFound => Err(not_found(id)),
    }
}
