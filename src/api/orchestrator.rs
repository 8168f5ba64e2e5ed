//! Run trigger and progress endpoints.

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::routes::AppState;
use crate::orchestrator::{AdmissionError, RunProgress};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start/:id", post(start_run))
        .route("/status/:id", get(run_status))
}

fn admission_error(e: AdmissionError) -> (StatusCode, String) {
    let status = match &e {
        AdmissionError::NotFound(_) => StatusCode::NOT_FOUND,
        AdmissionError::AlreadyRunning(_) => StatusCode::BAD_REQUEST,
        AdmissionError::Store(_) => {
            tracing::error!("Orchestrator store error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

/// POST /api/orchestrator/start/:id - Start the pipeline in the background.
async fn start_run(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    state.service.start_run(id).map_err(admission_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Launch workflow started",
            "launch_id": id,
        })),
    ))
}

/// GET /api/orchestrator/status/:id - Run status and per-task progress.
async fn run_status(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<RunProgress>, (StatusCode, String)> {
    state.service.progress(id).map(Json).map_err(admission_error)
}

#[cfg(test)]
mod tests {
    use crate::api::routes::tests::spawn_app;
    use crate::store::NewLaunch;
    use crate::testing::{Reply, ScriptedClient};
    use serde_json::Value;
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_and_poll_until_completed() {
        let (base, state) = spawn_app(ScriptedClient::new(Reply::text("unused")).unhealthy()).await;
        let launch = state
            .store
            .create_launch(&NewLaunch {
                name: "Atlas CRM".to_string(),
                description: None,
                product_type: Some("SaaS".to_string()),
                target_market: Some("SMB".to_string()),
            })
            .unwrap();
        let http = reqwest::Client::new();

        let started = http
            .post(format!("{}/api/orchestrator/start/{}", base, launch.id))
            .send()
            .await
            .unwrap();
        assert_eq!(started.status(), 202);

        let mut progress = Value::Null;
        for _ in 0..100 {
            progress = http
                .get(format!("{}/api/orchestrator/status/{}", base, launch.id))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if progress["status"] == "completed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert_eq!(progress["status"], "completed");
        assert_eq!(progress["total_agents"], 15);
        assert_eq!(progress["completed_agents"], 15);
        assert_eq!(progress["failed_agents"], 0);
    }

    #[tokio::test]
    async fn test_start_maps_admission_errors() {
        let (base, state) = spawn_app(ScriptedClient::new(Reply::Hang)).await;
        let http = reqwest::Client::new();

        let missing = http
            .post(format!("{}/api/orchestrator/start/999", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let launch = state
            .store
            .create_launch(&NewLaunch {
                name: "Beacon".to_string(),
                description: None,
                product_type: None,
                target_market: None,
            })
            .unwrap();
        let first = http
            .post(format!("{}/api/orchestrator/start/{}", base, launch.id))
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), 202);

        let second = http
            .post(format!("{}/api/orchestrator/start/{}", base, launch.id))
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), 400);
    }
}
