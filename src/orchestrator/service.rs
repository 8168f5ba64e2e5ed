//! Trigger surface: run admission and progress queries.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::Orchestrator;
use crate::store::{Admission, ResultStore, RunRegistry, Status, StoreError, StoreRef, TaskCategory};

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("launch {0} not found")]
    NotFound(i64),

    #[error("launch {0} is already in progress")]
    AlreadyRunning(i64),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskProgress {
    pub task_name: String,
    pub category: TaskCategory,
    pub status: Status,
    pub error_flag: bool,
    pub duration_seconds: Option<f64>,
}

/// Snapshot of a run for pollers.
#[derive(Debug, Clone, Serialize)]
pub struct RunProgress {
    pub launch_id: i64,
    pub status: Status,
    pub summary: Option<String>,
    pub total_agents: usize,
    pub completed_agents: usize,
    pub failed_agents: usize,
    pub agent_results: Vec<TaskProgress>,
}

/// Starts runs in the background and reports on them.
#[derive(Clone)]
pub struct LaunchService {
    store: StoreRef,
    orchestrator: Arc<Orchestrator>,
}

impl LaunchService {
    pub fn new(store: StoreRef, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Admit the run and spawn it. Returns as soon as the launch is marked
    /// `in_progress`; the handle resolves to the terminal status.
    pub fn start_run(&self, launch_id: i64) -> Result<JoinHandle<Status>, AdmissionError> {
        match self.store.begin_run(launch_id)? {
            Admission::NotFound => Err(AdmissionError::NotFound(launch_id)),
            Admission::AlreadyRunning => {
                tracing::warn!("Rejected start for launch {}: already in progress", launch_id);
                Err(AdmissionError::AlreadyRunning(launch_id))
            }
            Admission::Admitted(launch) => {
                tracing::info!("Admitted run for launch {} ({})", launch_id, launch.name);
                let orchestrator = Arc::clone(&self.orchestrator);
                Ok(tokio::spawn(async move {
                    orchestrator.run_to_completion(launch_id).await
                }))
            }
        }
    }

    pub fn progress(&self, launch_id: i64) -> Result<RunProgress, AdmissionError> {
        let launch = self
            .store
            .get_launch(launch_id)?
            .ok_or(AdmissionError::NotFound(launch_id))?;
        let results = self.store.list_results(launch_id)?;

        Ok(RunProgress {
            launch_id,
            status: launch.status,
            summary: launch.summary,
            total_agents: self.orchestrator.phases().task_count(),
            completed_agents: results
                .iter()
                .filter(|r| r.status == Status::Completed)
                .count(),
            failed_agents: results.iter().filter(|r| r.error_flag).count(),
            agent_results: results
                .into_iter()
                .map(|r| TaskProgress {
                    task_name: r.task_name,
                    category: r.category,
                    status: r.status,
                    error_flag: r.error_flag,
                    duration_seconds: r.duration_seconds,
                })
                .collect(),
        })
    }
}
