//! Drives a launch through the phase table.
//!
//! Tasks run strictly one after another in declared order. Each task sees the
//! outputs of every task before it and nothing after it. A task's own failure
//! is recorded and skipped; store failures and the run deadline end the run.

mod phases;
mod service;

pub use phases::{Phase, PhaseError, PhaseTable};
pub use service::{AdmissionError, LaunchService, RunProgress, TaskProgress};

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::agents::{
    standard_pipeline, ContextMap, PipelineStep, RunScope, TaskError, TaskExecutor, TaskRun,
};
use crate::config::ExecutionConfig;
use crate::llm::ClientRef;
use crate::store::{ResultStore, RunRegistry, Status, StoreError, StoreRef};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no pipeline step registered for task {0}")]
    UnknownTask(String),

    #[error("launch {0} not found")]
    LaunchNotFound(i64),

    #[error("run exceeded its {budget:?} budget after {finished} tasks")]
    DeadlineExceeded { budget: Duration, finished: usize },
}

/// Counts and context of a finished run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub launch_id: i64,
    pub total: usize,
    pub completed: usize,
    /// Completed with fallback output; included in `completed`.
    pub degraded: usize,
    pub failed: usize,
    pub context: ContextMap,
    pub elapsed: Duration,
}

impl RunReport {
    /// Count a step by the status its row actually holds.
    fn record(&mut self, run: &TaskRun) {
        if run.status == Status::Failed {
            self.failed += 1;
            return;
        }
        self.completed += 1;
        if run.outcome.is_degraded() {
            self.degraded += 1;
        }
    }

    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} tasks completed ({} with fallback output), {} failed in {:.1}s",
            self.completed,
            self.total,
            self.degraded,
            self.failed,
            self.elapsed.as_secs_f64()
        )
    }
}

pub struct Orchestrator {
    store: StoreRef,
    executor: TaskExecutor,
    phases: PhaseTable,
    steps: HashMap<String, PipelineStep>,
    run_timeout: Duration,
}

impl Orchestrator {
    /// Every task named in `phases` must have a matching step.
    pub fn new(
        store: StoreRef,
        client: ClientRef,
        limits: ExecutionConfig,
        phases: PhaseTable,
        steps: Vec<PipelineStep>,
    ) -> Result<Self, OrchestratorError> {
        let steps: HashMap<String, PipelineStep> = steps
            .into_iter()
            .map(|step| (step.name().to_string(), step))
            .collect();

        if let Some(missing) = phases.task_names().find(|name| !steps.contains_key(*name)) {
            return Err(OrchestratorError::UnknownTask(missing.to_string()));
        }

        Ok(Self {
            run_timeout: limits.run_timeout,
            executor: TaskExecutor::new(client, store.clone(), limits),
            store,
            phases,
            steps,
        })
    }

    /// The standard launch pipeline.
    pub fn standard(
        store: StoreRef,
        client: ClientRef,
        limits: ExecutionConfig,
    ) -> Result<Self, OrchestratorError> {
        Self::new(store, client, limits, PhaseTable::standard(), standard_pipeline())
    }

    pub fn phases(&self) -> &PhaseTable {
        &self.phases
    }

    fn step(&self, task: &str) -> Result<&PipelineStep, OrchestratorError> {
        self.steps
            .get(task)
            .ok_or_else(|| OrchestratorError::UnknownTask(task.to_string()))
    }

    /// Run every phase for `launch_id`. Does not touch the launch status.
    pub async fn run(&self, launch_id: i64) -> Result<RunReport, OrchestratorError> {
        let started = Instant::now();
        let launch = self
            .store
            .get_launch(launch_id)?
            .ok_or(OrchestratorError::LaunchNotFound(launch_id))?;
        let mut scope = RunScope::new(launch_id, launch.profile());
        if let Some(deadline) = started.checked_add(self.run_timeout) {
            scope = scope.with_deadline(deadline);
        }

        tracing::info!(
            "Starting orchestration for launch {} ({})",
            launch_id,
            launch.name
        );

        for task in self.phases.task_names() {
            let step = self.step(task)?;
            self.store
                .ensure_result(launch_id, step.name(), step.category())?;
        }

        let mut report = RunReport {
            launch_id,
            total: self.phases.task_count(),
            ..RunReport::default()
        };
        let mut context = ContextMap::new();

        for phase in self.phases.phases() {
            let phase_started = Instant::now();
            tracing::info!("Starting phase {} for launch {}", phase.name, launch_id);

            for task in &phase.tasks {
                if scope.expired() {
                    return Err(self.deadline_exceeded(launch_id, &report));
                }

                let step = self.step(task)?;
                match self.executor.execute(step, &scope, Some(&context)).await {
                    Ok(run) => {
                        report.record(&run);
                        context.insert(task.clone(), run.outcome.into_text());
                    }
                    Err(TaskError::Store(e)) => {
                        tracing::error!(
                            "Store failure in task {} for launch {}; aborting run",
                            task,
                            launch_id
                        );
                        return Err(OrchestratorError::Store(e));
                    }
                    Err(e) => {
                        report.failed += 1;
                        context.insert(task.clone(), format!("Agent {} failed: {}", task, e));
                    }
                }
            }

            tracing::info!(
                "Phase {} for launch {} finished in {:.2}s",
                phase.name,
                launch_id,
                phase_started.elapsed().as_secs_f64()
            );
        }

        if scope.expired() {
            return Err(self.deadline_exceeded(launch_id, &report));
        }

        report.elapsed = started.elapsed();
        report.context = context;
        tracing::info!("Orchestration for launch {} finished: {}", launch_id, report.summary());
        Ok(report)
    }

    fn deadline_exceeded(&self, launch_id: i64, report: &RunReport) -> OrchestratorError {
        tracing::error!(
            "Launch {} exceeded its {:?} run budget after {} tasks",
            launch_id,
            self.run_timeout,
            report.finished()
        );
        OrchestratorError::DeadlineExceeded {
            budget: self.run_timeout,
            finished: report.finished(),
        }
    }

    /// Run and write the terminal launch status with a summary.
    pub async fn run_to_completion(&self, launch_id: i64) -> Status {
        let (status, summary) = match self.run(launch_id).await {
            Ok(report) => (Status::Completed, report.summary()),
            Err(e) => {
                tracing::error!("Orchestration failed for launch {}: {}", launch_id, e);
                (Status::Failed, format!("Orchestration failed: {}", e))
            }
        };

        if let Err(e) = self
            .store
            .set_launch_status(launch_id, status, Some(&summary))
        {
            tracing::error!(
                "Could not record final status {} for launch {}: {}",
                status,
                launch_id,
                e
            );
        }
        status
    }
}
