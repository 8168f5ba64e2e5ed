//! Shared execution scaffolding for every pipeline step.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout, Instant};

use super::{Agent, AgentContext, ContextMap, PipelineStep};
use crate::config::ExecutionConfig;
use crate::llm::{ClientRef, LlmError};
use crate::store::{LaunchProfile, ResultStore, ResultUpdate, Status, StoreError, StoreRef};

/// Hard failures of a step. Degraded inference is not an error; see [`TaskOutcome`].
#[derive(Debug, Error)]
pub enum TaskError {
    /// The result store could not be read or written. Aborts the run.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("report aggregation failed: {0}")]
    Aggregation(String),
}

impl From<std::fmt::Error> for TaskError {
    fn from(e: std::fmt::Error) -> Self {
        Self::Aggregation(e.to_string())
    }
}

/// Why a step produced its fallback document instead of generated text.
#[derive(Debug)]
pub enum DegradeReason {
    HealthCheckFailed,
    HealthCheckTimedOut(Duration),
    Inference(LlmError),
    TimedOut(Duration),
    InvalidOutput,
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HealthCheckFailed => write!(f, "inference service health check failed"),
            Self::HealthCheckTimedOut(d) => {
                write!(f, "inference health check timed out after {:?}", d)
            }
            Self::Inference(e) => write!(f, "inference failed: {}", e),
            Self::TimedOut(d) => write!(f, "agent logic timed out after {:?}", d),
            Self::InvalidOutput => write!(f, "agent returned empty output"),
        }
    }
}

/// Successful result of a step. Both variants are persisted as `completed`.
#[derive(Debug)]
pub enum TaskOutcome {
    Generated(String),
    Degraded { text: String, reason: DegradeReason },
}

impl TaskOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::Degraded { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            Self::Degraded { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// A finished step and the status its row was left in.
#[derive(Debug)]
pub struct TaskRun {
    pub outcome: TaskOutcome,
    /// Read back from the store. A row that had already failed keeps `failed`
    /// even though its output was refreshed.
    pub status: Status,
}

/// Per-run inputs shared by every step of the run.
#[derive(Debug, Clone)]
pub struct RunScope {
    pub run_id: i64,
    pub launch: LaunchProfile,
    deadline: Option<Instant>,
}

impl RunScope {
    pub fn new(run_id: i64, launch: LaunchProfile) -> Self {
        Self {
            run_id,
            launch,
            deadline: None,
        }
    }

    /// Clamp every bound applied within this run to `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    fn bound(&self, limit: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => limit.min(remaining),
            None => limit,
        }
    }
}

/// Runs pipeline steps: health probe, bounded invocation, validation,
/// fallback and persistence.
pub struct TaskExecutor {
    client: ClientRef,
    store: StoreRef,
    limits: ExecutionConfig,
}

impl TaskExecutor {
    pub fn new(client: ClientRef, store: StoreRef, limits: ExecutionConfig) -> Self {
        Self {
            client,
            store,
            limits,
        }
    }

    /// Execute one step against its result row.
    ///
    /// Inference problems of any kind end in [`TaskOutcome::Degraded`] with the
    /// row marked `completed`. Only store and aggregation failures are returned
    /// as errors, including a row that disappeared mid-step; the row is then
    /// marked `failed` when that is still possible.
    pub async fn execute(
        &self,
        step: &PipelineStep,
        scope: &RunScope,
        context: Option<&ContextMap>,
    ) -> Result<TaskRun, TaskError> {
        let empty = ContextMap::new();
        let ctx = AgentContext {
            run_id: scope.run_id,
            launch: &scope.launch,
            outputs: context.unwrap_or(&empty),
        };
        let started = Instant::now();

        let row = self
            .store
            .ensure_result(scope.run_id, step.name(), step.category())?;

        match self.run_step(step, &ctx, scope, row.id, started).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(
                    "Task {} failed for launch {}: {}",
                    step.name(),
                    scope.run_id,
                    err
                );
                let update = ResultUpdate::failed(err.to_string(), secs_since(started));
                if let Err(e) = self.store.update_result(row.id, &update) {
                    tracing::warn!("Could not mark task {} as failed: {}", step.name(), e);
                }
                Err(err)
            }
        }
    }

    async fn run_step(
        &self,
        step: &PipelineStep,
        ctx: &AgentContext<'_>,
        scope: &RunScope,
        row_id: i64,
        started: Instant,
    ) -> Result<TaskRun, TaskError> {
        self.store
            .update_result(row_id, &ResultUpdate::status(Status::InProgress))?
            .ok_or_else(|| missing_row(step, row_id))?;

        let outcome = match step {
            PipelineStep::Inference(agent) => self.infer(agent.as_ref(), ctx, scope).await,
            PipelineStep::Report(report) => {
                let results = self.store.list_results(scope.run_id)?;
                TaskOutcome::Generated(report.compile(
                    ctx,
                    &results,
                    self.limits.report_excerpt_chars,
                )?)
            }
        };

        let duration = secs_since(started);
        let row = self
            .store
            .update_result(row_id, &ResultUpdate::completed(outcome.text(), duration))?
            .ok_or_else(|| missing_row(step, row_id))?;

        match (&outcome, row.status) {
            (_, Status::Failed) => tracing::warn!(
                "Task {} for launch {} refreshed its output but stays failed",
                step.name(),
                scope.run_id
            ),
            (TaskOutcome::Generated(_), _) => tracing::info!(
                "Task {} completed for launch {} in {:.2}s",
                step.name(),
                scope.run_id,
                duration
            ),
            (TaskOutcome::Degraded { reason, .. }, _) => tracing::info!(
                "Task {} completed with fallback output for launch {} in {:.2}s ({})",
                step.name(),
                scope.run_id,
                duration,
                reason
            ),
        }

        Ok(TaskRun {
            outcome,
            status: row.status,
        })
    }

    async fn infer(
        &self,
        agent: &dyn Agent,
        ctx: &AgentContext<'_>,
        scope: &RunScope,
    ) -> TaskOutcome {
        let probe_limit = scope.bound(self.limits.health_timeout);
        match timeout(probe_limit, self.client.health_check()).await {
            Ok(true) => {}
            Ok(false) => return degrade(agent, ctx, DegradeReason::HealthCheckFailed),
            Err(_) => {
                return degrade(agent, ctx, DegradeReason::HealthCheckTimedOut(probe_limit))
            }
        }

        let limit = scope.bound(self.limits.task_timeout);
        match timeout(limit, agent.run_logic(ctx, self.client.as_ref())).await {
            Ok(Ok(text)) if !text.trim().is_empty() => TaskOutcome::Generated(text),
            Ok(Ok(_)) => degrade(agent, ctx, DegradeReason::InvalidOutput),
            Ok(Err(e)) => degrade(agent, ctx, DegradeReason::Inference(e)),
            Err(_) => degrade(agent, ctx, DegradeReason::TimedOut(limit)),
        }
    }
}

fn degrade(agent: &dyn Agent, ctx: &AgentContext<'_>, reason: DegradeReason) -> TaskOutcome {
    tracing::warn!(
        "Task {} for launch {} using fallback: {}",
        agent.name(),
        ctx.run_id,
        reason
    );
    TaskOutcome::Degraded {
        text: agent.fallback(ctx),
        reason,
    }
}

fn missing_row(step: &PipelineStep, row_id: i64) -> StoreError {
    StoreError::NotFound(format!("task result {} for {}", row_id, step.name()))
}

fn secs_since(started: Instant) -> f64 {
    started.elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MarketIntelligenceAgent;
    use crate::store::{Deletion, NewLaunch, SqliteStore, TaskCategory};
    use crate::testing::{RecordingStore, Reply, ScriptedClient, StubAgent};
    use std::sync::Arc;

    struct Harness {
        store: Arc<RecordingStore>,
        client: Arc<ScriptedClient>,
        scope: RunScope,
    }

    impl Harness {
        fn new(client: ScriptedClient) -> Self {
            Self::with_store(client, RecordingStore::new(SqliteStore::open_in_memory().unwrap()))
        }

        fn with_store(client: ScriptedClient, store: RecordingStore) -> Self {
            let launch = store
                .inner()
                .create_launch(&NewLaunch {
                    name: "Atlas CRM".to_string(),
                    description: None,
                    product_type: Some("SaaS".to_string()),
                    target_market: Some("SMB".to_string()),
                })
                .unwrap();
            Self {
                store: Arc::new(store),
                client: Arc::new(client),
                scope: RunScope::new(launch.id, launch.profile()),
            }
        }

        fn executor(&self) -> TaskExecutor {
            TaskExecutor::new(
                self.client.clone(),
                self.store.clone(),
                ExecutionConfig {
                    task_timeout: Duration::from_millis(100),
                    health_timeout: Duration::from_millis(50),
                    ..ExecutionConfig::default()
                },
            )
        }

        fn fallback_of(&self, agent: &dyn Agent) -> String {
            let outputs = ContextMap::new();
            agent.fallback(&AgentContext {
                run_id: self.scope.run_id,
                launch: &self.scope.launch,
                outputs: &outputs,
            })
        }
    }

    #[tokio::test]
    async fn test_generated_output_is_persisted_as_completed() {
        let h = Harness::new(ScriptedClient::new(Reply::text("Competitors: A, B, C")));
        let step = PipelineStep::agent(MarketIntelligenceAgent);

        let outcome = h.executor().execute(&step, &h.scope, None).await.unwrap().outcome;

        assert!(!outcome.is_degraded());
        let row = h
            .store
            .get_result_by_name(h.scope.run_id, "market_intelligence")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, Status::Completed);
        assert_eq!(row.output.as_deref(), Some(outcome.text()));
        assert!(row.output.unwrap().ends_with("Competitors: A, B, C"));
        assert!(row.duration_seconds.is_some());
        assert_eq!(
            h.store.history_for("market_intelligence"),
            vec![Status::InProgress, Status::Completed]
        );
    }

    #[tokio::test]
    async fn test_unhealthy_service_yields_exact_fallback() {
        let h = Harness::new(ScriptedClient::new(Reply::text("unused")).unhealthy());
        let step = PipelineStep::agent(MarketIntelligenceAgent);

        let outcome = h.executor().execute(&step, &h.scope, None).await.unwrap().outcome;

        assert!(matches!(
            outcome,
            TaskOutcome::Degraded {
                reason: DegradeReason::HealthCheckFailed,
                ..
            }
        ));
        let row = h
            .store
            .get_result_by_name(h.scope.run_id, "market_intelligence")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, Status::Completed);
        assert!(!row.error_flag);
        assert_eq!(row.output.unwrap(), h.fallback_of(&MarketIntelligenceAgent));
        assert!(h.client.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_slow_health_probe_degrades() {
        let h = Harness::new(
            ScriptedClient::new(Reply::text("unused")).health_delay(Duration::from_millis(500)),
        );
        let step = PipelineStep::agent(StubAgent::new("alpha"));

        let outcome = h.executor().execute(&step, &h.scope, None).await.unwrap().outcome;

        assert!(matches!(
            outcome,
            TaskOutcome::Degraded {
                reason: DegradeReason::HealthCheckTimedOut(_),
                ..
            }
        ));
        assert_eq!(outcome.text(), "fallback for alpha");
    }

    #[tokio::test]
    async fn test_inference_error_and_timeout_degrade_without_escaping() {
        let h = Harness::new(
            ScriptedClient::new(Reply::text("ok"))
                .rule("task alpha", Reply::Unavailable)
                .rule("task beta", Reply::Hang),
        );
        let executor = h.executor();

        let alpha = executor
            .execute(&PipelineStep::agent(StubAgent::new("alpha")), &h.scope, None)
            .await
            .unwrap()
            .outcome;
        let beta = executor
            .execute(&PipelineStep::agent(StubAgent::new("beta")), &h.scope, None)
            .await
            .unwrap()
            .outcome;

        assert!(matches!(
            alpha,
            TaskOutcome::Degraded {
                reason: DegradeReason::Inference(LlmError::Unavailable(_)),
                ..
            }
        ));
        assert!(matches!(
            beta,
            TaskOutcome::Degraded {
                reason: DegradeReason::TimedOut(_),
                ..
            }
        ));
        for name in ["alpha", "beta"] {
            let row = h
                .store
                .get_result_by_name(h.scope.run_id, name)
                .unwrap()
                .unwrap();
            assert_eq!(row.status, Status::Completed);
            assert_eq!(row.output, Some(format!("fallback for {}", name)));
        }
    }

    #[tokio::test]
    async fn test_blank_output_is_replaced_with_fallback() {
        let h = Harness::new(ScriptedClient::new(Reply::text("")));
        let step = PipelineStep::agent(StubAgent::new("alpha").raw_output());

        let outcome = h.executor().execute(&step, &h.scope, None).await.unwrap().outcome;

        assert!(matches!(
            outcome,
            TaskOutcome::Degraded {
                reason: DegradeReason::InvalidOutput,
                ..
            }
        ));
        assert_eq!(outcome.text(), "fallback for alpha");
    }

    #[tokio::test]
    async fn test_reexecution_reuses_the_existing_row() {
        let h = Harness::new(ScriptedClient::new(Reply::text("first")));
        let executor = h.executor();
        let step = PipelineStep::agent(StubAgent::new("alpha"));

        executor.execute(&step, &h.scope, None).await.unwrap();
        executor.execute(&step, &h.scope, None).await.unwrap();

        let rows = h.store.list_results(h.scope.run_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::Completed);
        assert_eq!(
            h.store.history_for("alpha"),
            vec![
                Status::InProgress,
                Status::Completed,
                Status::Completed,
                Status::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_store_failure_marks_row_failed_and_propagates() {
        let store = RecordingStore::new(SqliteStore::open_in_memory().unwrap()).fail_completion_of("alpha");
        let h = Harness::with_store(ScriptedClient::new(Reply::text("ok")), store);

        let err = h
            .executor()
            .execute(&PipelineStep::agent(StubAgent::new("alpha")), &h.scope, None)
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Store(_)));
        let row = h
            .store
            .get_result_by_name(h.scope.run_id, "alpha")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, Status::Failed);
        assert!(row.error_flag);
        assert!(row.error_message.unwrap().contains("injected"));
    }

    #[tokio::test]
    async fn test_row_deleted_mid_step_is_a_store_error() {
        let h = Harness::new(ScriptedClient::new(Reply::Hang));
        let store = h.store.clone();
        let launch_id = h.scope.run_id;
        let deleter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            store.inner().delete_launch(launch_id).unwrap()
        });

        let err = h
            .executor()
            .execute(&PipelineStep::agent(StubAgent::new("alpha")), &h.scope, None)
            .await
            .unwrap_err();

        assert_eq!(deleter.await.unwrap(), Deletion::Deleted);
        assert!(matches!(err, TaskError::Store(StoreError::NotFound(_))));
        assert!(h.store.list_results(launch_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_row_keeps_failed_status_on_rerun() {
        let h = Harness::new(ScriptedClient::new(Reply::text("second try")));
        let row = h
            .store
            .create_result(h.scope.run_id, "alpha", TaskCategory::Analysis)
            .unwrap();
        h.store
            .update_result(row.id, &ResultUpdate::failed("boom", 0.1))
            .unwrap();

        let run = h
            .executor()
            .execute(&PipelineStep::agent(StubAgent::new("alpha")), &h.scope, None)
            .await
            .unwrap();

        assert_eq!(run.status, Status::Failed);
        assert!(!run.outcome.is_degraded());
        let row = h
            .store
            .get_result_by_name(h.scope.run_id, "alpha")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, Status::Failed);
        assert!(row.error_flag);
        assert!(row.output.unwrap().ends_with("second try"));
    }

    #[tokio::test]
    async fn test_deadline_clamps_agent_timeout() {
        let h = Harness::new(ScriptedClient::new(Reply::Hang));
        let scope = h
            .scope
            .clone()
            .with_deadline(Instant::now() + Duration::from_millis(20));
        let executor = TaskExecutor::new(
            h.client.clone(),
            h.store.clone(),
            ExecutionConfig {
                task_timeout: Duration::from_secs(60),
                ..ExecutionConfig::default()
            },
        );

        let started = Instant::now();
        let outcome = executor
            .execute(&PipelineStep::agent(StubAgent::new("alpha")), &scope, None)
            .await
            .unwrap()
            .outcome;

        assert!(outcome.is_degraded());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
