//! Test doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::agents::{Agent, AgentContext};
use crate::llm::{GenerateRequest, InferenceClient, LlmError};
use crate::store::{
    Admission, Launch, ResultStore, ResultUpdate, RunRegistry, SqliteStore, Status, StoreError,
    StoreResult, TaskCategory, TaskResult,
};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Accept connections, answer with `200` headers promising a body, then stall.
///
/// Returns the base URL and a counter of accepted connections.
pub async fn spawn_stalled_body_server() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    (format!("http://{}", addr), connections)
}

/// What a [`ScriptedClient`] does for a generate call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Unavailable,
    /// Never completes.
    Hang,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Inference client with canned behavior that records every prompt.
pub struct ScriptedClient {
    healthy: bool,
    health_delay: Option<Duration>,
    default: Reply,
    rules: Vec<(String, Reply)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(default: Reply) -> Self {
        Self {
            healthy: true,
            health_delay: None,
            default,
            rules: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = Some(delay);
        self
    }

    /// Use `reply` for prompts containing `needle`.
    pub fn rule(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn health_check(&self) -> bool {
        if let Some(delay) = self.health_delay {
            tokio::time::sleep(delay).await;
        }
        self.healthy
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Unavailable => Err(LlmError::Unavailable("connection refused".to_string())),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(LlmError::EmptyCompletion)
            }
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Minimal agent whose prompt lists the context it was given.
pub struct StubAgent {
    name: String,
    title: String,
    raw: bool,
}

impl StubAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            title: format!("Stub {}", name),
            raw: false,
        }
    }

    /// Return the client's text untouched so blank completions reach validation.
    pub fn raw_output(mut self) -> Self {
        self.raw = true;
        self
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Analysis
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        let seen: Vec<String> = ctx
            .outputs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("task {} sees [{}]", self.name, seen.join("; "))
    }

    fn fallback(&self, _ctx: &AgentContext<'_>) -> String {
        format!("fallback for {}", self.name)
    }

    async fn run_logic(
        &self,
        ctx: &AgentContext<'_>,
        client: &dyn InferenceClient,
    ) -> Result<String, LlmError> {
        let request = GenerateRequest::new(self.build_prompt(ctx));
        let text = client.generate(&request).await?;
        if self.raw {
            Ok(text)
        } else {
            Ok(format!("{} for Launch {}:\n\n{}", self.title, ctx.run_id, text))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Create,
    Update,
}

/// SQLite store that records status history and can fail completion writes.
pub struct RecordingStore {
    inner: SqliteStore,
    fail_completion_of: Option<String>,
    doomed: Mutex<HashSet<i64>>,
    events: Mutex<Vec<Event>>,
    history: Mutex<Vec<(String, Status)>>,
}

impl RecordingStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_completion_of: None,
            doomed: Mutex::new(HashSet::new()),
            events: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Reject every `completed` write for the row of `task_name`.
    pub fn fail_completion_of(mut self, task_name: &str) -> Self {
        self.fail_completion_of = Some(task_name.to_string());
        self
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    /// Statuses observed after each successful update of `task_name`.
    pub fn history_for(&self, task_name: &str) -> Vec<Status> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == task_name)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn creates_before_first_update(&self) -> Option<usize> {
        let events = self.events.lock().unwrap();
        events.iter().position(|e| *e == Event::Update)
    }
}

impl ResultStore for RecordingStore {
    fn create_result(
        &self,
        launch_id: i64,
        task_name: &str,
        category: TaskCategory,
    ) -> StoreResult<TaskResult> {
        let row = self.inner.create_result(launch_id, task_name, category)?;
        self.events.lock().unwrap().push(Event::Create);
        if self.fail_completion_of.as_deref() == Some(task_name) {
            self.doomed.lock().unwrap().insert(row.id);
        }
        Ok(row)
    }

    fn get_result_by_name(
        &self,
        launch_id: i64,
        task_name: &str,
    ) -> StoreResult<Option<TaskResult>> {
        self.inner.get_result_by_name(launch_id, task_name)
    }

    fn update_result(&self, id: i64, update: &ResultUpdate) -> StoreResult<Option<TaskResult>> {
        if update.status == Some(Status::Completed) && self.doomed.lock().unwrap().contains(&id) {
            return Err(StoreError::Corrupt("injected failure".to_string()));
        }
        let updated = self.inner.update_result(id, update)?;
        self.events.lock().unwrap().push(Event::Update);
        if let Some(row) = &updated {
            self.history
                .lock()
                .unwrap()
                .push((row.task_name.clone(), row.status));
        }
        Ok(updated)
    }

    fn list_results(&self, launch_id: i64) -> StoreResult<Vec<TaskResult>> {
        self.inner.list_results(launch_id)
    }
}

impl RunRegistry for RecordingStore {
    fn get_launch(&self, id: i64) -> StoreResult<Option<Launch>> {
        self.inner.get_launch(id)
    }

    fn set_launch_status(
        &self,
        id: i64,
        status: Status,
        summary: Option<&str>,
    ) -> StoreResult<Option<Launch>> {
        self.inner.set_launch_status(id, status, summary)
    }

    fn begin_run(&self, id: i64) -> StoreResult<Admission> {
        self.inner.begin_run(id)
    }
}
