//! Durable launch and task-result storage.
//!
//! The orchestrator only talks to the [`ResultStore`] and [`RunRegistry`]
//! traits; [`SqliteStore`] is the production implementation.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{
    Launch, LaunchProfile, NewLaunch, ResultUpdate, Status, TaskCategory, TaskResult,
};

use std::sync::Arc;

use thiserror::Error;

/// Store failures. All of them are structural from the orchestrator's point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A row the caller holds an id for no longer exists.
    #[error("{0} not found")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One status row per (launch, task name).
pub trait ResultStore: Send + Sync {
    /// Insert a pending row. Fails if the row already exists.
    fn create_result(
        &self,
        launch_id: i64,
        task_name: &str,
        category: TaskCategory,
    ) -> StoreResult<TaskResult>;

    fn get_result_by_name(&self, launch_id: i64, task_name: &str)
        -> StoreResult<Option<TaskResult>>;

    /// Partial update; only the supplied fields change. A status that would move
    /// the row backwards is ignored while the other fields are still applied.
    fn update_result(&self, id: i64, update: &ResultUpdate) -> StoreResult<Option<TaskResult>>;

    fn list_results(&self, launch_id: i64) -> StoreResult<Vec<TaskResult>>;

    /// Reuse the row for `task_name` if it exists, otherwise create it.
    fn ensure_result(
        &self,
        launch_id: i64,
        task_name: &str,
        category: TaskCategory,
    ) -> StoreResult<TaskResult> {
        match self.get_result_by_name(launch_id, task_name)? {
            Some(existing) => Ok(existing),
            None => self.create_result(launch_id, task_name, category),
        }
    }
}

/// Outcome of deleting a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// The launch is `in_progress` and was left untouched.
    Running,
    NotFound,
}

/// Outcome of trying to move a launch into `in_progress`.
#[derive(Debug, Clone)]
pub enum Admission {
    Admitted(Launch),
    AlreadyRunning,
    NotFound,
}

/// Launch (run) lookup and status bookkeeping.
pub trait RunRegistry: Send + Sync {
    fn get_launch(&self, id: i64) -> StoreResult<Option<Launch>>;

    fn set_launch_status(
        &self,
        id: i64,
        status: Status,
        summary: Option<&str>,
    ) -> StoreResult<Option<Launch>>;

    /// Atomically mark the launch `in_progress` unless it already is.
    fn begin_run(&self, id: i64) -> StoreResult<Admission>;
}

/// Everything the orchestrator needs from storage.
pub trait LaunchStore: ResultStore + RunRegistry {}

impl<T: ResultStore + RunRegistry + ?Sized> LaunchStore for T {}

/// Shared store handle.
pub type StoreRef = Arc<dyn LaunchStore>;
