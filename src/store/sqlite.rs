//! SQLite-backed store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{Launch, NewLaunch, ResultUpdate, Status, TaskCategory, TaskResult};
use super::{Admission, Deletion, ResultStore, RunRegistry, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS launches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    product_type TEXT,
    target_market TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    summary TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS task_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    launch_id INTEGER NOT NULL REFERENCES launches(id) ON DELETE CASCADE,
    task_name TEXT NOT NULL,
    category TEXT NOT NULL,
    output TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    error_flag INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    duration_seconds REAL,
    timestamp TEXT NOT NULL,
    UNIQUE(launch_id, task_name)
);

CREATE INDEX IF NOT EXISTS idx_task_results_launch ON task_results(launch_id);
"#;

const LAUNCH_COLUMNS: &str =
    "id, name, description, product_type, target_market, status, summary, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, launch_id, task_name, category, output, status, error_flag, \
     error_message, duration_seconds, timestamp";

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn create_launch(&self, launch: &NewLaunch) -> StoreResult<Launch> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO launches (name, description, product_type, target_market, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                launch.name,
                launch.description,
                launch.product_type,
                launch.target_market,
                Status::Pending.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        query_launch(&conn, id)?
            .ok_or_else(|| StoreError::Corrupt(format!("launch {} vanished after insert", id)))
    }

    pub fn list_launches(&self, skip: u32, limit: u32) -> StoreResult<Vec<Launch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM launches ORDER BY id LIMIT ?1 OFFSET ?2",
            LAUNCH_COLUMNS
        ))?;
        let launches = stmt
            .query_map(params![limit, skip], launch_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(launches)
    }

    /// Remove a launch and every task result recorded for it, unless a run
    /// currently owns the launch.
    pub fn delete_launch(&self, id: i64) -> StoreResult<Deletion> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let status = match query_launch(&tx, id)? {
            Some(launch) => launch.status,
            None => return Ok(Deletion::NotFound),
        };
        if status == Status::InProgress {
            tracing::warn!("Refusing to delete launch {} while it is running", id);
            return Ok(Deletion::Running);
        }
        let removed_results = tx.execute("DELETE FROM task_results WHERE launch_id = ?1", params![id])?;
        tx.execute("DELETE FROM launches WHERE id = ?1", params![id])?;
        tx.commit()?;
        tracing::info!("Deleted launch {} and {} task results", id, removed_results);
        Ok(Deletion::Deleted)
    }
}

impl ResultStore for SqliteStore {
    fn create_result(
        &self,
        launch_id: i64,
        task_name: &str,
        category: TaskCategory,
    ) -> StoreResult<TaskResult> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO task_results (launch_id, task_name, category, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                launch_id,
                task_name,
                category.as_str(),
                Status::Pending.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        query_result(&conn, id)?
            .ok_or_else(|| StoreError::Corrupt(format!("task result {} vanished after insert", id)))
    }

    fn get_result_by_name(
        &self,
        launch_id: i64,
        task_name: &str,
    ) -> StoreResult<Option<TaskResult>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM task_results WHERE launch_id = ?1 AND task_name = ?2",
                    RESULT_COLUMNS
                ),
                params![launch_id, task_name],
                result_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn update_result(&self, id: i64, update: &ResultUpdate) -> StoreResult<Option<TaskResult>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = match query_result(&tx, id)? {
            Some(current) => current,
            None => return Ok(None),
        };

        let status = match update.status {
            Some(next) if current.status.can_advance_to(next) => next,
            Some(next) => {
                tracing::warn!(
                    "Ignoring status regression {} -> {} for task {} of launch {}",
                    current.status,
                    next,
                    current.task_name,
                    current.launch_id
                );
                current.status
            }
            None => current.status,
        };

        tx.execute(
            "UPDATE task_results SET
                output = COALESCE(?1, output),
                status = ?2,
                error_flag = COALESCE(?3, error_flag),
                error_message = COALESCE(?4, error_message),
                duration_seconds = COALESCE(?5, duration_seconds),
                timestamp = ?6
             WHERE id = ?7",
            params![
                update.output,
                status.as_str(),
                update.error_flag,
                update.error_message,
                update.duration_seconds,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        let updated = query_result(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn list_results(&self, launch_id: i64) -> StoreResult<Vec<TaskResult>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM task_results WHERE launch_id = ?1 ORDER BY id",
            RESULT_COLUMNS
        ))?;
        let results = stmt
            .query_map(params![launch_id], result_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }
}

impl RunRegistry for SqliteStore {
    fn get_launch(&self, id: i64) -> StoreResult<Option<Launch>> {
        let conn = self.lock()?;
        query_launch(&conn, id)
    }

    fn set_launch_status(
        &self,
        id: i64,
        status: Status,
        summary: Option<&str>,
    ) -> StoreResult<Option<Launch>> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE launches SET status = ?1, summary = COALESCE(?2, summary), updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), summary, Utc::now().to_rfc3339(), id],
        )?;
        query_launch(&conn, id)
    }

    fn begin_run(&self, id: i64) -> StoreResult<Admission> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE launches SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status != ?1",
            params![Status::InProgress.as_str(), Utc::now().to_rfc3339(), id],
        )?;

        match query_launch(&conn, id)? {
            Some(launch) if changed > 0 => Ok(Admission::Admitted(launch)),
            Some(_) => Ok(Admission::AlreadyRunning),
            None => Ok(Admission::NotFound),
        }
    }
}

fn query_launch(conn: &Connection, id: i64) -> StoreResult<Option<Launch>> {
    let launch = conn
        .query_row(
            &format!("SELECT {} FROM launches WHERE id = ?1", LAUNCH_COLUMNS),
            params![id],
            launch_from_row,
        )
        .optional()?;
    Ok(launch)
}

fn query_result(conn: &Connection, id: i64) -> StoreResult<Option<TaskResult>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM task_results WHERE id = ?1", RESULT_COLUMNS),
            params![id],
            result_from_row,
        )
        .optional()?;
    Ok(result)
}

fn launch_from_row(row: &Row<'_>) -> rusqlite::Result<Launch> {
    Ok(Launch {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        product_type: row.get(3)?,
        target_market: row.get(4)?,
        status: parse_text(row, 5)?,
        summary: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
        updated_at: match row.get::<_, Option<String>>(8)? {
            Some(_) => Some(parse_timestamp(row, 8)?),
            None => None,
        },
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<TaskResult> {
    Ok(TaskResult {
        id: row.get(0)?,
        launch_id: row.get(1)?,
        task_name: row.get(2)?,
        category: parse_text(row, 3)?,
        output: row.get(4)?,
        status: parse_text(row, 5)?,
        error_flag: row.get(6)?,
        error_message: row.get(7)?,
        duration_seconds: row.get(8)?,
        timestamp: parse_timestamp(row, 9)?,
    })
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
