use chrono::{DateTime, Utc};
use tracing::instrument;

use taskd_core::{Task, TaskId};

use crate::database::Database;
use crate::error::StoreError;

/// Attributes for creating a task. `done` defaults to false.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub done: bool,
    pub parent_id: Option<TaskId>,
}

/// Partial update. Outer `None` leaves the field unchanged; for the
/// optional columns an inner `None` clears the stored value.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub done: Option<bool>,
    pub parent_id: Option<Option<TaskId>>,
}

pub struct TaskRepo {
    db: Database,
}

impl TaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new task. Fails with `Validation` if the description is
    /// blank, or `NotFound` if `parent_id` points at no task.
    #[instrument(skip(self, new), fields(parent_id = ?new.parent_id))]
    pub fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        validate_description(&new.description)?;

        self.db.with_conn(|conn| {
            if let Some(parent_id) = &new.parent_id {
                ensure_exists(conn, parent_id)?;
            }

            let id = TaskId::new();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO tasks (id, description, due_date, done, parent_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.as_str(),
                    new.description,
                    new.due_date.map(|d| d.to_rfc3339()),
                    new.done,
                    new.parent_id.as_ref().map(|p| p.as_str()),
                    now,
                    now,
                ],
            )?;

            Ok(Task {
                id,
                description: new.description.clone(),
                due_date: new.due_date,
                done: new.done,
                parent_id: new.parent_id.clone(),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Get a task by ID.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn get(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.db.with_conn(|conn| select_task(conn, id))
    }

    /// Apply a partial update to a task and return the result.
    /// Read and write happen under one lock, so `NotFound` is exact.
    #[instrument(skip(self, patch), fields(task_id = %id))]
    pub fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        self.db.with_conn(|conn| {
            let mut task = select_task(conn, id)?;

            if let Some(description) = patch.description {
                validate_description(&description)?;
                task.description = description;
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = due_date;
            }
            if let Some(done) = patch.done {
                task.done = done;
            }
            if let Some(parent_id) = patch.parent_id {
                if let Some(parent_id) = &parent_id {
                    ensure_exists(conn, parent_id)?;
                    ensure_no_cycle(conn, id, parent_id)?;
                }
                task.parent_id = parent_id;
            }
            task.updated_at = Utc::now().to_rfc3339();

            conn.execute(
                "UPDATE tasks SET description = ?1, due_date = ?2, done = ?3, parent_id = ?4, updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    task.description,
                    task.due_date.map(|d| d.to_rfc3339()),
                    task.done,
                    task.parent_id.as_ref().map(|p| p.as_str()),
                    task.updated_at,
                    id.as_str(),
                ],
            )?;
            Ok(task)
        })
    }

    /// Delete a task and, transitively, all of its sub-tasks.
    /// Returns the number of removed records (at least 1).
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn delete(&self, id: &TaskId) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            ensure_exists(conn, id)?;

            // Walk the sub-task tree, parents before descendants.
            let mut doomed: Vec<TaskId> = Vec::new();
            let mut frontier = vec![id.clone()];
            while let Some(current) = frontier.pop() {
                if doomed.contains(&current) {
                    continue;
                }
                let mut stmt = conn.prepare("SELECT id FROM tasks WHERE parent_id = ?1")?;
                let children = stmt
                    .query_map([current.as_str()], |row| {
                        row.get::<_, String>(0).map(TaskId::from_raw)
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                frontier.extend(children);
                doomed.push(current);
            }

            // Delete leaves first so the self-referential FK holds throughout.
            for task_id in doomed.iter().rev() {
                conn.execute("DELETE FROM tasks WHERE id = ?1", [task_id.as_str()])?;
            }

            tracing::info!(removed = doomed.len(), "task deleted");
            Ok(doomed.len())
        })
    }

    /// List top-level tasks (no parent), in insertion order.
    #[instrument(skip(self))]
    pub fn list_parents(&self) -> Result<Vec<Task>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_TASK} WHERE parent_id IS NULL ORDER BY id"))?;
            let mut rows = stmt.query([])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }
            Ok(tasks)
        })
    }

    /// List the direct sub-tasks of a task, in insertion order.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn sub_tasks(&self, id: &TaskId) -> Result<Vec<Task>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_TASK} WHERE parent_id = ?1 ORDER BY id"))?;
            let mut rows = stmt.query([id.as_str()])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }
            Ok(tasks)
        })
    }
}

const SELECT_TASK: &str =
    "SELECT id, description, due_date, done, parent_id, created_at, updated_at FROM tasks";

fn validate_description(description: &str) -> Result<(), StoreError> {
    if description.trim().is_empty() {
        return Err(StoreError::Validation("description can't be blank".into()));
    }
    Ok(())
}

fn select_task(conn: &rusqlite::Connection, id: &TaskId) -> Result<Task, StoreError> {
    let mut stmt = conn.prepare(&format!("{SELECT_TASK} WHERE id = ?1"))?;
    let mut rows = stmt.query([id.as_str()])?;
    match rows.next()? {
        Some(row) => row_to_task(row),
        None => Err(StoreError::NotFound(format!("task {id}"))),
    }
}

/// Reject a parent assignment that would close a cycle: the proposed
/// parent must not be the task itself or any of its descendants. Walks
/// the ancestor chain of the proposed parent up to the root.
fn ensure_no_cycle(
    conn: &rusqlite::Connection,
    id: &TaskId,
    parent_id: &TaskId,
) -> Result<(), StoreError> {
    let mut current = Some(parent_id.clone());
    while let Some(ancestor) = current {
        if &ancestor == id {
            return Err(StoreError::Validation(
                "task cannot be nested under itself or one of its own sub-tasks".into(),
            ));
        }
        current = conn
            .query_row(
                "SELECT parent_id FROM tasks WHERE id = ?1",
                [ancestor.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .ok()
            .flatten()
            .map(TaskId::from_raw);
    }
    Ok(())
}

fn ensure_exists(conn: &rusqlite::Connection, id: &TaskId) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM tasks WHERE id = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .ok();
    if found.is_none() {
        return Err(StoreError::NotFound(format!("task {id}")));
    }
    Ok(())
}

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<Task, StoreError> {
    let due_date: Option<String> = row.get(2)?;
    let due_date = due_date
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| StoreError::Database(format!("tasks.due_date: {e}")))
        })
        .transpose()?;

    Ok(Task {
        id: TaskId::from_raw(row.get::<_, String>(0)?),
        description: row.get(1)?,
        due_date,
        done: row.get(3)?,
        parent_id: row.get::<_, Option<String>>(4)?.map(TaskId::from_raw),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
