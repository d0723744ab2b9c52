use crate::domain::models::{Task, TaskMetadata, TaskStatus, parse_date};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::next_id;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Remote persistence for tasks, keyed by owner and task id. Writes that name
/// a task the owner does not hold fail with [`InfraError::NotFound`] or, for
/// deletes, report `false`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, InfraError>;

    /// Persists a new task and returns it with the store-assigned id.
    async fn insert_task(&self, task: &Task) -> Result<Task, InfraError>;

    /// Updates the row matching both `task.user_id` and `task.id`.
    async fn update_task(&self, task: &Task) -> Result<(), InfraError>;

    async fn update_positions(
        &self,
        user_id: &str,
        positions: &[(String, i64)],
    ) -> Result<(), InfraError>;

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db_path: PathBuf,
}

impl SqliteTaskStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Runs `work` on a fresh connection off the async worker threads.
    async fn with_connection<T, F>(&self, work: F) -> Result<T, InfraError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, InfraError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<T, InfraError> {
            let mut connection = Connection::open(&db_path)?;
            work(&mut connection)
        })
        .await?
    }
}

type TaskRow = (String, String, String, String, String, i64, String);

fn task_from_row(row: TaskRow) -> Result<Task, InfraError> {
    let (id, user_id, title, date_raw, status_raw, position, metadata_raw) = row;
    let date = parse_date(&date_raw, "tasks.date").map_err(InfraError::InvalidConfig)?;
    let status = TaskStatus::parse(&status_raw).map_err(InfraError::InvalidConfig)?;
    let metadata: TaskMetadata = serde_json::from_str(&metadata_raw)?;
    Ok(Task {
        id,
        user_id,
        title,
        date,
        status,
        position,
        metadata,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, InfraError> {
        let user_id = user_id.to_string();
        self.with_connection(move |connection| {
            let mut statement = connection.prepare(
                "SELECT id, user_id, title, date, status, position, metadata
                 FROM tasks WHERE user_id = ?1
                 ORDER BY date ASC, position ASC, id ASC",
            )?;
            let rows = statement
                .query_map(params![user_id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?
                .collect::<Result<Vec<TaskRow>, _>>()?;
            rows.into_iter().map(task_from_row).collect()
        })
        .await
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, InfraError> {
        task.validate().map_err(InfraError::InvalidInput)?;
        let mut stored = task.clone();
        stored.id = next_id("task");
        let metadata = serde_json::to_string(&stored.metadata)?;

        self.with_connection(move |connection| {
            connection.execute(
                "INSERT INTO tasks (id, user_id, title, date, status, position, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    stored.id,
                    stored.user_id,
                    stored.title,
                    stored.date.to_string(),
                    stored.status.as_str(),
                    stored.position,
                    metadata,
                ],
            )?;
            Ok(stored)
        })
        .await
    }

    async fn update_task(&self, task: &Task) -> Result<(), InfraError> {
        task.validate().map_err(InfraError::InvalidInput)?;
        let task = task.clone();
        let metadata = serde_json::to_string(&task.metadata)?;

        self.with_connection(move |connection| {
            let changed = connection.execute(
                "UPDATE tasks
                 SET title = ?3, date = ?4, status = ?5, position = ?6, metadata = ?7
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    task.id,
                    task.user_id,
                    task.title,
                    task.date.to_string(),
                    task.status.as_str(),
                    task.position,
                    metadata,
                ],
            )?;
            if changed == 0 {
                return Err(InfraError::NotFound(format!("task {}", task.id)));
            }
            Ok(())
        })
        .await
    }

    async fn update_positions(
        &self,
        user_id: &str,
        positions: &[(String, i64)],
    ) -> Result<(), InfraError> {
        let user_id = user_id.to_string();
        let positions = positions.to_vec();

        self.with_connection(move |connection| {
            let transaction = connection.transaction()?;
            for (task_id, position) in &positions {
                let changed = transaction.execute(
                    "UPDATE tasks SET position = ?3 WHERE id = ?1 AND user_id = ?2",
                    params![task_id, user_id, position],
                )?;
                if changed == 0 {
                    // Dropping the transaction rolls back earlier rows.
                    return Err(InfraError::NotFound(format!("task {task_id}")));
                }
            }
            transaction.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool, InfraError> {
        let user_id = user_id.to_string();
        let task_id = task_id.to_string();
        self.with_connection(move |connection| {
            let deleted = connection.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryTaskStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Task>>, InfraError> {
        self.tasks
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task store lock poisoned: {error}")))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, InfraError> {
        let tasks = self.lock()?;
        let mut owned: Vec<Task> = tasks
            .iter()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|left, right| (left.date, left.position).cmp(&(right.date, right.position)));
        Ok(owned)
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, InfraError> {
        task.validate().map_err(InfraError::InvalidInput)?;
        let mut stored = task.clone();
        stored.id = next_id("task");
        self.lock()?.push(stored.clone());
        Ok(stored)
    }

    async fn update_task(&self, task: &Task) -> Result<(), InfraError> {
        let mut tasks = self.lock()?;
        let Some(existing) = tasks
            .iter_mut()
            .find(|candidate| candidate.id == task.id && candidate.user_id == task.user_id)
        else {
            return Err(InfraError::NotFound(format!("task {}", task.id)));
        };
        *existing = task.clone();
        Ok(())
    }

    async fn update_positions(
        &self,
        user_id: &str,
        positions: &[(String, i64)],
    ) -> Result<(), InfraError> {
        let mut tasks = self.lock()?;
        let owns = |task_id: &str| {
            tasks
                .iter()
                .any(|task| task.id == task_id && task.user_id == user_id)
        };
        if let Some((missing, _)) = positions
            .iter()
            .find(|(task_id, _)| !owns(task_id.as_str()))
        {
            return Err(InfraError::NotFound(format!("task {missing}")));
        }
        for (task_id, position) in positions {
            if let Some(task) = tasks
                .iter_mut()
                .find(|candidate| &candidate.id == task_id && candidate.user_id == user_id)
            {
                task.position = *position;
            }
        }
        Ok(())
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool, InfraError> {
        let mut tasks = self.lock()?;
        let before = tasks.len();
        tasks.retain(|task| !(task.id == task_id && task.user_id == user_id));
        Ok(tasks.len() != before)
    }
}
