//! Task registry: tracks the lifecycle of long-running batch operations
//! (spec §3/§6).
//!
//! Grounded on `backend/services/task.py::TaskManager` (UUID-keyed map
//! behind a lock, `create_task`/`get_task`/`update_task`/`delete_task`/
//! `safe_get_and_update_task`) for the record shape and operations, and on
//! the teacher's `ingestor/state_manager.rs::IngestionStateManager` for the
//! `Arc<RwLock<HashMap<_, _>>>` + `tokio::sync::broadcast` idiom, carried
//! here too so callers can subscribe to progress instead of only polling.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::errors::TaskError;

/// A task's position in its lifecycle. Valid forward transitions are
/// `Initializing -> Pending -> Running -> {Completed | Error | Failed}`;
/// the three outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Initializing,
    Pending,
    Running,
    Completed,
    Error,
    Failed,
}

impl TaskStatus {
    fn can_advance_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Initializing, Pending)
                | (Pending, Running)
                | (Running, Completed)
                | (Running, Error)
                | (Running, Failed)
        )
    }

    /// A task may only be deleted while pending, or once it has reached a
    /// non-running terminal state.
    fn is_deletable(self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::Completed | TaskStatus::Error | TaskStatus::Failed
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Initializing => "initializing",
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A long-running batch operation's state, as visible to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub description: String,
    pub url: String,
    pub status: TaskStatus,
    pub total: i64,
    pub processed: i64,
    pub success: i64,
    /// Percentage, rounded to two decimal places.
    pub progress: f64,
    pub created_at: i64,
    pub updated_at: i64,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl Task {
    fn new(id: String, task_type: String, description: String, url: String, total: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id,
            task_type,
            description,
            url,
            status: TaskStatus::Initializing,
            total,
            processed: 0,
            success: 0,
            progress: 0.0,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    fn recompute_progress(&mut self) {
        self.progress = if self.total > 0 {
            let pct = (self.processed as f64 / self.total as f64) * 100.0;
            (pct * 100.0).round() / 100.0
        } else {
            0.0
        };
    }
}

/// Parameters for creating a new task.
pub struct CreateTaskParams {
    pub task_type: String,
    pub description: String,
    pub url: String,
    pub total: i64,
}

/// A patch applied to an existing task via [`TaskRegistry::update`]. Only
/// fields set to `Some` are touched.
#[derive(Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub total: Option<i64>,
    pub processed: Option<i64>,
    pub success: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[allow(dead_code)]
pub type ProgressSender = broadcast::Sender<Task>;
#[allow(dead_code)]
pub type ProgressReceiver = broadcast::Receiver<Task>;

/// Holds every in-flight and recently finished task, keyed by id.
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    progress_tx: ProgressSender,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(1000);
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            progress_tx,
        }
    }

    #[allow(dead_code)]
    pub fn subscribe(&self) -> ProgressReceiver {
        self.progress_tx.subscribe()
    }

    /// Creates a task in `Initializing` status, immediately advances it to
    /// `Pending`, and returns its id.
    pub async fn create(&self, params: CreateTaskParams) -> String {
        let id = Uuid::new_v4().to_string();
        let mut task = Task::new(id.clone(), params.task_type, params.description, params.url, params.total);
        task.status = TaskStatus::Pending;

        let mut tasks = self.tasks.write().await;
        let _ = self.progress_tx.send(task.clone());
        tasks.insert(id.clone(), task);
        id
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    pub async fn get_all(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Applies `patch` to the task, validating any status transition, and
    /// refreshes `updated_at`. Recomputes `progress` whenever `processed` or
    /// `total` changes.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(id).ok_or_else(|| TaskError::NotFound { id: id.to_string() })?;

        if let Some(new_status) = patch.status {
            if new_status != task.status && !task.status.can_advance_to(new_status) {
                return Err(TaskError::InvalidTransition {
                    id: id.to_string(),
                    from: task.status.to_string(),
                    to: new_status.to_string(),
                });
            }
            task.status = new_status;
        }
        if let Some(total) = patch.total {
            task.total = total;
        }
        if let Some(processed) = patch.processed {
            task.processed = processed;
        }
        if let Some(success) = patch.success {
            task.success = success;
        }
        if let Some(result) = patch.result {
            task.result = Some(result);
        }
        if let Some(error) = patch.error {
            task.error = Some(error);
        }

        task.recompute_progress();
        task.updated_at = Utc::now().timestamp();

        let updated = task.clone();
        let _ = self.progress_tx.send(updated.clone());
        Ok(updated)
    }

    /// Deletes a task, refusing while it's `Initializing` or `Running`.
    pub async fn delete(&self, id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get(id).ok_or_else(|| TaskError::NotFound { id: id.to_string() })?;
        if !task.status.is_deletable() {
            return Err(TaskError::NotDeletable {
                id: id.to_string(),
                status: task.status.to_string(),
            });
        }
        tasks.remove(id);
        Ok(())
    }

    pub async fn clear(&self) {
        self.tasks.write().await.clear();
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
