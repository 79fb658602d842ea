use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::conversation::ConversationId;
use convoy_core::domain::requirement::RequirementId;
use convoy_core::domain::task::{Task, TaskId, TaskStatus};

use super::requirement::parse_priority;
use super::{RepositoryError, TaskRepository};
use crate::DbPool;

pub struct SqlTaskRepository {
    pool: DbPool,
}

impl SqlTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Pending,
    }
}

pub fn task_status_as_str(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind: String = row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: Option<String> =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requirement_id: Option<String> =
        row.try_get("requirement_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority_str: String =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Task {
        id: TaskId(id),
        title,
        kind,
        conversation_id: conversation_id.map(ConversationId),
        requirement_id: requirement_id.map(RequirementId),
        priority: parse_priority(&priority_str),
        status: parse_status(&status_str),
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl TaskRepository for SqlTaskRepository {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, kind, conversation_id, requirement_id, priority, status,
                    created_at, updated_at
             FROM tasks WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_task(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, task: Task) -> Result<(), RepositoryError> {
        let conversation_id = task.conversation_id.as_ref().map(|id| id.0.clone());
        let requirement_id = task.requirement_id.as_ref().map(|id| id.0.clone());

        sqlx::query(
            "INSERT INTO tasks (id, title, kind, conversation_id, requirement_id, priority,
                                status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(&task.id.0)
        .bind(&task.title)
        .bind(&task.kind)
        .bind(&conversation_id)
        .bind(&requirement_id)
        .bind(task.priority.as_str())
        .bind(task_status_as_str(&task.status))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Task>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, title, kind, conversation_id, requirement_id, priority, status,
                    created_at, updated_at
             FROM tasks WHERE conversation_id = ? ORDER BY created_at ASC",
        )
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect::<Result<Vec<_>, _>>()
    }
}
