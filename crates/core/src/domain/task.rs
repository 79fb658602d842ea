use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;
use crate::domain::requirement::{Priority, RequirementId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Completed and cancelled tasks no longer block conversation completion.
    pub fn is_settled(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

/// The requirement and conversation links never change after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub kind: String,
    pub conversation_id: Option<ConversationId>,
    pub requirement_id: Option<RequirementId>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn for_requirement(
        title: impl Into<String>,
        conversation_id: ConversationId,
        requirement_id: RequirementId,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            title: title.into(),
            kind: "support".to_string(),
            conversation_id: Some(conversation_id),
            requirement_id: Some(requirement_id),
            priority,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;
    use crate::domain::requirement::{Priority, RequirementId};

    use super::{Task, TaskStatus};

    #[test]
    fn for_requirement_links_both_aggregates() {
        let task = Task::for_requirement(
            "处理需求: 支持批量导出",
            ConversationId("conv-1".to_string()),
            RequirementId("req-1".to_string()),
            Priority::High,
        );

        assert_eq!(task.conversation_id, Some(ConversationId("conv-1".to_string())));
        assert_eq!(task.requirement_id, Some(RequirementId("req-1".to_string())));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.kind, "support");
    }

    #[test]
    fn settled_statuses_are_completed_and_cancelled() {
        assert!(TaskStatus::Completed.is_settled());
        assert!(TaskStatus::Cancelled.is_settled());
        assert!(!TaskStatus::Pending.is_settled());
        assert!(!TaskStatus::InProgress.is_settled());
    }
}
