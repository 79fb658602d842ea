use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementId(pub String);

impl RequirementId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn requires_immediate_task(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementCategory {
    Product,
    Technical,
    Service,
}

impl RequirementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementCategory::Product => "product",
            RequirementCategory::Technical => "technical",
            RequirementCategory::Service => "service",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Pending,
    Approved,
    Resolved,
    Ignored,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementSource {
    Conversation,
    Ticket,
    Manual,
}

/// Category, priority and source are classification outputs fixed at
/// creation; only `status` moves afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub customer_id: String,
    pub conversation_id: Option<ConversationId>,
    pub title: String,
    pub description: String,
    pub category: RequirementCategory,
    pub priority: Priority,
    pub status: RequirementStatus,
    pub source: RequirementSource,
    pub created_by: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewRequirement {
    pub customer_id: String,
    pub conversation_id: Option<ConversationId>,
    pub title: String,
    pub description: String,
    pub category: RequirementCategory,
    pub priority: Priority,
    pub source: RequirementSource,
    pub created_by: String,
}

impl Requirement {
    pub fn create(input: NewRequirement) -> Self {
        let now = Utc::now();
        Self {
            id: RequirementId::generate(),
            customer_id: input.customer_id,
            conversation_id: input.conversation_id,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            category: input.category,
            priority: input.priority,
            status: RequirementStatus::Pending,
            source: input.source,
            created_by: input.created_by,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Internal requirements can surface a customer conversation after the
    /// fact; this records the back-link.
    pub fn attach_conversation(&mut self, conversation_id: ConversationId) {
        self.conversation_id = Some(conversation_id);
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: RequirementStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;

    use super::{
        NewRequirement, Priority, Requirement, RequirementCategory, RequirementSource,
        RequirementStatus,
    };

    fn requirement(priority: Priority) -> Requirement {
        Requirement::create(NewRequirement {
            customer_id: "cust-1".to_string(),
            conversation_id: None,
            title: "  支持批量导出  ".to_string(),
            description: "希望可以批量导出报表".to_string(),
            category: RequirementCategory::Product,
            priority,
            source: RequirementSource::Conversation,
            created_by: "system".to_string(),
        })
    }

    #[test]
    fn create_trims_title_and_starts_pending() {
        let req = requirement(Priority::Medium);
        assert_eq!(req.title, "支持批量导出");
        assert_eq!(req.status, RequirementStatus::Pending);
    }

    #[test]
    fn high_and_urgent_priorities_demand_a_task() {
        assert!(Priority::High.requires_immediate_task());
        assert!(Priority::Urgent.requires_immediate_task());
        assert!(!Priority::Medium.requires_immediate_task());
        assert!(!Priority::Low.requires_immediate_task());
    }

    #[test]
    fn attach_conversation_records_the_back_link() {
        let mut req = requirement(Priority::High);
        req.attach_conversation(ConversationId("conv-9".to_string()));
        assert_eq!(req.conversation_id, Some(ConversationId("conv-9".to_string())));
    }
}
