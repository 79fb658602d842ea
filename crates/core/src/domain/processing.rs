use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::detect::RequirementCandidate;
use crate::domain::conversation::{AgentMode, Channel, ConversationId};
use crate::domain::requirement::{Priority, RequirementId};
use crate::domain::review::ReviewRequestId;
use crate::domain::task::TaskId;

/// Inbound customer message as handed over by an IM integration or the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub customer_id: String,
    pub content: String,
    pub channel: Channel,
    pub sender_id: String,
    #[serde(default)]
    pub mode: Option<AgentMode>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A task the system suggests but leaves for a human to accept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendedTask {
    pub title: String,
    pub priority: Priority,
    pub requirement_id: Option<RequirementId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSuggestion {
    pub conversation_id: ConversationId,
    pub suggested_reply: String,
    pub confidence: f64,
    pub detected_requirements: Vec<RequirementCandidate>,
    pub recommended_tasks: Vec<RecommendedTask>,
    pub needs_human_review: bool,
    pub reason: Option<String>,
    pub review_request_id: Option<ReviewRequestId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    AutoHandled,
    NeedsReview,
    Escalated,
}

/// What one `process_customer_message` call did, step by step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub conversation_id: ConversationId,
    pub requirements_created: Vec<RequirementId>,
    pub tasks_created: Vec<TaskId>,
    pub agent_suggestion: AgentSuggestion,
    pub status: ProcessingStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub success: bool,
    pub summary: String,
    pub incomplete_tasks: Vec<TaskId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequirementConversationOutcome {
    pub conversation_id: Option<ConversationId>,
    pub needs_customer_communication: bool,
    pub reason: String,
}
