use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;
use crate::domain::processing::AgentSuggestion;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewRequestId(pub String);

impl ReviewRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// Escalated suggestion waiting for a human decision. The payload keeps the
/// complete suggestion so reviewers see exactly what would have been sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: ReviewRequestId,
    pub conversation_id: ConversationId,
    pub suggestion: AgentSuggestion,
    pub confidence: f64,
    pub status: ReviewStatus,
    pub reviewer_id: Option<String>,
    pub reviewer_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
    pub fn open(suggestion: AgentSuggestion) -> Self {
        let now = Utc::now();
        Self {
            id: ReviewRequestId::generate(),
            conversation_id: suggestion.conversation_id.clone(),
            confidence: suggestion.confidence,
            suggestion,
            status: ReviewStatus::Pending,
            reviewer_id: None,
            reviewer_note: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    pub fn complete(
        &mut self,
        status: ReviewStatus,
        reviewer_id: Option<String>,
        reviewer_note: Option<String>,
    ) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.reviewer_id = reviewer_id;
        self.reviewer_note = reviewer_note;
        self.updated_at = Utc::now();
        self.resolved_at = Some(self.updated_at);
    }
}
