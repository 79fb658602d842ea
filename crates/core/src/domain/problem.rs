use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemId(pub String);

impl ProblemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStatus {
    New,
    InProgress,
    WaitingCustomer,
    Resolved,
    Reopened,
}

impl ProblemStatus {
    /// Everything except `resolved` counts against the one-active-problem
    /// invariant.
    pub fn is_active(&self) -> bool {
        !matches!(self, ProblemStatus::Resolved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemStatus::New => "new",
            ProblemStatus::InProgress => "in_progress",
            ProblemStatus::WaitingCustomer => "waiting_customer",
            ProblemStatus::Resolved => "resolved",
            ProblemStatus::Reopened => "reopened",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub customer_id: String,
    pub conversation_id: ConversationId,
    pub title: String,
    pub description: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub status: ProblemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Problem {
    pub fn detect(
        customer_id: impl Into<String>,
        conversation_id: ConversationId,
        title: impl Into<String>,
        description: impl Into<String>,
        intent: Option<String>,
        confidence: Option<f64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProblemId::generate(),
            customer_id: customer_id.into(),
            conversation_id,
            title: title.into().trim().to_string(),
            description: description.into().trim().to_string(),
            intent,
            confidence,
            status: ProblemStatus::New,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn set_status(&mut self, status: ProblemStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.updated_at = Utc::now();
        match status {
            ProblemStatus::Resolved => self.resolved_at = Some(self.updated_at),
            ProblemStatus::Reopened => self.resolved_at = None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;

    use super::{Problem, ProblemStatus};

    fn problem() -> Problem {
        Problem::detect(
            "cust-1",
            ConversationId("conv-1".to_string()),
            "无法登录",
            "客户反馈系统无法登录",
            Some("inquiry".to_string()),
            Some(0.5),
        )
    }

    #[test]
    fn detect_starts_in_new() {
        let problem = problem();
        assert_eq!(problem.status, ProblemStatus::New);
        assert!(problem.is_active());
        assert!(problem.resolved_at.is_none());
    }

    #[test]
    fn resolving_stamps_resolved_at() {
        let mut problem = problem();
        problem.set_status(ProblemStatus::Resolved);
        assert!(!problem.is_active());
        assert!(problem.resolved_at.is_some());
    }

    #[test]
    fn reopening_clears_resolved_at() {
        let mut problem = problem();
        problem.set_status(ProblemStatus::Resolved);
        problem.set_status(ProblemStatus::Reopened);
        assert!(problem.is_active());
        assert!(problem.resolved_at.is_none());
    }

    #[test]
    fn only_resolved_is_inactive() {
        for status in [
            ProblemStatus::New,
            ProblemStatus::InProgress,
            ProblemStatus::WaitingCustomer,
            ProblemStatus::Reopened,
        ] {
            assert!(status.is_active(), "{status:?} should count as active");
        }
        assert!(!ProblemStatus::Resolved.is_active());
    }
}
