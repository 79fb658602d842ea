use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityReportId(pub String);

impl QualityReportId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Stored verdict from the post-close inspection webhook.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub id: QualityReportId,
    pub conversation_id: ConversationId,
    pub quality_score: i64,
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl QualityReport {
    pub fn record(
        conversation_id: ConversationId,
        quality_score: i64,
        report: serde_json::Value,
    ) -> Self {
        Self {
            id: QualityReportId::generate(),
            conversation_id,
            quality_score,
            report,
            created_at: Utc::now(),
        }
    }

    pub fn is_below(&self, threshold: i64) -> bool {
        self.quality_score < threshold
    }
}
