use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::conversation::ConversationId;
use convoy_core::domain::processing::AgentSuggestion;
use convoy_core::domain::review::{ReviewRequest, ReviewRequestId, ReviewStatus};

use super::{RepositoryError, ReviewRequestRepository};
use crate::DbPool;

pub struct SqlReviewRequestRepository {
    pool: DbPool,
}

impl SqlReviewRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> ReviewStatus {
    match s {
        "approved" => ReviewStatus::Approved,
        "rejected" => ReviewStatus::Rejected,
        _ => ReviewStatus::Pending,
    }
}

pub fn review_status_as_str(status: &ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "pending",
        ReviewStatus::Approved => "approved",
        ReviewStatus::Rejected => "rejected",
    }
}

fn row_to_review_request(row: &sqlx::sqlite::SqliteRow) -> Result<ReviewRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let suggestion_json: String =
        row.try_get("suggestion").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let confidence: f64 =
        row.try_get("confidence").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reviewer_id: Option<String> =
        row.try_get("reviewer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reviewer_note: Option<String> =
        row.try_get("reviewer_note").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resolved_at_str: Option<String> =
        row.try_get("resolved_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let suggestion: AgentSuggestion = serde_json::from_str(&suggestion_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let resolved_at = resolved_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(ReviewRequest {
        id: ReviewRequestId(id),
        conversation_id: ConversationId(conversation_id),
        suggestion,
        confidence,
        status: parse_status(&status_str),
        reviewer_id,
        reviewer_note,
        created_at,
        updated_at,
        resolved_at,
    })
}

#[async_trait::async_trait]
impl ReviewRequestRepository for SqlReviewRequestRepository {
    async fn find_by_id(
        &self,
        id: &ReviewRequestId,
    ) -> Result<Option<ReviewRequest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, suggestion, confidence, status, reviewer_id,
                    reviewer_note, created_at, updated_at, resolved_at
             FROM review_requests WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_review_request(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: ReviewRequest) -> Result<(), RepositoryError> {
        let suggestion_json = serde_json::to_string(&request.suggestion)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let resolved_at_str = request.resolved_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            "INSERT INTO review_requests (id, conversation_id, suggestion, confidence, status,
                                          reviewer_id, reviewer_note, created_at, updated_at,
                                          resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 suggestion = excluded.suggestion,
                 status = excluded.status,
                 reviewer_id = excluded.reviewer_id,
                 reviewer_note = excluded.reviewer_note,
                 updated_at = excluded.updated_at,
                 resolved_at = excluded.resolved_at",
        )
        .bind(&request.id.0)
        .bind(&request.conversation_id.0)
        .bind(&suggestion_json)
        .bind(request.confidence)
        .bind(review_status_as_str(&request.status))
        .bind(&request.reviewer_id)
        .bind(&request.reviewer_note)
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .bind(&resolved_at_str)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, conversation_id, suggestion, confidence, status, reviewer_id,
                    reviewer_note, created_at, updated_at, resolved_at
             FROM review_requests
             WHERE status = 'pending'
             ORDER BY created_at ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_review_request).collect::<Result<Vec<_>, _>>()
    }
}
