use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::conversation::ConversationId;
use convoy_core::domain::requirement::{
    Priority, Requirement, RequirementCategory, RequirementId, RequirementSource,
    RequirementStatus,
};

use super::{RepositoryError, RequirementRepository};
use crate::DbPool;

pub struct SqlRequirementRepository {
    pool: DbPool,
}

impl SqlRequirementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn parse_priority(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        "urgent" => Priority::Urgent,
        _ => Priority::Medium,
    }
}

fn parse_category(s: &str) -> RequirementCategory {
    match s {
        "product" => RequirementCategory::Product,
        "technical" => RequirementCategory::Technical,
        _ => RequirementCategory::Service,
    }
}

fn parse_status(s: &str) -> RequirementStatus {
    match s {
        "approved" => RequirementStatus::Approved,
        "resolved" => RequirementStatus::Resolved,
        "ignored" => RequirementStatus::Ignored,
        "cancelled" => RequirementStatus::Cancelled,
        _ => RequirementStatus::Pending,
    }
}

pub fn requirement_status_as_str(status: &RequirementStatus) -> &'static str {
    match status {
        RequirementStatus::Pending => "pending",
        RequirementStatus::Approved => "approved",
        RequirementStatus::Resolved => "resolved",
        RequirementStatus::Ignored => "ignored",
        RequirementStatus::Cancelled => "cancelled",
    }
}

fn parse_source(s: &str) -> RequirementSource {
    match s {
        "ticket" => RequirementSource::Ticket,
        "manual" => RequirementSource::Manual,
        _ => RequirementSource::Conversation,
    }
}

pub fn requirement_source_as_str(source: &RequirementSource) -> &'static str {
    match source {
        RequirementSource::Conversation => "conversation",
        RequirementSource::Ticket => "ticket",
        RequirementSource::Manual => "manual",
    }
}

fn row_to_requirement(row: &sqlx::sqlite::SqliteRow) -> Result<Requirement, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: Option<String> =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category_str: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority_str: String =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source_str: String =
        row.try_get("source").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_json: String =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let metadata: HashMap<String, serde_json::Value> = serde_json::from_str(&metadata_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Requirement {
        id: RequirementId(id),
        customer_id,
        conversation_id: conversation_id.map(ConversationId),
        title,
        description,
        category: parse_category(&category_str),
        priority: parse_priority(&priority_str),
        status: parse_status(&status_str),
        source: parse_source(&source_str),
        created_by,
        metadata,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl RequirementRepository for SqlRequirementRepository {
    async fn find_by_id(
        &self,
        id: &RequirementId,
    ) -> Result<Option<Requirement>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, conversation_id, title, description, category,
                    priority, status, source, created_by, metadata, created_at, updated_at
             FROM requirements WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_requirement(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, requirement: Requirement) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&requirement.metadata)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let conversation_id = requirement.conversation_id.as_ref().map(|id| id.0.clone());

        sqlx::query(
            "INSERT INTO requirements (id, customer_id, conversation_id, title, description,
                                       category, priority, status, source, created_by, metadata,
                                       created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 conversation_id = excluded.conversation_id,
                 title = excluded.title,
                 description = excluded.description,
                 status = excluded.status,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
        )
        .bind(&requirement.id.0)
        .bind(&requirement.customer_id)
        .bind(&conversation_id)
        .bind(&requirement.title)
        .bind(&requirement.description)
        .bind(requirement.category.as_str())
        .bind(requirement.priority.as_str())
        .bind(requirement_status_as_str(&requirement.status))
        .bind(requirement_source_as_str(&requirement.source))
        .bind(&requirement.created_by)
        .bind(&metadata_json)
        .bind(requirement.created_at.to_rfc3339())
        .bind(requirement.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Requirement>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, customer_id, conversation_id, title, description, category,
                    priority, status, source, created_by, metadata, created_at, updated_at
             FROM requirements WHERE customer_id = ? ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_requirement).collect::<Result<Vec<_>, _>>()
    }
}
