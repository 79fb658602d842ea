use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::conversation::ConversationId;
use convoy_core::domain::quality::{QualityReport, QualityReportId};

use super::{QualityReportRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQualityReportRepository {
    pool: DbPool,
}

impl SqlQualityReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_report(row: &sqlx::sqlite::SqliteRow) -> Result<QualityReport, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quality_score: i64 =
        row.try_get("quality_score").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let report_json: String =
        row.try_get("report").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let report: serde_json::Value =
        serde_json::from_str(&report_json).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(QualityReport {
        id: QualityReportId(id),
        conversation_id: ConversationId(conversation_id),
        quality_score,
        report,
        created_at,
    })
}

#[async_trait::async_trait]
impl QualityReportRepository for SqlQualityReportRepository {
    async fn save(&self, report: QualityReport) -> Result<(), RepositoryError> {
        let report_json = serde_json::to_string(&report.report)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO quality_reports (id, conversation_id, quality_score, report, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 quality_score = excluded.quality_score,
                 report = excluded.report",
        )
        .bind(&report.id.0)
        .bind(&report.conversation_id.0)
        .bind(report.quality_score)
        .bind(&report_json)
        .bind(report.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<QualityReport>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, conversation_id, quality_score, report, created_at
             FROM quality_reports WHERE conversation_id = ? ORDER BY created_at DESC",
        )
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_report).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use convoy_core::domain::conversation::{Channel, Conversation, ConversationId, Message};
    use convoy_core::domain::quality::QualityReport;

    use super::SqlQualityReportRepository;
    use crate::repositories::{
        ConversationRepository, QualityReportRepository, SqlConversationRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_conversation(pool: &sqlx::SqlitePool) -> ConversationId {
        let conversation =
            Conversation::open("cust-1", Channel::Web, Message::customer("cust-1", "无法登录"));
        SqlConversationRepository::new(pool.clone())
            .save(conversation.clone())
            .await
            .expect("insert parent conversation");
        conversation.id
    }

    #[tokio::test]
    async fn save_and_find_by_conversation() {
        let pool = setup().await;
        let conversation_id = insert_conversation(&pool).await;
        let repo = SqlQualityReportRepository::new(pool);

        let report = QualityReport::record(
            conversation_id.clone(),
            62,
            serde_json::json!({"issues": ["回复超时"], "inspector": "webhook"}),
        );
        repo.save(report.clone()).await.expect("save");

        let found = repo.find_by_conversation(&conversation_id).await.expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].quality_score, 62);
        assert!(found[0].is_below(70));
        assert_eq!(found[0].report["inspector"], serde_json::json!("webhook"));
    }
}
