use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::conversation::ConversationId;
use convoy_core::domain::problem::{Problem, ProblemId, ProblemStatus};

use super::{ProblemRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProblemRepository {
    pool: DbPool,
}

impl SqlProblemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> ProblemStatus {
    match s {
        "in_progress" => ProblemStatus::InProgress,
        "waiting_customer" => ProblemStatus::WaitingCustomer,
        "resolved" => ProblemStatus::Resolved,
        "reopened" => ProblemStatus::Reopened,
        _ => ProblemStatus::New,
    }
}

fn row_to_problem(row: &sqlx::sqlite::SqliteRow) -> Result<Problem, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let intent: Option<String> =
        row.try_get("intent").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let confidence: Option<f64> =
        row.try_get("confidence").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resolved_at_str: Option<String> =
        row.try_get("resolved_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let resolved_at = resolved_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Problem {
        id: ProblemId(id),
        customer_id,
        conversation_id: ConversationId(conversation_id),
        title,
        description,
        intent,
        confidence,
        status: parse_status(&status_str),
        created_at,
        updated_at,
        resolved_at,
    })
}

#[async_trait::async_trait]
impl ProblemRepository for SqlProblemRepository {
    async fn find_by_id(&self, id: &ProblemId) -> Result<Option<Problem>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, conversation_id, title, description, intent, confidence,
                    status, created_at, updated_at, resolved_at
             FROM problems WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_problem(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, problem: Problem) -> Result<(), RepositoryError> {
        let resolved_at_str = problem.resolved_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            "INSERT INTO problems (id, customer_id, conversation_id, title, description, intent,
                                   confidence, status, created_at, updated_at, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 intent = excluded.intent,
                 confidence = excluded.confidence,
                 status = excluded.status,
                 updated_at = excluded.updated_at,
                 resolved_at = excluded.resolved_at",
        )
        .bind(&problem.id.0)
        .bind(&problem.customer_id)
        .bind(&problem.conversation_id.0)
        .bind(&problem.title)
        .bind(&problem.description)
        .bind(&problem.intent)
        .bind(problem.confidence)
        .bind(problem.status.as_str())
        .bind(problem.created_at.to_rfc3339())
        .bind(problem.updated_at.to_rfc3339())
        .bind(&resolved_at_str)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_active_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Problem>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, conversation_id, title, description, intent, confidence,
                    status, created_at, updated_at, resolved_at
             FROM problems
             WHERE conversation_id = ? AND status != 'resolved'
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_problem(r)?)),
            None => Ok(None),
        }
    }

    async fn find_latest_resolved_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Problem>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, conversation_id, title, description, intent, confidence,
                    status, created_at, updated_at, resolved_at
             FROM problems
             WHERE conversation_id = ? AND status = 'resolved'
             ORDER BY resolved_at DESC
             LIMIT 1",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_problem(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Problem>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, customer_id, conversation_id, title, description, intent, confidence,
                    status, created_at, updated_at, resolved_at
             FROM problems WHERE conversation_id = ? ORDER BY created_at ASC",
        )
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_problem).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use convoy_core::domain::conversation::{Channel, Conversation, ConversationId, Message};
    use convoy_core::domain::problem::{Problem, ProblemStatus};

    use super::SqlProblemRepository;
    use crate::repositories::{ConversationRepository, ProblemRepository, SqlConversationRepository};
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

    fn sample_problem(conversation_id: &ConversationId) -> Problem {
        Problem::detect(
            "cust-1",
            conversation_id.clone(),
            "无法登录",
            "客户反馈系统无法登录",
            Some("inquiry".to_string()),
            Some(0.5),
        )
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let pool = setup().await;
        let conversation_id = insert_conversation(&pool).await;
        let repo = SqlProblemRepository::new(pool);

        let problem = sample_problem(&conversation_id);
        repo.save(problem.clone()).await.expect("save");

        let found = repo.find_by_id(&problem.id).await.expect("find").expect("exists");
        assert_eq!(found.title, "无法登录");
        assert_eq!(found.status, ProblemStatus::New);
        assert_eq!(found.intent.as_deref(), Some("inquiry"));
        assert_eq!(found.confidence, Some(0.5));
    }

    #[tokio::test]
    async fn active_lookup_ignores_resolved_problems() {
        let pool = setup().await;
        let conversation_id = insert_conversation(&pool).await;
        let repo = SqlProblemRepository::new(pool);

        let mut resolved = sample_problem(&conversation_id);
        resolved.set_status(ProblemStatus::Resolved);
        repo.save(resolved).await.expect("save resolved");

        let active = repo
            .find_active_by_conversation(&conversation_id)
            .await
            .expect("query active");
        assert!(active.is_none());

        let mut in_progress = sample_problem(&conversation_id);
        in_progress.set_status(ProblemStatus::InProgress);
        repo.save(in_progress.clone()).await.expect("save active");

        let active = repo
            .find_active_by_conversation(&conversation_id)
            .await
            .expect("query active again")
            .expect("active problem exists");
        assert_eq!(active.id, in_progress.id);
    }

    #[tokio::test]
    async fn latest_resolved_lookup_orders_by_resolution_time() {
        let pool = setup().await;
        let conversation_id = insert_conversation(&pool).await;
        let repo = SqlProblemRepository::new(pool);

        let mut older = sample_problem(&conversation_id);
        older.set_status(ProblemStatus::Resolved);
        repo.save(older.clone()).await.expect("save older");

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut newer = sample_problem(&conversation_id);
        newer.set_status(ProblemStatus::Resolved);
        repo.save(newer.clone()).await.expect("save newer");

        let latest = repo
            .find_latest_resolved_by_conversation(&conversation_id)
            .await
            .expect("query")
            .expect("resolved problem exists");
        assert_eq!(latest.id, newer.id);
    }

    #[tokio::test]
    async fn reopen_round_trips_through_storage() {
        let pool = setup().await;
        let conversation_id = insert_conversation(&pool).await;
        let repo = SqlProblemRepository::new(pool);

        let mut problem = sample_problem(&conversation_id);
        problem.set_status(ProblemStatus::Resolved);
        repo.save(problem.clone()).await.expect("save resolved");

        problem.set_status(ProblemStatus::Reopened);
        repo.save(problem.clone()).await.expect("save reopened");

        let found = repo.find_by_id(&problem.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ProblemStatus::Reopened);
        assert!(found.resolved_at.is_none());
        assert!(found.is_active());
    }
}
