use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::conversation::{
    AgentMode, Channel, Conversation, ConversationId, ConversationStatus, Message,
};

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_channel(s: &str) -> Channel {
    match s {
        "feishu" => Channel::Feishu,
        "wecom" => Channel::Wecom,
        "dingtalk" => Channel::Dingtalk,
        "internal" => Channel::Internal,
        _ => Channel::Web,
    }
}

fn parse_status(s: &str) -> ConversationStatus {
    match s {
        "closed" => ConversationStatus::Closed,
        _ => ConversationStatus::Open,
    }
}

pub fn conversation_status_as_str(status: &ConversationStatus) -> &'static str {
    match status {
        ConversationStatus::Open => "open",
        ConversationStatus::Closed => "closed",
    }
}

fn parse_mode(s: &str) -> AgentMode {
    match s {
        "auto" => AgentMode::Auto,
        "human_first" => AgentMode::HumanFirst,
        _ => AgentMode::Supervised,
    }
}

pub fn agent_mode_as_str(mode: &AgentMode) -> &'static str {
    match mode {
        AgentMode::Auto => "auto",
        AgentMode::Supervised => "supervised",
        AgentMode::HumanFirst => "human_first",
    }
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let channel_str: String =
        row.try_get("channel").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let mode_str: String =
        row.try_get("mode").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let messages_json: String =
        row.try_get("messages").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_json: String =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let messages: Vec<Message> = serde_json::from_str(&messages_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata: HashMap<String, serde_json::Value> = serde_json::from_str(&metadata_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Conversation {
        id: ConversationId(id),
        customer_id,
        channel: parse_channel(&channel_str),
        status: parse_status(&status_str),
        mode: parse_mode(&mode_str),
        messages,
        metadata,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, channel, status, mode, messages, metadata,
                    created_at, updated_at
             FROM conversations WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn find_open_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, channel, status, mode, messages, metadata,
                    created_at, updated_at
             FROM conversations
             WHERE customer_id = ? AND status = 'open'
             ORDER BY updated_at DESC
             LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let messages_json = serde_json::to_string(&conversation.messages)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let metadata_json = serde_json::to_string(&conversation.metadata)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversations (id, customer_id, channel, status, mode, messages,
                                        metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 mode = excluded.mode,
                 messages = excluded.messages,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.customer_id)
        .bind(conversation.channel.as_str())
        .bind(conversation_status_as_str(&conversation.status))
        .bind(agent_mode_as_str(&conversation.mode))
        .bind(&messages_json)
        .bind(&metadata_json)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use convoy_core::domain::conversation::{
        AgentMode, Channel, Conversation, ConversationId, ConversationStatus, Message,
    };

    use super::SqlConversationRepository;
    use crate::repositories::ConversationRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_conversation(customer_id: &str, channel: Channel) -> Conversation {
        Conversation::open(customer_id, channel, Message::customer(customer_id, "系统无法登录"))
    }

    #[tokio::test]
    async fn save_and_find_by_id_round_trips_messages() {
        let pool = setup().await;
        let repo = SqlConversationRepository::new(pool);

        let mut conversation = sample_conversation("cust-1", Channel::Web);
        conversation.append_message(Message::system("工程师已接手处理"));
        conversation.metadata.insert("region".to_string(), serde_json::json!("cn-east"));

        repo.save(conversation.clone()).await.expect("save");
        let found = repo.find_by_id(&conversation.id).await.expect("find").expect("should exist");

        assert_eq!(found.customer_id, "cust-1");
        assert_eq!(found.messages.len(), 2);
        assert_eq!(found.messages[1].content, "工程师已接手处理");
        assert_eq!(found.metadata.get("region"), Some(&serde_json::json!("cn-east")));
        assert_eq!(found.mode, AgentMode::Supervised);
    }

    #[tokio::test]
    async fn find_open_by_customer_skips_closed_threads() {
        let pool = setup().await;
        let repo = SqlConversationRepository::new(pool);

        let mut closed = sample_conversation("cust-1", Channel::Web);
        closed.close().expect("close web conversation");
        repo.save(closed).await.expect("save closed");

        let open = sample_conversation("cust-1", Channel::Feishu);
        repo.save(open.clone()).await.expect("save open");

        let other = sample_conversation("cust-2", Channel::Web);
        repo.save(other).await.expect("save other customer");

        let found = repo.find_open_by_customer("cust-1").await.expect("query");
        assert_eq!(found.map(|c| c.id), Some(open.id));
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let pool = setup().await;
        let repo = SqlConversationRepository::new(pool);

        let mut conversation = sample_conversation("cust-1", Channel::Web);
        repo.save(conversation.clone()).await.expect("save");

        conversation.set_mode(AgentMode::Auto);
        conversation.append_message(Message::customer("cust-1", "现在可以了，谢谢"));
        conversation.close().expect("close");
        repo.save(conversation.clone()).await.expect("upsert");

        let found = repo.find_by_id(&conversation.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ConversationStatus::Closed);
        assert_eq!(found.mode, AgentMode::Auto);
        assert_eq!(found.messages.len(), 2);
    }

    #[tokio::test]
    async fn count_reflects_saved_rows() {
        let pool = setup().await;
        let repo = SqlConversationRepository::new(pool);

        assert_eq!(repo.count().await.expect("count empty"), 0);

        repo.save(sample_conversation("cust-1", Channel::Web)).await.expect("save 1");
        repo.save(sample_conversation("cust-2", Channel::Dingtalk)).await.expect("save 2");

        assert_eq!(repo.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn unknown_channel_decodes_to_web() {
        let pool = setup().await;

        let conversation = sample_conversation("cust-1", Channel::Web);
        let repo = SqlConversationRepository::new(pool.clone());
        repo.save(conversation.clone()).await.expect("save");

        sqlx::query("UPDATE conversations SET channel = 'telex' WHERE id = ?")
            .bind(&conversation.id.0)
            .execute(&pool)
            .await
            .expect("corrupt channel");

        let found = repo.find_by_id(&conversation.id).await.expect("find").expect("exists");
        assert_eq!(found.channel, Channel::Web);
        assert_eq!(found.id, ConversationId(conversation.id.0.clone()));
    }
}
