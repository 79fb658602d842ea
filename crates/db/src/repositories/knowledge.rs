use chrono::{DateTime, Utc};
use sqlx::Row;

use convoy_core::domain::knowledge::{KnowledgeEntry, KnowledgeEntryId};

use super::{KnowledgeRepository, RepositoryError};
use crate::DbPool;

pub struct SqlKnowledgeRepository {
    pool: DbPool,
}

impl SqlKnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let url: String = row.try_get("url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tags_json: String =
        row.try_get("tags").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let tags: Vec<String> =
        serde_json::from_str(&tags_json).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(KnowledgeEntry {
        id: KnowledgeEntryId(id),
        title,
        content,
        url,
        tags,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl KnowledgeRepository for SqlKnowledgeRepository {
    async fn save(&self, entry: KnowledgeEntry) -> Result<(), RepositoryError> {
        let tags_json = serde_json::to_string(&entry.tags)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO knowledge_entries (id, title, content, url, tags, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 content = excluded.content,
                 url = excluded.url,
                 tags = excluded.tags,
                 updated_at = excluded.updated_at",
        )
        .bind(&entry.id.0)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(&entry.url)
        .bind(&tags_json)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(
        &self,
        terms: &[&str],
        limit: u32,
    ) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        let terms: Vec<&str> =
            terms.iter().copied().filter(|term| !term.trim().is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let clauses =
            vec!["(title LIKE ? OR tags LIKE ?)"; terms.len()].join(" OR ");
        let sql = format!(
            "SELECT id, title, content, url, tags, created_at, updated_at
             FROM knowledge_entries
             WHERE {clauses}
             ORDER BY updated_at DESC
             LIMIT ?"
        );

        let mut query = sqlx::query(&sql);
        for term in &terms {
            let pattern = format!("%{term}%");
            query = query.bind(pattern.clone()).bind(pattern);
        }
        let rows: Vec<sqlx::sqlite::SqliteRow> = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()
    }
}
