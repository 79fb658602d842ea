//! Bridges the stored knowledge base into the reply pipeline's lookup seam.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use convoy_agent::knowledge::{KnowledgeItem, KnowledgeLookup};
use convoy_db::repositories::KnowledgeRepository;

/// Longest excerpt of article content handed to a reply source.
const EXCERPT_CHAR_LIMIT: usize = 200;

/// Looks up knowledge entries whose title or tags contain one of the
/// whitespace-separated terms of the customer message.
pub struct RepositoryKnowledge {
    entries: Arc<dyn KnowledgeRepository>,
}

impl RepositoryKnowledge {
    pub fn new(entries: Arc<dyn KnowledgeRepository>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl KnowledgeLookup for RepositoryKnowledge {
    async fn related(&self, query: &str, limit: u32) -> Result<Vec<KnowledgeItem>> {
        let terms: Vec<&str> = query.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.entries.search(&terms, limit).await?;
        Ok(entries
            .into_iter()
            .map(|entry| KnowledgeItem {
                title: entry.title,
                content: Some(excerpt(&entry.content)),
                url: entry.url,
            })
            .collect())
    }
}

fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_CHAR_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use convoy_core::KnowledgeEntry;
    use convoy_db::repositories::{InMemoryKnowledgeRepository, KnowledgeRepository};

    use super::*;

    fn entry(title: &str, tags: &[&str], content: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(
            title,
            content,
            format!("https://kb.example.com/{title}"),
            tags.iter().map(|tag| tag.to_string()).collect(),
        )
    }

    async fn lookup_with(entries: Vec<KnowledgeEntry>) -> RepositoryKnowledge {
        let repository = Arc::new(InMemoryKnowledgeRepository::default());
        for item in entries {
            repository.save(item).await.expect("seed entry");
        }
        RepositoryKnowledge::new(repository)
    }

    #[tokio::test]
    async fn terms_match_against_titles_and_tags() {
        let lookup = lookup_with(vec![
            entry("登录问题排查", &["账号"], "先检查验证码通道。"),
            entry("发票开具指南", &["财务"], "在控制台提交抬头。"),
        ])
        .await;

        let items = lookup.related("登录 一直失败", 5).await.expect("lookup");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "登录问题排查");
        assert_eq!(items[0].url, "https://kb.example.com/登录问题排查");
        assert_eq!(items[0].content.as_deref(), Some("先检查验证码通道。"));
    }

    #[tokio::test]
    async fn blank_queries_skip_the_repository() {
        let lookup = lookup_with(vec![entry("登录问题排查", &[], "内容")]).await;

        let items = lookup.related("   ", 5).await.expect("lookup");

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn long_articles_are_excerpted() {
        let body: String = "很".repeat(500);
        let lookup = lookup_with(vec![entry("登录问题排查", &[], &body)]).await;

        let items = lookup.related("登录问题排查", 5).await.expect("lookup");

        let excerpt = items[0].content.as_deref().expect("excerpt");
        assert_eq!(excerpt.chars().count(), 200);
    }
}
