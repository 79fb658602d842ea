use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One article surfaced for a customer message. `url` is what replies link;
/// `content` is an optional excerpt for prompt building.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub title: String,
    pub content: Option<String>,
    pub url: String,
}

/// Retrieval seam for reply stages. Callers treat lookup failures as an empty
/// result; knowledge enriches a reply but never blocks one.
#[async_trait]
pub trait KnowledgeLookup: Send + Sync {
    async fn related(&self, query: &str, limit: u32) -> Result<Vec<KnowledgeItem>>;
}

/// Lookup for deployments without a knowledge base.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoKnowledge;

impl NoKnowledge {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KnowledgeLookup for NoKnowledge {
    async fn related(&self, _query: &str, _limit: u32) -> Result<Vec<KnowledgeItem>> {
        Ok(Vec::new())
    }
}
