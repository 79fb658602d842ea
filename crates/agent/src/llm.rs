use anyhow::Result;
use async_trait::async_trait;
use convoy_core::{ConversationId, HistoryTurn};

use crate::insight::Sentiment;
use crate::knowledge::KnowledgeItem;

/// A model-drafted reply plus the model's own confidence in it.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmReply {
    pub suggested_reply: String,
    pub confidence: f64,
}

/// Text generation seam. `is_enabled` lets callers skip a disabled backend
/// without paying for a failed call.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn generate_reply(
        &self,
        message: &str,
        sentiment: &Sentiment,
        knowledge: &[KnowledgeItem],
        recent_history: &[HistoryTurn],
    ) -> Result<LlmReply>;

    async fn summarize(
        &self,
        conversation_id: &ConversationId,
        history: &[HistoryTurn],
    ) -> Result<String>;
}

/// Backend used when no model is configured. Callers who check `is_enabled`
/// never reach the erroring methods.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledLlm;

impl DisabledLlm {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmClient for DisabledLlm {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn generate_reply(
        &self,
        _message: &str,
        _sentiment: &Sentiment,
        _knowledge: &[KnowledgeItem],
        _recent_history: &[HistoryTurn],
    ) -> Result<LlmReply> {
        anyhow::bail!("llm backend is disabled")
    }

    async fn summarize(
        &self,
        _conversation_id: &ConversationId,
        _history: &[HistoryTurn],
    ) -> Result<String> {
        anyhow::bail!("llm backend is disabled")
    }
}
