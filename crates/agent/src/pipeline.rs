use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use convoy_core::{AgentMode, Channel, ConversationId, HistoryTurn, RequirementCandidate};
use serde_json::Value;
use tracing::{debug, warn};

use crate::chat::{ChatAgentClient, ChatRequest};
use crate::insight::{InsightService, Polarity};
use crate::knowledge::{KnowledgeItem, KnowledgeLookup};
use crate::llm::LlmClient;

pub const WORKFLOW_AGENT: &str = "react_workflow";
pub const STATIC_FALLBACK_AGENT: &str = "static_fallback";
pub const STATIC_FALLBACK_CONFIDENCE: f64 = 0.5;

/// Everything a reply source may consult about the message being answered.
#[derive(Clone, Debug)]
pub struct ReplyContext {
    pub conversation_id: ConversationId,
    pub customer_id: String,
    pub channel: Channel,
    pub mode: AgentMode,
    pub message: String,
    pub history: Vec<HistoryTurn>,
    pub detected_requirements: Vec<RequirementCandidate>,
}

impl ReplyContext {
    /// Last `turns` turns, oldest first.
    pub fn recent_history(&self, turns: usize) -> &[HistoryTurn] {
        let start = self.history.len().saturating_sub(turns);
        &self.history[start..]
    }
}

/// A drafted reply plus provenance. `needs_human_review` is only set when the
/// source itself judged the draft; `None` leaves the call to the reviewer
/// policy.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplySuggestion {
    pub suggested_reply: String,
    pub confidence: f64,
    pub agent_name: Option<String>,
    pub mode: Option<String>,
    pub needs_human_review: Option<bool>,
    pub metadata: HashMap<String, Value>,
}

/// One tier of the reply chain. `Ok(None)` means "not my message, ask the
/// next tier"; an error means the tier was supposed to answer and could not.
/// Both advance the chain.
#[async_trait]
pub trait ReplyStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, ctx: &ReplyContext) -> Result<Option<ReplySuggestion>>;
}

/// Optional multi-step workflow runtime consulted ahead of the plain agent.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn run(&self, ctx: &ReplyContext) -> Result<Option<ReplySuggestion>>;
}

pub struct WorkflowStage {
    engine: Arc<dyn WorkflowEngine>,
}

impl WorkflowStage {
    pub fn new(engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ReplyStrategy for WorkflowStage {
    fn name(&self) -> &'static str {
        "workflow"
    }

    async fn generate(&self, ctx: &ReplyContext) -> Result<Option<ReplySuggestion>> {
        let Some(mut suggestion) = self.engine.run(ctx).await? else {
            return Ok(None);
        };
        if suggestion.suggested_reply.trim().is_empty() {
            return Ok(None);
        }
        suggestion.agent_name.get_or_insert_with(|| WORKFLOW_AGENT.to_string());
        Ok(Some(suggestion))
    }
}

pub struct AgentStage {
    client: Arc<dyn ChatAgentClient>,
}

impl AgentStage {
    pub fn new(client: Arc<dyn ChatAgentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReplyStrategy for AgentStage {
    fn name(&self) -> &'static str {
        "agent"
    }

    async fn generate(&self, ctx: &ReplyContext) -> Result<Option<ReplySuggestion>> {
        let mut metadata = HashMap::new();
        metadata.insert("channel".to_string(), Value::from(ctx.channel.as_str()));
        metadata.insert("mode".to_string(), Value::from(ctx.mode.as_str()));
        metadata.insert("async_review".to_string(), Value::Bool(true));

        let request = ChatRequest {
            conversation_id: ctx.conversation_id.0.clone(),
            message: ctx.message.clone(),
            customer_id: ctx.customer_id.clone(),
            metadata,
        };

        let Some(response) = self.client.send_message(request).await? else {
            return Ok(None);
        };
        if !response.success || response.message.trim().is_empty() {
            return Ok(None);
        }

        let needs_human_review = response.metadata.get("needs_review").and_then(Value::as_bool);
        Ok(Some(ReplySuggestion {
            suggested_reply: response.message,
            // The agent wire contract defaults confidence to 1.0.
            confidence: response.confidence.unwrap_or(1.0),
            agent_name: Some(response.agent_name).filter(|name| !name.is_empty()),
            mode: response.mode,
            needs_human_review,
            metadata: response.metadata,
        }))
    }
}

pub struct LlmStage {
    llm: Arc<dyn LlmClient>,
    insight: Arc<dyn InsightService>,
    knowledge: Arc<dyn KnowledgeLookup>,
}

impl LlmStage {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        insight: Arc<dyn InsightService>,
        knowledge: Arc<dyn KnowledgeLookup>,
    ) -> Self {
        Self { llm, insight, knowledge }
    }
}

#[async_trait]
impl ReplyStrategy for LlmStage {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn generate(&self, ctx: &ReplyContext) -> Result<Option<ReplySuggestion>> {
        if !self.llm.is_enabled() {
            return Ok(None);
        }

        let sentiment = self.insight.analyze_sentiment(&ctx.message, &ctx.history).await;
        let knowledge = lookup_or_empty(self.knowledge.as_ref(), ctx, 3).await;
        let reply = self
            .llm
            .generate_reply(&ctx.message, &sentiment, &knowledge, ctx.recent_history(5))
            .await?;

        Ok(Some(ReplySuggestion {
            suggested_reply: reply.suggested_reply,
            confidence: reply.confidence,
            agent_name: None,
            mode: None,
            needs_human_review: None,
            metadata: HashMap::new(),
        }))
    }
}

/// Terminal tier. Always answers, from sentiment plus canned templates.
pub struct StaticFallbackStage {
    insight: Arc<dyn InsightService>,
    knowledge: Arc<dyn KnowledgeLookup>,
}

impl StaticFallbackStage {
    pub fn new(insight: Arc<dyn InsightService>, knowledge: Arc<dyn KnowledgeLookup>) -> Self {
        Self { insight, knowledge }
    }
}

#[async_trait]
impl ReplyStrategy for StaticFallbackStage {
    fn name(&self) -> &'static str {
        "static_fallback"
    }

    async fn generate(&self, ctx: &ReplyContext) -> Result<Option<ReplySuggestion>> {
        let sentiment = self.insight.analyze_sentiment(&ctx.message, &ctx.history).await;
        let knowledge = lookup_or_empty(self.knowledge.as_ref(), ctx, 2).await;
        Ok(Some(ReplySuggestion {
            suggested_reply: compose_fallback_reply(
                sentiment.polarity,
                &ctx.detected_requirements,
                &knowledge,
            ),
            confidence: STATIC_FALLBACK_CONFIDENCE,
            agent_name: Some(STATIC_FALLBACK_AGENT.to_string()),
            mode: None,
            needs_human_review: None,
            metadata: HashMap::new(),
        }))
    }
}

async fn lookup_or_empty(
    knowledge: &dyn KnowledgeLookup,
    ctx: &ReplyContext,
    limit: u32,
) -> Vec<KnowledgeItem> {
    match knowledge.related(&ctx.message, limit).await {
        Ok(items) => items,
        Err(error) => {
            warn!(
                event_name = "knowledge_lookup_failed",
                conversation_id = %ctx.conversation_id.0,
                customer_id = %ctx.customer_id,
                reason = %error,
            );
            Vec::new()
        }
    }
}

fn compose_fallback_reply(
    polarity: Polarity,
    requirements: &[RequirementCandidate],
    knowledge: &[KnowledgeItem],
) -> String {
    let mut reply = String::new();
    reply.push_str(match polarity {
        Polarity::Negative => "非常抱歉给您带来不便！我们理解您的困扰，会尽快帮您解决。\n\n",
        Polarity::Positive => "感谢您的反馈！很高兴能为您提供帮助。\n\n",
        Polarity::Neutral => "您好！我已收到您的消息。\n\n",
    });

    if requirements.is_empty() {
        reply.push_str("正在为您查询相关信息，请稍候。");
    } else {
        reply.push_str("我理解您的需求：\n");
        for (index, requirement) in requirements.iter().enumerate() {
            reply.push_str(&format!("{}. {}\n", index + 1, requirement.title));
        }
        reply.push('\n');
        reply.push_str("我已为您记录相关信息，工程师会尽快处理。");
    }

    if !knowledge.is_empty() {
        reply.push_str("\n\n您也可以参考以下文档：\n");
        for (index, item) in knowledge.iter().take(2).enumerate() {
            reply.push_str(&format!("{}. [{}]({})\n", index + 1, item.title, item.url));
        }
    }

    reply
}

/// Ordered reply chain. Tiers are consulted until one produces a draft; the
/// canned neutral reply guards the (empty-chain) bottom so callers always get
/// an answer.
pub struct ReplyPipeline {
    stages: Vec<Box<dyn ReplyStrategy>>,
}

impl ReplyPipeline {
    pub fn new(stages: Vec<Box<dyn ReplyStrategy>>) -> Self {
        Self { stages }
    }

    /// Production chain: optional workflow, then agent, llm and the static
    /// fallback.
    pub fn standard(
        workflow: Option<Arc<dyn WorkflowEngine>>,
        agent: Arc<dyn ChatAgentClient>,
        llm: Arc<dyn LlmClient>,
        insight: Arc<dyn InsightService>,
        knowledge: Arc<dyn KnowledgeLookup>,
    ) -> Self {
        let mut stages: Vec<Box<dyn ReplyStrategy>> = Vec::new();
        if let Some(engine) = workflow {
            stages.push(Box::new(WorkflowStage::new(engine)));
        }
        stages.push(Box::new(AgentStage::new(agent)));
        stages.push(Box::new(LlmStage::new(llm, insight.clone(), knowledge.clone())));
        stages.push(Box::new(StaticFallbackStage::new(insight, knowledge)));
        Self { stages }
    }

    pub async fn generate(&self, ctx: &ReplyContext) -> ReplySuggestion {
        for stage in &self.stages {
            match stage.generate(ctx).await {
                Ok(Some(suggestion)) => {
                    debug!(
                        event_name = "reply_stage_selected",
                        stage = stage.name(),
                        conversation_id = %ctx.conversation_id.0,
                        confidence = suggestion.confidence,
                    );
                    return suggestion;
                }
                Ok(None) => {
                    debug!(
                        event_name = "reply_stage_declined",
                        stage = stage.name(),
                        conversation_id = %ctx.conversation_id.0,
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "reply_stage_failed",
                        stage = stage.name(),
                        conversation_id = %ctx.conversation_id.0,
                        customer_id = %ctx.customer_id,
                        reason = %error,
                    );
                }
            }
        }

        ReplySuggestion {
            suggested_reply: compose_fallback_reply(Polarity::Neutral, &[], &[]),
            confidence: STATIC_FALLBACK_CONFIDENCE,
            agent_name: Some(STATIC_FALLBACK_AGENT.to_string()),
            mode: None,
            needs_human_review: None,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use convoy_core::{Priority, RequirementCategory, RequirementSource};

    use super::*;
    use crate::chat::ChatResponse;
    use crate::insight::{KeywordInsight, Sentiment};
    use crate::knowledge::NoKnowledge;
    use crate::llm::LlmReply;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct ScriptedAgent {
        response: Option<ChatResponse>,
        log: CallLog,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedAgent {
        fn new(response: Option<ChatResponse>, log: CallLog) -> Self {
            Self { response, log, seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatAgentClient for ScriptedAgent {
        async fn send_message(&self, request: ChatRequest) -> Result<Option<ChatResponse>> {
            self.log.lock().unwrap().push("agent");
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    struct ScriptedLlm {
        reply: Option<LlmReply>,
        log: CallLog,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn generate_reply(
            &self,
            _message: &str,
            _sentiment: &Sentiment,
            _knowledge: &[KnowledgeItem],
            _recent_history: &[HistoryTurn],
        ) -> Result<LlmReply> {
            self.log.lock().unwrap().push("llm");
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => anyhow::bail!("model offline"),
            }
        }

        async fn summarize(
            &self,
            _conversation_id: &ConversationId,
            _history: &[HistoryTurn],
        ) -> Result<String> {
            anyhow::bail!("not under test")
        }
    }

    struct CannedWorkflow(Option<ReplySuggestion>);

    #[async_trait]
    impl WorkflowEngine for CannedWorkflow {
        async fn run(&self, _ctx: &ReplyContext) -> Result<Option<ReplySuggestion>> {
            Ok(self.0.clone())
        }
    }

    struct CannedKnowledge(Vec<KnowledgeItem>);

    #[async_trait]
    impl KnowledgeLookup for CannedKnowledge {
        async fn related(&self, _query: &str, _limit: u32) -> Result<Vec<KnowledgeItem>> {
            Ok(self.0.clone())
        }
    }

    fn context(message: &str) -> ReplyContext {
        ReplyContext {
            conversation_id: ConversationId("conv-1".into()),
            customer_id: "cust-1".into(),
            channel: Channel::Web,
            mode: AgentMode::Auto,
            message: message.into(),
            history: Vec::new(),
            detected_requirements: Vec::new(),
        }
    }

    fn candidate(title: &str) -> RequirementCandidate {
        RequirementCandidate {
            title: title.to_string(),
            description: title.to_string(),
            category: RequirementCategory::Technical,
            priority: Priority::Medium,
            confidence: 0.8,
            source: RequirementSource::Conversation,
        }
    }

    fn draft(reply: &str) -> ReplySuggestion {
        ReplySuggestion {
            suggested_reply: reply.to_string(),
            confidence: 0.9,
            agent_name: None,
            mode: None,
            needs_human_review: None,
            metadata: HashMap::new(),
        }
    }

    fn agent_answer(message: &str) -> ChatResponse {
        ChatResponse {
            success: true,
            message: message.to_string(),
            agent_name: "support_agent".to_string(),
            mode: Some("agent_auto".to_string()),
            confidence: None,
            metadata: HashMap::new(),
        }
    }

    fn pipeline(
        workflow: Option<Arc<dyn WorkflowEngine>>,
        agent: Arc<dyn ChatAgentClient>,
        llm: Arc<dyn LlmClient>,
    ) -> ReplyPipeline {
        ReplyPipeline::standard(
            workflow,
            agent,
            llm,
            Arc::new(KeywordInsight::new()),
            Arc::new(NoKnowledge::new()),
        )
    }

    #[tokio::test]
    async fn workflow_reply_takes_priority_over_the_agent() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let agent = Arc::new(ScriptedAgent::new(Some(agent_answer("客服在线")), log.clone()));
        let workflow: Arc<dyn WorkflowEngine> =
            Arc::new(CannedWorkflow(Some(draft("工作流已为您处理完毕。"))));
        let chain = pipeline(
            Some(workflow),
            agent,
            Arc::new(ScriptedLlm { reply: None, log: log.clone() }),
        );

        let suggestion = chain.generate(&context("帮我查下订单")).await;
        assert_eq!(suggestion.suggested_reply, "工作流已为您处理完毕。");
        assert_eq!(suggestion.agent_name.as_deref(), Some(WORKFLOW_AGENT));
        assert!(log.lock().unwrap().is_empty(), "no other tier should be consulted");
    }

    #[tokio::test]
    async fn blank_workflow_draft_falls_through_to_the_agent() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut answer = agent_answer("请先重启客户端试试。");
        answer.metadata.insert("needs_review".to_string(), Value::Bool(true));
        let agent = Arc::new(ScriptedAgent::new(Some(answer), log.clone()));
        let workflow: Arc<dyn WorkflowEngine> = Arc::new(CannedWorkflow(Some(draft("  \n"))));
        let chain = pipeline(
            Some(workflow),
            agent,
            Arc::new(ScriptedLlm { reply: None, log: log.clone() }),
        );

        let suggestion = chain.generate(&context("客户端打不开")).await;
        assert_eq!(suggestion.suggested_reply, "请先重启客户端试试。");
        assert_eq!(suggestion.agent_name.as_deref(), Some("support_agent"));
        // Missing confidence on the wire reads as the contract default.
        assert!((suggestion.confidence - 1.0).abs() < 1e-9);
        assert_eq!(suggestion.needs_human_review, Some(true));
        assert_eq!(*log.lock().unwrap(), vec!["agent"]);
    }

    #[tokio::test]
    async fn declined_agent_reaches_the_llm_before_the_static_tier() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let declined = ChatResponse {
            success: false,
            message: "当前无法处理".to_string(),
            agent_name: String::new(),
            mode: None,
            confidence: None,
            metadata: HashMap::new(),
        };
        let agent = Arc::new(ScriptedAgent::new(Some(declined), log.clone()));
        let llm_reply = LlmReply {
            suggested_reply: "根据文档，您可以在设置页重置密码。".to_string(),
            confidence: 0.85,
        };
        let chain = pipeline(
            None,
            agent,
            Arc::new(ScriptedLlm { reply: Some(llm_reply), log: log.clone() }),
        );

        let suggestion = chain.generate(&context("忘记密码了")).await;
        assert_eq!(suggestion.suggested_reply, "根据文档，您可以在设置页重置密码。");
        assert!((suggestion.confidence - 0.85).abs() < 1e-9);
        assert_eq!(*log.lock().unwrap(), vec!["agent", "llm"]);
    }

    #[tokio::test]
    async fn llm_failure_lands_on_the_static_fallback() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let agent = Arc::new(ScriptedAgent::new(None, log.clone()));
        let chain = pipeline(None, agent, Arc::new(ScriptedLlm { reply: None, log: log.clone() }));

        let suggestion = chain.generate(&context("请问在哪里下载发票")).await;
        assert_eq!(suggestion.agent_name.as_deref(), Some(STATIC_FALLBACK_AGENT));
        assert!((suggestion.confidence - STATIC_FALLBACK_CONFIDENCE).abs() < 1e-9);
        assert!(suggestion.suggested_reply.starts_with("您好！我已收到您的消息。"));
        assert_eq!(*log.lock().unwrap(), vec!["agent", "llm"]);
    }

    #[tokio::test]
    async fn agent_request_carries_channel_mode_and_review_flag() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let agent = Arc::new(ScriptedAgent::new(Some(agent_answer("好的")), log));
        let stage = AgentStage::new(agent.clone());

        let mut ctx = context("帮我转人工");
        ctx.channel = Channel::Feishu;
        ctx.mode = AgentMode::HumanFirst;
        stage.generate(&ctx).await.unwrap();

        let seen = agent.seen.lock().unwrap();
        let request = seen.first().expect("one agent call");
        assert_eq!(request.conversation_id, "conv-1");
        assert_eq!(request.customer_id, "cust-1");
        assert_eq!(request.metadata["channel"], Value::from("feishu"));
        assert_eq!(request.metadata["mode"], Value::from("human_first"));
        assert_eq!(request.metadata["async_review"], Value::Bool(true));
    }

    #[tokio::test]
    async fn fallback_reply_lists_requirements_and_linked_docs() {
        let knowledge = CannedKnowledge(vec![
            KnowledgeItem {
                title: "导出指南".to_string(),
                content: None,
                url: "https://docs.example.com/export".to_string(),
            },
            KnowledgeItem {
                title: "常见错误码".to_string(),
                content: None,
                url: "https://docs.example.com/errors".to_string(),
            },
            KnowledgeItem {
                title: "多余的第三篇".to_string(),
                content: None,
                url: "https://docs.example.com/extra".to_string(),
            },
        ]);
        let stage =
            StaticFallbackStage::new(Arc::new(KeywordInsight::new()), Arc::new(knowledge));

        let mut ctx = context("导出一直失败，报错码 500");
        ctx.detected_requirements =
            vec![candidate("修复导出失败"), candidate("补发历史报表")];
        let suggestion = stage.generate(&ctx).await.unwrap().expect("fallback always answers");

        let reply = &suggestion.suggested_reply;
        assert!(reply.starts_with("非常抱歉给您带来不便！"));
        assert!(reply.contains("我理解您的需求：\n1. 修复导出失败\n2. 补发历史报表\n"));
        assert!(reply.contains("我已为您记录相关信息，工程师会尽快处理。"));
        assert!(reply.contains("您也可以参考以下文档：\n1. [导出指南](https://docs.example.com/export)\n"));
        assert!(reply.contains("2. [常见错误码](https://docs.example.com/errors)"));
        assert!(!reply.contains("多余的第三篇"));
    }

    #[tokio::test]
    async fn empty_chain_still_answers_with_the_canned_reply() {
        let chain = ReplyPipeline::new(Vec::new());
        let suggestion = chain.generate(&context("在吗")).await;
        assert_eq!(suggestion.agent_name.as_deref(), Some(STATIC_FALLBACK_AGENT));
        assert_eq!(
            suggestion.suggested_reply,
            "您好！我已收到您的消息。\n\n正在为您查询相关信息，请稍候。"
        );
    }
}
