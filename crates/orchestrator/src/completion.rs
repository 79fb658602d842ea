//! Task-gated conversation completion.
//!
//! A conversation completes only once every linked task is settled. The
//! close itself is channel-aware: web and internal threads are closed and
//! announced, IM threads stay open because the platforms never let us close
//! them. Quality inspection runs after the close on a detached task so a
//! slow webhook cannot hold the caller.

use std::sync::Arc;

use convoy_agent::llm::LlmClient;
use convoy_agent::quality::QualityInspector;
use convoy_core::{
    ApplicationError, CompletionOutcome, Conversation, ConversationId, DomainEvent, EventBus,
    EventEnvelope, QualityReport, TaskId,
};
use convoy_db::repositories::{ConversationRepository, QualityReportRepository, TaskRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::persistence_error;

pub struct ConversationCompletionWorkflow {
    conversations: Arc<dyn ConversationRepository>,
    tasks: Arc<dyn TaskRepository>,
    quality_reports: Arc<dyn QualityReportRepository>,
    llm: Arc<dyn LlmClient>,
    quality: Arc<dyn QualityInspector>,
    events: Arc<dyn EventBus>,
    low_score_threshold: i64,
}

impl ConversationCompletionWorkflow {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        tasks: Arc<dyn TaskRepository>,
        quality_reports: Arc<dyn QualityReportRepository>,
        llm: Arc<dyn LlmClient>,
        quality: Arc<dyn QualityInspector>,
        events: Arc<dyn EventBus>,
        low_score_threshold: i64,
    ) -> Self {
        Self { conversations, tasks, quality_reports, llm, quality, events, low_score_threshold }
    }

    pub async fn complete_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<CompletionOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();

        let mut conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await
            .map_err(persistence_error)?
            .ok_or_else(|| ApplicationError::not_found("conversation", conversation_id.0.as_str()))?;

        let tasks =
            self.tasks.list_by_conversation(conversation_id).await.map_err(persistence_error)?;
        let incomplete: Vec<TaskId> = tasks
            .iter()
            .filter(|task| !task.status.is_settled())
            .map(|task| task.id.clone())
            .collect();
        if !incomplete.is_empty() {
            info!(
                event_name = "completion_blocked",
                conversation_id = %conversation_id.0,
                open_tasks = incomplete.len(),
            );
            return Ok(CompletionOutcome {
                success: false,
                summary: String::new(),
                incomplete_tasks: incomplete,
            });
        }

        let summary = self.summarize(&conversation).await;

        if conversation.channel.is_im() {
            info!(
                event_name = "im_conversation_left_open",
                conversation_id = %conversation_id.0,
                channel = conversation.channel.as_str(),
            );
            return Ok(CompletionOutcome { success: true, summary, incomplete_tasks: Vec::new() });
        }

        conversation.close()?;
        self.conversations.save(conversation.clone()).await.map_err(persistence_error)?;
        self.events.publish(EventEnvelope::new(
            correlation_id.clone(),
            DomainEvent::ConversationClosed {
                conversation_id: conversation.id.clone(),
                customer_id: conversation.customer_id.clone(),
                channel: conversation.channel,
                reason: summary.clone(),
            },
        ));
        info!(
            event_name = "conversation_closed",
            conversation_id = %conversation_id.0,
            correlation_id = %correlation_id,
        );

        self.spawn_quality_inspection(conversation.id, correlation_id);

        Ok(CompletionOutcome { success: true, summary, incomplete_tasks: Vec::new() })
    }

    async fn summarize(&self, conversation: &Conversation) -> String {
        if self.llm.is_enabled() {
            match self.llm.summarize(&conversation.id, &conversation.history()).await {
                Ok(summary) if !summary.trim().is_empty() => return summary,
                Ok(_) => {}
                Err(error) => {
                    warn!(
                        event_name = "summary_generation_failed",
                        conversation_id = %conversation.id.0,
                        customer_id = %conversation.customer_id,
                        reason = %error,
                    );
                }
            }
        }
        format!("会话 {} 的所有关联任务已完成。问题已得到解决。", conversation.id.0)
    }

    /// Inspection happens off the request path. Every failure mode is logged
    /// and dropped; a report is stored and announced only on success.
    fn spawn_quality_inspection(&self, conversation_id: ConversationId, correlation_id: String) {
        if !self.quality.is_enabled() {
            return;
        }

        let inspector = self.quality.clone();
        let reports = self.quality_reports.clone();
        let events = self.events.clone();
        let threshold = self.low_score_threshold;
        tokio::spawn(async move {
            let verdict = match inspector.inspect(&conversation_id).await {
                Ok(verdict) => verdict,
                Err(error) => {
                    warn!(
                        event_name = "quality_inspection_failed",
                        conversation_id = %conversation_id.0,
                        reason = %error,
                    );
                    return;
                }
            };
            if !verdict.success {
                warn!(
                    event_name = "quality_inspection_rejected",
                    conversation_id = %conversation_id.0,
                );
                return;
            }

            let report =
                QualityReport::record(conversation_id.clone(), verdict.quality_score, verdict.report);
            if report.is_below(threshold) {
                warn!(
                    event_name = "quality_low_score",
                    conversation_id = %conversation_id.0,
                    quality_score = report.quality_score,
                );
            }
            if let Err(error) = reports.save(report).await {
                warn!(
                    event_name = "quality_report_save_failed",
                    conversation_id = %conversation_id.0,
                    reason = %error,
                );
                return;
            }
            events.publish(EventEnvelope::new(
                correlation_id,
                DomainEvent::QualityInspected {
                    conversation_id,
                    quality_score: verdict.quality_score,
                },
            ));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use convoy_agent::insight::Sentiment;
    use convoy_agent::knowledge::KnowledgeItem;
    use convoy_agent::llm::{DisabledLlm, LlmReply};
    use convoy_agent::quality::QualityVerdict;
    use convoy_core::{
        Channel, ConversationStatus, HistoryTurn, InMemoryEventBus, Message, Priority,
        RequirementId, Task, TaskStatus,
    };
    use convoy_db::repositories::{
        ConversationRepository, InMemoryConversationRepository, InMemoryQualityReportRepository,
        InMemoryTaskRepository, QualityReportRepository, TaskRepository,
    };

    use super::*;

    struct CannedInspector(QualityVerdict);

    #[async_trait]
    impl QualityInspector for CannedInspector {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn inspect(&self, _conversation_id: &ConversationId) -> Result<QualityVerdict> {
            Ok(self.0.clone())
        }
    }

    struct OfflineInspector;

    #[async_trait]
    impl QualityInspector for OfflineInspector {
        fn is_enabled(&self) -> bool {
            false
        }

        async fn inspect(&self, _conversation_id: &ConversationId) -> Result<QualityVerdict> {
            anyhow::bail!("inspection is disabled")
        }
    }

    struct CannedLlm(String);

    #[async_trait]
    impl LlmClient for CannedLlm {
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
            anyhow::bail!("not used here")
        }

        async fn summarize(
            &self,
            _conversation_id: &ConversationId,
            _history: &[HistoryTurn],
        ) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Harness {
        workflow: ConversationCompletionWorkflow,
        conversations: Arc<InMemoryConversationRepository>,
        tasks: Arc<InMemoryTaskRepository>,
        quality_reports: Arc<InMemoryQualityReportRepository>,
        events: InMemoryEventBus,
    }

    fn harness_with(llm: Arc<dyn LlmClient>, quality: Arc<dyn QualityInspector>) -> Harness {
        let conversations = Arc::new(InMemoryConversationRepository::default());
        let tasks = Arc::new(InMemoryTaskRepository::default());
        let quality_reports = Arc::new(InMemoryQualityReportRepository::default());
        let events = InMemoryEventBus::default();
        let workflow = ConversationCompletionWorkflow::new(
            conversations.clone(),
            tasks.clone(),
            quality_reports.clone(),
            llm,
            quality,
            Arc::new(events.clone()),
            70,
        );
        Harness { workflow, conversations, tasks, quality_reports, events }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(DisabledLlm::new()), Arc::new(OfflineInspector))
    }

    async fn seed_conversation(harness: &Harness, channel: Channel) -> ConversationId {
        let conversation =
            Conversation::open("cust-1", channel, Message::customer("cust-1", "导出报表失败"));
        let id = conversation.id.clone();
        harness.conversations.save(conversation).await.expect("seed conversation");
        id
    }

    async fn seed_task(harness: &Harness, conversation_id: &ConversationId, status: TaskStatus) -> Task {
        let mut task = Task::for_requirement(
            "处理需求: 修复报表导出",
            conversation_id.clone(),
            RequirementId("req-1".to_string()),
            Priority::High,
        );
        task.set_status(status);
        harness.tasks.save(task.clone()).await.expect("seed task");
        task
    }

    #[tokio::test]
    async fn open_tasks_block_completion() {
        let harness = harness();
        let id = seed_conversation(&harness, Channel::Web).await;
        seed_task(&harness, &id, TaskStatus::Completed).await;
        let pending = seed_task(&harness, &id, TaskStatus::Pending).await;

        let outcome = harness.workflow.complete_conversation(&id).await.expect("workflow");

        assert!(!outcome.success);
        assert_eq!(outcome.summary, "");
        assert_eq!(outcome.incomplete_tasks, vec![pending.id]);
        let stored = harness.conversations.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, ConversationStatus::Open);
        assert!(harness.events.published().is_empty());
    }

    #[tokio::test]
    async fn settled_tasks_let_web_conversations_close() {
        let harness = harness();
        let id = seed_conversation(&harness, Channel::Web).await;
        seed_task(&harness, &id, TaskStatus::Completed).await;
        seed_task(&harness, &id, TaskStatus::Cancelled).await;

        let outcome = harness.workflow.complete_conversation(&id).await.expect("workflow");

        assert!(outcome.success);
        assert_eq!(outcome.summary, format!("会话 {} 的所有关联任务已完成。问题已得到解决。", id.0));
        assert!(outcome.incomplete_tasks.is_empty());
        let stored = harness.conversations.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, ConversationStatus::Closed);
        assert_eq!(harness.events.names(), vec!["conversation.closed"]);
    }

    #[tokio::test]
    async fn im_threads_stay_open_after_completion() {
        let harness = harness();
        let id = seed_conversation(&harness, Channel::Feishu).await;

        let outcome = harness.workflow.complete_conversation(&id).await.expect("workflow");

        assert!(outcome.success);
        assert!(!outcome.summary.is_empty());
        let stored = harness.conversations.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, ConversationStatus::Open);
        assert!(
            !harness.events.names().contains(&"conversation.closed"),
            "IM completion must not announce a close"
        );
    }

    #[tokio::test]
    async fn missing_conversations_are_not_found() {
        let harness = harness();

        let error = harness
            .workflow
            .complete_conversation(&ConversationId("conv-missing".to_string()))
            .await
            .expect_err("unknown conversation");

        assert!(matches!(error, ApplicationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn llm_summary_wins_over_the_canned_text() {
        let harness = harness_with(
            Arc::new(CannedLlm("客户的报表导出问题已处理完毕。".to_string())),
            Arc::new(OfflineInspector),
        );
        let id = seed_conversation(&harness, Channel::Web).await;

        let outcome = harness.workflow.complete_conversation(&id).await.expect("workflow");

        assert_eq!(outcome.summary, "客户的报表导出问题已处理完毕。");
    }

    #[tokio::test]
    async fn quality_reports_are_stored_after_the_close() {
        let verdict = QualityVerdict {
            success: true,
            quality_score: 55,
            report: serde_json::json!({"issues": ["回复超时"]}),
        };
        let harness =
            harness_with(Arc::new(DisabledLlm::new()), Arc::new(CannedInspector(verdict)));
        let id = seed_conversation(&harness, Channel::Web).await;

        let outcome = harness.workflow.complete_conversation(&id).await.expect("workflow");
        assert!(outcome.success);

        // The report lands from a detached task; the event is its last step.
        let mut inspected = false;
        for _ in 0..100 {
            tokio::task::yield_now().await;
            if harness.events.names().contains(&"quality.inspected") {
                inspected = true;
                break;
            }
        }
        assert!(inspected, "inspection should finish once the close returns");

        let reports = harness.quality_reports.find_by_conversation(&id).await.expect("find");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].quality_score, 55);
    }
}
