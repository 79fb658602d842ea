//! The message intake saga.
//!
//! One customer message runs a fixed sequence: resolve the conversation,
//! detect and persist requirements, auto-create tasks for high-priority
//! ones, generate a reply through the strategy chain, decide on human
//! review, and fold the message into problem tracking. Every step commits
//! on its own. A failure stops the sequence where it happened and reports
//! the error, but entities persisted by earlier steps stay persisted;
//! there is no compensation pass.

use std::sync::Arc;

use convoy_agent::pipeline::{ReplyContext, ReplyPipeline};
use convoy_core::{
    AgentSuggestion, ApplicationError, Channel, Conversation, DomainError, DomainEvent,
    EscalationInput, EventBus, EventEnvelope, IncomingMessage, Message, NewRequirement,
    ProcessingResult, ProcessingStatus, RecommendedTask, Requirement, RequirementCandidate,
    RequirementCategory, RequirementConversationOutcome, RequirementDetector, RequirementId,
    RequirementSource, ReviewPolicy, ReviewRequest, Task, TaskId,
};
use convoy_db::repositories::{
    ConversationRepository, RequirementRepository, ReviewRequestRepository, TaskRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::lifecycle::ProblemLifecycleService;
use crate::persistence_error;

/// Reviewer-facing reason attached to every escalated suggestion.
const REVIEW_REASON: &str = "检测到复杂需求，建议人工审核";

/// Floor folded into the review gate when neither detection nor the reply
/// carries a stronger signal.
const GATE_CONFIDENCE_FLOOR: f64 = 0.5;

/// Floor for the confidence reported on the outgoing suggestion payload.
const SUGGESTION_CONFIDENCE_FLOOR: f64 = 0.8;

pub struct CoordinatorDeps {
    pub conversations: Arc<dyn ConversationRepository>,
    pub requirements: Arc<dyn RequirementRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub reviews: Arc<dyn ReviewRequestRepository>,
    pub detector: RequirementDetector,
    pub pipeline: ReplyPipeline,
    pub policy: ReviewPolicy,
    pub lifecycle: Arc<ProblemLifecycleService>,
    pub events: Arc<dyn EventBus>,
    /// Candidates at or below this confidence are surfaced in the suggestion
    /// but not persisted as requirements.
    pub requirement_threshold: f64,
}

pub struct ConversationTaskCoordinator {
    conversations: Arc<dyn ConversationRepository>,
    requirements: Arc<dyn RequirementRepository>,
    tasks: Arc<dyn TaskRepository>,
    reviews: Arc<dyn ReviewRequestRepository>,
    detector: RequirementDetector,
    pipeline: ReplyPipeline,
    policy: ReviewPolicy,
    lifecycle: Arc<ProblemLifecycleService>,
    events: Arc<dyn EventBus>,
    requirement_threshold: f64,
}

impl ConversationTaskCoordinator {
    pub fn new(deps: CoordinatorDeps) -> Self {
        Self {
            conversations: deps.conversations,
            requirements: deps.requirements,
            tasks: deps.tasks,
            reviews: deps.reviews,
            detector: deps.detector,
            pipeline: deps.pipeline,
            policy: deps.policy,
            lifecycle: deps.lifecycle,
            events: deps.events,
            requirement_threshold: deps.requirement_threshold,
        }
    }

    pub async fn process_customer_message(
        &self,
        incoming: IncomingMessage,
    ) -> Result<ProcessingResult, ApplicationError> {
        validate_incoming(&incoming)?;

        let correlation_id = Uuid::new_v4().to_string();
        let conversation = self.resolve_conversation(&incoming).await?;
        info!(
            event_name = "message_processing_started",
            correlation_id = %correlation_id,
            conversation_id = %conversation.id.0,
            customer_id = %incoming.customer_id,
            channel = conversation.channel.as_str(),
        );

        let candidates = self.detector.detect(&incoming.content);

        let mut requirements_created: Vec<RequirementId> = Vec::new();
        let mut tasks_created: Vec<TaskId> = Vec::new();
        let mut recommended_tasks: Vec<RecommendedTask> = Vec::new();

        for candidate in &candidates {
            if candidate.confidence <= self.requirement_threshold {
                continue;
            }

            let requirement = Requirement::create(NewRequirement {
                customer_id: incoming.customer_id.clone(),
                conversation_id: Some(conversation.id.clone()),
                title: candidate.title.clone(),
                description: candidate.description.clone(),
                category: candidate.category,
                priority: candidate.priority,
                source: candidate.source,
                created_by: "system".to_string(),
            });
            self.requirements.save(requirement.clone()).await.map_err(persistence_error)?;
            self.events.publish(EventEnvelope::new(
                correlation_id.clone(),
                DomainEvent::RequirementCreated {
                    requirement_id: requirement.id.clone(),
                    customer_id: requirement.customer_id.clone(),
                    conversation_id: requirement.conversation_id.clone(),
                    title: requirement.title.clone(),
                    category: requirement.category,
                    priority: requirement.priority,
                    source: requirement.source,
                },
            ));
            requirements_created.push(requirement.id.clone());

            let task_title = format!("处理需求: {}", requirement.title);
            if candidate.priority.requires_immediate_task() {
                let task = Task::for_requirement(
                    task_title,
                    conversation.id.clone(),
                    requirement.id.clone(),
                    candidate.priority,
                );
                self.tasks.save(task.clone()).await.map_err(persistence_error)?;
                self.events.publish(EventEnvelope::new(
                    correlation_id.clone(),
                    DomainEvent::TaskCreated {
                        task_id: task.id.clone(),
                        conversation_id: conversation.id.clone(),
                        requirement_id: task.requirement_id.clone(),
                        priority: task.priority,
                    },
                ));
                tasks_created.push(task.id);
            } else {
                recommended_tasks.push(RecommendedTask {
                    title: task_title,
                    priority: candidate.priority,
                    requirement_id: Some(requirement.id.clone()),
                });
            }
        }

        let ctx = ReplyContext {
            conversation_id: conversation.id.clone(),
            customer_id: incoming.customer_id.clone(),
            channel: conversation.channel,
            mode: conversation.mode,
            message: incoming.content.clone(),
            history: conversation.history(),
            detected_requirements: candidates.clone(),
        };
        let reply = self.pipeline.generate(&ctx).await;

        let gate_confidence =
            confidence_over(&candidates, reply.confidence, GATE_CONFIDENCE_FLOOR);
        let decision = self.policy.evaluate(&EscalationInput {
            confidence: gate_confidence,
            has_requirements: !candidates.is_empty(),
            tasks_created: tasks_created.len() as u32,
            pipeline_flag: reply.needs_human_review,
        });

        let mut suggestion = AgentSuggestion {
            conversation_id: conversation.id.clone(),
            suggested_reply: reply.suggested_reply,
            confidence: confidence_over(&candidates, reply.confidence, SUGGESTION_CONFIDENCE_FLOOR),
            detected_requirements: candidates,
            recommended_tasks,
            needs_human_review: decision.escalate,
            reason: None,
            review_request_id: None,
        };

        if decision.escalate {
            suggestion.reason = Some(REVIEW_REASON.to_string());
            let request = ReviewRequest::open(suggestion.clone());
            self.reviews.save(request.clone()).await.map_err(persistence_error)?;
            self.events.publish(EventEnvelope::new(
                correlation_id.clone(),
                DomainEvent::ReviewRequested {
                    review_request_id: request.id.clone(),
                    conversation_id: conversation.id.clone(),
                    confidence: suggestion.confidence,
                },
            ));
            suggestion.review_request_id = Some(request.id);
            info!(
                event_name = "review_requested",
                correlation_id = %correlation_id,
                conversation_id = %conversation.id.0,
                reason = %decision.reason,
            );
        }

        self.lifecycle
            .observe_message(
                &conversation,
                &incoming.content,
                &ctx.history,
                tasks_created.len() as u32,
                &correlation_id,
            )
            .await;

        let status = if decision.escalate {
            ProcessingStatus::NeedsReview
        } else {
            ProcessingStatus::AutoHandled
        };
        info!(
            event_name = "message_processed",
            correlation_id = %correlation_id,
            conversation_id = %conversation.id.0,
            requirements_created = requirements_created.len(),
            tasks_created = tasks_created.len(),
            status = ?status,
        );

        Ok(ProcessingResult {
            conversation_id: conversation.id.clone(),
            requirements_created,
            tasks_created,
            agent_suggestion: suggestion,
            status,
        })
    }

    /// Continues the customer's latest open thread when there is one,
    /// otherwise opens a fresh conversation seeded with this message.
    async fn resolve_conversation(
        &self,
        incoming: &IncomingMessage,
    ) -> Result<Conversation, ApplicationError> {
        let existing = self
            .conversations
            .find_open_by_customer(&incoming.customer_id)
            .await
            .map_err(persistence_error)?;

        let mut conversation = match existing {
            Some(mut conversation) => {
                conversation.append_message(Message::customer(
                    incoming.sender_id.clone(),
                    incoming.content.clone(),
                ));
                conversation
            }
            None => {
                let mut opened = Conversation::open(
                    incoming.customer_id.clone(),
                    incoming.channel,
                    Message::customer(incoming.sender_id.clone(), incoming.content.clone()),
                );
                opened.metadata.extend(incoming.metadata.clone());
                opened
            }
        };
        if let Some(mode) = incoming.mode {
            conversation.set_mode(mode);
        }

        self.conversations.save(conversation.clone()).await.map_err(persistence_error)?;
        Ok(conversation)
    }

    /// Opens an internal conversation for a requirement that was filed
    /// outside any dialogue, when its priority or category calls for
    /// customer contact.
    pub async fn create_conversation_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<RequirementConversationOutcome, ApplicationError> {
        let mut requirement = self
            .requirements
            .find_by_id(requirement_id)
            .await
            .map_err(persistence_error)?
            .ok_or_else(|| ApplicationError::not_found("requirement", requirement_id.0.as_str()))?;

        if requirement.source == RequirementSource::Conversation {
            return Ok(RequirementConversationOutcome {
                conversation_id: requirement.conversation_id,
                needs_customer_communication: false,
                reason: "需求来自对话，已有沟通渠道".to_string(),
            });
        }

        let reason = if requirement.priority.requires_immediate_task() {
            "高优先级需求，需要与客户确认细节"
        } else if requirement.category == RequirementCategory::Technical {
            "技术类需求，可能需要客户配合测试"
        } else {
            return Ok(RequirementConversationOutcome {
                conversation_id: None,
                needs_customer_communication: false,
                reason: "内部需求，暂无需客户沟通".to_string(),
            });
        };

        let conversation = Conversation::open(
            requirement.customer_id.clone(),
            Channel::Internal,
            Message::system(format!("关于您的需求：{}", requirement.title)),
        );
        self.conversations.save(conversation.clone()).await.map_err(persistence_error)?;

        requirement.attach_conversation(conversation.id.clone());
        self.requirements.save(requirement).await.map_err(persistence_error)?;

        info!(
            event_name = "requirement_conversation_opened",
            requirement_id = %requirement_id.0,
            conversation_id = %conversation.id.0,
        );

        Ok(RequirementConversationOutcome {
            conversation_id: Some(conversation.id),
            needs_customer_communication: true,
            reason: reason.to_string(),
        })
    }
}

fn validate_incoming(incoming: &IncomingMessage) -> Result<(), ApplicationError> {
    if incoming.customer_id.trim().is_empty() {
        return Err(DomainError::Validation("customer_id is required".to_string()).into());
    }
    if incoming.content.trim().is_empty() {
        return Err(DomainError::Validation("content is required".to_string()).into());
    }
    Ok(())
}

/// Strongest signal wins: the maximum over all candidate confidences and
/// the reply confidence, never below `floor`.
fn confidence_over(candidates: &[RequirementCandidate], reply_confidence: f64, floor: f64) -> f64 {
    candidates
        .iter()
        .map(|candidate| candidate.confidence)
        .chain(std::iter::once(reply_confidence))
        .fold(floor, f64::max)
}
