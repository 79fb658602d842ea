use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::{Channel, ConversationId};
use crate::domain::problem::{ProblemId, ProblemStatus};
use crate::domain::requirement::{Priority, RequirementCategory, RequirementId, RequirementSource};
use crate::domain::review::ReviewRequestId;
use crate::domain::task::TaskId;
use crate::lifecycle::LifecycleEvent;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    RequirementCreated {
        requirement_id: RequirementId,
        customer_id: String,
        conversation_id: Option<ConversationId>,
        title: String,
        category: RequirementCategory,
        priority: Priority,
        source: RequirementSource,
    },
    TaskCreated {
        task_id: TaskId,
        conversation_id: ConversationId,
        requirement_id: Option<RequirementId>,
        priority: Priority,
    },
    ConversationClosed {
        conversation_id: ConversationId,
        customer_id: String,
        channel: Channel,
        reason: String,
    },
    ProblemTransitioned {
        problem_id: ProblemId,
        conversation_id: ConversationId,
        from: ProblemStatus,
        to: ProblemStatus,
        event: LifecycleEvent,
    },
    ProblemTransitionRejected {
        problem_id: ProblemId,
        conversation_id: ConversationId,
        reason: String,
    },
    ReviewRequested {
        review_request_id: ReviewRequestId,
        conversation_id: ConversationId,
        confidence: f64,
    },
    QualityInspected {
        conversation_id: ConversationId,
        quality_score: i64,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RequirementCreated { .. } => "requirement.created",
            DomainEvent::TaskCreated { .. } => "task.created",
            DomainEvent::ConversationClosed { .. } => "conversation.closed",
            DomainEvent::ProblemTransitioned { .. } => "problem.transitioned",
            DomainEvent::ProblemTransitionRejected { .. } => "problem.transition_rejected",
            DomainEvent::ReviewRequested { .. } => "review.requested",
            DomainEvent::QualityInspected { .. } => "quality.inspected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(correlation_id: impl Into<String>, event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            occurred_at: Utc::now(),
            event,
        }
    }
}

/// Publish must never block the saga; implementations record or log and
/// return immediately.
pub trait EventBus: Send + Sync {
    fn publish(&self, envelope: EventEnvelope);
}

#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    published: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl InMemoryEventBus {
    pub fn published(&self) -> Vec<EventEnvelope> {
        match self.published.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.published().iter().map(|envelope| envelope.event.name()).collect()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, envelope: EventEnvelope) {
        match self.published.lock() {
            Ok(mut events) => events.push(envelope),
            Err(poisoned) => poisoned.into_inner().push(envelope),
        }
    }
}

/// Production bus: every event lands in the structured log stream.
#[derive(Clone, Default)]
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn publish(&self, envelope: EventEnvelope) {
        tracing::info!(
            event_name = envelope.event.name(),
            event_id = %envelope.event_id,
            correlation_id = %envelope.correlation_id,
            payload = %serde_json::to_string(&envelope.event).unwrap_or_default(),
            "domain event published"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;
    use crate::domain::requirement::{Priority, RequirementCategory, RequirementId, RequirementSource};

    use super::{DomainEvent, EventBus, EventEnvelope, InMemoryEventBus};

    #[test]
    fn in_memory_bus_records_envelopes_with_correlation_fields() {
        let bus = InMemoryEventBus::default();
        bus.publish(EventEnvelope::new(
            "req-123",
            DomainEvent::RequirementCreated {
                requirement_id: RequirementId("r-1".to_owned()),
                customer_id: "cust-1".to_owned(),
                conversation_id: Some(ConversationId("conv-1".to_owned())),
                title: "支持批量导出".to_owned(),
                category: RequirementCategory::Product,
                priority: Priority::Medium,
                source: RequirementSource::Conversation,
            },
        ));

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].correlation_id, "req-123");
        assert_eq!(published[0].event.name(), "requirement.created");
        assert!(!published[0].event_id.is_empty());
    }

    #[test]
    fn event_names_follow_the_dotted_convention() {
        let event = DomainEvent::QualityInspected {
            conversation_id: ConversationId("conv-1".to_owned()),
            quality_score: 88,
        };
        assert_eq!(event.name(), "quality.inspected");
    }
}
