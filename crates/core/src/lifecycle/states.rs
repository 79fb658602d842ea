use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationId;
use crate::domain::problem::{ProblemId, ProblemStatus};

/// Observations that can move a problem through its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A work task was created for the problem this turn.
    TaskCreated,
    /// The customer's message reads as "the problem is fixed".
    ResolutionDetected,
    /// The customer's message reads as "the problem is back".
    ReopeningDetected,
    /// An operator paused the problem pending customer input.
    CustomerInputAwaited,
    /// The customer answered while the problem was waiting on them.
    CustomerReplied,
}

/// Guard data carried alongside an event. Detection-driven events must clear
/// the signal floor before they are applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleContext {
    pub signal_confidence: f64,
}

impl Default for LifecycleContext {
    fn default() -> Self {
        Self { signal_confidence: 1.0 }
    }
}

impl LifecycleContext {
    pub fn with_signal(confidence: f64) -> Self {
        Self { signal_confidence: confidence }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleOutcome {
    pub from: ProblemStatus,
    pub to: ProblemStatus,
    pub event: LifecycleEvent,
}

/// Identity attached to a transition when it is recorded on the event bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionScope {
    pub problem_id: ProblemId,
    pub conversation_id: ConversationId,
    pub correlation_id: String,
}

impl TransitionScope {
    pub fn new(
        problem_id: ProblemId,
        conversation_id: ConversationId,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self { problem_id, conversation_id, correlation_id: correlation_id.into() }
    }
}
