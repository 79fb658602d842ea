use thiserror::Error;

use crate::domain::problem::ProblemStatus;
use crate::events::{DomainEvent, EventBus, EventEnvelope};
use crate::lifecycle::states::{LifecycleContext, LifecycleEvent, LifecycleOutcome, TransitionScope};

/// Transition table for one lifecycle shape. Kept behind a trait so tests and
/// future flows can substitute their own tables.
pub trait LifecycleDefinition {
    fn initial_state(&self) -> ProblemStatus;
    fn transition(
        &self,
        current: &ProblemStatus,
        event: &LifecycleEvent,
        context: &LifecycleContext,
    ) -> Result<LifecycleOutcome, LifecycleTransitionError>;
}

/// The support-problem lifecycle: created `new`, driven forward by task
/// activity and by resolution/reopening signals from the customer's own
/// words. `reopened` behaves as `in_progress` for everything downstream.
#[derive(Clone, Debug, Default)]
pub struct ProblemFlow;

/// Detection-driven events below this signal confidence are rejected rather
/// than applied.
const SIGNAL_FLOOR: f64 = 0.5;

impl LifecycleDefinition for ProblemFlow {
    fn initial_state(&self) -> ProblemStatus {
        ProblemStatus::New
    }

    fn transition(
        &self,
        current: &ProblemStatus,
        event: &LifecycleEvent,
        context: &LifecycleContext,
    ) -> Result<LifecycleOutcome, LifecycleTransitionError> {
        transition_problem(current, event, context)
    }
}

pub struct LifecycleEngine<D> {
    definition: D,
}

impl<D> LifecycleEngine<D>
where
    D: LifecycleDefinition,
{
    pub fn new(definition: D) -> Self {
        Self { definition }
    }

    pub fn initial_state(&self) -> ProblemStatus {
        self.definition.initial_state()
    }

    pub fn apply(
        &self,
        current: &ProblemStatus,
        event: &LifecycleEvent,
        context: &LifecycleContext,
    ) -> Result<LifecycleOutcome, LifecycleTransitionError> {
        self.definition.transition(current, event, context)
    }

    /// Applies an event and mirrors the result onto the event bus, carrying
    /// the problem/conversation identity for downstream consumers.
    pub fn apply_recorded(
        &self,
        current: &ProblemStatus,
        event: &LifecycleEvent,
        context: &LifecycleContext,
        bus: &dyn EventBus,
        scope: &TransitionScope,
    ) -> Result<LifecycleOutcome, LifecycleTransitionError> {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => bus.publish(EventEnvelope::new(
                scope.correlation_id.clone(),
                DomainEvent::ProblemTransitioned {
                    problem_id: scope.problem_id.clone(),
                    conversation_id: scope.conversation_id.clone(),
                    from: outcome.from,
                    to: outcome.to,
                    event: outcome.event.clone(),
                },
            )),
            Err(error) => bus.publish(EventEnvelope::new(
                scope.correlation_id.clone(),
                DomainEvent::ProblemTransitionRejected {
                    problem_id: scope.problem_id.clone(),
                    conversation_id: scope.conversation_id.clone(),
                    reason: error.to_string(),
                },
            )),
        }
        result
    }
}

impl Default for LifecycleEngine<ProblemFlow> {
    fn default() -> Self {
        Self::new(ProblemFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleTransitionError {
    #[error("signal too weak to apply {event:?} in {state:?} ({confidence_pct}%)")]
    WeakSignal { state: ProblemStatus, event: LifecycleEvent, confidence_pct: u8 },
    #[error("invalid problem transition from {state:?} on {event:?}")]
    InvalidTransition { state: ProblemStatus, event: LifecycleEvent },
}

fn transition_problem(
    current: &ProblemStatus,
    event: &LifecycleEvent,
    context: &LifecycleContext,
) -> Result<LifecycleOutcome, LifecycleTransitionError> {
    use LifecycleEvent::{
        CustomerInputAwaited, CustomerReplied, ReopeningDetected, ResolutionDetected, TaskCreated,
    };
    use ProblemStatus::{InProgress, New, Reopened, Resolved, WaitingCustomer};

    let detection_driven = matches!(event, ResolutionDetected | ReopeningDetected);
    if detection_driven && context.signal_confidence < SIGNAL_FLOOR {
        return Err(LifecycleTransitionError::WeakSignal {
            state: *current,
            event: event.clone(),
            confidence_pct: (context.signal_confidence.clamp(0.0, 1.0) * 100.0) as u8,
        });
    }

    let to = match (current, event) {
        (New, TaskCreated) | (Reopened, TaskCreated) | (WaitingCustomer, TaskCreated) => InProgress,
        (InProgress, TaskCreated) => InProgress,
        (New, ResolutionDetected)
        | (InProgress, ResolutionDetected)
        | (WaitingCustomer, ResolutionDetected)
        | (Reopened, ResolutionDetected) => Resolved,
        (Resolved, ReopeningDetected) => Reopened,
        (InProgress, CustomerInputAwaited) | (Reopened, CustomerInputAwaited) => WaitingCustomer,
        (WaitingCustomer, CustomerReplied) => InProgress,
        _ => {
            return Err(LifecycleTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(LifecycleOutcome { from: *current, to, event: event.clone() })
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;
    use crate::domain::problem::{ProblemId, ProblemStatus};
    use crate::events::InMemoryEventBus;
    use crate::lifecycle::engine::{LifecycleEngine, LifecycleTransitionError, ProblemFlow};
    use crate::lifecycle::states::{LifecycleContext, LifecycleEvent, TransitionScope};

    #[test]
    fn task_activity_moves_new_problems_into_progress() {
        let engine = LifecycleEngine::default();
        let outcome = engine
            .apply(&ProblemStatus::New, &LifecycleEvent::TaskCreated, &LifecycleContext::default())
            .expect("new -> in_progress");

        assert_eq!(outcome.to, ProblemStatus::InProgress);
    }

    #[test]
    fn resolution_closes_any_active_state() {
        let engine = LifecycleEngine::default();
        let context = LifecycleContext::with_signal(0.7);

        for state in [
            ProblemStatus::New,
            ProblemStatus::InProgress,
            ProblemStatus::WaitingCustomer,
            ProblemStatus::Reopened,
        ] {
            let outcome = engine
                .apply(&state, &LifecycleEvent::ResolutionDetected, &context)
                .expect("active -> resolved");
            assert_eq!(outcome.to, ProblemStatus::Resolved);
        }
    }

    #[test]
    fn resolved_problems_can_only_reopen() {
        let engine = LifecycleEngine::default();
        let context = LifecycleContext::with_signal(0.7);

        let reopened = engine
            .apply(&ProblemStatus::Resolved, &LifecycleEvent::ReopeningDetected, &context)
            .expect("resolved -> reopened");
        assert_eq!(reopened.to, ProblemStatus::Reopened);

        let error = engine
            .apply(&ProblemStatus::Resolved, &LifecycleEvent::TaskCreated, &context)
            .expect_err("resolved problems take no task events");
        assert!(matches!(error, LifecycleTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn reopened_behaves_like_in_progress() {
        let engine = LifecycleEngine::default();
        let context = LifecycleContext::default();

        let progressed = engine
            .apply(&ProblemStatus::Reopened, &LifecycleEvent::TaskCreated, &context)
            .expect("reopened -> in_progress");
        assert_eq!(progressed.to, ProblemStatus::InProgress);

        let waiting = engine
            .apply(&ProblemStatus::Reopened, &LifecycleEvent::CustomerInputAwaited, &context)
            .expect("reopened -> waiting_customer");
        assert_eq!(waiting.to, ProblemStatus::WaitingCustomer);
    }

    #[test]
    fn waiting_customer_returns_to_progress_on_reply() {
        let engine = LifecycleEngine::default();
        let outcome = engine
            .apply(
                &ProblemStatus::WaitingCustomer,
                &LifecycleEvent::CustomerReplied,
                &LifecycleContext::default(),
            )
            .expect("waiting_customer -> in_progress");

        assert_eq!(outcome.to, ProblemStatus::InProgress);
    }

    #[test]
    fn weak_detection_signals_are_rejected() {
        let engine = LifecycleEngine::default();
        let error = engine
            .apply(
                &ProblemStatus::InProgress,
                &LifecycleEvent::ResolutionDetected,
                &LifecycleContext::with_signal(0.3),
            )
            .expect_err("0.3 confidence must not resolve a problem");

        assert!(matches!(
            error,
            LifecycleTransitionError::WeakSignal { confidence_pct: 30, .. }
        ));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = LifecycleEngine::default();
        let events = [
            (LifecycleEvent::TaskCreated, LifecycleContext::default()),
            (LifecycleEvent::CustomerInputAwaited, LifecycleContext::default()),
            (LifecycleEvent::CustomerReplied, LifecycleContext::default()),
            (LifecycleEvent::ResolutionDetected, LifecycleContext::with_signal(0.7)),
        ];

        let run = |engine: &LifecycleEngine<ProblemFlow>| {
            let mut state = engine.initial_state();
            let mut trail = Vec::new();
            for (event, context) in &events {
                let outcome = engine.apply(&state, event, context).expect("deterministic run");
                state = outcome.to;
                trail.push(outcome);
            }
            (state, trail)
        };

        assert_eq!(run(&engine), run(&engine));
    }

    #[test]
    fn recorded_transitions_land_on_the_event_bus() {
        let engine = LifecycleEngine::default();
        let bus = InMemoryEventBus::default();
        let scope = TransitionScope::new(
            ProblemId("prob-1".to_owned()),
            ConversationId("conv-1".to_owned()),
            "req-42",
        );

        engine
            .apply_recorded(
                &ProblemStatus::New,
                &LifecycleEvent::TaskCreated,
                &LifecycleContext::default(),
                &bus,
                &scope,
            )
            .expect("transition should succeed");

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].correlation_id, "req-42");
        assert_eq!(published[0].event.name(), "problem.transitioned");
    }

    #[test]
    fn rejected_transitions_are_recorded_too() {
        let engine = LifecycleEngine::default();
        let bus = InMemoryEventBus::default();
        let scope = TransitionScope::new(
            ProblemId("prob-1".to_owned()),
            ConversationId("conv-1".to_owned()),
            "req-43",
        );

        let _ = engine
            .apply_recorded(
                &ProblemStatus::Resolved,
                &LifecycleEvent::TaskCreated,
                &LifecycleContext::default(),
                &bus,
                &scope,
            )
            .expect_err("resolved takes no task events");

        assert_eq!(bus.names(), vec!["problem.transition_rejected"]);
    }
}
