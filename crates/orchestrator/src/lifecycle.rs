//! Best-effort problem tracking driven by what customers write.
//!
//! Every customer message is scanned for problem-report intent and for
//! resolution or reopening signals, and the active problem of the
//! conversation is moved through the lifecycle state machine accordingly.
//! Nothing here may fail the message path: lookup and save errors are
//! logged and swallowed, rejected transitions are recorded on the event
//! bus and otherwise ignored.

use std::sync::Arc;

use convoy_agent::insight::{InsightService, ProblemIntent};
use convoy_core::{
    Conversation, EventBus, HistoryTurn, LifecycleContext, LifecycleEngine, LifecycleEvent,
    Problem, ProblemFlow, ProblemStatus, TransitionScope,
};
use convoy_db::repositories::ProblemRepository;
use tracing::{info, warn};

pub struct ProblemLifecycleService {
    problems: Arc<dyn ProblemRepository>,
    insight: Arc<dyn InsightService>,
    engine: LifecycleEngine<ProblemFlow>,
    events: Arc<dyn EventBus>,
}

impl ProblemLifecycleService {
    pub fn new(
        problems: Arc<dyn ProblemRepository>,
        insight: Arc<dyn InsightService>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self { problems, insight, engine: LifecycleEngine::default(), events }
    }

    /// Folds one customer message into the conversation's problem state.
    ///
    /// A conversation holds at most one active problem. While one is active,
    /// resolution signals close it and task activity pushes fresh problems
    /// into progress. Without one, a reopening signal revives the latest
    /// resolved problem before any new problem is opened.
    pub async fn observe_message(
        &self,
        conversation: &Conversation,
        message: &str,
        history: &[HistoryTurn],
        tasks_created: u32,
        correlation_id: &str,
    ) {
        let intent = self.insight.detect_problem_intent(message, history).await;
        let resolution = self.insight.detect_problem_resolution(message, history).await;

        let active = match self.problems.find_active_by_conversation(&conversation.id).await {
            Ok(active) => active,
            Err(error) => {
                warn!(
                    event_name = "problem_lookup_failed",
                    conversation_id = %conversation.id.0,
                    customer_id = %conversation.customer_id,
                    reason = %error,
                );
                return;
            }
        };

        match active {
            Some(problem) => {
                if resolution.resolved {
                    self.transition(
                        problem,
                        &LifecycleEvent::ResolutionDetected,
                        &LifecycleContext::with_signal(resolution.confidence),
                        conversation,
                        correlation_id,
                    )
                    .await;
                } else if tasks_created > 0
                    && matches!(problem.status, ProblemStatus::New | ProblemStatus::Reopened)
                {
                    self.transition(
                        problem,
                        &LifecycleEvent::TaskCreated,
                        &LifecycleContext::default(),
                        conversation,
                        correlation_id,
                    )
                    .await;
                }
            }
            None => {
                if resolution.reopened
                    && self.reopen_latest(conversation, resolution.confidence, correlation_id).await
                {
                    return;
                }
                if intent.is_problem {
                    self.open_problem(conversation, message, intent, tasks_created, correlation_id)
                        .await;
                }
            }
        }
    }

    async fn reopen_latest(
        &self,
        conversation: &Conversation,
        confidence: f64,
        correlation_id: &str,
    ) -> bool {
        let latest =
            match self.problems.find_latest_resolved_by_conversation(&conversation.id).await {
                Ok(latest) => latest,
                Err(error) => {
                    warn!(
                        event_name = "problem_lookup_failed",
                        conversation_id = %conversation.id.0,
                        customer_id = %conversation.customer_id,
                        reason = %error,
                    );
                    return false;
                }
            };
        let Some(problem) = latest else {
            return false;
        };

        self.transition(
            problem,
            &LifecycleEvent::ReopeningDetected,
            &LifecycleContext::with_signal(confidence),
            conversation,
            correlation_id,
        )
        .await;
        true
    }

    async fn open_problem(
        &self,
        conversation: &Conversation,
        message: &str,
        intent: ProblemIntent,
        tasks_created: u32,
        correlation_id: &str,
    ) {
        let title =
            intent.title.unwrap_or_else(|| message.chars().take(20).collect::<String>());
        let problem = Problem::detect(
            conversation.customer_id.clone(),
            conversation.id.clone(),
            title,
            message,
            intent.intent,
            Some(intent.confidence),
        );
        if let Err(error) = self.problems.save(problem.clone()).await {
            warn!(
                event_name = "problem_save_failed",
                conversation_id = %conversation.id.0,
                customer_id = %conversation.customer_id,
                reason = %error,
            );
            return;
        }
        info!(
            event_name = "problem_detected",
            correlation_id = %correlation_id,
            conversation_id = %conversation.id.0,
            problem_id = %problem.id.0,
            title = %problem.title,
        );

        if tasks_created > 0 {
            self.transition(
                problem,
                &LifecycleEvent::TaskCreated,
                &LifecycleContext::default(),
                conversation,
                correlation_id,
            )
            .await;
        }
    }

    async fn transition(
        &self,
        mut problem: Problem,
        event: &LifecycleEvent,
        context: &LifecycleContext,
        conversation: &Conversation,
        correlation_id: &str,
    ) {
        let scope =
            TransitionScope::new(problem.id.clone(), conversation.id.clone(), correlation_id);
        match self.engine.apply_recorded(
            &problem.status,
            event,
            context,
            self.events.as_ref(),
            &scope,
        ) {
            Ok(outcome) => {
                problem.set_status(outcome.to);
                if let Err(error) = self.problems.save(problem).await {
                    warn!(
                        event_name = "problem_save_failed",
                        conversation_id = %conversation.id.0,
                        customer_id = %conversation.customer_id,
                        reason = %error,
                    );
                }
            }
            Err(error) => {
                warn!(
                    event_name = "problem_transition_skipped",
                    conversation_id = %conversation.id.0,
                    customer_id = %conversation.customer_id,
                    reason = %error,
                );
            }
        }
    }
}
