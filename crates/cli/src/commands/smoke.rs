use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::commands::CommandResult;
use convoy_agent::chat::{ChatAgentClient, ChatRequest, ChatResponse};
use convoy_agent::insight::{InsightService, KeywordInsight};
use convoy_agent::knowledge::KnowledgeLookup;
use convoy_agent::llm::{DisabledLlm, LlmClient};
use convoy_agent::pipeline::ReplyPipeline;
use convoy_agent::quality::{QualityInspector, QualityVerdict};
use convoy_core::config::{AppConfig, LoadOptions};
use convoy_core::{
    Channel, ConversationId, EventBus, IncomingMessage, ProcessingStatus, RequirementDetector,
    TracingEventBus,
};
use convoy_db::repositories::{
    ConversationRepository, ProblemRepository, QualityReportRepository, RequirementRepository,
    ReviewRequestRepository, SqlConversationRepository, SqlKnowledgeRepository,
    SqlProblemRepository, SqlQualityReportRepository, SqlRequirementRepository,
    SqlReviewRequestRepository, SqlTaskRepository, TaskRepository,
};
use convoy_db::{connect_with_settings, migrations, DbPool};
use convoy_orchestrator::{
    ConversationCompletionWorkflow, ConversationTaskCoordinator, CoordinatorDeps,
    ProblemLifecycleService, RepositoryKnowledge,
};

const SMOKE_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

/// Offline end-to-end pass over the message pipeline. Runs against a private
/// in-memory database with canned agent and quality collaborators, so it
/// executes anywhere without reaching other services.
pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("schema_bootstrap"));
            checks.push(skipped("message_path"));
            checks.push(skipped("completion_guard"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "schema_bootstrap",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("message_path"));
            checks.push(skipped("completion_guard"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let schema_started = Instant::now();
    let schema_result = runtime.block_on(async {
        let pool = connect_with_settings(SMOKE_DATABASE_URL, 1, 30)
            .await
            .map_err(|error| format!("in-memory connect failed: {error}"))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("migration run failed: {error}"))?;
        Ok::<DbPool, String>(pool)
    });

    let pool = match schema_result {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "schema_bootstrap",
                status: SmokeStatus::Pass,
                elapsed_ms: schema_started.elapsed().as_millis() as u64,
                message: "in-memory schema ready".to_string(),
            });
            pool
        }
        Err(message) => {
            checks.push(SmokeCheck {
                name: "schema_bootstrap",
                status: SmokeStatus::Fail,
                elapsed_ms: schema_started.elapsed().as_millis() as u64,
                message,
            });
            checks.push(skipped("message_path"));
            checks.push(skipped("completion_guard"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let stack = build_stack(&pool, &config);

    let message_started = Instant::now();
    let processed = runtime.block_on(stack.coordinator.process_customer_message(smoke_message()));
    let conversation_id = match processed {
        Ok(result)
            if result.status == ProcessingStatus::AutoHandled
                && result.requirements_created.len() == 1
                && result.tasks_created.len() == 1
                && !result.agent_suggestion.suggested_reply.is_empty() =>
        {
            checks.push(SmokeCheck {
                name: "message_path",
                status: SmokeStatus::Pass,
                elapsed_ms: message_started.elapsed().as_millis() as u64,
                message:
                    "urgent login report auto-handled with a requirement, a task, and a drafted reply"
                        .to_string(),
            });
            Some(result.conversation_id)
        }
        Ok(result) => {
            checks.push(SmokeCheck {
                name: "message_path",
                status: SmokeStatus::Fail,
                elapsed_ms: message_started.elapsed().as_millis() as u64,
                message: format!(
                    "unexpected outcome: status {:?}, {} requirements, {} tasks",
                    result.status,
                    result.requirements_created.len(),
                    result.tasks_created.len()
                ),
            });
            None
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "message_path",
                status: SmokeStatus::Fail,
                elapsed_ms: message_started.elapsed().as_millis() as u64,
                message: format!("message processing failed: {error}"),
            });
            None
        }
    };

    match conversation_id {
        Some(conversation_id) => {
            let guard_started = Instant::now();
            let outcome =
                runtime.block_on(stack.completion.complete_conversation(&conversation_id));
            match outcome {
                Ok(outcome) if !outcome.success && outcome.incomplete_tasks.len() == 1 => {
                    checks.push(SmokeCheck {
                        name: "completion_guard",
                        status: SmokeStatus::Pass,
                        elapsed_ms: guard_started.elapsed().as_millis() as u64,
                        message: "completion held while the created task stays open".to_string(),
                    });
                }
                Ok(outcome) => {
                    checks.push(SmokeCheck {
                        name: "completion_guard",
                        status: SmokeStatus::Fail,
                        elapsed_ms: guard_started.elapsed().as_millis() as u64,
                        message: format!(
                            "expected the open task to block completion, got success={} with {} open tasks",
                            outcome.success,
                            outcome.incomplete_tasks.len()
                        ),
                    });
                }
                Err(error) => {
                    checks.push(SmokeCheck {
                        name: "completion_guard",
                        status: SmokeStatus::Fail,
                        elapsed_ms: guard_started.elapsed().as_millis() as u64,
                        message: format!("completion call failed: {error}"),
                    });
                }
            }
        }
        None => checks.push(skipped("completion_guard")),
    }

    runtime.block_on(async {
        pool.close().await;
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

struct SmokeStack {
    coordinator: ConversationTaskCoordinator,
    completion: ConversationCompletionWorkflow,
}

fn build_stack(pool: &DbPool, config: &AppConfig) -> SmokeStack {
    let conversations: Arc<dyn ConversationRepository> =
        Arc::new(SqlConversationRepository::new(pool.clone()));
    let requirements: Arc<dyn RequirementRepository> =
        Arc::new(SqlRequirementRepository::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqlTaskRepository::new(pool.clone()));
    let problems: Arc<dyn ProblemRepository> = Arc::new(SqlProblemRepository::new(pool.clone()));
    let reviews: Arc<dyn ReviewRequestRepository> =
        Arc::new(SqlReviewRequestRepository::new(pool.clone()));
    let quality_reports: Arc<dyn QualityReportRepository> =
        Arc::new(SqlQualityReportRepository::new(pool.clone()));

    let agent: Arc<dyn ChatAgentClient> = Arc::new(OfflineAgent);
    let llm: Arc<dyn LlmClient> = Arc::new(DisabledLlm::new());
    let insight: Arc<dyn InsightService> = Arc::new(KeywordInsight::new());
    let knowledge: Arc<dyn KnowledgeLookup> = Arc::new(RepositoryKnowledge::new(Arc::new(
        SqlKnowledgeRepository::new(pool.clone()),
    )));
    let quality: Arc<dyn QualityInspector> = Arc::new(OfflineQuality);
    let events: Arc<dyn EventBus> = Arc::new(TracingEventBus);

    let pipeline = ReplyPipeline::standard(None, agent, llm.clone(), insight.clone(), knowledge);
    let lifecycle = Arc::new(ProblemLifecycleService::new(problems, insight, events.clone()));

    let coordinator = ConversationTaskCoordinator::new(CoordinatorDeps {
        conversations: conversations.clone(),
        requirements,
        tasks: tasks.clone(),
        reviews,
        detector: RequirementDetector::default(),
        pipeline,
        policy: config.review.policy(),
        lifecycle,
        events: events.clone(),
        requirement_threshold: config.review.requirement_threshold,
    });

    let completion = ConversationCompletionWorkflow::new(
        conversations,
        tasks,
        quality_reports,
        llm,
        quality,
        events,
        config.quality.low_score_threshold,
    );

    SmokeStack { coordinator, completion }
}

fn smoke_message() -> IncomingMessage {
    IncomingMessage {
        customer_id: "cust-smoke".to_string(),
        content: "无法登录，紧急".to_string(),
        channel: Channel::Web,
        sender_id: "cust-smoke".to_string(),
        mode: None,
        metadata: HashMap::new(),
    }
}

/// Declines every call, handing the reply to the local tiers.
struct OfflineAgent;

#[async_trait]
impl ChatAgentClient for OfflineAgent {
    async fn send_message(&self, _request: ChatRequest) -> Result<Option<ChatResponse>> {
        Ok(None)
    }
}

struct OfflineQuality;

#[async_trait]
impl QualityInspector for OfflineQuality {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn inspect(&self, _conversation_id: &ConversationId) -> Result<QualityVerdict> {
        bail!("quality inspection stays offline during smoke runs")
    }
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped after an earlier failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
