//! Process startup: config, database, and the full collaborator wiring.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use convoy_agent::chat::{ChatAgentClient, HttpChatAgentClient};
use convoy_agent::insight::{InsightService, KeywordInsight};
use convoy_agent::knowledge::KnowledgeLookup;
use convoy_agent::llm::{DisabledLlm, LlmClient};
use convoy_agent::pipeline::ReplyPipeline;
use convoy_agent::quality::{HttpQualityInspector, QualityInspector};
use convoy_core::config::{AppConfig, ConfigError, LoadOptions};
use convoy_core::{EventBus, RequirementDetector, TracingEventBus};
use convoy_db::repositories::{
    ConversationRepository, ProblemRepository, QualityReportRepository, RequirementRepository,
    ReviewRequestRepository, SqlConversationRepository, SqlKnowledgeRepository,
    SqlProblemRepository, SqlQualityReportRepository, SqlRequirementRepository,
    SqlReviewRequestRepository, SqlTaskRepository, TaskRepository,
};
use convoy_db::{connect_from_config, migrations, DbPool};
use convoy_orchestrator::{
    ConversationCompletionWorkflow, ConversationTaskCoordinator, CoordinatorDeps,
    ProblemLifecycleService, RepositoryKnowledge,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub coordinator: Arc<ConversationTaskCoordinator>,
    pub completion: Arc<ConversationCompletionWorkflow>,
    pub reviews: Arc<dyn ReviewRequestRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("collaborator client construction failed: {0}")]
    Collaborator(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let conversations: Arc<dyn ConversationRepository> =
        Arc::new(SqlConversationRepository::new(db_pool.clone()));
    let requirements: Arc<dyn RequirementRepository> =
        Arc::new(SqlRequirementRepository::new(db_pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqlTaskRepository::new(db_pool.clone()));
    let problems: Arc<dyn ProblemRepository> = Arc::new(SqlProblemRepository::new(db_pool.clone()));
    let reviews: Arc<dyn ReviewRequestRepository> =
        Arc::new(SqlReviewRequestRepository::new(db_pool.clone()));
    let quality_reports: Arc<dyn QualityReportRepository> =
        Arc::new(SqlQualityReportRepository::new(db_pool.clone()));

    let agent: Arc<dyn ChatAgentClient> = Arc::new(
        HttpChatAgentClient::new(&config.agent)
            .map_err(|error| BootstrapError::Collaborator(error.to_string()))?,
    );
    let llm: Arc<dyn LlmClient> = Arc::new(DisabledLlm::new());
    if config.llm.enabled {
        warn!(
            event_name = "system.bootstrap.llm_backend_missing",
            correlation_id = "bootstrap",
            model = %config.llm.model,
            "llm.enabled is set but no model backend ships in this build; reply drafting degrades to the agent and static tiers"
        );
    }
    let insight: Arc<dyn InsightService> = Arc::new(KeywordInsight::new());
    let knowledge: Arc<dyn KnowledgeLookup> = Arc::new(RepositoryKnowledge::new(Arc::new(
        SqlKnowledgeRepository::new(db_pool.clone()),
    )));
    let quality: Arc<dyn QualityInspector> = Arc::new(
        HttpQualityInspector::new(&config.quality)
            .map_err(|error| BootstrapError::Collaborator(error.to_string()))?,
    );
    let events: Arc<dyn EventBus> = Arc::new(TracingEventBus);

    let pipeline = ReplyPipeline::standard(None, agent, llm.clone(), insight.clone(), knowledge);
    let lifecycle = Arc::new(ProblemLifecycleService::new(problems, insight, events.clone()));

    let coordinator = Arc::new(ConversationTaskCoordinator::new(CoordinatorDeps {
        conversations: conversations.clone(),
        requirements,
        tasks: tasks.clone(),
        reviews: reviews.clone(),
        detector: RequirementDetector::default(),
        pipeline,
        policy: config.review.policy(),
        lifecycle,
        events: events.clone(),
        requirement_threshold: config.review.requirement_threshold,
    }));

    let completion = Arc::new(ConversationCompletionWorkflow::new(
        conversations,
        tasks,
        quality_reports,
        llm,
        quality,
        events,
        config.quality.low_score_threshold,
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        agent_base_url = %config.agent.base_url,
        quality_inspection = config.quality.webhook_url.is_some(),
        "application wiring complete"
    );

    Ok(Application { config, db_pool, coordinator, completion, reviews })
}
