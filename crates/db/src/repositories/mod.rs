use async_trait::async_trait;
use thiserror::Error;

use convoy_core::domain::conversation::{Conversation, ConversationId};
use convoy_core::domain::knowledge::KnowledgeEntry;
use convoy_core::domain::problem::{Problem, ProblemId};
use convoy_core::domain::quality::QualityReport;
use convoy_core::domain::requirement::{Requirement, RequirementId};
use convoy_core::domain::review::{ReviewRequest, ReviewRequestId};
use convoy_core::domain::task::{Task, TaskId};

pub mod conversation;
pub mod knowledge;
pub mod memory;
pub mod problem;
pub mod quality;
pub mod requirement;
pub mod review;
pub mod task;

pub use conversation::SqlConversationRepository;
pub use knowledge::SqlKnowledgeRepository;
pub use memory::{
    InMemoryConversationRepository, InMemoryKnowledgeRepository, InMemoryProblemRepository,
    InMemoryQualityReportRepository, InMemoryRequirementRepository, InMemoryReviewRequestRepository,
    InMemoryTaskRepository,
};
pub use problem::SqlProblemRepository;
pub use quality::SqlQualityReportRepository;
pub use requirement::SqlRequirementRepository;
pub use review::SqlReviewRequestRepository;
pub use task::SqlTaskRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;

    /// Latest still-open thread for a customer, used to continue dialogue
    /// instead of opening a parallel one.
    async fn find_open_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait RequirementRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequirementId)
        -> Result<Option<Requirement>, RepositoryError>;

    async fn save(&self, requirement: Requirement) -> Result<(), RepositoryError>;

    async fn list_by_customer(&self, customer_id: &str)
        -> Result<Vec<Requirement>, RepositoryError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError>;

    async fn save(&self, task: Task) -> Result<(), RepositoryError>;

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Task>, RepositoryError>;
}

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProblemId) -> Result<Option<Problem>, RepositoryError>;

    async fn save(&self, problem: Problem) -> Result<(), RepositoryError>;

    /// At most one problem per conversation is ever non-resolved.
    async fn find_active_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Problem>, RepositoryError>;

    async fn find_latest_resolved_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Problem>, RepositoryError>;

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Problem>, RepositoryError>;
}

#[async_trait]
pub trait ReviewRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ReviewRequestId,
    ) -> Result<Option<ReviewRequest>, RepositoryError>;

    async fn save(&self, request: ReviewRequest) -> Result<(), RepositoryError>;

    async fn list_pending(&self, limit: u32) -> Result<Vec<ReviewRequest>, RepositoryError>;
}

#[async_trait]
pub trait QualityReportRepository: Send + Sync {
    async fn save(&self, report: QualityReport) -> Result<(), RepositoryError>;

    async fn find_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<QualityReport>, RepositoryError>;
}

#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    async fn save(&self, entry: KnowledgeEntry) -> Result<(), RepositoryError>;

    /// Keyword containment search over titles and tags. Empty terms match
    /// nothing.
    async fn search(&self, terms: &[&str], limit: u32)
        -> Result<Vec<KnowledgeEntry>, RepositoryError>;
}
