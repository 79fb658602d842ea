use std::collections::HashMap;

use tokio::sync::RwLock;

use convoy_core::domain::conversation::{Conversation, ConversationId};
use convoy_core::domain::knowledge::KnowledgeEntry;
use convoy_core::domain::problem::{Problem, ProblemId};
use convoy_core::domain::quality::QualityReport;
use convoy_core::domain::requirement::{Requirement, RequirementId};
use convoy_core::domain::review::{ReviewRequest, ReviewRequestId, ReviewStatus};
use convoy_core::domain::task::{Task, TaskId};

use super::{
    ConversationRepository, KnowledgeRepository, ProblemRepository, QualityReportRepository,
    RepositoryError, RequirementRepository, ReviewRequestRepository, TaskRepository,
};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).cloned())
    }

    async fn find_open_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .values()
            .filter(|conversation| {
                conversation.customer_id == customer_id && conversation.is_open()
            })
            .max_by_key(|conversation| conversation.updated_at)
            .cloned())
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.0.clone(), conversation);
        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.len() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryRequirementRepository {
    requirements: RwLock<HashMap<String, Requirement>>,
}

#[async_trait::async_trait]
impl RequirementRepository for InMemoryRequirementRepository {
    async fn find_by_id(
        &self,
        id: &RequirementId,
    ) -> Result<Option<Requirement>, RepositoryError> {
        let requirements = self.requirements.read().await;
        Ok(requirements.get(&id.0).cloned())
    }

    async fn save(&self, requirement: Requirement) -> Result<(), RepositoryError> {
        let mut requirements = self.requirements.write().await;
        requirements.insert(requirement.id.0.clone(), requirement);
        Ok(())
    }

    async fn list_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Requirement>, RepositoryError> {
        let requirements = self.requirements.read().await;
        let mut matches: Vec<Requirement> = requirements
            .values()
            .filter(|requirement| requirement.customer_id == customer_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

#[async_trait::async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(&id.0).cloned())
    }

    async fn save(&self, task: Task) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.0.clone(), task);
        Ok(())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Task>, RepositoryError> {
        let tasks = self.tasks.read().await;
        let mut matches: Vec<Task> = tasks
            .values()
            .filter(|task| task.conversation_id.as_ref() == Some(conversation_id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryProblemRepository {
    problems: RwLock<HashMap<String, Problem>>,
}

#[async_trait::async_trait]
impl ProblemRepository for InMemoryProblemRepository {
    async fn find_by_id(&self, id: &ProblemId) -> Result<Option<Problem>, RepositoryError> {
        let problems = self.problems.read().await;
        Ok(problems.get(&id.0).cloned())
    }

    async fn save(&self, problem: Problem) -> Result<(), RepositoryError> {
        let mut problems = self.problems.write().await;
        problems.insert(problem.id.0.clone(), problem);
        Ok(())
    }

    async fn find_active_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Problem>, RepositoryError> {
        let problems = self.problems.read().await;
        Ok(problems
            .values()
            .filter(|problem| &problem.conversation_id == conversation_id && problem.is_active())
            .max_by_key(|problem| problem.created_at)
            .cloned())
    }

    async fn find_latest_resolved_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Problem>, RepositoryError> {
        let problems = self.problems.read().await;
        Ok(problems
            .values()
            .filter(|problem| &problem.conversation_id == conversation_id && !problem.is_active())
            .max_by_key(|problem| problem.resolved_at)
            .cloned())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Problem>, RepositoryError> {
        let problems = self.problems.read().await;
        let mut matches: Vec<Problem> = problems
            .values()
            .filter(|problem| &problem.conversation_id == conversation_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryReviewRequestRepository {
    requests: RwLock<HashMap<String, ReviewRequest>>,
}

#[async_trait::async_trait]
impl ReviewRequestRepository for InMemoryReviewRequestRepository {
    async fn find_by_id(
        &self,
        id: &ReviewRequestId,
    ) -> Result<Option<ReviewRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: ReviewRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut pending: Vec<ReviewRequest> = requests
            .values()
            .filter(|request| request.status == ReviewStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit as usize);
        Ok(pending)
    }
}

#[derive(Default)]
pub struct InMemoryQualityReportRepository {
    reports: RwLock<HashMap<String, QualityReport>>,
}

#[async_trait::async_trait]
impl QualityReportRepository for InMemoryQualityReportRepository {
    async fn save(&self, report: QualityReport) -> Result<(), RepositoryError> {
        let mut reports = self.reports.write().await;
        reports.insert(report.id.0.clone(), report);
        Ok(())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<QualityReport>, RepositoryError> {
        let reports = self.reports.read().await;
        let mut matches: Vec<QualityReport> = reports
            .values()
            .filter(|report| &report.conversation_id == conversation_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryKnowledgeRepository {
    entries: RwLock<HashMap<String, KnowledgeEntry>>,
}

#[async_trait::async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn save(&self, entry: KnowledgeEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.id.0.clone(), entry);
        Ok(())
    }

    async fn search(
        &self,
        terms: &[&str],
        limit: u32,
    ) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        let terms: Vec<&str> =
            terms.iter().copied().filter(|term| !term.trim().is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut matches: Vec<KnowledgeEntry> =
            entries.values().filter(|entry| entry.matches_any(&terms)).cloned().collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        matches.truncate(limit as usize);
        Ok(matches)
    }
}
