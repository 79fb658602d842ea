pub mod config;
pub mod detect;
pub mod domain;
pub mod errors;
pub mod escalation;
pub mod events;
pub mod lifecycle;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use detect::{DetectorConfig, RequirementCandidate, RequirementDetector, RequirementSignal};
pub use domain::conversation::{
    AgentMode, Channel, Conversation, ConversationId, ConversationStatus, HistoryTurn, Message,
    SenderKind,
};
pub use domain::knowledge::{KnowledgeEntry, KnowledgeEntryId};
pub use domain::problem::{Problem, ProblemId, ProblemStatus};
pub use domain::processing::{
    AgentSuggestion, CompletionOutcome, IncomingMessage, ProcessingResult, ProcessingStatus,
    RecommendedTask, RequirementConversationOutcome,
};
pub use domain::quality::{QualityReport, QualityReportId};
pub use domain::requirement::{
    NewRequirement, Priority, Requirement, RequirementCategory, RequirementId, RequirementSource,
    RequirementStatus,
};
pub use domain::review::{ReviewRequest, ReviewRequestId, ReviewStatus};
pub use domain::task::{Task, TaskId, TaskStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use escalation::{EscalationDecision, EscalationInput, EscalationTrigger, ReviewPolicy};
pub use events::{DomainEvent, EventBus, EventEnvelope, InMemoryEventBus, TracingEventBus};
pub use lifecycle::{
    LifecycleContext, LifecycleDefinition, LifecycleEngine, LifecycleEvent, LifecycleOutcome,
    LifecycleTransitionError, ProblemFlow, TransitionScope,
};
