//! Orchestration of the customer-support message flow.
//!
//! The coordinator is the write path: one customer message in, a saga of
//! conversation, requirement, task and review writes out. Each step commits
//! on its own; a later failure never rolls an earlier write back. Problem
//! tracking and conversation completion are separate services sharing the
//! same repositories.
//!
//! - [`coordinator`]: the message intake saga and requirement-driven
//!   conversation bootstrap.
//! - [`lifecycle`]: best-effort problem detection and state tracking.
//! - [`completion`]: task-gated conversation close with summary generation
//!   and quality inspection.
//! - [`knowledge`]: repository-backed lookup for the reply pipeline.

pub mod completion;
pub mod coordinator;
pub mod knowledge;
pub mod lifecycle;

pub use completion::ConversationCompletionWorkflow;
pub use coordinator::{ConversationTaskCoordinator, CoordinatorDeps};
pub use knowledge::RepositoryKnowledge;
pub use lifecycle::ProblemLifecycleService;

use convoy_core::ApplicationError;
use convoy_db::repositories::RepositoryError;

pub(crate) fn persistence_error(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
