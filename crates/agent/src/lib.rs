//! AI collaborator clients and the reply generation pipeline.
//!
//! This crate is the boundary between convoy and its AI collaborators:
//! - `chat` - HTTP client for the conversational agent service, guarded by a
//!   circuit breaker
//! - `llm` - thin language-model contract for reply drafting and summaries
//! - `insight` - sentiment, problem-intent and resolution detection with
//!   deterministic keyword heuristics
//! - `knowledge` - read-side lookup that attaches help links to replies
//! - `quality` - post-close quality inspection webhook client
//! - `pipeline` - the ordered reply strategy chain gluing the above together
//!
//! # Reply pipeline
//!
//! Replies degrade through a strict fallback chain:
//! 1. **Workflow** (optional, off by default) - rule engine output used verbatim
//! 2. **Agent** - the external conversational agent service
//! 3. **LLM** - sentiment- and knowledge-grounded drafting
//! 4. **Static fallback** - canned sentiment-aware acknowledgment, always yields
//!
//! A stage that is unavailable or fails never aborts processing; the chain
//! advances and the customer still gets an acknowledgment from the last tier.
//!
//! # Boundary principle
//!
//! Collaborators draft replies and score confidence. They never decide whether
//! a reply ships: escalation to human review is a deterministic decision made
//! by the orchestrator from `convoy-core` policy.

pub mod chat;
pub mod insight;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod quality;
