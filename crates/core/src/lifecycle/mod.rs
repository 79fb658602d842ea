pub mod engine;
pub mod states;

pub use engine::{LifecycleDefinition, LifecycleEngine, LifecycleTransitionError, ProblemFlow};
pub use states::{LifecycleContext, LifecycleEvent, LifecycleOutcome, TransitionScope};
