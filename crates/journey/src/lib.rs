//! Journey orchestration — graph-defined multi-step customer workflows with
//! condition branching, weighted splits, wait suspensions, and approval
//! gating ahead of side-effecting sends.

pub mod engine;
pub mod evaluator;
pub mod scheduler;
pub mod state_machine;
pub mod types;
pub mod validation;

pub use engine::JourneyEngine;
pub use scheduler::WaitScheduler;
pub use validation::{validate, ValidationError};
