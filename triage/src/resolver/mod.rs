//! Incident resolution: the per-incident state machine and its retry policy.

pub mod engine;
pub mod policy;
pub mod state;

pub use engine::{Assessment, IncidentResolver, RemediationOutcome, ResolutionOutcome};
pub use policy::RemediationPolicy;
pub use state::{ResolutionPhase, ResolutionTrace, TransitionRecord};
