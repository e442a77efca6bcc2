//! On-call Triage Library
//!
//! This library provides:
//! - The four fixed incident channels and their priority order
//! - Per-channel FIFO queues owned by a single scheduler task
//! - The incident resolution state machine (assess → remediate / ticket / escalate)
//! - An idempotent escalation flag drained once per tick
//! - Duty-window gating by weekday and local time of day
//!
//! # Triage Loop
//!
//! ```text
//! tick
//!  ├─ drain intake into channel queues
//!  ├─ off duty? → skip queues
//!  ├─ first non-empty queue in priority order
//!  │     ├─ 1 incident  → IncidentResolver::resolve
//!  │     └─ >1 incident → flood: escalate all, drain queue
//!  ├─ all empty → one bounded planned-task unit
//!  └─ drain pending escalation notice
//! sleep(tick_interval)
//! ```
//!
//! External systems (ticketing, alert muting, monitoring, paging) are reached
//! through the async traits in [`collaborators`]; hosts wire concrete
//! implementations and drive [`scheduler::TriageScheduler::run`].

pub mod collaborators;
pub mod config;
pub mod duty;
pub mod error;
pub mod escalation;
pub mod incident;
pub mod intake;
pub mod planned;
pub mod queue;
pub mod resolver;
pub mod scheduler;

pub use collaborators::{
    AlertMuting, CollaboratorError, Collaborators, EscalationNotifier, RemediationStatus,
    ResolutionOracle, TicketRef, Ticketing,
};
pub use config::{DutyWindowConfig, TriageConfig};
pub use duty::{DutyClock, DutyWindow};
pub use error::{TriageError, TriageResult};
pub use escalation::{EscalationFlag, PendingEscalation};
pub use incident::{Channel, Incident, IncidentStatus};
pub use intake::{intake_channel, Intake, IntakeReceiver};
pub use planned::{IdleMaintenance, PlannedTask};
pub use queue::ChannelQueue;
pub use resolver::{
    Assessment, IncidentResolver, RemediationOutcome, RemediationPolicy, ResolutionOutcome,
    ResolutionPhase, ResolutionTrace,
};
pub use scheduler::{TickAction, TickReport, TriageScheduler};
