//! Collaborator seams: the external systems the triage core calls.
//!
//! The core never talks to monitoring, runbooks, the ticket tracker, the
//! paging/chat APIs or the escalation transport directly. Hosts provide
//! implementations of these traits; [`memory`] holds in-process ones for
//! tests and dry runs.
//!
//! All calls are made from the single scheduler task. Implementations must
//! not block the runtime and must never touch channel queues.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of any external capability.
#[derive(Debug, Clone, Error)]
#[error("{collaborator} unavailable: {message}")]
pub struct CollaboratorError {
    /// Which collaborator failed (e.g. `"ticketing"`).
    pub collaborator: String,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

/// Identifier of a tracking ticket in the external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketRef(String);

impl TicketRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one remediation poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    Resolved,
    StillUnresolved,
}

/// Monitoring / runbook oracle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResolutionOracle: Send + Sync {
    /// Is production currently impacted?
    async fn is_production_impacted(&self) -> Result<bool, CollaboratorError>;

    /// Is there a known, safe remediation?
    async fn is_remediation_known(&self) -> Result<bool, CollaboratorError>;

    /// Make one remediation attempt. Called repeatedly by the resolver until
    /// it reports `Resolved` or the budget runs out; `budget` is what remains.
    async fn attempt_remediation(
        &self,
        description: &str,
        budget: Duration,
    ) -> Result<RemediationStatus, CollaboratorError>;
}

/// Ticket tracker.
///
/// The core checks `Incident::ticket_ref` before calling, so an
/// implementation sees at most one call per incident lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ticketing: Send + Sync {
    async fn create_ticket(&self, description: &str) -> Result<TicketRef, CollaboratorError>;
}

/// Alert silencing on the paging / chat side.
///
/// Never called for `InternalHelpRequest` incidents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertMuting: Send + Sync {
    async fn silence(&self, incident_id: &str) -> Result<(), CollaboratorError>;
}

/// Fire-and-forget notification to a more experienced colleague.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    async fn notify(&self, description: &str) -> Result<(), CollaboratorError>;
}

/// The full set of collaborators the scheduler and resolver call.
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn ResolutionOracle>,
    pub ticketing: Arc<dyn Ticketing>,
    pub muting: Arc<dyn AlertMuting>,
    pub notifier: Arc<dyn EscalationNotifier>,
}

impl Collaborators {
    pub fn new(
        oracle: Arc<dyn ResolutionOracle>,
        ticketing: Arc<dyn Ticketing>,
        muting: Arc<dyn AlertMuting>,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> Self {
        Self {
            oracle,
            ticketing,
            muting,
            notifier,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
