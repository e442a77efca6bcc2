//! Triage error taxonomy.
//!
//! | Variant                   | Fatal to the loop | Incident effect |
//! |---------------------------|-------------------|-----------------|
//! | DuplicateIncident         | no                | new entry rejected, original kept |
//! | CollaboratorUnavailable   | no                | status restored, retried next tick |
//! | IllegalTransition         | no                | status restored, logged as a bug |
//! | IntakeClosed              | host decides      | submission dropped |
//! | Config                    | yes (startup)     | n/a |
//!
//! Running out of remediation budget is not an error; it is the
//! [`RemediationOutcome::TimedOut`](crate::resolver::RemediationOutcome) path.

use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::incident::Channel;
use crate::resolver::ResolutionPhase;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("incident {id} is already queued on {channel}")]
    DuplicateIncident { channel: Channel, id: String },

    #[error(transparent)]
    CollaboratorUnavailable(#[from] CollaboratorError),

    #[error("illegal resolution transition: {from} → {to}")]
    IllegalTransition {
        from: ResolutionPhase,
        to: ResolutionPhase,
    },

    #[error("triage intake is closed")]
    IntakeClosed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TriageError {
    /// Whether the incident should stay queued and be retried on a later tick.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorUnavailable(_) | Self::IllegalTransition { .. }
        )
    }
}

pub type TriageResult<T> = Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failure_is_retriable() {
        let err: TriageError = CollaboratorError::new("ticketing", "503 from tracker").into();
        assert!(err.is_retriable());
        assert!(err.to_string().contains("ticketing"));
    }

    #[test]
    fn test_duplicate_is_not_retriable() {
        let err = TriageError::DuplicateIncident {
            channel: Channel::ChatAlert,
            id: "S-1".into(),
        };
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "incident S-1 is already queued on chat_alert");
    }
}
