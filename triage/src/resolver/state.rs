//! Resolution phases and legal transition guards.
//!
//! Every resolver run starts at `Assessing` and ends at one of the terminal
//! phases `Resolved`, `Ticketed` or `Escalated`. Each transition is checked
//! against the table below and recorded, so a run can be audited from its
//! trace alone.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{TriageError, TriageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPhase {
    /// Gathering a fresh assessment from the oracle.
    Assessing,
    /// Silenced and polling remediation within the time budget.
    Remediating,
    /// Creating the tracking ticket.
    Ticketing,
    /// Raising the escalation flag.
    Escalating,
    Resolved,
    Ticketed,
    Escalated,
}

impl ResolutionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Ticketed | Self::Escalated)
    }
}

impl fmt::Display for ResolutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assessing => write!(f, "Assessing"),
            Self::Remediating => write!(f, "Remediating"),
            Self::Ticketing => write!(f, "Ticketing"),
            Self::Escalating => write!(f, "Escalating"),
            Self::Resolved => write!(f, "Resolved"),
            Self::Ticketed => write!(f, "Ticketed"),
            Self::Escalated => write!(f, "Escalated"),
        }
    }
}

/// ```text
/// Assessing   → Remediating | Ticketing | Escalating
/// Remediating → Resolved | Escalating | Ticketing
/// Ticketing   → Ticketed
/// Escalating  → Escalated
/// ```
fn is_legal_transition(from: ResolutionPhase, to: ResolutionPhase) -> bool {
    use ResolutionPhase::*;

    matches!(
        (from, to),
        (Assessing, Remediating)
            | (Assessing, Ticketing)
            | (Assessing, Escalating)
            // Remediation succeeded, or budget ran out with production
            // still impacted / recovered on its own
            | (Remediating, Resolved)
            | (Remediating, Escalating)
            | (Remediating, Ticketing)
            | (Ticketing, Ticketed)
            | (Escalating, Escalated)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: ResolutionPhase,
    pub to: ResolutionPhase,
    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Phase tracker for one resolver run over one incident.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionTrace {
    incident_id: String,
    current: ResolutionPhase,
    #[serde(skip)]
    started_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl ResolutionTrace {
    pub fn new(incident_id: impl Into<String>) -> Self {
        Self {
            incident_id: incident_id.into(),
            current: ResolutionPhase::Assessing,
            started_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> ResolutionPhase {
        self.current
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Ordered list of phases visited, starting with `Assessing`.
    pub fn path(&self) -> Vec<ResolutionPhase> {
        let mut path = vec![ResolutionPhase::Assessing];
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    pub fn advance(&mut self, to: ResolutionPhase, reason: Option<&str>) -> TriageResult<()> {
        if !is_legal_transition(self.current, to) {
            return Err(TriageError::IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(
            incident = %self.incident_id,
            from = %self.current,
            to = %to,
            reason = reason.unwrap_or(""),
            "Resolution transition"
        );

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }
}
