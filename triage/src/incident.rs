//! Incident: one operational signal from one channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collaborators::TicketRef;

/// Incoming signal sources, declared highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Requests raised by first-line support engineers.
    FirstLineRequest,
    /// Alerts from the paging system.
    PagingAlert,
    /// Alerts posted to the production chat channel.
    ChatAlert,
    /// Questions asked in the internal help channel.
    InternalHelpRequest,
}

impl Channel {
    /// All channels in strict priority order, highest first.
    pub const PRIORITY_ORDER: [Channel; 4] = [
        Channel::FirstLineRequest,
        Channel::PagingAlert,
        Channel::ChatAlert,
        Channel::InternalHelpRequest,
    ];

    /// Position in [`Self::PRIORITY_ORDER`] (0 is most urgent).
    pub fn priority(self) -> usize {
        match self {
            Self::FirstLineRequest => 0,
            Self::PagingAlert => 1,
            Self::ChatAlert => 2,
            Self::InternalHelpRequest => 3,
        }
    }

    /// Whether signals on this channel originate from a mutable alert.
    ///
    /// Internal help requests are conversations, not alerts, so there is
    /// nothing to silence.
    pub fn is_mutable(self) -> bool {
        !matches!(self, Self::InternalHelpRequest)
    }

    /// Human-readable label used in incident banners.
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstLineRequest => "L1 Request",
            Self::PagingAlert => "Paging Alert",
            Self::ChatAlert => "Chat Alert",
            Self::InternalHelpRequest => "Internal Help Request",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstLineRequest => write!(f, "first_line_request"),
            Self::PagingAlert => write!(f, "paging_alert"),
            Self::ChatAlert => write!(f, "chat_alert"),
            Self::InternalHelpRequest => write!(f, "internal_help_request"),
        }
    }
}

/// Lifecycle status of an incident.
///
/// `Pending` is left as soon as the resolver starts work and is never
/// re-entered. `Resolved`, `Ticketed` and `Escalated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Resolving,
    Resolved,
    Ticketed,
    Escalated,
}

impl IncidentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Ticketed | Self::Escalated)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Resolving => write!(f, "resolving"),
            Self::Resolved => write!(f, "resolved"),
            Self::Ticketed => write!(f, "ticketed"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// A single incoming signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Opaque identifier, unique within its channel.
    pub id: String,
    /// Human-readable summary.
    pub description: String,
    /// Source channel; decides queue membership and priority.
    pub channel: Channel,
    /// Current lifecycle status.
    pub status: IncidentStatus,
    /// Whether the originating alert has been muted.
    pub silenced: bool,
    /// Tracking ticket, set at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<TicketRef>,
    /// When the signal was received.
    pub received_at: DateTime<Utc>,
}

impl Incident {
    /// Create a pending, unsilenced incident with no ticket.
    pub fn new(channel: Channel, id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            channel,
            status: IncidentStatus::Pending,
            silenced: false,
            ticket_ref: None,
            received_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_ticket(&self) -> bool {
        self.ticket_ref.is_some()
    }

    /// Record the tracking ticket. Returns `false` (and keeps the original)
    /// if one was already recorded.
    pub fn attach_ticket(&mut self, ticket: TicketRef) -> bool {
        if self.ticket_ref.is_some() {
            return false;
        }
        self.ticket_ref = Some(ticket);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_matches_priority_index() {
        for (idx, channel) in Channel::PRIORITY_ORDER.iter().enumerate() {
            assert_eq!(channel.priority(), idx);
        }
        assert!(Channel::FirstLineRequest < Channel::InternalHelpRequest);
    }

    #[test]
    fn test_only_internal_help_is_exempt_from_muting() {
        assert!(Channel::FirstLineRequest.is_mutable());
        assert!(Channel::PagingAlert.is_mutable());
        assert!(Channel::ChatAlert.is_mutable());
        assert!(!Channel::InternalHelpRequest.is_mutable());
    }

    #[test]
    fn test_new_incident_is_pending() {
        let incident = Incident::new(Channel::PagingAlert, "OG-1", "Service outage detected");
        assert_eq!(incident.status, IncidentStatus::Pending);
        assert!(!incident.silenced);
        assert!(!incident.has_ticket());
        assert!(!incident.is_terminal());
    }

    #[test]
    fn test_ticket_attached_at_most_once() {
        let mut incident = Incident::new(Channel::ChatAlert, "S-1", "High memory usage");
        assert!(incident.attach_ticket(TicketRef::new("devops-1")));
        assert!(!incident.attach_ticket(TicketRef::new("devops-2")));
        assert_eq!(incident.ticket_ref.as_ref().map(|t| t.as_str()), Some("devops-1"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!IncidentStatus::Pending.is_terminal());
        assert!(!IncidentStatus::Resolving.is_terminal());
        assert!(IncidentStatus::Resolved.is_terminal());
        assert!(IncidentStatus::Ticketed.is_terminal());
        assert!(IncidentStatus::Escalated.is_terminal());
    }

    #[test]
    fn test_channel_serializes_snake_case() {
        let json = serde_json::to_string(&Channel::InternalHelpRequest).unwrap();
        assert_eq!(json, "\"internal_help_request\"");
        assert_eq!(Channel::FirstLineRequest.label(), "L1 Request");
    }
}
