//! Escalation Flag: the single pending-escalation indicator.
//!
//! `escalate` raises the flag if it is not already raised; `drain_notice`
//! runs once per scheduler tick and turns a raised flag into exactly one
//! notification. Any number of escalations between two drains therefore
//! surface as one notice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::EscalationNotifier;
use crate::error::TriageResult;
use crate::incident::{Channel, Incident};

/// The escalation waiting to be announced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEscalation {
    /// Incident that raised the flag.
    pub incident_id: String,
    pub description: String,
    pub channel: Channel,
    pub raised_at: DateTime<Utc>,
    /// Escalations folded into this one while it was pending.
    pub suppressed: u32,
}

impl PendingEscalation {
    /// Text handed to the notifier.
    pub fn notice(&self) -> String {
        let mut text = format!(
            "Escalated to a more experienced colleague: \"{}\" ({} {})",
            self.description,
            self.channel.label(),
            self.incident_id
        );
        if self.suppressed > 0 {
            text.push_str(&format!(" and {} more", self.suppressed));
        }
        text
    }
}

#[derive(Debug, Default)]
pub struct EscalationFlag {
    pending: Option<PendingEscalation>,
    raised: u64,
    suppressed: u64,
    notified: u64,
}

impl EscalationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag for `incident`. Returns `true` if this call raised it,
    /// `false` if an escalation was already pending.
    pub fn escalate(&mut self, incident: &Incident) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.suppressed += 1;
                self.suppressed += 1;
                info!(
                    incident = %incident.id,
                    pending = %pending.incident_id,
                    "Escalation already pending; not re-triggering notification"
                );
                false
            }
            None => {
                self.pending = Some(PendingEscalation {
                    incident_id: incident.id.clone(),
                    description: incident.description.clone(),
                    channel: incident.channel,
                    raised_at: Utc::now(),
                    suppressed: 0,
                });
                self.raised += 1;
                info!(incident = %incident.id, channel = %incident.channel, "Escalation raised");
                true
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingEscalation> {
        self.pending.as_ref()
    }

    /// Emit one notification for the pending escalation, if any, and clear
    /// the flag. On notifier failure the flag stays raised for the next tick.
    ///
    /// Returns whether a notification was sent.
    pub async fn drain_notice(&mut self, notifier: &dyn EscalationNotifier) -> TriageResult<bool> {
        let Some(pending) = self.pending.as_ref() else {
            return Ok(false);
        };

        if let Err(e) = notifier.notify(&pending.notice()).await {
            warn!(incident = %pending.incident_id, error = %e, "Escalation notice not delivered; will retry");
            return Err(e.into());
        }

        info!(incident = %pending.incident_id, "Issue has been escalated to a more experienced colleague");
        self.pending = None;
        self.notified += 1;
        Ok(true)
    }

    /// `(raised, suppressed, notified)` counters since start.
    pub fn counters(&self) -> (u64, u64, u64) {
        (self.raised, self.suppressed, self.notified)
    }
}
