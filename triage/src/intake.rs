//! Intake: how hosts hand new incidents to the scheduler.
//!
//! Producers hold cloneable [`Intake`] handles. The scheduler owns the only
//! [`IntakeReceiver`] and moves submissions into its queues at the start of
//! each tick, so queues are never touched outside the scheduler task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{TriageError, TriageResult};
use crate::incident::Incident;

pub fn intake_channel(capacity: usize) -> (Intake, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Intake { tx }, IntakeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct Intake {
    tx: mpsc::Sender<Incident>,
}

impl Intake {
    /// Submit an incident, waiting for space if the intake is full.
    ///
    /// Success means the scheduler will see the incident, not that it was
    /// queued. A duplicate id is rejected when the scheduler drains the
    /// intake; the only trace of that is a warning log and
    /// [`TickReport::intake_rejected`](crate::scheduler::TickReport).
    /// Use [`TriageScheduler::submit`](crate::scheduler::TriageScheduler::submit)
    /// to get the rejection back directly.
    pub async fn submit(&self, incident: Incident) -> TriageResult<()> {
        self.tx
            .send(incident)
            .await
            .map_err(|_| TriageError::IntakeClosed)
    }

    /// Submit without waiting. A full intake hands the incident back.
    pub fn try_submit(&self, incident: Incident) -> Result<(), Option<Incident>> {
        match self.tx.try_send(incident) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(incident)) => Err(Some(incident)),
            Err(TrySendError::Closed(_)) => Err(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct IntakeReceiver {
    rx: mpsc::Receiver<Incident>,
}

impl IntakeReceiver {
    /// Take everything submitted so far without waiting.
    pub fn drain(&mut self) -> Vec<Incident> {
        let mut incidents = Vec::new();
        while let Ok(incident) = self.rx.try_recv() {
            incidents.push(incident);
        }
        incidents
    }
}
