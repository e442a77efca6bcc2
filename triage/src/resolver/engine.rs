//! Incident Resolver: drives one incident to a terminal outcome.
//!
//! Branches on a fresh [`Assessment`] every time it is entered:
//!
//! ```text
//! impacted & known   → silence → remediate (budget × poll)
//!                         ├─ resolved            → ticket → Resolved
//!                         └─ timed out, impacted → Escalated
//!                            timed out, recovered → ticket → Ticketed
//! not impacted       → ticket → silence → Ticketed
//! impacted & unknown → silence → Escalated
//! ```
//!
//! The incident's status only moves when the side effects for that step have
//! succeeded. A collaborator failure leaves it where it was before the failing
//! call; the scheduler keeps it queued and retries on the next tick.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::RemediationPolicy;
use super::state::{ResolutionPhase, ResolutionTrace};
use crate::collaborators::{
    CollaboratorError, Collaborators, RemediationStatus, ResolutionOracle, TicketRef,
};
use crate::error::TriageResult;
use crate::escalation::EscalationFlag;
use crate::incident::{Channel, Incident, IncidentStatus};

/// Oracle answers for one resolver decision. Never stored beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub production_impacted: bool,
    pub remediation_known: bool,
}

impl Assessment {
    pub async fn gather(oracle: &dyn ResolutionOracle) -> Result<Self, CollaboratorError> {
        let production_impacted = oracle.is_production_impacted().await?;
        let remediation_known = oracle.is_remediation_known().await?;
        Ok(Self {
            production_impacted,
            remediation_known,
        })
    }
}

/// How a remediation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RemediationOutcome {
    Resolved { attempts: u32 },
    /// Budget exhausted without resolution.
    TimedOut { attempts: u32 },
    /// Abandoned because the cancellation token fired.
    Cancelled { attempts: u32 },
}

/// What one resolver invocation did to one incident.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    pub incident_id: String,
    pub channel: Channel,
    /// Status after the run. Non-terminal only when remediation was cancelled.
    pub status: IncidentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<TicketRef>,
    /// Whether this run raised the escalation flag (false if it was already up).
    pub raised_escalation: bool,
    pub trace: ResolutionTrace,
}

impl ResolutionOutcome {
    fn new(incident: &Incident, trace: ResolutionTrace) -> Self {
        Self {
            incident_id: incident.id.clone(),
            channel: incident.channel,
            status: incident.status,
            assessment: None,
            remediation: None,
            ticket_ref: incident.ticket_ref.clone(),
            raised_escalation: false,
            trace,
        }
    }

    fn finish(mut self, incident: &Incident) -> Self {
        self.status = incident.status;
        self.ticket_ref = incident.ticket_ref.clone();
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

pub struct IncidentResolver {
    collaborators: Collaborators,
    policy: RemediationPolicy,
}

impl IncidentResolver {
    pub fn new(collaborators: Collaborators, policy: RemediationPolicy) -> Self {
        Self {
            collaborators,
            policy,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Run the state machine for a single incident.
    ///
    /// Returns an error only for collaborator failures (and transition-guard
    /// bugs); in that case the incident's status is whatever it was before the
    /// failing call and it should stay queued.
    pub async fn resolve(
        &self,
        incident: &mut Incident,
        flag: &mut EscalationFlag,
        cancel: &CancellationToken,
    ) -> TriageResult<ResolutionOutcome> {
        let mut trace = ResolutionTrace::new(&incident.id);

        if incident.is_terminal() {
            info!(
                incident = %incident.id,
                status = %incident.status,
                "Incident already terminal; removing without further action"
            );
            return Ok(ResolutionOutcome::new(incident, trace));
        }

        info!(
            incident = %incident.id,
            name = %incident.description,
            kind = incident.channel.label(),
            "Starting incident"
        );

        let assessment = Assessment::gather(self.collaborators.oracle.as_ref()).await?;
        info!(
            incident = %incident.id,
            production_impacted = assessment.production_impacted,
            remediation_known = assessment.remediation_known,
            "Assessment"
        );

        match (assessment.production_impacted, assessment.remediation_known) {
            (true, true) => {
                trace.advance(ResolutionPhase::Remediating, Some("impacted, remediation known"))?;
                self.silence(incident).await?;
                incident.status = IncidentStatus::Resolving;

                let remediation = self.remediate(incident, cancel).await?;
                let mut outcome = ResolutionOutcome::new(incident, trace);
                outcome.assessment = Some(assessment);
                outcome.remediation = Some(remediation);

                match remediation {
                    RemediationOutcome::Resolved { .. } => {
                        outcome
                            .trace
                            .advance(ResolutionPhase::Resolved, Some("remediation succeeded"))?;
                        self.ensure_ticket(incident).await?;
                        incident.status = IncidentStatus::Resolved;
                    }
                    RemediationOutcome::TimedOut { attempts } => {
                        warn!(
                            incident = %incident.id,
                            attempts,
                            budget_secs = self.policy.budget.as_secs(),
                            "Failed to resolve issue within budget"
                        );
                        if self.collaborators.oracle.is_production_impacted().await? {
                            outcome.trace.advance(
                                ResolutionPhase::Escalating,
                                Some("budget exhausted, production still impacted"),
                            )?;
                            outcome.raised_escalation =
                                self.escalate(incident, flag, &mut outcome.trace)?;
                        } else {
                            outcome.trace.advance(
                                ResolutionPhase::Ticketing,
                                Some("budget exhausted, production recovered"),
                            )?;
                            self.ensure_ticket(incident).await?;
                            outcome.trace.advance(ResolutionPhase::Ticketed, None)?;
                            incident.status = IncidentStatus::Ticketed;
                        }
                    }
                    RemediationOutcome::Cancelled { attempts } => {
                        warn!(
                            incident = %incident.id,
                            attempts,
                            "Remediation abandoned on cancellation; incident stays queued"
                        );
                    }
                }
                Ok(outcome.finish(incident))
            }
            (false, _) => {
                trace.advance(ResolutionPhase::Ticketing, Some("production not impacted"))?;
                self.ensure_ticket(incident).await?;
                self.silence(incident).await?;
                trace.advance(ResolutionPhase::Ticketed, None)?;
                incident.status = IncidentStatus::Ticketed;

                let mut outcome = ResolutionOutcome::new(incident, trace);
                outcome.assessment = Some(assessment);
                Ok(outcome.finish(incident))
            }
            (true, false) => {
                trace.advance(ResolutionPhase::Escalating, Some("impacted, no known remediation"))?;
                self.silence(incident).await?;
                let raised = self.escalate(incident, flag, &mut trace)?;

                let mut outcome = ResolutionOutcome::new(incident, trace);
                outcome.assessment = Some(assessment);
                outcome.raised_escalation = raised;
                Ok(outcome.finish(incident))
            }
        }
    }

    /// Flood rule: escalate every incident of an overloaded channel without
    /// assessing any of them. The caller has already drained the queue.
    pub fn resolve_flood(
        &self,
        incidents: &mut [Incident],
        flag: &mut EscalationFlag,
    ) -> Vec<ResolutionOutcome> {
        info!(count = incidents.len(), "Handling multiple incidents");

        let mut outcomes = Vec::with_capacity(incidents.len());
        for incident in incidents.iter_mut() {
            let mut trace = ResolutionTrace::new(&incident.id);
            let mut raised = false;

            if incident.is_terminal() {
                info!(
                    incident = %incident.id,
                    status = %incident.status,
                    "Incident already terminal; dropping with flood"
                );
            } else {
                info!(incident = %incident.id, name = %incident.description, "Escalating incident");
                let escalated = match trace.advance(ResolutionPhase::Escalating, Some("flood")) {
                    Ok(()) => self.escalate(incident, flag, &mut trace),
                    Err(e) => Err(e),
                };
                match escalated {
                    Ok(r) => raised = r,
                    Err(e) => warn!(incident = %incident.id, error = %e, "Flood escalation failed"),
                }
            }

            let mut outcome = ResolutionOutcome::new(incident, trace);
            outcome.raised_escalation = raised;
            outcomes.push(outcome);
        }

        info!("Completed escalation of multiple incidents");
        outcomes
    }

    async fn silence(&self, incident: &mut Incident) -> Result<(), CollaboratorError> {
        if !incident.channel.is_mutable() {
            return Ok(());
        }
        if incident.silenced {
            info!(incident = %incident.id, "Alert is already silenced");
            return Ok(());
        }
        self.collaborators.muting.silence(&incident.id).await?;
        incident.silenced = true;
        info!(incident = %incident.id, "Silenced alert");
        Ok(())
    }

    async fn ensure_ticket(&self, incident: &mut Incident) -> Result<(), CollaboratorError> {
        if let Some(existing) = &incident.ticket_ref {
            debug!(incident = %incident.id, ticket = %existing, "Ticket already exists");
            return Ok(());
        }
        let ticket = self
            .collaborators
            .ticketing
            .create_ticket(&incident.description)
            .await?;
        info!(incident = %incident.id, ticket = %ticket, "Created tracking ticket");
        incident.attach_ticket(ticket);
        Ok(())
    }

    /// Move an incident to `Escalated` and raise the flag. Re-escalating an
    /// already escalated incident does nothing.
    fn escalate(
        &self,
        incident: &mut Incident,
        flag: &mut EscalationFlag,
        trace: &mut ResolutionTrace,
    ) -> TriageResult<bool> {
        if incident.status == IncidentStatus::Escalated {
            info!(incident = %incident.id, "Issue has already been escalated");
            return Ok(false);
        }
        trace.advance(ResolutionPhase::Escalated, None)?;
        incident.status = IncidentStatus::Escalated;
        Ok(flag.escalate(incident))
    }

    async fn remediate(
        &self,
        incident: &Incident,
        cancel: &CancellationToken,
    ) -> Result<RemediationOutcome, CollaboratorError> {
        let max_attempts = self.policy.max_attempts();
        info!(
            incident = %incident.id,
            budget_secs = self.policy.budget.as_secs(),
            max_attempts,
            "Attempting to resolve issue"
        );

        for attempt in 1..=max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(RemediationOutcome::Cancelled { attempts: attempt - 1 });
                }
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }

            let remaining = self.policy.remaining_after(attempt);
            match self
                .collaborators
                .oracle
                .attempt_remediation(&incident.description, remaining)
                .await?
            {
                RemediationStatus::Resolved => {
                    info!(incident = %incident.id, attempt, "Issue resolved");
                    return Ok(RemediationOutcome::Resolved { attempts: attempt });
                }
                RemediationStatus::StillUnresolved => {
                    debug!(incident = %incident.id, attempt, "Issue still unresolved");
                }
            }
        }

        Ok(RemediationOutcome::TimedOut {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::memory::{
        RecordingMuting, RecordingNotifier, RecordingTicketing, ScriptedOracle,
    };
    use crate::collaborators::{MockAlertMuting, MockTicketing};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        oracle: Arc<ScriptedOracle>,
        ticketing: Arc<RecordingTicketing>,
        muting: Arc<RecordingMuting>,
        resolver: IncidentResolver,
    }

    fn fixture(oracle: ScriptedOracle) -> Fixture {
        let oracle = Arc::new(oracle);
        let ticketing = Arc::new(RecordingTicketing::default());
        let muting = Arc::new(RecordingMuting::new());
        let collaborators = Collaborators::new(
            oracle.clone(),
            ticketing.clone(),
            muting.clone(),
            Arc::new(RecordingNotifier::new()),
        );
        Fixture {
            oracle,
            ticketing,
            muting,
            resolver: IncidentResolver::new(collaborators, RemediationPolicy::default()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_known_fix_resolves_and_tickets() {
        let f = fixture(
            ScriptedOracle::new()
                .impacted([true])
                .known([true])
                .remediation([RemediationStatus::Resolved]),
        );
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::PagingAlert, "OG-1", "Service outage detected");

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert_eq!(outcome.status, IncidentStatus::Resolved);
        assert!(incident.silenced);
        assert_eq!(f.ticketing.count(), 1);
        assert_eq!(outcome.ticket_ref, incident.ticket_ref);
        assert_eq!(
            outcome.remediation,
            Some(RemediationOutcome::Resolved { attempts: 1 })
        );
        assert!(!flag.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_while_impacted_escalates() {
        let f = fixture(ScriptedOracle::fixed(
            true,
            true,
            RemediationStatus::StillUnresolved,
        ));
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::FirstLineRequest, "L1-1", "DB connectivity");

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(incident.status, IncidentStatus::Escalated);
        assert_eq!(
            outcome.remediation,
            Some(RemediationOutcome::TimedOut { attempts: 15 })
        );
        assert_eq!(f.oracle.remediation_attempts(), 15);
        assert_eq!(f.ticketing.count(), 0);
        assert!(outcome.raised_escalation);
        assert!(flag.is_pending());
        assert_eq!(
            outcome.trace.path(),
            vec![
                ResolutionPhase::Assessing,
                ResolutionPhase::Remediating,
                ResolutionPhase::Escalating,
                ResolutionPhase::Escalated,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_after_recovery_tickets() {
        let f = fixture(
            ScriptedOracle::new()
                .impacted([true, false])
                .known([true]),
        );
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::ChatAlert, "S-9", "Latency spike");

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, IncidentStatus::Ticketed);
        assert!(incident.ticket_ref.is_some());
        assert!(!flag.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_impacted_tickets_without_remediation() {
        let f = fixture(ScriptedOracle::fixed(
            false,
            true,
            RemediationStatus::Resolved,
        ));
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::PagingAlert, "OG-2", "Disk 80% full");

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, IncidentStatus::Ticketed);
        assert_eq!(f.ticketing.count(), 1);
        assert_eq!(f.muting.silenced(), vec!["OG-2".to_string()]);
        assert_eq!(f.oracle.remediation_attempts(), 0);
        assert!(outcome.remediation.is_none());
    }

    #[tokio::test]
    async fn test_unknown_fix_escalates_without_ticket() {
        let mut ticketing = MockTicketing::new();
        ticketing.expect_create_ticket().times(0);
        let mut muting = MockAlertMuting::new();
        muting.expect_silence().times(1).returning(|_| Ok(()));

        let oracle = Arc::new(ScriptedOracle::fixed(
            true,
            false,
            RemediationStatus::Resolved,
        ));
        let resolver = IncidentResolver::new(
            Collaborators::new(
                oracle.clone(),
                Arc::new(ticketing),
                Arc::new(muting),
                Arc::new(RecordingNotifier::new()),
            ),
            RemediationPolicy::default(),
        );
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::ChatAlert, "S-1", "High memory usage");

        let outcome = resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, IncidentStatus::Escalated);
        assert!(incident.ticket_ref.is_none());
        assert_eq!(oracle.remediation_attempts(), 0);
        assert!(flag.is_pending());
    }

    #[tokio::test]
    async fn test_internal_help_is_never_silenced() {
        let f = fixture(ScriptedOracle::fixed(
            true,
            false,
            RemediationStatus::Resolved,
        ));
        let mut flag = EscalationFlag::new();
        let mut incident =
            Incident::new(Channel::InternalHelpRequest, "D-1", "Deployment assistance");

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, IncidentStatus::Escalated);
        assert_eq!(f.muting.count(), 0);
        assert!(!incident.silenced);
    }

    #[tokio::test]
    async fn test_muting_failure_keeps_status_and_retry_reuses_ticket() {
        let f = fixture(ScriptedOracle::fixed(
            false,
            false,
            RemediationStatus::StillUnresolved,
        ));
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::PagingAlert, "OG-3", "Cert expiring");

        f.muting.fail_next(1);
        let err = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(incident.status, IncidentStatus::Pending);
        assert_eq!(f.ticketing.count(), 1);

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, IncidentStatus::Ticketed);
        assert_eq!(f.ticketing.count(), 1, "ticket must not be created twice");
        assert_eq!(f.muting.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_leaves_incident_resolving() {
        let f = fixture(ScriptedOracle::fixed(
            true,
            true,
            RemediationStatus::StillUnresolved,
        ));
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::PagingAlert, "OG-4", "Queue backlog");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            canceller.cancel();
        });

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &cancel)
            .await
            .unwrap();

        assert_eq!(incident.status, IncidentStatus::Resolving);
        assert!(!outcome.is_terminal());
        assert_eq!(
            outcome.remediation,
            Some(RemediationOutcome::Cancelled { attempts: 2 })
        );
        assert!(!flag.is_pending());
    }

    #[tokio::test]
    async fn test_already_resolved_is_passed_through() {
        let f = fixture(ScriptedOracle::new());
        let mut flag = EscalationFlag::new();
        let mut incident = Incident::new(Channel::PagingAlert, "OG-5", "Flapping check");
        incident.status = IncidentStatus::Resolved;

        let outcome = f
            .resolver
            .resolve(&mut incident, &mut flag, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, IncidentStatus::Resolved);
        assert_eq!(f.oracle.impacted_calls(), 0);
        assert!(outcome.trace.transitions().is_empty());
    }

    #[test]
    fn test_flood_escalates_each_once() {
        let f = fixture(ScriptedOracle::new());
        let mut flag = EscalationFlag::new();
        let mut incidents = vec![
            Incident::new(Channel::ChatAlert, "S-1", "a"),
            Incident::new(Channel::ChatAlert, "S-2", "b"),
            Incident::new(Channel::ChatAlert, "S-3", "c"),
        ];
        incidents[2].status = IncidentStatus::Escalated;

        let outcomes = f.resolver.resolve_flood(&mut incidents, &mut flag);

        assert!(incidents
            .iter()
            .all(|i| i.status == IncidentStatus::Escalated));
        assert_eq!(outcomes.iter().filter(|o| o.raised_escalation).count(), 1);
        assert_eq!(flag.counters(), (1, 1, 0));
        assert_eq!(f.oracle.impacted_calls(), 0);
    }
}
