//! Simulated collaborators for running the duty cycle without real
//! monitoring, ticketing or paging systems behind it.

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use triage::{
    AlertMuting, CollaboratorError, Collaborators, EscalationNotifier, RemediationStatus,
    ResolutionOracle, TicketRef, Ticketing,
};

/// Answer probabilities for [`RandomOracle`].
#[derive(Debug, Clone, Copy)]
pub struct OracleOdds {
    pub impacted: f64,
    pub known: f64,
    pub remediation_success: f64,
}

impl Default for OracleOdds {
    fn default() -> Self {
        Self {
            impacted: 0.3,
            known: 0.5,
            remediation_success: 0.7,
        }
    }
}

/// Coin-flip oracle. Seeded runs are reproducible.
pub struct RandomOracle {
    rng: Mutex<StdRng>,
    odds: OracleOdds,
}

impl RandomOracle {
    pub fn new(seed: Option<u64>, odds: OracleOdds) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
            odds,
        }
    }

    fn flip(&self, p: f64) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_bool(p.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl ResolutionOracle for RandomOracle {
    async fn is_production_impacted(&self) -> Result<bool, CollaboratorError> {
        Ok(self.flip(self.odds.impacted))
    }

    async fn is_remediation_known(&self) -> Result<bool, CollaboratorError> {
        Ok(self.flip(self.odds.known))
    }

    async fn attempt_remediation(
        &self,
        description: &str,
        budget: Duration,
    ) -> Result<RemediationStatus, CollaboratorError> {
        info!(issue = %description, remaining_secs = budget.as_secs(), "Running remediation step");
        if self.flip(self.odds.remediation_success) {
            Ok(RemediationStatus::Resolved)
        } else {
            Ok(RemediationStatus::StillUnresolved)
        }
    }
}

/// Issues sequential `devops-<n>` references.
#[derive(Debug, Default)]
pub struct LogTicketing {
    next: AtomicU64,
}

#[async_trait]
impl Ticketing for LogTicketing {
    async fn create_ticket(&self, description: &str) -> Result<TicketRef, CollaboratorError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let ticket = TicketRef::new(format!("devops-{n}"));
        info!(ticket = %ticket, issue = %description, "Created ticket");
        Ok(ticket)
    }
}

#[derive(Debug, Default)]
pub struct LogMuting;

#[async_trait]
impl AlertMuting for LogMuting {
    async fn silence(&self, incident_id: &str) -> Result<(), CollaboratorError> {
        info!(incident = %incident_id, "Alert silenced");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl EscalationNotifier for LogNotifier {
    async fn notify(&self, description: &str) -> Result<(), CollaboratorError> {
        info!(notice = %description, "Escalation sent");
        Ok(())
    }
}

pub fn simulated(seed: Option<u64>) -> Collaborators {
    Collaborators::new(
        Arc::new(RandomOracle::new(seed, OracleOdds::default())),
        Arc::new(LogTicketing::default()),
        Arc::new(LogMuting),
        Arc::new(LogNotifier),
    )
}
