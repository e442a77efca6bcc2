//! In-process collaborators for tests and dry runs.
//!
//! Every implementation records the calls it receives and can be told to
//! fail its next `n` calls, which is how collaborator outages are exercised.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::{
    AlertMuting, CollaboratorError, EscalationNotifier, RemediationStatus, ResolutionOracle,
    TicketRef, Ticketing,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counts down injected failures.
#[derive(Debug, Default)]
struct FailureBudget(AtomicU32);

impl FailureBudget {
    fn arm(&self, n: u32) {
        self.0.store(n, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Oracle that replays scripted answers, falling back to fixed defaults once
/// a script runs dry.
#[derive(Debug)]
pub struct ScriptedOracle {
    impacted: Mutex<VecDeque<bool>>,
    known: Mutex<VecDeque<bool>>,
    remediation: Mutex<VecDeque<RemediationStatus>>,
    default_impacted: bool,
    default_known: bool,
    default_remediation: RemediationStatus,
    assessment_failures: FailureBudget,
    remediation_failures: FailureBudget,
    impacted_calls: AtomicUsize,
    known_calls: AtomicUsize,
    remediation_calls: AtomicUsize,
    remediation_budgets: Mutex<Vec<(Instant, Duration)>>,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedOracle {
    /// Defaults: not impacted, no known fix, remediation never succeeds.
    pub fn new() -> Self {
        Self {
            impacted: Mutex::new(VecDeque::new()),
            known: Mutex::new(VecDeque::new()),
            remediation: Mutex::new(VecDeque::new()),
            default_impacted: false,
            default_known: false,
            default_remediation: RemediationStatus::StillUnresolved,
            assessment_failures: FailureBudget::default(),
            remediation_failures: FailureBudget::default(),
            impacted_calls: AtomicUsize::new(0),
            known_calls: AtomicUsize::new(0),
            remediation_calls: AtomicUsize::new(0),
            remediation_budgets: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that always gives the same answers.
    pub fn fixed(impacted: bool, known: bool, remediation: RemediationStatus) -> Self {
        Self {
            default_impacted: impacted,
            default_known: known,
            default_remediation: remediation,
            ..Self::new()
        }
    }

    /// Queue answers for `is_production_impacted`.
    pub fn impacted(self, answers: impl IntoIterator<Item = bool>) -> Self {
        lock(&self.impacted).extend(answers);
        self
    }

    /// Queue answers for `is_remediation_known`.
    pub fn known(self, answers: impl IntoIterator<Item = bool>) -> Self {
        lock(&self.known).extend(answers);
        self
    }

    /// Queue answers for `attempt_remediation`.
    pub fn remediation(self, answers: impl IntoIterator<Item = RemediationStatus>) -> Self {
        lock(&self.remediation).extend(answers);
        self
    }

    /// Make the next `n` assessment calls fail.
    pub fn fail_assessments(&self, n: u32) {
        self.assessment_failures.arm(n);
    }

    /// Make the next `n` remediation attempts fail.
    pub fn fail_remediation_attempts(&self, n: u32) {
        self.remediation_failures.arm(n);
    }

    pub fn impacted_calls(&self) -> usize {
        self.impacted_calls.load(Ordering::SeqCst)
    }

    pub fn known_calls(&self) -> usize {
        self.known_calls.load(Ordering::SeqCst)
    }

    pub fn remediation_attempts(&self) -> usize {
        self.remediation_calls.load(Ordering::SeqCst)
    }

    /// When each remediation attempt was made and the budget it was handed.
    pub fn remediation_budgets(&self) -> Vec<(Instant, Duration)> {
        lock(&self.remediation_budgets).clone()
    }
}

#[async_trait]
impl ResolutionOracle for ScriptedOracle {
    async fn is_production_impacted(&self) -> Result<bool, CollaboratorError> {
        self.impacted_calls.fetch_add(1, Ordering::SeqCst);
        if self.assessment_failures.take() {
            return Err(CollaboratorError::new("oracle", "monitoring unreachable"));
        }
        Ok(lock(&self.impacted)
            .pop_front()
            .unwrap_or(self.default_impacted))
    }

    async fn is_remediation_known(&self) -> Result<bool, CollaboratorError> {
        self.known_calls.fetch_add(1, Ordering::SeqCst);
        if self.assessment_failures.take() {
            return Err(CollaboratorError::new("oracle", "runbook index unreachable"));
        }
        Ok(lock(&self.known).pop_front().unwrap_or(self.default_known))
    }

    async fn attempt_remediation(
        &self,
        _description: &str,
        budget: Duration,
    ) -> Result<RemediationStatus, CollaboratorError> {
        self.remediation_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.remediation_budgets).push((Instant::now(), budget));
        if self.remediation_failures.take() {
            return Err(CollaboratorError::new("oracle", "remediation runner crashed"));
        }
        Ok(lock(&self.remediation)
            .pop_front()
            .unwrap_or(self.default_remediation))
    }
}

/// Ticket tracker that issues sequential `<prefix>-<n>` references.
#[derive(Debug)]
pub struct RecordingTicketing {
    prefix: String,
    issued: Mutex<Vec<(TicketRef, String)>>,
    failures: FailureBudget,
}

impl Default for RecordingTicketing {
    fn default() -> Self {
        Self::new("devops")
    }
}

impl RecordingTicketing {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: Mutex::new(Vec::new()),
            failures: FailureBudget::default(),
        }
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.arm(n);
    }

    /// `(ticket, description)` pairs in creation order.
    pub fn issued(&self) -> Vec<(TicketRef, String)> {
        lock(&self.issued).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.issued).len()
    }
}

#[async_trait]
impl Ticketing for RecordingTicketing {
    async fn create_ticket(&self, description: &str) -> Result<TicketRef, CollaboratorError> {
        if self.failures.take() {
            return Err(CollaboratorError::new("ticketing", "tracker returned 503"));
        }
        let mut issued = lock(&self.issued);
        let ticket = TicketRef::new(format!("{}-{}", self.prefix, issued.len() + 1));
        issued.push((ticket.clone(), description.to_string()));
        Ok(ticket)
    }
}

/// Muting backend that records every silence call it receives.
#[derive(Debug, Default)]
pub struct RecordingMuting {
    silenced: Mutex<Vec<String>>,
    failures: FailureBudget,
}

impl RecordingMuting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.arm(n);
    }

    pub fn silenced(&self) -> Vec<String> {
        lock(&self.silenced).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.silenced).len()
    }
}

#[async_trait]
impl AlertMuting for RecordingMuting {
    async fn silence(&self, incident_id: &str) -> Result<(), CollaboratorError> {
        if self.failures.take() {
            return Err(CollaboratorError::new("muting", "paging API timed out"));
        }
        lock(&self.silenced).push(incident_id.to_string());
        Ok(())
    }
}

/// Notifier that records every notification it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failures: FailureBudget,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.arm(n);
    }

    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl EscalationNotifier for RecordingNotifier {
    async fn notify(&self, description: &str) -> Result<(), CollaboratorError> {
        if self.failures.take() {
            return Err(CollaboratorError::new("notifier", "chat webhook rejected"));
        }
        lock(&self.sent).push(description.to_string());
        Ok(())
    }
}
