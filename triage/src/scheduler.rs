//! Triage Scheduler: priority arbitration across channel queues.
//!
//! Owns the four channel queues and the escalation flag. Each tick:
//!
//! 1. moves intake submissions into their queues (duplicates rejected);
//! 2. if on duty, acts on the first non-empty queue in priority order,
//!    and only that queue; if every queue is empty, runs one bounded
//!    planned-task unit instead;
//! 3. drains the pending escalation notice (on or off duty).
//!
//! [`TriageScheduler::run`] then sleeps one tick interval and repeats until
//! the cancellation token fires. Nothing that happens to an incident ends
//! the loop.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::collaborators::Collaborators;
use crate::config::TriageConfig;
use crate::duty::DutyClock;
use crate::error::TriageResult;
use crate::escalation::EscalationFlag;
use crate::incident::{Channel, Incident};
use crate::intake::IntakeReceiver;
use crate::planned::{IdleMaintenance, PlannedTask};
use crate::queue::ChannelQueue;
use crate::resolver::{IncidentResolver, ResolutionOutcome};

/// What the scheduler did with the queues on one tick.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TickAction {
    /// Outside the duty window; queues untouched.
    OffDuty,
    /// Every queue was empty.
    PlannedTask { task: String, completed: bool },
    /// One incident driven to a terminal outcome and removed.
    Serviced {
        channel: Channel,
        outcome: ResolutionOutcome,
    },
    /// More than one incident queued: all escalated, queue drained.
    Flood {
        channel: Channel,
        outcomes: Vec<ResolutionOutcome>,
    },
    /// A collaborator failed; the incident stays at the head of its queue.
    Deferred {
        channel: Channel,
        incident_id: String,
        error: String,
    },
    /// Remediation was cancelled; the incident stays at the head, `Resolving`.
    Interrupted {
        channel: Channel,
        outcome: ResolutionOutcome,
    },
}

impl TickAction {
    /// Channel whose queue was acted on, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::OffDuty | Self::PlannedTask { .. } => None,
            Self::Serviced { channel, .. }
            | Self::Flood { channel, .. }
            | Self::Deferred { channel, .. }
            | Self::Interrupted { channel, .. } => Some(*channel),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueDepth {
    pub channel: Channel,
    pub depth: usize,
}

/// Summary of one tick, suitable for structured logging.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub at: NaiveDateTime,
    pub on_duty: bool,
    pub intake_accepted: usize,
    pub intake_rejected: usize,
    pub action: TickAction,
    pub escalation_notified: bool,
    /// Depths after the tick, in priority order.
    pub queue_depths: Vec<QueueDepth>,
}

pub struct TriageScheduler {
    queues: [ChannelQueue; 4],
    resolver: IncidentResolver,
    flag: EscalationFlag,
    clock: DutyClock,
    planned: Arc<dyn PlannedTask>,
    intake: Option<IntakeReceiver>,
    tick_interval: Duration,
    planned_budget: Duration,
    settle_pause: Duration,
    ticks: u64,
    cancel: CancellationToken,
}

impl TriageScheduler {
    pub fn new(collaborators: Collaborators, config: &TriageConfig) -> TriageResult<Self> {
        config.validate()?;
        Ok(Self {
            queues: Channel::PRIORITY_ORDER.map(ChannelQueue::new),
            resolver: IncidentResolver::new(collaborators, config.remediation_policy()),
            flag: EscalationFlag::new(),
            clock: DutyClock::new(config.duty_window.to_window()?),
            planned: Arc::new(IdleMaintenance),
            intake: None,
            tick_interval: config.tick_interval(),
            planned_budget: config.planned_task_budget(),
            settle_pause: config.settle_pause(),
            ticks: 0,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_planned_task(mut self, task: Arc<dyn PlannedTask>) -> Self {
        self.planned = task;
        self
    }

    pub fn with_intake(mut self, intake: IntakeReceiver) -> Self {
        self.intake = Some(intake);
        self
    }

    pub fn with_clock(mut self, clock: DutyClock) -> Self {
        self.clock = clock;
        self
    }

    /// Token that stops [`Self::run`] and abandons any remediation in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Enqueue directly (the scheduler task itself, or before `run`).
    pub fn submit(&mut self, incident: Incident) -> TriageResult<()> {
        let channel = incident.channel;
        self.queue_mut(channel).enqueue(incident)?;
        debug!(channel = %channel, depth = self.queue(channel).len(), "Incident queued");
        Ok(())
    }

    pub fn queue(&self, channel: Channel) -> &ChannelQueue {
        &self.queues[channel.priority()]
    }

    fn queue_mut(&mut self, channel: Channel) -> &mut ChannelQueue {
        &mut self.queues[channel.priority()]
    }

    pub fn pending(&self) -> usize {
        self.queues.iter().map(ChannelQueue::len).sum()
    }

    pub fn escalation(&self) -> &EscalationFlag {
        &self.flag
    }

    pub fn escalation_mut(&mut self) -> &mut EscalationFlag {
        &mut self.flag
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run ticks until the shutdown token fires.
    pub async fn run(&mut self) {
        info!(
            tick_secs = self.tick_interval.as_secs(),
            "Duty period started"
        );

        while !self.cancel.is_cancelled() {
            let now = self.clock.now();
            let report = self.tick(now).await;
            match serde_json::to_string(&report) {
                Ok(json) => debug!(report = %json, "Tick report"),
                Err(e) => debug!(error = %e, "Tick report not serializable"),
            }

            if !self.pause(self.tick_interval).await {
                break;
            }
        }

        info!(ticks = self.ticks, pending = self.pending(), "Duty period ended");
    }

    /// One scheduler tick at wall-clock time `now`.
    pub async fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        self.ticks += 1;
        let span = info_span!("tick", n = self.ticks);
        async move {
            let (intake_accepted, intake_rejected) = self.drain_intake();
            let on_duty = self.clock.is_duty_active(now);

            let action = if on_duty {
                let action = self.service_queues().await;
                if let Some(channel) = action.channel() {
                    info!(
                        channel = %channel,
                        "Handled {}. Skipping lower priority tasks",
                        channel.label()
                    );
                }
                self.pause(self.settle_pause).await;
                action
            } else {
                info!("Outside working hours");
                TickAction::OffDuty
            };

            let notifier = self.resolver.collaborators().notifier.clone();
            let escalation_notified = match self.flag.drain_notice(notifier.as_ref()).await {
                Ok(sent) => sent,
                Err(e) => {
                    warn!(error = %e, "Escalation notice deferred to next tick");
                    false
                }
            };

            TickReport {
                tick: self.ticks,
                at: now,
                on_duty,
                intake_accepted,
                intake_rejected,
                action,
                escalation_notified,
                queue_depths: self
                    .queues
                    .iter()
                    .map(|q| QueueDepth {
                        channel: q.channel(),
                        depth: q.len(),
                    })
                    .collect(),
            }
        }
        .instrument(span)
        .await
    }

    fn drain_intake(&mut self) -> (usize, usize) {
        let Some(intake) = self.intake.as_mut() else {
            return (0, 0);
        };
        let submitted = intake.drain();

        let (mut accepted, mut rejected) = (0, 0);
        for incident in submitted {
            match self.submit(incident) {
                Ok(()) => accepted += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "Rejected incoming incident");
                }
            }
        }
        (accepted, rejected)
    }

    async fn service_queues(&mut self) -> TickAction {
        let Some(idx) = self.queues.iter().position(|q| !q.is_empty()) else {
            return self.run_planned_task().await;
        };
        let channel = self.queues[idx].channel();

        if self.queues[idx].len() > 1 {
            let mut drained = self.queues[idx].drain_all();
            let outcomes = self.resolver.resolve_flood(&mut drained, &mut self.flag);
            return TickAction::Flood { channel, outcomes };
        }

        let Some(incident) = self.queues[idx].head_mut() else {
            return self.run_planned_task().await;
        };
        let incident_id = incident.id.clone();

        let result = self
            .resolver
            .resolve(incident, &mut self.flag, &self.cancel)
            .await;
        match result {
            Ok(outcome) if outcome.is_terminal() => {
                self.queues[idx].remove_head();
                TickAction::Serviced { channel, outcome }
            }
            Ok(outcome) => TickAction::Interrupted { channel, outcome },
            Err(e) => {
                warn!(
                    incident = %incident_id,
                    channel = %channel,
                    error = %e,
                    "Incident left queued; will retry next tick"
                );
                TickAction::Deferred {
                    channel,
                    incident_id,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn run_planned_task(&self) -> TickAction {
        let task = self.planned.name().to_string();
        info!(task = %task, secs = self.planned_budget.as_secs(), "Starting planned task");

        let unit = tokio::time::timeout(self.planned_budget, self.planned.run_unit(self.planned_budget));
        let completed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!(task = %task, "Planned task interrupted by shutdown");
                false
            }
            result = unit => match result {
                Ok(Ok(())) => {
                    info!(task = %task, "Planned task completed");
                    true
                }
                Ok(Err(e)) => {
                    warn!(task = %task, error = %e, "Planned task failed");
                    false
                }
                Err(_) => {
                    warn!(task = %task, "Planned task exceeded its budget");
                    false
                }
            }
        };

        TickAction::PlannedTask { task, completed }
    }

    /// Sleep unless shut down first. Returns `false` on shutdown.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
