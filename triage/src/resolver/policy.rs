//! Remediation retry policy: a fixed time budget polled at a fixed interval.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationPolicy {
    /// Total time allowed for one remediation run.
    pub budget: Duration,
    /// Wait before each remediation poll.
    pub poll_interval: Duration,
}

impl Default for RemediationPolicy {
    /// 15 minutes, polled once a minute.
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(15 * 60),
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl RemediationPolicy {
    pub fn new(budget: Duration, poll_interval: Duration) -> Self {
        Self {
            budget,
            poll_interval,
        }
    }

    /// Number of polls that fit in the budget (a partial interval counts).
    /// Always at least one.
    pub fn max_attempts(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let attempts = self.budget.as_millis().div_ceil(interval);
        attempts.clamp(1, u32::MAX as u128) as u32
    }

    /// Budget left once `attempts` polls have elapsed.
    pub fn remaining_after(&self, attempts: u32) -> Duration {
        self.budget
            .saturating_sub(self.poll_interval.saturating_mul(attempts))
    }
}
