//! Planned Task: bounded background maintenance for idle ticks.

use async_trait::async_trait;
use std::time::Duration;

use crate::collaborators::CollaboratorError;

/// One unit of maintenance work the scheduler runs when every queue is empty.
///
/// The scheduler enforces `budget` with a timeout; implementations should
/// still aim to finish within it.
#[async_trait]
pub trait PlannedTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run_unit(&self, budget: Duration) -> Result<(), CollaboratorError>;
}

/// Spends the whole budget doing nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleMaintenance;

#[async_trait]
impl PlannedTask for IdleMaintenance {
    fn name(&self) -> &str {
        "idle_maintenance"
    }

    async fn run_unit(&self, budget: Duration) -> Result<(), CollaboratorError> {
        tokio::time::sleep(budget).await;
        Ok(())
    }
}
