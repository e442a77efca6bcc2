//! Triage configuration: TOML file, then environment overrides, then validation.
//!
//! ```toml
//! tick_secs = 60
//! remediation_budget_secs = 900
//! remediation_poll_secs = 60
//! planned_task_secs = 10
//! settle_secs = 5
//! intake_capacity = 256
//!
//! [duty_window]
//! working_days = ["mon", "tue", "wed", "thu", "fri"]
//! start = "09:00"
//! end = "18:00"
//! ```

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::duty::DutyWindow;
use crate::error::{TriageError, TriageResult};
use crate::resolver::RemediationPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Sleep between scheduler ticks.
    pub tick_secs: u64,
    /// Time budget for one remediation run.
    pub remediation_budget_secs: u64,
    /// Interval between remediation polls.
    pub remediation_poll_secs: u64,
    /// Upper bound on one planned-task unit.
    pub planned_task_secs: u64,
    /// Pause after servicing a queue before draining escalations.
    pub settle_secs: u64,
    /// Bounded intake buffer size.
    pub intake_capacity: usize,
    pub duty_window: DutyWindowConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            remediation_budget_secs: 15 * 60,
            remediation_poll_secs: 60,
            planned_task_secs: 10,
            settle_secs: 5,
            intake_capacity: 256,
            duty_window: DutyWindowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DutyWindowConfig {
    /// Weekday names or abbreviations, case-insensitive.
    pub working_days: Vec<String>,
    /// `HH:MM`, inclusive.
    pub start: String,
    /// `HH:MM`, exclusive.
    pub end: String,
}

impl Default for DutyWindowConfig {
    fn default() -> Self {
        Self {
            working_days: ["mon", "tue", "wed", "thu", "fri"]
                .into_iter()
                .map(String::from)
                .collect(),
            start: "09:00".into(),
            end: "18:00".into(),
        }
    }
}

impl DutyWindowConfig {
    pub fn to_window(&self) -> TriageResult<DutyWindow> {
        let days = self
            .working_days
            .iter()
            .map(|d| {
                d.parse::<Weekday>()
                    .map_err(|_| TriageError::Config(format!("unknown weekday {d:?}")))
            })
            .collect::<TriageResult<Vec<_>>>()?;
        DutyWindow::new(days, parse_time(&self.start)?, parse_time(&self.end)?)
    }
}

fn parse_time(s: &str) -> TriageResult<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| TriageError::Config(format!("invalid time {s:?}: {e}")))
}

impl TriageConfig {
    /// Load from a TOML file, apply `TRIAGE_*` environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse triage config TOML")
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|var| std::env::var(var).ok());
    }

    /// Apply overrides from any variable source. Unset, unparsable or zero
    /// values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let secs = |var: &str, current: u64| -> u64 {
            lookup(var)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(current)
        };

        self.tick_secs = secs("TRIAGE_TICK_SECS", self.tick_secs);
        self.remediation_budget_secs =
            secs("TRIAGE_REMEDIATION_BUDGET_SECS", self.remediation_budget_secs);
        self.remediation_poll_secs =
            secs("TRIAGE_REMEDIATION_POLL_SECS", self.remediation_poll_secs);
        self.planned_task_secs = secs("TRIAGE_PLANNED_TASK_SECS", self.planned_task_secs);
        self.settle_secs = secs("TRIAGE_SETTLE_SECS", self.settle_secs);
    }

    pub fn validate(&self) -> TriageResult<()> {
        if self.tick_secs == 0 {
            return Err(TriageError::Config("tick_secs must be > 0".into()));
        }
        if self.remediation_poll_secs == 0 {
            return Err(TriageError::Config("remediation_poll_secs must be > 0".into()));
        }
        if self.remediation_budget_secs < self.remediation_poll_secs {
            return Err(TriageError::Config(format!(
                "remediation_budget_secs ({}) must cover at least one poll ({}s)",
                self.remediation_budget_secs, self.remediation_poll_secs
            )));
        }
        if self.intake_capacity == 0 {
            return Err(TriageError::Config("intake_capacity must be > 0".into()));
        }
        self.duty_window.to_window()?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn planned_task_budget(&self) -> Duration {
        Duration::from_secs(self.planned_task_secs)
    }

    pub fn settle_pause(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn remediation_policy(&self) -> RemediationPolicy {
        RemediationPolicy::new(
            Duration::from_secs(self.remediation_budget_secs),
            Duration::from_secs(self.remediation_poll_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_validates() {
        let config = TriageConfig::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.remediation_policy(), RemediationPolicy::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.duty_window.to_window().unwrap(), DutyWindow::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TriageConfig = toml::from_str(
            r#"
tick_secs = 30

[duty_window]
start = "08:30"
"#,
        )
        .unwrap();
        assert_eq!(config.tick_secs, 30);
        assert_eq!(config.remediation_budget_secs, 900);
        assert_eq!(config.duty_window.start, "08:30");
        assert_eq!(config.duty_window.end, "18:00");
        assert_eq!(config.duty_window.working_days.len(), 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "remediation_budget_secs = 120\nremediation_poll_secs = 30\n\n[duty_window]\nworking_days = [\"Saturday\", \"sun\"]"
        )
        .unwrap();

        let config = TriageConfig::from_file(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.remediation_policy().max_attempts(), 4);
        let window = config.duty_window.to_window().unwrap();
        assert_eq!(window.working_days, vec![Weekday::Sat, Weekday::Sun]);
    }

    #[test]
    fn test_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("TRIAGE_TICK_SECS", "5"),
            ("TRIAGE_SETTLE_SECS", "0"),
            ("TRIAGE_PLANNED_TASK_SECS", "soon"),
        ]
        .into_iter()
        .collect();

        let mut config = TriageConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.tick_secs, 5);
        assert_eq!(config.settle_secs, 5);
        assert_eq!(config.planned_task_secs, 10);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let bad_budget = TriageConfig {
            remediation_budget_secs: 10,
            ..Default::default()
        };
        assert!(bad_budget.validate().is_err());

        let mut bad_day = TriageConfig::default();
        bad_day.duty_window.working_days = vec!["funday".into()];
        assert!(bad_day.validate().is_err());

        let mut bad_time = TriageConfig::default();
        bad_time.duty_window.end = "6pm".into();
        assert!(bad_time.validate().is_err());
    }
}
