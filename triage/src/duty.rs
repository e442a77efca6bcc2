//! Duty Clock: gates triage to working days and working hours.

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::Serialize;

use crate::error::{TriageError, TriageResult};

/// Working days plus a half-open `[start, end)` range of local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutyWindow {
    pub working_days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for DutyWindow {
    /// Monday to Friday, 09:00 to 18:00.
    fn default() -> Self {
        Self {
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl DutyWindow {
    pub fn new(working_days: Vec<Weekday>, start: NaiveTime, end: NaiveTime) -> TriageResult<Self> {
        if start >= end {
            return Err(TriageError::Config(format!(
                "duty window start {start} must be before end {end}"
            )));
        }
        if working_days.is_empty() {
            return Err(TriageError::Config("duty window has no working days".into()));
        }
        Ok(Self {
            working_days,
            start,
            end,
        })
    }

    pub fn is_working_day(&self, day: Weekday) -> bool {
        self.working_days.contains(&day)
    }

    /// Start inclusive, end exclusive, at minute resolution.
    pub fn is_working_hours(&self, time: NaiveTime) -> bool {
        let minute = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
        minute >= self.start && minute < self.end
    }
}

/// Reads local wall-clock time and checks it against a [`DutyWindow`].
#[derive(Debug, Clone, Default)]
pub struct DutyClock {
    window: DutyWindow,
}

impl DutyClock {
    pub fn new(window: DutyWindow) -> Self {
        Self { window }
    }

    /// Current local wall-clock time.
    pub fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    pub fn is_duty_active(&self, now: NaiveDateTime) -> bool {
        self.window.is_working_day(now.weekday()) && self.window.is_working_hours(now.time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-05-15 was a Wednesday, 2024-05-18 a Saturday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_weekend_is_off_duty() {
        let clock = DutyClock::default();
        assert!(!clock.is_duty_active(at(18, 10, 0)));
        assert!(!clock.is_duty_active(at(19, 12, 0)));
    }

    #[test]
    fn test_window_boundaries() {
        let clock = DutyClock::default();
        assert!(clock.is_duty_active(at(15, 9, 0)));
        assert!(clock.is_duty_active(at(15, 17, 59)));
        assert!(!clock.is_duty_active(at(15, 18, 0)));
        assert!(!clock.is_duty_active(at(15, 8, 59)));
    }

    #[test]
    fn test_seconds_do_not_leak_past_end() {
        let clock = DutyClock::default();
        let late = NaiveDate::from_ymd_opt(2024, 5, 15)
            .unwrap()
            .and_hms_opt(17, 59, 59)
            .unwrap();
        assert!(clock.is_duty_active(late));
    }

    #[test]
    fn test_invalid_window_rejected() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert!(DutyWindow::new(vec![Weekday::Mon], nine, eight).is_err());
        assert!(DutyWindow::new(vec![], eight, nine).is_err());
    }

    #[test]
    fn test_custom_window() {
        let window = DutyWindow::new(
            vec![Weekday::Sat],
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        )
        .unwrap();
        let clock = DutyClock::new(window);
        assert!(clock.is_duty_active(at(18, 10, 0)));
        assert!(!clock.is_duty_active(at(15, 10, 0)));
    }
}
