//! Active-time window settings

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// When a session is allowed to be logged on, in UTC
///
/// Without days the window repeats daily from `start_time` to `end_time`.
/// With both days set it is weekly, from `start_day start_time` to
/// `end_day end_time`. A window whose end precedes its start wraps past
/// midnight (or the end of the week).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_day: Option<Weekday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_day: Option<Weekday>,
}

impl ScheduleSettings {
    pub fn daily(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            start_time,
            end_time,
            start_day: None,
            end_day: None,
        }
    }

    pub fn weekly(start_day: Weekday, start_time: NaiveTime, end_day: Weekday, end_time: NaiveTime) -> Self {
        Self {
            start_time,
            end_time,
            start_day: Some(start_day),
            end_day: Some(end_day),
        }
    }

    pub fn is_weekly(&self) -> bool {
        self.start_day.is_some()
    }

    /// Reason the window is unusable, if any.
    pub fn check(&self) -> Result<(), &'static str> {
        match (self.start_day, self.end_day) {
            (Some(_), None) | (None, Some(_)) => Err("start_day and end_day must be set together"),
            (None, None) if self.start_time == self.end_time => {
                Err("daily window must not start and end at the same time")
            }
            _ => Ok(()),
        }
    }
}
