//! Session Schedule
//!
//! Turns [`ScheduleSettings`] into window arithmetic. A session is "in
//! session time" while inside a window; two instants belong to the same
//! session when they fall into the same window occurrence. Window ends are
//! inclusive. Without settings the session never closes.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc};
use fix_config::ScheduleSettings;

const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 7 * DAY_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Daily { start: NaiveTime, length: Duration },
    /// `start` is the offset from Monday 00:00
    Weekly { start: Duration, length: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSchedule {
    window: Option<Window>,
}

fn secs_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

/// Positive span from `start` to `end`, wrapping by `period` seconds.
fn wrapped_length(start: i64, end: i64, period: i64) -> Duration {
    let mut length = end - start;
    if length <= 0 {
        length += period;
    }
    Duration::seconds(length)
}

impl SessionSchedule {
    pub fn new(settings: Option<ScheduleSettings>) -> Self {
        let window = settings.map(|s| match (s.start_day, s.end_day) {
            (Some(start_day), Some(end_day)) => {
                let start = i64::from(start_day.num_days_from_monday()) * DAY_SECS + secs_of(s.start_time);
                let end = i64::from(end_day.num_days_from_monday()) * DAY_SECS + secs_of(s.end_time);
                Window::Weekly {
                    start: Duration::seconds(start),
                    length: wrapped_length(start, end, WEEK_SECS),
                }
            }
            _ => Window::Daily {
                start: s.start_time,
                length: wrapped_length(secs_of(s.start_time), secs_of(s.end_time), DAY_SECS),
            },
        });
        Self { window }
    }

    pub fn non_stop() -> Self {
        Self { window: None }
    }

    pub fn is_non_stop(&self) -> bool {
        self.window.is_none()
    }

    /// Start of the window occurrence containing `at`, if any.
    pub fn period_start(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let (start, length) = match self.window? {
            Window::Daily { start, length } => {
                let mut candidate = at.date_naive().and_time(start).and_utc();
                if candidate > at {
                    candidate -= Duration::days(1);
                }
                (candidate, length)
            }
            Window::Weekly { start, length } => {
                let monday = at.date_naive() - Duration::days(i64::from(at.weekday().num_days_from_monday()));
                let mut candidate = monday.and_time(NaiveTime::MIN).and_utc() + start;
                if candidate > at {
                    candidate -= Duration::weeks(1);
                }
                (candidate, length)
            }
        };
        (at <= start + length).then_some(start)
    }

    pub fn is_session_time(&self, at: DateTime<Utc>) -> bool {
        self.window.is_none() || self.period_start(at).is_some()
    }

    /// Whether `a` and `b` fall into the same window occurrence.
    pub fn is_same_session(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        if self.window.is_none() {
            return true;
        }
        match (self.period_start(a), self.period_start(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

impl Default for SessionSchedule {
    fn default() -> Self {
        Self::non_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2024-03-04 is a Monday
    fn utc(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, h, m, 0).unwrap()
    }

    #[test]
    fn test_daily_window() {
        let schedule = SessionSchedule::new(Some(ScheduleSettings::daily(t(8, 0), t(17, 0))));
        assert!(!schedule.is_session_time(utc(4, 7, 59)));
        assert!(schedule.is_session_time(utc(4, 8, 0)));
        assert!(schedule.is_session_time(utc(4, 17, 0)));
        assert!(!schedule.is_session_time(utc(4, 17, 1)));

        assert!(schedule.is_same_session(utc(4, 9, 0), utc(4, 16, 0)));
        assert!(!schedule.is_same_session(utc(4, 9, 0), utc(5, 9, 0)));
        assert!(!schedule.is_same_session(utc(4, 9, 0), utc(4, 18, 0)));
    }

    #[test]
    fn test_daily_window_wraps_midnight() {
        let schedule = SessionSchedule::new(Some(ScheduleSettings::daily(t(22, 0), t(6, 0))));
        assert!(schedule.is_session_time(utc(4, 23, 0)));
        assert!(schedule.is_session_time(utc(5, 5, 0)));
        assert!(!schedule.is_session_time(utc(5, 12, 0)));
        assert!(schedule.is_same_session(utc(4, 23, 0), utc(5, 5, 0)));
        assert_eq!(schedule.period_start(utc(5, 5, 0)), Some(utc(4, 22, 0)));
    }

    #[test]
    fn test_weekly_window() {
        let settings = ScheduleSettings::weekly(Weekday::Sun, t(18, 0), Weekday::Fri, t(17, 0));
        let schedule = SessionSchedule::new(Some(settings));
        // Sunday 2024-03-03 18:00 opens the week
        assert!(schedule.is_session_time(utc(4, 3, 0)));
        assert!(schedule.is_session_time(utc(8, 16, 59)));
        assert!(!schedule.is_session_time(utc(8, 17, 30)));
        assert!(!schedule.is_session_time(utc(9, 12, 0)));
        assert!(schedule.is_session_time(utc(10, 18, 0)));

        assert!(schedule.is_same_session(utc(4, 1, 0), utc(7, 23, 0)));
        assert!(!schedule.is_same_session(utc(7, 23, 0), utc(11, 1, 0)));
    }

    #[test]
    fn test_non_stop() {
        let schedule = SessionSchedule::non_stop();
        assert!(schedule.is_session_time(utc(9, 3, 0)));
        assert!(schedule.is_same_session(utc(1, 0, 0), utc(30, 0, 0)));
        assert_eq!(schedule.period_start(utc(9, 3, 0)), None);
    }
}
