//! Recurrence schedules.
//!
//! A schedule is either daily at `hh:mm` or weekly on a given weekday at
//! `hh:mm`. Weekdays are numbered 1 (Sunday) through 7 (Saturday).
//!
//! [`Schedule::next_run`] evaluates in the host's local calendar. Advancing to
//! the next occurrence adds calendar days rather than fixed 24h offsets, so the
//! wall-clock time is preserved across daylight-saving transitions.

use std::fmt;

use chrono::{
    DateTime, Datelike, Days, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// A validated, immutable recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schedule(Recurrence);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Recurrence {
    Daily { hour: u8, minute: u8 },
    Weekly { weekday: u8, hour: u8, minute: u8 },
}

impl Recurrence {
    fn validate(&self) -> Result<(), CoreError> {
        let (hour, minute) = match *self {
            Recurrence::Daily { hour, minute } => (hour, minute),
            Recurrence::Weekly {
                weekday,
                hour,
                minute,
            } => {
                check_range("weekday", weekday, 1, 7)?;
                (hour, minute)
            }
        };
        check_range("hour", hour, 0, 23)?;
        check_range("minute", minute, 0, 59)
    }
}

fn check_range(field: &'static str, value: u8, min: u8, max: u8) -> Result<(), CoreError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::InvalidSchedule {
            field,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        })
    }
}

impl Schedule {
    /// Every day at `hour:minute`.
    pub fn daily(hour: u8, minute: u8) -> Result<Self, CoreError> {
        let recurrence = Recurrence::Daily { hour, minute };
        recurrence.validate()?;
        Ok(Self(recurrence))
    }

    /// Every week on `weekday` (1 = Sunday .. 7 = Saturday) at `hour:minute`.
    pub fn weekly(weekday: u8, hour: u8, minute: u8) -> Result<Self, CoreError> {
        let recurrence = Recurrence::Weekly {
            weekday,
            hour,
            minute,
        };
        recurrence.validate()?;
        Ok(Self(recurrence))
    }

    pub fn hour(&self) -> u8 {
        match self.0 {
            Recurrence::Daily { hour, .. } | Recurrence::Weekly { hour, .. } => hour,
        }
    }

    pub fn minute(&self) -> u8 {
        match self.0 {
            Recurrence::Daily { minute, .. } | Recurrence::Weekly { minute, .. } => minute,
        }
    }

    /// Weekday for weekly schedules, `None` for daily ones.
    pub fn weekday(&self) -> Option<u8> {
        match self.0 {
            Recurrence::Daily { .. } => None,
            Recurrence::Weekly { weekday, .. } => Some(weekday),
        }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self.0, Recurrence::Daily { .. })
    }

    /// Next occurrence strictly after `after`, in the host's local calendar.
    pub fn next_run(&self, after: DateTime<Local>) -> DateTime<Local> {
        self.next_run_in(&after)
    }

    /// Next occurrence strictly after `after`, in the calendar of `after`'s time zone.
    pub fn next_run_in<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = after.timezone();
        let local_after = after.naive_local();
        let time = self.time_of_day();

        let (mut date, step) = match self.weekday() {
            None => (local_after.date(), 1),
            Some(weekday) => (next_matching_weekday(local_after.date(), weekday), 7),
        };

        loop {
            let candidate = resolve_local(&tz, date.and_time(time));
            if candidate > *after {
                return candidate;
            }
            date = date + Days::new(step);
        }
    }

    /// Human-readable form, e.g. "Daily at 09:00" or "Weekly on Monday at 09:00".
    pub fn display_string(&self) -> String {
        match self.weekday() {
            None => format!("Daily at {:02}:{:02}", self.hour(), self.minute()),
            Some(weekday) => format!(
                "Weekly on {} at {:02}:{:02}",
                weekday_name(weekday),
                self.hour(),
                self.minute()
            ),
        }
    }

    fn time_of_day(&self) -> NaiveTime {
        // Components are range-checked at construction.
        NaiveTime::from_hms_opt(self.hour().into(), self.minute().into(), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

/// English name for a 1-based (Sunday = 1) weekday number.
pub fn weekday_name(weekday: u8) -> &'static str {
    let index = usize::from(weekday.clamp(1, 7) - 1);
    WEEKDAY_NAMES[index]
}

/// Sunday-based weekday number (1 = Sunday .. 7 = Saturday) of a date.
pub fn weekday_number(date: NaiveDate) -> u8 {
    // num_days_from_sunday is in 0..=6
    date.weekday().num_days_from_sunday() as u8 + 1
}

fn next_matching_weekday(from: NaiveDate, weekday: u8) -> NaiveDate {
    let ahead = (i64::from(weekday) - i64::from(weekday_number(from))).rem_euclid(7);
    from + Days::new(ahead as u64)
}

/// Map a wall-clock time to an instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times inside a
/// spring-forward gap are shifted forward by the length of the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before_gap = naive - chrono::Duration::days(1);
            let offset_secs = tz
                .offset_from_local_datetime(&before_gap)
                .earliest()
                .map(|offset| offset.fix().local_minus_utc())
                .unwrap_or(0);
            tz.from_utc_datetime(&(naive - chrono::Duration::seconds(offset_secs.into())))
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let recurrence = Recurrence::deserialize(deserializer)?;
        recurrence.validate().map_err(serde::de::Error::custom)?;
        Ok(Self(recurrence))
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
