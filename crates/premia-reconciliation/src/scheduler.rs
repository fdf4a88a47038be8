//! Schedule calculation for periodic reconciliation runs.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often a scheduled reconciliation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    /// Every hour, at the top of the hour.
    Hourly,
    /// Every day, at a configured UTC hour.
    Daily,
}

impl fmt::Display for ScheduleFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

impl std::str::FromStr for ScheduleFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            _ => Err(format!("Invalid schedule frequency: {s}")),
        }
    }
}

/// A recurring schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: ScheduleFrequency,
    /// Hour of day (0-23 UTC); only meaningful for daily schedules.
    pub hour_of_day: u8,
}

impl Schedule {
    /// Hourly schedule.
    #[must_use]
    pub fn hourly() -> Self {
        Self {
            frequency: ScheduleFrequency::Hourly,
            hour_of_day: 0,
        }
    }

    /// Daily schedule at the given UTC hour.
    #[must_use]
    pub fn daily(hour_of_day: u8) -> Self {
        Self {
            frequency: ScheduleFrequency::Daily,
            hour_of_day: hour_of_day.min(23),
        }
    }

    /// The next fire time strictly after `from`.
    #[must_use]
    pub fn next_run(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.frequency {
            ScheduleFrequency::Hourly => {
                let next = from + Duration::hours(1);
                Some(
                    next.date_naive()
                        .and_time(NaiveTime::from_hms_opt(next.hour(), 0, 0)?)
                        .and_utc(),
                )
            }
            ScheduleFrequency::Daily => {
                let target_time = NaiveTime::from_hms_opt(u32::from(self.hour_of_day), 0, 0)?;
                let today_target = from.date_naive().and_time(target_time).and_utc();
                if from < today_target {
                    Some(today_target)
                } else {
                    let tomorrow = from.date_naive() + Duration::days(1);
                    Some(tomorrow.and_time(target_time).and_utc())
                }
            }
        }
    }
}
