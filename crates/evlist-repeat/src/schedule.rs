//! Event schedules: dates, times of day and the recurrence rule.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::{Clock, RepeatConfig};
use crate::dates::{self, days_between};
use crate::error::{RepeatError, Result};
use crate::rule::Recurrence;

/// A start/end pair of times of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeBlock {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

/// Time-of-day layout of each occurrence.
///
/// A split event has a second block, e.g. a morning and an afternoon session
/// with a break between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timing {
    AllDay,
    Timed {
        first: TimeBlock,
        second: Option<TimeBlock>,
    },
}

impl Timing {
    pub fn timed(start: NaiveTime, end: NaiveTime) -> Self {
        Timing::Timed {
            first: TimeBlock::new(start, end),
            second: None,
        }
    }

    pub fn split(first: TimeBlock, second: TimeBlock) -> Self {
        Timing::Timed {
            first,
            second: Some(second),
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Timing::AllDay)
    }

    pub fn is_split(&self) -> bool {
        matches!(self, Timing::Timed { second: Some(_), .. })
    }
}

/// The authoritative date/time/recurrence definition of an event.
///
/// Fields are private; every setter re-validates so an `EventSchedule` in hand
/// always satisfies the cross-field rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchedule {
    start_date: NaiveDate,
    end_date: NaiveDate,
    timing: Timing,
    timezone: String,
    recurrence: Recurrence,
}

impl EventSchedule {
    /// # Errors
    /// Returns `RepeatError::Validation` listing every failed check.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        timing: Timing,
        timezone: impl Into<String>,
        recurrence: Recurrence,
    ) -> Result<Self> {
        let schedule = Self {
            start_date,
            end_date,
            timing,
            timezone: timezone.into(),
            recurrence,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Build a schedule from raw form values.
    ///
    /// Malformed dates fall back to today in the site timezone. A missing end
    /// date means a single-day event.
    ///
    /// # Errors
    /// Returns `RepeatError::Blob`/`InvalidRecurrenceRule` for a bad `rec_data`
    /// blob and `RepeatError::Validation` for cross-field failures.
    pub fn from_input(
        input: &ScheduleInput,
        clock: &dyn Clock,
        config: &RepeatConfig,
    ) -> Result<Self> {
        let today = clock.today();
        let start_date = dates::parse_date_or(&input.start_date, today);
        let end_date = match input.end_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => dates::parse_date_or(raw, start_date),
            _ => start_date,
        };
        let timing = if input.all_day {
            Timing::AllDay
        } else {
            let first = input.first.unwrap_or_else(|| {
                TimeBlock::new(NaiveTime::MIN, NaiveTime::MIN)
            });
            Timing::Timed {
                first,
                second: input.second,
            }
        };
        let recurrence = match input.rec_data.as_deref() {
            Some(json) if !json.trim().is_empty() => Recurrence::from_json(json, config.max_date)?,
            _ => Recurrence::one_time(config.max_date),
        };
        let timezone = input
            .timezone
            .clone()
            .unwrap_or_else(|| config.timezone.clone());
        Self::new(start_date, end_date, timing, timezone, recurrence)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    /// Days from start date to end date; 0 for a single-day event.
    pub fn duration_days(&self) -> i64 {
        days_between(self.start_date, self.end_date)
    }

    /// # Errors
    /// Returns `RepeatError::Validation` and leaves the schedule unchanged when
    /// the new dates fail validation.
    pub fn set_dates(&mut self, start_date: NaiveDate, end_date: NaiveDate) -> Result<()> {
        self.update(|s| {
            s.start_date = start_date;
            s.end_date = end_date;
        })
    }

    /// # Errors
    /// See [`EventSchedule::set_dates`].
    pub fn set_timing(&mut self, timing: Timing) -> Result<()> {
        self.update(|s| s.timing = timing)
    }

    /// # Errors
    /// See [`EventSchedule::set_dates`].
    pub fn set_timezone(&mut self, timezone: impl Into<String>) -> Result<()> {
        let timezone = timezone.into();
        self.update(|s| s.timezone = timezone)
    }

    /// # Errors
    /// See [`EventSchedule::set_dates`].
    pub fn set_recurrence(&mut self, recurrence: Recurrence) -> Result<()> {
        self.update(|s| s.recurrence = recurrence)
    }

    fn update(&mut self, change: impl FnOnce(&mut Self)) -> Result<()> {
        let mut next = self.clone();
        change(&mut next);
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.end_date < self.start_date {
            errors.push(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            ));
        }

        errors.extend(timing_errors(&self.timing, self.start_date == self.end_date));

        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(format!("unknown timezone {}", self.timezone));
        }

        if self.recurrence.uses_stop() && self.recurrence.stop() < self.start_date {
            errors.push(format!(
                "repeat stop date {} is before start date {}",
                self.recurrence.stop(),
                self.start_date
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RepeatError::Validation(errors))
        }
    }
}

/// Cross-field checks on a time layout. End times may precede start times only
/// when the occurrence spans more than one day.
pub(crate) fn timing_errors(timing: &Timing, single_day: bool) -> Vec<String> {
    let mut errors = Vec::new();
    if let Timing::Timed { first, second } = timing {
        if single_day && first.end < first.start {
            errors.push("end time is before start time".to_string());
        }
        if let Some(second) = second {
            if second.end < second.start {
                errors.push("second end time is before second start time".to_string());
            }
            if second.start < first.end {
                errors.push("second time block starts before the first one ends".to_string());
            }
        }
    }
    errors
}

/// Raw schedule values as submitted by an edit form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub start_date: String,
    pub end_date: Option<String>,
    pub all_day: bool,
    pub first: Option<TimeBlock>,
    pub second: Option<TimeBlock>,
    pub timezone: Option<String>,
    pub rec_data: Option<String>,
}
