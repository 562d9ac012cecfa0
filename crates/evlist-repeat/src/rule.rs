//! Recurrence rules -- how an event repeats.
//!
//! A [`Recurrence`] is a [`RecurrenceKind`] plus the parameters every kind shares:
//! frequency, stop date and weekend-skip policy. Construction never fails; bad
//! values are clamped to safe defaults. The serialized form is the `rec_data`
//! JSON blob stored with the event record ([`RecurrenceData`]).

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::dates::{weekday_from_sunday, LAST_ORDINAL};
use crate::error::{RepeatError, Result};

/// How occurrences falling on Saturday or Sunday are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekendSkip {
    #[default]
    None,
    /// Drop the weekend occurrence entirely.
    Skip,
    /// Move the weekend occurrence to the following Monday.
    NextWeekday,
}

impl WeekendSkip {
    pub fn code(self) -> u8 {
        match self {
            WeekendSkip::None => 0,
            WeekendSkip::Skip => 1,
            WeekendSkip::NextWeekday => 2,
        }
    }

    /// Unknown codes mean "no skipping".
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => WeekendSkip::Skip,
            2 => WeekendSkip::NextWeekday,
            _ => WeekendSkip::None,
        }
    }
}

/// The repetition pattern.
///
/// Set-valued variants keep their contents sorted and deduplicated so that
/// equality is a deep structural comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceKind {
    OneTime,
    Daily,
    Weekly { weekdays: Vec<Weekday> },
    /// Days of the month, 1-31. Days past the end of a short month roll over into
    /// the next month.
    Monthly { days: Vec<u32> },
    Yearly,
    /// "2nd and 4th Tuesday": ordinals 1-5, where 5 means the last.
    DayOfMonth { ordinals: Vec<u8>, weekday: Weekday },
    Dates { dates: Vec<NaiveDate> },
}

impl RecurrenceKind {
    pub fn weekly(weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let mut weekdays: Vec<Weekday> = weekdays.into_iter().collect();
        weekdays.sort_by_key(|w| w.num_days_from_sunday());
        weekdays.dedup();
        RecurrenceKind::Weekly { weekdays }
    }

    pub fn monthly(days: impl IntoIterator<Item = u32>) -> Self {
        let mut days: Vec<u32> = days.into_iter().filter(|d| (1..=31).contains(d)).collect();
        days.sort_unstable();
        days.dedup();
        RecurrenceKind::Monthly { days }
    }

    pub fn day_of_month(ordinals: impl IntoIterator<Item = u8>, weekday: Weekday) -> Self {
        let mut ordinals: Vec<u8> = ordinals
            .into_iter()
            .filter(|o| (1..=LAST_ORDINAL).contains(o))
            .collect();
        ordinals.sort_unstable();
        ordinals.dedup();
        RecurrenceKind::DayOfMonth { ordinals, weekday }
    }

    pub fn dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort_unstable();
        dates.dedup();
        RecurrenceKind::Dates { dates }
    }

    /// Numeric `type` code used in the `rec_data` blob.
    pub fn code(&self) -> u8 {
        match self {
            RecurrenceKind::OneTime => 0,
            RecurrenceKind::Daily => 1,
            RecurrenceKind::Monthly { .. } => 2,
            RecurrenceKind::Yearly => 3,
            RecurrenceKind::Weekly { .. } => 4,
            RecurrenceKind::DayOfMonth { .. } => 5,
            RecurrenceKind::Dates { .. } => 6,
        }
    }

    /// True when a set the variant depends on is empty. Such rules generate only
    /// the seed occurrence.
    pub fn is_degenerate(&self) -> bool {
        match self {
            RecurrenceKind::Weekly { weekdays } => weekdays.is_empty(),
            RecurrenceKind::Monthly { days } => days.is_empty(),
            RecurrenceKind::DayOfMonth { ordinals, .. } => ordinals.is_empty(),
            RecurrenceKind::Dates { dates } => dates.is_empty(),
            _ => false,
        }
    }
}

/// A complete recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    kind: RecurrenceKind,
    frequency: u32,
    stop: NaiveDate,
    skip: WeekendSkip,
}

impl Recurrence {
    /// Build a rule, clamping instead of failing: a frequency below 1 becomes 1, a
    /// missing stop date or one past `max_date` becomes `max_date`.
    pub fn new(
        kind: RecurrenceKind,
        frequency: u32,
        stop: Option<NaiveDate>,
        skip: WeekendSkip,
        max_date: NaiveDate,
    ) -> Self {
        if frequency < 1 {
            tracing::debug!(frequency, "recurrence frequency below 1, using 1");
        }
        let stop = match stop {
            Some(stop) if stop <= max_date => stop,
            _ => max_date,
        };
        Self {
            kind,
            frequency: frequency.max(1),
            stop,
            skip,
        }
    }

    /// A non-repeating rule.
    pub fn one_time(max_date: NaiveDate) -> Self {
        Self::new(RecurrenceKind::OneTime, 1, None, WeekendSkip::None, max_date)
    }

    pub fn kind(&self) -> &RecurrenceKind {
        &self.kind
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn stop(&self) -> NaiveDate {
        self.stop
    }

    pub fn skip(&self) -> WeekendSkip {
        self.skip
    }

    pub fn is_recurring(&self) -> bool {
        self.kind != RecurrenceKind::OneTime
    }

    /// Whether the stop date bounds generation for this kind.
    pub fn uses_stop(&self) -> bool {
        !matches!(
            self.kind,
            RecurrenceKind::OneTime | RecurrenceKind::Dates { .. }
        )
    }

    /// Weekend skipping only applies to the stepping kinds.
    pub fn applies_weekend_skip(&self) -> bool {
        matches!(
            self.kind,
            RecurrenceKind::Daily
                | RecurrenceKind::Weekly { .. }
                | RecurrenceKind::Monthly { .. }
                | RecurrenceKind::Yearly
        )
    }

    /// Same pattern, ignoring the stop date.
    pub fn same_pattern(&self, other: &Recurrence) -> bool {
        self.kind == other.kind && self.frequency == other.frequency && self.skip == other.skip
    }

    pub fn with_stop(mut self, stop: NaiveDate, max_date: NaiveDate) -> Self {
        self.stop = stop.min(max_date);
        self
    }

    /// Render as an RFC 5545 RRULE value for calendar feeds.
    ///
    /// Returns `None` for one-time events, explicit date lists, weekend-skip rules
    /// and monthly day sets using days 29-31, none of which RRULE expresses with
    /// the same meaning.
    pub fn to_rrule(&self) -> Option<String> {
        if self.skip != WeekendSkip::None {
            return None;
        }
        let body = match &self.kind {
            RecurrenceKind::OneTime | RecurrenceKind::Dates { .. } => return None,
            RecurrenceKind::Daily => "FREQ=DAILY".to_string(),
            RecurrenceKind::Weekly { weekdays } if !weekdays.is_empty() => {
                let days: Vec<&str> = weekdays.iter().map(|w| ical_day(*w)).collect();
                format!("FREQ=WEEKLY;BYDAY={}", days.join(","))
            }
            RecurrenceKind::Monthly { days }
                if !days.is_empty() && days.iter().all(|d| *d <= 28) =>
            {
                let days: Vec<String> = days.iter().map(u32::to_string).collect();
                format!("FREQ=MONTHLY;BYMONTHDAY={}", days.join(","))
            }
            RecurrenceKind::Yearly => "FREQ=YEARLY".to_string(),
            RecurrenceKind::DayOfMonth { ordinals, weekday } if !ordinals.is_empty() => {
                let days: Vec<String> = ordinals
                    .iter()
                    .map(|o| {
                        let pos = if *o == LAST_ORDINAL {
                            "-1".to_string()
                        } else {
                            o.to_string()
                        };
                        format!("{}{}", pos, ical_day(*weekday))
                    })
                    .collect();
                format!("FREQ=MONTHLY;BYDAY={}", days.join(","))
            }
            _ => return None,
        };
        Some(format!(
            "{};INTERVAL={};UNTIL={}T235959Z",
            body,
            self.frequency,
            self.stop.format("%Y%m%d")
        ))
    }

    /// Convert to the stored blob form.
    pub fn to_data(&self) -> RecurrenceData {
        let mut data = RecurrenceData {
            kind: self.kind.code(),
            freq: self.frequency,
            stop: Some(self.stop),
            skip: self.skip.code(),
            ..RecurrenceData::default()
        };
        match &self.kind {
            RecurrenceKind::Weekly { weekdays } => {
                data.listdays = weekdays.iter().map(|w| weekday_code(*w)).collect();
            }
            RecurrenceKind::Monthly { days } => data.listdays = days.clone(),
            RecurrenceKind::DayOfMonth { ordinals, weekday } => {
                data.weekday = Some(weekday_code(*weekday));
                data.interval = ordinals.iter().map(|o| u32::from(*o)).collect();
            }
            RecurrenceKind::Dates { dates } => data.custom = dates.clone(),
            RecurrenceKind::OneTime | RecurrenceKind::Daily | RecurrenceKind::Yearly => {}
        }
        data
    }

    /// Rebuild from the stored blob, clamping as [`Recurrence::new`] does.
    ///
    /// # Errors
    /// Returns `RepeatError::InvalidRecurrenceRule` for an unknown `type` code or a
    /// day-of-month rule without a valid weekday.
    pub fn from_data(data: &RecurrenceData, max_date: NaiveDate) -> Result<Self> {
        let kind = match data.kind {
            0 => RecurrenceKind::OneTime,
            1 => RecurrenceKind::Daily,
            2 => RecurrenceKind::monthly(data.listdays.iter().copied()),
            3 => RecurrenceKind::Yearly,
            4 => RecurrenceKind::weekly(data.listdays.iter().filter_map(|c| weekday_from_code(*c))),
            5 => {
                let weekday = data.weekday.and_then(weekday_from_code).ok_or_else(|| {
                    RepeatError::InvalidRecurrenceRule(format!(
                        "day-of-month rule needs a weekday 1-7, got {:?}",
                        data.weekday
                    ))
                })?;
                RecurrenceKind::day_of_month(
                    data.interval
                        .iter()
                        .filter_map(|o| u8::try_from(*o).ok()),
                    weekday,
                )
            }
            6 => RecurrenceKind::dates(data.custom.iter().copied()),
            other => {
                return Err(RepeatError::InvalidRecurrenceRule(format!(
                    "unknown recurrence type {other}"
                )))
            }
        };
        Ok(Self::new(
            kind,
            data.freq,
            data.stop,
            WeekendSkip::from_code(data.skip),
            max_date,
        ))
    }

    /// Serialize to the `rec_data` JSON string.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_data())?)
    }

    /// Parse a `rec_data` JSON string.
    ///
    /// # Errors
    /// Returns `RepeatError::Blob` for malformed JSON and
    /// `RepeatError::InvalidRecurrenceRule` for unknown rule types.
    pub fn from_json(json: &str, max_date: NaiveDate) -> Result<Self> {
        let data: RecurrenceData = serde_json::from_str(json)?;
        Self::from_data(&data, max_date)
    }
}

/// The `rec_data` blob persisted with an event.
///
/// Field meaning depends on `type`: `listdays` holds weekdays (1 = Sunday .. 7)
/// for weekly rules and day numbers for monthly rules; `weekday` and `interval`
/// hold the weekday and ordinals of a day-of-month rule; `custom` holds the dates
/// of an explicit date list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceData {
    #[serde(rename = "type")]
    pub kind: u8,
    pub freq: u32,
    pub stop: Option<NaiveDate>,
    pub skip: u8,
    pub listdays: Vec<u32>,
    pub weekday: Option<u32>,
    pub interval: Vec<u32>,
    pub custom: Vec<NaiveDate>,
}

impl Default for RecurrenceData {
    fn default() -> Self {
        Self {
            kind: 0,
            freq: 1,
            stop: None,
            skip: 0,
            listdays: Vec::new(),
            weekday: None,
            interval: Vec::new(),
            custom: Vec::new(),
        }
    }
}

/// 1 = Sunday .. 7 = Saturday.
pub fn weekday_code(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday() + 1
}

pub fn weekday_from_code(code: u32) -> Option<Weekday> {
    (1..=7).contains(&code).then(|| weekday_from_sunday(code - 1))
}

fn ical_day(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}
