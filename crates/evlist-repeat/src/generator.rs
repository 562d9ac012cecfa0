//! Occurrence generation -- expands an event schedule into dated occurrences.
//!
//! All stepping kinds share one loop; only the "first date" and "next date"
//! functions differ per [`RecurrenceKind`]. Output is keyed by start date, so a
//! later candidate for an already-produced date replaces the earlier one.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::RepeatConfig;
use crate::dates::{
    add_days, add_months, add_years, is_weekend, next_weekday,
    nth_weekday_of_month, weekday_of, WeekStart,
};
use crate::occurrence::OccurrenceCandidate;
use crate::rule::{Recurrence, RecurrenceKind, WeekendSkip};
use crate::schedule::{EventSchedule, Timing};

/// Loop iterations allowed per permitted occurrence. Weekend skipping can step
/// without emitting, so the loop needs its own bound besides the emit cap.
const STEPS_PER_OCCURRENCE: usize = 4;

/// Result of one generation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Generation {
    /// Occurrences ordered by start date, at most one per date.
    pub occurrences: Vec<OccurrenceCandidate>,
    /// The safety cap stopped generation before the stop date was reached.
    pub truncated: bool,
}

impl Generation {
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.occurrences.iter().map(|o| o.start).collect()
    }
}

/// Expands schedules using a fixed configuration.
#[derive(Debug, Clone)]
pub struct Generator {
    config: RepeatConfig,
}

impl Generator {
    pub fn new(config: RepeatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RepeatConfig {
        &self.config
    }

    /// Produce the occurrences of `schedule`, ordered by start date.
    ///
    /// Generation stops at the rule's stop date, at the configured date bounds,
    /// or after `max_repeats` occurrences, whichever comes first. Hitting the cap
    /// is reported through [`Generation::truncated`], not as an error.
    pub fn generate(&self, schedule: &EventSchedule) -> Generation {
        let rule = schedule.recurrence();
        let mut sink = Sink::new(
            schedule.duration_days(),
            *schedule.timing(),
            &self.config,
        );

        match rule.kind() {
            RecurrenceKind::OneTime => {
                sink.push(schedule.start_date());
            }
            RecurrenceKind::Dates { dates } if !dates.is_empty() => {
                for date in dates {
                    if !sink.in_bounds(*date) {
                        continue;
                    }
                    if !sink.push(*date) {
                        break;
                    }
                }
            }
            kind if kind.is_degenerate() => {
                tracing::debug!("recurrence has an empty day set, generating the start date only");
                sink.push(schedule.start_date());
            }
            _ => self.step(rule, schedule.start_date(), &mut sink),
        }

        let generation = sink.finish();
        if generation.truncated {
            tracing::warn!(
                cap = self.config.max_repeats,
                generated = generation.len(),
                "occurrence cap reached, schedule truncated"
            );
        }
        tracing::debug!(
            kind = rule.kind().code(),
            count = generation.len(),
            "generated occurrences"
        );
        generation
    }

    fn step(&self, rule: &Recurrence, seed: NaiveDate, sink: &mut Sink<'_>) {
        let stop = rule.stop().min(self.config.max_date);
        let step_limit = self
            .config
            .max_repeats
            .saturating_mul(STEPS_PER_OCCURRENCE);
        let week_start = self.config.week_start;

        let mut cursor = first_date(rule, seed);
        let mut steps = 0usize;

        while let Some(current) = cursor {
            if current > stop || !sink.in_bounds(current) {
                break;
            }
            steps += 1;
            if steps > step_limit {
                sink.truncated = true;
                break;
            }

            if let Some(date) = apply_weekend_skip(rule, seed, current) {
                if !sink.push(date) {
                    break;
                }
            } else {
                tracing::trace!(date = %current, "weekend occurrence skipped");
            }

            cursor = match next_date(rule, seed, current, week_start) {
                Some(next) if next > current => Some(next),
                _ => None,
            };
        }
    }
}

/// Shorthand for `Generator::new(config.clone()).generate(schedule)`.
pub fn make_recurrences(schedule: &EventSchedule, config: &RepeatConfig) -> Generation {
    Generator::new(config.clone()).generate(schedule)
}

/// Collects candidates keyed by start date and enforces the emit cap.
struct Sink<'a> {
    duration: i64,
    timing: Timing,
    config: &'a RepeatConfig,
    truncated: bool,
    by_date: BTreeMap<NaiveDate, OccurrenceCandidate>,
}

impl<'a> Sink<'a> {
    fn new(duration: i64, timing: Timing, config: &'a RepeatConfig) -> Self {
        Self {
            duration,
            timing,
            config,
            truncated: false,
            by_date: BTreeMap::new(),
        }
    }

    fn in_bounds(&self, date: NaiveDate) -> bool {
        date >= self.config.min_date && date <= self.config.max_date
    }

    /// Returns false once the cap is reached and nothing more may be pushed.
    /// A date that is already present is replaced without counting against the cap.
    fn push(&mut self, start: NaiveDate) -> bool {
        if !self.in_bounds(start) {
            return true;
        }
        let Some(end) = add_days(start, self.duration) else {
            return true;
        };
        let candidate = OccurrenceCandidate {
            start,
            end,
            timing: self.timing,
        };
        if let Some(slot) = self.by_date.get_mut(&start) {
            *slot = candidate;
            return true;
        }
        if self.by_date.len() >= self.config.max_repeats {
            self.truncated = true;
            return false;
        }
        self.by_date.insert(start, candidate);
        true
    }

    fn finish(self) -> Generation {
        Generation {
            occurrences: self.by_date.into_values().collect(),
            truncated: self.truncated,
        }
    }
}

/// Weekend policy for a stepped date. The start date itself is never moved.
fn apply_weekend_skip(rule: &Recurrence, seed: NaiveDate, date: NaiveDate) -> Option<NaiveDate> {
    if date == seed || !rule.applies_weekend_skip() || !is_weekend(date) {
        return Some(date);
    }
    match rule.skip() {
        WeekendSkip::None => Some(date),
        WeekendSkip::Skip => None,
        WeekendSkip::NextWeekday => next_weekday(date),
    }
}

/// The first candidate on or after `seed`.
fn first_date(rule: &Recurrence, seed: NaiveDate) -> Option<NaiveDate> {
    match rule.kind() {
        RecurrenceKind::Weekly { weekdays } => (0..7)
            .filter_map(|i| add_days(seed, i))
            .find(|d| weekdays.contains(&weekday_of(*d))),
        RecurrenceKind::Monthly { .. } | RecurrenceKind::DayOfMonth { .. } => {
            let day_before = add_days(seed, -1)?;
            monthly_after(rule, seed, day_before)
        }
        _ => Some(seed),
    }
}

/// The candidate following `current`.
fn next_date(
    rule: &Recurrence,
    seed: NaiveDate,
    current: NaiveDate,
    week_start: WeekStart,
) -> Option<NaiveDate> {
    let freq = rule.frequency();
    match rule.kind() {
        RecurrenceKind::Daily => add_days(current, i64::from(freq)),
        RecurrenceKind::Weekly { weekdays } => next_weekly(weekdays, freq, current, week_start),
        RecurrenceKind::Monthly { .. } | RecurrenceKind::DayOfMonth { .. } => {
            monthly_after(rule, seed, current)
        }
        RecurrenceKind::Yearly => {
            // Always count from the seed so Feb 29 returns in leap years.
            let elapsed = u32::try_from(current.year() - seed.year()).ok()?;
            add_years(seed, (elapsed / freq + 1) * freq)
        }
        RecurrenceKind::OneTime | RecurrenceKind::Dates { .. } => None,
    }
}

/// Scan forward day by day; on reaching a new week skip `freq - 1` weeks.
fn next_weekly(
    weekdays: &[Weekday],
    freq: u32,
    current: NaiveDate,
    week_start: WeekStart,
) -> Option<NaiveDate> {
    let first_day = match week_start {
        WeekStart::Sunday => Weekday::Sun,
        WeekStart::Monday => Weekday::Mon,
    };
    let mut date = current;
    for _ in 0..14 {
        date = add_days(date, 1)?;
        if weekday_of(date) == first_day && freq > 1 {
            date = add_days(date, 7 * i64::from(freq - 1))?;
        }
        if weekdays.contains(&weekday_of(date)) {
            return Some(date);
        }
    }
    None
}

/// First monthly candidate strictly after `after`, in months `seed` month + k * freq.
///
/// Day numbers past the end of a month roll into the next one, so a month's
/// candidates can overlap the following eligible month. The search starts one
/// eligible month back and keeps the earliest match.
fn monthly_after(rule: &Recurrence, seed: NaiveDate, after: NaiveDate) -> Option<NaiveDate> {
    let freq = rule.frequency();
    let seed_month = seed.with_day(1)?;
    let elapsed = month_index(after) - month_index(seed_month);

    let mut offset = if elapsed <= 0 {
        0
    } else {
        (u32::try_from(elapsed).ok()? / freq * freq).saturating_sub(freq)
    };

    // A month without any candidate only happens when every ordinal fails to
    // resolve; give up after a full cycle of attempts.
    let mut best: Option<NaiveDate> = None;
    for _ in 0..26 {
        let Some(month_start) = add_months(seed_month, offset) else {
            break;
        };
        if best.is_some_and(|b| month_start > b) {
            break;
        }
        if let Some(found) = month_candidates(rule, month_start)
            .into_iter()
            .find(|d| *d > after)
        {
            best = Some(best.map_or(found, |b| b.min(found)));
        }
        let Some(next) = offset.checked_add(freq) else {
            break;
        };
        offset = next;
    }
    best
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Candidates for the month starting at `month_start`, ascending. Monthly days
/// past the month's end fall in the next month.
fn month_candidates(rule: &Recurrence, month_start: NaiveDate) -> Vec<NaiveDate> {
    let (year, month) = (month_start.year(), month_start.month());
    let mut dates: Vec<NaiveDate> = match rule.kind() {
        RecurrenceKind::Monthly { days } => days
            .iter()
            .filter_map(|d| add_days(month_start, i64::from(*d) - 1))
            .collect(),
        RecurrenceKind::DayOfMonth { ordinals, weekday } => ordinals
            .iter()
            .filter_map(
                |o| match nth_weekday_of_month(*o, *weekday, month, year) {
                    Ok(date) => Some(date),
                    Err(err) => {
                        tracing::debug!(%err, "skipping month without this occurrence");
                        None
                    }
                },
            )
            .collect(),
        _ => Vec::new(),
    };
    dates.sort_unstable();
    dates.dedup();
    dates
}
