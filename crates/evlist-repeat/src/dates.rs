//! Calendar date arithmetic -- day counts, weekdays and calendar grids.
//!
//! Dates are converted to a continuous day count (Julian day number) so that adding
//! days or measuring a span is a single integer operation. The weekday and ordinal
//! day formulas work on raw `(day, month, year)` triples and tolerate out-of-range
//! days (day 31 of February resolves arithmetically into March), which is what
//! [`nth_weekday_of_month`] relies on to detect overflow.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{RepeatError, Result};

/// Offset between the Date_Calc day count and the proleptic Julian day number epoch.
const JULIAN_OFFSET: i64 = 1_721_119;

/// Days in a 400-year Gregorian cycle.
const DAYS_PER_CYCLE: i64 = 146_097;

/// Days in a 4-year Julian cycle.
const DAYS_PER_QUAD: i64 = 1461;

/// "Last" ordinal for [`nth_weekday_of_month`].
pub const LAST_ORDINAL: u8 = 5;

/// A row of seven consecutive dates in a calendar grid.
pub type Week = [NaiveDate; 7];

/// First day of a displayed week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    fn weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }
}

/// Gregorian leap year: divisible by 4, not by 100 unless by 400.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`. Returns 0 for an invalid month.
pub fn days_in_month(month: u32, year: i32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Day of week for a `(day, month, year)` triple, 0 = Sunday .. 6 = Saturday.
///
/// Uses the century/year/month decomposition with floor division throughout, so
/// days past the end of the month roll into the following month.
pub fn day_of_week(day: u32, month: u32, year: i32) -> u32 {
    let mut month = i64::from(month);
    let mut year = i64::from(year);
    if month > 2 {
        month -= 2;
    } else {
        month += 10;
        year -= 1;
    }
    let yy = year.rem_euclid(100);
    let century = year.div_euclid(100);
    let n = (13 * month - 1).div_euclid(5)
        + i64::from(day)
        + yy
        + yy.div_euclid(4)
        + century.div_euclid(4)
        - 2 * century
        + 77;
    // rem_euclid(7) is always in 0..7
    n.rem_euclid(7) as u32
}

/// [`day_of_week`] for a chrono date, as a [`Weekday`].
pub fn weekday_of(date: NaiveDate) -> Weekday {
    weekday_from_sunday(day_of_week(date.day(), date.month(), date.year()))
}

/// Convert a 0-based Sunday-first day number into a [`Weekday`].
pub fn weekday_from_sunday(n: u32) -> Weekday {
    match n % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

/// Convert a calendar date to a continuous day count.
pub fn date_to_days(date: NaiveDate) -> i64 {
    let mut century = i64::from(date.year()).div_euclid(100);
    let mut year = i64::from(date.year()).rem_euclid(100);
    let mut month = i64::from(date.month());
    let day = i64::from(date.day());

    if month > 2 {
        month -= 3;
    } else {
        month += 9;
        if year > 0 {
            year -= 1;
        } else {
            year = 99;
            century -= 1;
        }
    }

    (DAYS_PER_CYCLE * century).div_euclid(4)
        + (DAYS_PER_QUAD * year).div_euclid(4)
        + (153 * month + 2).div_euclid(5)
        + day
        + JULIAN_OFFSET
}

/// Inverse of [`date_to_days`]. `None` when the count falls outside chrono's range.
pub fn days_to_date(days: i64) -> Option<NaiveDate> {
    let days = days - JULIAN_OFFSET;

    let mut century = (4 * days - 1).div_euclid(DAYS_PER_CYCLE);
    let rem = 4 * days - 1 - DAYS_PER_CYCLE * century;
    let day = rem.div_euclid(4);

    let mut year = (4 * day + 3).div_euclid(DAYS_PER_QUAD);
    let day = 4 * day + 3 - DAYS_PER_QUAD * year;
    let day = (day + 4).div_euclid(4);

    let mut month = (5 * day - 3).div_euclid(153);
    let day = 5 * day - 3 - 153 * month;
    let day = (day + 5).div_euclid(5);

    if month < 10 {
        month += 3;
    } else {
        month -= 9;
        if year == 99 {
            year = 0;
            century += 1;
        } else {
            year += 1;
        }
    }

    let year = i32::try_from(century * 100 + year).ok()?;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Add (or subtract) `n` days.
pub fn add_days(date: NaiveDate, n: i64) -> Option<NaiveDate> {
    days_to_date(date_to_days(date) + n)
}

/// Signed number of days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    date_to_days(to) - date_to_days(from)
}

/// Add `n` months, clamping the day to the target month's length.
pub fn add_months(date: NaiveDate, n: u32) -> Option<NaiveDate> {
    let total = i64::from(date.year()) * 12 + i64::from(date.month0()) + i64::from(n);
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    let day = date.day().min(days_in_month(month, year));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Add `n` years, keeping month and day. Feb 29 lands on Feb 28 in common years.
pub fn add_years(date: NaiveDate, n: u32) -> Option<NaiveDate> {
    let year = date.year().checked_add(i32::try_from(n).ok()?)?;
    let day = date.day().min(days_in_month(date.month(), year));
    NaiveDate::from_ymd_opt(year, date.month(), day)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(weekday_of(date), Weekday::Sat | Weekday::Sun)
}

/// The next Monday-Friday strictly after `date`.
pub fn next_weekday(date: NaiveDate) -> Option<NaiveDate> {
    let step = match weekday_of(date) {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    add_days(date, step)
}

/// The previous Monday-Friday strictly before `date`.
pub fn prev_weekday(date: NaiveDate) -> Option<NaiveDate> {
    let step = match weekday_of(date) {
        Weekday::Mon => 3,
        Weekday::Sun => 2,
        _ => 1,
    };
    add_days(date, -step)
}

/// Resolve "the `ordinal`th `weekday` of `month`/`year`", e.g. the 3rd Wednesday.
///
/// Ordinal 5 means "last": when the month has no fifth such weekday the fourth is
/// returned. For ordinals 1-4 (and anything outside 1-5) a date past the end of the
/// month is reported as [`RepeatError::InvalidOccurrence`].
pub fn nth_weekday_of_month(
    ordinal: u8,
    weekday: Weekday,
    month: u32,
    year: i32,
) -> Result<NaiveDate> {
    let invalid = || RepeatError::InvalidOccurrence {
        ordinal,
        weekday,
        year,
        month,
    };
    if !(1..=LAST_ORDINAL).contains(&ordinal) {
        return Err(invalid());
    }

    let first_of_week = (u32::from(ordinal) - 1) * 7 + 1;
    let dow_first = day_of_week(first_of_week, month, year);
    let target = weekday.num_days_from_sunday();
    let wdate = first_of_week + (7 + target - dow_first) % 7;

    if wdate > days_in_month(month, year) {
        if ordinal == LAST_ORDINAL {
            return nth_weekday_of_month(LAST_ORDINAL - 1, weekday, month, year);
        }
        return Err(invalid());
    }
    NaiveDate::from_ymd_opt(year, month, wdate).ok_or_else(invalid)
}

/// The seven dates of the week containing `date`, beginning on `start`.
pub fn week_grid(date: NaiveDate, start: WeekStart) -> Option<Week> {
    let offset = (7 + weekday_of(date).num_days_from_sunday()
        - start.weekday().num_days_from_sunday())
        % 7;
    let first = add_days(date, -i64::from(offset))?;
    let mut week = [first; 7];
    for (i, slot) in week.iter_mut().enumerate().skip(1) {
        *slot = add_days(first, i as i64)?;
    }
    Some(week)
}

/// Week rows covering every day of `month`, padded with days from the
/// neighbouring months.
pub fn month_grid(year: i32, month: u32, start: WeekStart) -> Option<Vec<Week>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(month, year))?;

    let mut rows = Vec::with_capacity(6);
    let mut cursor = first;
    while cursor <= last {
        let week = week_grid(cursor, start)?;
        cursor = add_days(week[6], 1)?;
        rows.push(week);
    }
    Some(rows)
}

/// Twelve month grids for `year`.
pub fn year_grid(year: i32, start: WeekStart) -> Option<Vec<Vec<Week>>> {
    (1..=12).map(|m| month_grid(year, m, start)).collect()
}

/// Parse a `YYYY-MM-DD` string, falling back to `fallback` when any component
/// is missing, non-numeric or out of range.
pub fn parse_date_or(input: &str, fallback: NaiveDate) -> NaiveDate {
    parse_ymd(input).unwrap_or(fallback)
}

fn parse_ymd(input: &str) -> Option<NaiveDate> {
    let mut parts = input.trim().splitn(3, '-');
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_count_matches_julian_day_number() {
        assert_eq!(date_to_days(d(2000, 3, 1)), 2_451_605);
        assert_eq!(date_to_days(d(1970, 1, 1)), 2_440_588);
    }

    #[test]
    fn day_of_week_handles_overflowing_day() {
        // Feb 29 2021 does not exist; it resolves as Monday Mar 1.
        assert_eq!(day_of_week(29, 2, 2021), 1);
    }

    #[test]
    fn parse_date_falls_back_on_garbage() {
        let today = d(2024, 5, 5);
        assert_eq!(parse_date_or("2024-02-30", today), today);
        assert_eq!(parse_date_or("abc", today), today);
        assert_eq!(parse_date_or(" 2024-02-29 ", today), d(2024, 2, 29));
    }
}
