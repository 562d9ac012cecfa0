//! Schedule-change classification.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Weekday};
use evlist_repeat::{
    classify, EventSchedule, Recurrence, RecurrenceKind, RepeatConfig, ScheduleAction, Timing,
    WeekendSkip,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn weekly_until(stop: NaiveDate) -> EventSchedule {
    EventSchedule::new(
        d(2024, 1, 1),
        d(2024, 1, 1),
        Timing::AllDay,
        "UTC",
        Recurrence::new(
            RecurrenceKind::weekly([Weekday::Mon]),
            1,
            Some(stop),
            WeekendSkip::None,
            RepeatConfig::default().max_date,
        ),
    )
    .unwrap()
}

fn one_time(start: NaiveDate) -> EventSchedule {
    EventSchedule::new(
        start,
        start,
        Timing::AllDay,
        "UTC",
        Recurrence::one_time(RepeatConfig::default().max_date),
    )
    .unwrap()
}

fn set(actions: &[ScheduleAction]) -> BTreeSet<ScheduleAction> {
    actions.iter().copied().collect()
}

#[test]
fn earlier_stop_date_only_truncates() {
    let old = weekly_until(d(2024, 6, 1));
    let new = weekly_until(d(2024, 3, 1));
    assert_eq!(classify(&old, &new), set(&[ScheduleAction::Truncate]));
}

#[test]
fn later_stop_date_only_extends() {
    let old = weekly_until(d(2024, 3, 1));
    let new = weekly_until(d(2024, 6, 1));
    assert_eq!(classify(&old, &new), set(&[ScheduleAction::Extend]));
}

#[test]
fn unchanged_recurring_schedule_needs_nothing() {
    let old = weekly_until(d(2024, 6, 1));
    assert!(classify(&old, &old.clone()).is_empty());
}

#[test]
fn changed_weekday_set_regenerates_and_suppresses_truncate() {
    let old = weekly_until(d(2024, 6, 1));
    let mut new = weekly_until(d(2024, 3, 1));
    new.set_recurrence(Recurrence::new(
        RecurrenceKind::weekly([Weekday::Mon, Weekday::Wed]),
        1,
        Some(d(2024, 3, 1)),
        WeekendSkip::None,
        RepeatConfig::default().max_date,
    ))
    .unwrap();
    assert_eq!(classify(&old, &new), set(&[ScheduleAction::FullRegenerate]));
}

#[test]
fn changed_start_date_regenerates() {
    let old = weekly_until(d(2024, 6, 1));
    let mut new = old.clone();
    new.set_dates(d(2024, 1, 8), d(2024, 1, 8)).unwrap();
    assert_eq!(classify(&old, &new), set(&[ScheduleAction::FullRegenerate]));
}

#[test]
fn changed_frequency_regenerates() {
    let old = weekly_until(d(2024, 6, 1));
    let mut new = old.clone();
    new.set_recurrence(Recurrence::new(
        RecurrenceKind::weekly([Weekday::Mon]),
        2,
        Some(d(2024, 6, 1)),
        WeekendSkip::None,
        RepeatConfig::default().max_date,
    ))
    .unwrap();
    assert_eq!(classify(&old, &new), set(&[ScheduleAction::FullRegenerate]));
}

#[test]
fn time_change_propagates_alongside_other_actions() {
    let old = weekly_until(d(2024, 6, 1));
    let mut new = weekly_until(d(2024, 3, 1));
    new.set_timing(Timing::timed(
        NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
    ))
    .unwrap();
    assert_eq!(
        classify(&old, &new),
        set(&[ScheduleAction::Truncate, ScheduleAction::PropagateTimeOnly])
    );
}

#[test]
fn recurring_to_one_time_collapses() {
    let old = weekly_until(d(2024, 6, 1));
    let new = one_time(d(2024, 1, 1));
    assert_eq!(
        classify(&old, &new),
        set(&[ScheduleAction::FullRegenerate, ScheduleAction::CollapseToSingle])
    );
}

#[test]
fn one_time_edit_is_a_single_instance_edit() {
    let old = one_time(d(2024, 1, 1));
    let new = one_time(d(2024, 1, 2));
    assert_eq!(
        classify(&old, &new),
        set(&[
            ScheduleAction::FullRegenerate,
            ScheduleAction::SingleInstanceEdit
        ])
    );
    assert_eq!(
        classify(&old, &old.clone()),
        set(&[ScheduleAction::SingleInstanceEdit])
    );
}

#[test]
fn one_time_to_recurring_regenerates() {
    let old = one_time(d(2024, 1, 1));
    let new = weekly_until(d(2024, 6, 1));
    assert_eq!(classify(&old, &new), set(&[ScheduleAction::FullRegenerate]));
}
