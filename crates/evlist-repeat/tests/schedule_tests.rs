//! Schedule validation and construction from form input.

use chrono::{NaiveDate, NaiveTime, Weekday};
use evlist_repeat::{
    EventSchedule, FixedClock, Recurrence, RecurrenceKind, RepeatConfig, RepeatError,
    ScheduleInput, TimeBlock, Timing, WeekendSkip,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn clock() -> FixedClock {
    FixedClock(d(2024, 5, 20).and_hms_opt(12, 0, 0).unwrap())
}

fn validation_messages(err: RepeatError) -> Vec<String> {
    match err {
        RepeatError::Validation(messages) => messages,
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn every_failed_check_is_reported() {
    let err = EventSchedule::new(
        d(2024, 1, 10),
        d(2024, 1, 5),
        Timing::split(TimeBlock::new(t(9), t(12)), TimeBlock::new(t(11), t(10))),
        "Mars/Olympus",
        Recurrence::one_time(RepeatConfig::default().max_date),
    )
    .unwrap_err();
    let messages = validation_messages(err);
    assert_eq!(messages.len(), 4, "{messages:?}");
    assert!(messages[0].contains("end date"));
    assert!(messages.iter().any(|m| m.contains("unknown timezone")));
}

#[test]
fn end_time_before_start_is_allowed_only_across_days() {
    let overnight = Timing::timed(t(22), t(2));
    let one_day = EventSchedule::new(
        d(2024, 1, 1),
        d(2024, 1, 1),
        overnight,
        "UTC",
        Recurrence::one_time(RepeatConfig::default().max_date),
    );
    assert!(one_day.is_err());

    let two_days = EventSchedule::new(
        d(2024, 1, 1),
        d(2024, 1, 2),
        overnight,
        "UTC",
        Recurrence::one_time(RepeatConfig::default().max_date),
    );
    assert!(two_days.is_ok());
}

#[test]
fn stop_before_start_is_rejected_for_stepping_rules() {
    let err = EventSchedule::new(
        d(2024, 6, 1),
        d(2024, 6, 1),
        Timing::AllDay,
        "UTC",
        Recurrence::new(
            RecurrenceKind::weekly([Weekday::Mon]),
            1,
            Some(d(2024, 1, 1)),
            WeekendSkip::None,
            RepeatConfig::default().max_date,
        ),
    )
    .unwrap_err();
    assert_eq!(validation_messages(err).len(), 1);
}

#[test]
fn failed_setter_leaves_schedule_unchanged() {
    let mut schedule = EventSchedule::new(
        d(2024, 1, 1),
        d(2024, 1, 1),
        Timing::AllDay,
        "Europe/Paris",
        Recurrence::one_time(RepeatConfig::default().max_date),
    )
    .unwrap();
    let before = schedule.clone();

    assert!(schedule.set_dates(d(2024, 1, 5), d(2024, 1, 4)).is_err());
    assert!(schedule.set_timezone("Nowhere/Special").is_err());
    assert_eq!(schedule, before);

    schedule.set_dates(d(2024, 1, 5), d(2024, 1, 7)).unwrap();
    assert_eq!(schedule.duration_days(), 2);
}

// ---------------------------------------------------------------------------
// Form input
// ---------------------------------------------------------------------------

#[test]
fn malformed_dates_fall_back_to_today() {
    let input = ScheduleInput {
        start_date: "2024-13-45".to_string(),
        end_date: Some("garbage".to_string()),
        all_day: true,
        ..ScheduleInput::default()
    };
    let schedule = EventSchedule::from_input(&input, &clock(), &RepeatConfig::default()).unwrap();
    assert_eq!(schedule.start_date(), d(2024, 5, 20));
    assert_eq!(schedule.end_date(), d(2024, 5, 20));
    assert!(schedule.timing().is_all_day());
    assert_eq!(schedule.timezone(), "UTC");
    assert!(!schedule.recurrence().is_recurring());
}

#[test]
fn input_with_rec_data_builds_the_rule() {
    let input = ScheduleInput {
        start_date: "2024-01-01".to_string(),
        end_date: None,
        all_day: false,
        first: Some(TimeBlock::new(t(9), t(12))),
        second: Some(TimeBlock::new(t(13), t(17))),
        timezone: Some("America/Chicago".to_string()),
        rec_data: Some(r#"{"type":4,"freq":1,"stop":"2024-03-01","listdays":[2,4]}"#.to_string()),
    };
    let schedule = EventSchedule::from_input(&input, &clock(), &RepeatConfig::default()).unwrap();
    assert!(schedule.timing().is_split());
    assert_eq!(schedule.timezone(), "America/Chicago");
    assert_eq!(
        schedule.recurrence().kind(),
        &RecurrenceKind::weekly([Weekday::Mon, Weekday::Wed])
    );
    assert_eq!(schedule.recurrence().stop(), d(2024, 3, 1));
}

#[test]
fn input_with_broken_rec_data_fails() {
    let input = ScheduleInput {
        start_date: "2024-01-01".to_string(),
        all_day: true,
        rec_data: Some(r#"{"type":42}"#.to_string()),
        ..ScheduleInput::default()
    };
    let err = EventSchedule::from_input(&input, &clock(), &RepeatConfig::default()).unwrap_err();
    assert!(matches!(err, RepeatError::InvalidRecurrenceRule(_)));
}
