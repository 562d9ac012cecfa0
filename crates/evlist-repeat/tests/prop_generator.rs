//! Property-based tests for date arithmetic, generation and reconciliation.

use chrono::{Datelike, NaiveDate, Weekday};
use evlist_repeat::dates::{date_to_days, days_to_date, weekday_of};
use evlist_repeat::{
    make_recurrences, reconcile, DetailId, EventId, EventSchedule, Occurrence,
    OccurrenceCandidate, Recurrence, RecurrenceKind, RepeatConfig, Status, Timing, TimingOverrides,
    WeekendSkip,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Any date in the default supported range, 1970-01-01 ..= 2037-12-31.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    let first = date_to_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    let last = date_to_days(NaiveDate::from_ymd_opt(2037, 12, 31).unwrap());
    (first..=last).prop_map(|n| days_to_date(n).unwrap())
}

/// A date in 2024-2025, where generated schedules stay short.
fn arb_recent_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..730).prop_map(|n| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n))
}

fn arb_weekend_skip() -> impl Strategy<Value = WeekendSkip> {
    prop_oneof![
        Just(WeekendSkip::None),
        Just(WeekendSkip::Skip),
        Just(WeekendSkip::NextWeekday),
    ]
}

fn arb_kind() -> impl Strategy<Value = RecurrenceKind> {
    prop_oneof![
        Just(RecurrenceKind::Daily),
        Just(RecurrenceKind::Yearly),
        prop::collection::vec(0u32..7, 1..4).prop_map(|days| {
            RecurrenceKind::weekly(days.into_iter().map(|n| match n {
                0 => Weekday::Sun,
                1 => Weekday::Mon,
                2 => Weekday::Tue,
                3 => Weekday::Wed,
                4 => Weekday::Thu,
                5 => Weekday::Fri,
                _ => Weekday::Sat,
            }))
        }),
        prop::collection::vec(1u32..=31, 1..4).prop_map(RecurrenceKind::monthly),
        (prop::collection::vec(1u8..=5, 1..3), 0u32..7).prop_map(|(ordinals, w)| {
            RecurrenceKind::day_of_month(ordinals, evlist_repeat::dates::weekday_from_sunday(w))
        }),
    ]
}

fn schedule(start: NaiveDate, kind: RecurrenceKind, freq: u32, stop: NaiveDate, skip: WeekendSkip) -> EventSchedule {
    EventSchedule::new(
        start,
        start,
        Timing::AllDay,
        "UTC",
        Recurrence::new(kind, freq, Some(stop), skip, RepeatConfig::default().max_date),
    )
    .unwrap()
}

fn candidate(date: NaiveDate) -> OccurrenceCandidate {
    OccurrenceCandidate {
        start: date,
        end: date,
        timing: Timing::AllDay,
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn day_count_round_trips(date in arb_date()) {
        prop_assert_eq!(days_to_date(date_to_days(date)), Some(date));
        prop_assert_eq!(weekday_of(date), date.weekday());
    }

    #[test]
    fn daily_produces_every_nth_day(
        start in arb_recent_date(),
        freq in 1u32..=10,
        span in 0i64..200,
    ) {
        let stop = start + chrono::Duration::days(span);
        let s = schedule(start, RecurrenceKind::Daily, freq, stop, WeekendSkip::None);
        let dates = make_recurrences(&s, &RepeatConfig::default()).dates();

        prop_assert_eq!(dates.len() as i64, span / i64::from(freq) + 1);
        for (i, date) in dates.iter().enumerate() {
            prop_assert_eq!(*date, start + chrono::Duration::days(i as i64 * i64::from(freq)));
        }
    }

    #[test]
    fn weekly_tue_thu_only_lands_on_those_days(
        start in arb_recent_date(),
        freq in 1u32..=4,
    ) {
        let stop = start + chrono::Duration::days(180);
        let s = schedule(
            start,
            RecurrenceKind::weekly([Weekday::Tue, Weekday::Thu]),
            freq,
            stop,
            WeekendSkip::None,
        );
        let dates = make_recurrences(&s, &RepeatConfig::default()).dates();
        prop_assert!(!dates.is_empty());
        for date in dates {
            prop_assert!(matches!(date.weekday(), Weekday::Tue | Weekday::Thu), "{}", date);
        }
    }

    #[test]
    fn output_is_sorted_unique_and_bounded(
        start in arb_recent_date(),
        kind in arb_kind(),
        freq in 1u32..=4,
        span in 0i64..900,
        skip in arb_weekend_skip(),
    ) {
        let stop = start + chrono::Duration::days(span);
        let s = schedule(start, kind, freq, stop, skip);
        let generation = make_recurrences(&s, &RepeatConfig::default());
        let dates = generation.dates();

        prop_assert!(!generation.truncated);
        prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        for date in &dates {
            prop_assert!(*date >= start);
            // A moved weekend occurrence may land up to two days past the stop date.
            prop_assert!(*date <= stop + chrono::Duration::days(2));
        }
        if skip == WeekendSkip::Skip && s.recurrence().applies_weekend_skip() {
            prop_assert!(dates.iter().all(|d| *d == start || !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        }
    }

    #[test]
    fn second_reconcile_pass_is_empty(
        existing_offsets in prop::collection::btree_set(0i64..60, 0..12),
        // 0: active, 1: retired by an earlier pass, 2: cancelled on its own.
        states in prop::collection::vec(0u8..3, 12),
        generated_offsets in prop::collection::btree_set(0i64..60, 0..12),
    ) {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (event, master) = (EventId::new(), DetailId::new());

        let mut records: Vec<Occurrence> = existing_offsets
            .iter()
            .zip(&states)
            .map(|(offset, state)| {
                let status = if *state == 0 { Status::Enabled } else { Status::Cancelled };
                let mut record = Occurrence::create(event, master, &candidate(base + chrono::Duration::days(*offset)), status);
                record.excluded = *state == 2;
                record
            })
            .collect();
        let generated: Vec<OccurrenceCandidate> = generated_offsets
            .iter()
            .map(|offset| candidate(base + chrono::Duration::days(*offset)))
            .collect();

        let plan = reconcile(&records, &generated, Status::Enabled, master, TimingOverrides::Keep);
        for updated in plan.to_update {
            if let Some(slot) = records.iter_mut().find(|o| o.id == updated.id) {
                *slot = updated;
            }
        }
        for retired in plan.to_retire {
            if let Some(slot) = records.iter_mut().find(|o| o.id == retired.id) {
                slot.status = Status::Cancelled;
            }
        }
        for c in plan.to_create {
            records.push(Occurrence::create(event, master, &c, plan.create_status));
        }

        let second = reconcile(
            &records,
            &generated,
            Status::Enabled,
            master,
            TimingOverrides::Keep,
        );
        prop_assert!(second.is_empty(), "{:?}", second);
    }
}
