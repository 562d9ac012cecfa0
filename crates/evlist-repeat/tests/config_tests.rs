//! Configuration loading. Kept in its own test binary because it sets process
//! environment variables.

use chrono::NaiveDate;
use evlist_repeat::dates::WeekStart;
use evlist_repeat::{Clock, RepeatConfig, RetentionPolicy, SystemClock};

#[test]
fn defaults_match_supported_range() {
    let config = RepeatConfig::default();
    assert_eq!(config.max_repeats, 1000);
    assert_eq!(config.min_date, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    assert_eq!(config.max_date, NaiveDate::from_ymd_opt(2037, 12, 31).unwrap());
    assert_eq!(config.week_start, WeekStart::Sunday);
    assert_eq!(config.retention, RetentionPolicy::Cancel);
    assert_eq!(config.tz(), chrono_tz::UTC);
}

#[test]
fn system_clock_reads_the_site_timezone() {
    let config = RepeatConfig {
        timezone: "Pacific/Auckland".to_string(),
        ..RepeatConfig::default()
    };
    let clock = SystemClock::from_config(&config);
    let utc_today = chrono::Utc::now().date_naive();
    assert!((clock.today() - utc_today).num_days().abs() <= 1);
}

#[test]
fn sanitized_repairs_unusable_values() {
    let config = RepeatConfig {
        max_repeats: 0,
        min_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        max_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        timezone: "Not/AZone".to_string(),
        ..RepeatConfig::default()
    }
    .sanitized();
    assert_eq!(config, RepeatConfig::default());
}

#[test]
fn environment_overrides_defaults() {
    std::env::set_var("EVLIST_MAX_REPEATS", "250");
    std::env::set_var("EVLIST_WEEK_START", "monday");
    std::env::set_var("EVLIST_TIMEZONE", "Europe/Berlin");
    std::env::set_var("EVLIST_RETENTION", "delete");

    let config = RepeatConfig::load().unwrap();

    std::env::remove_var("EVLIST_MAX_REPEATS");
    std::env::remove_var("EVLIST_WEEK_START");
    std::env::remove_var("EVLIST_TIMEZONE");
    std::env::remove_var("EVLIST_RETENTION");

    assert_eq!(config.max_repeats, 250);
    assert_eq!(config.week_start, WeekStart::Monday);
    assert_eq!(config.timezone, "Europe/Berlin");
    assert_eq!(config.retention, RetentionPolicy::Delete);
    assert_eq!(config.max_date, RepeatConfig::default().max_date);
}
