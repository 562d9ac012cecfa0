//! Engine configuration and the clock collaborator.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::dates::WeekStart;
use crate::error::Result;

/// What happens to occurrences that a schedule change leaves without a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Keep the record with status `Cancelled`.
    #[default]
    Cancel,
    /// Remove the record.
    Delete,
}

/// Settings passed into the generator and the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepeatConfig {
    /// Upper bound on occurrences produced by one generation pass.
    pub max_repeats: usize,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub week_start: WeekStart,
    /// IANA identifier of the site timezone.
    pub timezone: String,
    pub retention: RetentionPolicy,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            max_repeats: 1000,
            min_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN),
            max_date: NaiveDate::from_ymd_opt(2037, 12, 31).unwrap_or(NaiveDate::MAX),
            week_start: WeekStart::Sunday,
            timezone: "UTC".to_string(),
            retention: RetentionPolicy::Cancel,
        }
    }
}

impl RepeatConfig {
    /// Load from an optional `evlist.toml` and `EVLIST_*` environment variables,
    /// e.g. `EVLIST_MAX_REPEATS=500`. Environment variables take precedence.
    ///
    /// # Errors
    /// Returns an error if a source cannot be read or deserialized.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("evlist").required(false))
            .add_source(
                config::Environment::with_prefix("EVLIST")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize::<RepeatConfig>()?.sanitized())
    }

    /// Repair values that would make generation meaningless.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.max_repeats == 0 {
            tracing::warn!("max_repeats of 0 is not usable, using {}", defaults.max_repeats);
            self.max_repeats = defaults.max_repeats;
        }
        if self.min_date >= self.max_date {
            tracing::warn!(
                min_date = %self.min_date,
                max_date = %self.max_date,
                "date bounds are inverted, using defaults"
            );
            self.min_date = defaults.min_date;
            self.max_date = defaults.max_date;
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            tracing::warn!(timezone = %self.timezone, "unknown timezone, using UTC");
            self.timezone = defaults.timezone;
        }
        self
    }

    /// The configured site timezone. Unknown identifiers fall back to UTC.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the site timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: chrono_tz::Tz,
}

impl SystemClock {
    pub fn new(tz: chrono_tz::Tz) -> Self {
        Self { tz }
    }

    pub fn from_config(config: &RepeatConfig) -> Self {
        Self::new(config.tz())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
