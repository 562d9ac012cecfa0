//! # evlist-repeat
//!
//! Recurrence expansion and occurrence reconciliation for a CMS event calendar.
//!
//! An event carries one schedule (dates, times of day and a repeat rule). The
//! generator expands the schedule into dated occurrences, bounded by the
//! configured date range and a safety cap. On every save the result is
//! reconciled against the stored occurrences so that existing occurrence IDs
//! survive edits and only the necessary rows are written.
//!
//! ## Modules
//!
//! - [`dates`] - calendar arithmetic: Julian day numbers, weekdays, month grids
//! - [`rule`] - repeat rules and the `rec_data` blob format
//! - [`schedule`] - validated event schedules
//! - [`generator`] - schedule to occurrence dates
//! - [`reconcile`] - diff generated occurrences against stored ones
//! - [`classify`] - decide which updates a schedule edit requires
//! - [`service`] - transactional operations over a [`storage::RepeatStore`]
//! - [`storage`], [`cache`], [`access`], [`config`] - collaborators
//! - [`error`] - error types

pub mod access;
pub mod cache;
pub mod classify;
pub mod config;
pub mod dates;
pub mod error;
pub mod generator;
pub mod occurrence;
pub mod reconcile;
pub mod rule;
pub mod schedule;
pub mod service;
pub mod storage;

pub use access::{AccessCheck, AccessLevel, Permissions, Subject};
pub use classify::{classify, ScheduleAction};
pub use config::{Clock, FixedClock, RepeatConfig, RetentionPolicy, SystemClock};
pub use error::{RepeatError, Result};
pub use generator::{make_recurrences, Generation, Generator};
pub use occurrence::{
    Detail, DetailId, Event, EventId, Occurrence, OccurrenceCandidate, OccurrenceId, Status,
};
pub use reconcile::{reconcile, ReconcilePlan, TimingOverrides};
pub use rule::{Recurrence, RecurrenceData, RecurrenceKind, WeekendSkip};
pub use schedule::{EventSchedule, ScheduleInput, TimeBlock, Timing};
pub use service::{NewEvent, OccurrenceEdit, RepeatService, RepeatSummary, SaveOutcome};
pub use storage::{with_transaction, MemoryStore, RepeatStore, StorageError};
