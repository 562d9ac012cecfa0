//! Operations exposed to the CMS: generating, saving and editing occurrences.
//!
//! Every save runs read-existing -> diff -> write inside one storage transaction
//! while holding the store lock, so two saves of the same event cannot interleave
//! and a failed write leaves the previous occurrences in place.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::access::{AccessCheck, AccessLevel, Permissions};
use crate::cache::TagCache;
use crate::classify::{classify, ScheduleAction};
use crate::config::{RepeatConfig, RetentionPolicy};
use crate::error::{RepeatError, Result};
use crate::generator::{Generation, Generator};
use crate::occurrence::{
    Detail, DetailId, Event, EventId, Occurrence, OccurrenceId, Status,
};
use crate::reconcile::{orphaned_details, reconcile, ReconcilePlan, TimingOverrides};
use crate::schedule::{timing_errors, EventSchedule, Timing};
use crate::storage::{with_transaction, RepeatStore, StorageError};

const CACHE_CAPACITY: u64 = 10_000;

/// Counts of the writes made by one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepeatSummary {
    pub created: usize,
    pub updated: usize,
    pub retired: usize,
    pub details_retired: usize,
    /// Generation stopped at the safety cap.
    pub truncated: bool,
}

impl RepeatSummary {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.retired == 0 && self.details_retired == 0
    }

    fn absorb(&mut self, other: RepeatSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.retired += other.retired;
        self.details_retired += other.details_retired;
        self.truncated |= other.truncated;
    }
}

/// Result of [`RepeatService::save_schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub actions: BTreeSet<ScheduleAction>,
    pub summary: RepeatSummary,
}

/// Data for a new event. IDs are assigned on creation.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub calendar_id: u32,
    pub status: Status,
    pub schedule: EventSchedule,
    pub detail: Detail,
    pub perms: Permissions,
}

/// Changes to one occurrence, leaving the rest of the series alone.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceEdit {
    pub timing: Option<Timing>,
    /// Content for this occurrence only. The first such edit copies it into a
    /// new custom detail; later edits overwrite that detail.
    pub detail: Option<Detail>,
}

pub struct RepeatService<S: RepeatStore> {
    store: Mutex<S>,
    generator: Generator,
    cache: TagCache<Vec<Occurrence>>,
}

impl<S: RepeatStore> RepeatService<S> {
    pub fn new(store: S, config: RepeatConfig) -> Self {
        Self {
            store: Mutex::new(store),
            generator: Generator::new(config),
            cache: TagCache::new(CACHE_CAPACITY),
        }
    }

    pub fn config(&self) -> &RepeatConfig {
        self.generator.config()
    }

    /// Expand a schedule without touching storage.
    pub fn make_recurrences(&self, schedule: &EventSchedule) -> Generation {
        self.generator.generate(schedule)
    }

    /// Store a new event with its master detail and generate its occurrences.
    ///
    /// # Errors
    /// Returns `RepeatError::Storage` if any write fails; nothing is stored then.
    pub fn create_event(&self, new: NewEvent) -> Result<Event> {
        let event_id = EventId::new();
        let mut store = self.lock()?;
        let event = with_transaction(&mut *store, |store| {
            let detail = Detail {
                id: DetailId::new(),
                event_id,
                ..new.detail
            };
            store.save_detail(&detail)?;
            let event = Event {
                id: event_id,
                calendar_id: new.calendar_id,
                master_detail_id: detail.id,
                status: new.status,
                schedule: new.schedule,
                perms: new.perms,
                revision: 1,
            };
            store.save_event(&event)?;
            let summary = self.regenerate(store, &event, TimingOverrides::Keep)?;
            tracing::info!(event_id = %event.id, created = summary.created, "event created");
            Ok(event)
        });
        self.invalidate(event_id);
        event
    }

    /// Regenerate every occurrence of an event and reconcile with storage.
    ///
    /// # Errors
    /// `NotFound` for an unknown event, `AccessDenied` without edit access, and
    /// `Storage` if a write fails (all writes are then rolled back).
    pub fn update_repeats(
        &self,
        subject: &dyn AccessCheck,
        event_id: EventId,
    ) -> Result<RepeatSummary> {
        let mut store = self.lock()?;
        let result = with_transaction(&mut *store, |store| {
            let event = load_event_for(store, event_id, subject, AccessLevel::Edit)?;
            self.regenerate(store, &event, TimingOverrides::Keep)
        });
        self.invalidate(event_id);
        result
    }

    /// Replace an event's schedule and apply whatever occurrence changes the
    /// difference calls for.
    ///
    /// # Errors
    /// As for [`RepeatService::update_repeats`].
    pub fn save_schedule(
        &self,
        subject: &dyn AccessCheck,
        event_id: EventId,
        schedule: EventSchedule,
    ) -> Result<SaveOutcome> {
        let mut store = self.lock()?;
        let result = with_transaction(&mut *store, |store| {
            let mut event = load_event_for(store, event_id, subject, AccessLevel::Edit)?;
            let actions = classify(&event.schedule, &schedule);
            event.schedule = schedule;
            event.revision += 1;
            store.save_event(&event)?;

            let summary = self.execute(store, &event, &actions)?;
            tracing::info!(
                event_id = %event.id,
                ?actions,
                created = summary.created,
                updated = summary.updated,
                retired = summary.retired,
                "schedule saved"
            );
            Ok(SaveOutcome { actions, summary })
        });
        self.invalidate(event_id);
        result
    }

    /// Change an event's status. Cancelling or disabling the event carries over
    /// to its occurrences; occurrence changes never flow back to the event.
    ///
    /// # Errors
    /// As for [`RepeatService::update_repeats`].
    pub fn set_event_status(
        &self,
        subject: &dyn AccessCheck,
        event_id: EventId,
        status: Status,
    ) -> Result<RepeatSummary> {
        let mut store = self.lock()?;
        let result = with_transaction(&mut *store, |store| {
            let mut event = load_event_for(store, event_id, subject, AccessLevel::Edit)?;
            event.status = status;
            event.revision += 1;
            store.save_event(&event)?;
            self.regenerate(store, &event, TimingOverrides::Keep)
        });
        self.invalidate(event_id);
        result
    }

    /// Edit a single occurrence's times and/or content.
    ///
    /// # Errors
    /// `NotFound`, `AccessDenied`, `Validation` for an invalid time layout, and
    /// `Storage` on write failure.
    pub fn edit_occurrence(
        &self,
        subject: &dyn AccessCheck,
        occurrence_id: OccurrenceId,
        edit: OccurrenceEdit,
    ) -> Result<Occurrence> {
        let mut store = self.lock()?;
        let mut event_id = None;
        let result = with_transaction(&mut *store, |store| {
            let mut occurrence = load_occurrence(store, occurrence_id)?;
            event_id = Some(occurrence.event_id);
            let event = load_event_for(store, occurrence.event_id, subject, AccessLevel::Edit)?;

            if let Some(timing) = edit.timing {
                let errors = timing_errors(&timing, occurrence.start == occurrence.end);
                if !errors.is_empty() {
                    return Err(RepeatError::Validation(errors));
                }
                occurrence.timing = timing;
                occurrence.timing_override = true;
            }

            if let Some(content) = edit.detail {
                let id = if occurrence.detail_id == event.master_detail_id {
                    DetailId::new()
                } else {
                    occurrence.detail_id
                };
                let detail = Detail {
                    id,
                    event_id: event.id,
                    ..content
                };
                occurrence.detail_id = store.save_detail(&detail)?;
            }

            occurrence.revision += 1;
            store.save_occurrence(&occurrence)?;
            Ok(occurrence)
        });
        if let Some(event_id) = event_id {
            self.invalidate(event_id);
        }
        result
    }

    /// Cancel one occurrence. Later regenerations will not bring its date back.
    ///
    /// # Errors
    /// `NotFound`, `AccessDenied`, and `Storage` on write failure.
    pub fn cancel_occurrence(
        &self,
        subject: &dyn AccessCheck,
        occurrence_id: OccurrenceId,
    ) -> Result<Occurrence> {
        let mut store = self.lock()?;
        let mut event_id = None;
        let result = with_transaction(&mut *store, |store| {
            let occurrence = load_occurrence(store, occurrence_id)?;
            event_id = Some(occurrence.event_id);
            load_event_for(store, occurrence.event_id, subject, AccessLevel::Edit)?;
            store.cancel_occurrences(occurrence.event_id, &|o: &Occurrence| o.id == occurrence_id)?;
            load_occurrence(store, occurrence_id)
        });
        if let Some(event_id) = event_id {
            self.invalidate(event_id);
        }
        result
    }

    /// All stored occurrences of an event, cancelled ones included.
    ///
    /// # Errors
    /// Returns `Storage` if loading fails.
    pub fn occurrences(&self, event_id: EventId) -> Result<Vec<Occurrence>> {
        let key = cache_key(event_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        // Writers invalidate while holding the store lock, so keep it until the
        // list is cached.
        let store = self.lock()?;
        let occurrences = store.load_occurrences(event_id)?;
        let tag = event_tag(event_id);
        self.cache.set(key, occurrences.clone(), &[tag.as_str()]);
        drop(store);
        Ok(occurrences)
    }

    /// Active occurrences overlapping the inclusive window `from..=to`.
    ///
    /// # Errors
    /// Returns `Storage` if loading fails.
    pub fn occurrences_between(
        &self,
        event_id: EventId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Occurrence>> {
        Ok(self
            .occurrences(event_id)?
            .into_iter()
            .filter(|o| o.status.is_active() && o.start <= to && o.end >= from)
            .collect())
    }

    /// Read-only access to the underlying store.
    ///
    /// # Errors
    /// Returns `Storage` if the store lock is poisoned.
    pub fn with_store<T>(&self, read: impl FnOnce(&S) -> T) -> Result<T> {
        Ok(read(&*self.lock()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| RepeatError::from(StorageError::Backend("store lock poisoned".to_string())))
    }

    fn invalidate(&self, event_id: EventId) {
        self.cache.invalidate(&[event_tag(event_id).as_str()]);
    }

    /// Run the occurrence side of a schedule change.
    fn execute(
        &self,
        store: &mut S,
        event: &Event,
        actions: &BTreeSet<ScheduleAction>,
    ) -> Result<RepeatSummary> {
        let mut summary = RepeatSummary::default();

        if actions.contains(&ScheduleAction::CollapseToSingle) {
            summary.absorb(self.collapse_to_single(store, event)?);
        }

        let regenerate = [
            ScheduleAction::FullRegenerate,
            ScheduleAction::Extend,
            ScheduleAction::CollapseToSingle,
            ScheduleAction::SingleInstanceEdit,
        ]
        .iter()
        .any(|a| actions.contains(a));

        if regenerate {
            let overrides = if actions.contains(&ScheduleAction::FullRegenerate)
                || actions.contains(&ScheduleAction::PropagateTimeOnly)
            {
                TimingOverrides::Reset
            } else {
                TimingOverrides::Keep
            };
            summary.absorb(self.regenerate(store, event, overrides)?);
        } else {
            if actions.contains(&ScheduleAction::Truncate) {
                summary.absorb(self.truncate(store, event)?);
            }
            if actions.contains(&ScheduleAction::PropagateTimeOnly) {
                summary.absorb(propagate_timing(store, event)?);
            }
        }
        Ok(summary)
    }

    fn regenerate(
        &self,
        store: &mut S,
        event: &Event,
        overrides: TimingOverrides,
    ) -> Result<RepeatSummary> {
        let generation = self.generator.generate(&event.schedule);
        let existing = store.load_occurrences(event.id)?;
        let plan = reconcile(
            &existing,
            &generation.occurrences,
            event.status,
            event.master_detail_id,
            overrides,
        );
        let mut summary = self.apply_plan(store, event, plan)?;
        summary.truncated = generation.truncated;
        Ok(summary)
    }

    /// Retire active occurrences after the schedule's stop date.
    fn truncate(&self, store: &mut S, event: &Event) -> Result<RepeatSummary> {
        let stop = event.schedule.recurrence().stop();
        let existing = store.load_occurrences(event.id)?;
        let surplus: Vec<Occurrence> = existing
            .iter()
            .filter(|o| o.status.is_active() && o.start > stop)
            .cloned()
            .collect();
        self.retire(store, event, &existing, surplus)
    }

    /// Retire every active occurrence after the first.
    fn collapse_to_single(&self, store: &mut S, event: &Event) -> Result<RepeatSummary> {
        let existing = store.load_occurrences(event.id)?;
        let surplus: Vec<Occurrence> = existing
            .iter()
            .filter(|o| o.status.is_active())
            .skip(1)
            .cloned()
            .collect();
        self.retire(store, event, &existing, surplus)
    }

    fn retire(
        &self,
        store: &mut S,
        event: &Event,
        existing: &[Occurrence],
        surplus: Vec<Occurrence>,
    ) -> Result<RepeatSummary> {
        let plan = ReconcilePlan {
            create_status: event.status,
            details_to_retire: orphaned_details(existing, &surplus, event.master_detail_id),
            to_retire: surplus,
            ..ReconcilePlan::default()
        };
        self.apply_plan(store, event, plan)
    }

    fn apply_plan(&self, store: &mut S, event: &Event, plan: ReconcilePlan) -> Result<RepeatSummary> {
        let mut summary = RepeatSummary::default();

        for occurrence in &plan.to_update {
            store.save_occurrence(occurrence)?;
            summary.updated += 1;
        }

        for candidate in &plan.to_create {
            let occurrence = Occurrence::create(
                event.id,
                event.master_detail_id,
                candidate,
                plan.create_status,
            );
            store.save_occurrence(&occurrence)?;
            summary.created += 1;
        }

        match self.config().retention {
            RetentionPolicy::Cancel => {
                for occurrence in &plan.to_retire {
                    let mut retired = occurrence.clone();
                    retired.status = Status::Cancelled;
                    retired.revision += 1;
                    if plan.details_to_retire.contains(&retired.detail_id) {
                        retired.detail_id = event.master_detail_id;
                    }
                    store.save_occurrence(&retired)?;
                }
            }
            RetentionPolicy::Delete => {
                let ids: Vec<OccurrenceId> = plan.to_retire.iter().map(|o| o.id).collect();
                if !ids.is_empty() {
                    store.delete_occurrences(&ids)?;
                }
            }
        }
        summary.retired = plan.to_retire.len();

        for detail_id in &plan.details_to_retire {
            store.delete_detail(*detail_id)?;
            summary.details_retired += 1;
        }

        if !summary.is_noop() {
            tracing::info!(
                event_id = %event.id,
                created = summary.created,
                updated = summary.updated,
                retired = summary.retired,
                "applied occurrence changes"
            );
        }
        Ok(summary)
    }
}

/// Rewrite the times of every active occurrence, keeping dates. Single-instance
/// time edits are overwritten.
fn propagate_timing<S: RepeatStore + ?Sized>(store: &mut S, event: &Event) -> Result<RepeatSummary> {
    let timing = *event.schedule.timing();
    let mut summary = RepeatSummary::default();
    for mut occurrence in store.load_occurrences(event.id)? {
        if occurrence.status.is_active()
            && (occurrence.timing != timing || occurrence.timing_override)
        {
            occurrence.timing = timing;
            occurrence.timing_override = false;
            occurrence.revision += 1;
            store.save_occurrence(&occurrence)?;
            summary.updated += 1;
        }
    }
    Ok(summary)
}

fn load_event_for<S: RepeatStore + ?Sized>(
    store: &S,
    event_id: EventId,
    subject: &dyn AccessCheck,
    required: AccessLevel,
) -> Result<Event> {
    let event = store
        .load_event(event_id)?
        .ok_or_else(|| RepeatError::NotFound(format!("event {event_id}")))?;
    if !subject.has_access(&event.perms, required) {
        return Err(RepeatError::AccessDenied(format!("event {event_id}")));
    }
    Ok(event)
}

fn load_occurrence<S: RepeatStore + ?Sized>(store: &S, id: OccurrenceId) -> Result<Occurrence> {
    store
        .load_occurrence(id)?
        .ok_or_else(|| RepeatError::NotFound(format!("occurrence {id}")))
}

fn cache_key(event_id: EventId) -> String {
    format!("occurrences:{event_id}")
}

fn event_tag(event_id: EventId) -> String {
    format!("event:{event_id}")
}
