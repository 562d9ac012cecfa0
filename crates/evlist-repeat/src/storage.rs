//! Storage collaborator for events, occurrences and details.
//!
//! Each call is atomic on its own. Multi-row changes go through
//! [`with_transaction`] so that a failure part way through leaves the store as it
//! was before the first write.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::Result;
use crate::occurrence::{Detail, DetailId, Event, EventId, Occurrence, OccurrenceId, Status};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub trait RepeatStore {
    fn load_event(&self, id: EventId) -> StorageResult<Option<Event>>;
    fn save_event(&mut self, event: &Event) -> StorageResult<()>;

    /// All occurrences of an event, cancelled ones included, ordered by start date.
    fn load_occurrences(&self, event_id: EventId) -> StorageResult<Vec<Occurrence>>;
    fn load_occurrence(&self, id: OccurrenceId) -> StorageResult<Option<Occurrence>>;
    /// Insert or replace by ID.
    fn save_occurrence(&mut self, occurrence: &Occurrence) -> StorageResult<OccurrenceId>;
    /// Cancel the active occurrences of `event_id` accepted by `predicate` as
    /// single-instance cancellations: each is marked `excluded` and its revision
    /// bumped. Returns how many were cancelled.
    fn cancel_occurrences(
        &mut self,
        event_id: EventId,
        predicate: &dyn Fn(&Occurrence) -> bool,
    ) -> StorageResult<usize>;
    fn delete_occurrences(&mut self, ids: &[OccurrenceId]) -> StorageResult<()>;

    fn load_detail(&self, id: DetailId) -> StorageResult<Option<Detail>>;
    fn save_detail(&mut self, detail: &Detail) -> StorageResult<DetailId>;
    fn delete_detail(&mut self, id: DetailId) -> StorageResult<()>;

    fn begin(&mut self) -> StorageResult<()>;
    fn commit(&mut self) -> StorageResult<()>;
    fn rollback(&mut self) -> StorageResult<()>;
}

/// Run `callback` inside a storage transaction, committing on success and rolling
/// back on any error.
///
/// # Errors
/// Returns the callback's error, or a storage error from begin/commit.
pub fn with_transaction<S, T, F>(store: &mut S, callback: F) -> Result<T>
where
    S: RepeatStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    store.begin()?;
    match callback(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::error!(%rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    occurrences: HashMap<OccurrenceId, Occurrence>,
    details: HashMap<DetailId, Detail>,
}

/// In-process store. Transactions snapshot the tables on `begin` and restore
/// them on `rollback`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepeatStore for MemoryStore {
    fn load_event(&self, id: EventId) -> StorageResult<Option<Event>> {
        Ok(self.tables.events.get(&id).cloned())
    }

    fn save_event(&mut self, event: &Event) -> StorageResult<()> {
        self.tables.events.insert(event.id, event.clone());
        Ok(())
    }

    fn load_occurrences(&self, event_id: EventId) -> StorageResult<Vec<Occurrence>> {
        let mut occurrences: Vec<Occurrence> = self
            .tables
            .occurrences
            .values()
            .filter(|o| o.event_id == event_id)
            .cloned()
            .collect();
        occurrences.sort_by_key(|o| (o.start, o.status == Status::Cancelled, o.id));
        Ok(occurrences)
    }

    fn load_occurrence(&self, id: OccurrenceId) -> StorageResult<Option<Occurrence>> {
        Ok(self.tables.occurrences.get(&id).cloned())
    }

    fn save_occurrence(&mut self, occurrence: &Occurrence) -> StorageResult<OccurrenceId> {
        if !self.tables.events.contains_key(&occurrence.event_id) {
            return Err(StorageError::NotFound(format!(
                "event {}",
                occurrence.event_id
            )));
        }
        self.tables
            .occurrences
            .insert(occurrence.id, occurrence.clone());
        Ok(occurrence.id)
    }

    fn cancel_occurrences(
        &mut self,
        event_id: EventId,
        predicate: &dyn Fn(&Occurrence) -> bool,
    ) -> StorageResult<usize> {
        let mut cancelled = 0;
        for occurrence in self.tables.occurrences.values_mut() {
            if occurrence.event_id == event_id
                && occurrence.status.is_active()
                && predicate(occurrence)
            {
                occurrence.status = Status::Cancelled;
                occurrence.excluded = true;
                occurrence.revision += 1;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    fn delete_occurrences(&mut self, ids: &[OccurrenceId]) -> StorageResult<()> {
        for id in ids {
            self.tables.occurrences.remove(id);
        }
        Ok(())
    }

    fn load_detail(&self, id: DetailId) -> StorageResult<Option<Detail>> {
        Ok(self.tables.details.get(&id).cloned())
    }

    fn save_detail(&mut self, detail: &Detail) -> StorageResult<DetailId> {
        self.tables.details.insert(detail.id, detail.clone());
        Ok(detail.id)
    }

    fn delete_detail(&mut self, id: DetailId) -> StorageResult<()> {
        self.tables.details.remove(&id);
        Ok(())
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.snapshot.is_some() {
            return Err(StorageError::Transaction(
                "transaction already open".to_string(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StorageError::Transaction("no open transaction".to_string()))
    }

    fn rollback(&mut self) -> StorageResult<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| StorageError::Transaction("no open transaction".to_string()))?;
        self.tables = snapshot;
        Ok(())
    }
}
