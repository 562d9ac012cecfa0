//! Reconciliation of generated occurrences against stored records.
//!
//! Existing active records and generated candidates are walked in date order
//! with a single cursor into the records. A record dated on or before the
//! current candidate is reused for it (updated in place if anything differs),
//! so occurrence IDs survive schedule edits. Candidates with no such record
//! restore a retired record of the same date if there is one, and are created
//! otherwise; records left over at the end are retired.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::occurrence::{DetailId, Occurrence, OccurrenceCandidate, Status};

/// Writes needed to bring stored occurrences in line with a generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Existing records carrying their new values, revision already bumped.
    /// Restored records are included here.
    pub to_update: Vec<Occurrence>,
    /// Candidates that need a new record.
    pub to_create: Vec<OccurrenceCandidate>,
    /// Status for newly created records.
    pub create_status: Status,
    /// Surplus records, unchanged, to be cancelled or deleted.
    pub to_retire: Vec<Occurrence>,
    /// Custom details referenced only by retired records.
    pub details_to_retire: Vec<DetailId>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_update.is_empty() && self.to_create.is_empty() && self.to_retire.is_empty()
    }
}

/// What happens to times set on a single occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingOverrides {
    /// Edited occurrences keep their own times.
    #[default]
    Keep,
    /// Every occurrence takes the generated times and loses its override.
    Reset,
}

/// Plan the writes that turn `existing` into `generated`.
///
/// Only active records take part in the positional walk. Cancelled records
/// split two ways:
/// - one cancelled on its own (`excluded`) keeps its date out of the result,
///   unless an active record also holds that date;
/// - one retired by an earlier pass is restored when its date is generated
///   again, keeping its ID.
///
/// When the event itself is cancelled every active record is retired.
pub fn reconcile(
    existing: &[Occurrence],
    generated: &[OccurrenceCandidate],
    event_status: Status,
    master_detail: DetailId,
    overrides: TimingOverrides,
) -> ReconcilePlan {
    let mut active: Vec<&Occurrence> = existing.iter().filter(|o| o.status.is_active()).collect();
    active.sort_by_key(|o| o.start);

    let mut plan = ReconcilePlan {
        create_status: event_status,
        ..ReconcilePlan::default()
    };

    if event_status == Status::Cancelled {
        plan.to_retire = active.into_iter().cloned().collect();
        plan.details_to_retire = orphaned_details(existing, &plan.to_retire, master_detail);
        return plan;
    }

    let active_dates: HashSet<NaiveDate> = active.iter().map(|o| o.start).collect();
    let excluded: HashSet<NaiveDate> = existing
        .iter()
        .filter(|o| o.status == Status::Cancelled && o.excluded && !active_dates.contains(&o.start))
        .map(|o| o.start)
        .collect();
    let mut retired: HashMap<NaiveDate, &Occurrence> = HashMap::new();
    for record in existing
        .iter()
        .filter(|o| o.status == Status::Cancelled && !o.excluded)
    {
        retired.entry(record.start).or_insert(record);
    }

    let mut i = 0;
    let mut restored = 0;
    for candidate in generated.iter().filter(|c| !excluded.contains(&c.start)) {
        match active.get(i) {
            Some(record) if record.start <= candidate.start => {
                let mut updated = refreshed(record, candidate, event_status, overrides);
                if updated != **record {
                    updated.revision += 1;
                    plan.to_update.push(updated);
                }
                i += 1;
            }
            _ => match retired.remove(&candidate.start) {
                Some(record) => {
                    let mut revived =
                        refreshed(record, candidate, event_status, TimingOverrides::Reset);
                    revived.revision += 1;
                    plan.to_update.push(revived);
                    restored += 1;
                }
                None => plan.to_create.push(*candidate),
            },
        }
    }

    plan.to_retire = active[i.min(active.len())..]
        .iter()
        .map(|o| (*o).clone())
        .collect();
    plan.details_to_retire = orphaned_details(existing, &plan.to_retire, master_detail);

    tracing::debug!(
        updated = plan.to_update.len(),
        restored,
        created = plan.to_create.len(),
        retired = plan.to_retire.len(),
        "reconciled occurrences"
    );
    plan
}

/// `record` carrying the candidate's dates and times, and `status`.
fn refreshed(
    record: &Occurrence,
    candidate: &OccurrenceCandidate,
    status: Status,
    overrides: TimingOverrides,
) -> Occurrence {
    let mut updated = record.clone();
    updated.start = candidate.start;
    updated.end = candidate.end;
    updated.status = status;
    if !(record.timing_override && overrides == TimingOverrides::Keep) {
        updated.timing = candidate.timing;
        updated.timing_override = false;
    }
    updated
}

/// Custom details of `retired` records that no remaining record still uses.
pub(crate) fn orphaned_details(
    existing: &[Occurrence],
    retired: &[Occurrence],
    master_detail: DetailId,
) -> Vec<DetailId> {
    let retired_ids: HashSet<_> = retired.iter().map(|o| o.id).collect();
    let still_used: HashSet<DetailId> = existing
        .iter()
        .filter(|o| !retired_ids.contains(&o.id))
        .map(|o| o.detail_id)
        .collect();

    let mut details: Vec<DetailId> = retired
        .iter()
        .map(|o| o.detail_id)
        .filter(|d| *d != master_detail && !still_used.contains(d))
        .collect();
    details.sort();
    details.dedup();
    details
}
