//! Decide which occurrence updates a schedule edit requires.

use std::collections::BTreeSet;

use crate::schedule::EventSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScheduleAction {
    /// Regenerate every occurrence and reconcile against storage.
    FullRegenerate,
    /// Retire occurrences after the new, earlier stop date.
    Truncate,
    /// Generate occurrences up to the new, later stop date.
    Extend,
    /// Rewrite the time fields of existing occurrences.
    PropagateTimeOnly,
    /// A recurring event became one-time: keep only the first occurrence.
    CollapseToSingle,
    /// A one-time event was edited.
    SingleInstanceEdit,
}

/// Compare two schedules of the same event.
///
/// Checks are independent and several actions may be returned together, except
/// that `FullRegenerate` replaces `Truncate` and `Extend`.
pub fn classify(old: &EventSchedule, new: &EventSchedule) -> BTreeSet<ScheduleAction> {
    let mut actions = BTreeSet::new();
    let (old_rule, new_rule) = (old.recurrence(), new.recurrence());

    if old.start_date() != new.start_date() || old.end_date() != new.end_date() {
        actions.insert(ScheduleAction::FullRegenerate);
    }

    if (old_rule.is_recurring() || new_rule.is_recurring()) && !old_rule.same_pattern(new_rule) {
        actions.insert(ScheduleAction::FullRegenerate);
    }

    if old_rule.uses_stop() && new_rule.uses_stop() {
        if new_rule.stop() < old_rule.stop() {
            actions.insert(ScheduleAction::Truncate);
        } else if new_rule.stop() > old_rule.stop() {
            actions.insert(ScheduleAction::Extend);
        }
    }

    if old.timing() != new.timing() {
        actions.insert(ScheduleAction::PropagateTimeOnly);
    }

    match (old_rule.is_recurring(), new_rule.is_recurring()) {
        (true, false) => {
            actions.insert(ScheduleAction::CollapseToSingle);
        }
        (false, false) => {
            actions.insert(ScheduleAction::SingleInstanceEdit);
        }
        _ => {}
    }

    if actions.contains(&ScheduleAction::FullRegenerate) {
        actions.remove(&ScheduleAction::Truncate);
        actions.remove(&ScheduleAction::Extend);
    }

    tracing::debug!(?actions, "classified schedule change");
    actions
}
