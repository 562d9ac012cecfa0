//! Events, occurrences and details.
//!
//! Entities reference each other by opaque ID only; the storage collaborator
//! resolves IDs to records.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Permissions;
use crate::schedule::{EventSchedule, Timing};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(EventId);
id_type!(
    /// Assigned when an occurrence is first created and never reused. RSVP
    /// tickets and reminders refer to occurrences by this ID.
    OccurrenceId
);
id_type!(DetailId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
    Cancelled,
}

impl Status {
    /// Enabled or disabled; cancelled records are history.
    pub fn is_active(self) -> bool {
        self != Status::Cancelled
    }
}

/// Textual and location content shown for an event or a single occurrence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detail {
    pub id: DetailId,
    pub event_id: EventId,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub country: String,
    pub postal: String,
    pub url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// An event: the master record owning a schedule and a master detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub calendar_id: u32,
    pub master_detail_id: DetailId,
    pub status: Status,
    pub schedule: EventSchedule,
    pub perms: Permissions,
    pub revision: u32,
}

/// A generated occurrence, not yet matched against storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceCandidate {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timing: Timing,
}

/// One materialized instance of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub event_id: EventId,
    /// The event's master detail unless this instance was edited on its own.
    pub detail_id: DetailId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timing: Timing,
    pub status: Status,
    /// Cancelled on its own. Regeneration never brings this date back.
    pub excluded: bool,
    /// Times were set by a single-instance edit and survive regeneration.
    pub timing_override: bool,
    pub revision: u32,
}

impl Occurrence {
    /// A fresh record for `candidate` with a newly assigned ID.
    pub fn create(
        event_id: EventId,
        detail_id: DetailId,
        candidate: &OccurrenceCandidate,
        status: Status,
    ) -> Self {
        Self {
            id: OccurrenceId::new(),
            event_id,
            detail_id,
            start: candidate.start,
            end: candidate.end,
            timing: candidate.timing,
            status,
            excluded: false,
            timing_override: false,
            revision: 1,
        }
    }
}
