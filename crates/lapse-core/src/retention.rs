//! Retention sweep: time-based fading and purging of work items.
//!
//! Two independent rules run in one pass:
//!
//! - **Archive purge.** An archived item still `Pending` is removed once
//!   `archivedAt + archive_purge_after` has passed. Archived items in any other
//!   status are left alone.
//! - **Two-phase expiry.** A `Completed`/`Rejected` item is first marked
//!   `isExpired` once `lastStatusUpdate + expiry_fade_after` has passed, and
//!   removed on the following sweep.
//!
//! Records missing the timestamp a rule needs are skipped, not rejected.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::model::item::{Status, WorkItem};

/// Thresholds for both sweep rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub archive_purge_after: Duration,
    pub expiry_fade_after: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            archive_purge_after: Duration::days(7),
            expiry_fade_after: Duration::days(1),
        }
    }
}

impl RetentionPolicy {
    /// Instant after which an archived pending item is purged, or `None` when
    /// the window reaches past the representable calendar (never due).
    #[must_use]
    pub fn purge_at(&self, archived_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        archived_at.checked_add_signed(self.archive_purge_after)
    }

    /// Instant after which a terminal item starts fading; `None` means never.
    #[must_use]
    pub fn fade_at(&self, last_status_update: DateTime<Utc>) -> Option<DateTime<Utc>> {
        last_status_update.checked_add_signed(self.expiry_fade_after)
    }
}

/// What one sweep did, by item id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Archived pending items past their purge window.
    pub purged_archived: Vec<String>,
    /// Terminal items newly marked `isExpired`.
    pub faded: Vec<String>,
    /// Items that were already marked and are now gone.
    pub purged_expired: Vec<String>,
}

impl SweepReport {
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.purged_archived.len() + self.purged_expired.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.purged_archived.is_empty() && self.faded.is_empty() && self.purged_expired.is_empty()
    }
}

/// Result of [`sweep`].
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    /// Surviving collection, original order preserved.
    pub items: Vec<WorkItem>,
    /// True when anything was removed or marked; callers persist and notify only then.
    pub changed: bool,
    pub report: SweepReport,
}

enum Verdict {
    Keep,
    Fade,
    PurgeArchived,
    PurgeExpired,
}

fn judge(item: &WorkItem, now: DateTime<Utc>, policy: &RetentionPolicy) -> Verdict {
    if item.archived && item.status == Status::Pending {
        match item.archived_at {
            Some(archived_at) if policy.purge_at(archived_at).is_some_and(|due| now > due) => {
                return Verdict::PurgeArchived;
            }
            Some(_) => {}
            None => debug!(id = %item.id, "archived without archivedAt, never due for purge"),
        }
    }

    if item.is_terminal() {
        let Some(updated) = item.last_status_update else {
            debug!(id = %item.id, "terminal item without lastStatusUpdate, skipping expiry");
            return Verdict::Keep;
        };
        if item.is_expired {
            return Verdict::PurgeExpired;
        }
        if policy.fade_at(updated).is_some_and(|due| now > due) {
            return Verdict::Fade;
        }
    }

    Verdict::Keep
}

/// Evaluate both retention rules over the whole collection at `now`.
///
/// Pure: the only effect is the returned outcome.
#[must_use]
pub fn sweep(items: Vec<WorkItem>, now: DateTime<Utc>, policy: &RetentionPolicy) -> SweepOutcome {
    let mut report = SweepReport::default();
    let mut survivors = Vec::with_capacity(items.len());

    for mut item in items {
        match judge(&item, now, policy) {
            Verdict::Keep => survivors.push(item),
            Verdict::Fade => {
                item.is_expired = true;
                report.faded.push(item.id.clone());
                survivors.push(item);
            }
            Verdict::PurgeArchived => report.purged_archived.push(item.id),
            Verdict::PurgeExpired => report.purged_expired.push(item.id),
        }
    }

    SweepOutcome {
        items: survivors,
        changed: !report.is_empty(),
        report,
    }
}
