//! Lifecycle controller: the caller-facing transitions on work items.
//!
//! Each operation is one [`Ledger`] step: load, locate by id, validate,
//! mutate, save. Validation failures return before anything is written.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::error::LifecycleError;
use crate::ledger::{Commit, Ledger};
use crate::model::item::{Action, Kind, Status, WorkItem};

/// Status change produced by accept/complete/abandon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub id: String,
    pub kind: Kind,
    pub previous: Status,
    pub current: Status,
}

pub struct Lifecycle {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

const STATUS_TIME_KEY: &str = "lastStatusUpdateTime";

fn position(items: &[WorkItem], id: &str) -> Result<usize, LifecycleError> {
    items
        .iter()
        .position(|item| item.id == id)
        .ok_or_else(|| LifecycleError::NotFound { id: id.to_string() })
}

impl Lifecycle {
    #[must_use]
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Look up one item.
    pub fn get(&self, id: &str) -> Result<WorkItem, LifecycleError> {
        let items = self.ledger.snapshot()?;
        let idx = position(&items, id)?;
        Ok(items[idx].clone())
    }

    /// The whole collection, for views.
    pub fn snapshot(&self) -> Result<Vec<WorkItem>, LifecycleError> {
        Ok(self.ledger.snapshot()?)
    }

    fn change_status(
        &self,
        id: &str,
        action: Action,
        target: Status,
    ) -> Result<Transition, LifecycleError> {
        let now = self.clock.now();
        let transition = self.ledger.transact(|items| {
            let idx = position(items, id)?;
            let item = &mut items[idx];
            action
                .check(item)
                .map_err(|err| LifecycleError::invalid(id, err))?;

            let previous = item.status;
            item.status = target;
            if target.is_terminal() {
                item.last_status_update = Some(now);
                // Display copy kept by older dashboards; refresh it alongside.
                if let Some(shown) = item.extra.get_mut(STATUS_TIME_KEY) {
                    *shown = now.format("%-I:%M:%S %p").to_string().into();
                }
            }

            Ok::<_, LifecycleError>(Commit::Write(Transition {
                id: item.id.clone(),
                kind: item.kind,
                previous,
                current: target,
            }))
        })?;

        info!(
            id = %transition.id,
            action = %action,
            from = %transition.previous,
            to = %transition.current,
            "status changed"
        );
        Ok(transition)
    }

    /// Pending → In Process. Quorum bookkeeping for projects happens before
    /// this is called.
    pub fn accept(&self, id: &str) -> Result<Transition, LifecycleError> {
        self.change_status(id, Action::Accept, Status::InProcess)
    }

    /// Any status → Completed, stamping `lastStatusUpdate`.
    pub fn mark_completed(&self, id: &str) -> Result<Transition, LifecycleError> {
        self.change_status(id, Action::Complete, Status::Completed)
    }

    /// Request → Rejected, stamping `lastStatusUpdate`. Projects are refused.
    pub fn abandon(&self, id: &str) -> Result<Transition, LifecycleError> {
        self.change_status(id, Action::Abandon, Status::Rejected)
    }

    /// Hide a project and start its purge clock.
    pub fn archive(&self, id: &str) -> Result<WorkItem, LifecycleError> {
        let now = self.clock.now();
        let item = self.ledger.transact(|items| {
            let idx = position(items, id)?;
            let item = &mut items[idx];
            Action::Archive
                .check(item)
                .map_err(|err| LifecycleError::invalid(id, err))?;

            item.archived = true;
            item.archived_at = Some(now);
            Ok::<_, LifecycleError>(Commit::Write(item.clone()))
        })?;

        info!(id = %item.id, "archived");
        Ok(item)
    }

    /// Restore an archived item. Status is untouched.
    pub fn unarchive(&self, id: &str) -> Result<WorkItem, LifecycleError> {
        let item = self.ledger.transact(|items| {
            let idx = position(items, id)?;
            let item = &mut items[idx];
            item.archived = false;
            item.archived_at = None;
            Ok::<_, LifecycleError>(Commit::Write(item.clone()))
        })?;

        info!(id = %item.id, "unarchived");
        Ok(item)
    }

    /// Remove an item outright.
    pub fn delete_permanently(&self, id: &str) -> Result<WorkItem, LifecycleError> {
        let removed = self.ledger.transact(|items| {
            let idx = position(items, id)?;
            Ok::<_, LifecycleError>(Commit::Write(items.remove(idx)))
        })?;

        info!(id = %removed.id, "deleted permanently");
        Ok(removed)
    }

    /// Remove every completed or rejected item created by `creator`, faded or
    /// not. Returns the removed ids; an empty history is not an error.
    pub fn clear_history(&self, creator: &str) -> Result<Vec<String>, LifecycleError> {
        let removed = self.ledger.transact(|items| {
            let mut removed = Vec::new();
            items.retain(|item| {
                let drop = item.creator == creator && item.is_terminal();
                if drop {
                    removed.push(item.id.clone());
                }
                !drop
            });

            Ok::<_, LifecycleError>(if removed.is_empty() {
                Commit::Discard(removed)
            } else {
                Commit::Write(removed)
            })
        })?;

        info!(creator, count = removed.len(), "history cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::Lifecycle;
    use crate::clock::ManualClock;
    use crate::error::LifecycleError;
    use crate::ledger::Ledger;
    use crate::model::item::{Action, Kind, Status, WorkItem};
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 7, 9, 30, 0).unwrap()
    }

    fn harness(items: Vec<WorkItem>) -> (Arc<MemoryStore>, Arc<ManualClock>, Lifecycle) {
        let store = Arc::new(MemoryStore::with_items(items));
        let clock = Arc::new(ManualClock::new(start()));
        let ledger = Arc::new(Ledger::new(store.clone()));
        let lifecycle = Lifecycle::new(ledger, clock.clone());
        (store, clock, lifecycle)
    }

    fn request(id: &str, creator: &str) -> WorkItem {
        WorkItem::new(id, Kind::Request, creator, "ops", start())
    }

    fn project(id: &str, creator: &str) -> WorkItem {
        WorkItem::new(id, Kind::Project, creator, "ops", start()).with_quorum(2, 0)
    }

    #[test]
    fn accept_moves_pending_to_in_process() {
        let (store, _, lifecycle) = harness(vec![request("r1", "alice")]);
        let t = lifecycle.accept("r1").unwrap();
        assert_eq!((t.previous, t.current), (Status::Pending, Status::InProcess));

        let stored = &store.contents()[0];
        assert_eq!(stored.status, Status::InProcess);
        assert!(stored.last_status_update.is_none());
    }

    #[test]
    fn accept_refuses_non_pending() {
        let (store, _, lifecycle) = harness(vec![request("r1", "alice")]);
        lifecycle.accept("r1").unwrap();
        let err = lifecycle.accept("r1").unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidOperation {
                action: Action::Accept,
                ..
            }
        ));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn complete_stamps_last_status_update() {
        let (store, clock, lifecycle) = harness(vec![request("r1", "alice")]);
        clock.advance(Duration::minutes(90));
        lifecycle.mark_completed("r1").unwrap();

        let stored = &store.contents()[0];
        assert_eq!(stored.status, Status::Completed);
        assert_eq!(
            stored.last_status_update,
            Some(start() + Duration::minutes(90))
        );
    }

    #[test]
    fn recompleting_keeps_the_fade_marker() {
        let mut faded = request("r1", "alice");
        faded.status = Status::Completed;
        faded.last_status_update = Some(start() - Duration::days(2));
        faded.is_expired = true;
        let (store, _, lifecycle) = harness(vec![faded]);

        lifecycle.mark_completed("r1").unwrap();
        let stored = &store.contents()[0];
        assert!(stored.is_expired);
        assert_eq!(stored.last_status_update, Some(start()));
    }

    #[test]
    fn terminal_change_refreshes_legacy_display_time() {
        let mut done = request("r1", "alice");
        done.status = Status::Completed;
        done.extra
            .insert("lastStatusUpdateTime".into(), "10:42:00 AM".into());
        let (store, clock, lifecycle) = harness(vec![done, request("r2", "alice")]);
        clock.advance(Duration::hours(5));

        lifecycle.mark_completed("r1").unwrap();
        lifecycle.abandon("r2").unwrap();

        let stored = store.contents();
        assert_eq!(
            stored[0].extra["lastStatusUpdateTime"],
            (start() + Duration::hours(5))
                .format("%-I:%M:%S %p")
                .to_string()
        );
        assert!(!stored[1].extra.contains_key("lastStatusUpdateTime"));
    }

    #[test]
    fn abandon_rejects_requests() {
        let (store, _, lifecycle) = harness(vec![request("r1", "alice")]);
        let t = lifecycle.abandon("r1").unwrap();
        assert_eq!(t.current, Status::Rejected);
        assert_eq!(store.contents()[0].last_status_update, Some(start()));
    }

    #[test]
    fn abandon_refuses_projects_without_touching_them() {
        let (store, _, lifecycle) = harness(vec![project("p1", "alice")]);
        let before = serde_json::to_vec(&store.contents()).unwrap();

        let err = lifecycle.abandon("p1").unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidOperation { .. }));
        assert!(err.to_string().contains("projects cannot be abandoned"));

        let after = serde_json::to_vec(&store.contents()).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn archive_and_unarchive_keep_timestamp_in_step() {
        let (store, clock, lifecycle) = harness(vec![project("p1", "alice")]);
        clock.advance(Duration::hours(3));

        let archived = lifecycle.archive("p1").unwrap();
        assert!(archived.archived);
        assert_eq!(archived.archived_at, Some(start() + Duration::hours(3)));

        let restored = lifecycle.unarchive("p1").unwrap();
        assert!(!restored.archived);
        assert!(restored.archived_at.is_none());
        assert_eq!(restored.status, Status::Pending);
        assert!(store.contents()[0].invariant_violations().is_empty());
    }

    #[test]
    fn archive_refuses_requests() {
        let (_, _, lifecycle) = harness(vec![request("r1", "alice")]);
        assert!(matches!(
            lifecycle.archive("r1"),
            Err(LifecycleError::InvalidOperation {
                action: Action::Archive,
                ..
            })
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let (_, _, lifecycle) = harness(vec![request("r1", "alice")]);
        for result in [
            lifecycle.accept("nope").map(|_| ()),
            lifecycle.mark_completed("nope").map(|_| ()),
            lifecycle.abandon("nope").map(|_| ()),
            lifecycle.archive("nope").map(|_| ()),
            lifecycle.unarchive("nope").map(|_| ()),
            lifecycle.delete_permanently("nope").map(|_| ()),
            lifecycle.get("nope").map(|_| ()),
        ] {
            assert!(matches!(result, Err(LifecycleError::NotFound { ref id }) if id == "nope"));
        }
    }

    #[test]
    fn delete_removes_only_the_target() {
        let (store, _, lifecycle) =
            harness(vec![project("p1", "alice"), request("r1", "alice")]);
        let removed = lifecycle.delete_permanently("p1").unwrap();
        assert_eq!(removed.id, "p1");
        let ids: Vec<_> = store.contents().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["r1"]);
    }

    #[test]
    fn clear_history_is_scoped_to_creator_and_terminal_items() {
        let mut mine_done = request("a-done", "alice");
        mine_done.status = Status::Completed;
        mine_done.last_status_update = Some(start());
        let mut mine_faded = request("a-faded", "alice");
        mine_faded.status = Status::Rejected;
        mine_faded.last_status_update = Some(start() - Duration::days(3));
        mine_faded.is_expired = true;
        let mine_open = request("a-open", "alice");
        let mut theirs_done = request("b-done", "bob");
        theirs_done.status = Status::Completed;
        theirs_done.last_status_update = Some(start());

        let (store, _, lifecycle) = harness(vec![mine_done, mine_faded, mine_open, theirs_done]);
        let removed = lifecycle.clear_history("alice").unwrap();
        assert_eq!(removed, vec!["a-done", "a-faded"]);

        let ids: Vec<_> = store.contents().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a-open", "b-done"]);
    }

    #[test]
    fn clear_history_with_nothing_to_clear_skips_the_save() {
        let (store, _, lifecycle) = harness(vec![request("r1", "alice")]);
        assert!(lifecycle.clear_history("alice").unwrap().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn store_failure_surfaces_and_preserves_contents() {
        let (store, _, lifecycle) = harness(vec![request("r1", "alice")]);
        store.fail_saves(true);

        let err = lifecycle.accept("r1").unwrap_err();
        assert!(matches!(err, LifecycleError::StoreUnavailable(_)));
        assert_eq!(store.contents()[0].status, Status::Pending);

        store.fail_saves(false);
        assert!(lifecycle.accept("r1").is_ok());
    }
}
