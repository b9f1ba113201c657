//! Read-only projections over a collection snapshot.
//!
//! Nothing here mutates or persists. Callers take a snapshot from the
//! lifecycle controller and filter it for the viewer at hand.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::item::{Kind, Status, WorkItem};
use crate::retention::RetentionPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Who is looking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub username: String,
    pub role: Role,
    pub department: String,
}

impl Viewer {
    #[must_use]
    pub fn user(username: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::User,
            department: department.into(),
        }
    }

    #[must_use]
    pub fn admin(username: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            role: Role::Admin,
            ..Self::user(username, department)
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Only admins get the archive tab.
#[must_use]
pub fn can_view_archive(viewer: &Viewer) -> bool {
    viewer.is_admin()
}

#[must_use]
pub fn owned_by<'a>(items: &'a [WorkItem], user: &str) -> Vec<&'a WorkItem> {
    items.iter().filter(|item| item.creator == user).collect()
}

/// Archived projects: the viewer's department for admins, the viewer's own
/// projects otherwise.
#[must_use]
pub fn archived_projects<'a>(items: &'a [WorkItem], viewer: &Viewer) -> Vec<&'a WorkItem> {
    items
        .iter()
        .filter(|item| item.archived && item.kind == Kind::Project)
        .filter(|item| {
            if viewer.is_admin() {
                item.department == viewer.department
            } else {
                item.creator == viewer.username
            }
        })
        .collect()
}

/// In-process work: requests as soon as they are accepted, projects only once
/// quorum is met.
#[must_use]
pub fn accepted_items<'a>(items: &'a [WorkItem], user: &str) -> Vec<&'a WorkItem> {
    items
        .iter()
        .filter(|item| item.creator == user && item.status == Status::InProcess)
        .filter(|item| match item.kind {
            Kind::Request => true,
            Kind::Project => item.quorum_met(),
        })
        .collect()
}

#[must_use]
pub fn history_items<'a>(items: &'a [WorkItem], user: &str) -> Vec<&'a WorkItem> {
    items
        .iter()
        .filter(|item| item.creator == user && item.is_terminal())
        .collect()
}

/// First `limit` non-archived items owned by `user`, in collection order.
#[must_use]
pub fn recent_activity<'a>(items: &'a [WorkItem], user: &str, limit: usize) -> Vec<&'a WorkItem> {
    items
        .iter()
        .filter(|item| item.creator == user && !item.archived)
        .take(limit)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_process: usize,
    pub completed: usize,
    pub rejected: usize,
    pub total: usize,
}

#[must_use]
pub fn status_counts(items: &[WorkItem], user: &str) -> StatusCounts {
    items
        .iter()
        .filter(|item| item.creator == user)
        .fold(StatusCounts::default(), |mut counts, item| {
            match item.status {
                Status::Pending => counts.pending += 1,
                Status::InProcess => counts.in_process += 1,
                Status::Completed => counts.completed += 1,
                Status::Rejected => counts.rejected += 1,
            }
            counts.total += 1;
            counts
        })
}

/// Time left before an archived item is purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "days")]
pub enum DaysRemaining {
    Days(i64),
    DueToday,
    Unknown,
}

impl fmt::Display for DaysRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(1) => f.write_str("1 day left"),
            Self::Days(n) => write!(f, "{n} days left"),
            Self::DueToday => f.write_str("due today"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

const DAY_MS: i64 = 86_400_000;

/// Whole days, rounded up, until `archived_at` passes the purge window.
#[must_use]
pub fn days_remaining(
    archived_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> DaysRemaining {
    let Some(archived_at) = archived_at else {
        return DaysRemaining::Unknown;
    };
    let left_ms = (policy.archive_purge_after - (now - archived_at)).num_milliseconds();
    if left_ms <= 0 {
        DaysRemaining::DueToday
    } else {
        DaysRemaining::Days((left_ms + DAY_MS - 1) / DAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn item(id: &str, kind: Kind, creator: &str, department: &str, status: Status) -> WorkItem {
        let mut item = WorkItem::new(id, kind, creator, department, t0());
        item.status = status;
        item
    }

    fn archived(mut item: WorkItem) -> WorkItem {
        item.archived = true;
        item.archived_at = Some(t0());
        item
    }

    fn ids(items: &[&WorkItem]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn archived_projects_scope_by_role() {
        let items = vec![
            archived(item("p1", Kind::Project, "alice", "ops", Status::Pending)),
            archived(item("p2", Kind::Project, "bob", "ops", Status::Pending)),
            archived(item("p3", Kind::Project, "carol", "it", Status::Pending)),
            item("p4", Kind::Project, "alice", "ops", Status::Pending),
        ];

        let admin = Viewer::admin("dana", "ops");
        assert_eq!(ids(&archived_projects(&items, &admin)), vec!["p1", "p2"]);

        let alice = Viewer::user("alice", "ops");
        assert_eq!(ids(&archived_projects(&items, &alice)), vec!["p1"]);
        assert!(can_view_archive(&admin));
        assert!(!can_view_archive(&alice));
    }

    #[test]
    fn accepted_projects_need_quorum() {
        let items = vec![
            item("r1", Kind::Request, "alice", "ops", Status::InProcess),
            item("p1", Kind::Project, "alice", "ops", Status::InProcess).with_quorum(3, 2),
            item("p2", Kind::Project, "alice", "ops", Status::InProcess).with_quorum(3, 3),
            item("r2", Kind::Request, "alice", "ops", Status::Pending),
            item("r3", Kind::Request, "bob", "ops", Status::InProcess),
        ];
        assert_eq!(ids(&accepted_items(&items, "alice")), vec!["r1", "p2"]);
    }

    #[test]
    fn history_and_recent_activity() {
        let items = vec![
            item("a", Kind::Request, "alice", "ops", Status::Completed),
            archived(item("b", Kind::Project, "alice", "ops", Status::Pending)),
            item("c", Kind::Request, "alice", "ops", Status::Rejected),
            item("d", Kind::Request, "alice", "ops", Status::Pending),
            item("e", Kind::Request, "alice", "ops", Status::InProcess),
            item("f", Kind::Request, "bob", "ops", Status::Completed),
        ];
        assert_eq!(ids(&history_items(&items, "alice")), vec!["a", "c"]);
        assert_eq!(ids(&recent_activity(&items, "alice", 3)), vec!["a", "c", "d"]);
        assert_eq!(ids(&owned_by(&items, "bob")), vec!["f"]);
    }

    #[test]
    fn counts_only_the_users_items() {
        let items = vec![
            item("a", Kind::Request, "alice", "ops", Status::Completed),
            item("b", Kind::Request, "alice", "ops", Status::Pending),
            item("c", Kind::Project, "alice", "ops", Status::Pending),
            item("d", Kind::Request, "bob", "ops", Status::Rejected),
        ];
        assert_eq!(
            status_counts(&items, "alice"),
            StatusCounts {
                pending: 2,
                in_process: 0,
                completed: 1,
                rejected: 0,
                total: 3,
            }
        );
    }

    #[test]
    fn days_remaining_rounds_up() {
        let policy = RetentionPolicy::default();
        assert_eq!(
            days_remaining(Some(t0()), t0(), &policy),
            DaysRemaining::Days(7)
        );
        assert_eq!(
            days_remaining(Some(t0()), t0() + Duration::days(6) + Duration::hours(1), &policy),
            DaysRemaining::Days(1)
        );
        assert_eq!(
            days_remaining(Some(t0()), t0() + Duration::days(7), &policy),
            DaysRemaining::DueToday
        );
        assert_eq!(
            days_remaining(Some(t0()), t0() + Duration::days(9), &policy),
            DaysRemaining::DueToday
        );
        assert_eq!(days_remaining(None, t0(), &policy), DaysRemaining::Unknown);
        assert_eq!(DaysRemaining::Days(2).to_string(), "2 days left");
    }

    #[test]
    fn days_remaining_handles_windows_past_the_calendar() {
        let policy = RetentionPolicy {
            archive_purge_after: Duration::days(200_000_000),
            ..RetentionPolicy::default()
        };
        assert_eq!(
            days_remaining(Some(t0()), t0() + Duration::days(1), &policy),
            DaysRemaining::Days(199_999_999)
        );
    }
}
