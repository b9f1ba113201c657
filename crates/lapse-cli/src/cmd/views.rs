//! Read-only commands: `list`, `accepted`, `history`, `archived`, `stats`,
//! `show`, `check`.

use std::io::{self, Write};
use std::path::Path;

use clap::Args;
use lapse_core::clock::Clock;
use chrono::{DateTime, Utc};
use lapse_core::model::item::{InvariantViolation, Kind, WorkItem};
use lapse_core::retention::RetentionPolicy;
use lapse_core::views::{self, DaysRemaining, StatusCounts, Viewer};
use serde::Serialize;

use crate::cmd::Desk;
use crate::output::{
    CliError, OutputMode, Renderable, fail, pretty_kv, pretty_section, render, render_error,
    render_list,
};
use crate::user;

/// Items shown on the dashboard's "recent activity" strip.
const RECENT_LIMIT: usize = 3;

#[derive(Args, Debug)]
pub struct ArchivedArgs {
    /// Department-wide view, as an administrator.
    #[arg(long)]
    pub admin: bool,

    /// Department to show in the admin view.
    #[arg(long, requires = "admin")]
    pub department: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item ID.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ItemRow<'a> {
    #[serde(flatten)]
    item: &'a WorkItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    purge_in: Option<DaysRemaining>,
}

impl<'a> ItemRow<'a> {
    fn plain(item: &'a WorkItem) -> Self {
        Self {
            item,
            purge_in: None,
        }
    }

    fn archived(item: &'a WorkItem, now: DateTime<Utc>, policy: &RetentionPolicy) -> Self {
        Self {
            item,
            purge_in: Some(views::days_remaining(item.archived_at, now, policy)),
        }
    }

    fn flags(&self) -> String {
        let mut flags = Vec::new();
        if self.item.is_expired {
            flags.push("faded".to_string());
        }
        if let Some(purge_in) = self.purge_in {
            flags.push(format!("purge: {purge_in}"));
        } else if self.item.archived {
            flags.push("archived".to_string());
        }
        flags.join(", ")
    }
}

impl Renderable for ItemRow<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let item = self.item;
        let flags = self.flags();
        write!(w, "{:<16} {:<8} {:<11} {}", item.id, item.kind, item.status, item.title)?;
        if flags.is_empty() {
            writeln!(w)
        } else {
            writeln!(w, "  [{flags}]")
        }
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let item = self.item;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            item.id,
            item.kind,
            item.status,
            item.title,
            self.flags()
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "TYPE", "STATUS", "TITLE", "FLAGS"]
    }
}

fn rows<'a>(items: &[&'a WorkItem]) -> Vec<ItemRow<'a>> {
    items.iter().copied().map(ItemRow::plain).collect()
}

/// Shared shape of the per-user list commands.
fn run_user_list(
    user_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
    empty_note: &str,
    select: for<'a> fn(&'a [WorkItem], &str) -> Vec<&'a WorkItem>,
) -> anyhow::Result<()> {
    let user = user::require_user_or_render(user_flag, output)?;
    let desk = Desk::open(project_root, output)?;
    let items = desk.lifecycle().snapshot().map_err(|e| fail(output, e))?;
    render_list(&rows(&select(&items, &user)), output, empty_note)
}

pub fn run_list(user_flag: Option<&str>, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    run_user_list(user_flag, output, project_root, "No items.", views::owned_by)
}

pub fn run_accepted(
    user_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    run_user_list(
        user_flag,
        output,
        project_root,
        "Nothing in process.",
        views::accepted_items,
    )
}

pub fn run_history(
    user_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    run_user_list(
        user_flag,
        output,
        project_root,
        "History is empty.",
        views::history_items,
    )
}

pub fn run_archived(
    args: &ArchivedArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let user = user::require_user_or_render(user_flag, output)?;
    let viewer = if args.admin {
        let Some(department) = args.department.clone() else {
            render_error(
                output,
                &CliError::with_details(
                    "The admin archive view needs a department.",
                    "Pass --department <name>",
                    "missing_department",
                ),
            )?;
            anyhow::bail!("missing --department for admin archive view");
        };
        Viewer::admin(user, department)
    } else {
        Viewer::user(user, String::new())
    };
    tracing::debug!(admin = views::can_view_archive(&viewer), "archive view");

    let desk = Desk::open(project_root, output)?;
    let items = desk.lifecycle().snapshot().map_err(|e| fail(output, e))?;
    let now = desk.clock.now();
    let policy = desk.config.retention.policy();

    let rows: Vec<_> = views::archived_projects(&items, &viewer)
        .into_iter()
        .map(|item| ItemRow::archived(item, now, &policy))
        .collect();
    render_list(&rows, output, "No archived projects.")
}

#[derive(Debug, Serialize)]
struct Stats<'a> {
    user: String,
    counts: StatusCounts,
    recent: Vec<ItemRow<'a>>,
}

pub fn run_stats(user_flag: Option<&str>, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let user = user::require_user_or_render(user_flag, output)?;
    let desk = Desk::open(project_root, output)?;
    let items = desk.lifecycle().snapshot().map_err(|e| fail(output, e))?;

    let stats = Stats {
        counts: views::status_counts(&items, &user),
        recent: rows(&views::recent_activity(&items, &user, RECENT_LIMIT)),
        user,
    };

    render(output, &stats, |s, w| {
        let c = s.counts;
        if output == OutputMode::Text {
            writeln!(w, "pending\tin_process\tcompleted\trejected\ttotal")?;
            return writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                c.pending, c.in_process, c.completed, c.rejected, c.total
            );
        }
        pretty_section(w, &format!("Items for {}", s.user))?;
        pretty_kv(w, "Pending", c.pending.to_string())?;
        pretty_kv(w, "In Process", c.in_process.to_string())?;
        pretty_kv(w, "Completed", c.completed.to_string())?;
        pretty_kv(w, "Rejected", c.rejected.to_string())?;
        pretty_kv(w, "Total", c.total.to_string())?;
        writeln!(w)?;
        pretty_section(w, "Recent activity")?;
        if s.recent.is_empty() {
            writeln!(w, "Nothing yet.")?;
        }
        for row in &s.recent {
            row.render_human(w)?;
        }
        Ok(())
    })
}

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[derive(Debug, Serialize)]
struct ShowItem<'a> {
    #[serde(flatten)]
    row: ItemRow<'a>,
    violations: Vec<InvariantViolation>,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let item = desk.lifecycle().get(&args.id).map_err(|e| fail(output, e))?;
    let policy = desk.config.retention.policy();
    let row = if item.archived {
        ItemRow::archived(&item, desk.clock.now(), &policy)
    } else {
        ItemRow::plain(&item)
    };
    let shown = ShowItem {
        violations: item.invariant_violations(),
        row,
    };

    render(output, &shown, |s, w| {
        let item = s.row.item;
        pretty_section(w, &format!("{} {}", item.kind, item.id))?;
        pretty_kv(w, "Title", &item.title)?;
        pretty_kv(w, "Status", item.status.to_string())?;
        pretty_kv(w, "Creator", &item.creator)?;
        pretty_kv(w, "Department", &item.department)?;
        pretty_kv(w, "Created", fmt_time(Some(item.date_created)))?;
        pretty_kv(w, "Updated", fmt_time(item.last_status_update))?;
        if item.kind == Kind::Project {
            pretty_kv(
                w,
                "Quorum",
                format!("{}/{}", item.users_accepted, item.users_needed),
            )?;
        }
        if item.archived {
            pretty_kv(w, "Archived", fmt_time(item.archived_at))?;
        }
        if let Some(purge_in) = s.row.purge_in {
            pretty_kv(w, "Purge", purge_in.to_string())?;
        }
        if item.is_expired {
            pretty_kv(w, "Expired", "yes, removed on the next sweep")?;
        }
        for violation in &s.violations {
            pretty_kv(w, "Problem", violation.to_string())?;
        }
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct Problem {
    id: String,
    violations: Vec<InvariantViolation>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    checked: usize,
    problems: Vec<Problem>,
}

pub fn run_check(output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let items = desk.lifecycle().snapshot().map_err(|e| fail(output, e))?;

    let problems: Vec<Problem> = items
        .iter()
        .filter_map(|item| {
            let violations = item.invariant_violations();
            (!violations.is_empty()).then(|| Problem {
                id: item.id.clone(),
                violations,
            })
        })
        .collect();
    let report = CheckReport {
        checked: items.len(),
        problems,
    };

    render(output, &report, |r, w| {
        for problem in &r.problems {
            for violation in &problem.violations {
                writeln!(w, "{}\t{violation}", problem.id)?;
            }
        }
        if r.problems.is_empty() {
            writeln!(w, "✓ {} item(s) checked, no problems", r.checked)
        } else {
            writeln!(w, "{} of {} item(s) have problems", r.problems.len(), r.checked)
        }
    })?;

    if report.problems.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} item(s) break record invariants", report.problems.len())
    }
}
