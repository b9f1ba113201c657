//! `lapse accept|complete|abandon|archive|unarchive|delete|clear-history`.
//!
//! Each command is a single lifecycle call; refusals render with their error
//! code and leave the store untouched.

use std::io::{IsTerminal, Write};
use std::path::Path;

use clap::Args;
use lapse_core::model::item::Action;
use serde::Serialize;

use crate::cmd::Desk;
use crate::output::{OutputMode, fail, render, render_success};
use crate::user;

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Item ID.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Item ID to remove permanently.
    pub id: String,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ClearHistoryArgs {
    /// Skip the interactive confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Ask on a terminal; non-interactive callers are taken as confirmed.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        return Ok(true);
    }

    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Accept, complete or abandon one item.
pub fn run_status(
    action: Action,
    args: &IdArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let lifecycle = desk.lifecycle();
    let result = match action {
        Action::Accept => lifecycle.accept(&args.id),
        Action::Complete => lifecycle.mark_completed(&args.id),
        Action::Abandon => lifecycle.abandon(&args.id),
        other => anyhow::bail!("'{other}' is not a status change"),
    };
    let transition = result.map_err(|e| fail(output, e))?;

    render(output, &transition, |t, w| match output {
        OutputMode::Text => writeln!(w, "{}\t{}\t{}", t.id, t.previous, t.current),
        _ => writeln!(w, "✓ {} {}: {} → {}", t.kind, t.id, t.previous, t.current),
    })
}

pub fn run_archive(
    archive: bool,
    args: &IdArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let lifecycle = desk.lifecycle();
    let result = if archive {
        lifecycle.archive(&args.id)
    } else {
        lifecycle.unarchive(&args.id)
    };
    let item = result.map_err(|e| fail(output, e))?;

    render(output, &item, |item, w| match item.archived_at {
        Some(at) => match desk.config.retention.policy().purge_at(at) {
            Some(purge) => writeln!(
                w,
                "✓ Archived {} (purged after {} unless restored)",
                item.id,
                purge.format("%Y-%m-%d %H:%M UTC")
            ),
            None => writeln!(w, "✓ Archived {} (never purged)", item.id),
        },
        None => writeln!(w, "✓ Restored {}", item.id),
    })
}

pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let lifecycle = desk.lifecycle();

    if !args.force {
        let item = lifecycle.get(&args.id).map_err(|e| fail(output, e))?;
        if !confirm(&format!("Delete {} '{}' permanently?", item.id, item.title))? {
            return render_success(output, "Delete cancelled");
        }
    }

    let removed = lifecycle
        .delete_permanently(&args.id)
        .map_err(|e| fail(output, e))?;
    render(output, &removed, |item, w| writeln!(w, "✓ Deleted {}", item.id))
}

#[derive(Debug, Serialize)]
struct ClearedHistory {
    user: String,
    removed: Vec<String>,
}

pub fn run_clear_history(
    args: &ClearHistoryArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let user = user::require_user_or_render(user_flag, output)?;
    let desk = Desk::open(project_root, output)?;

    if !args.yes && !confirm(&format!("Remove all completed and rejected items created by {user}?"))? {
        return render_success(output, "Clear history cancelled");
    }

    let removed = desk
        .lifecycle()
        .clear_history(&user)
        .map_err(|e| fail(output, e))?;

    render(output, &ClearedHistory { user, removed }, |c, w| {
        if c.removed.is_empty() {
            writeln!(w, "History for {} is already empty", c.user)
        } else {
            writeln!(w, "✓ Removed {} item(s) from {}'s history", c.removed.len(), c.user)
        }
    })
}
