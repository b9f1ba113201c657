//! Who "me" is for user-scoped commands (`list`, `history`, `clear-history`, ...).
//!
//! `--user` wins, then `LAPSE_USER`. The login name in `USER` is only trusted
//! when a person is at the terminal, so scripts never act on someone's
//! history by accident. Commands that address one item by id need no user.

use std::io::IsTerminal;

use crate::output::{CliError, OutputMode, render_error};

const MISSING_USER: &str = "missing_user";

fn pick_user(
    flag: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
    interactive: bool,
) -> Option<String> {
    let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);

    flag.map(str::to_string)
        .and_then(non_empty)
        .or_else(|| lookup("LAPSE_USER").and_then(non_empty))
        .or_else(|| {
            if interactive {
                lookup("USER").and_then(non_empty)
            } else {
                None
            }
        })
}

fn resolve_user(flag: Option<&str>) -> Option<String> {
    pick_user(flag, |key| std::env::var(key).ok(), std::io::stdin().is_terminal())
}

/// The acting user, or a rendered `missing_user` error.
pub fn require_user_or_render(flag: Option<&str>, output: OutputMode) -> anyhow::Result<String> {
    if let Some(user) = resolve_user(flag) {
        return Ok(user);
    }
    render_error(
        output,
        &CliError::with_details(
            "This command acts on your own items, but no user is set.",
            "Pass --user <name> or export LAPSE_USER.",
            MISSING_USER,
        ),
    )?;
    anyhow::bail!("no user identity (--user / LAPSE_USER)")
}
