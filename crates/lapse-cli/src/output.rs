//! How every command prints: aligned blocks for people, tab-separated rows for
//! pipes, JSON for programs.
//!
//! The mode comes from, in order: `--format` (or the hidden `--json`), the
//! `FORMAT` environment variable, then whether stdout is a terminal.
//! Results go to stdout; errors go to stderr in the same mode.

use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use lapse_core::error::LifecycleError;
use serde::Serialize;

const RULE: &str = "────────────────────────────────────────────────────────────";

/// Heading underlined with a rule.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}\n{RULE}")
}

/// `key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let label = format!("{key}:");
    writeln!(w, "{label:<14} {}", value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Aligned, human-oriented output.
    Pretty,
    /// Tab-separated rows.
    Text,
    /// JSON documents.
    Json,
}

impl OutputMode {
    #[cfg(test)]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    fn from_env_value(raw: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(raw.trim(), true).ok()
    }

    fn pick(flag: Option<Self>, json: bool, env: Option<&str>, stdout_is_tty: bool) -> Self {
        flag.or_else(|| json.then_some(Self::Json))
            .or_else(|| env.and_then(Self::from_env_value))
            .unwrap_or(if stdout_is_tty { Self::Pretty } else { Self::Text })
    }
}

pub fn resolve_output_mode(flag: Option<OutputMode>, json: bool) -> OutputMode {
    let env = std::env::var("FORMAT").ok();
    OutputMode::pick(flag, json, env.as_deref(), io::stdout().is_terminal())
}

/// One row of a listing.
pub trait Renderable: Serialize {
    /// The row as shown on a terminal.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// The row as tab-separated fields, matching [`Renderable::table_headers`].
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized;
}

fn write_json<T: Serialize + ?Sized>(w: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    w.write_all(b"\n")?;
    Ok(())
}

fn write_list<R: Renderable>(
    w: &mut dyn Write,
    rows: &[R],
    mode: OutputMode,
    empty_note: &str,
) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return write_json(w, rows);
    }
    if rows.is_empty() {
        // Scripts get no output at all for an empty listing.
        if mode == OutputMode::Pretty {
            writeln!(w, "{empty_note}")?;
        }
        return Ok(());
    }
    if mode == OutputMode::Text {
        writeln!(w, "{}", R::table_headers().join("\t"))?;
    }
    for row in rows {
        match mode {
            OutputMode::Text => row.render_table(w)?,
            _ => row.render_human(w)?,
        }
    }
    Ok(())
}

pub fn render_list<R: Renderable>(
    rows: &[R],
    mode: OutputMode,
    empty_note: &str,
) -> anyhow::Result<()> {
    write_list(&mut io::stdout().lock(), rows, mode, empty_note)
}

fn write_value<T: Serialize>(
    w: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    human: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return write_json(w, value);
    }
    human(value, w)?;
    Ok(())
}

/// Print a single result: `value` as JSON, or whatever `human` writes.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    write_value(&mut io::stdout().lock(), mode, value, human)
}

/// `✓ message`, or `{"ok": true, "message": ...}`.
pub fn render_success(mode: OutputMode, message: &str) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct Ack<'a> {
        ok: bool,
        message: &'a str,
    }

    render(mode, &Ack { ok: true, message }, |ack, w| {
        writeln!(w, "✓ {}", ack.message)
    })
}

/// An error as printed to the caller.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// `E####` engine code, or a short tag for CLI-only failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }
}

impl From<&LifecycleError> for CliError {
    fn from(err: &LifecycleError) -> Self {
        Self::with_details(err.to_string(), err.suggestion(), err.code().code())
    }
}

fn write_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return write_json(w, &serde_json::json!({ "error": error }));
    }
    match error.error_code.as_deref() {
        Some(code) => writeln!(w, "error[{code}]: {}", error.message)?,
        None => writeln!(w, "error: {}", error.message)?,
    }
    if let Some(suggestion) = &error.suggestion {
        writeln!(w, "  hint: {suggestion}")?;
    }
    Ok(())
}

pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    write_error(&mut io::stderr().lock(), mode, error)
}

/// Print an engine error and return it for `?`.
pub fn fail(mode: OutputMode, err: LifecycleError) -> anyhow::Error {
    match render_error(mode, &CliError::from(&err)) {
        Ok(()) => err.into(),
        Err(render_err) => render_err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapse_core::model::item::Action;

    #[test]
    fn explicit_flags_beat_environment() {
        assert_eq!(
            OutputMode::pick(Some(OutputMode::Text), true, Some("pretty"), true),
            OutputMode::Text
        );
        assert_eq!(
            OutputMode::pick(None, true, Some("pretty"), true),
            OutputMode::Json
        );
    }

    #[test]
    fn environment_is_case_insensitive_and_unknowns_fall_back_to_tty() {
        assert_eq!(OutputMode::pick(None, false, Some("JSON"), true), OutputMode::Json);
        assert_eq!(OutputMode::pick(None, false, Some(" text "), true), OutputMode::Text);
        assert_eq!(OutputMode::pick(None, false, Some("fancy"), true), OutputMode::Pretty);
        assert_eq!(OutputMode::pick(None, false, Some("fancy"), false), OutputMode::Text);
        assert_eq!(OutputMode::pick(None, false, None, false), OutputMode::Text);
    }

    #[derive(Serialize)]
    struct Tally {
        label: &'static str,
        n: u32,
    }

    impl Renderable for Tally {
        fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
            writeln!(w, "{} = {}", self.label, self.n)
        }

        fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
            writeln!(w, "{}\t{}", self.label, self.n)
        }

        fn table_headers() -> &'static [&'static str] {
            &["LABEL", "N"]
        }
    }

    fn listed(rows: &[Tally], mode: OutputMode) -> String {
        let mut buf = Vec::new();
        write_list(&mut buf, rows, mode, "(none)").unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn listings_per_mode() {
        let rows = [Tally { label: "open", n: 4 }, Tally { label: "done", n: 1 }];
        assert_eq!(listed(&rows, OutputMode::Text), "LABEL\tN\nopen\t4\ndone\t1\n");
        assert_eq!(listed(&rows, OutputMode::Pretty), "open = 4\ndone = 1\n");
        let json: serde_json::Value =
            serde_json::from_str(&listed(&rows, OutputMode::Json)).unwrap();
        assert_eq!(json[0]["label"], "open");

        assert_eq!(listed(&[], OutputMode::Text), "");
        assert_eq!(listed(&[], OutputMode::Pretty), "(none)\n");
        assert_eq!(listed(&[], OutputMode::Json).trim(), "[]");
    }

    #[test]
    fn single_values_use_the_human_closure_outside_json() {
        let mut buf = Vec::new();
        write_value(&mut buf, OutputMode::Pretty, &Tally { label: "x", n: 9 }, |t, w| {
            writeln!(w, "n is {}", t.n)
        })
        .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "n is 9\n");
    }

    #[test]
    fn engine_errors_carry_their_code() {
        let err = LifecycleError::InvalidOperation {
            id: "p-1".into(),
            action: Action::Abandon,
            reason: "projects cannot be abandoned",
        };
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2002"));

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Text, &cli).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("error[E2002]: cannot abandon 'p-1'"));
        assert!(text.contains("  hint: Not allowed: projects cannot be abandoned."));

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Json, &cli).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["error"]["error_code"], "E2002");
    }

    #[test]
    fn uncoded_errors_print_plainly() {
        let err = CliError {
            message: "plain".into(),
            suggestion: None,
            error_code: None,
        };
        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Pretty, &err).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "error: plain\n");
    }
}
