//! `lapse sweep` and `lapse watch`: drive the retention scheduler by hand or
//! on its timer.

use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Args;
use lapse_core::clock::{Clock, ManualClock};
use lapse_core::error::LifecycleError;
use lapse_core::retention::SweepReport;
use lapse_core::scheduler::SweepNotice;
use serde::Serialize;
use tracing::info;

use crate::cmd::Desk;
use crate::output::{OutputMode, fail, render};

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Evaluate retention as of this instant instead of now.
    #[arg(long, value_parser = parse_instant)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between sweeps (defaults to `[scheduler] interval_secs`).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Stop after this many sweeps instead of running until interrupted.
    #[arg(long)]
    pub ticks: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SweepSummary {
    at: DateTime<Utc>,
    changed: bool,
    report: SweepReport,
}

pub fn run_sweep(args: &SweepArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let clock: Option<Arc<dyn Clock>> = args
        .at
        .map(|at| Arc::new(ManualClock::new(at)) as Arc<dyn Clock>);
    let at = clock.as_ref().map_or_else(|| desk.clock.now(), |c| c.now());

    let notice = desk
        .scheduler(clock, None)
        .tick()
        .map_err(|e| fail(output, LifecycleError::from(e)))?;

    let summary = match notice {
        Some(notice) => SweepSummary {
            at: notice.at,
            changed: true,
            report: notice.report,
        },
        None => SweepSummary {
            at,
            changed: false,
            report: SweepReport::default(),
        },
    };

    render(output, &summary, |s, w| {
        if !s.changed {
            return writeln!(w, "Nothing to sweep");
        }
        let r = &s.report;
        writeln!(
            w,
            "Swept at {}: {} archived purged, {} faded, {} expired purged",
            s.at.format("%Y-%m-%d %H:%M:%S UTC"),
            r.purged_archived.len(),
            r.faded.len(),
            r.purged_expired.len()
        )
    })
}

fn write_notice(w: &mut dyn Write, output: OutputMode, notice: &SweepNotice) -> io::Result<()> {
    match output {
        OutputMode::Json => {
            let line = serde_json::to_string(notice).map_err(io::Error::other)?;
            writeln!(w, "{line}")
        }
        OutputMode::Text => writeln!(w, "{}\t{}", notice.at.to_rfc3339(), notice.message()),
        OutputMode::Pretty => writeln!(
            w,
            "[{}] {}",
            notice.at.format("%H:%M:%S"),
            notice.message()
        ),
    }
}

fn print_notice(output: OutputMode, notice: &SweepNotice) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = write_notice(&mut out, output, notice).and_then(|()| out.flush()) {
        tracing::warn!(error = %err, "failed to print sweep notice");
    }
}

pub fn run_watch(args: &WatchArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let desk = Desk::open(project_root, output)?;
    let scheduler = desk.scheduler(None, args.interval.map(Duration::from_secs));

    if let Some(ticks) = args.ticks {
        let delivered = scheduler.run_ticks(ticks, |notice| print_notice(output, notice));
        info!(ticks, delivered, "watch finished");
        return Ok(());
    }

    let interval = scheduler.interval();
    let handle = scheduler.start(move |notice| print_notice(output, notice))?;
    info!(?interval, "watching; press Enter to stop");

    if io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        handle.stop();
        return Ok(());
    }

    // Detached: run until the process is killed.
    loop {
        std::thread::park();
    }
}
