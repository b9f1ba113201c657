#![forbid(unsafe_code)]

mod cmd;
mod output;
mod user;

use clap::{CommandFactory, Parser, Subcommand};
use lapse_core::model::item::Action;
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lapse: lifecycle and retention for requests and projects",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Act as this user (skips env resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }

    fn user_flag(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Accept a pending item",
        after_help = "EXAMPLES:\n    lapse accept req-42"
    )]
    Accept(cmd::transition::IdArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Mark an item completed",
        after_help = "EXAMPLES:\n    lapse complete req-42\n    lapse complete req-42 --json"
    )]
    Complete(cmd::transition::IdArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Abandon a request",
        long_about = "Reject a request. Projects cannot be abandoned."
    )]
    Abandon(cmd::transition::IdArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Archive a project",
        long_about = "Hide a project. Archived projects still pending are purged once the archive window passes."
    )]
    Archive(cmd::transition::IdArgs),

    #[command(next_help_heading = "Lifecycle", about = "Restore an archived item")]
    Unarchive(cmd::transition::IdArgs),

    #[command(next_help_heading = "Lifecycle", about = "Delete an item permanently")]
    Delete(cmd::transition::DeleteArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Remove your completed and rejected items",
        after_help = "EXAMPLES:\n    lapse --user alice clear-history --yes"
    )]
    ClearHistory(cmd::transition::ClearHistoryArgs),

    #[command(
        next_help_heading = "Retention",
        about = "Run one retention sweep",
        after_help = "EXAMPLES:\n    # Sweep now\n    lapse sweep\n\n    # Sweep as if it were a later instant\n    lapse sweep --at 2025-06-09T00:00:00Z"
    )]
    Sweep(cmd::retention::SweepArgs),

    #[command(
        next_help_heading = "Retention",
        about = "Sweep on a timer",
        long_about = "Run the retention scheduler and print a line whenever a sweep changes something.",
        after_help = "EXAMPLES:\n    lapse watch\n    lapse watch --interval 5 --ticks 3"
    )]
    Watch(cmd::retention::WatchArgs),

    #[command(next_help_heading = "Read", about = "List your items")]
    List,

    #[command(next_help_heading = "Read", about = "List your items in process")]
    Accepted,

    #[command(next_help_heading = "Read", about = "List your completed and rejected items")]
    History,

    #[command(
        next_help_heading = "Read",
        about = "List archived projects",
        after_help = "EXAMPLES:\n    lapse archived\n    lapse archived --admin --department ops"
    )]
    Archived(cmd::views::ArchivedArgs),

    #[command(next_help_heading = "Read", about = "Status counts and recent activity")]
    Stats,

    #[command(next_help_heading = "Read", about = "Show one item")]
    Show(cmd::views::ShowArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Report items that break record invariants"
    )]
    Check,

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    lapse completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LAPSE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "lapse=debug,info"
        } else {
            "lapse=info,warn"
        })
    });

    let format = env::var("LAPSE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;
    let output = cli.output_mode();
    let user = cli.user_flag();

    match cli.command {
        Commands::Accept(ref args) => {
            cmd::transition::run_status(Action::Accept, args, output, &project_root)
        }
        Commands::Complete(ref args) => {
            cmd::transition::run_status(Action::Complete, args, output, &project_root)
        }
        Commands::Abandon(ref args) => {
            cmd::transition::run_status(Action::Abandon, args, output, &project_root)
        }
        Commands::Archive(ref args) => {
            cmd::transition::run_archive(true, args, output, &project_root)
        }
        Commands::Unarchive(ref args) => {
            cmd::transition::run_archive(false, args, output, &project_root)
        }
        Commands::Delete(ref args) => cmd::transition::run_delete(args, output, &project_root),
        Commands::ClearHistory(ref args) => {
            cmd::transition::run_clear_history(args, user, output, &project_root)
        }
        Commands::Sweep(ref args) => cmd::retention::run_sweep(args, output, &project_root),
        Commands::Watch(ref args) => cmd::retention::run_watch(args, output, &project_root),
        Commands::List => cmd::views::run_list(user, output, &project_root),
        Commands::Accepted => cmd::views::run_accepted(user, output, &project_root),
        Commands::History => cmd::views::run_history(user, output, &project_root),
        Commands::Archived(ref args) => {
            cmd::views::run_archived(args, user, output, &project_root)
        }
        Commands::Stats => cmd::views::run_stats(user, output, &project_root),
        Commands::Show(ref args) => cmd::views::run_show(args, output, &project_root),
        Commands::Check => cmd::views::run_check(output, &project_root),
        Commands::Completions(ref args) => {
            cmd::completions::run_completions(args, &mut Cli::command())
        }
    }
}
