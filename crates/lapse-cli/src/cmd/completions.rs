//! `lapse completions <shell>`.

use std::io::{self, Write};

use clap::{Args, Command};
use clap_complete::{Shell, generate};

const BIN_NAME: &str = "lapse";

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate the script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

fn write_completions(shell: Shell, command: &mut Command, w: &mut dyn Write) {
    generate(shell, command, BIN_NAME, w);
}

pub fn run_completions(args: &CompletionsArgs, command: &mut Command) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_completions(args.shell, command, &mut out);
    out.flush()?;
    Ok(())
}
