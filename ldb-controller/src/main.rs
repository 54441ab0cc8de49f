//! `ldb` — the controller binary (spec.md §4.7, §6).
//!
//! Parses arguments, wires up logging the same way the teacher's binary
//! does (`env_logger` from an env var, default filter `info`), then either
//! spawns a program under the debugger or signals an existing PID to
//! attach, and drives the session loop to completion.

mod attach;
mod cli;
mod mainloop;
mod render;
mod source_view;
mod spawn;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("LDB_LOG", "info")).init();

    let cli = cli::Cli::parse();
    mainloop::run(&cli)
}
