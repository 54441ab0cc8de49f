//! Controller CLI surface (spec.md §6 "Controller CLI").
//!
//! `clap`-derived, the same way the teacher's own binary parses its
//! top-level arguments — see `cli/src/main.rs`'s `#[derive(Parser)] struct
//! Cli`.

use clap::Parser;

/// Remote source-level debugger controller.
#[derive(Parser, Debug)]
#[command(name = "ldb")]
#[command(version)]
#[command(about = "Controller for the remote Lua debugger")]
pub struct Cli {
    /// Listening address (spec.md §6 default `127.0.0.1`).
    #[arg(short = 'a', long = "addr", default_value = "127.0.0.1")]
    pub addr: String,

    /// Listening TCP port.
    #[arg(long = "port", default_value_t = 2679)]
    pub port: u16,

    /// Source search directory; repeatable.
    #[arg(short = 's', long = "source")]
    pub source: Vec<String>,

    /// Attach to an already-running debuggee by PID instead of spawning one.
    #[arg(short = 'p', long = "pid")]
    pub pid: Option<u32>,

    /// Program to spawn under the debugger, plus its arguments
    /// (`LDB_STARTUP=1`/`LDB_PORT` set in its environment, spec.md §6).
    #[arg(trailing_var_arg = true)]
    pub program: Vec<String>,
}

impl Cli {
    /// Whether this invocation attaches to an existing process rather than
    /// spawning one.
    pub fn is_attach(&self) -> bool {
        self.pid.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_spec() {
        let cli = Cli::parse_from(["ldb"]);
        assert_eq!(cli.addr, "127.0.0.1");
        assert_eq!(cli.port, 2679);
        assert!(cli.source.is_empty());
        assert!(!cli.is_attach());
    }

    #[test]
    fn pid_attach_mode_is_detected() {
        let cli = Cli::parse_from(["ldb", "-p", "4242"]);
        assert_eq!(cli.pid, Some(4242));
        assert!(cli.is_attach());
    }

    #[test]
    fn repeated_source_dirs_accumulate() {
        let cli = Cli::parse_from(["ldb", "-s", "dir1", "-s", "dir2", "prog"]);
        assert_eq!(cli.source, vec!["dir1".to_string(), "dir2".to_string()]);
        assert_eq!(cli.program, vec!["prog".to_string()]);
    }
}
