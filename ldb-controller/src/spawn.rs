//! Spawn-under-debugger (SPEC_FULL.md §4.7, from `original_source`).
//!
//! When the controller is given a program rather than `-p <pid>`, it
//! spawns that program with `LDB_STARTUP=1` and `LDB_PORT` set, then
//! proceeds to the normal accept loop. Grounded on the teacher's pattern
//! of wrapping `std::process::Command` construction behind a narrow helper
//! returning `anyhow::Result<Child>` (`hub/daemon.rs`'s process-spawning
//! helpers).

use std::process::{Child, Command};

use anyhow::Context;

/// Spawn `program` (first element) with the rest as its arguments, and
/// `LDB_STARTUP=1`/`LDB_PORT=<port>` in its environment.
pub fn spawn_debuggee(program: &[String], port: u16) -> anyhow::Result<Child> {
    let (bin, args) = program
        .split_first()
        .context("no program given to spawn")?;

    Command::new(bin)
        .args(args)
        .env("LDB_STARTUP", "1")
        .env("LDB_PORT", port.to_string())
        .spawn()
        .with_context(|| format!("failed to spawn debuggee: {bin}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawning_with_no_program_is_an_error() {
        assert!(spawn_debuggee(&[], 2679).is_err());
    }

    #[test]
    fn spawns_and_sets_expected_environment() {
        let mut child = spawn_debuggee(
            &["sh".to_string(), "-c".to_string(), "exit 0".to_string()],
            4242,
        )
        .expect("spawn should succeed for a real shell");
        let status = child.wait().expect("child should exit");
        assert!(status.success());
    }
}
