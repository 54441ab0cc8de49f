//! Signal-attach sender (spec.md §4.8 "POSIX: the controller sends the
//! configured signal... to the debuggee PID").

/// Default signal number (user-signal-2), overridable via `LDB_SIG`
/// (spec.md §6).
#[cfg(unix)]
pub const DEFAULT_SIGNAL: i32 = libc::SIGUSR2;

#[cfg(unix)]
fn configured_signal() -> i32 {
    std::env::var("LDB_SIG")
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(DEFAULT_SIGNAL)
}

/// Raise the configured attach signal against `pid`.
#[cfg(unix)]
pub fn signal_attach(pid: u32) -> anyhow::Result<()> {
    let signum = configured_signal();
    // SAFETY: `kill` with a plain signal number and no side effect beyond
    // delivering it is always sound to call; failure is reported through
    // its return value, not memory unsafety.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signum) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

/// Non-POSIX builds have no signal primitive; attach is expressed through
/// the best-effort flag-file channel the agent's `signal` module polls
/// (documented scope limitation, DESIGN.md).
#[cfg(not(unix))]
pub fn signal_attach(pid: u32) -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("ldb-signal-{pid}"));
    std::fs::write(&path, b"1")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn signaling_pid_zero_targets_own_process_group_and_does_not_panic() {
        // pid 0 means "every process in the caller's group" on POSIX;
        // exercises the FFI call path without depending on a live debuggee.
        let _ = signal_attach(0);
    }
}
