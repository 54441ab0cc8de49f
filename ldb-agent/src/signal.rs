//! Signal / interrupt plumbing (spec.md §4.8).
//!
//! The handler side of this MUST do nothing but set a flag — the real work
//! (reconnect, re-arm hooks) happens on the hook thread at the next line
//! event (spec.md §9 "Signal -> data-flow"). Grounded on the teacher's own
//! `SHUTDOWN_FLAG: LazyLock<Arc<AtomicBool>>` + `signal_hook::flag::register`
//! pattern for its Ctrl-C handling in `main.rs`.

use std::sync::Arc;

use crate::session::SIGNALED;

/// Default signal number to arm when `LDB_SIG` isn't set (user-signal-2,
/// spec.md §6).
#[cfg(unix)]
pub const DEFAULT_SIGNAL: i32 = libc::SIGUSR2;

/// Install the POSIX signal handler that flips [`SIGNALED`] (spec.md §4.8).
/// Grounded on the teacher's own `signal_hook::flag::register(SIGNUM,
/// Arc::clone(&SHUTDOWN_FLAG))` pattern in `main.rs`; registering the same
/// signal twice is harmless.
#[cfg(unix)]
pub fn arm(signum: i32) -> anyhow::Result<()> {
    signal_hook::flag::register(signum, Arc::clone(&SIGNALED))?;
    Ok(())
}

/// Resolve the signal number to arm from `LDB_SIG`, defaulting to
/// [`DEFAULT_SIGNAL`] (spec.md §6).
#[cfg(unix)]
pub fn configured_signal() -> i32 {
    std::env::var("LDB_SIG")
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(DEFAULT_SIGNAL)
}

/// Non-POSIX best-effort stand-in: a background thread polling a well-known
/// flag file, since no portable named-event crate is in the dependency set
/// (documented scope limitation, DESIGN.md). Any write to the file is
/// treated as "signal raised"; the file is removed after being observed.
#[cfg(not(unix))]
pub fn arm(_signum: i32) -> anyhow::Result<()> {
    let path = flag_file_path();
    std::thread::spawn(move || loop {
        if path.exists() {
            let _ = std::fs::remove_file(&path);
            SIGNALED.store(true, Ordering::SeqCst);
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn configured_signal() -> i32 {
    0
}

#[cfg(not(unix))]
fn flag_file_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("ldb-signal-{}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_signal_falls_back_to_default_when_unset() {
        std::env::remove_var("LDB_SIG");
        #[cfg(unix)]
        assert_eq!(configured_signal(), DEFAULT_SIGNAL);
    }
}
