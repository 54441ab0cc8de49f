//! The `DebuggerSession` singleton (spec.md §9 "Process-wide state").
//!
//! Everything the hook touches — mode, depth, breakpoints, the remembered
//! value, the output buffer, the controller socket — is owned exclusively
//! by the thread that runs the scripting runtime's hook callback, so it
//! lives in a `thread_local!`. The one genuinely cross-thread piece is
//! `signaled`, set from a signal handler or the non-POSIX wait thread and
//! drained on the hook thread — that's a bare `static AtomicBool` (spec.md
//! §5 "Shared resources").

use std::cell::RefCell;
use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use mlua::{Lua, RegistryKey};

use crate::breakpoints::BreakpointTable;
use crate::error::AgentError;
use crate::hook::HookState;

/// Maximum number of registered runtime instances (spec.md §3).
pub const MAX_RUNTIMES: usize = 1024;

/// Set from a signal handler or the event-wait thread; drained on the hook
/// thread at the top of every line event (spec.md §4.8, §5). `Arc`-wrapped
/// so `signal_hook::flag::register` can hold a clone directly — the same
/// shape the teacher uses for its own `SHUTDOWN_FLAG`.
pub static SIGNALED: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

/// The live session state: breakpoints, hook mode/depth, the remembered
/// value, the controller connection, and the registered runtime list.
pub struct Session {
    pub breakpoints: BreakpointTable,
    pub hook: HookState,
    pub sock: Option<TcpStream>,
    remembered: Option<RegistryKey>,
    runtimes: Vec<Lua>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            breakpoints: BreakpointTable::new(),
            hook: HookState::new(),
            sock: None,
            remembered: None,
            runtimes: Vec::new(),
        }
    }

    /// Register a runtime instance's execution hook, bounded at
    /// [`MAX_RUNTIMES`] (spec.md §3, §7 "maximum registered runtimes
    /// exceeded -> log to stderr, no-op install").
    pub fn register_runtime(&mut self, lua: Lua) {
        if self.runtimes.len() >= MAX_RUNTIMES {
            log::error!("ldb: maximum registered runtimes ({MAX_RUNTIMES}) exceeded, ignoring install");
            return;
        }
        self.runtimes.push(lua);
    }

    /// All registered runtimes, for re-arming hooks on signal-driven attach
    /// (spec.md §4.8).
    pub fn runtimes(&self) -> &[Lua] {
        &self.runtimes
    }

    /// Store a fresh remembered-value reference, releasing any prior one
    /// (spec.md §4.5 "replacing any prior remembered value").
    pub fn remember(&mut self, lua: &Lua, value: mlua::Value) -> mlua::Result<()> {
        let key = lua.create_registry_value(value)?;
        if let Some(old) = self.remembered.replace(key) {
            lua.remove_registry_value(old)?;
        }
        Ok(())
    }

    /// Fetch the remembered value, if any.
    pub fn remembered_value(&self, lua: &Lua) -> Result<mlua::Value, AgentError> {
        let key = self
            .remembered
            .as_ref()
            .ok_or_else(|| AgentError::NotFound("no remembered value".to_string()))?;
        lua.registry_value(key)
            .map_err(|e| AgentError::NotFound(format!("remembered value: {e}")))
    }

    /// Release the remembered reference, e.g. at session teardown.
    pub fn forget(&mut self, lua: &Lua) {
        if let Some(key) = self.remembered.take() {
            let _ = lua.remove_registry_value(key);
        }
    }

    /// Tear down the controller connection without notifying the peer
    /// (spec.md §4.4 "any I/O error tears down the session").
    pub fn disconnect(&mut self) {
        self.sock = None;
    }

    pub fn connected(&self) -> bool {
        self.sock.is_some()
    }
}

/// Run `f` with mutable access to this thread's session, lazily creating it
/// on first use.
pub fn with_session<R>(f: impl FnOnce(&mut Session) -> R) -> R {
    SESSION.with(|cell| {
        let mut slot = cell.borrow_mut();
        let session = slot.get_or_insert_with(Session::new);
        f(session)
    })
}

/// Whether a session currently exists on this thread (without creating
/// one).
pub fn has_session() -> bool {
    SESSION.with(|cell| cell.borrow().is_some())
}

/// Tear down this thread's session entirely, releasing the remembered
/// reference against `lua` first.
pub fn teardown(lua: &Lua) {
    SESSION.with(|cell| {
        if let Some(mut session) = cell.borrow_mut().take() {
            session.forget(lua);
            session.disconnect();
        }
    });
}

/// Connect to the controller at `LDB_PORT` on `127.0.0.1` (spec.md §6).
pub fn connect(port: u16) -> io::Result<TcpStream> {
    TcpStream::connect(("127.0.0.1", port))
}

/// Write `bytes` then the NUL end-of-flow byte (spec.md §4.2 framing).
pub fn send_frame(sock: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    sock.write_all(bytes)?;
    sock.write_all(&[0u8])?;
    sock.flush()
}

/// Test whether the signal-driven attach flag is set, clearing it
/// atomically (spec.md §4.8 "the next line event observes the flag").
pub fn take_signaled() -> bool {
    SIGNALED.swap(false, Ordering::SeqCst)
}
