//! Debuggee-side agent: installs as the Lua execution hook and serves the
//! debugger protocol (spec.md §1 "Debuggee Agent").
//!
//! The embedding host calls [`install`] once per `mlua::Lua` instance it
//! wants debuggable, and [`shutdown`] (or lets the process exit, which the
//! host's own `Lua` drop already tears down) when it's done. Everything
//! else — connecting, stepping, breakpoints, inspection — is driven from
//! the wire, never by the host directly.

pub mod breakpoints;
pub mod dispatch;
pub mod error;
pub mod hook;
pub mod inspector;
pub mod prompt;
pub mod session;
pub mod signal;

use breakpoints::normalize_file;
use mlua::Lua;
use session::Session;

/// `LDB_PORT` default (spec.md §6).
const DEFAULT_PORT: u16 = 2679;

fn configured_port() -> u16 {
    std::env::var("LDB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

fn startup_requested() -> bool {
    std::env::var("LDB_STARTUP").as_deref() == Ok("1")
}

/// Install the debugger on `lua`: register it as a known runtime instance,
/// arm the signal-driven attach handler, optionally connect synchronously
/// if `LDB_STARTUP=1`, and set the execution hook.
///
/// Safe to call more than once per process (each `Lua` instance gets its
/// own hook); registration is capped at
/// [`session::MAX_RUNTIMES`] (spec.md §3).
pub fn install(lua: &Lua) -> anyhow::Result<()> {
    session::with_session(|s| s.register_runtime(lua.clone()));

    let signum = signal::configured_signal();
    if let Err(e) = signal::arm(signum) {
        log::warn!("ldb: failed to arm signal handler: {e}");
    }

    if startup_requested() {
        session::with_session(try_connect);
    }

    arm_hook(lua);

    Ok(())
}

/// Install the execution hook on `lua`. Shared by [`install`] and the
/// signal-driven re-arm path in [`on_hook_event`], which calls this once per
/// registered runtime — the same shape as `rldbSignaled()` looping
/// `lua_sethook` over every tracked state (spec.md §4.8).
fn arm_hook(lua: &Lua) {
    let lua_for_hook = lua.clone();
    lua.set_hook(
        mlua::HookTriggers {
            on_calls: true,
            on_returns: true,
            every_line: true,
            ..Default::default()
        },
        move |_lua, debug| {
            session::with_session(|s| on_hook_event(&lua_for_hook, s, &debug));
            Ok(())
        },
    );
}

/// Tear down this thread's session: disconnect, release the remembered
/// value, clear breakpoints and hook mode (spec.md §5 "A graceful process
/// exit emits `QT` via an at-exit hook").
pub fn shutdown(lua: &Lua) {
    session::with_session(|s| {
        if let Some(sock) = s.sock.as_mut() {
            let _ = ldb_wire::message::write_frame(
                sock,
                &ldb_wire::message::AgentMessage::Quit.encode(),
            );
        }
    });
    session::teardown(lua);
}

fn try_connect(session: &mut Session) {
    if session.connected() {
        return;
    }
    match session::connect(configured_port()) {
        Ok(sock) => session.sock = Some(sock),
        Err(e) => log::warn!("ldb: failed to connect to controller: {e}"),
    }
}

/// The hook callback body, run on every call/return/line event (spec.md
/// §4.4). Kept free of any logic beyond "update depth, test for a break,
/// maybe enter the prompt loop" — the decision table itself lives in
/// [`hook::HookState`].
fn on_hook_event(lua: &Lua, session: &mut Session, debug: &mlua::Debug) {
    if session::take_signaled() {
        try_connect(session);
        // Re-arm every registered runtime's hook, not just the one whose
        // callback happened to observe the flag (spec.md §4.8).
        for rt in session.runtimes() {
            arm_hook(rt);
        }
    }

    let should_break = match debug.event() {
        mlua::DebugEvent::Call => {
            session.hook.on_call();
            false
        }
        // A tail call replaces the current activation record rather than
        // pushing a new one (Lua 5.4 manual §4.7), and the whole chain it
        // starts is unwound by exactly one `Return` — so it must not bump
        // `level` the way a real `Call` does, or `level` never comes back
        // down to `blevel` for tail-recursive code (spec.md §4.4).
        mlua::DebugEvent::TailCall => false,
        mlua::DebugEvent::Return => session.hook.on_return(),
        mlua::DebugEvent::Line => {
            let line = debug.curr_line();
            if line < 0 {
                // Tail-boundary pseudo-lines carry no breakpoint meaning
                // (spec.md §4.4 "Ignores events whose current line is
                // negative").
                false
            } else {
                let short_src = debug
                    .source()
                    .short_src
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let file = normalize_file(&short_src);
                let bp_hit = session.breakpoints.hit(&file, line as u32);
                session.hook.on_line(bp_hit)
            }
        }
        _ => false,
    };

    if should_break && session.connected() {
        prompt::run(lua, session);
    }
}
