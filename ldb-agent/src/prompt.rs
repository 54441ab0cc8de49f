//! The agent-side prompt loop (spec.md §4.4 "Prompt entry", §4.7 step 4).
//!
//! Entered whenever the hook state machine decides the current line should
//! break. Blocks the hook thread inside `recv` until a resume command
//! arrives — that's the debugger contract (spec.md §5 "MAY block that
//! thread indefinitely").

use ldb_wire::message::{self, AgentMessage};

use crate::breakpoints::normalize_file;
use crate::dispatch::{self, Outcome};
use crate::inspector;
use crate::session::Session;

/// Drive one break-to-resume cycle. Returns once a resume command has been
/// dispatched, or once the session has been torn down (I/O error, `e`, or
/// peer close) — the caller (the hook callback) doesn't need to know which.
pub fn run(lua: &mlua::Lua, session: &mut Session) {
    let Some((short_src, current_line)) = resolve_frame(lua) else {
        return;
    };
    let basename = normalize_file(&short_src);
    let pid = std::process::id();

    let Some(sock) = session.sock.as_mut() else {
        return;
    };

    let br = AgentMessage::Break {
        basename: basename.clone(),
        line: current_line.max(0) as u32,
        pid,
        fullpath: short_src,
    };
    if message::write_frame(sock, &br.encode()).is_err() {
        session.disconnect();
        return;
    }

    session.hook.reset_for_prompt();

    loop {
        let sock = match session.sock.as_mut() {
            Some(s) => s,
            None => return,
        };
        let payload = match message::read_frame(sock) {
            Ok(p) => p,
            Err(_) => {
                session.disconnect();
                return;
            }
        };
        let line = String::from_utf8_lossy(&payload).into_owned();
        let tokens = match message::tokenize(&line) {
            Ok(t) => t,
            Err(e) => {
                if reply(session, &AgentMessage::Err(e.to_string())).is_err() {
                    return;
                }
                continue;
            }
        };

        match dispatch::dispatch(lua, session, &tokens, &basename) {
            Outcome::Reply(msg) => {
                if reply(session, &msg).is_err() {
                    return;
                }
            }
            Outcome::MemDump { len, bytes } => {
                if send_mem_dump(session, len, &bytes).is_err() {
                    return;
                }
            }
            Outcome::Resume(mode) => {
                session.hook.select_mode(mode);
                return;
            }
            Outcome::Close => {
                // spec.md §7: `e` closes the session immediately, no reply.
                session.disconnect();
                return;
            }
        }
    }
}

fn resolve_frame(lua: &mlua::Lua) -> Option<(String, i64)> {
    inspector::current_source_location(lua).ok()
}

fn reply(session: &mut Session, msg: &AgentMessage) -> Result<(), ()> {
    let Some(sock) = session.sock.as_mut() else {
        return Err(());
    };
    if message::write_frame(sock, &msg.encode()).is_err() {
        session.disconnect();
        return Err(());
    }
    Ok(())
}

/// Send the `m` command's response: a normal `OK\n%08x\n` frame carrying the
/// length header, then `len` raw bytes written directly to the socket
/// outside NUL-framing — the receiver reads exactly `len` bytes by count
/// rather than scanning for the next NUL (spec.md §6 "`m` emits `%08x\n`
/// length then `length` raw bytes"; see `ldb_wire::message`'s doc comment).
fn send_mem_dump(session: &mut Session, len: u32, bytes: &[u8]) -> Result<(), ()> {
    let header = AgentMessage::Ok(format!("{len:08x}"));
    let Some(sock) = session.sock.as_mut() else {
        return Err(());
    };
    if message::write_frame(sock, &header.encode()).is_err() {
        session.disconnect();
        return Err(());
    }

    // Shuts the socket down on any early return below; `into_inner` on the
    // success path below releases it without running that guard (mirrors
    // the teacher's shutdown guard in `cli/src/relay/connection.rs`).
    let Some(sock) = session.sock.take() else {
        return Err(());
    };
    let sock = scopeguard::guard(sock, |mut sock| {
        let _ = sock.shutdown(std::net::Shutdown::Both);
    });

    let mut sb = ldb_wire::sockbuf::SockBuf::new(&*sock);
    sb.add(bytes);
    if sb.send().is_err() {
        return Err(());
    }

    session.sock = Some(scopeguard::ScopeGuard::into_inner(sock));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_frame_returns_none_outside_a_hook_context() {
        let lua = mlua::Lua::new();
        // No call in progress; level 1 has no frame, debug.getinfo(1, ...)
        // returns nil and resolve_frame should report None rather than
        // panicking.
        assert!(resolve_frame(&lua).is_none());
    }
}
