//! Command dispatch table (spec.md §6 "User commands", §4.7 step 4).
//!
//! Parses one already-tokenized controller→agent command line and executes
//! it against the current frame/session, producing either a reply, a resume
//! decision for the prompt loop, or (for `m`) a length header plus a raw
//! byte payload that bypasses the normal NUL-framed body (see
//! `ldb_wire::message`'s module doc comment).

use ldb_wire::fieldpath::Selector;
use ldb_wire::message::AgentMessage;
use mlua::{Lua, Value};

use crate::breakpoints::Op;
use crate::error::AgentError;
use crate::hook::Mode;
use crate::inspector::{self, Scope};
use crate::session::Session;

/// What the prompt loop should do after a command has been handled.
pub enum Outcome {
    /// Send this reply and keep looping (spec.md §5 "intermediate
    /// inspection commands MUST be fully acknowledged").
    Reply(AgentMessage),
    /// `m`: send `OK\n%08x\n` as a normal frame, then `len` raw bytes
    /// outside NUL-framing (read by count, not by NUL-scan).
    MemDump { len: u32, bytes: Vec<u8> },
    /// A resume command was received; break the prompt loop in this mode.
    Resume(Mode),
    /// `e`: close the session immediately, no reply (spec.md §7).
    Close,
}

/// Dispatch one tokenized command line.
///
/// `current_file` is the basename of the frame the prompt is stopped at,
/// used to resolve `sb . <line>` (spec.md §6 "`.` ⇒ current file").
pub fn dispatch(
    lua: &Lua,
    session: &mut Session,
    tokens: &[String],
    current_file: &str,
) -> Outcome {
    let Some(cmd) = tokens.first().map(String::as_str) else {
        return Outcome::Reply(AgentMessage::Err("Invalid command!".to_string()));
    };

    let result = match cmd {
        "s" => return Outcome::Resume(Mode::Step),
        "n" => return Outcome::Resume(Mode::Next),
        "o" => return Outcome::Resume(Mode::StepOut),
        "r" | "c" => return Outcome::Resume(Mode::Run),
        // `f` as a forwarded wire command selects FINISH (spec.md §4.4's
        // prompt-exit selector); the bundled controller's local `f`
        // command means something different (default stack level) and
        // never forwards this token, but the agent still accepts it.
        "f" => return Outcome::Resume(Mode::Finish),
        "e" => return Outcome::Close,
        "ll" => list_frame_vars(lua, tokens, Scope::Local),
        "lu" => list_frame_vars(lua, tokens, Scope::Upvalue),
        "lg" => list_frame_vars(lua, tokens, Scope::Global),
        "w" => watch(lua, session, tokens),
        "ps" | "bt" => print_stack(lua),
        "sb" | "b" => set_breakpoint(session, tokens, current_file),
        "db" => breakpoint_op(session, tokens, Op::Delete),
        "en" => breakpoint_op(session, tokens, Op::Enable),
        "dis" => breakpoint_op(session, tokens, Op::Disable),
        "lb" => Ok(list_breakpoints(session)),
        "m" => return memory_dump(tokens),
        // Unknown command (spec.md §8 scenario 6): fixed wire message,
        // not derived from any AgentError variant's Display text.
        _ => return Outcome::Reply(AgentMessage::Err("Invalid command!".to_string())),
    };

    match result {
        Ok(body) => Outcome::Reply(AgentMessage::Ok(body)),
        Err(e) => Outcome::Reply(AgentMessage::Err(e.to_string())),
    }
}

fn parse_level(tokens: &[String], idx: usize) -> Result<usize, AgentError> {
    tokens
        .get(idx)
        .ok_or_else(|| AgentError::LevelOutOfRange(0))?
        .parse::<usize>()
        .map_err(|_| AgentError::LevelOutOfRange(0))
}

fn list_frame_vars(lua: &Lua, tokens: &[String], scope: Scope) -> Result<String, AgentError> {
    let level = parse_level(tokens, 1)?;
    let vars = match scope {
        Scope::Local => inspector::list_locals(lua, level),
        Scope::Upvalue => inspector::list_upvalues(lua, level),
        Scope::Global => inspector::list_globals(lua, level),
    }
    .map_err(|e| AgentError::LevelOutOfRange(level).context_or(e))?;

    let mut body = String::new();
    for (name, value) in vars {
        body.push_str(&name);
        body.push('\n');
        body.push_str(&inspector::sample_wire_value(&value).encode());
        body.push('\n');
    }
    Ok(body)
}

fn print_stack(lua: &Lua) -> Result<String, AgentError> {
    let frames = inspector::print_stack(lua)
        .map_err(|e| AgentError::NotFound(format!("stack walk failed: {e}")))?;
    let mut body = String::new();
    for frame in frames {
        body.push_str(&frame.short_src);
        body.push('\n');
        body.push_str(&frame.current_line.to_string());
        body.push('\n');
        body.push_str(frame.name.as_deref().unwrap_or("[N/A]"));
        body.push('\n');
        body.push_str(frame.what.as_deref().unwrap_or("[N/A]"));
        body.push('\n');
    }
    Ok(body)
}

fn set_breakpoint(
    session: &mut Session,
    tokens: &[String],
    current_file: &str,
) -> Result<String, AgentError> {
    let file = tokens.get(1).ok_or_else(|| AgentError::InvalidLine(0))?;
    let file = if file == "." { current_file } else { file };
    let line: u32 = tokens
        .get(2)
        .ok_or_else(|| AgentError::InvalidLine(0))?
        .parse()
        .map_err(|_| AgentError::InvalidLine(0))?;
    session.breakpoints.set(file, line)?;
    Ok(String::new())
}

fn breakpoint_op(session: &mut Session, tokens: &[String], op: Op) -> Result<String, AgentError> {
    let ordinal: usize = tokens
        .get(1)
        .ok_or(AgentError::InvalidOrdinal(0))?
        .parse()
        .map_err(|_| AgentError::InvalidOrdinal(0))?;
    session.breakpoints.opr(op, ordinal)?;
    Ok(String::new())
}

fn list_breakpoints(session: &Session) -> String {
    let mut body = String::new();
    for (ordinal, bp) in session.breakpoints.list() {
        body.push_str(&ordinal.to_string());
        body.push('\n');
        body.push_str(&bp.file);
        body.push('\n');
        body.push_str(&bp.lineno.to_string());
        body.push('\n');
        body.push_str(if bp.enabled { "1" } else { "0" });
        body.push('\n');
    }
    body
}

fn parse_scope(s: &str) -> Result<Scope, AgentError> {
    match s {
        "l" => Ok(Scope::Local),
        "u" => Ok(Scope::Upvalue),
        "g" => Ok(Scope::Global),
        other => Err(AgentError::NotFound(format!("unknown watch scope: {other}"))),
    }
}

/// Split a `name|selector|selector...` token into its name and field-path
/// suffix (spec.md §4.2/§6 `w L scope name[fields]`).
fn split_name_and_fields(token: &str) -> (&str, &str) {
    match token.find('|') {
        Some(idx) => (&token[..idx], &token[idx..]),
        None => (token, ""),
    }
}

fn watch(lua: &Lua, session: &mut Session, tokens: &[String]) -> Result<String, AgentError> {
    let remember = tokens.last().map(String::as_str) == Some("r");
    let rest = if remember {
        &tokens[1..tokens.len() - 1]
    } else {
        &tokens[1..]
    };

    let (start, selectors): (Value, Vec<Selector>) =
        if rest.len() >= 3 && rest[0].parse::<usize>().is_ok() {
            let level: usize = rest[0].parse().unwrap();
            let scope = parse_scope(&rest[1])?;
            let (name, fields) = split_name_and_fields(&rest[2]);
            let value = inspector::resolve_named(lua, level, scope, name)?;
            let selectors = ldb_wire::fieldpath::parse(fields)
                .map_err(|e| AgentError::NotFound(format!("field path: {e}")))?;
            (value, selectors)
        } else {
            let fields = rest.first().map(String::as_str).unwrap_or("");
            let value = session.remembered_value(lua)?;
            let selectors = ldb_wire::fieldpath::parse(fields)
                .map_err(|e| AgentError::NotFound(format!("field path: {e}")))?;
            (value, selectors)
        };

    let resolved = inspector::walk_field_path(lua, start, &selectors)?;

    if remember {
        session
            .remember(lua, resolved.clone())
            .map_err(|e| AgentError::NotFound(format!("remember: {e}")))?;
    }

    watch_value_body(lua, &resolved).map_err(|e| AgentError::NotFound(format!("watch_value: {e}")))
}

/// `watch_value(v)` (spec.md §4.5): a typed-value header line, then a
/// kind-specific trailer.
fn watch_value_body(lua: &Lua, value: &Value) -> mlua::Result<String> {
    let sample = inspector::sample(lua, value)?;
    let mut body = String::new();
    body.push_str(&sample.wire.encode());
    body.push('\n');
    body.push_str(if sample.has_meta { "1" } else { "0" });
    body.push('\n');

    match value {
        Value::Table(t) => {
            for pair in t.clone().pairs::<Value, Value>() {
                let (k, v) = pair?;
                body.push_str(&inspector::sample_wire_value(&k).encode());
                body.push('\n');
                body.push_str(&inspector::sample_wire_value(&v).encode());
                body.push('\n');
            }
        }
        Value::UserData(_) => {
            // Full userdata byte length has no pure-Lua introspection path;
            // left as 0 here since this implementation doesn't carry raw
            // byte-sized userdata blocks (mlua userdata wraps typed Rust
            // values, not malloc'd byte spans).
            body.push_str("0\n");
        }
        Value::Function(_) => {
            if let Some(info) = &sample.function_info {
                body.push_str(&info.what);
                body.push('\n');
                body.push_str(&info.short_src);
                body.push('\n');
                body.push_str(&info.linedefined.to_string());
                body.push('\n');
                body.push_str(&info.lastlinedefined.to_string());
                body.push('\n');
            }
        }
        Value::Thread(_) => {
            body.push_str(sample.thread_status.as_deref().unwrap_or("dead"));
            body.push('\n');
        }
        _ => {}
    }

    Ok(body)
}

/// SAFETY contract: reads `len` bytes starting at `addr` out of this
/// process's own address space. The debugger's threat model is trusted and
/// loopback-oriented (spec.md §1 Non-goals: no security boundary on the
/// wire) — an out-of-range address is expected to be able to crash the
/// debuggee, exactly as a native debugger's memory-read command can.
unsafe fn read_raw_memory(addr: u64, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if len > 0 {
        std::ptr::copy_nonoverlapping(addr as *const u8, out.as_mut_ptr(), len);
    }
    out
}

fn memory_dump(tokens: &[String]) -> Outcome {
    let addr: u64 = match tokens.get(1).and_then(|s| parse_hex_or_dec(s)) {
        Some(a) => a,
        None => return Outcome::Reply(AgentMessage::Err("invalid address".to_string())),
    };
    let len: usize = match tokens.get(2).and_then(|s| s.parse::<usize>().ok()) {
        Some(l) => l,
        None => return Outcome::Reply(AgentMessage::Err("invalid length".to_string())),
    };
    if addr.checked_add(len as u64).is_none() {
        return Outcome::Reply(AgentMessage::Err("address range overflows".to_string()));
    }

    // SAFETY: see `read_raw_memory`.
    let bytes = unsafe { read_raw_memory(addr, len) };
    Outcome::MemDump {
        len: len as u32,
        bytes,
    }
}

fn parse_hex_or_dec(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

impl AgentError {
    /// Narrow helper used only at the `ll`/`lu`/`lg` call site: prefer the
    /// `LevelOutOfRange` framing unless the underlying introspection error
    /// already carries a more specific reason.
    fn context_or(self, inner: mlua::Error) -> AgentError {
        match self {
            AgentError::LevelOutOfRange(level) => {
                AgentError::NotFound(format!("level {level}: {inner}"))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_and_fields_without_path() {
        assert_eq!(split_name_and_fields("x"), ("x", ""));
    }

    #[test]
    fn split_name_and_fields_with_path() {
        assert_eq!(split_name_and_fields("x|n2|s'k'"), ("x", "|n2|s'k'"));
    }

    #[test]
    fn unknown_command_is_invalid_command_error() {
        let lua = Lua::new();
        let mut session = Session::new();
        let outcome = dispatch(&lua, &mut session, &["xyz".to_string()], "a.lua");
        match outcome {
            Outcome::Reply(AgentMessage::Err(msg)) => assert_eq!(msg, "Invalid command!"),
            _ => panic!("expected an ER reply"),
        }
    }

    #[test]
    fn resume_commands_are_recognized() {
        let lua = Lua::new();
        let mut session = Session::new();
        assert!(matches!(
            dispatch(&lua, &mut session, &["s".to_string()], "a.lua"),
            Outcome::Resume(Mode::Step)
        ));
        assert!(matches!(
            dispatch(&lua, &mut session, &["r".to_string()], "a.lua"),
            Outcome::Resume(Mode::Run)
        ));
    }

    #[test]
    fn expression_command_closes_session() {
        let lua = Lua::new();
        let mut session = Session::new();
        assert!(matches!(
            dispatch(&lua, &mut session, &["e".to_string()], "a.lua"),
            Outcome::Close
        ));
    }

    #[test]
    fn set_breakpoint_resolves_dot_to_current_file() {
        let lua = Lua::new();
        let mut session = Session::new();
        let outcome = dispatch(
            &lua,
            &mut session,
            &["sb".to_string(), ".".to_string(), "3".to_string()],
            "a.lua",
        );
        assert!(matches!(outcome, Outcome::Reply(AgentMessage::Ok(_))));
        assert!(session.breakpoints.hit("a.lua", 3));
    }

    #[test]
    fn memory_dump_overflowing_range_is_rejected() {
        let outcome = memory_dump(&[
            "m".to_string(),
            u64::MAX.to_string(),
            "16".to_string(),
        ]);
        assert!(matches!(outcome, Outcome::Reply(AgentMessage::Err(_))));
    }

    #[test]
    fn memory_dump_accepts_hex_address() {
        let mut local = 0u8;
        let addr = &mut local as *mut u8 as u64;
        let outcome = memory_dump(&["m".to_string(), format!("0x{addr:x}"), "1".to_string()]);
        assert!(matches!(outcome, Outcome::MemDump { len: 1, .. }));
    }
}
