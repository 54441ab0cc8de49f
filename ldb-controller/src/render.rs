//! Rendering of typed responses (spec.md §6 "Response bodies", §4.7 step 4).
//!
//! Everything here is pure text formatting: parse the command-specific body
//! grammar `ldb-wire` defines, turn it into something a human reading the
//! controller's terminal would want to see. No I/O.

use ldb_wire::memdump::{self, Provider, ProviderStep};
use ldb_wire::value::{Number, WireValue};

/// Render one typed-value line for display.
pub fn render_value(line: &str) -> String {
    match WireValue::decode(line) {
        Ok(WireValue::Nil) => "nil".to_string(),
        Ok(WireValue::Bool(b)) => b.to_string(),
        Ok(WireValue::Number(Number::Int(i))) => i.to_string(),
        Ok(WireValue::Number(Number::Float(f))) => f.to_string(),
        Ok(WireValue::String {
            ptr,
            length,
            trunc_len,
            bytes,
        }) => {
            let text = String::from_utf8_lossy(&bytes);
            if trunc_len < length {
                format!("\"{text}...\" (0x{ptr:x}, {length} bytes, truncated)")
            } else {
                format!("\"{text}\" (0x{ptr:x})")
            }
        }
        Ok(WireValue::Table(p)) => format!("table: 0x{p:x}"),
        Ok(WireValue::Function(p)) => format!("function: 0x{p:x}"),
        Ok(WireValue::UserData(p)) => format!("userdata: 0x{p:x}"),
        Ok(WireValue::LightUserData(p)) => format!("lightuserdata: 0x{p:x}"),
        Ok(WireValue::Thread(p)) => format!("thread: 0x{p:x}"),
        Err(e) => format!("<malformed value: {e}>"),
    }
}

/// Render an `ll`/`lu`/`lg` body: alternating name/value lines.
pub fn render_list(body: &str) -> String {
    let mut lines = body.lines();
    let mut out = String::new();
    while let (Some(name), Some(value)) = (lines.next(), lines.next()) {
        out.push_str(&format!("{name} = {}\n", render_value(value)));
    }
    out
}

/// Render a `ps`/`bt` body: 4 lines per frame (file, line, name, what).
pub fn render_stack(body: &str) -> String {
    let mut lines = body.lines();
    let mut out = String::new();
    let mut depth = 0;
    while let (Some(file), Some(line), Some(name), Some(what)) =
        (lines.next(), lines.next(), lines.next(), lines.next())
    {
        depth += 1;
        out.push_str(&format!("#{depth} {file}:{line} {name} ({what})\n"));
    }
    out
}

/// Render an `lb` body: 4 lines per breakpoint (ordinal, file, lineno,
/// enabled).
pub fn render_breakpoints(body: &str) -> String {
    let mut lines = body.lines();
    let mut out = String::new();
    while let (Some(ordinal), Some(file), Some(lineno), Some(enabled)) =
        (lines.next(), lines.next(), lines.next(), lines.next())
    {
        let state = if enabled == "1" { "enabled" } else { "disabled" };
        out.push_str(&format!("{ordinal}) {file}:{lineno} [{state}]\n"));
    }
    out
}

/// Render a `w` body: a typed-value header line, then a kind-specific
/// trailer (spec.md §4.5 "watch_value"). The trailer isn't re-interpreted
/// structurally here (the controller doesn't need to act on it, only show
/// it) beyond decoding `has_meta` and any further typed-value lines.
pub fn render_watch(body: &str) -> String {
    let mut lines = body.lines();
    let Some(header) = lines.next() else {
        return String::new();
    };
    let mut out = format!("{}\n", render_value(header));
    if let Some(has_meta) = lines.next() {
        out.push_str(&format!(
            "  metatable: {}\n",
            if has_meta == "1" { "yes" } else { "no" }
        ));
    }
    for rest in lines {
        out.push_str(&format!("  {rest}\n"));
    }
    out
}

/// Render an `m` dump: raw bytes formatted as 16-column hex+ASCII rows,
/// reusing the same [`ldb_wire::memdump`] formatter the agent's wire
/// contract is built on.
pub fn render_mem_dump(addr: u64, bytes: &[u8]) -> String {
    let mut remaining = bytes;
    let mut provider: Box<dyn Provider> = Box::new(move || {
        if remaining.is_empty() {
            ProviderStep::End
        } else {
            let chunk = remaining;
            remaining = &[];
            ProviderStep::Chunk(chunk.to_vec())
        }
    });
    let mut out = Vec::new();
    if memdump::dump(addr, bytes.len(), provider.as_mut(), &mut out, None, None).is_err() {
        return "<malformed memory dump>".to_string();
    }
    String::from_utf8_lossy(&out).into_owned()
}
