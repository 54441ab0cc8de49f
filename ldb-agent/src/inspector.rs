//! Value inspector (spec.md §4.5).
//!
//! Everything here is a consumer of the host runtime's own introspection
//! surface — Lua's `debug` library, called from Rust through `mlua`, plus
//! `mlua::Value::to_pointer` for identity — never a reimplementation of it
//! (spec.md §1 places stack walking/local/upvalue/global enumeration out of
//! scope as an external collaborator).

use ldb_wire::fieldpath::{IdentityKind, Selector};
use ldb_wire::value::{Number, WireValue};
use mlua::{Lua, Table, Value};

use crate::error::AgentError;

/// A resolved scripting value plus enough metadata to answer `watch_value`
/// without re-querying the runtime (spec.md §4.5 "watch_value").
#[derive(Debug, Clone)]
pub struct Sample {
    pub wire: WireValue,
    pub has_meta: bool,
    pub function_info: Option<FunctionInfo>,
    pub thread_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub what: String,
    pub short_src: String,
    pub linedefined: i64,
    pub lastlinedefined: i64,
}

/// One entry of `print_stack()` (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct StackEntry {
    pub short_src: String,
    pub current_line: i64,
    pub name: Option<String>,
    pub what: Option<String>,
}

fn debug_table(lua: &Lua) -> mlua::Result<Table> {
    lua.globals().get("debug")
}

/// Identity pointer of any reference-type value, `0` for value types.
fn identity_of(v: &Value) -> u64 {
    match v {
        Value::Nil | Value::Boolean(_) | Value::Integer(_) | Value::Number(_) => 0,
        other => other.to_pointer() as u64,
    }
}

/// Project an `mlua::Value` into the wire's typed-value shape.
pub fn sample_wire_value(v: &Value) -> WireValue {
    match v {
        Value::Nil => WireValue::Nil,
        Value::Boolean(b) => WireValue::Bool(*b),
        Value::Integer(i) => WireValue::Number(Number::Int(*i)),
        Value::Number(f) => WireValue::Number(Number::Float(*f)),
        Value::String(s) => {
            let bytes = s.as_bytes();
            WireValue::string(identity_of(v), bytes.as_ref())
        }
        Value::Table(_) => WireValue::Table(identity_of(v)),
        Value::Function(_) => WireValue::Function(identity_of(v)),
        Value::Thread(_) => WireValue::Thread(identity_of(v)),
        Value::LightUserData(l) => WireValue::LightUserData(l.0 as u64),
        Value::UserData(_) => WireValue::UserData(identity_of(v)),
        // Error/other mlua-internal variants have no wire representation;
        // the runtime never hands these to introspection call sites.
        _ => WireValue::Nil,
    }
}

fn has_metatable(lua: &Lua, v: &Value) -> mlua::Result<bool> {
    let get_metatable: mlua::Function = debug_table(lua)?.get("getmetatable")?;
    let mt: Value = get_metatable.call(v.clone())?;
    Ok(!matches!(mt, Value::Nil))
}

/// Build a full [`Sample`] (wire value plus `watch_value` trailer data).
pub fn sample(lua: &Lua, v: &Value) -> mlua::Result<Sample> {
    let has_meta = has_metatable(lua, v)?;
    let function_info = if let Value::Function(_) = v {
        let getinfo: mlua::Function = debug_table(lua)?.get("getinfo")?;
        let info: Table = getinfo.call((v.clone(), "Sn"))?;
        Some(FunctionInfo {
            what: info.get("what")?,
            short_src: info.get("short_src")?,
            linedefined: info.get("linedefined")?,
            lastlinedefined: info.get("lastlinedefined")?,
        })
    } else {
        None
    };
    let thread_status = if let Value::Thread(t) = v {
        Some(thread_status_of(t))
    } else {
        None
    };
    Ok(Sample {
        wire: sample_wire_value(v),
        has_meta,
        function_info,
        thread_status,
    })
}

fn thread_status_of(t: &mlua::Thread) -> String {
    match t.status() {
        mlua::ThreadStatus::Resumable => "suspended".to_string(),
        mlua::ThreadStatus::Running => "running".to_string(),
        mlua::ThreadStatus::Finished => "dead".to_string(),
        mlua::ThreadStatus::Error => "dead".to_string(),
    }
}

/// Enumerate named locals of `level`, skipping any name beginning with `(`
/// (runtime-internal temporaries, spec.md §4.5).
pub fn list_locals(lua: &Lua, level: usize) -> mlua::Result<Vec<(String, Value)>> {
    let getlocal: mlua::Function = debug_table(lua)?.get("getlocal")?;
    let mut out = Vec::new();
    let mut idx = 1i64;
    loop {
        let (name, value): (Option<String>, Value) = getlocal.call((level as i64, idx))?;
        let Some(name) = name else { break };
        if !name.starts_with('(') {
            out.push((name, value));
        }
        idx += 1;
    }
    Ok(out)
}

/// Enumerate upvalues of `level`'s function.
pub fn list_upvalues(lua: &Lua, level: usize) -> mlua::Result<Vec<(String, Value)>> {
    let dbg = debug_table(lua)?;
    let getinfo: mlua::Function = dbg.get("getinfo")?;
    let getupvalue: mlua::Function = dbg.get("getupvalue")?;
    let info: Table = getinfo.call((level as i64, "f"))?;
    let func: Value = info.get("func")?;
    let mut out = Vec::new();
    let mut idx = 1i64;
    loop {
        let (name, value): (Option<String>, Value) = getupvalue.call((func.clone(), idx))?;
        let Some(name) = name else { break };
        out.push((name, value));
        idx += 1;
    }
    Ok(out)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Iterate the function's `_ENV` upvalue as "globals"; falls back to the
/// registry global table when the frame's function has no `_ENV` upvalue
/// (stripped or a C function) — grounded on the behavior the debugger
/// lineage this spec was distilled from falls back to (SPEC_FULL.md §4.5).
pub fn list_globals(lua: &Lua, level: usize) -> mlua::Result<Vec<(String, Value)>> {
    let env = frame_env_table(lua, level)?.unwrap_or_else(|| lua.globals());
    let mut out = Vec::new();
    for pair in env.pairs::<Value, Value>() {
        let (k, v) = pair?;
        if let Value::String(s) = &k {
            if let Ok(key) = s.to_str() {
                if is_identifier(&key) {
                    out.push((key.to_string(), v));
                }
            }
        }
    }
    Ok(out)
}

fn frame_env_table(lua: &Lua, level: usize) -> mlua::Result<Option<Table>> {
    let dbg = debug_table(lua)?;
    let getinfo: mlua::Function = dbg.get("getinfo")?;
    let getupvalue: mlua::Function = dbg.get("getupvalue")?;
    let info: Table = getinfo.call((level as i64, "f"))?;
    let func: Value = info.get("func")?;
    let mut idx = 1i64;
    loop {
        let (name, value): (Option<String>, Value) = getupvalue.call((func.clone(), idx))?;
        let Some(name) = name else { return Ok(None) };
        if name == "_ENV" {
            return Ok(match value {
                Value::Table(t) => Some(t),
                _ => None,
            });
        }
        idx += 1;
    }
}

/// The stack-frame scope a `watch` lookup is anchored to (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Upvalue,
    Global,
}

/// Resolve `name` fresh from a stack frame, taking the **last** occurrence
/// among locals when shadowed (spec.md §4.5 "last occurrence").
pub fn resolve_named(
    lua: &Lua,
    level: usize,
    scope: Scope,
    name: &str,
) -> Result<Value, AgentError> {
    let vars = match scope {
        Scope::Local => list_locals(lua, level),
        Scope::Upvalue => list_upvalues(lua, level),
        Scope::Global => list_globals(lua, level),
    }
    .map_err(|e| AgentError::NotFound(format!("{name}: {e}")))?;

    vars.into_iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
        .ok_or_else(|| AgentError::NotFound(name.to_string()))
}

/// Walk a parsed field path from a starting value (spec.md §4.2/§4.5).
pub fn walk_field_path(lua: &Lua, start: Value, selectors: &[Selector]) -> Result<Value, AgentError> {
    let mut current = start;
    for sel in selectors {
        current = step(lua, &current, sel)?;
    }
    Ok(current)
}

fn step(lua: &Lua, current: &Value, sel: &Selector) -> Result<Value, AgentError> {
    match sel {
        Selector::Metatable => {
            let dbg = debug_table(lua).map_err(mlua_err)?;
            let getmetatable: mlua::Function = dbg.get("getmetatable").map_err(mlua_err)?;
            let mt: Value = getmetatable.call(current.clone()).map_err(mlua_err)?;
            if matches!(mt, Value::Nil) {
                Err(AgentError::NotFound("metatable".to_string()))
            } else {
                Ok(mt)
            }
        }
        Selector::Number(n) => index_table(current, Value::Number(*n)),
        Selector::Str(s) => index_table(
            current,
            Value::String(lua.create_string(s).map_err(mlua_err)?),
        ),
        Selector::Bool(b) => index_table(current, Value::Boolean(*b)),
        Selector::LightUserData(ptr) => index_table(
            current,
            Value::LightUserData(mlua::LightUserData(*ptr as *mut std::ffi::c_void)),
        ),
        Selector::ByIdentity(kind, ptr) => index_by_identity(current, *kind, *ptr),
    }
}

fn index_table(current: &Value, key: Value) -> Result<Value, AgentError> {
    let Value::Table(t) = current else {
        return Err(AgentError::NotFound("not a table".to_string()));
    };
    let v: Value = t
        .raw_get(key)
        .map_err(|e| AgentError::NotFound(format!("field path step: {e}")))?;
    if matches!(v, Value::Nil) {
        Err(AgentError::NotFound("field not found".to_string()))
    } else {
        Ok(v)
    }
}

/// Scan the current table's entries for a key whose *value* matches
/// `(kind, identity)`. Strict tag-to-kind correspondence — see
/// [`ldb_wire::fieldpath::IdentityKind`]'s doc comment for why this
/// implementation does not collapse all four kinds to "is a table".
fn index_by_identity(current: &Value, kind: IdentityKind, ptr: u64) -> Result<Value, AgentError> {
    let Value::Table(t) = current else {
        return Err(AgentError::NotFound("not a table".to_string()));
    };
    for pair in t.clone().pairs::<Value, Value>() {
        let (_, v) = pair.map_err(|e| AgentError::NotFound(format!("field path scan: {e}")))?;
        let matches_kind = match (kind, &v) {
            (IdentityKind::Table, Value::Table(_)) => true,
            (IdentityKind::Function, Value::Function(_)) => true,
            (IdentityKind::Thread, Value::Thread(_)) => true,
            (IdentityKind::UserData, Value::UserData(_)) => true,
            _ => false,
        };
        if matches_kind && identity_of(&v) == ptr {
            return Ok(v);
        }
    }
    Err(AgentError::NotFound("no value with that identity".to_string()))
}

fn mlua_err(e: mlua::Error) -> AgentError {
    AgentError::NotFound(e.to_string())
}

/// The innermost frame's `(short_src, current_line)`, used to build the
/// `BR` message at prompt entry (spec.md §4.4 "Resolve the current frame").
pub fn current_source_location(lua: &Lua) -> mlua::Result<(String, i64)> {
    let getinfo: mlua::Function = debug_table(lua)?.get("getinfo")?;
    let info: Table = getinfo.call((1i64, "Sl"))?;
    Ok((info.get("short_src")?, info.get("currentline")?))
}

/// `print_stack()` — innermost frame first (spec.md §4.5).
pub fn print_stack(lua: &Lua) -> mlua::Result<Vec<StackEntry>> {
    let getinfo: mlua::Function = debug_table(lua)?.get("getinfo")?;
    let mut out = Vec::new();
    let mut level = 1i64;
    loop {
        let info: Value = getinfo.call((level, "Sln"))?;
        let Value::Table(info) = info else { break };
        out.push(StackEntry {
            short_src: info.get("short_src").unwrap_or_default(),
            current_line: info.get("currentline").unwrap_or(-1),
            name: info.get("name").ok(),
            what: info.get("what").ok(),
        });
        level += 1;
    }
    Ok(out)
}
