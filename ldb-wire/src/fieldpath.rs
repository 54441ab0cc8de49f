//! Field-path grammar (spec.md §4.2), used by the `w` (watch) command to
//! walk into tables and metatables.
//!
//! A path is a sequence of `|`-separated selectors applied left to right to
//! a starting value. The empty path (or a path consisting solely of `|`)
//! denotes "the value itself".

use crate::error::{Error, Result};

/// The kind half of an identity-selector (`|t`, `|f`, `|d`, `|u`).
///
/// spec.md §9 flags the original resolver for collapsing all four to a
/// single "table" type check when matching values by identity. This
/// implementation keeps the tag-to-kind correspondence strict, per the
/// spec's own recommendation: a `|f<hex>` selector only matches a table
/// entry whose *value* is itself a function with that identity pointer,
/// never a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// `|t<hex>` — key is a table with this identity.
    Table,
    /// `|f<hex>` — key is a function with this identity.
    Function,
    /// `|d<hex>` — key is a thread with this identity.
    Thread,
    /// `|u<hex>` — key is a full userdata with this identity.
    UserData,
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `|n<number>` — numeric table key.
    Number(f64),
    /// `|s'<string>'` — literal string table key.
    Str(String),
    /// `|b<0|1>` — boolean table key.
    Bool(bool),
    /// `|U<hex>` — lightuserdata table key.
    LightUserData(u64),
    /// `|t|f|d|u<hex>` — table entry selected by its *value's* (kind, identity pointer).
    ByIdentity(IdentityKind, u64),
    /// `|m` — descend into the current value's metatable.
    Metatable,
}

/// Parse a field-path string into its ordered selector list.
///
/// An empty string or the lone string `"|"` yields an empty selector list
/// ("the value itself"), per spec.md.
pub fn parse(path: &str) -> Result<Vec<Selector>> {
    if path.is_empty() || path == "|" {
        return Ok(Vec::new());
    }
    if !path.starts_with('|') {
        return Err(Error::Protocol(format!(
            "field path must start with '|': {path}"
        )));
    }

    let mut selectors = Vec::new();
    let bytes = path.as_bytes();
    let mut i = 1; // skip leading '|'

    while i < bytes.len() {
        let tag = bytes[i];
        i += 1;
        match tag {
            b'n' => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'|' {
                    i += 1;
                }
                let text = &path[start..i];
                let n: f64 = text
                    .parse()
                    .map_err(|_| Error::Protocol(format!("invalid numeric key: {text}")))?;
                selectors.push(Selector::Number(n));
            }
            b's' => {
                if i >= bytes.len() || bytes[i] != b'\'' {
                    return Err(Error::Protocol("string key missing opening quote".into()));
                }
                i += 1;
                let start = i;
                while i < bytes.len() && bytes[i] != b'\'' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(Error::Protocol("unterminated string key".into()));
                }
                let text = path[start..i].to_string();
                i += 1; // consume closing quote
                selectors.push(Selector::Str(text));
            }
            b'b' => {
                if i >= bytes.len() {
                    return Err(Error::Protocol("boolean key missing body".into()));
                }
                let v = match bytes[i] {
                    b'0' => false,
                    b'1' => true,
                    other => {
                        return Err(Error::Protocol(format!(
                            "invalid boolean key byte: {}",
                            other as char
                        )))
                    }
                };
                i += 1;
                selectors.push(Selector::Bool(v));
            }
            b'U' | b't' | b'f' | b'd' | b'u' => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'|' {
                    i += 1;
                }
                let text = &path[start..i];
                let ptr = u64::from_str_radix(text, 16)
                    .map_err(|_| Error::Protocol(format!("invalid hex key: {text}")))?;
                selectors.push(match tag {
                    b'U' => Selector::LightUserData(ptr),
                    b't' => Selector::ByIdentity(IdentityKind::Table, ptr),
                    b'f' => Selector::ByIdentity(IdentityKind::Function, ptr),
                    b'd' => Selector::ByIdentity(IdentityKind::Thread, ptr),
                    b'u' => Selector::ByIdentity(IdentityKind::UserData, ptr),
                    _ => unreachable!(),
                });
            }
            b'm' => {
                selectors.push(Selector::Metatable);
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unknown field-path selector '{}'",
                    other as char
                )))
            }
        }

        if i < bytes.len() {
            if bytes[i] != b'|' {
                return Err(Error::Protocol(format!(
                    "expected '|' between field-path selectors at byte {i}"
                )));
            }
            i += 1;
        }
    }

    Ok(selectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_bare_pipe_mean_self() {
        assert_eq!(parse("").unwrap(), Vec::new());
        assert_eq!(parse("|").unwrap(), Vec::new());
    }

    #[test]
    fn numeric_and_string_selectors() {
        let sels = parse("|n2|s'k'").unwrap();
        assert_eq!(
            sels,
            vec![Selector::Number(2.0), Selector::Str("k".to_string())]
        );
    }

    #[test]
    fn string_selector_may_contain_pipe() {
        let sels = parse("|s'a|b'").unwrap();
        assert_eq!(sels, vec![Selector::Str("a|b".to_string())]);
    }

    #[test]
    fn boolean_and_lightuserdata_and_metatable() {
        let sels = parse("|b1|U2a|m").unwrap();
        assert_eq!(
            sels,
            vec![
                Selector::Bool(true),
                Selector::LightUserData(0x2a),
                Selector::Metatable,
            ]
        );
    }

    #[test]
    fn identity_selectors_keep_strict_kind() {
        let sels = parse("|t1|fa|db|uc").unwrap();
        assert_eq!(
            sels,
            vec![
                Selector::ByIdentity(IdentityKind::Table, 1),
                Selector::ByIdentity(IdentityKind::Function, 0xa),
                Selector::ByIdentity(IdentityKind::Thread, 0xb),
                Selector::ByIdentity(IdentityKind::UserData, 0xc),
            ]
        );
    }

    #[test]
    fn unterminated_string_key_is_an_error() {
        assert!(parse("|s'abc").is_err());
    }

    #[test]
    fn unknown_selector_is_an_error() {
        assert!(parse("|z1").is_err());
    }
}
