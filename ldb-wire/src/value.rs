//! Typed-value wire encoding (spec.md §4.2 "Typed value encoding").
//!
//! One line per value; the first character tags the kind, the remainder is
//! the kind-specific body. All identity pointers are opaque tokens on the
//! wire — the controller never dereferences them, only compares or echoes
//! them back in field-path requests.

use crate::error::{Error, Result};

/// A Lua number as sampled for the wire: Lua 5.4 has distinct integer and
/// float subtypes, and the wire format for each differs only in whether a
/// trailing `.` needs trimming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integer subtype — rendered as a plain decimal.
    Int(i64),
    /// Float subtype — rendered in general format, trailing `.` stripped.
    Float(f64),
}

/// A scripting value sampled for transport, per spec.md §3/§4.2.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// `l` — nil.
    Nil,
    /// `b` — boolean.
    Bool(bool),
    /// `n` — number (integer or float subtype).
    Number(Number),
    /// `s` — string: identity pointer, full length, truncation length, and
    /// the (possibly truncated) raw bytes.
    String {
        /// Interned string identity pointer.
        ptr: u64,
        /// Full byte length of the string.
        length: usize,
        /// Length actually captured (`min(length, 256)`).
        trunc_len: usize,
        /// The captured bytes (`trunc_len` of them).
        bytes: Vec<u8>,
    },
    /// `t` — table, identified by pointer.
    Table(u64),
    /// `f` — function, identified by pointer.
    Function(u64),
    /// `u` — full userdata, identified by pointer.
    UserData(u64),
    /// `U` — lightuserdata, identified by its raw pointer value.
    LightUserData(u64),
    /// `d` — thread (coroutine), identified by pointer.
    Thread(u64),
}

/// Maximum number of string bytes captured in an `s` encoding, per spec.md.
pub const STRING_SAMPLE_CAP: usize = 256;

impl WireValue {
    /// The single-character tag for this value's kind.
    pub fn tag(&self) -> char {
        match self {
            WireValue::Nil => 'l',
            WireValue::Bool(_) => 'b',
            WireValue::Number(_) => 'n',
            WireValue::String { .. } => 's',
            WireValue::Table(_) => 't',
            WireValue::Function(_) => 'f',
            WireValue::UserData(_) => 'u',
            WireValue::LightUserData(_) => 'U',
            WireValue::Thread(_) => 'd',
        }
    }

    /// Build a (possibly truncated) string value from a full byte slice and
    /// its identity pointer, capping the captured sample at
    /// [`STRING_SAMPLE_CAP`].
    pub fn string(ptr: u64, full: &[u8]) -> WireValue {
        let trunc_len = full.len().min(STRING_SAMPLE_CAP);
        WireValue::String {
            ptr,
            length: full.len(),
            trunc_len,
            bytes: full[..trunc_len].to_vec(),
        }
    }

    /// The identity pointer of this value, if it has one (every kind except
    /// nil, bool, and number).
    pub fn identity(&self) -> Option<u64> {
        match self {
            WireValue::String { ptr, .. } => Some(*ptr),
            WireValue::Table(p)
            | WireValue::Function(p)
            | WireValue::UserData(p)
            | WireValue::LightUserData(p)
            | WireValue::Thread(p) => Some(*p),
            WireValue::Nil | WireValue::Bool(_) | WireValue::Number(_) => None,
        }
    }

    /// Encode this value as one wire line (no trailing newline).
    pub fn encode(&self) -> String {
        match self {
            WireValue::Nil => "l".to_string(),
            WireValue::Bool(b) => format!("b{}", if *b { 1 } else { 0 }),
            WireValue::Number(Number::Int(i)) => format!("n{i}"),
            WireValue::Number(Number::Float(f)) => format!("n{}", trim_trailing_dot(format!("{f}"))),
            WireValue::String {
                ptr,
                length,
                trunc_len,
                bytes,
            } => {
                let hex = hex_encode(bytes);
                format!("s{ptr:x}:{length}:{trunc_len}:{hex}")
            }
            WireValue::Table(p) => format!("t{p:x}"),
            WireValue::Function(p) => format!("f{p:x}"),
            WireValue::UserData(p) => format!("u{p:x}"),
            WireValue::LightUserData(p) => format!("U{p:x}"),
            WireValue::Thread(p) => format!("d{p:x}"),
        }
    }

    /// Decode one wire line back into a [`WireValue`].
    pub fn decode(line: &str) -> Result<WireValue> {
        let mut chars = line.chars();
        let tag = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty typed-value line".into()))?;
        let body = chars.as_str();
        match tag {
            'l' => Ok(WireValue::Nil),
            'b' => match body {
                "0" => Ok(WireValue::Bool(false)),
                "1" => Ok(WireValue::Bool(true)),
                other => Err(Error::Protocol(format!("invalid bool body: {other}"))),
            },
            'n' => {
                if let Ok(i) = body.parse::<i64>() {
                    Ok(WireValue::Number(Number::Int(i)))
                } else {
                    let f: f64 = body
                        .parse()
                        .map_err(|_| Error::Protocol(format!("invalid number body: {body}")))?;
                    Ok(WireValue::Number(Number::Float(f)))
                }
            }
            's' => {
                let mut parts = body.splitn(4, ':');
                let ptr = parts
                    .next()
                    .ok_or_else(|| Error::Protocol("string value missing ptr".into()))?;
                let length = parts
                    .next()
                    .ok_or_else(|| Error::Protocol("string value missing length".into()))?;
                let trunc_len = parts
                    .next()
                    .ok_or_else(|| Error::Protocol("string value missing trunc_len".into()))?;
                let hex = parts
                    .next()
                    .ok_or_else(|| Error::Protocol("string value missing hex body".into()))?;
                let ptr = u64::from_str_radix(ptr, 16)
                    .map_err(|_| Error::Protocol(format!("bad string ptr: {ptr}")))?;
                let length: usize = length
                    .parse()
                    .map_err(|_| Error::Protocol(format!("bad string length: {length}")))?;
                let trunc_len: usize = trunc_len
                    .parse()
                    .map_err(|_| Error::Protocol(format!("bad string trunc_len: {trunc_len}")))?;
                let bytes = hex_decode(hex)?;
                if bytes.len() != trunc_len {
                    return Err(Error::Protocol(
                        "string value trunc_len does not match hex body length".into(),
                    ));
                }
                Ok(WireValue::String {
                    ptr,
                    length,
                    trunc_len,
                    bytes,
                })
            }
            't' | 'f' | 'u' | 'd' | 'U' => {
                let ptr = u64::from_str_radix(body, 16)
                    .map_err(|_| Error::Protocol(format!("bad pointer body: {body}")))?;
                Ok(match tag {
                    't' => WireValue::Table(ptr),
                    'f' => WireValue::Function(ptr),
                    'u' => WireValue::UserData(ptr),
                    'd' => WireValue::Thread(ptr),
                    'U' => WireValue::LightUserData(ptr),
                    _ => unreachable!(),
                })
            }
            other => Err(Error::Protocol(format!("unknown value tag '{other}'"))),
        }
    }
}

fn trim_trailing_dot(mut s: String) -> String {
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Hex-encode bytes as lowercase nibble pairs, no separator — the `%Q`
/// directive's on-the-wire representation.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Decode a lowercase (or uppercase) hex nibble-pair string back to bytes.
pub fn hex_decode(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(Error::Protocol("odd-length hex string".into()));
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for chunk in bytes.chunks(2) {
        let s = std::str::from_utf8(chunk).map_err(|_| Error::Protocol("non-UTF8 hex".into()))?;
        let byte = u8::from_str_radix(s, 16)
            .map_err(|_| Error::Protocol(format!("invalid hex byte: {s}")))?;
        out.push(byte);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_round_trips() {
        let v = WireValue::Nil;
        assert_eq!(WireValue::decode(&v.encode()).unwrap(), v);
    }

    #[test]
    fn bool_round_trips() {
        for b in [true, false] {
            let v = WireValue::Bool(b);
            assert_eq!(WireValue::decode(&v.encode()).unwrap(), v);
        }
    }

    #[test]
    fn int_number_has_no_trailing_dot() {
        let v = WireValue::Number(Number::Int(7));
        assert_eq!(v.encode(), "n7");
    }

    #[test]
    fn float_number_trims_trailing_dot() {
        let v = WireValue::Number(Number::Float(3.5));
        assert_eq!(v.encode(), "n3.5");
        let whole = WireValue::Number(Number::Float(3.0));
        assert_eq!(whole.encode(), "n3");
    }

    #[test]
    fn string_round_trips_with_hex_payload() {
        let v = WireValue::string(0x1000, b"hi");
        let encoded = v.encode();
        assert_eq!(encoded, "s1000:2:2:6869");
        assert_eq!(WireValue::decode(&encoded).unwrap(), v);
    }

    #[test]
    fn string_truncates_long_payloads() {
        let data = vec![b'x'; 300];
        let v = WireValue::string(0x2, &data);
        match &v {
            WireValue::String {
                length, trunc_len, ..
            } => {
                assert_eq!(*length, 300);
                assert_eq!(*trunc_len, STRING_SAMPLE_CAP);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn table_function_userdata_thread_lightuserdata_round_trip() {
        for v in [
            WireValue::Table(0xdead),
            WireValue::Function(0xbeef),
            WireValue::UserData(0xf00d),
            WireValue::Thread(0xcafe),
            WireValue::LightUserData(0x1),
        ] {
            assert_eq!(WireValue::decode(&v.encode()).unwrap(), v);
        }
    }

    #[test]
    fn hex_decode_rejects_odd_length() {
        assert!(hex_decode("abc").is_err());
    }
}
