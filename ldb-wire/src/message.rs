//! Message framing and the agent→controller message grammar (spec.md §4.2).
//!
//! Every logical message — in either direction — is a run of bytes
//! terminated by a single NUL ("end-of-flow") byte. Lines inside a payload
//! are separated by `\n`. This module only deals with framing and the
//! fixed `BR`/`QT`/`OK`/`ER` envelope; command/response bodies are encoded
//! by the caller (agent/controller crates) using [`crate::value`] and
//! [`crate::fieldpath`].

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::sockbuf::SockBuf;

/// Read one NUL-terminated payload from `reader`, growing a small buffer a
/// byte at a time (messages are short control text, not bulk data — except
/// the `m` memory-dump body, which is prefixed by its own length and read
/// by the caller after the textual header portion completes).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            if payload.is_empty() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed connection",
                )));
            }
            return Err(Error::Truncated);
        }
        if byte[0] == 0 {
            return Ok(payload);
        }
        payload.push(byte[0]);
    }
}

/// Write `payload` followed by the NUL end-of-flow byte, then flush.
///
/// Goes through [`SockBuf`] rather than writing directly — the same
/// buffered, sticky-error sink every other real send path in this crate
/// uses (spec.md §4.1 "SB").
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let mut sb = SockBuf::new(writer);
    sb.add(payload);
    sb.add(&[0u8]);
    sb.send()
}

/// A message sent from the agent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// `BR\n<basename>\n<line>\n<pid>\n<fullpath>\n\n` — paused at a line.
    Break {
        /// Source file basename.
        basename: String,
        /// 1-based line number.
        line: u32,
        /// Debuggee process ID (used by the controller to signal-attach).
        pid: u32,
        /// Full absolute path to the source file.
        fullpath: String,
    },
    /// `QT\n\n` — session ending.
    Quit,
    /// `OK\n<body>\n` — success, with a command-specific body.
    Ok(String),
    /// `ER\n<msg>\n` — failure, with a human-readable reason.
    Err(String),
}

impl AgentMessage {
    /// Encode this message to its wire payload (without the NUL terminator).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AgentMessage::Break {
                basename,
                line,
                pid,
                fullpath,
            } => format!("BR\n{basename}\n{line}\n{pid}\n{fullpath}\n\n").into_bytes(),
            AgentMessage::Quit => b"QT\n\n".to_vec(),
            AgentMessage::Ok(body) => format!("OK\n{body}\n").into_bytes(),
            AgentMessage::Err(msg) => format!("ER\n{msg}\n").into_bytes(),
        }
    }

    /// Parse a received payload back into an [`AgentMessage`].
    pub fn parse(payload: &[u8]) -> Result<AgentMessage> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::Protocol("message payload is not valid UTF-8".into()))?;
        let mut lines = text.split('\n');
        match lines.next() {
            Some("BR") => {
                let basename = lines
                    .next()
                    .ok_or_else(|| Error::Protocol("BR missing basename".into()))?
                    .to_string();
                let line: u32 = lines
                    .next()
                    .ok_or_else(|| Error::Protocol("BR missing line".into()))?
                    .parse()
                    .map_err(|_| Error::Protocol("BR line not an integer".into()))?;
                let pid: u32 = lines
                    .next()
                    .ok_or_else(|| Error::Protocol("BR missing pid".into()))?
                    .parse()
                    .map_err(|_| Error::Protocol("BR pid not an integer".into()))?;
                let fullpath = lines
                    .next()
                    .ok_or_else(|| Error::Protocol("BR missing fullpath".into()))?
                    .to_string();
                Ok(AgentMessage::Break {
                    basename,
                    line,
                    pid,
                    fullpath,
                })
            }
            Some("QT") => Ok(AgentMessage::Quit),
            Some("OK") => {
                let body = lines.collect::<Vec<_>>().join("\n");
                let body = body.strip_suffix('\n').unwrap_or(&body);
                Ok(AgentMessage::Ok(body.to_string()))
            }
            Some("ER") => {
                let body = lines.collect::<Vec<_>>().join("\n");
                let body = body.strip_suffix('\n').unwrap_or(&body);
                Ok(AgentMessage::Err(body.to_string()))
            }
            Some(other) => Err(Error::Protocol(format!("unknown message kind: {other}"))),
            None => Err(Error::Protocol("empty message".into())),
        }
    }
}

/// Tokenize a single controller→agent command line: whitespace-separated
/// tokens, double-quoted tokens may contain spaces.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut tok = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => tok.push(c),
                    None => return Err(Error::Protocol("unterminated quoted token".into())),
                }
            }
            tokens.push(tok);
        } else {
            let mut tok = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                tok.push(c);
                chars.next();
            }
            tokens.push(tok);
        }
    }

    Ok(tokens)
}

/// Join tokens back into a single command line, double-quoting any token
/// containing whitespace — the inverse of [`tokenize`], used by the
/// controller to forward a locally-validated command verbatim.
pub fn join(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.chars().any(char::is_whitespace) {
                format!("\"{t}\"")
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
