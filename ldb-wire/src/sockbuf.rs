//! Buffered, sticky-error output wrapper around a byte sink.
//!
//! Mirrors the "SB" (socket buffer) design from spec.md §4.1: a fixed-size
//! output buffer with auto-flush on overflow and a sticky I/O-error flag, so
//! callers can chain any number of `add`/`print` calls and only check the
//! final `send()` for failure.

use std::io::Write;

use crate::error::{Error, Result};

/// Default buffer capacity before an automatic flush.
pub const DEFAULT_CAPACITY: usize = 8 * 1024;

/// A single formatting argument accepted by [`SockBuf::print`].
///
/// `Bytes` stands in for the C API's two-argument `(ptr, len)` pair behind
/// `%Q` — Rust's slices already carry their own length, so there is no
/// separate length argument to thread through.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    /// `%d` — signed decimal integer.
    Int(i64),
    /// `%s` — a string, written verbatim (not NUL-terminated on the wire).
    Str(&'a str),
    /// `%p` — a pointer, rendered as lowercase hex with a `0x` prefix.
    Ptr(usize),
    /// `%0Nx` — unsigned integer, rendered zero-padded hex (width from the
    /// format spec itself, not from this argument).
    Hex(u64),
    /// `%N` — float in general format, trailing `.` trimmed.
    Float(f64),
    /// `%Q` — binary payload, hex-encoded two nibbles per byte, no separator.
    Bytes(&'a [u8]),
}

/// Buffered output with a sticky I/O-error flag.
///
/// Once any underlying write fails, `ioerr` latches `true` and every
/// subsequent `add`/`print`/`send` becomes a no-op that returns the same
/// error, so call sites don't need to thread a `Result` through every
/// formatting call — only the outermost `send()` needs checking.
pub struct SockBuf<W> {
    sink: W,
    buf: Vec<u8>,
    capacity: usize,
    ioerr: bool,
}

impl<W: Write> SockBuf<W> {
    /// Wrap `sink`, ready to accumulate output.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
            capacity: DEFAULT_CAPACITY,
            ioerr: false,
        }
    }

    /// Re-point this buffer at a new sink, clearing pending bytes and the
    /// error flag. Mirrors spec.md's `init(s)`/`reset()`.
    pub fn reset_with(&mut self, sink: W) {
        self.sink = sink;
        self.buf.clear();
        self.ioerr = false;
    }

    /// Clear pending bytes and the error flag without touching the sink.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.ioerr = false;
    }

    /// True if a prior write has failed; all further output is suppressed.
    pub fn has_error(&self) -> bool {
        self.ioerr
    }

    /// Append raw bytes, auto-flushing whenever the buffer fills past
    /// capacity. A no-op once `ioerr` is set.
    pub fn add(&mut self, bytes: &[u8]) {
        if self.ioerr {
            return;
        }
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= self.capacity {
            self.flush_buffer();
        }
    }

    /// Formatted append. `spec` is a template containing directives from
    /// `%d %s %p %0Nx %<precision> %Q`; any other `%` directive is rejected
    /// by returning a `Protocol` error rather than silently misformatting.
    pub fn print(&mut self, spec: &str, args: &[Arg<'_>]) -> Result<()> {
        if self.ioerr {
            return Err(Error::Io(std::io::Error::other("sockbuf: sticky error")));
        }
        let mut arg_iter = args.iter();
        let mut chars = spec.char_indices().peekable();
        let mut out = String::new();

        while let Some((_, c)) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            // Collect an optional zero-padded width for %0Nx, or a bare
            // precision digit string for %N (float).
            let mut width = String::new();
            let mut zero_pad = false;
            if chars.peek().map(|&(_, c)| c) == Some('0') {
                zero_pad = true;
                chars.next();
            }
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    width.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            let Some((_, directive)) = chars.next() else {
                return Err(Error::Protocol("dangling '%' in format spec".into()));
            };
            match directive {
                'd' => match arg_iter.next() {
                    Some(Arg::Int(v)) => out.push_str(&v.to_string()),
                    _ => return Err(Error::Protocol("%d expects an Int argument".into())),
                },
                's' => match arg_iter.next() {
                    Some(Arg::Str(v)) => out.push_str(v),
                    _ => return Err(Error::Protocol("%s expects a Str argument".into())),
                },
                'p' => match arg_iter.next() {
                    Some(Arg::Ptr(v)) => out.push_str(&format!("0x{v:x}")),
                    _ => return Err(Error::Protocol("%p expects a Ptr argument".into())),
                },
                'x' => match arg_iter.next() {
                    Some(Arg::Hex(v)) => {
                        let w: usize = width.parse().unwrap_or(0);
                        if zero_pad && w > 0 {
                            out.push_str(&format!("{v:0width$x}", width = w));
                        } else {
                            out.push_str(&format!("{v:x}"));
                        }
                    }
                    _ => return Err(Error::Protocol("%x expects a Hex argument".into())),
                },
                'Q' => match arg_iter.next() {
                    Some(Arg::Bytes(data)) => {
                        for byte in *data {
                            out.push_str(&format!("{byte:02x}"));
                        }
                    }
                    _ => return Err(Error::Protocol("%Q expects a Bytes argument".into())),
                },
                // `%N` (any bare digit directive, e.g. bare '%' meaning
                // "the next numeric arg, general float format"). We model
                // this as the directive character itself being a digit
                // placeholder already consumed into `width`; a literal
                // directive byte here is always the float form.
                _ if directive.is_ascii_digit() || directive == 'f' => {
                    match arg_iter.next() {
                        Some(Arg::Float(v)) => out.push_str(&trim_trailing_dot(format_float(*v))),
                        _ => return Err(Error::Protocol("%<float> expects a Float argument".into())),
                    }
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unsupported format directive '%{other}'"
                    )))
                }
            }
        }

        self.add(out.as_bytes());
        Ok(())
    }

    /// Flush pending bytes to the sink.
    pub fn send(&mut self) -> Result<()> {
        if self.ioerr {
            return Err(Error::Io(std::io::Error::other("sockbuf: sticky error")));
        }
        self.flush_buffer();
        if self.ioerr {
            return Err(Error::Io(std::io::Error::other("sockbuf: flush failed")));
        }
        Ok(())
    }

    fn flush_buffer(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        if let Err(e) = self.sink.write_all(&self.buf).and_then(|_| self.sink.flush()) {
            log::warn!("sockbuf: write failed, latching sticky error: {e}");
            self.ioerr = true;
        }
        self.buf.clear();
    }
}

/// General floating-point format matching spec.md's `%N` directive: the
/// shortest representation that round-trips, no forced decimal digits.
fn format_float(v: f64) -> String {
    format!("{v}")
}

fn trim_trailing_dot(mut s: String) -> String {
    if s.ends_with('.') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates_and_send_flushes() {
        let mut out = Vec::new();
        let mut sb = SockBuf::new(&mut out);
        sb.add(b"hello ");
        sb.add(b"world");
        sb.send().unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn print_directives() {
        let mut out = Vec::new();
        let mut sb = SockBuf::new(&mut out);
        sb.print("n=%d s=%s p=%p", &[Arg::Int(-7), Arg::Str("hi"), Arg::Ptr(0xdead)])
            .unwrap();
        sb.send().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n=-7 s=hi p=0xdead");
    }

    #[test]
    fn print_hex_zero_padded() {
        let mut out = Vec::new();
        let mut sb = SockBuf::new(&mut out);
        sb.print("%08x", &[Arg::Hex(0x2a)]).unwrap();
        sb.send().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0000002a");
    }

    #[test]
    fn print_q_hex_encodes_bytes() {
        let mut out = Vec::new();
        let mut sb = SockBuf::new(&mut out);
        sb.print("%Q", &[Arg::Bytes(b"hi")]).unwrap();
        sb.send().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "6869");
    }

    #[test]
    fn print_float_trims_trailing_dot() {
        let mut out = Vec::new();
        let mut sb = SockBuf::new(&mut out);
        sb.print("%f", &[Arg::Float(3.0)]).unwrap();
        sb.send().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3");
    }

    #[test]
    fn unknown_directive_is_rejected() {
        let mut out = Vec::new();
        let mut sb = SockBuf::new(&mut out);
        let err = sb.print("%z", &[]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn sticky_error_short_circuits() {
        struct FailingWriter;
        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("boom"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut sb = SockBuf::new(FailingWriter);
        sb.add(b"x".repeat(DEFAULT_CAPACITY + 1).as_slice());
        assert!(sb.has_error());
        let err = sb.send().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
