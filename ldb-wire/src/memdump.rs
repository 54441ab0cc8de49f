//! Memory-dump streamer (spec.md §4.6).
//!
//! Converts a linear byte stream starting at an arbitrary address into
//! 16-column hex+ASCII rows, handling the case where `start` isn't itself
//! 16-byte aligned: the first row is aligned down, and the columns before
//! `start` are rendered blank rather than omitted, so every row lines up
//! under the same fixed-width header regardless of alignment.

use std::io::Write;

use crate::error::Result;

/// Bytes per dump row.
pub const ROW_WIDTH: usize = 16;

/// One step of pulling more source bytes from the thing being dumped.
///
/// Mirrors the C callback's `1`/`0`/`<0` return convention (more data, end
/// of stream, error) but as a small enum instead of a raw integer.
pub enum ProviderStep {
    /// More bytes are available.
    Chunk(Vec<u8>),
    /// No more bytes; the stream has ended.
    End,
    /// The provider failed; `reason` is surfaced as a protocol error.
    Error(String),
}

/// A source of bytes to dump, called repeatedly until it reports `End` or
/// `Error`, or until `len` bytes have been collected (whichever comes
/// first).
pub trait Provider {
    /// Produce the next chunk of bytes.
    fn next_chunk(&mut self) -> ProviderStep;
}

impl<F: FnMut() -> ProviderStep> Provider for F {
    fn next_chunk(&mut self) -> ProviderStep {
        self()
    }
}

/// Stream `len` bytes starting at `start` from `provider` into `sink`,
/// formatted as 16-column hex+ASCII rows.
///
/// `header`/`footer`, if given, are written verbatim (with a trailing
/// newline) before/after the rows — the "optional header/footer lines"
/// spec.md mentions, used by the agent to bracket the dump with the
/// `%08x\n` length line the wire format expects.
pub fn dump<W: Write>(
    start: u64,
    len: usize,
    provider: &mut dyn Provider,
    sink: &mut W,
    header: Option<&str>,
    footer: Option<&str>,
) -> Result<()> {
    if let Some(h) = header {
        writeln!(sink, "{h}")?;
    }

    let offset = (start % ROW_WIDTH as u64) as usize;
    let row_base = start - offset as u64;

    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        match provider.next_chunk() {
            ProviderStep::Chunk(bytes) => {
                let need = len - data.len();
                if bytes.len() <= need {
                    data.extend_from_slice(&bytes);
                } else {
                    data.extend_from_slice(&bytes[..need]);
                }
            }
            ProviderStep::End => break,
            ProviderStep::Error(reason) => {
                return Err(crate::error::Error::Protocol(format!(
                    "memory provider error: {reason}"
                )))
            }
        }
    }

    let total_cells = offset + data.len();
    let total_rows = total_cells.div_ceil(ROW_WIDTH).max(1);

    for row in 0..total_rows {
        let row_addr = row_base + (row * ROW_WIDTH) as u64;
        let mut hex = String::with_capacity(ROW_WIDTH * 3);
        let mut ascii = String::with_capacity(ROW_WIDTH);

        for col in 0..ROW_WIDTH {
            let cell = row * ROW_WIDTH + col;
            if cell < offset || cell >= offset + data.len() {
                hex.push_str("   ");
                ascii.push(' ');
            } else {
                let b = data[cell - offset];
                hex.push_str(&format!("{b:02x} "));
                ascii.push(printable_or_dot(b));
            }
        }

        writeln!(sink, "0x{row_addr:x}: {hex}; {ascii}")?;
    }

    if let Some(f) = footer {
        writeln!(sink, "{f}")?;
    }

    Ok(())
}

fn printable_or_dot(b: u8) -> char {
    if (32..=126).contains(&(b as u32)) {
        b as char
    } else {
        '.'
    }
}

/// Row count for a dump of `len` bytes starting at `start` — testable
/// property spec.md §8 invariant 6: `ceil((start % 16 + len) / 16)`.
pub fn expected_row_count(start: u64, len: usize) -> usize {
    let offset = (start % ROW_WIDTH as u64) as usize;
    (offset + len).div_ceil(ROW_WIDTH).max(1)
}
