//! Agent-local error kinds that don't already live in `ldb-wire`.

/// Errors raised by introspection and breakpoint operations, surfaced to the
/// controller as `ER` responses per spec.md §7.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A requested stack level doesn't exist.
    #[error("stack level {0} out of range")]
    LevelOutOfRange(usize),

    /// A named variable or field-path step could not be resolved.
    #[error("variable or field not found: {0}")]
    NotFound(String),

    /// A breakpoint line number is outside `[1, 65536)`.
    #[error("invalid line number: {0}")]
    InvalidLine(u32),

    /// A breakpoint ordinal doesn't refer to a live breakpoint.
    #[error("invalid breakpoint ordinal: {0}")]
    InvalidOrdinal(usize),

    /// No controller connection is available.
    #[error("not connected")]
    NotConnected,

    /// The `e` (expression evaluation) command, which spec.md documents as
    /// an accepted-but-unimplemented sentinel.
    #[error("expression evaluation is not implemented")]
    Unimplemented,

    /// Breakpoint insertion failed (bookkeeping allocation).
    #[error("out of memory setting breakpoint")]
    OutOfMemory,
}
