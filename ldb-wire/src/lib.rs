//! Wire protocol codec shared by the `ldb` debuggee agent and controller.
//!
//! This crate owns everything in spec.md that is purely about bytes on the
//! wire: the buffered sticky-error output wrapper ([`sockbuf`]), message
//! framing and the `BR`/`QT`/`OK`/`ER` envelope ([`message`]), typed-value
//! encoding ([`value`]), the field-path selector grammar ([`fieldpath`]),
//! and the memory-dump row formatter ([`memdump`]). It knows nothing about
//! Lua, breakpoints, or sockets — those live in `ldb-agent` and
//! `ldb-controller`.

pub mod error;
pub mod fieldpath;
pub mod memdump;
pub mod message;
pub mod sockbuf;
pub mod value;

pub use error::{Error, Result};
