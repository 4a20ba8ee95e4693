//! Protocol building blocks shared by the terminal and server sides
//!
//! - [`ebcdic`] - CP037 conversion
//! - [`telnet_base`] - telnet codes, IAC escaping and record framing
//! - [`traits`] - the transport and trace seams
//!
//! # Examples
//!
//! ```
//! use tn3270r::protocol_common::ebcdic::{ebcdic_to_ascii, ascii_to_ebcdic};
//!
//! assert_eq!(ebcdic_to_ascii(0xC1), 'A');
//! assert_eq!(ascii_to_ebcdic('A'), 0xC1);
//! ```

pub mod ebcdic;
pub mod telnet_base;
pub mod traits;

pub use ebcdic::{ascii_to_ebcdic, ascii_to_ebcdic_vec, ebcdic_to_ascii, ebcdic_to_ascii_string};
pub use telnet_base::{
    build_negotiation, build_subnegotiation, escape_iac, frame_record, unescape_iac,
    TelnetCommand, TelnetOption,
};
pub use traits::{AuditLog, LogTrace, MemoryTransport, NullTrace, TraceDirection, TraceSink, Transport};
