//! IBM 3270 data stream support (RFC 1576, RFC 2355)
//!
//! - [`codes`] - command, order, WCC and AID codes
//! - [`display`] - the presentation space and buffer address codecs
//! - [`field`] - field attribute bytes and extended attributes
//! - [`protocol`] - outbound data stream interpreter and inbound reads
//! - [`structured_field`] - WSF handling and Query Replies
//! - [`tn3270e`] - TN3270E headers and negotiation vocabulary
//! - [`server_screen`] - the host-side screen mirror
//!
//! ```
//! use tn3270r::lib3270::{Display3270, ProtocolProcessor3270, ScreenSize};
//!
//! let mut display = Display3270::with_size(ScreenSize::Model2);
//! let mut processor = ProtocolProcessor3270::new();
//! // Erase/Write, WCC restore, SF protected, "HI", IC
//! let outcome = processor
//!     .process_data(&[0xF5, 0xC3, 0x1D, 0x20, 0xC8, 0xC9, 0x13], &mut display)
//!     .unwrap();
//! assert!(outcome.restore_keyboard);
//! assert_eq!(display.cursor_address(), 3);
//! ```

pub mod codes;
pub mod display;
pub mod field;
pub mod protocol;
pub mod server_screen;
pub mod structured_field;
pub mod tn3270e;

pub use codes::*;
pub use display::{Display3270, ScreenSize};
pub use field::{ExtendedAttributes, FieldAttribute, FieldInfo};
pub use protocol::ProtocolProcessor3270;
pub use server_screen::TNServerScreen;
pub use tn3270e::{DataType, Tn3270eFunction, Tn3270eHeader};
