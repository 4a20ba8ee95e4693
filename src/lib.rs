//! tn3270r: a TN3270/TN3270E terminal emulation engine
//!
//! The crate drives a 3270 session from code: it negotiates telnet and
//! TN3270E with a host, interprets the 3270 data stream into a screen
//! buffer, and turns keys and text into the inbound records the host
//! expects. A small server side lets tests and tools play the host.
//!
//! ```rust,no_run
//! use tn3270r::{Emulator, SessionConfig, TnKey};
//!
//! let mut emulator = Emulator::new(SessionConfig::default())?;
//! emulator.connect("mainframe.example.com", 23, None)?;
//! emulator.wait_for_connect(None)?;
//! emulator.send_text("LOGON")?;
//! emulator.send_key(TnKey::Enter, Some(5000))?;
//! println!("{}", emulator.get_screen_text(0, 0, 80)?);
//! # Ok::<(), tn3270r::TN3270Error>(())
//! ```

/// PROTOCOL COMMON: EBCDIC, telnet framing and the transport/trace seams
pub mod protocol_common;

/// LIB3270: 3270 data stream, screen buffer and TN3270E headers
pub mod lib3270;

pub mod config;
pub mod controller;
pub mod error;
pub mod keyboard;
pub mod network;
pub mod server;
pub mod session;
pub mod telnet_negotiation;

pub use config::SessionConfig;
pub use controller::{Emulator, ScreenSignal, SignalWait};
pub use error::{TN3270Error, TN3270Result};
pub use keyboard::{Keyboard, KeyboardLock, TnKey};
pub use lib3270::display::ScreenSize;
pub use lib3270::server_screen::TNServerScreen;
pub use network::{NetworkConnection, TransportEvent};
pub use protocol_common::traits::{NullTrace, TraceSink, Transport};
pub use server::{ServerConnection, TnServer};
pub use session::{ScreenSnapshot, SessionStatus, Tn3270Session};
pub use telnet_negotiation::{ConnectionState, TelnetNegotiator};
