//! Error types for tn3270r
//!
//! Errors are grouped by the layer that raises them. Protocol errors are
//! recoverable: the caller logs them and continues at the next record.
//! `ConnectionLost`, `Timeout` and `InvalidOperation` are what the blocking
//! application API surfaces; the first two carry the audit trail captured up
//! to the failure.

use std::io;

use thiserror::Error;

/// Top-level error type for tn3270r operations
#[derive(Debug, Error)]
pub enum TN3270Error {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Telnet(#[from] TelnetError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Keyboard(#[from] KeyboardError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport closed, reset or failed a send.
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String, audit: String },

    /// A blocking wait expired while strict timeouts were requested.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: String,
        timeout_ms: u64,
        audit: String,
    },

    /// Programmer error: the call is not valid in the current state.
    #[error("invalid operation {operation}: {reason}")]
    InvalidOperation { operation: String, reason: String },
}

impl TN3270Error {
    pub fn invalid_operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        TN3270Error::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Audit text attached to host-facing failures, if any.
    pub fn audit(&self) -> Option<&str> {
        match self {
            TN3270Error::ConnectionLost { audit, .. } | TN3270Error::Timeout { audit, .. } => {
                Some(audit.as_str())
            }
            _ => None,
        }
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, TN3270Error::ConnectionLost { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TN3270Error::Timeout { .. })
    }
}

/// Network connection related errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused { host: String, port: u16 },

    #[error("connection to {host}:{port} timed out after {timeout_ms} ms")]
    ConnectTimeout { host: String, port: u16, timeout_ms: u64 },

    #[error("could not resolve {host}")]
    DnsResolution { host: String },

    #[error("TLS error: {message}")]
    Tls { message: String },

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

/// Telnet negotiation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelnetError {
    #[error("host rejected device type: reason code {reason}")]
    DeviceTypeRejected { reason: u8 },

    #[error("malformed {option} subnegotiation: {detail}")]
    MalformedSubnegotiation { option: String, detail: String },

    #[error("telnet negotiation did not complete: {detail}")]
    NegotiationIncomplete { detail: String },
}

/// 3270 data stream errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unrecognized 3270 command 0x{command:02X}")]
    UnknownCommand { command: u8 },

    #[error("{context}: data stream ended early")]
    Truncated { context: &'static str },

    #[error("{order} address {address} outside buffer of {buffer_size}")]
    BadAddress {
        order: &'static str,
        address: usize,
        buffer_size: usize,
    },

    #[error("structured field 0x{id:02X} rejected: {reason}")]
    MalformedStructuredField { id: u8, reason: String },

    #[error("structured field framing: {reason}")]
    StructuredFieldFraming { reason: String },

    #[error("TN3270E header: {reason}")]
    HeaderMismatch { reason: String },
}

/// Operator input errors, mirroring the 3270 operator-error indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyboardError {
    #[error("keyboard locked (0x{lock_bits:04X})")]
    Locked { lock_bits: u16 },

    #[error("cursor is in a protected field at {address}")]
    ProtectedField { address: usize },

    #[error("only numeric input is allowed at {address}")]
    NumericField { address: usize },

    #[error("no room to insert in the field at {address}")]
    FieldOverflow { address: usize },

    #[error("character cannot be represented in EBCDIC")]
    Unrepresentable,

    #[error("key not available in the current mode")]
    NotAvailable,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("failed to read or write config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

// Standard I/O errors come from the transport, so they map onto the
// network taxonomy the way a connect attempt would see them.
impl From<io::Error> for TN3270Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TN3270Error::ConnectionLost {
                reason: err.to_string(),
                audit: String::new(),
            },
            _ => TN3270Error::Network(NetworkError::Io(err)),
        }
    }
}

/// Result type alias for tn3270r operations
pub type TN3270Result<T> = Result<T, TN3270Error>;

pub type NetworkResult<T> = Result<T, NetworkError>;
pub type TelnetResult<T> = Result<T, TelnetError>;
pub type ProtocolResult<T> = Result<T, ProtocolError>;
pub type KeyboardResult<T> = Result<T, KeyboardError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_messages() {
        let err = ProtocolError::UnknownCommand { command: 0x42 };
        assert_eq!(err.to_string(), "unrecognized 3270 command 0x42");

        let err = ProtocolError::BadAddress {
            order: "SBA",
            address: 2000,
            buffer_size: 1920,
        };
        assert!(err.to_string().contains("SBA address 2000"));
    }

    #[test]
    fn test_io_error_mapping() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "peer reset");
        assert!(TN3270Error::from(reset).is_connection_lost());

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            TN3270Error::from(refused),
            TN3270Error::Network(NetworkError::Io(_))
        ));
    }

    #[test]
    fn test_audit_snapshot_accessor() {
        let err = TN3270Error::Timeout {
            operation: "refresh".into(),
            timeout_ms: 500,
            audit: "< IAC DO TN3270E".into(),
        };
        assert!(err.is_timeout());
        assert_eq!(err.audit(), Some("< IAC DO TN3270E"));
        assert_eq!(err.to_string(), "refresh timed out after 500 ms");

        let err = TN3270Error::invalid_operation("send_key", "not connected");
        assert_eq!(err.audit(), None);
    }

    #[test]
    fn test_sub_errors_convert() {
        let err: TN3270Error = KeyboardError::Locked { lock_bits: 0x40 }.into();
        assert_eq!(err.to_string(), "keyboard locked (0x0040)");
        let err: TN3270Error = ProtocolError::Truncated { context: "SBA" }.into();
        assert!(matches!(err, TN3270Error::Protocol(_)));
    }
}
