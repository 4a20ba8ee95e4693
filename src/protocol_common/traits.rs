//! Seams between the protocol core and the outside world
//!
//! The core never touches a socket or a global logger directly. It writes
//! through a [`Transport`] and reports what it did to a [`TraceSink`].

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

/// Something that can carry bytes to the host.
pub trait Transport: Send {
    /// Write all of `data`.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Close the connection. Further sends fail.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Direction of a traced item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    /// Received from the host
    Inbound,
    /// Sent to the host
    Outbound,
    /// A state change or decision
    Event,
}

impl TraceDirection {
    fn marker(self) -> &'static str {
        match self {
            TraceDirection::Inbound => "<",
            TraceDirection::Outbound => ">",
            TraceDirection::Event => "*",
        }
    }
}

/// Receives trace events from the session.
pub trait TraceSink: Send + Sync {
    fn trace(&self, direction: TraceDirection, message: &str);

    /// Text of recent events, attached to errors. Sinks that keep nothing
    /// return an empty string.
    fn snapshot(&self) -> String {
        String::new()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn trace(&self, _direction: TraceDirection, _message: &str) {}
}

/// Forwards trace events to the `log` facade at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn trace(&self, direction: TraceDirection, message: &str) {
        log::trace!("{} {}", direction.marker(), message);
    }
}

/// Keeps the most recent events in memory for error reports.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(256)
    }
}

impl TraceSink for AuditLog {
    fn trace(&self, direction: TraceDirection, message: &str) {
        log::trace!("{} {}", direction.marker(), message);
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(format!("{} {}", direction.marker(), message));
        }
    }

    fn snapshot(&self) -> String {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

/// In-memory transport that records what was sent. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<u8>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything sent so far.
    pub fn take_sent(&self) -> Vec<u8> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"));
        }
        self.sent
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "transport lock poisoned"))?
            .extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }

    fn is_open(&self) -> bool {
        self.closed.lock().map(|closed| !*closed).unwrap_or(false)
    }
}
