//! Blocking application API over a background connection
//!
//! [`Emulator`] owns a [`Tn3270Session`] behind a mutex and a consumer thread
//! that drains the transport's event channel into it. Application calls lock
//! the same mutex, so host data and operator actions are applied in the
//! order they happen. Waiting for the host is done on a [`ScreenSignal`]
//! that the consumer raises whenever a record leaves the keyboard unlocked.

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::error::{TN3270Error, TN3270Result};
use crate::keyboard::TnKey;
use crate::network::{NetworkConnection, TransportEvent};
use crate::protocol_common::traits::{AuditLog, TraceDirection, TraceSink, Transport};
use crate::session::{ScreenSnapshot, SessionStatus, Tn3270Session};

/// How a wait on the screen signal ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalWait {
    Raised,
    TimedOut,
    Closed(String),
}

#[derive(Debug, Default)]
struct SignalState {
    raised: bool,
    closed: Option<String>,
}

/// Edge flag with a reset, shared between the consumer and waiters.
#[derive(Debug, Default)]
pub struct ScreenSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl ScreenSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn raise(&self) {
        self.state().raised = true;
        self.cond.notify_all();
    }

    /// Clear the flag and reopen after a close.
    pub fn reset(&self) {
        let mut state = self.state();
        state.raised = false;
        state.closed = None;
    }

    /// Wake every waiter with the given reason; later waits fail at once.
    pub fn close(&self, reason: impl Into<String>) {
        self.state().closed = Some(reason.into());
        self.cond.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        self.state().raised
    }

    pub fn wait(&self, timeout: Duration) -> SignalWait {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            if state.raised {
                return SignalWait::Raised;
            }
            if let Some(reason) = &state.closed {
                return SignalWait::Closed(reason.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return SignalWait::TimedOut;
            }
            state = match self.cond.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// How often the consumer checks for a local close while idle
const CONSUMER_POLL: Duration = Duration::from_millis(100);

pub type DisconnectCallback = Box<dyn Fn(Option<&str>) + Send + Sync>;

struct Shared {
    session: Mutex<Tn3270Session>,
    transport: Mutex<Option<Box<dyn Transport>>>,
    signal: ScreenSignal,
    last_error: Mutex<Option<String>>,
    on_disconnect: Mutex<Option<DisconnectCallback>>,
    trace: Arc<dyn TraceSink>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Tn3270Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transport(&self) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
        self.transport.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_last_error(&self, message: String) {
        *self.last_error.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(message);
    }

    fn connection_lost(&self, reason: impl Into<String>) -> TN3270Error {
        TN3270Error::ConnectionLost {
            reason: reason.into(),
            audit: self.trace.snapshot(),
        }
    }

    /// Write to the host. The caller holds the session lock, which keeps
    /// writes in the order their bytes were produced.
    fn send(&self, data: &[u8]) -> TN3270Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut transport = self.transport();
        let Some(transport) = transport.as_mut() else {
            return Err(self.connection_lost("not connected"));
        };
        transport.send(data).map_err(|e| {
            let err = self.connection_lost(e.to_string());
            self.set_last_error(err.to_string());
            err
        })
    }

    fn handle_event(&self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Data(data) => {
                let mut session = self.session();
                let out = session.feed(&data);
                if let Err(e) = self.send(&out) {
                    log::warn!("could not answer host: {}", e);
                }
                if let Some(err) = session.last_error() {
                    self.set_last_error(err.to_string());
                }
                if session.take_screen_ready() {
                    self.signal.raise();
                }
                true
            }
            TransportEvent::Closed(reason) => {
                self.shutdown(reason);
                false
            }
        }
    }

    fn shutdown(&self, reason: Option<String>) {
        self.session().disconnected();
        if let Some(mut transport) = self.transport().take() {
            transport.close();
        }
        if let Some(reason) = &reason {
            log::warn!("connection lost: {}", reason);
            self.trace.trace(TraceDirection::Event, &format!("lost: {}", reason));
            self.set_last_error(format!("connection lost: {}", reason));
        }
        {
            let callback = self
                .on_disconnect
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(callback) = callback.as_ref() {
                callback(reason.as_deref());
            }
        }
        self.signal.close(reason.unwrap_or_else(|| "disconnected".to_string()));
    }
}

/// A 3270 terminal driven by application code
pub struct Emulator {
    config: SessionConfig,
    shared: Arc<Shared>,
    consumer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("session", &*self.shared.session())
            .finish()
    }
}

impl Emulator {
    /// An emulator recording its protocol trace in an in-memory audit log.
    pub fn new(config: SessionConfig) -> TN3270Result<Self> {
        Self::with_trace(config, AuditLog::shared(512))
    }

    pub fn with_trace(config: SessionConfig, trace: Arc<dyn TraceSink>) -> TN3270Result<Self> {
        config.validate()?;
        let session = Tn3270Session::from_config(&config)?.with_trace(Arc::clone(&trace));
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                transport: Mutex::new(None),
                signal: ScreenSignal::new(),
                last_error: Mutex::new(None),
                on_disconnect: Mutex::new(None),
                trace,
            }),
            consumer: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to `host:port`, asking for `lu_name` when given.
    pub fn connect(&mut self, host: &str, port: u16, lu_name: Option<&str>) -> TN3270Result<()> {
        let mut config = self.config.clone();
        config.host = host.to_string();
        config.port = port;
        if let Some(lu) = lu_name {
            config.lu_name = Some(lu.to_string());
        }
        self.connect_with_config(config)
    }

    pub fn connect_with_config(&mut self, config: SessionConfig) -> TN3270Result<()> {
        config.validate()?;
        self.disconnect();
        self.config = config;
        let (connection, events) = NetworkConnection::connect(&self.config)?;
        self.attach(Box::new(connection), events)
    }

    /// Run over an already open transport whose received data arrives on
    /// `events`.
    pub fn attach(
        &mut self,
        transport: Box<dyn Transport>,
        events: mpsc::Receiver<TransportEvent>,
    ) -> TN3270Result<()> {
        self.disconnect();
        {
            let mut session = self.shared.session();
            *session = Tn3270Session::from_config(&self.config)?
                .with_trace(Arc::clone(&self.shared.trace));
            session.connected();
            *self.shared.transport() = Some(transport);
            self.shared.signal.reset();
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("tn3270-session".to_string())
            .spawn(move || loop {
                match events.recv_timeout(CONSUMER_POLL) {
                    Ok(event) => {
                        if !shared.handle_event(event) {
                            return;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        // Closed locally by a transport that reports nothing
                        if shared.transport().is_none() {
                            shared.shutdown(None);
                            return;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        shared.shutdown(Some("transport channel closed".to_string()));
                        return;
                    }
                }
            })
            .map_err(|e| TN3270Error::invalid_operation("connect", e.to_string()))?;
        self.consumer = Some(handle);
        Ok(())
    }

    /// Close the connection and wait for the consumer to finish.
    pub fn disconnect(&mut self) {
        let transport = self.shared.transport().take();
        if let Some(mut transport) = transport {
            log::info!("disconnecting");
            transport.close();
        }
        if let Some(handle) = self.consumer.take() {
            if handle.join().is_err() {
                log::warn!("session thread panicked");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.session().state().is_connected()
    }

    /// Called from the session thread when the connection ends, with the
    /// reason unless the close was local.
    pub fn set_disconnect_callback<F>(&self, callback: F)
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        *self
            .shared
            .on_disconnect
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Box::new(callback));
    }

    /// The last host-facing error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn timeout(&self, timeout_ms: Option<u64>) -> Duration {
        Duration::from_millis(timeout_ms.unwrap_or(self.config.default_timeout_ms))
    }

    fn finish_wait(&self, operation: &str, outcome: SignalWait, timeout: Duration) -> TN3270Result<bool> {
        match outcome {
            SignalWait::Raised => Ok(true),
            SignalWait::Closed(reason) => Err(self.shared.connection_lost(reason)),
            SignalWait::TimedOut => {
                let locked = self.shared.session().keyboard().is_locked();
                if locked && self.config.throw_on_locked_screen_timeout {
                    return Err(TN3270Error::Timeout {
                        operation: operation.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                        audit: self.shared.trace.snapshot(),
                    });
                }
                Ok(false)
            }
        }
    }

    /// Wait for the first unlocked screen after connecting.
    pub fn wait_for_connect(&self, timeout_ms: Option<u64>) -> TN3270Result<bool> {
        let timeout = self.timeout(timeout_ms);
        let outcome = self.shared.signal.wait(timeout);
        self.finish_wait("wait_for_connect", outcome, timeout)
    }

    /// Wait until the host has answered the last submitted key.
    pub fn wait(&self, timeout_ms: Option<u64>) -> TN3270Result<bool> {
        let timeout = self.timeout(timeout_ms);
        let outcome = self.shared.signal.wait(timeout);
        self.finish_wait("wait", outcome, timeout)
    }

    /// With `wait_for_screen`, wait for the next unlocked screen from now on.
    /// Without it, report whether the keyboard is currently unlocked.
    pub fn refresh(&self, wait_for_screen: bool, timeout_ms: Option<u64>) -> TN3270Result<bool> {
        if !wait_for_screen {
            return Ok(!self.shared.session().keyboard().is_locked());
        }
        self.shared.signal.reset();
        let timeout = self.timeout(timeout_ms);
        let outcome = self.shared.signal.wait(timeout);
        self.finish_wait("refresh", outcome, timeout)
    }

    /// Press a key. For attention keys with `wait_ms` set, block until the
    /// host unlocks the keyboard or the wait expires.
    pub fn send_key(&self, key: TnKey, wait_ms: Option<u64>) -> TN3270Result<bool> {
        {
            let mut session = self.shared.session();
            if key.causes_submit() {
                self.shared.signal.reset();
            }
            let out = session.send_key(key)?;
            self.shared.send(&out)?;
        }
        match wait_ms {
            Some(ms) if key.causes_submit() => {
                let timeout = Duration::from_millis(ms);
                let outcome = self.shared.signal.wait(timeout);
                self.finish_wait("send_key", outcome, timeout)
            }
            _ => Ok(true),
        }
    }

    /// Type text at the cursor.
    pub fn send_text(&self, text: &str) -> TN3270Result<()> {
        self.shared.session().send_text(text)
    }

    pub fn move_cursor(&self, x: usize, y: usize) -> TN3270Result<()> {
        self.shared.session().move_cursor(x, y)
    }

    pub fn get_screen_text(&self, x: usize, y: usize, length: usize) -> TN3270Result<String> {
        self.shared.session().get_screen_text(x, y, length)
    }

    pub fn current_screen_snapshot(&self) -> ScreenSnapshot {
        self.shared.session().snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.session().status()
    }

    /// Text received while the host was talking NVT.
    pub fn nvt_text(&self) -> String {
        self.shared.session().nvt_text()
    }

    /// The recent protocol trace, as attached to errors.
    pub fn audit_snapshot(&self) -> String {
        self.shared.trace.snapshot()
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.disconnect();
    }
}
