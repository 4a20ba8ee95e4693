//! The per-connection context
//!
//! [`Tn3270Session`] owns everything one terminal connection needs: the
//! telnet negotiator, the data-stream interpreter, the screen and the
//! keyboard. Bytes from the host go in through [`Tn3270Session::feed`];
//! whatever has to go back comes out as framed bytes for the transport.
//! The session does no I/O of its own, which keeps it testable without a
//! socket.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::{KeyboardError, ProtocolError, TN3270Error, TN3270Result};
use crate::keyboard::{Keyboard, KeyboardLock, TnKey, KL_AWAITING_FIRST, KL_OIA_TWAIT};
use crate::lib3270::codes::{AidKey, TN3270E_NEG_COMMAND_REJECT};
use crate::lib3270::display::{CursorOp, Display3270, ScreenSize};
use crate::lib3270::field::FieldInfo;
use crate::lib3270::protocol::{DataStreamOutcome, ProtocolProcessor3270};
use crate::lib3270::tn3270e::{negative_sense, DataType, ResponseStatus, Tn3270eFunction, Tn3270eHeader};
use crate::protocol_common::telnet_base::{frame_record, hex_dump, TelnetCommand};
use crate::protocol_common::traits::{NullTrace, TraceDirection, TraceSink};
use crate::telnet_negotiation::{ConnectionState, NegotiatorConfig, TelnetEvent, TelnetNegotiator};

const IAC: u8 = TelnetCommand::IAC as u8;

/// NVT lines kept for `nvt_text`
const MAX_NVT_LINES: usize = 500;

/// Screen contents at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenSnapshot {
    pub rows: Vec<String>,
    pub fields: Vec<FieldInfo>,
    /// Cursor as (column, row)
    pub cursor: (usize, usize),
    pub cursor_address: usize,
    pub keyboard_locked: bool,
}

impl ScreenSnapshot {
    /// The rows joined with newlines.
    pub fn text(&self) -> String {
        self.rows.join("\n")
    }
}

/// One-line view of where the session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub lock: KeyboardLock,
    pub lu_name: Option<String>,
    pub model: ScreenSize,
    pub bound: bool,
    pub functions: Vec<Tn3270eFunction>,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} model {} keyboard {}",
            self.state.name(),
            self.model.model_number(),
            self.lock
        )?;
        if let Some(lu) = &self.lu_name {
            write!(f, " lu {}", lu)?;
        }
        if self.bound {
            write!(f, " bound")?;
        }
        Ok(())
    }
}

pub struct Tn3270Session {
    negotiator: TelnetNegotiator,
    processor: ProtocolProcessor3270,
    display: Display3270,
    keyboard: Keyboard,
    trace: Arc<dyn TraceSink>,

    nvt_lines: Vec<String>,
    nvt_partial: String,
    /// Outbound TN3270E sequence number, 15 bits
    xmit_seq: u16,
    /// Set when a record left the keyboard unlocked; cleared by the waiter
    screen_ready: bool,
    last_error: Option<ProtocolError>,
}

impl fmt::Debug for Tn3270Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tn3270Session")
            .field("state", &self.negotiator.state())
            .field("lock", &self.keyboard.lock())
            .field("model", &self.display.model())
            .finish()
    }
}

impl Tn3270Session {
    pub fn new(negotiation: NegotiatorConfig, model: ScreenSize) -> Self {
        Self {
            negotiator: TelnetNegotiator::new(negotiation),
            processor: ProtocolProcessor3270::new(),
            display: Display3270::with_size(model),
            keyboard: Keyboard::new(),
            trace: Arc::new(NullTrace),
            nvt_lines: Vec::new(),
            nvt_partial: String::new(),
            xmit_seq: 0,
            screen_ready: false,
            last_error: None,
        }
    }

    pub fn from_config(config: &SessionConfig) -> TN3270Result<Self> {
        let mut session = Self::new(config.negotiator_config()?, config.model);
        session.keyboard.always_skip = config.always_skip_to_unprotected;
        session.keyboard.numeric_lock = config.numeric_lock;
        Ok(session)
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn trace(&self) -> &Arc<dyn TraceSink> {
        &self.trace
    }

    pub fn state(&self) -> ConnectionState {
        self.negotiator.state()
    }

    pub fn display(&self) -> &Display3270 {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display3270 {
        &mut self.display
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn processor(&self) -> &ProtocolProcessor3270 {
        &self.processor
    }

    pub fn negotiator(&self) -> &TelnetNegotiator {
        &self.negotiator
    }

    /// The most recent data-stream error, kept until the next one.
    pub fn last_error(&self) -> Option<&ProtocolError> {
        self.last_error.as_ref()
    }

    /// The transport is up and negotiation can start.
    pub fn connected(&mut self) {
        self.negotiator.set_state(ConnectionState::ConnectedInitial);
        self.keyboard.connected();
        self.screen_ready = false;
        self.trace.trace(TraceDirection::Event, "connected");
    }

    /// The transport went away.
    pub fn disconnected(&mut self) {
        self.negotiator.set_state(ConnectionState::NotConnected);
        self.keyboard.disconnected();
        self.processor.set_sscp_mode(false);
        self.screen_ready = false;
        self.trace.trace(TraceDirection::Event, "disconnected");
    }

    /// Process bytes from the host and return what must be written back.
    pub fn feed(&mut self, data: &[u8]) -> Vec<u8> {
        self.trace.trace(TraceDirection::Inbound, &hex_dump(data));
        let mut out = Vec::new();
        for event in self.negotiator.process_incoming_data(data) {
            match event {
                TelnetEvent::Send(bytes) => out.extend_from_slice(&bytes),
                TelnetEvent::Record(record) => self.handle_record(&record, &mut out),
                TelnetEvent::Nvt(text) => self.append_nvt(&text),
                TelnetEvent::StateChanged { from, to } => self.state_changed(from, to),
                TelnetEvent::Error(err) => {
                    log::warn!("negotiation: {}", err);
                    self.trace.trace(TraceDirection::Event, &err.to_string());
                }
            }
        }
        if !out.is_empty() {
            self.trace.trace(TraceDirection::Outbound, &hex_dump(&out));
        }
        out
    }

    /// Take the "complete unlocked screen arrived" flag.
    pub fn take_screen_ready(&mut self) -> bool {
        std::mem::take(&mut self.screen_ready)
    }

    fn state_changed(&mut self, from: ConnectionState, to: ConnectionState) {
        self.trace.trace(
            TraceDirection::Event,
            &format!("state {} -> {}", from.name(), to.name()),
        );
        self.processor.set_sscp_mode(to == ConnectionState::ConnectedSscp);
        if matches!(to, ConnectionState::ConnectedAnsi | ConnectionState::ConnectedNvt) {
            // No 3270 screen is coming
            self.keyboard.lock_mut().clear(KL_AWAITING_FIRST);
        }
    }

    fn handle_record(&mut self, record: &[u8], out: &mut Vec<u8>) {
        if !self.negotiator.tn3270e_active() {
            let result = self.processor.process_data(record, &mut self.display);
            self.finish_record(result, None, out);
            return;
        }

        let (header, payload) = match Tn3270eHeader::parse(record) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("dropping record: {}", err);
                self.trace.trace(TraceDirection::Event, &err.to_string());
                self.last_error = Some(err);
                return;
            }
        };
        log::trace!("record header {}", header);

        match header.data_type {
            DataType::Data3270 | DataType::SscpLuData => {
                let result = self.processor.process_data(payload, &mut self.display);
                self.finish_record(result, Some(&header), out);
            }
            DataType::NvtData => {
                self.append_nvt(payload);
                self.respond(&header, true, ResponseStatus::Positive, out);
            }
            DataType::BindImage | DataType::Unbind => {
                self.trace
                    .trace(TraceDirection::Event, &format!("{:?}", header.data_type));
                self.respond(&header, true, ResponseStatus::Positive, out);
            }
            other => log::debug!("ignoring {:?} record", other),
        }
    }

    fn finish_record(
        &mut self,
        result: Result<DataStreamOutcome, ProtocolError>,
        header: Option<&Tn3270eHeader>,
        out: &mut Vec<u8>,
    ) {
        match result {
            Ok(outcome) => {
                self.keyboard.lock_mut().clear(KL_AWAITING_FIRST);
                if outcome.restore_keyboard {
                    self.keyboard.restore();
                }
                for response in &outcome.responses {
                    let data_type = self.outbound_type();
                    out.extend(self.frame(data_type, response));
                }
                if let Some(header) = header {
                    let status = if outcome.malformed {
                        ResponseStatus::Negative(TN3270E_NEG_COMMAND_REJECT)
                    } else {
                        ResponseStatus::Positive
                    };
                    self.respond(header, !outcome.malformed, status, out);
                }
                if !self.keyboard.is_locked() {
                    self.screen_ready = true;
                }
            }
            Err(err) => {
                log::warn!("data stream error: {}", err);
                self.trace.trace(TraceDirection::Event, &err.to_string());
                if let Some(header) = header {
                    let status = ResponseStatus::Negative(negative_sense(&err));
                    self.respond(header, false, status, out);
                }
                self.last_error = Some(err);
            }
        }
    }

    fn respond(
        &mut self,
        header: &Tn3270eHeader,
        processed_ok: bool,
        status: ResponseStatus,
        out: &mut Vec<u8>,
    ) {
        if header.wants_response(processed_ok)
            && self.negotiator.has_function(Tn3270eFunction::Responses)
        {
            out.extend(frame_record(&header.response(status)));
        }
    }

    fn outbound_type(&self) -> DataType {
        if self.processor.is_sscp_mode() {
            DataType::SscpLuData
        } else {
            DataType::Data3270
        }
    }

    /// Frame an inbound record, adding the TN3270E header when active.
    fn frame(&mut self, data_type: DataType, data: &[u8]) -> Vec<u8> {
        if !self.negotiator.tn3270e_active() {
            return frame_record(data);
        }
        let mut header = Tn3270eHeader::new(data_type);
        header.seq_number = self.xmit_seq;
        self.xmit_seq = (self.xmit_seq + 1) & 0x7FFF;
        let mut record = header.to_bytes().to_vec();
        record.extend_from_slice(data);
        frame_record(&record)
    }

    fn append_nvt(&mut self, data: &[u8]) {
        for &byte in data {
            match byte {
                b'\n' => {
                    let line = std::mem::take(&mut self.nvt_partial);
                    self.nvt_lines.push(line);
                }
                b'\r' | 0 => {}
                byte if byte.is_ascii_graphic() || byte == b' ' || byte == b'\t' => {
                    self.nvt_partial.push(byte as char)
                }
                _ => {}
            }
        }
        if self.nvt_lines.len() > MAX_NVT_LINES {
            let excess = self.nvt_lines.len() - MAX_NVT_LINES;
            self.nvt_lines.drain(..excess);
        }
        self.screen_ready = true;
    }

    /// Text received in NVT mode, one line per entry, partial line last.
    pub fn nvt_text(&self) -> String {
        let mut lines = self.nvt_lines.clone();
        if !self.nvt_partial.is_empty() {
            lines.push(self.nvt_partial.clone());
        }
        lines.join("\n")
    }

    fn require_3270(&self, operation: &str) -> TN3270Result<()> {
        let state = self.negotiator.state();
        if !state.is_connected() {
            return Err(TN3270Error::invalid_operation(operation, "not connected"));
        }
        if !state.is_3270() && !self.negotiator.tn3270e_active() {
            return Err(TN3270Error::invalid_operation(
                operation,
                format!("not in 3270 mode ({})", state.name()),
            ));
        }
        Ok(())
    }

    /// Type text at the cursor.
    pub fn send_text(&mut self, text: &str) -> TN3270Result<()> {
        self.require_3270("send_text")?;
        self.keyboard.type_text(&mut self.display, text, false)?;
        Ok(())
    }

    /// Press a key. Returns the bytes to send, empty for local edit keys.
    pub fn send_key(&mut self, key: TnKey) -> TN3270Result<Vec<u8>> {
        self.require_3270("send_key")?;
        let out = match key {
            TnKey::Attn => {
                if !self.negotiator.tn3270e_active() {
                    return Err(KeyboardError::NotAvailable.into());
                }
                self.keyboard.lock_mut().set(KL_OIA_TWAIT);
                vec![IAC, TelnetCommand::IP as u8]
            }
            TnKey::SysReq
                if self.negotiator.tn3270e_active()
                    && self.negotiator.has_function(Tn3270eFunction::SysReq) =>
            {
                vec![IAC, TelnetCommand::AO as u8]
            }
            key => match key.aid() {
                Some(aid) => self.submit(aid)?,
                None => {
                    self.keyboard.edit_key(key, &mut self.display)?;
                    Vec::new()
                }
            },
        };
        if !out.is_empty() {
            log::debug!("key {}", key.name());
            self.trace.trace(
                TraceDirection::Outbound,
                &format!("{} {}", key.name(), hex_dump(&out)),
            );
        }
        Ok(out)
    }

    fn submit(&mut self, aid: AidKey) -> TN3270Result<Vec<u8>> {
        let record = self
            .keyboard
            .key_aid(aid, &mut self.display, &mut self.processor)?;
        self.screen_ready = false;
        let data_type = self.outbound_type();
        Ok(self.frame(data_type, &record))
    }

    /// Put the cursor at (column, row).
    pub fn move_cursor(&mut self, x: usize, y: usize) -> TN3270Result<()> {
        if x >= self.display.cols() || y >= self.display.rows() {
            return Err(TN3270Error::invalid_operation(
                "move_cursor",
                format!(
                    "({}, {}) outside {}x{}",
                    x,
                    y,
                    self.display.cols(),
                    self.display.rows()
                ),
            ));
        }
        self.display.cursor_move(CursorOp::Exact, x, y);
        Ok(())
    }

    /// Text of `length` cells starting at (column, row).
    pub fn get_screen_text(&self, x: usize, y: usize, length: usize) -> TN3270Result<String> {
        if x >= self.display.cols() || y >= self.display.rows() {
            return Err(TN3270Error::invalid_operation(
                "get_screen_text",
                format!("({}, {}) outside the screen", x, y),
            ));
        }
        Ok(self.display.text_at(x, y, length))
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        ScreenSnapshot {
            rows: self.display.screen_rows(),
            fields: self.display.fields(),
            cursor: self.display.cursor_position(),
            cursor_address: self.display.cursor_address(),
            keyboard_locked: self.keyboard.is_locked(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.negotiator.state(),
            lock: self.keyboard.lock(),
            lu_name: self.negotiator.connected_lu().map(str::to_string),
            model: self.display.model(),
            bound: self.negotiator.is_bound(),
            functions: self.negotiator.functions().to_vec(),
        }
    }
}
