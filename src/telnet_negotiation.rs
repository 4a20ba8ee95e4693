//! Telnet option negotiation for TN3270 and TN3270E
//!
//! The negotiator consumes raw bytes from the host one at a time, so commands
//! and records may be split across reads at any point. It answers option
//! requests, runs the TTYPE and TN3270E subnegotiations, tracks the
//! connection state and hands complete 3270 records (up to IAC EOR) or NVT
//! text to the session as events.

use std::collections::HashSet;

use crate::error::TelnetError;
use crate::lib3270::codes::{
    TN3270E_DT_3270_DATA, TN3270E_DT_BIND_IMAGE, TN3270E_DT_NVT_DATA, TN3270E_DT_SSCP_LU_DATA,
    TN3270E_DT_UNBIND,
};
use crate::lib3270::tn3270e::*;
use crate::protocol_common::telnet_base::{
    build_negotiation, build_subnegotiation, hex_dump, option_name, push_environ_text,
    TelnetCommand, TelnetOption, ENV_IS, ENV_SEND, ENV_USERVAR, ENV_VALUE, ENV_VAR, TTYPE_IS,
    TTYPE_SEND,
};

const IAC: u8 = TelnetCommand::IAC as u8;

/// Connection state as seen by the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    NotConnected,
    Resolving,
    Pending,
    /// TCP is up, nothing negotiated yet
    ConnectedInitial,
    /// Negotiation settled on plain NVT
    ConnectedAnsi,
    /// Classic TN3270: BINARY, EOR and TTYPE agreed
    Connected3270,
    /// TN3270E agreed, no data received yet
    ConnectedInitial3270E,
    /// TN3270E carrying NVT data
    ConnectedNvt,
    /// TN3270E carrying SSCP-LU data
    ConnectedSscp,
    /// TN3270E carrying 3270 data
    Connected3270E,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        !matches!(
            self,
            ConnectionState::NotConnected | ConnectionState::Resolving | ConnectionState::Pending
        )
    }

    /// States in which 3270 records (not NVT text) flow.
    pub fn is_3270(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected3270
                | ConnectionState::Connected3270E
                | ConnectionState::ConnectedSscp
        )
    }

    pub fn is_tn3270e(self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectedInitial3270E
                | ConnectionState::ConnectedNvt
                | ConnectionState::ConnectedSscp
                | ConnectionState::Connected3270E
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Resolving => "Resolving",
            ConnectionState::Pending => "Pending",
            ConnectionState::ConnectedInitial => "ConnectedInitial",
            ConnectionState::ConnectedAnsi => "ConnectedAnsi",
            ConnectionState::Connected3270 => "Connected3270",
            ConnectionState::ConnectedInitial3270E => "ConnectedInitial3270E",
            ConnectionState::ConnectedNvt => "ConnectedNvt",
            ConnectionState::ConnectedSscp => "ConnectedSscp",
            ConnectionState::Connected3270E => "Connected3270E",
        }
    }
}

/// Something the session has to act on after feeding bytes in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Bytes to write to the host, already framed
    Send(Vec<u8>),
    /// One complete 3270 record with IAC doubling removed. In TN3270E
    /// states it still starts with the five-byte header.
    Record(Vec<u8>),
    /// Text received while not in 3270 mode
    Nvt(Vec<u8>),
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A negotiation problem that did not stop the connection
    Error(TelnetError),
}

/// Position of the byte-level parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelnetState {
    Data,
    Iac,
    Will,
    Wont,
    Do,
    Dont,
    Sb,
    SbIac,
}

/// Terminal-side negotiation parameters
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Device type without the `-E` suffix, e.g. `IBM-3278-2`
    pub terminal_type: String,
    pub lu_name: Option<String>,
    pub refuse_tn3270e: bool,
    pub functions: Vec<Tn3270eFunction>,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            terminal_type: "IBM-3278-2".to_string(),
            lu_name: None,
            refuse_tn3270e: false,
            functions: vec![
                Tn3270eFunction::BindImage,
                Tn3270eFunction::DataStreamCtl,
                Tn3270eFunction::Responses,
                Tn3270eFunction::SysReq,
            ],
        }
    }
}

#[derive(Debug)]
pub struct TelnetNegotiator {
    config: NegotiatorConfig,
    state: ConnectionState,
    telnet_state: TelnetState,

    /// Options we have agreed to perform (WILL sent and accepted)
    local_options: HashSet<u8>,
    /// Options the host performs (DO sent and accepted)
    remote_options: HashSet<u8>,

    sb_buffer: Vec<u8>,
    record: Vec<u8>,
    nvt: Vec<u8>,
    events: Vec<TelnetEvent>,

    /// Device type and LU the host confirmed with DEVICE-TYPE IS
    connected_type: Option<String>,
    connected_lu: Option<String>,
    negotiated_functions: Vec<Tn3270eFunction>,
    functions_negotiated: bool,
    bound: bool,
}

impl TelnetNegotiator {
    pub fn new(config: NegotiatorConfig) -> Self {
        Self {
            config,
            state: ConnectionState::NotConnected,
            telnet_state: TelnetState::Data,
            local_options: HashSet::new(),
            remote_options: HashSet::new(),
            sb_buffer: Vec::new(),
            record: Vec::new(),
            nvt: Vec::new(),
            events: Vec::new(),
            connected_type: None,
            connected_lu: None,
            negotiated_functions: Vec::new(),
            functions_negotiated: false,
            bound: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Set by the transport for the pre-negotiation states. Clears all
    /// option state when the connection starts over or goes away.
    pub fn set_state(&mut self, state: ConnectionState) {
        if matches!(state, ConnectionState::NotConnected | ConnectionState::ConnectedInitial) {
            self.reset_options();
        }
        self.change_state(state);
    }

    fn reset_options(&mut self) {
        self.telnet_state = TelnetState::Data;
        self.local_options.clear();
        self.remote_options.clear();
        self.sb_buffer.clear();
        self.record.clear();
        self.nvt.clear();
        self.reset_tn3270e();
    }

    fn reset_tn3270e(&mut self) {
        self.connected_type = None;
        self.connected_lu = None;
        self.negotiated_functions.clear();
        self.functions_negotiated = false;
        self.bound = false;
    }

    pub fn is_option_active(&self, option: TelnetOption) -> bool {
        self.local_options.contains(&(option as u8))
    }

    pub fn is_remote_option_active(&self, option: TelnetOption) -> bool {
        self.remote_options.contains(&(option as u8))
    }

    /// TN3270E was agreed, whether or not FUNCTIONS has finished.
    pub fn tn3270e_active(&self) -> bool {
        self.local_options.contains(&(TelnetOption::Tn3270e as u8))
    }

    pub fn functions(&self) -> &[Tn3270eFunction] {
        &self.negotiated_functions
    }

    pub fn has_function(&self, function: Tn3270eFunction) -> bool {
        self.functions_negotiated && self.negotiated_functions.contains(&function)
    }

    pub fn connected_lu(&self) -> Option<&str> {
        self.connected_lu.as_deref()
    }

    pub fn connected_type(&self) -> Option<&str> {
        self.connected_type.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Terminal type as sent in TTYPE IS and DEVICE-TYPE REQUEST.
    pub fn terminal_type(&self) -> String {
        if self.config.terminal_type.ends_with("-E") {
            self.config.terminal_type.clone()
        } else {
            format!("{}-E", self.config.terminal_type)
        }
    }

    /// Feed bytes received from the host.
    pub fn process_incoming_data(&mut self, data: &[u8]) -> Vec<TelnetEvent> {
        for &byte in data {
            self.process_byte(byte);
        }
        self.flush_nvt();
        std::mem::take(&mut self.events)
    }

    fn process_byte(&mut self, byte: u8) {
        match self.telnet_state {
            TelnetState::Data => {
                if byte == IAC {
                    self.telnet_state = TelnetState::Iac;
                } else {
                    self.store_data(byte);
                }
            }
            TelnetState::Iac => {
                self.telnet_state = TelnetState::Data;
                match TelnetCommand::from_u8(byte) {
                    Some(TelnetCommand::IAC) => self.store_data(IAC),
                    Some(TelnetCommand::WILL) => self.telnet_state = TelnetState::Will,
                    Some(TelnetCommand::WONT) => self.telnet_state = TelnetState::Wont,
                    Some(TelnetCommand::DO) => self.telnet_state = TelnetState::Do,
                    Some(TelnetCommand::DONT) => self.telnet_state = TelnetState::Dont,
                    Some(TelnetCommand::SB) => {
                        self.sb_buffer.clear();
                        self.telnet_state = TelnetState::Sb;
                    }
                    Some(TelnetCommand::EOR) => self.end_of_record(),
                    Some(cmd) => log::debug!("RCVD IAC {}", cmd.name()),
                    None => log::debug!("RCVD IAC 0x{:02X} (ignored)", byte),
                }
            }
            TelnetState::Will => {
                self.telnet_state = TelnetState::Data;
                self.handle_will_command(byte);
            }
            TelnetState::Wont => {
                self.telnet_state = TelnetState::Data;
                self.handle_wont_command(byte);
            }
            TelnetState::Do => {
                self.telnet_state = TelnetState::Data;
                self.handle_do_command(byte);
            }
            TelnetState::Dont => {
                self.telnet_state = TelnetState::Data;
                self.handle_dont_command(byte);
            }
            TelnetState::Sb => {
                if byte == IAC {
                    self.telnet_state = TelnetState::SbIac;
                } else {
                    self.sb_buffer.push(byte);
                }
            }
            TelnetState::SbIac => {
                if byte == TelnetCommand::SE as u8 {
                    self.telnet_state = TelnetState::Data;
                    let data = std::mem::take(&mut self.sb_buffer);
                    self.handle_subnegotiation(&data);
                } else {
                    // IAC IAC inside SB is a literal 0xFF
                    self.sb_buffer.push(byte);
                    self.telnet_state = TelnetState::Sb;
                }
            }
        }
    }

    /// Records flow once TN3270E is on or classic 3270 mode is agreed.
    fn in_record_mode(&self) -> bool {
        self.tn3270e_active() || self.state == ConnectionState::Connected3270
    }

    fn store_data(&mut self, byte: u8) {
        if self.in_record_mode() {
            self.record.push(byte);
        } else {
            self.nvt.push(byte);
        }
    }

    fn flush_nvt(&mut self) {
        if !self.nvt.is_empty() {
            let text = std::mem::take(&mut self.nvt);
            self.events.push(TelnetEvent::Nvt(text));
        }
    }

    fn end_of_record(&mut self) {
        let record = std::mem::take(&mut self.record);
        if !self.in_record_mode() {
            log::debug!("RCVD IAC EOR outside 3270 mode");
            return;
        }
        log::trace!("RCVD record {}", hex_dump(&record));
        if self.tn3270e_active() {
            self.track_submode(&record);
        }
        self.flush_nvt();
        self.events.push(TelnetEvent::Record(record));
    }

    /// Follow the TN3270E data type of each record into a submode.
    fn track_submode(&mut self, record: &[u8]) {
        let Some(&data_type) = record.first() else {
            return;
        };
        let next = match data_type {
            TN3270E_DT_3270_DATA => ConnectionState::Connected3270E,
            TN3270E_DT_NVT_DATA => ConnectionState::ConnectedNvt,
            TN3270E_DT_SSCP_LU_DATA => ConnectionState::ConnectedSscp,
            TN3270E_DT_BIND_IMAGE => {
                self.bound = true;
                return;
            }
            TN3270E_DT_UNBIND => {
                self.bound = false;
                if self.state == ConnectionState::Connected3270E {
                    ConnectionState::ConnectedInitial3270E
                } else {
                    return;
                }
            }
            _ => return,
        };
        self.change_state(next);
    }

    fn change_state(&mut self, next: ConnectionState) {
        if next != self.state {
            log::info!("connection state {} -> {}", self.state.name(), next.name());
            self.events.push(TelnetEvent::StateChanged {
                from: self.state,
                to: next,
            });
            self.state = next;
        }
    }

    /// Recompute the state after an option changed.
    fn check_in3270(&mut self) {
        let next = if self.tn3270e_active() {
            match self.state {
                ConnectionState::ConnectedNvt
                | ConnectionState::ConnectedSscp
                | ConnectionState::Connected3270E => self.state,
                _ => ConnectionState::ConnectedInitial3270E,
            }
        } else if self.local_options.contains(&(TelnetOption::Binary as u8))
            && self.local_options.contains(&(TelnetOption::EndOfRecord as u8))
            && self.local_options.contains(&(TelnetOption::TerminalType as u8))
            && self.remote_options.contains(&(TelnetOption::Binary as u8))
            && self.remote_options.contains(&(TelnetOption::EndOfRecord as u8))
        {
            ConnectionState::Connected3270
        } else if self.state == ConnectionState::ConnectedInitial {
            return;
        } else {
            ConnectionState::ConnectedAnsi
        };
        if next != self.state && !next.is_tn3270e() {
            self.reset_tn3270e();
        }
        self.change_state(next);
    }

    fn accepts_remote(&self, option: u8) -> bool {
        match TelnetOption::from_u8(option) {
            Some(
                TelnetOption::Binary
                | TelnetOption::EndOfRecord
                | TelnetOption::SuppressGoAhead
                | TelnetOption::Echo,
            ) => true,
            Some(TelnetOption::Tn3270e) => !self.config.refuse_tn3270e,
            _ => false,
        }
    }

    fn accepts_local(&self, option: u8) -> bool {
        match TelnetOption::from_u8(option) {
            Some(
                TelnetOption::Binary
                | TelnetOption::EndOfRecord
                | TelnetOption::TerminalType
                | TelnetOption::SuppressGoAhead
                | TelnetOption::NewEnvironment,
            ) => true,
            Some(TelnetOption::Tn3270e) => !self.config.refuse_tn3270e,
            _ => false,
        }
    }

    /// Host offers to perform an option.
    fn handle_will_command(&mut self, option: u8) {
        log::debug!("RCVD WILL {}", option_name(option));
        if self.accepts_remote(option) {
            if self.remote_options.insert(option) {
                self.send_command(TelnetCommand::DO, option);
                self.check_in3270();
            }
        } else {
            self.send_command(TelnetCommand::DONT, option);
        }
    }

    fn handle_wont_command(&mut self, option: u8) {
        log::debug!("RCVD WONT {}", option_name(option));
        if self.remote_options.remove(&option) {
            self.send_command(TelnetCommand::DONT, option);
            self.check_in3270();
        }
    }

    /// Host asks us to perform an option.
    fn handle_do_command(&mut self, option: u8) {
        log::debug!("RCVD DO {}", option_name(option));
        if self.accepts_local(option) {
            if option == TelnetOption::Tn3270e as u8 {
                self.reset_tn3270e();
            }
            if self.local_options.insert(option) {
                self.send_command(TelnetCommand::WILL, option);
                self.check_in3270();
            }
        } else {
            self.send_command(TelnetCommand::WONT, option);
        }
    }

    fn handle_dont_command(&mut self, option: u8) {
        log::debug!("RCVD DONT {}", option_name(option));
        if self.local_options.remove(&option) {
            self.send_command(TelnetCommand::WONT, option);
            self.check_in3270();
        }
    }

    fn handle_subnegotiation(&mut self, data: &[u8]) {
        let Some((&option, body)) = data.split_first() else {
            return;
        };
        match TelnetOption::from_u8(option) {
            Some(TelnetOption::TerminalType) => self.handle_ttype(body),
            Some(TelnetOption::NewEnvironment) => self.handle_new_environ(body),
            Some(TelnetOption::Tn3270e) if self.tn3270e_active() => self.handle_tn3270e(body),
            _ => log::debug!("RCVD SB {} ({} bytes, ignored)", option_name(option), body.len()),
        }
    }

    fn handle_ttype(&mut self, body: &[u8]) {
        if body.first() != Some(&TTYPE_SEND) {
            self.report(TelnetError::MalformedSubnegotiation {
                option: "TTYPE".into(),
                detail: format!("expected SEND, got {}", hex_dump(body)),
            });
            return;
        }
        let mut reply = vec![TTYPE_IS];
        reply.extend_from_slice(self.terminal_type().as_bytes());
        if let Some(lu) = &self.config.lu_name {
            reply.push(b'@');
            reply.extend_from_slice(lu.as_bytes());
        }
        log::debug!("SENT SB TTYPE IS {}", String::from_utf8_lossy(&reply[1..]));
        self.send_subnegotiation(TelnetOption::TerminalType, &reply);
    }

    /// NEW-ENVIRON SEND. With an LU configured the reply names it as USER
    /// and DEVNAME; otherwise the IS is empty.
    fn handle_new_environ(&mut self, body: &[u8]) {
        if !self.local_options.contains(&(TelnetOption::NewEnvironment as u8)) {
            log::debug!("RCVD SB NEW-ENVIRON without WILL, ignored");
            return;
        }
        if body.first() != Some(&ENV_SEND) {
            self.report(TelnetError::MalformedSubnegotiation {
                option: "NEW-ENVIRON".into(),
                detail: format!("expected SEND, got {}", hex_dump(body)),
            });
            return;
        }
        let mut reply = vec![ENV_IS];
        if let Some(lu) = &self.config.lu_name {
            reply.push(ENV_VAR);
            push_environ_text(&mut reply, b"USER");
            reply.push(ENV_VALUE);
            push_environ_text(&mut reply, lu.as_bytes());
            reply.push(ENV_USERVAR);
            push_environ_text(&mut reply, b"DEVNAME");
            reply.push(ENV_VALUE);
            push_environ_text(&mut reply, lu.as_bytes());
        }
        log::debug!("SENT SB NEW-ENVIRON IS ({} bytes)", reply.len() - 1);
        self.send_subnegotiation(TelnetOption::NewEnvironment, &reply);
    }

    fn handle_tn3270e(&mut self, body: &[u8]) {
        match body {
            [TN3270E_SEND, TN3270E_DEVICE_TYPE, ..] => self.send_device_type_request(),
            [TN3270E_DEVICE_TYPE, TN3270E_IS, rest @ ..] => self.device_type_is(rest),
            [TN3270E_DEVICE_TYPE, TN3270E_REJECT, rest @ ..] => {
                let reason = match rest {
                    [TN3270E_REASON, code, ..] => *code,
                    _ => 0,
                };
                log::warn!("host rejected device type (reason {})", reason);
                self.report(TelnetError::DeviceTypeRejected { reason });
                self.backoff_tn3270e();
            }
            [TN3270E_FUNCTIONS, TN3270E_REQUEST, list @ ..] => self.functions_request(list),
            [TN3270E_FUNCTIONS, TN3270E_IS, list @ ..] => {
                let functions = functions_from_bytes(list);
                if functions.iter().all(|f| self.config.functions.contains(f)) {
                    self.finish_functions(functions);
                } else {
                    log::warn!("host forced TN3270E functions we did not offer");
                    self.backoff_tn3270e();
                }
            }
            _ => self.report(TelnetError::MalformedSubnegotiation {
                option: "TN3270E".into(),
                detail: hex_dump(body),
            }),
        }
    }

    fn send_device_type_request(&mut self) {
        let mut reply = vec![TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
        reply.extend_from_slice(self.terminal_type().as_bytes());
        if let Some(lu) = &self.config.lu_name {
            reply.push(TN3270E_CONNECT);
            reply.extend_from_slice(lu.as_bytes());
        }
        log::debug!("SENT SB TN3270E DEVICE-TYPE REQUEST {}", self.terminal_type());
        self.send_subnegotiation(TelnetOption::Tn3270e, &reply);
    }

    fn device_type_is(&mut self, rest: &[u8]) {
        let (device, lu) = match rest.iter().position(|&b| b == TN3270E_CONNECT) {
            Some(split) => (&rest[..split], Some(&rest[split + 1..])),
            None => (rest, None),
        };
        self.connected_type = Some(String::from_utf8_lossy(device).into_owned());
        self.connected_lu = lu.map(|lu| String::from_utf8_lossy(lu).into_owned());
        log::info!(
            "TN3270E device type {} LU {}",
            self.connected_type.as_deref().unwrap_or(""),
            self.connected_lu.as_deref().unwrap_or("(none)")
        );

        let mut request = vec![TN3270E_FUNCTIONS, TN3270E_REQUEST];
        request.extend(functions_to_bytes(&self.config.functions));
        self.send_subnegotiation(TelnetOption::Tn3270e, &request);
    }

    fn functions_request(&mut self, list: &[u8]) {
        let offered = functions_from_bytes(list);
        let subset = offered.len() == list.len()
            && offered.iter().all(|f| self.config.functions.contains(f));
        if subset {
            let mut reply = vec![TN3270E_FUNCTIONS, TN3270E_IS];
            reply.extend(functions_to_bytes(&offered));
            self.send_subnegotiation(TelnetOption::Tn3270e, &reply);
            self.finish_functions(offered);
        } else {
            let common: Vec<Tn3270eFunction> = offered
                .into_iter()
                .filter(|f| self.config.functions.contains(f))
                .collect();
            let mut reply = vec![TN3270E_FUNCTIONS, TN3270E_REQUEST];
            reply.extend(functions_to_bytes(&common));
            self.send_subnegotiation(TelnetOption::Tn3270e, &reply);
        }
    }

    fn finish_functions(&mut self, functions: Vec<Tn3270eFunction>) {
        log::info!(
            "TN3270E functions: {}",
            functions.iter().map(|f| f.name()).collect::<Vec<_>>().join(" ")
        );
        self.negotiated_functions = functions;
        self.functions_negotiated = true;
        self.check_in3270();
    }

    /// Give up on TN3270E and let the host fall back to classic TN3270.
    fn backoff_tn3270e(&mut self) {
        self.send_command(TelnetCommand::WONT, TelnetOption::Tn3270e as u8);
        self.local_options.remove(&(TelnetOption::Tn3270e as u8));
        self.reset_tn3270e();
        self.check_in3270();
    }

    fn report(&mut self, error: TelnetError) {
        self.events.push(TelnetEvent::Error(error));
    }

    fn send_command(&mut self, command: TelnetCommand, option: u8) {
        log::debug!("SENT {} {}", command.name(), option_name(option));
        self.events.push(TelnetEvent::Send(build_negotiation(command, option)));
    }

    fn send_subnegotiation(&mut self, option: TelnetOption, data: &[u8]) {
        self.events.push(TelnetEvent::Send(build_subnegotiation(option as u8, data)));
    }
}

/// Concatenate the `Send` events of a batch into one write.
pub fn outbound_bytes(events: &[TelnetEvent]) -> Vec<u8> {
    let mut out = Vec::new();
    for event in events {
        if let TelnetEvent::Send(bytes) = event {
            out.extend_from_slice(bytes);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DO: u8 = TelnetCommand::DO as u8;
    const WILL: u8 = TelnetCommand::WILL as u8;
    const WONT: u8 = TelnetCommand::WONT as u8;
    const DONT: u8 = TelnetCommand::DONT as u8;
    const SB: u8 = TelnetCommand::SB as u8;
    const SE: u8 = TelnetCommand::SE as u8;
    const EOR: u8 = TelnetCommand::EOR as u8;

    fn connected() -> TelnetNegotiator {
        let mut negotiator = TelnetNegotiator::new(NegotiatorConfig::default());
        negotiator.set_state(ConnectionState::ConnectedInitial);
        negotiator
    }

    #[test]
    fn test_new_environ_without_lu_sends_empty_is() {
        let mut negotiator = connected();
        let events = negotiator.process_incoming_data(&[IAC, DO, 39]);
        assert_eq!(outbound_bytes(&events), vec![IAC, WILL, 39]);

        let events = negotiator.process_incoming_data(&[IAC, SB, 39, 1, IAC, SE]);
        assert_eq!(outbound_bytes(&events), vec![IAC, SB, 39, 0, IAC, SE]);
    }

    #[test]
    fn test_new_environ_names_configured_lu() {
        let mut negotiator = TelnetNegotiator::new(NegotiatorConfig {
            lu_name: Some("LU01".to_string()),
            ..NegotiatorConfig::default()
        });
        negotiator.set_state(ConnectionState::ConnectedInitial);
        negotiator.process_incoming_data(&[IAC, DO, 39]);

        let events =
            negotiator.process_incoming_data(&[IAC, SB, 39, 1, 0, b'U', b'S', b'E', b'R', IAC, SE]);
        let mut expected = vec![IAC, SB, 39, 0, 0];
        expected.extend_from_slice(b"USER");
        expected.push(1);
        expected.extend_from_slice(b"LU01");
        expected.push(3);
        expected.extend_from_slice(b"DEVNAME");
        expected.push(1);
        expected.extend_from_slice(b"LU01");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(outbound_bytes(&events), expected);
    }

    #[test]
    fn test_new_environ_before_will_is_ignored() {
        let mut negotiator = connected();
        let events = negotiator.process_incoming_data(&[IAC, SB, 39, 1, IAC, SE]);
        assert!(outbound_bytes(&events).is_empty());
    }

    #[test]
    fn test_do_tn3270e_answers_will() {
        let mut negotiator = connected();
        let events = negotiator.process_incoming_data(&[IAC, DO, 40]);
        assert_eq!(outbound_bytes(&events), vec![IAC, WILL, 40]);
        assert_eq!(negotiator.state(), ConnectionState::ConnectedInitial3270E);
    }

    #[test]
    fn test_refused_tn3270e_answers_wont() {
        let mut negotiator = TelnetNegotiator::new(NegotiatorConfig {
            refuse_tn3270e: true,
            ..NegotiatorConfig::default()
        });
        negotiator.set_state(ConnectionState::ConnectedInitial);
        let events = negotiator.process_incoming_data(&[IAC, DO, 40]);
        assert_eq!(outbound_bytes(&events), vec![IAC, WONT, 40]);
    }

    #[test]
    fn test_unknown_options_refused() {
        let mut negotiator = connected();
        let events = negotiator.process_incoming_data(&[IAC, WILL, 31, IAC, DO, 31]);
        assert_eq!(outbound_bytes(&events), vec![IAC, DONT, 31, IAC, WONT, 31]);
    }

    #[test]
    fn test_repeated_do_is_not_answered_twice() {
        let mut negotiator = connected();
        negotiator.process_incoming_data(&[IAC, DO, 0]);
        let events = negotiator.process_incoming_data(&[IAC, DO, 0]);
        assert!(outbound_bytes(&events).is_empty());
    }

    #[test]
    fn test_classic_tn3270_state() {
        let mut negotiator = connected();
        negotiator.process_incoming_data(&[
            IAC, DO, 24, IAC, DO, 25, IAC, WILL, 25, IAC, DO, 0, IAC, WILL, 0,
        ]);
        assert_eq!(negotiator.state(), ConnectionState::Connected3270);

        let events = negotiator.process_incoming_data(&[IAC, SB, 24, 1, IAC, SE]);
        let mut expected = vec![IAC, SB, 24, 0];
        expected.extend_from_slice(b"IBM-3278-2-E");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(outbound_bytes(&events), expected);
    }

    #[test]
    fn test_record_split_across_reads() {
        let mut negotiator = connected();
        negotiator.process_incoming_data(&[
            IAC, DO, 24, IAC, DO, 25, IAC, WILL, 25, IAC, DO, 0, IAC, WILL, 0,
        ]);
        assert!(negotiator.process_incoming_data(&[0xF5, 0xC3, IAC]).is_empty());
        let events = negotiator.process_incoming_data(&[IAC, 0x40, IAC]);
        assert!(events.is_empty());
        let events = negotiator.process_incoming_data(&[EOR]);
        assert_eq!(events, vec![TelnetEvent::Record(vec![0xF5, 0xC3, 0xFF, 0x40])]);
    }

    #[test]
    fn test_tn3270e_device_type_and_functions() {
        let mut negotiator = TelnetNegotiator::new(NegotiatorConfig {
            lu_name: Some("LU01".into()),
            ..NegotiatorConfig::default()
        });
        negotiator.set_state(ConnectionState::ConnectedInitial);
        negotiator.process_incoming_data(&[IAC, DO, 40]);

        let events = negotiator.process_incoming_data(&[IAC, SB, 40, 8, 2, IAC, SE]);
        let mut expected = vec![IAC, SB, 40, 2, 7];
        expected.extend_from_slice(b"IBM-3278-2-E");
        expected.push(1);
        expected.extend_from_slice(b"LU01");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(outbound_bytes(&events), expected);

        let mut is = vec![IAC, SB, 40, 2, 4];
        is.extend_from_slice(b"IBM-3278-2-E");
        is.push(1);
        is.extend_from_slice(b"LU01");
        is.extend_from_slice(&[IAC, SE]);
        let events = negotiator.process_incoming_data(&is);
        assert_eq!(negotiator.connected_lu(), Some("LU01"));
        assert_eq!(
            outbound_bytes(&events),
            vec![IAC, SB, 40, 3, 7, 0, 1, 2, 4, IAC, SE]
        );

        let events = negotiator.process_incoming_data(&[IAC, SB, 40, 3, 4, 1, IAC, SE]);
        assert!(outbound_bytes(&events).is_empty());
        assert!(negotiator.has_function(Tn3270eFunction::DataStreamCtl));
        assert!(!negotiator.has_function(Tn3270eFunction::Responses));
        assert_eq!(negotiator.state(), ConnectionState::ConnectedInitial3270E);

        negotiator.process_incoming_data(&[0, 0, 0, 0, 1, 0xF1, 0xC3, IAC, EOR]);
        assert_eq!(negotiator.state(), ConnectionState::Connected3270E);
    }

    #[test]
    fn test_functions_request_superset_gets_counter_proposal() {
        let mut negotiator = connected();
        negotiator.process_incoming_data(&[IAC, DO, 40]);
        let events = negotiator.process_incoming_data(&[IAC, SB, 40, 3, 7, 1, 3, IAC, SE]);
        assert_eq!(outbound_bytes(&events), vec![IAC, SB, 40, 3, 7, 1, IAC, SE]);
        assert!(negotiator.functions().is_empty());

        let events = negotiator.process_incoming_data(&[IAC, SB, 40, 3, 7, 1, IAC, SE]);
        assert_eq!(outbound_bytes(&events), vec![IAC, SB, 40, 3, 4, 1, IAC, SE]);
        assert!(negotiator.has_function(Tn3270eFunction::DataStreamCtl));
    }

    #[test]
    fn test_device_type_reject_backs_off() {
        let mut negotiator = connected();
        negotiator.process_incoming_data(&[IAC, DO, 40]);
        let events = negotiator.process_incoming_data(&[IAC, SB, 40, 2, 6, 5, 3, IAC, SE]);
        assert!(events.contains(&TelnetEvent::Error(TelnetError::DeviceTypeRejected { reason: 3 })));
        assert_eq!(outbound_bytes(&events), vec![IAC, WONT, 40]);
        assert!(!negotiator.tn3270e_active());
    }

    #[test]
    fn test_nvt_text_before_3270() {
        let mut negotiator = connected();
        let events = negotiator.process_incoming_data(b"login: ");
        assert_eq!(events, vec![TelnetEvent::Nvt(b"login: ".to_vec())]);
    }

    #[test]
    fn test_dont_only_answered_when_enabled() {
        let mut negotiator = connected();
        let events = negotiator.process_incoming_data(&[IAC, DONT, 0]);
        assert!(outbound_bytes(&events).is_empty());
        negotiator.process_incoming_data(&[IAC, DO, 0]);
        let events = negotiator.process_incoming_data(&[IAC, DONT, 0]);
        assert_eq!(outbound_bytes(&events), vec![IAC, WONT, 0]);
    }
}
