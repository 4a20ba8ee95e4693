//! Telnet framing primitives
//!
//! Command and option codes plus the byte-level helpers both sides of a
//! TN3270 connection need: building negotiation sequences, doubling IAC in
//! payloads, and framing 3270 records with IAC EOR.

/// Telnet command codes (RFC 854, RFC 885)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetCommand {
    /// Interpret As Command - 255 (0xFF)
    IAC = 255,
    DONT = 254,
    DO = 253,
    WONT = 252,
    WILL = 251,
    /// Subnegotiation Begin - 250 (0xFA)
    SB = 250,
    GA = 249,
    EL = 248,
    EC = 247,
    AYT = 246,
    AO = 245,
    /// Interrupt Process, sent for the 3270 Attn key
    IP = 244,
    BRK = 243,
    DM = 242,
    NOP = 241,
    /// Subnegotiation End - 240 (0xF0)
    SE = 240,
    /// End of Record - 239 (0xEF), terminates each 3270 record
    EOR = 239,
}

impl TelnetCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            255 => Some(TelnetCommand::IAC),
            254 => Some(TelnetCommand::DONT),
            253 => Some(TelnetCommand::DO),
            252 => Some(TelnetCommand::WONT),
            251 => Some(TelnetCommand::WILL),
            250 => Some(TelnetCommand::SB),
            249 => Some(TelnetCommand::GA),
            248 => Some(TelnetCommand::EL),
            247 => Some(TelnetCommand::EC),
            246 => Some(TelnetCommand::AYT),
            245 => Some(TelnetCommand::AO),
            244 => Some(TelnetCommand::IP),
            243 => Some(TelnetCommand::BRK),
            242 => Some(TelnetCommand::DM),
            241 => Some(TelnetCommand::NOP),
            240 => Some(TelnetCommand::SE),
            239 => Some(TelnetCommand::EOR),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TelnetCommand::IAC => "IAC",
            TelnetCommand::DONT => "DONT",
            TelnetCommand::DO => "DO",
            TelnetCommand::WONT => "WONT",
            TelnetCommand::WILL => "WILL",
            TelnetCommand::SB => "SB",
            TelnetCommand::GA => "GA",
            TelnetCommand::EL => "EL",
            TelnetCommand::EC => "EC",
            TelnetCommand::AYT => "AYT",
            TelnetCommand::AO => "AO",
            TelnetCommand::IP => "IP",
            TelnetCommand::BRK => "BRK",
            TelnetCommand::DM => "DM",
            TelnetCommand::NOP => "NOP",
            TelnetCommand::SE => "SE",
            TelnetCommand::EOR => "EOR",
        }
    }
}

/// Telnet options used by TN3270 and TN3270E
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    Binary = 0,
    Echo = 1,
    SuppressGoAhead = 3,
    TerminalType = 24,
    EndOfRecord = 25,
    NewEnvironment = 39,
    /// RFC 2355
    Tn3270e = 40,
}

impl TelnetOption {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TelnetOption::Binary),
            1 => Some(TelnetOption::Echo),
            3 => Some(TelnetOption::SuppressGoAhead),
            24 => Some(TelnetOption::TerminalType),
            25 => Some(TelnetOption::EndOfRecord),
            39 => Some(TelnetOption::NewEnvironment),
            40 => Some(TelnetOption::Tn3270e),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TelnetOption::Binary => "BINARY",
            TelnetOption::Echo => "ECHO",
            TelnetOption::SuppressGoAhead => "SGA",
            TelnetOption::TerminalType => "TTYPE",
            TelnetOption::EndOfRecord => "EOR",
            TelnetOption::NewEnvironment => "NEW-ENVIRON",
            TelnetOption::Tn3270e => "TN3270E",
        }
    }
}

/// Printable name for an option byte, including ones we do not model.
pub fn option_name(option: u8) -> String {
    TelnetOption::from_u8(option)
        .map(|opt| opt.name().to_string())
        .unwrap_or_else(|| format!("OPT{}", option))
}

/// TERMINAL-TYPE subnegotiation verbs (RFC 1091)
pub const TTYPE_IS: u8 = 0;
pub const TTYPE_SEND: u8 = 1;

/// NEW-ENVIRON verbs and type codes (RFC 1572)
pub const ENV_IS: u8 = 0;
pub const ENV_SEND: u8 = 1;
pub const ENV_VAR: u8 = 0;
pub const ENV_VALUE: u8 = 1;
pub const ENV_ESC: u8 = 2;
pub const ENV_USERVAR: u8 = 3;

/// Append a NEW-ENVIRON name or value, escaping bytes that collide with
/// the type codes.
pub fn push_environ_text(out: &mut Vec<u8>, text: &[u8]) {
    for &byte in text {
        if matches!(byte, ENV_VAR | ENV_VALUE | ENV_ESC | ENV_USERVAR) {
            out.push(ENV_ESC);
        }
        out.push(byte);
    }
}

const IAC: u8 = TelnetCommand::IAC as u8;

/// Build a telnet negotiation sequence
///
/// # Examples
///
/// ```
/// use tn3270r::protocol_common::telnet_base::{build_negotiation, TelnetCommand};
///
/// // IAC WILL BINARY
/// let seq = build_negotiation(TelnetCommand::WILL, 0);
/// assert_eq!(seq, vec![255, 251, 0]);
/// ```
pub fn build_negotiation(command: TelnetCommand, option: u8) -> Vec<u8> {
    vec![IAC, command as u8, option]
}

/// Build `IAC SB <option> <data> IAC SE`, doubling any IAC inside `data`.
///
/// ```
/// use tn3270r::protocol_common::telnet_base::build_subnegotiation;
///
/// let seq = build_subnegotiation(24, &[0, b'X']);
/// assert_eq!(seq, vec![255, 250, 24, 0, b'X', 255, 240]);
/// ```
pub fn build_subnegotiation(option: u8, data: &[u8]) -> Vec<u8> {
    let mut result = vec![IAC, TelnetCommand::SB as u8, option];
    escape_iac_into(&mut result, data);
    result.push(IAC);
    result.push(TelnetCommand::SE as u8);
    result
}

/// Append `data` to `out` with every 0xFF doubled.
pub fn escape_iac_into(out: &mut Vec<u8>, data: &[u8]) {
    for &byte in data {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
}

pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    escape_iac_into(&mut out, data);
    out
}

/// Collapse doubled IACs. A lone trailing IAC is kept as is.
pub fn unescape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == IAC && data.get(i + 1) == Some(&IAC) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Frame a 3270 record for the wire: escaped payload then IAC EOR.
pub fn frame_record(record: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(record.len() + 4);
    escape_iac_into(&mut out, record);
    out.push(IAC);
    out.push(TelnetCommand::EOR as u8);
    out
}

/// Render bytes as a spaced hex string for trace output.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
