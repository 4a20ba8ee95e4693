//! Server-side screen mirror
//!
//! `TNServerScreen` is what a TN3270 server keeps for each client: a screen
//! laid out from template lines, encoded as an outbound Write, and updated
//! from the Read Modified responses the client sends back.
//!
//! Template lines use sigils for field attributes. Each sigil takes a cell:
//!
//! | Sigil | Field |
//! |---|---|
//! | `]` | protected |
//! | `}` | protected, intensified |
//! | `[` | unprotected |
//! | `{` | unprotected, intensified |
//! | `~` | unprotected, hidden |
//! | `^` | protected autoskip |

use std::collections::VecDeque;

use super::codes::{
    AidKey, ATTR_MDT, ATTR_NUMERIC, ATTR_PROTECTED, DISPLAY_HIDDEN, DISPLAY_INTENSIFIED,
    ORDER_IC, ORDER_RA, ORDER_SBA, ORDER_SF, SNA_CMD_ERASE_WRITE, SNA_CMD_WRITE,
};
use super::display::addressing::{decode_address, encode_address, encode_attribute};
use super::display::{Display3270, ScreenSize};
use super::field::{ExtendedAttributes, FieldAttribute, FieldInfo};
use super::tn3270e::{DataType, Tn3270eHeader};
use crate::protocol_common::ebcdic::{ascii_to_ebcdic, ebcdic_to_ascii, EBCDIC_NULL, EBCDIC_SPACE};
use crate::protocol_common::telnet_base::{frame_record, TelnetCommand};

/// WCC for an outbound screen: reset MDT, plus keyboard restore when unlocking.
const WCC_LOCKED: u8 = 0xC1;
const WCC_UNLOCKED: u8 = 0xC3;

/// Shortest blank run worth an RA order (4 bytes) instead of literals.
const RA_THRESHOLD: usize = 5;

const IAC: u8 = TelnetCommand::IAC as u8;

/// Attribute bits for a template sigil.
fn sigil_attribute(ch: char) -> Option<u8> {
    match ch {
        ']' => Some(ATTR_PROTECTED),
        '}' => Some(ATTR_PROTECTED | DISPLAY_INTENSIFIED),
        '[' => Some(0x00),
        '{' => Some(DISPLAY_INTENSIFIED),
        '~' => Some(DISPLAY_HIDDEN),
        '^' => Some(ATTR_PROTECTED | ATTR_NUMERIC),
        _ => None,
    }
}

/// Where the inbound decoder is within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InboundState {
    /// Skipping the TN3270E header; the count is bytes still to skip
    Header(usize),
    Aid,
    CursorHigh,
    CursorLow(u8),
    /// Field data, written at `InboundDecoder::address`
    Data,
    SbaHigh,
    SbaLow(u8),
}

#[derive(Debug, Clone)]
struct InboundDecoder {
    state: InboundState,
    /// Previous byte was an unpaired IAC
    iac: bool,
    /// Next byte is the option of a WILL/WONT/DO/DONT to drop
    skip_option: bool,
    in_subnegotiation: bool,
    aid: u8,
    address: usize,
}

impl InboundDecoder {
    fn new(tn3270e: bool) -> Self {
        Self {
            state: Self::initial(tn3270e),
            iac: false,
            skip_option: false,
            in_subnegotiation: false,
            aid: 0,
            address: 0,
        }
    }

    fn initial(tn3270e: bool) -> InboundState {
        if tn3270e {
            InboundState::Header(Tn3270eHeader::LEN)
        } else {
            InboundState::Aid
        }
    }
}

/// Server-side copy of one client's screen.
#[derive(Debug, Clone)]
pub struct TNServerScreen {
    display: Display3270,
    tn3270e: bool,
    decoder: InboundDecoder,
    keys: VecDeque<String>,
}

impl TNServerScreen {
    pub fn new(model: ScreenSize) -> Self {
        Self {
            display: Display3270::with_size(model),
            tn3270e: false,
            decoder: InboundDecoder::new(false),
            keys: VecDeque::new(),
        }
    }

    pub fn display(&self) -> &Display3270 {
        &self.display
    }

    pub fn is_tn3270e(&self) -> bool {
        self.tn3270e
    }

    /// Expect a TN3270E header on inbound records. Resets the decoder.
    pub fn set_tn3270e(&mut self, tn3270e: bool) {
        self.tn3270e = tn3270e;
        self.decoder = InboundDecoder::new(tn3270e);
    }

    /// Lay the screen out from template lines. Rows beyond `lines` are blank.
    pub fn format<S: AsRef<str>>(&mut self, lines: &[S]) {
        let rows = self.display.rows();
        let cols = self.display.cols();
        self.display.clear();
        for row in 0..rows {
            let line = lines.get(row).map(|l| l.as_ref()).unwrap_or("");
            let mut chars = line.chars();
            for col in 0..cols {
                let address = row * cols + col;
                match chars.next() {
                    Some(ch) => match sigil_attribute(ch) {
                        Some(bits) => self.display.set_field_attribute(
                            address,
                            FieldAttribute::new(encode_attribute(bits)),
                            ExtendedAttributes::default(),
                        ),
                        None => self.display.set_cell(address, ascii_to_ebcdic(ch)),
                    },
                    None => self.display.set_cell(address, EBCDIC_SPACE),
                }
            }
        }
        self.display.set_cursor(0);
    }

    /// Cursor to column `x` of row `y`.
    pub fn set_cursor(&mut self, x: usize, y: usize) {
        let address = self.display.address_of(x, y);
        self.display.set_cursor(address);
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        self.display.cursor_position()
    }

    /// Encode the screen as one framed outbound record.
    ///
    /// `clear` selects Erase/Write over Write. `unlock` restores the client
    /// keyboard and places the cursor.
    pub fn as_tn3270_buffer(&self, clear: bool, unlock: bool, tn3270e: bool) -> Vec<u8> {
        let size = self.display.buffer_size();
        let mut record = Vec::with_capacity(size + 16);
        if tn3270e {
            record.extend_from_slice(&Tn3270eHeader::new(DataType::Data3270).to_bytes());
        }
        record.push(if clear { SNA_CMD_ERASE_WRITE } else { SNA_CMD_WRITE });
        record.push(if unlock { WCC_UNLOCKED } else { WCC_LOCKED });
        record.push(ORDER_SBA);
        record.extend_from_slice(&encode_address(0, size));

        let cells = self.display.cells();
        let mut address = 0;
        while address < size {
            let cell = &cells[address];
            if cell.is_field_attr {
                record.push(ORDER_SF);
                record.push(encode_attribute(cell.char_data & !ATTR_MDT));
                address += 1;
                continue;
            }
            if cell.char_data == EBCDIC_SPACE {
                let run_end = cells[address..]
                    .iter()
                    .position(|c| c.is_field_attr || c.char_data != EBCDIC_SPACE)
                    .map_or(size, |offset| address + offset);
                let run = run_end - address;
                if run >= RA_THRESHOLD {
                    record.push(ORDER_RA);
                    record.extend_from_slice(&encode_address(run_end % size, size));
                    record.push(EBCDIC_SPACE);
                } else {
                    record.extend(std::iter::repeat(EBCDIC_SPACE).take(run));
                }
                address = run_end;
                continue;
            }
            record.push(cell.char_data);
            address += 1;
        }

        if unlock {
            record.push(ORDER_SBA);
            record.extend_from_slice(&encode_address(self.display.cursor_address(), size));
            record.push(ORDER_IC);
        }
        frame_record(&record)
    }

    /// Feed bytes from the client. Returns the next completed key, if any.
    ///
    /// Records may arrive split across calls; the decoder keeps its place.
    pub fn handle_tn3270_data(&mut self, data: &[u8]) -> Option<String> {
        for &byte in data {
            self.handle_byte(byte);
        }
        self.next_key()
    }

    /// Pop a key completed by an earlier call.
    pub fn next_key(&mut self) -> Option<String> {
        self.keys.pop_front()
    }

    pub fn pending_keys(&self) -> usize {
        self.keys.len()
    }

    fn handle_byte(&mut self, byte: u8) {
        if self.decoder.skip_option {
            self.decoder.skip_option = false;
            return;
        }
        if self.decoder.iac {
            self.decoder.iac = false;
            self.handle_command(byte);
            return;
        }
        if byte == IAC {
            self.decoder.iac = true;
            return;
        }
        if !self.decoder.in_subnegotiation {
            self.record_byte(byte);
        }
    }

    fn handle_command(&mut self, byte: u8) {
        match TelnetCommand::from_u8(byte) {
            Some(TelnetCommand::IAC) if !self.decoder.in_subnegotiation => self.record_byte(IAC),
            Some(TelnetCommand::EOR) => self.end_record(),
            Some(TelnetCommand::IP) => self.keys.push_back("Attn".to_string()),
            Some(TelnetCommand::AO) => self.keys.push_back("SysReq".to_string()),
            Some(
                TelnetCommand::WILL | TelnetCommand::WONT | TelnetCommand::DO | TelnetCommand::DONT,
            ) => self.decoder.skip_option = true,
            Some(TelnetCommand::SB) => self.decoder.in_subnegotiation = true,
            Some(TelnetCommand::SE) => self.decoder.in_subnegotiation = false,
            _ => log::trace!("ignoring telnet command {}", byte),
        }
    }

    fn record_byte(&mut self, byte: u8) {
        self.decoder.state = match self.decoder.state {
            InboundState::Header(remaining) if remaining > 1 => InboundState::Header(remaining - 1),
            InboundState::Header(_) => InboundState::Aid,
            InboundState::Aid => {
                self.decoder.aid = byte;
                // A new response replaces whatever the previous one modified
                self.display.reset_all_mdt();
                InboundState::CursorHigh
            }
            InboundState::CursorHigh => InboundState::CursorLow(byte),
            InboundState::CursorLow(high) => {
                let cursor = decode_address(high, byte) % self.display.buffer_size();
                self.display.set_cursor(cursor);
                self.decoder.address = 0;
                InboundState::Data
            }
            InboundState::Data if byte == ORDER_SBA => InboundState::SbaHigh,
            InboundState::Data => {
                let address = self.decoder.address;
                if !self.display.is_field_attribute(address) {
                    self.display.set_cell(address, byte);
                    self.display.set_mdt(address);
                }
                self.decoder.address = self.display.next_address(address);
                InboundState::Data
            }
            InboundState::SbaHigh => InboundState::SbaLow(byte),
            InboundState::SbaLow(high) => {
                let address = decode_address(high, byte) % self.display.buffer_size();
                self.decoder.address = address;
                // Field contents arrive with nulls stripped, so clear first
                if let Some((start, end)) = self.display.find_field_bounds(address) {
                    if start == address {
                        self.clear_field(start, end);
                    }
                }
                InboundState::Data
            }
        };
    }

    fn clear_field(&mut self, start: usize, end: usize) {
        let mut address = start;
        for _ in 0..self.display.distance(start, end) {
            self.display.set_cell(address, EBCDIC_NULL);
            address = self.display.next_address(address);
        }
    }

    fn end_record(&mut self) {
        let state = self.decoder.state;
        let aid = self.decoder.aid;
        self.decoder = InboundDecoder::new(self.tn3270e);
        if matches!(state, InboundState::Header(_) | InboundState::Aid) {
            log::debug!("empty inbound record");
            return;
        }
        let name = match AidKey::from_u8(aid) {
            Some(key) => key.name().to_string(),
            None => format!("AID 0x{:02X}", aid),
        };
        log::debug!("client key {}", name);
        self.keys.push_back(name);
    }

    /// Unprotected fields in buffer order.
    pub fn input_fields(&self) -> Vec<FieldInfo> {
        self.display
            .fields()
            .into_iter()
            .filter(|field| !field.protected)
            .collect()
    }

    /// Contents of the `index`th unprotected field, hidden ones included.
    /// Nulls are dropped and trailing blanks trimmed.
    pub fn input_text(&self, index: usize) -> Option<String> {
        let field = self.input_fields().into_iter().nth(index)?;
        let end = (field.start + field.length) % self.display.buffer_size();
        let text: String = self
            .display
            .field_data(field.start, end)
            .into_iter()
            .filter(|&byte| byte != EBCDIC_NULL)
            .map(ebcdic_to_ascii)
            .collect();
        Some(text.trim_end().to_string())
    }

    /// Prefill the `index`th unprotected field. Text past the field is dropped.
    pub fn set_input_text(&mut self, index: usize, text: &str) -> bool {
        let Some(field) = self.input_fields().into_iter().nth(index) else {
            return false;
        };
        let mut chars = text.chars();
        let mut address = field.start;
        for _ in 0..field.length {
            let byte = chars.next().map_or(EBCDIC_NULL, ascii_to_ebcdic);
            self.display.set_cell(address, byte);
            address = self.display.next_address(address);
        }
        true
    }

    /// Fields the client changed in its last response.
    pub fn modified_fields(&self) -> Vec<FieldInfo> {
        self.display
            .fields()
            .into_iter()
            .filter(|field| field.modified)
            .collect()
    }

    pub fn screen_rows(&self) -> Vec<String> {
        self.display.screen_rows()
    }
}
