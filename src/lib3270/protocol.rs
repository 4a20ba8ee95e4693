//! 3270 Data Stream Interpreter
//!
//! Takes one host record (TN3270E header already removed), dispatches on the
//! command byte, and for the Write family walks the order list mutating the
//! display. Read commands and query replies come back as inbound records in
//! the returned `DataStreamOutcome`; sending them is the session's job.

use super::codes::*;
use super::display::{addressing, Display3270};
use super::field::{ExtendedAttributes, FieldAttribute};
use super::structured_field::{PartitionInfo, ReplyMode};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol_common::ebcdic::EBCDIC_SPACE;

/// What processing a record asks of the rest of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataStreamOutcome {
    /// Inbound records to send to the host, in order
    pub responses: Vec<Vec<u8>>,
    /// WCC or EAU asked for the keyboard to be restored
    pub restore_keyboard: bool,
    /// WCC asked for the alarm
    pub alarm: bool,
    /// A structured field was rejected even though others produced output
    pub malformed: bool,
}

impl DataStreamOutcome {
    fn with_response(response: Vec<u8>) -> Self {
        Self {
            responses: vec![response],
            ..Self::default()
        }
    }

    pub(crate) fn merge(&mut self, other: DataStreamOutcome) {
        self.responses.extend(other.responses);
        self.restore_keyboard |= other.restore_keyboard;
        self.alarm |= other.alarm;
        self.malformed |= other.malformed;
    }

    pub fn has_output(&self) -> bool {
        !self.responses.is_empty()
    }
}

/// 3270 Protocol Processor
///
/// Holds the terminal-side state that outlives a single record: the last AID
/// sent, the reply mode and the partition most recently created.
#[derive(Debug, Clone)]
pub struct ProtocolProcessor3270 {
    aid: AidKey,
    pub(crate) reply_mode: ReplyMode,
    pub(crate) partition: Option<PartitionInfo>,
    sscp_mode: bool,
    last_command: Option<CommandCode>,
}

impl Default for ProtocolProcessor3270 {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolProcessor3270 {
    pub fn new() -> Self {
        Self {
            aid: AidKey::NoAid,
            reply_mode: ReplyMode::Field,
            partition: None,
            sscp_mode: false,
            last_command: None,
        }
    }

    /// AID of the last attention key, used by host-initiated reads.
    pub fn aid(&self) -> AidKey {
        self.aid
    }

    pub fn set_aid(&mut self, aid: AidKey) {
        self.aid = aid;
    }

    pub fn reply_mode(&self) -> &ReplyMode {
        &self.reply_mode
    }

    pub fn partition(&self) -> Option<&PartitionInfo> {
        self.partition.as_ref()
    }

    pub fn last_command(&self) -> Option<CommandCode> {
        self.last_command
    }

    /// SSCP-LU sessions exchange unformatted data with no AID or cursor prefix.
    pub fn set_sscp_mode(&mut self, sscp: bool) {
        self.sscp_mode = sscp;
    }

    pub fn is_sscp_mode(&self) -> bool {
        self.sscp_mode
    }

    /// Process one 3270 record.
    ///
    /// An unknown command leaves the display untouched. Errors inside the
    /// order loop leave the orders before the fault applied.
    pub fn process_data(
        &mut self,
        data: &[u8],
        display: &mut Display3270,
    ) -> ProtocolResult<DataStreamOutcome> {
        let Some(&command_byte) = data.first() else {
            return Ok(DataStreamOutcome::default());
        };
        let command = CommandCode::from_u8(command_byte).ok_or(ProtocolError::UnknownCommand {
            command: command_byte,
        })?;
        log::debug!("< {} ({} bytes)", command.name(), data.len());
        self.last_command = Some(command);

        match command {
            CommandCode::Write => self.process_write(data, display, None),
            CommandCode::EraseWrite => self.process_write(data, display, Some(false)),
            CommandCode::EraseWriteAlternate => self.process_write(data, display, Some(true)),
            CommandCode::ReadBuffer => Ok(DataStreamOutcome::with_response(
                self.create_read_buffer_response(display, self.aid),
            )),
            CommandCode::ReadModified => Ok(DataStreamOutcome::with_response(
                self.create_read_modified_response(display, self.aid, false),
            )),
            CommandCode::ReadModifiedAll => Ok(DataStreamOutcome::with_response(
                self.create_read_modified_response(display, self.aid, true),
            )),
            CommandCode::EraseAllUnprotected => Ok(self.erase_all_unprotected(display)),
            CommandCode::WriteStructuredField => {
                self.process_structured_fields(&data[1..], display)
            }
            CommandCode::Nop => Ok(DataStreamOutcome::default()),
        }
    }

    pub(crate) fn erase_all_unprotected(&mut self, display: &mut Display3270) -> DataStreamOutcome {
        display.erase_all_unprotected();
        self.aid = AidKey::NoAid;
        DataStreamOutcome {
            restore_keyboard: true,
            ..DataStreamOutcome::default()
        }
    }

    /// Write, Erase/Write and Erase/Write Alternate. `data[0]` is the
    /// command, `data[1]` the WCC. `erase` selects the geometry to erase to.
    pub(crate) fn process_write(
        &mut self,
        data: &[u8],
        display: &mut Display3270,
        erase: Option<bool>,
    ) -> ProtocolResult<DataStreamOutcome> {
        if data.len() < 2 {
            return Err(ProtocolError::Truncated { context: "WCC" });
        }
        if let Some(alternate) = erase {
            display.erase(alternate);
        }
        let wcc = data[1];
        if wcc & WCC_RESET_MDT != 0 {
            display.reset_all_mdt();
        }

        let mut orders = OrderLoop::new(&data[2..], display.cursor_address());
        orders.run(display)?;

        let mut outcome = DataStreamOutcome::default();
        if wcc & WCC_RESTORE != 0 {
            self.aid = AidKey::NoAid;
            outcome.restore_keyboard = true;
        }
        if wcc & WCC_ALARM != 0 {
            display.sound_alarm();
            outcome.alarm = true;
        }
        Ok(outcome)
    }

    /// Read Buffer: AID, cursor, then every cell.
    pub fn create_read_buffer_response(&self, display: &Display3270, aid: AidKey) -> Vec<u8> {
        let size = display.buffer_size();
        let mut response = Vec::with_capacity(size + 3);
        response.push(aid.to_u8());
        response.extend_from_slice(&addressing::encode_address(display.cursor_address(), size));

        let mut current = ExtendedAttributes::default();
        for cell in display.cells() {
            if let Some(attr) = cell.attribute() {
                self.encode_field_start(&mut response, attr, &cell.extended);
                current = ExtendedAttributes::default();
            } else {
                if let ReplyMode::Character(types) = &self.reply_mode {
                    encode_character_attributes(&mut response, types, &mut current, &cell.extended);
                }
                if cell.charset == CS_GE {
                    response.push(ORDER_GE);
                }
                response.push(cell.char_data);
            }
        }
        response
    }

    fn encode_field_start(&self, out: &mut Vec<u8>, attr: FieldAttribute, xa: &ExtendedAttributes) {
        let encoded = addressing::encode_attribute(attr.value());
        if matches!(self.reply_mode, ReplyMode::Field) {
            out.extend_from_slice(&[ORDER_SF, encoded]);
            return;
        }
        let mut pairs = vec![(XA_3270, encoded)];
        if let Some(value) = xa.highlighting {
            pairs.push((XA_HIGHLIGHTING, value));
        }
        if let Some(value) = xa.foreground_color {
            pairs.push((XA_FOREGROUND, value));
        }
        if let Some(value) = xa.charset {
            pairs.push((XA_CHARSET, value));
        }
        out.push(ORDER_SFE);
        out.push(pairs.len() as u8);
        for (attr_type, value) in pairs {
            out.extend_from_slice(&[attr_type, value]);
        }
    }

    /// Read Modified / Read Modified All.
    ///
    /// Clear, PA and SysReq produce a short read (AID only) unless `all` is
    /// set. On a formatted screen each modified field is sent as
    /// `SBA <first data address>` followed by its non-null data.
    pub fn create_read_modified_response(
        &self,
        display: &Display3270,
        aid: AidKey,
        all: bool,
    ) -> Vec<u8> {
        let size = display.buffer_size();
        let mut response = Vec::new();

        if !self.sscp_mode {
            response.push(aid.to_u8());
            if aid.is_short_read() && !all {
                return response;
            }
            response.extend_from_slice(&addressing::encode_address(display.cursor_address(), size));
        }

        let cells = display.cells();
        let Some(first_fa) = cells.iter().position(|cell| cell.is_field_attr) else {
            for cell in cells.iter().filter(|cell| cell.char_data != 0) {
                push_data_byte(&mut response, cell.charset, cell.char_data);
            }
            return response;
        };

        let mut fa = first_fa;
        loop {
            let modified = FieldAttribute::new(cells[fa].char_data).is_modified();
            let mut addr = display.next_address(fa);
            if modified {
                response.push(ORDER_SBA);
                response.extend_from_slice(&addressing::encode_address(addr, size));
            }
            while !cells[addr].is_field_attr {
                let cell = &cells[addr];
                if modified && cell.char_data != 0 {
                    push_data_byte(&mut response, cell.charset, cell.char_data);
                }
                addr = display.next_address(addr);
            }
            fa = addr;
            if fa == first_fa {
                break;
            }
        }
        response
    }
}

fn push_data_byte(out: &mut Vec<u8>, charset: u8, byte: u8) {
    if charset == CS_GE {
        out.push(ORDER_GE);
    }
    out.push(byte);
}

/// Character reply mode: emit SA orders whenever a cell's attributes for the
/// requested types differ from what was last sent.
fn encode_character_attributes(
    out: &mut Vec<u8>,
    types: &[u8],
    current: &mut ExtendedAttributes,
    cell: &ExtendedAttributes,
) {
    for &attr_type in types {
        let (now, want) = match attr_type {
            XA_HIGHLIGHTING => (current.highlighting, cell.highlighting),
            XA_FOREGROUND => (current.foreground_color, cell.foreground_color),
            XA_CHARSET => (current.charset, cell.charset),
            XA_BACKGROUND => (current.background_color, cell.background_color),
            _ => continue,
        };
        if now != want {
            out.extend_from_slice(&[ORDER_SA, attr_type, want.unwrap_or(0)]);
            current.apply(attr_type, want.unwrap_or(0));
        }
    }
}

/// Order loop state for one Write-family command.
struct OrderLoop<'a> {
    data: &'a [u8],
    pos: usize,
    buffer_address: usize,
    /// Character attributes from SA, applied to following data
    default_xa: ExtendedAttributes,
    default_charset: u8,
    /// The previous item was the command or an order rather than text
    last_was_order: bool,
    /// The previous order was a PT that wrapped to address 0
    last_zpt: bool,
}

impl<'a> OrderLoop<'a> {
    fn new(data: &'a [u8], start: usize) -> Self {
        Self {
            data,
            pos: 0,
            buffer_address: start,
            default_xa: ExtendedAttributes::default(),
            default_charset: 0,
            last_was_order: true,
            last_zpt: false,
        }
    }

    fn take(&mut self, count: usize, context: &'static str) -> ProtocolResult<&'a [u8]> {
        let end = self.pos + count;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(ProtocolError::Truncated { context })?;
        self.pos = end;
        Ok(bytes)
    }

    fn take_address(
        &mut self,
        context: &'static str,
        display: &Display3270,
    ) -> ProtocolResult<usize> {
        let bytes = self.take(2, context)?;
        let address = addressing::decode_address(bytes[0], bytes[1]);
        if address >= display.buffer_size() {
            return Err(ProtocolError::BadAddress {
                order: context,
                address,
                buffer_size: display.buffer_size(),
            });
        }
        Ok(address)
    }

    fn run(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        while self.pos < self.data.len() {
            let byte = self.data[self.pos];
            self.pos += 1;
            match OrderCode::from_u8(byte) {
                Some(order) => {
                    self.process_order(order, display)?;
                    if order != OrderCode::ProgramTab {
                        self.last_zpt = false;
                    }
                    self.last_was_order = true;
                }
                None => {
                    self.process_data_byte(byte, display);
                    self.last_was_order = false;
                    self.last_zpt = false;
                }
            }
        }
        Ok(())
    }

    fn process_data_byte(&mut self, byte: u8, display: &mut Display3270) {
        let stored = match byte {
            FCORDER_FF | FCORDER_CR | FCORDER_NL | FCORDER_EM | FCORDER_EO => EBCDIC_SPACE,
            other => other,
        };
        self.write(display, stored, self.default_charset);
    }

    fn write(&mut self, display: &mut Display3270, byte: u8, charset: u8) {
        display.write_char_at(self.buffer_address, byte, charset, self.default_xa);
        self.buffer_address = display.next_address(self.buffer_address);
    }

    fn process_order(&mut self, order: OrderCode, display: &mut Display3270) -> ProtocolResult<()> {
        match order {
            OrderCode::StartField => {
                let attr = self.take(1, "SF")?[0];
                display.set_field_attribute(
                    self.buffer_address,
                    FieldAttribute::new(attr),
                    ExtendedAttributes::default(),
                );
                self.buffer_address = display.next_address(self.buffer_address);
            }
            OrderCode::StartFieldExtended => {
                let count = self.take(1, "SFE")?[0] as usize;
                let pairs = self.take(count * 2, "SFE")?;
                let mut attr = 0u8;
                let mut xa = ExtendedAttributes::default();
                for pair in pairs.chunks_exact(2) {
                    if pair[0] == XA_3270 {
                        attr = pair[1];
                    } else if !xa.apply(pair[0], pair[1]) {
                        log::debug!("SFE: ignoring attribute type 0x{:02X}", pair[0]);
                    }
                }
                display.set_field_attribute(self.buffer_address, FieldAttribute::new(attr), xa);
                self.buffer_address = display.next_address(self.buffer_address);
            }
            OrderCode::SetBufferAddress => {
                self.buffer_address = self.take_address("SBA", display)?;
            }
            OrderCode::SetAttribute => {
                let pair = self.take(2, "SA")?;
                match pair[0] {
                    XA_ALL => {
                        self.default_xa = ExtendedAttributes::default();
                        self.default_charset = 0;
                    }
                    XA_CHARSET => {
                        self.default_xa.apply(XA_CHARSET, pair[1]);
                        self.default_charset = if pair[1] == 0xF1 { CS_GE } else { 0 };
                    }
                    attr_type => {
                        if !self.default_xa.apply(attr_type, pair[1]) {
                            log::debug!("SA: ignoring attribute type 0x{:02X}", attr_type);
                        }
                    }
                }
            }
            OrderCode::ModifyField => {
                let count = self.take(1, "MF")?[0] as usize;
                let pairs = self.take(count * 2, "MF")?;
                if display.is_field_attribute(self.buffer_address) {
                    for pair in pairs.chunks_exact(2) {
                        if pair[0] == XA_3270 {
                            display.update_field_attribute(
                                self.buffer_address,
                                FieldAttribute::new(pair[1]),
                            );
                        } else if let Some(xa) = display.field_extended_mut(self.buffer_address) {
                            xa.apply(pair[0], pair[1]);
                        }
                    }
                }
                self.buffer_address = display.next_address(self.buffer_address);
            }
            OrderCode::InsertCursor => {
                display.set_cursor(self.buffer_address);
            }
            OrderCode::ProgramTab => self.program_tab(display),
            OrderCode::RepeatToAddress => {
                let target = self.take_address("RA", display)?;
                let mut fill = self.take(1, "RA")?[0];
                let mut charset = self.default_charset;
                if fill == ORDER_GE {
                    fill = self.take(1, "RA")?[0];
                    charset = CS_GE;
                }
                self.buffer_address = display.repeat_to_address(
                    self.buffer_address,
                    target,
                    fill,
                    charset,
                    self.default_xa,
                );
            }
            OrderCode::EraseUnprotectedToAddress => {
                let target = self.take_address("EUA", display)?;
                self.buffer_address = display.erase_unprotected_to_address(self.buffer_address, target);
            }
            OrderCode::GraphicEscape => {
                let byte = self.take(1, "GE")?[0];
                self.write(display, byte, CS_GE);
            }
        }
        Ok(())
    }

    /// Program Tab. On an unprotected attribute it just steps over it;
    /// otherwise it moves to the next unprotected field, nulling the rest of
    /// the current field when it follows text.
    fn program_tab(&mut self, display: &mut Display3270) {
        let here = self.buffer_address;
        if display.is_field_attribute(here) && !display.is_protected_at(here) {
            self.buffer_address = display.next_address(here);
            self.last_zpt = false;
            return;
        }
        let mut target = display.next_unprotected(here);
        if target < here {
            target = 0;
        }
        if !self.last_was_order || self.last_zpt {
            let mut addr = here;
            loop {
                if display.is_field_attribute(addr) {
                    break;
                }
                display.set_cell(addr, 0);
                addr = display.next_address(addr);
                if addr == target {
                    break;
                }
            }
        }
        self.last_zpt = target == 0;
        self.buffer_address = target;
    }
}

#[cfg(test)]
mod tests {
    use super::addressing::encode_12bit_address;
    use super::*;

    fn sba(address: usize) -> Vec<u8> {
        let [b1, b2] = encode_12bit_address(address);
        vec![ORDER_SBA, b1, b2]
    }

    #[test]
    fn test_unknown_command_leaves_buffer() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        display.set_cell(7, 0xC1);
        let result = processor.process_data(&[0x42, 0xC3, 0xC1], &mut display);
        assert_eq!(result, Err(ProtocolError::UnknownCommand { command: 0x42 }));
        assert_eq!(display.read_char_at(7), Some(0xC1));
    }

    #[test]
    fn test_write_starts_at_cursor() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        display.set_cursor(100);
        processor
            .process_data(&[SNA_CMD_WRITE, 0x00, 0xC1, 0xC2], &mut display)
            .unwrap();
        assert_eq!(display.read_char_at(100), Some(0xC1));
        assert_eq!(display.read_char_at(101), Some(0xC2));
        assert_eq!(display.cursor_address(), 100);
    }

    #[test]
    fn test_wcc_restore_and_alarm() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let outcome = processor
            .process_data(&[SNA_CMD_WRITE, WCC_RESTORE | WCC_ALARM], &mut display)
            .unwrap();
        assert!(outcome.restore_keyboard);
        assert!(outcome.alarm);
        assert!(display.take_alarm());
    }

    #[test]
    fn test_sba_out_of_range_is_bad_address() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let mut data = vec![SNA_CMD_ERASE_WRITE, 0xC3, 0xC1];
        data.extend(sba(1920));
        data.push(0xC2);
        let result = processor.process_data(&data, &mut display);
        assert!(matches!(result, Err(ProtocolError::BadAddress { order: "SBA", .. })));
        // Data before the fault stays applied
        assert_eq!(display.read_char_at(0), Some(0xC1));
    }

    #[test]
    fn test_truncated_order() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let result = processor.process_data(&[SNA_CMD_WRITE, 0x00, ORDER_SBA, 0x40], &mut display);
        assert_eq!(result, Err(ProtocolError::Truncated { context: "SBA" }));
    }

    #[test]
    fn test_start_field_extended() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = [
            SNA_CMD_ERASE_WRITE, 0xC3,
            ORDER_SFE, 2, XA_3270, 0x60, XA_FOREGROUND, COLOR_RED,
            0xC1,
        ];
        processor.process_data(&data, &mut display).unwrap();
        let cell = display.get_cell(0).unwrap();
        assert!(cell.is_field_attr);
        assert_eq!(cell.extended.foreground_color, Some(COLOR_RED));
        assert!(display.is_protected_at(1));
        assert_eq!(display.read_char_at(1), Some(0xC1));
    }

    #[test]
    fn test_modify_field_only_on_attribute() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        processor
            .process_data(&[SNA_CMD_ERASE_WRITE, 0xC3, ORDER_SF, 0x40], &mut display)
            .unwrap();
        let mut data = vec![SNA_CMD_WRITE, 0x00];
        data.extend(sba(0));
        data.extend([ORDER_MF, 1, XA_3270, 0x60, 0xC1]);
        processor.process_data(&data, &mut display).unwrap();
        assert!(display.is_protected_at(0));
        // MF advanced past the attribute before the data byte
        assert_eq!(display.read_char_at(1), Some(0xC1));
    }

    #[test]
    fn test_graphic_escape_marks_charset() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        processor
            .process_data(&[SNA_CMD_ERASE_WRITE, 0xC3, ORDER_GE, 0xAD], &mut display)
            .unwrap();
        let cell = display.get_cell(0).unwrap();
        assert_eq!(cell.charset, CS_GE);
        assert_eq!(cell.char_data, 0xAD);
    }

    #[test]
    fn test_format_controls_become_spaces() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        processor
            .process_data(
                &[SNA_CMD_ERASE_WRITE, 0xC3, FCORDER_NL, FCORDER_DUP, FCORDER_NULL],
                &mut display,
            )
            .unwrap();
        assert_eq!(display.read_char_at(0), Some(EBCDIC_SPACE));
        assert_eq!(display.read_char_at(1), Some(FCORDER_DUP));
        assert_eq!(display.read_char_at(2), Some(0x00));
    }

    #[test]
    fn test_program_tab_after_text_nulls_field_rest() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let mut data = vec![SNA_CMD_ERASE_WRITE, 0xC3, ORDER_SF, 0x40];
        data.extend([0xC1; 8]);
        data.extend([ORDER_SF, 0x60, ORDER_SF, 0x40]);
        data.extend(sba(1));
        data.extend([0xC2, ORDER_PT, 0xC3]);
        processor.process_data(&data, &mut display).unwrap();

        assert_eq!(display.read_char_at(1), Some(0xC2));
        assert_eq!(display.read_char_at(2), Some(0x00));
        assert_eq!(display.read_char_at(8), Some(0x00));
        // PT landed in the second unprotected field
        assert_eq!(display.read_char_at(11), Some(0xC3));
    }

    #[test]
    fn test_read_buffer_response() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        processor
            .process_data(&[SNA_CMD_ERASE_WRITE, 0xC3, ORDER_SF, 0x20, 0xC1], &mut display)
            .unwrap();
        let outcome = processor
            .process_data(&[SNA_CMD_READ_BUFFER], &mut display)
            .unwrap();
        let response = &outcome.responses[0];
        assert_eq!(response[0], AID_NO_AID);
        assert_eq!(&response[1..3], &[0x40, 0x40]);
        assert_eq!(&response[3..6], &[ORDER_SF, 0x60, 0xC1]);
        // SF takes two bytes for its one cell
        assert_eq!(response.len(), 3 + 1920 + 1);
    }

    #[test]
    fn test_short_read_for_clear() {
        let processor = ProtocolProcessor3270::new();
        let display = Display3270::new();
        let response = processor.create_read_modified_response(&display, AidKey::Clear, false);
        assert_eq!(response, vec![AID_CLEAR]);
        let response = processor.create_read_modified_response(&display, AidKey::Clear, true);
        assert_eq!(response, vec![AID_CLEAR, 0x40, 0x40]);
    }

    #[test]
    fn test_read_modified_unformatted() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        processor
            .process_data(&[SNA_CMD_ERASE_WRITE, 0xC3, 0xC1, 0x00, 0xC2], &mut display)
            .unwrap();
        let response = processor.create_read_modified_response(&display, AidKey::Enter, false);
        assert_eq!(response, vec![AID_ENTER, 0x40, 0x40, 0xC1, 0xC2]);
    }

    #[test]
    fn test_sscp_mode_has_no_prefix() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        display.set_cell(0, 0xC1);
        processor.set_sscp_mode(true);
        let response = processor.create_read_modified_response(&display, AidKey::Enter, false);
        assert_eq!(response, vec![0xC1]);
    }

    #[test]
    fn test_eau_command_restores_keyboard() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        processor.set_aid(AidKey::Enter);
        let outcome = processor
            .process_data(&[SNA_CMD_ERASE_ALL_UNPROTECTED], &mut display)
            .unwrap();
        assert!(outcome.restore_keyboard);
        assert_eq!(processor.aid(), AidKey::NoAid);
    }

    #[test]
    fn test_erase_write_alternate_switches_geometry() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::with_size(crate::lib3270::display::ScreenSize::Model5);
        processor
            .process_data(&[SNA_CMD_ERASE_WRITE_ALTERNATE, 0xC3], &mut display)
            .unwrap();
        assert_eq!(display.cols(), 132);
        processor
            .process_data(&[SNA_CMD_ERASE_WRITE, 0xC3], &mut display)
            .unwrap();
        assert_eq!(display.cols(), 80);
    }
}
