//! Write Structured Field processing and Query Reply generation
//!
//! A WSF record is a sequence of structured fields, each a big-endian
//! length (covering itself), an ID and a payload. A length of zero means the
//! field runs to the end of the record. Framing faults stop the scan; faults
//! inside one field are recorded and the scan moves on to the next.

use super::codes::*;
use super::display::Display3270;
use super::protocol::{DataStreamOutcome, ProtocolProcessor3270};
use crate::error::{ProtocolError, ProtocolResult};

/// Query replies this terminal answers, in the order they are emitted.
pub const SUPPORTED_REPLIES: [u8; 8] = [
    QR_SUMMARY,
    QR_USABLE_AREA,
    QR_ALPHA_PART,
    QR_CHARSETS,
    QR_COLOR,
    QR_HIGHLIGHTING,
    QR_REPLY_MODES,
    QR_IMP_PART,
];

/// Character cell size reported in UsableArea and CharacterSets.
const CHAR_WIDTH: u8 = 9;
const CHAR_HEIGHT: u8 = 12;

/// CGCSGID of the base character set: GCSGID 697, code page 037.
const CGCSGID_037: u32 = 0x02b9_0025;
/// CGCSGID of the APL/3270 graphic escape set.
const CGCSGID_APL: u32 = 0x03c3_0136;

/// Inbound reply mode, set by Set Reply Mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyMode {
    #[default]
    Field,
    ExtendedField,
    /// Character mode, with the attribute types the host wants reported
    Character(Vec<u8>),
}

impl ReplyMode {
    pub fn code(&self) -> u8 {
        match self {
            ReplyMode::Field => SF_SRM_FIELD,
            ReplyMode::ExtendedField => SF_SRM_XFIELD,
            ReplyMode::Character(_) => SF_SRM_CHAR,
        }
    }
}

/// Parameters of the last Create Partition. Fields the host did not send
/// hold their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    pub pid: u8,
    /// Unit of measure (high nibble of byte 4)
    pub uom: u8,
    /// Addressing mode (low nibble of byte 4)
    pub am: u8,
    pub flags: u8,
    /// Presentation space height and width
    pub h: u16,
    pub w: u16,
    /// Viewport origin row and column
    pub rv: u16,
    pub cv: u16,
    /// Viewport height and width
    pub hv: u16,
    pub wv: u16,
    /// Window origin row and column
    pub rw: u16,
    pub cw: u16,
    /// Rows per scroll
    pub rs: u16,
    /// Character cell width and height
    pub pw: u16,
    pub ph: u16,
}

impl PartitionInfo {
    /// Decode a Create Partition field. `buf[0..3]` is the length and ID.
    pub fn parse(buf: &[u8], rows: u16, cols: u16) -> Self {
        let byte = |offset: usize| buf.get(offset).copied();
        let word = |offset: usize| {
            buf.get(offset..offset + 2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        };

        let units = byte(4).unwrap_or(0);
        let h = word(6).unwrap_or(rows);
        let w = word(8).unwrap_or(cols);
        let hv = word(14).unwrap_or(h);
        Self {
            pid: byte(3).unwrap_or(0),
            uom: units >> 4,
            am: units & 0x0F,
            flags: byte(5).unwrap_or(0),
            h,
            w,
            rv: word(10).unwrap_or(0),
            cv: word(12).unwrap_or(0),
            hv,
            wv: word(16).unwrap_or(w),
            rw: word(18).unwrap_or(0),
            cw: word(20).unwrap_or(0),
            rs: word(22).unwrap_or(if h > hv { 1 } else { 0 }),
            pw: word(26).unwrap_or(CHAR_WIDTH as u16),
            ph: word(28).unwrap_or(CHAR_HEIGHT as u16),
        }
    }
}

/// Result of one structured field.
enum FieldResult {
    NoOutput,
    Output(DataStreamOutcome),
}

fn reject(id: u8, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::MalformedStructuredField {
        id,
        reason: reason.into(),
    }
}

impl ProtocolProcessor3270 {
    /// Process the body of a Write Structured Field (command byte removed).
    ///
    /// Output already produced is returned even if a later field fails, with
    /// `malformed` set. If nothing was produced, the first failure is returned.
    pub fn process_structured_fields(
        &mut self,
        data: &[u8],
        display: &mut Display3270,
    ) -> ProtocolResult<DataStreamOutcome> {
        let mut outcome = DataStreamOutcome::default();
        let mut produced = false;
        let mut first_error: Option<ProtocolError> = None;
        let mut pos = 0;

        while pos < data.len() {
            let remaining = data.len() - pos;
            if remaining < 2 {
                first_error.get_or_insert(ProtocolError::StructuredFieldFraming {
                    reason: format!("{} trailing byte(s)", remaining),
                });
                break;
            }
            let mut length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
            if length == 0 {
                length = remaining;
            }
            if length < 3 || length > remaining {
                first_error.get_or_insert(ProtocolError::StructuredFieldFraming {
                    reason: format!("field length {} with {} bytes left", length, remaining),
                });
                break;
            }

            let field = &data[pos..pos + length];
            match self.process_one_field(field, display) {
                Ok(FieldResult::Output(result)) => {
                    produced = true;
                    outcome.merge(result);
                }
                Ok(FieldResult::NoOutput) => {}
                Err(err) => {
                    log::warn!("structured field rejected: {}", err);
                    first_error.get_or_insert(err);
                }
            }
            pos += length;
        }

        match first_error {
            Some(err) if !produced => Err(err),
            Some(_) => {
                outcome.malformed = true;
                Ok(outcome)
            }
            None => Ok(outcome),
        }
    }

    fn process_one_field(
        &mut self,
        buf: &[u8],
        display: &mut Display3270,
    ) -> ProtocolResult<FieldResult> {
        let id = buf[2];
        match id {
            SF_READ_PART => self.sf_read_partition(buf, display),
            SF_ERASE_RESET => sf_erase_reset(buf, display),
            SF_SET_REPLY_MODE => self.sf_set_reply_mode(buf),
            SF_CREATE_PART => {
                let info = PartitionInfo::parse(buf, display.rows() as u16, display.cols() as u16);
                log::debug!("create partition {:?}", info);
                self.partition = Some(info);
                Ok(FieldResult::NoOutput)
            }
            SF_OUTBOUND_DS => self.sf_outbound_ds(buf, display),
            _ => Err(reject(id, "unsupported structured field")),
        }
    }

    fn sf_read_partition(
        &mut self,
        buf: &[u8],
        display: &Display3270,
    ) -> ProtocolResult<FieldResult> {
        if buf.len() < 5 {
            return Err(reject(SF_READ_PART, "field too short"));
        }
        let pid = buf[3];
        let request = buf[4];
        match request {
            SF_RP_QUERY => {
                if pid != 0xFF {
                    return Err(reject(SF_READ_PART, format!("query on partition 0x{:02X}", pid)));
                }
                log::debug!("read partition query");
                Ok(query_output(build_query_reply(&SUPPORTED_REPLIES, display)))
            }
            SF_RP_QLIST => {
                if pid != 0xFF {
                    return Err(reject(SF_READ_PART, format!("query list on partition 0x{:02X}", pid)));
                }
                if buf.len() < 6 {
                    return Err(reject(SF_READ_PART, "query list without request type"));
                }
                match buf[5] {
                    SF_RPQ_LIST => {
                        let wanted: Vec<u8> = SUPPORTED_REPLIES
                            .iter()
                            .copied()
                            .filter(|code| buf[6..].contains(code))
                            .collect();
                        let codes = if wanted.is_empty() { vec![QR_NULL] } else { wanted };
                        Ok(query_output(build_query_reply(&codes, display)))
                    }
                    SF_RPQ_EQUIV | SF_RPQ_ALL => {
                        Ok(query_output(build_query_reply(&SUPPORTED_REPLIES, display)))
                    }
                    other => Err(reject(
                        SF_READ_PART,
                        format!("unknown query list request 0x{:02X}", other),
                    )),
                }
            }
            other => {
                let command = CommandCode::from_u8(other);
                let read = matches!(
                    command,
                    Some(CommandCode::ReadBuffer | CommandCode::ReadModified | CommandCode::ReadModifiedAll)
                );
                if !read {
                    return Err(reject(
                        SF_READ_PART,
                        format!("unknown read partition type 0x{:02X}", other),
                    ));
                }
                if pid != 0x00 {
                    return Err(reject(SF_READ_PART, format!("read on partition 0x{:02X}", pid)));
                }
                let response = match command {
                    Some(CommandCode::ReadBuffer) => {
                        self.create_read_buffer_response(display, AidKey::ReadPartition)
                    }
                    Some(CommandCode::ReadModifiedAll) => {
                        self.create_read_modified_response(display, AidKey::ReadPartition, true)
                    }
                    _ => self.create_read_modified_response(display, AidKey::ReadPartition, false),
                };
                Ok(query_output(response))
            }
        }
    }

    fn sf_set_reply_mode(&mut self, buf: &[u8]) -> ProtocolResult<FieldResult> {
        if buf.len() < 5 {
            return Err(reject(SF_SET_REPLY_MODE, "field too short"));
        }
        if buf[3] != 0x00 {
            return Err(reject(SF_SET_REPLY_MODE, format!("partition 0x{:02X}", buf[3])));
        }
        self.reply_mode = match buf[4] {
            SF_SRM_FIELD => ReplyMode::Field,
            SF_SRM_XFIELD => ReplyMode::ExtendedField,
            SF_SRM_CHAR => ReplyMode::Character(buf[5..].to_vec()),
            other => {
                return Err(reject(SF_SET_REPLY_MODE, format!("unknown mode 0x{:02X}", other)));
            }
        };
        log::debug!("reply mode {:?}", self.reply_mode);
        Ok(FieldResult::NoOutput)
    }

    fn sf_outbound_ds(
        &mut self,
        buf: &[u8],
        display: &mut Display3270,
    ) -> ProtocolResult<FieldResult> {
        if buf.len() < 5 {
            return Err(reject(SF_OUTBOUND_DS, "field too short"));
        }
        if buf[3] != 0x00 {
            return Err(reject(SF_OUTBOUND_DS, format!("partition 0x{:02X}", buf[3])));
        }
        let write = &buf[4..];
        let outcome = match CommandCode::from_u8(buf[4]) {
            Some(CommandCode::Write) => {
                if write.len() < 2 {
                    return Ok(FieldResult::NoOutput);
                }
                self.process_write(write, display, None)?
            }
            Some(CommandCode::EraseWrite) => self.process_write(write, display, Some(false))?,
            Some(CommandCode::EraseWriteAlternate) => {
                self.process_write(write, display, Some(true))?
            }
            Some(CommandCode::EraseAllUnprotected) => self.erase_all_unprotected(display),
            _ => {
                return Err(reject(
                    SF_OUTBOUND_DS,
                    format!("unsupported command 0x{:02X}", buf[4]),
                ));
            }
        };
        // Keyboard and alarm effects ride back to the session, but they are
        // not an inbound record.
        if outcome.restore_keyboard || outcome.alarm {
            Ok(FieldResult::Output(outcome))
        } else {
            Ok(FieldResult::NoOutput)
        }
    }
}

fn sf_erase_reset(buf: &[u8], display: &mut Display3270) -> ProtocolResult<FieldResult> {
    if buf.len() != 4 {
        return Err(reject(SF_ERASE_RESET, "length must be 4"));
    }
    match buf[3] {
        SF_ER_DEFAULT => display.erase(false),
        SF_ER_ALT => display.erase(true),
        other => return Err(reject(SF_ERASE_RESET, format!("unknown type 0x{:02X}", other))),
    }
    Ok(FieldResult::NoOutput)
}

fn query_output(response: Vec<u8>) -> FieldResult {
    FieldResult::Output(DataStreamOutcome {
        responses: vec![response],
        ..DataStreamOutcome::default()
    })
}

/// Build an inbound Query Reply record: AID 0x88 then one reply per code.
pub fn build_query_reply(codes: &[u8], display: &Display3270) -> Vec<u8> {
    let mut out = vec![AID_STRUCTURED_FIELD];
    for &code in codes {
        let body = query_reply_body(code, display);
        let length = (body.len() + 4) as u16;
        out.extend_from_slice(&length.to_be_bytes());
        out.push(SFID_QREPLY);
        out.push(code);
        out.extend_from_slice(&body);
    }
    out
}

fn push16(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u16).to_be_bytes());
}

fn query_reply_body(code: u8, display: &Display3270) -> Vec<u8> {
    let model = display.model();
    let (max_rows, max_cols) = (model.rows(), model.cols());
    let mut body = Vec::new();
    match code {
        QR_SUMMARY => {
            body.extend(SUPPORTED_REPLIES.iter().filter(|&&qr| qr != QR_SUMMARY));
        }
        QR_USABLE_AREA => {
            // 12/14-bit addressing, no special features
            body.extend_from_slice(&[0x01, 0x00]);
            push16(&mut body, max_cols);
            push16(&mut body, max_rows);
            // Millimetres, with the 3279-2 pixel ratios
            body.push(0x01);
            body.extend_from_slice(&0x000a_02e5u32.to_be_bytes());
            body.extend_from_slice(&0x0002_006fu32.to_be_bytes());
            body.extend_from_slice(&[CHAR_WIDTH, CHAR_HEIGHT]);
            push16(&mut body, max_rows * max_cols);
        }
        QR_ALPHA_PART => {
            body.push(0x00);
            push16(&mut body, max_rows * max_cols);
            body.push(0x00);
        }
        QR_CHARSETS => {
            body.extend_from_slice(&[0x82, 0x00, CHAR_WIDTH, CHAR_HEIGHT]);
            body.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            // Descriptor length: set, flags, LCID and a 4-byte CGCSGID
            body.push(0x07);
            body.extend_from_slice(&[0x00, 0x10, 0x00]);
            body.extend_from_slice(&CGCSGID_037.to_be_bytes());
            body.extend_from_slice(&[0x01, 0x00, 0xF1]);
            body.extend_from_slice(&CGCSGID_APL.to_be_bytes());
        }
        QR_COLOR => {
            body.extend_from_slice(&[0x00, 16, 0x00, COLOR_GREEN]);
            for color in 0xF1..=0xFFu8 {
                body.extend_from_slice(&[color, color]);
            }
        }
        QR_HIGHLIGHTING => {
            body.push(5);
            body.extend_from_slice(&[0x00, HIGHLIGHT_NORMAL]);
            body.extend_from_slice(&[HIGHLIGHT_BLINK, HIGHLIGHT_BLINK]);
            body.extend_from_slice(&[HIGHLIGHT_REVERSE, HIGHLIGHT_REVERSE]);
            body.extend_from_slice(&[HIGHLIGHT_UNDERSCORE, HIGHLIGHT_UNDERSCORE]);
            body.extend_from_slice(&[HIGHLIGHT_NORMAL, HIGHLIGHT_NORMAL]);
        }
        QR_REPLY_MODES => {
            body.extend_from_slice(&[SF_SRM_FIELD, SF_SRM_XFIELD, SF_SRM_CHAR]);
        }
        QR_IMP_PART => {
            body.extend_from_slice(&[0x00, 0x00, 0x0B, 0x01, 0x00]);
            push16(&mut body, 80);
            push16(&mut body, 24);
            push16(&mut body, max_cols);
            push16(&mut body, max_rows);
        }
        // QR_NULL and anything unknown carry no data
        _ => {}
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib3270::display::ScreenSize;

    fn wsf(fields: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        for body in fields {
            data.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
            data.extend_from_slice(body);
        }
        data
    }

    /// Split a query reply record into (qcode, body) pairs.
    fn replies(record: &[u8]) -> Vec<(u8, Vec<u8>)> {
        assert_eq!(record[0], AID_STRUCTURED_FIELD);
        let mut out = Vec::new();
        let mut pos = 1;
        while pos < record.len() {
            let len = u16::from_be_bytes([record[pos], record[pos + 1]]) as usize;
            assert_eq!(record[pos + 2], SFID_QREPLY);
            out.push((record[pos + 3], record[pos + 4..pos + len].to_vec()));
            pos += len;
        }
        out
    }

    #[test]
    fn test_query_returns_every_supported_reply() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = wsf(&[&[SF_READ_PART, 0xFF, SF_RP_QUERY]]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        let parsed = replies(&outcome.responses[0]);
        let codes: Vec<u8> = parsed.iter().map(|(code, _)| *code).collect();
        assert_eq!(codes, SUPPORTED_REPLIES.to_vec());
    }

    #[test]
    fn test_summary_lists_the_other_replies() {
        let display = Display3270::new();
        let parsed = replies(&build_query_reply(&SUPPORTED_REPLIES, &display));
        let summary = &parsed[0];
        assert_eq!(summary.0, QR_SUMMARY);
        let others: Vec<u8> = parsed[1..].iter().map(|(code, _)| *code).collect();
        assert_eq!(summary.1, others);
    }

    #[test]
    fn test_usable_area_reports_alternate_size() {
        let display = Display3270::with_size(ScreenSize::Model4);
        let parsed = replies(&build_query_reply(&[QR_USABLE_AREA], &display));
        let body = &parsed[0].1;
        assert_eq!(&body[2..4], &80u16.to_be_bytes());
        assert_eq!(&body[4..6], &43u16.to_be_bytes());
        assert_eq!(&body[17..19], &3440u16.to_be_bytes());
    }

    #[test]
    fn test_query_list_with_no_match_is_null_reply() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = wsf(&[&[SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, 0x99]]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        let parsed = replies(&outcome.responses[0]);
        assert_eq!(parsed, vec![(QR_NULL, vec![])]);

        let data = wsf(&[&[SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, QR_COLOR, QR_SUMMARY]]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        let codes: Vec<u8> = replies(&outcome.responses[0]).iter().map(|r| r.0).collect();
        assert_eq!(codes, vec![QR_SUMMARY, QR_COLOR]);
    }

    #[test]
    fn test_query_on_wrong_partition_is_rejected() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = wsf(&[&[SF_READ_PART, 0x00, SF_RP_QUERY]]);
        let result = processor.process_structured_fields(&data, &mut display);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedStructuredField { id: SF_READ_PART, .. })
        ));
    }

    #[test]
    fn test_bad_field_does_not_discard_earlier_output() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = wsf(&[
            &[SF_READ_PART, 0xFF, SF_RP_QUERY],
            &[SF_ERASE_RESET, 0x33],
            &[SF_SET_REPLY_MODE, 0x00, SF_SRM_XFIELD],
        ]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        assert!(outcome.malformed);
        assert_eq!(outcome.responses.len(), 1);
        // The scan continued past the bad field
        assert_eq!(processor.reply_mode(), &ReplyMode::ExtendedField);
    }

    #[test]
    fn test_framing_error_stops_scan() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let mut data = vec![0x00, 0x40, SF_SET_REPLY_MODE];
        data.extend(wsf(&[&[SF_SET_REPLY_MODE, 0x00, SF_SRM_XFIELD]]));
        let result = processor.process_structured_fields(&data, &mut display);
        assert!(matches!(result, Err(ProtocolError::StructuredFieldFraming { .. })));
        assert_eq!(processor.reply_mode(), &ReplyMode::Field);
    }

    #[test]
    fn test_zero_length_runs_to_end() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = [0x00, 0x00, SF_SET_REPLY_MODE, 0x00, SF_SRM_CHAR, XA_FOREGROUND];
        processor.process_structured_fields(&data, &mut display).unwrap();
        assert_eq!(processor.reply_mode(), &ReplyMode::Character(vec![XA_FOREGROUND]));
    }

    #[test]
    fn test_erase_reset_alternate() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::with_size(ScreenSize::Model3);
        let data = wsf(&[&[SF_ERASE_RESET, SF_ER_ALT]]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        assert!(!outcome.has_output());
        assert_eq!(display.rows(), 32);
    }

    #[test]
    fn test_create_partition_defaults() {
        let info = PartitionInfo::parse(&[0x00, 0x0A, SF_CREATE_PART, 0x00, 0x00, 0x00, 0x00, 0x30], 24, 80);
        assert_eq!(info.h, 0x30);
        assert_eq!(info.w, 80);
        assert_eq!(info.hv, 0x30);
        assert_eq!(info.wv, 80);
        assert_eq!(info.rs, 0);
        assert_eq!((info.pw, info.ph), (9, 12));

        let mut buf = vec![0x00, 0x12, SF_CREATE_PART, 0x00, 0x00, 0x00];
        buf.extend([0x00, 0x40, 0x00, 0x50, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18]);
        let info = PartitionInfo::parse(&buf, 24, 80);
        assert_eq!(info.hv, 24);
        assert_eq!(info.rs, 1);
    }

    #[test]
    fn test_outbound_3270ds_write() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = wsf(&[&[SF_OUTBOUND_DS, 0x00, SNA_CMD_ERASE_WRITE, WCC_RESTORE, 0xC1]]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        assert!(outcome.restore_keyboard);
        assert!(outcome.responses.is_empty());
        assert_eq!(display.read_char_at(0), Some(0xC1));
    }

    #[test]
    fn test_read_partition_read_modified_uses_partition_aid() {
        let mut processor = ProtocolProcessor3270::new();
        let mut display = Display3270::new();
        let data = wsf(&[&[SF_READ_PART, 0x00, SNA_CMD_READ_MODIFIED]]);
        let outcome = processor.process_structured_fields(&data, &mut display).unwrap();
        assert_eq!(outcome.responses[0][0], AID_READ_PARTITION);
    }
}
