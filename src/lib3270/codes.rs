/// TN3270 Protocol Constants and Codes
///
/// Command codes, order codes, AID values, structured-field identifiers and
/// query-reply codes for the 3270 data stream, plus the TN3270E header
/// values from RFC 2355.
///
/// # References
/// - RFC 1576: TN3270 Current Practices
/// - RFC 2355: TN3270 Enhancements
/// - IBM 3270 Data Stream Programmer's Reference (GA23-0059)

/// 3270 Command Codes (local/CCW form)
pub const CMD_WRITE: u8 = 0x01;
pub const CMD_READ_BUFFER: u8 = 0x02;
pub const CMD_NOP: u8 = 0x03;
pub const CMD_ERASE_WRITE: u8 = 0x05;
pub const CMD_READ_MODIFIED: u8 = 0x06;
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x0D;
pub const CMD_READ_MODIFIED_ALL: u8 = 0x0E;
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x0F;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0x11;

/// 3270 Command Codes (SNA form, what TN3270 hosts normally send)
pub const SNA_CMD_READ_MODIFIED_ALL: u8 = 0x6E;
pub const SNA_CMD_ERASE_ALL_UNPROTECTED: u8 = 0x6F;
pub const SNA_CMD_ERASE_WRITE_ALTERNATE: u8 = 0x7E;
pub const SNA_CMD_WRITE: u8 = 0xF1;
pub const SNA_CMD_READ_BUFFER: u8 = 0xF2;
pub const SNA_CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;
pub const SNA_CMD_ERASE_WRITE: u8 = 0xF5;
pub const SNA_CMD_READ_MODIFIED: u8 = 0xF6;

/// 3270 Order Codes
pub const ORDER_PT: u8 = 0x05;    // Program Tab
pub const ORDER_GE: u8 = 0x08;    // Graphic Escape
pub const ORDER_SBA: u8 = 0x11;   // Set Buffer Address
pub const ORDER_EUA: u8 = 0x12;   // Erase Unprotected to Address
pub const ORDER_IC: u8 = 0x13;    // Insert Cursor
pub const ORDER_SF: u8 = 0x1D;    // Start Field
pub const ORDER_SA: u8 = 0x28;    // Set Attribute
pub const ORDER_SFE: u8 = 0x29;   // Start Field Extended
pub const ORDER_YALE: u8 = 0x2B;  // Yale sub-command
pub const ORDER_MF: u8 = 0x2C;    // Modify Field
pub const ORDER_RA: u8 = 0x3C;    // Repeat to Address

/// Format control orders. These are written into the buffer, not executed.
pub const FCORDER_NULL: u8 = 0x00;
pub const FCORDER_FF: u8 = 0x0C;
pub const FCORDER_CR: u8 = 0x0D;
pub const FCORDER_NL: u8 = 0x15;
pub const FCORDER_EM: u8 = 0x19;
pub const FCORDER_DUP: u8 = 0x1C;
pub const FCORDER_FM: u8 = 0x1E;
pub const FCORDER_SUB: u8 = 0x3F;
pub const FCORDER_EO: u8 = 0xFF;

/// Write Control Character (WCC) Bits
pub const WCC_RESET: u8 = 0x40;
pub const WCC_START_PRINTER: u8 = 0x08;
pub const WCC_ALARM: u8 = 0x04;
pub const WCC_RESTORE: u8 = 0x02;
pub const WCC_RESET_MDT: u8 = 0x01;

/// AID (Attention Identifier) values
pub const AID_NO_AID: u8 = 0x60;
pub const AID_READ_PARTITION: u8 = 0x61;
pub const AID_STRUCTURED_FIELD: u8 = 0x88;
pub const AID_TRIGGER: u8 = 0x7F;
pub const AID_ENTER: u8 = 0x7D;
pub const AID_CLEAR: u8 = 0x6D;
pub const AID_SYSREQ: u8 = 0xF0;
pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_PA3: u8 = 0x6B;

/// Field Attribute Byte Bits
pub const ATTR_PROTECTED: u8 = 0x20;
pub const ATTR_NUMERIC: u8 = 0x10;
pub const ATTR_DISPLAY: u8 = 0x0C;
pub const ATTR_RESERVED: u8 = 0x02;
pub const ATTR_MDT: u8 = 0x01;

/// Display Attribute Values (bits 2-3 of field attribute)
pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_SELECTABLE: u8 = 0x04;
pub const DISPLAY_INTENSIFIED: u8 = 0x08;
pub const DISPLAY_HIDDEN: u8 = 0x0C;

/// Extended Attribute Types (SFE, SA and MF)
pub const XA_ALL: u8 = 0x00;
pub const XA_3270: u8 = 0xC0;
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_TRANSPARENCY: u8 = 0x46;

/// Color Attribute Values
pub const COLOR_DEFAULT: u8 = 0x00;
pub const COLOR_NEUTRAL_BLACK: u8 = 0xF0;
pub const COLOR_BLUE: u8 = 0xF1;
pub const COLOR_RED: u8 = 0xF2;
pub const COLOR_PINK: u8 = 0xF3;
pub const COLOR_GREEN: u8 = 0xF4;
pub const COLOR_TURQUOISE: u8 = 0xF5;
pub const COLOR_YELLOW: u8 = 0xF6;
pub const COLOR_NEUTRAL_WHITE: u8 = 0xF7;

/// Highlighting Attribute Values
pub const HIGHLIGHT_DEFAULT: u8 = 0x00;
pub const HIGHLIGHT_NORMAL: u8 = 0xF0;
pub const HIGHLIGHT_BLINK: u8 = 0xF1;
pub const HIGHLIGHT_REVERSE: u8 = 0xF2;
pub const HIGHLIGHT_UNDERSCORE: u8 = 0xF4;

/// Character set value used for Graphic Escape
pub const CS_GE: u8 = 0x01;

/// Structured field identifiers (outbound)
pub const SF_READ_PART: u8 = 0x01;
pub const SF_ERASE_RESET: u8 = 0x03;
pub const SF_SET_REPLY_MODE: u8 = 0x09;
pub const SF_CREATE_PART: u8 = 0x0C;
pub const SF_OUTBOUND_DS: u8 = 0x40;
pub const SF_TRANSFER_DATA: u8 = 0xD0;

/// Read Partition operation types
pub const SF_RP_QUERY: u8 = 0x02;
pub const SF_RP_QLIST: u8 = 0x03;
pub const SF_RPQ_LIST: u8 = 0x00;
pub const SF_RPQ_EQUIV: u8 = 0x40;
pub const SF_RPQ_ALL: u8 = 0x80;

/// Erase/Reset flags
pub const SF_ER_DEFAULT: u8 = 0x00;
pub const SF_ER_ALT: u8 = 0x80;

/// Set Reply Mode modes
pub const SF_SRM_FIELD: u8 = 0x00;
pub const SF_SRM_XFIELD: u8 = 0x01;
pub const SF_SRM_CHAR: u8 = 0x02;

/// Inbound structured field id for query replies
pub const SFID_QREPLY: u8 = 0x81;

/// Query reply codes
pub const QR_SUMMARY: u8 = 0x80;
pub const QR_USABLE_AREA: u8 = 0x81;
pub const QR_ALPHA_PART: u8 = 0x84;
pub const QR_CHARSETS: u8 = 0x85;
pub const QR_COLOR: u8 = 0x86;
pub const QR_HIGHLIGHTING: u8 = 0x87;
pub const QR_REPLY_MODES: u8 = 0x88;
pub const QR_IMP_PART: u8 = 0xA6;
pub const QR_NULL: u8 = 0xFF;

/// TN3270E data types (RFC 2355 section 8)
pub const TN3270E_DT_3270_DATA: u8 = 0x00;
pub const TN3270E_DT_SCS_DATA: u8 = 0x01;
pub const TN3270E_DT_RESPONSE: u8 = 0x02;
pub const TN3270E_DT_BIND_IMAGE: u8 = 0x03;
pub const TN3270E_DT_UNBIND: u8 = 0x04;
pub const TN3270E_DT_NVT_DATA: u8 = 0x05;
pub const TN3270E_DT_REQUEST: u8 = 0x06;
pub const TN3270E_DT_SSCP_LU_DATA: u8 = 0x07;
pub const TN3270E_DT_PRINT_EOJ: u8 = 0x08;

/// TN3270E response flags
pub const TN3270E_RSF_NO_RESPONSE: u8 = 0x00;
pub const TN3270E_RSF_ERROR_RESPONSE: u8 = 0x01;
pub const TN3270E_RSF_ALWAYS_RESPONSE: u8 = 0x02;
pub const TN3270E_RSF_POSITIVE_RESPONSE: u8 = 0x00;
pub const TN3270E_RSF_NEGATIVE_RESPONSE: u8 = 0x01;

/// TN3270E response data
pub const TN3270E_POS_DEVICE_END: u8 = 0x00;
pub const TN3270E_NEG_COMMAND_REJECT: u8 = 0x00;
pub const TN3270E_NEG_OPERATION_CHECK: u8 = 0x02;

/// Enum representation of 3270 command codes for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
    Nop,
}

impl CommandCode {
    /// Accepts both the local and the SNA encoding of each command.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_WRITE | SNA_CMD_WRITE => Some(Self::Write),
            CMD_ERASE_WRITE | SNA_CMD_ERASE_WRITE => Some(Self::EraseWrite),
            CMD_ERASE_WRITE_ALTERNATE | SNA_CMD_ERASE_WRITE_ALTERNATE => {
                Some(Self::EraseWriteAlternate)
            }
            CMD_READ_BUFFER | SNA_CMD_READ_BUFFER => Some(Self::ReadBuffer),
            CMD_READ_MODIFIED | SNA_CMD_READ_MODIFIED => Some(Self::ReadModified),
            CMD_READ_MODIFIED_ALL | SNA_CMD_READ_MODIFIED_ALL => Some(Self::ReadModifiedAll),
            CMD_ERASE_ALL_UNPROTECTED | SNA_CMD_ERASE_ALL_UNPROTECTED => {
                Some(Self::EraseAllUnprotected)
            }
            CMD_WRITE_STRUCTURED_FIELD | SNA_CMD_WRITE_STRUCTURED_FIELD => {
                Some(Self::WriteStructuredField)
            }
            CMD_NOP => Some(Self::Nop),
            _ => None,
        }
    }

    /// SNA byte value, which is what a server sends on the wire.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => SNA_CMD_WRITE,
            Self::EraseWrite => SNA_CMD_ERASE_WRITE,
            Self::EraseWriteAlternate => SNA_CMD_ERASE_WRITE_ALTERNATE,
            Self::ReadBuffer => SNA_CMD_READ_BUFFER,
            Self::ReadModified => SNA_CMD_READ_MODIFIED,
            Self::ReadModifiedAll => SNA_CMD_READ_MODIFIED_ALL,
            Self::EraseAllUnprotected => SNA_CMD_ERASE_ALL_UNPROTECTED,
            Self::WriteStructuredField => SNA_CMD_WRITE_STRUCTURED_FIELD,
            Self::Nop => CMD_NOP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Write => "Write",
            Self::EraseWrite => "EraseWrite",
            Self::EraseWriteAlternate => "EraseWriteAlternate",
            Self::ReadBuffer => "ReadBuffer",
            Self::ReadModified => "ReadModified",
            Self::ReadModifiedAll => "ReadModifiedAll",
            Self::EraseAllUnprotected => "EraseAllUnprotected",
            Self::WriteStructuredField => "WriteStructuredField",
            Self::Nop => "NoOp",
        }
    }
}

/// Enum representation of 3270 order codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartField = ORDER_SF as isize,
    StartFieldExtended = ORDER_SFE as isize,
    SetBufferAddress = ORDER_SBA as isize,
    SetAttribute = ORDER_SA as isize,
    ModifyField = ORDER_MF as isize,
    InsertCursor = ORDER_IC as isize,
    ProgramTab = ORDER_PT as isize,
    RepeatToAddress = ORDER_RA as isize,
    EraseUnprotectedToAddress = ORDER_EUA as isize,
    GraphicEscape = ORDER_GE as isize,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SF => Some(Self::StartField),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_RA => Some(Self::RepeatToAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_GE => Some(Self::GraphicEscape),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Attention identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AidKey {
    NoAid,
    Enter,
    Clear,
    PA1,
    PA2,
    PA3,
    PF1, PF2, PF3, PF4, PF5, PF6,
    PF7, PF8, PF9, PF10, PF11, PF12,
    PF13, PF14, PF15, PF16, PF17, PF18,
    PF19, PF20, PF21, PF22, PF23, PF24,
    StructuredField,
    ReadPartition,
    Trigger,
    SysReq,
}

/// Single source for AID byte and key-name lookups in both directions.
const AID_TABLE: [(AidKey, u8, &str); 34] = [
    (AidKey::NoAid, AID_NO_AID, "NoAID"),
    (AidKey::Enter, AID_ENTER, "Enter"),
    (AidKey::Clear, AID_CLEAR, "Clear"),
    (AidKey::PA1, AID_PA1, "PA1"),
    (AidKey::PA2, AID_PA2, "PA2"),
    (AidKey::PA3, AID_PA3, "PA3"),
    (AidKey::PF1, 0xF1, "PF1"),
    (AidKey::PF2, 0xF2, "PF2"),
    (AidKey::PF3, 0xF3, "PF3"),
    (AidKey::PF4, 0xF4, "PF4"),
    (AidKey::PF5, 0xF5, "PF5"),
    (AidKey::PF6, 0xF6, "PF6"),
    (AidKey::PF7, 0xF7, "PF7"),
    (AidKey::PF8, 0xF8, "PF8"),
    (AidKey::PF9, 0xF9, "PF9"),
    (AidKey::PF10, 0x7A, "PF10"),
    (AidKey::PF11, 0x7B, "PF11"),
    (AidKey::PF12, 0x7C, "PF12"),
    (AidKey::PF13, 0xC1, "PF13"),
    (AidKey::PF14, 0xC2, "PF14"),
    (AidKey::PF15, 0xC3, "PF15"),
    (AidKey::PF16, 0xC4, "PF16"),
    (AidKey::PF17, 0xC5, "PF17"),
    (AidKey::PF18, 0xC6, "PF18"),
    (AidKey::PF19, 0xC7, "PF19"),
    (AidKey::PF20, 0xC8, "PF20"),
    (AidKey::PF21, 0xC9, "PF21"),
    (AidKey::PF22, 0x4A, "PF22"),
    (AidKey::PF23, 0x4B, "PF23"),
    (AidKey::PF24, 0x4C, "PF24"),
    (AidKey::StructuredField, AID_STRUCTURED_FIELD, "StructuredField"),
    (AidKey::ReadPartition, AID_READ_PARTITION, "ReadPartition"),
    (AidKey::Trigger, AID_TRIGGER, "Trigger"),
    (AidKey::SysReq, AID_SYSREQ, "SysReq"),
];

impl AidKey {
    pub fn from_u8(value: u8) -> Option<Self> {
        AID_TABLE
            .iter()
            .find(|(_, code, _)| *code == value)
            .map(|(key, _, _)| *key)
    }

    pub fn to_u8(self) -> u8 {
        AID_TABLE
            .iter()
            .find(|(key, _, _)| *key == self)
            .map(|(_, code, _)| *code)
            .unwrap_or(AID_NO_AID)
    }

    /// Key name as exchanged with scripts ("Enter", "PF3", ...).
    pub fn name(self) -> &'static str {
        AID_TABLE
            .iter()
            .find(|(key, _, _)| *key == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("NoAID")
    }

    /// Case-insensitive lookup by key name.
    pub fn from_name(name: &str) -> Option<Self> {
        AID_TABLE
            .iter()
            .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
            .map(|(key, _, _)| *key)
    }

    /// PF key by number, 1-24.
    pub fn pf(number: u8) -> Option<Self> {
        if (1..=24).contains(&number) {
            Some(AID_TABLE[5 + number as usize].0)
        } else {
            None
        }
    }

    /// AIDs that produce a short read (AID byte only) on Read Modified.
    pub fn is_short_read(self) -> bool {
        matches!(self, Self::Clear | Self::PA1 | Self::PA2 | Self::PA3 | Self::SysReq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_accepts_both_forms() {
        assert_eq!(CommandCode::from_u8(CMD_WRITE), Some(CommandCode::Write));
        assert_eq!(CommandCode::from_u8(SNA_CMD_WRITE), Some(CommandCode::Write));
        assert_eq!(CommandCode::from_u8(0x7E), Some(CommandCode::EraseWriteAlternate));
        assert_eq!(CommandCode::from_u8(0x6F), Some(CommandCode::EraseAllUnprotected));
        assert_eq!(CommandCode::Write.to_u8(), 0xF1);
        assert_eq!(CommandCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_order_code_conversion() {
        assert_eq!(OrderCode::from_u8(ORDER_SF), Some(OrderCode::StartField));
        assert_eq!(OrderCode::StartField.to_u8(), ORDER_SF);
        assert_eq!(OrderCode::from_u8(0xC1), None);
    }

    #[test]
    fn test_aid_table_is_bidirectional() {
        for (key, code, name) in AID_TABLE.iter() {
            assert_eq!(AidKey::from_u8(*code), Some(*key));
            assert_eq!(key.to_u8(), *code);
            assert_eq!(AidKey::from_name(name), Some(*key));
        }
    }

    #[test]
    fn test_pf_lookup() {
        assert_eq!(AidKey::pf(1), Some(AidKey::PF1));
        assert_eq!(AidKey::pf(12).map(AidKey::to_u8), Some(0x7C));
        assert_eq!(AidKey::pf(24), Some(AidKey::PF24));
        assert_eq!(AidKey::pf(0), None);
        assert_eq!(AidKey::pf(25), None);
    }

    #[test]
    fn test_short_read_aids() {
        assert!(AidKey::Clear.is_short_read());
        assert!(AidKey::PA2.is_short_read());
        assert!(!AidKey::Enter.is_short_read());
        assert!(!AidKey::PF3.is_short_read());
    }
}
