//! EBCDIC code page 037 translation
//!
//! The 3270 data stream carries display text as EBCDIC. CP037 maps one to one
//! onto Latin-1, so the reverse table is derived from the forward one at
//! compile time instead of being maintained by hand.

/// CP037 code point to Unicode (all results are in the Latin-1 range).
const CP037_TO_UNICODE: [char; 256] = [
    '\x00', '\x01', '\x02', '\x03', '\u{009C}', '\t', '\u{0086}', '\x7F',
    '\u{0097}', '\u{008D}', '\u{008E}', '\x0B', '\x0C', '\r', '\x0E', '\x0F',
    '\x10', '\x11', '\x12', '\x13', '\u{009D}', '\u{0085}', '\x08', '\u{0087}',
    '\x18', '\x19', '\u{0092}', '\u{008F}', '\x1C', '\x1D', '\x1E', '\x1F',
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\n', '\x17', '\x1B',
    '\u{0088}', '\u{0089}', '\u{008A}', '\u{008B}', '\u{008C}', '\x05', '\x06', '\x07',
    '\u{0090}', '\u{0091}', '\x16', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\x04',
    '\u{0098}', '\u{0099}', '\u{009A}', '\u{009B}', '\x14', '\x15', '\u{009E}', '\x1A',
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', '\u{009F}',
];

const UNICODE_TO_CP037: [u8; 256] = build_reverse_table();

const fn build_reverse_table() -> [u8; 256] {
    let mut reverse = [0x40u8; 256];
    let mut i = 0;
    while i < 256 {
        reverse[CP037_TO_UNICODE[i] as usize] = i as u8;
        i += 1;
    }
    reverse
}

/// EBCDIC space
pub const EBCDIC_SPACE: u8 = 0x40;

/// EBCDIC null, what erased cells hold
pub const EBCDIC_NULL: u8 = 0x00;

/// Convert an EBCDIC byte to its character.
///
/// ```
/// use tn3270r::protocol_common::ebcdic::ebcdic_to_ascii;
///
/// assert_eq!(ebcdic_to_ascii(0xE3), 'T');
/// assert_eq!(ebcdic_to_ascii(0x4B), '.');
/// ```
pub fn ebcdic_to_ascii(byte: u8) -> char {
    CP037_TO_UNICODE[byte as usize]
}

/// Convert a character to EBCDIC, returning None when CP037 has no code point for it.
pub fn try_ascii_to_ebcdic(ch: char) -> Option<u8> {
    let code = ch as u32;
    if code < 256 {
        Some(UNICODE_TO_CP037[code as usize])
    } else {
        None
    }
}

/// Convert a character to EBCDIC, substituting a space for anything unmapped.
pub fn ascii_to_ebcdic(ch: char) -> u8 {
    try_ascii_to_ebcdic(ch).unwrap_or(EBCDIC_SPACE)
}

/// Character to show for a buffer byte. Nulls and control codes render as spaces.
pub fn display_char(byte: u8) -> char {
    if byte < 0x40 || byte == 0xFF {
        ' '
    } else {
        ebcdic_to_ascii(byte)
    }
}

/// ```
/// use tn3270r::protocol_common::ebcdic::ebcdic_to_ascii_string;
///
/// assert_eq!(ebcdic_to_ascii_string(&[0xC8, 0xC5, 0xD3, 0xD3, 0xD6]), "HELLO");
/// ```
pub fn ebcdic_to_ascii_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(ebcdic_to_ascii).collect()
}

pub fn ascii_to_ebcdic_vec(text: &str) -> Vec<u8> {
    text.chars().map(ascii_to_ebcdic).collect()
}
