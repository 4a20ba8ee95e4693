//! TN3270 Display Buffer Management
//!
//! The presentation space: a flat buffer of cells addressed 0..rows*cols,
//! the cursor, and the field scanning that everything above it relies on.
//! Fields are found by scanning for attribute cells; nothing else tracks them.

use super::codes::{ATTR_MDT, CS_GE};
use super::field::{ExtendedAttributes, FieldAttribute, FieldInfo};
use crate::protocol_common::ebcdic::{display_char, EBCDIC_NULL};

use serde::{Deserialize, Serialize};

/// Standard 3270 screen sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenSize {
    /// Model 2: 24 rows x 80 columns (1920 characters)
    #[default]
    Model2,
    /// Model 3: 32 rows x 80 columns (2560 characters)
    Model3,
    /// Model 4: 43 rows x 80 columns (3440 characters)
    Model4,
    /// Model 5: 27 rows x 132 columns (3564 characters)
    Model5,
}

impl ScreenSize {
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 | Self::Model3 | Self::Model4 => 80,
            Self::Model5 => 132,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn model_number(&self) -> u8 {
        match self {
            Self::Model2 => 2,
            Self::Model3 => 3,
            Self::Model4 => 4,
            Self::Model5 => 5,
        }
    }

    pub fn from_model_number(model: u8) -> Option<Self> {
        match model {
            2 => Some(Self::Model2),
            3 => Some(Self::Model3),
            4 => Some(Self::Model4),
            5 => Some(Self::Model5),
            _ => None,
        }
    }

    /// Terminal type announced over TTYPE, e.g. `IBM-3278-2-E`.
    pub fn terminal_type(&self, extended: bool) -> String {
        let suffix = if extended { "-E" } else { "" };
        format!("IBM-3278-{}{}", self.model_number(), suffix)
    }
}

/// Cursor movement requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    /// Go exactly to (x, y)
    Exact,
    /// Next unprotected field
    Tab,
    /// Previous unprotected field
    BackTab,
    /// (x, y) if it is inside an unprotected field, otherwise the next one
    NearestUnprotectedField,
}

/// Cell in the display buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayCell {
    /// EBCDIC data byte, or the attribute byte when `is_field_attr` is set
    pub char_data: u8,
    pub is_field_attr: bool,
    /// Character set; `CS_GE` marks graphic-escape characters
    pub charset: u8,
    /// Extended attributes (for attribute cells these apply to the whole field)
    pub extended: ExtendedAttributes,
}

impl DisplayCell {
    pub fn attribute(&self) -> Option<FieldAttribute> {
        if self.is_field_attr {
            Some(FieldAttribute::new(self.char_data))
        } else {
            None
        }
    }
}

/// 3270 Display Buffer
///
/// Holds the default (24x80) and alternate (model) geometry. Erase/Write
/// selects the default size, Erase/Write Alternate the alternate one.
#[derive(Debug, Clone)]
pub struct Display3270 {
    model: ScreenSize,
    rows: usize,
    cols: usize,
    alternate: bool,
    buffer: Vec<DisplayCell>,
    cursor_address: usize,
    alarm: bool,
}

impl Default for Display3270 {
    fn default() -> Self {
        Self::new()
    }
}

impl Display3270 {
    /// Create a Model 2 (24x80) display
    pub fn new() -> Self {
        Self::with_size(ScreenSize::Model2)
    }

    /// Create a display whose alternate size is `model`. The display starts
    /// out in the default 24x80 size, as a terminal does at power-on.
    pub fn with_size(model: ScreenSize) -> Self {
        let default = ScreenSize::Model2;
        Self {
            model,
            rows: default.rows(),
            cols: default.cols(),
            alternate: false,
            buffer: vec![DisplayCell::default(); default.buffer_size()],
            cursor_address: 0,
            alarm: false,
        }
    }

    pub fn model(&self) -> ScreenSize {
        self.model
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_alternate(&self) -> bool {
        self.alternate
    }

    /// Switch between default and alternate geometry, reallocating the
    /// buffer when the dimensions change. Always leaves a cleared screen.
    pub fn set_alternate(&mut self, alternate: bool) {
        let (rows, cols) = if alternate {
            (self.model.rows(), self.model.cols())
        } else {
            (ScreenSize::Model2.rows(), ScreenSize::Model2.cols())
        };
        self.alternate = alternate;
        if rows != self.rows || cols != self.cols {
            log::debug!("screen geometry {}x{} -> {}x{}", self.rows, self.cols, rows, cols);
            self.rows = rows;
            self.cols = cols;
            self.buffer = vec![DisplayCell::default(); rows * cols];
        }
        self.clear();
    }

    /// Erase the whole buffer to nulls and home the cursor.
    pub fn clear(&mut self) {
        self.buffer.fill(DisplayCell::default());
        self.cursor_address = 0;
    }

    /// Erase for EW/EWA: select the geometry then clear.
    pub fn erase(&mut self, alternate: bool) {
        self.set_alternate(alternate);
    }

    pub fn cursor_address(&self) -> usize {
        self.cursor_address
    }

    pub fn set_cursor(&mut self, address: usize) {
        self.cursor_address = address % self.buffer.len();
    }

    /// Cursor as (x, y) = (column, row)
    pub fn cursor_position(&self) -> (usize, usize) {
        (self.cursor_address % self.cols, self.cursor_address / self.cols)
    }

    pub fn address_of(&self, x: usize, y: usize) -> usize {
        (y * self.cols + x) % self.buffer.len()
    }

    /// Address one past `address`, wrapping at the buffer end.
    pub fn next_address(&self, address: usize) -> usize {
        (address + 1) % self.buffer.len()
    }

    /// Address one before `address`, wrapping at the buffer start.
    pub fn previous_address(&self, address: usize) -> usize {
        if address == 0 {
            self.buffer.len() - 1
        } else {
            address - 1
        }
    }

    pub fn get_cell(&self, address: usize) -> Option<&DisplayCell> {
        self.buffer.get(address)
    }

    pub fn cells(&self) -> &[DisplayCell] {
        &self.buffer
    }

    /// Write a data byte with default attributes, removing any attribute there.
    pub fn set_cell(&mut self, address: usize, byte: u8) {
        self.write_char_at(address, byte, 0, ExtendedAttributes::default());
    }

    pub fn write_char_at(
        &mut self,
        address: usize,
        byte: u8,
        charset: u8,
        extended: ExtendedAttributes,
    ) {
        if let Some(cell) = self.buffer.get_mut(address) {
            *cell = DisplayCell {
                char_data: byte,
                is_field_attr: false,
                charset,
                extended,
            };
        }
    }

    pub fn read_char_at(&self, address: usize) -> Option<u8> {
        self.buffer
            .get(address)
            .filter(|cell| !cell.is_field_attr)
            .map(|cell| cell.char_data)
    }

    /// Place a field attribute at `address`.
    pub fn set_field_attribute(
        &mut self,
        address: usize,
        attr: FieldAttribute,
        extended: ExtendedAttributes,
    ) {
        if let Some(cell) = self.buffer.get_mut(address) {
            *cell = DisplayCell {
                char_data: attr.value(),
                is_field_attr: true,
                charset: 0,
                extended,
            };
        }
    }

    /// Replace the attribute byte of an existing attribute cell.
    pub fn update_field_attribute(&mut self, address: usize, attr: FieldAttribute) {
        if let Some(cell) = self.buffer.get_mut(address) {
            if cell.is_field_attr {
                cell.char_data = attr.value();
            }
        }
    }

    /// Mutable access to an attribute cell's extended attributes.
    pub fn field_extended_mut(&mut self, address: usize) -> Option<&mut ExtendedAttributes> {
        self.buffer
            .get_mut(address)
            .filter(|cell| cell.is_field_attr)
            .map(|cell| &mut cell.extended)
    }

    pub fn is_field_attribute(&self, address: usize) -> bool {
        self.buffer.get(address).map_or(false, |cell| cell.is_field_attr)
    }

    /// A screen is formatted when it holds at least one field attribute.
    pub fn is_formatted(&self) -> bool {
        self.buffer.iter().any(|cell| cell.is_field_attr)
    }

    /// Address of the attribute that governs `address`, scanning backward
    /// with wrap. An attribute cell governs itself.
    pub fn field_attribute_address(&self, address: usize) -> Option<usize> {
        let len = self.buffer.len();
        let mut addr = address % len;
        for _ in 0..len {
            if self.buffer[addr].is_field_attr {
                return Some(addr);
            }
            addr = self.previous_address(addr);
        }
        None
    }

    pub fn field_attribute(&self, address: usize) -> Option<FieldAttribute> {
        self.field_attribute_address(address)
            .and_then(|fa| self.buffer[fa].attribute())
    }

    /// Next attribute strictly after `address`, with wrap.
    pub fn next_field_attribute_address(&self, address: usize) -> Option<usize> {
        let len = self.buffer.len();
        let mut addr = self.next_address(address);
        for _ in 0..len {
            if self.buffer[addr].is_field_attr {
                return Some(addr);
            }
            addr = self.next_address(addr);
        }
        None
    }

    /// Data extent of the field containing `position`: `(start, end)` where
    /// `start` is the cell after the attribute and `end` is the next
    /// attribute address (exclusive). The extent may wrap past the buffer end
    /// and is empty when `start == end`. None on an unformatted screen.
    pub fn find_field_bounds(&self, position: usize) -> Option<(usize, usize)> {
        let fa = self.field_attribute_address(position)?;
        let end = self.next_field_attribute_address(fa).unwrap_or(fa);
        Some((self.next_address(fa), end))
    }

    /// Number of cells from `start` up to `end` going forward with wrap.
    pub fn distance(&self, start: usize, end: usize) -> usize {
        let len = self.buffer.len();
        (end + len - start) % len
    }

    pub fn is_protected_at(&self, address: usize) -> bool {
        self.field_attribute(address)
            .map_or(false, |attr| attr.is_protected())
    }

    /// Null every cell in [start, end), removing attributes in the range.
    pub fn erase_range(&mut self, start: usize, end: usize) {
        let mut addr = start % self.buffer.len();
        let count = self.distance(addr, end % self.buffer.len());
        for _ in 0..count {
            self.buffer[addr] = DisplayCell::default();
            addr = self.next_address(addr);
        }
    }

    /// Set the MDT of the field containing `address`.
    pub fn set_mdt(&mut self, address: usize) {
        if let Some(fa) = self.field_attribute_address(address) {
            self.buffer[fa].char_data |= ATTR_MDT;
        }
    }

    /// Clear every MDT on the screen.
    pub fn reset_all_mdt(&mut self) {
        for cell in self.buffer.iter_mut().filter(|cell| cell.is_field_attr) {
            cell.char_data &= !ATTR_MDT;
        }
    }

    /// First data address of the next unprotected field after `from`.
    /// Fields with no data cells are skipped. Returns 0 if there is none.
    pub fn next_unprotected(&self, from: usize) -> usize {
        let len = self.buffer.len();
        let mut addr = from % len;
        for _ in 0..len {
            let next = self.next_address(addr);
            if self.opens_unprotected_field(addr, next) {
                return next;
            }
            addr = next;
        }
        0
    }

    /// Start of the unprotected field before the cursor position `from`.
    pub fn previous_unprotected(&self, from: usize) -> usize {
        if !self.is_formatted() {
            return 0;
        }
        let mut addr = self.previous_address(from % self.buffer.len());
        if self.buffer[addr].is_field_attr {
            addr = self.previous_address(addr);
        }
        let start = addr;
        loop {
            let next = self.next_address(addr);
            if self.opens_unprotected_field(addr, next) {
                return next;
            }
            addr = self.previous_address(addr);
            if addr == start {
                return 0;
            }
        }
    }

    fn opens_unprotected_field(&self, fa: usize, next: usize) -> bool {
        let cell = &self.buffer[fa];
        cell.is_field_attr
            && !FieldAttribute::new(cell.char_data).is_protected()
            && !self.buffer[next].is_field_attr
    }

    /// Move the cursor. `x` is the column, `y` the row; Tab and BackTab
    /// ignore them and move relative to the current cursor.
    pub fn cursor_move(&mut self, op: CursorOp, x: usize, y: usize) {
        let target = match op {
            CursorOp::Exact => self.address_of(x, y),
            CursorOp::Tab => self.next_unprotected(self.cursor_address),
            CursorOp::BackTab => self.previous_unprotected(self.cursor_address),
            CursorOp::NearestUnprotectedField => {
                let addr = self.address_of(x, y);
                let inside = !self.buffer[addr].is_field_attr
                    && self
                        .field_attribute(addr)
                        .map_or(false, |attr| !attr.is_protected());
                if inside {
                    addr
                } else {
                    self.next_unprotected(addr)
                }
            }
        };
        self.set_cursor(target);
    }

    /// Repeat-to-Address fill. Writes from `from` up to but excluding `to`,
    /// wrapping; `from == to` fills the whole buffer. Returns the address
    /// where the fill stopped (always `to`).
    pub fn repeat_to_address(
        &mut self,
        from: usize,
        to: usize,
        byte: u8,
        charset: u8,
        extended: ExtendedAttributes,
    ) -> usize {
        let mut addr = from % self.buffer.len();
        loop {
            self.write_char_at(addr, byte, charset, extended);
            addr = self.next_address(addr);
            if addr == to {
                break;
            }
        }
        addr
    }

    /// Erase-Unprotected-to-Address. Same range rule as `repeat_to_address`;
    /// only data cells in unprotected fields (or on an unformatted screen)
    /// are nulled.
    pub fn erase_unprotected_to_address(&mut self, from: usize, to: usize) -> usize {
        let mut addr = from % self.buffer.len();
        let mut protected = self.is_protected_at(addr);
        loop {
            let cell = self.buffer[addr];
            if cell.is_field_attr {
                protected = FieldAttribute::new(cell.char_data).is_protected();
            } else if !protected {
                self.buffer[addr] = DisplayCell::default();
            }
            addr = self.next_address(addr);
            if addr == to {
                break;
            }
        }
        addr
    }

    /// Erase All Unprotected: null the data of every unprotected field,
    /// clear their MDTs and put the cursor in the first of them (or at 0).
    /// An unformatted screen is simply cleared.
    pub fn erase_all_unprotected(&mut self) {
        let Some(first_fa) = self.buffer.iter().position(|cell| cell.is_field_attr) else {
            self.clear();
            return;
        };
        let mut cursor: Option<usize> = None;
        let mut fa = first_fa;
        loop {
            let attr = FieldAttribute::new(self.buffer[fa].char_data);
            let mut addr = self.next_address(fa);
            if !attr.is_protected() {
                self.buffer[fa].char_data &= !ATTR_MDT;
                if cursor.is_none() {
                    cursor = Some(addr);
                }
                while !self.buffer[addr].is_field_attr {
                    self.buffer[addr] = DisplayCell::default();
                    addr = self.next_address(addr);
                }
            } else {
                while !self.buffer[addr].is_field_attr {
                    addr = self.next_address(addr);
                }
            }
            fa = addr;
            if fa == first_fa {
                break;
            }
        }
        self.set_cursor(cursor.unwrap_or(0));
    }

    pub fn sound_alarm(&mut self) {
        self.alarm = true;
    }

    /// Returns and clears the pending alarm.
    pub fn take_alarm(&mut self) -> bool {
        std::mem::take(&mut self.alarm)
    }

    /// Character shown at `address`, honoring non-display fields.
    fn visible_char(&self, address: usize, hidden: bool) -> char {
        let cell = &self.buffer[address];
        if cell.is_field_attr || hidden || cell.charset == CS_GE {
            ' '
        } else {
            display_char(cell.char_data)
        }
    }

    /// Screen contents as text, one entry per row.
    pub fn screen_rows(&self) -> Vec<String> {
        let mut hidden = self
            .field_attribute(self.buffer.len() - 1)
            .map_or(false, |attr| attr.is_zero());
        let mut rows = Vec::with_capacity(self.rows);
        let mut line = String::with_capacity(self.cols);
        for addr in 0..self.buffer.len() {
            if let Some(attr) = self.buffer[addr].attribute() {
                hidden = attr.is_zero();
            }
            line.push(self.visible_char(addr, hidden));
            if (addr + 1) % self.cols == 0 {
                rows.push(std::mem::take(&mut line));
            }
        }
        rows
    }

    pub fn get_row(&self, row: usize) -> Option<String> {
        self.screen_rows().into_iter().nth(row)
    }

    /// `length` characters of text starting at column `x`, row `y`,
    /// continuing onto following rows.
    pub fn text_at(&self, x: usize, y: usize, length: usize) -> String {
        let start = self.address_of(x, y);
        let mut hidden = self
            .field_attribute(start)
            .map_or(false, |attr| attr.is_zero());
        let mut text = String::with_capacity(length);
        let mut addr = start;
        for _ in 0..length {
            if let Some(attr) = self.buffer[addr].attribute() {
                hidden = attr.is_zero();
            }
            text.push(self.visible_char(addr, hidden));
            addr = self.next_address(addr);
        }
        text
    }

    /// All fields in buffer order.
    pub fn fields(&self) -> Vec<FieldInfo> {
        let mut fields = Vec::new();
        for (fa, cell) in self.buffer.iter().enumerate() {
            let Some(attr) = cell.attribute() else {
                continue;
            };
            let (start, end) = self
                .find_field_bounds(fa)
                .unwrap_or((self.next_address(fa), fa));
            let length = self.distance(start, end);
            let mut text = String::with_capacity(length);
            let mut addr = start;
            for _ in 0..length {
                text.push(self.visible_char(addr, attr.is_zero()));
                addr = self.next_address(addr);
            }
            fields.push(FieldInfo {
                attribute_address: fa,
                start,
                length,
                attribute: attr,
                protected: attr.is_protected(),
                numeric: attr.is_numeric(),
                hidden: attr.is_zero(),
                intensified: attr.is_high(),
                modified: attr.is_modified(),
                text,
            });
        }
        fields
    }

    /// Raw data bytes of a field (nulls kept).
    pub fn field_data(&self, start: usize, end: usize) -> Vec<u8> {
        let count = self.distance(start, end);
        let mut data = Vec::with_capacity(count);
        let mut addr = start;
        for _ in 0..count {
            data.push(self.buffer[addr].char_data);
            addr = self.next_address(addr);
        }
        data
    }

    /// True if `byte` is a null cell's value.
    pub fn is_null(byte: u8) -> bool {
        byte == EBCDIC_NULL
    }
}

impl std::fmt::Display for Display3270 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.screen_rows() {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// 3270 buffer address codecs
///
/// A 12-bit address is two bytes, each carrying six bits passed through the
/// code table so that the result is a printable EBCDIC graphic. A 14-bit
/// address is the raw value split 6/8. Which one a host used is visible in
/// the top two bits of the first byte: `00` means 14-bit.
pub mod addressing {
    /// Six-bit value to EBCDIC graphic.
    pub const CODE_TABLE: [u8; 64] = [
        0x40, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
        0xC8, 0xC9, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
        0x50, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7,
        0xD8, 0xD9, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F,
        0x60, 0x61, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7,
        0xE8, 0xE9, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F,
        0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
        0xF8, 0xF9, 0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F,
    ];

    /// Largest buffer that 12-bit addressing can reach.
    pub const MAX_12BIT_BUFFER: usize = 4095;

    pub fn decode_12bit_address(byte1: u8, byte2: u8) -> usize {
        (((byte1 & 0x3F) as usize) << 6) | (byte2 & 0x3F) as usize
    }

    pub fn decode_14bit_address(byte1: u8, byte2: u8) -> usize {
        (((byte1 & 0x3F) as usize) << 8) | byte2 as usize
    }

    /// Decode either form, choosing by the top two bits of `byte1`.
    pub fn decode_address(byte1: u8, byte2: u8) -> usize {
        if byte1 & 0xC0 == 0x00 {
            decode_14bit_address(byte1, byte2)
        } else {
            decode_12bit_address(byte1, byte2)
        }
    }

    pub fn encode_12bit_address(address: usize) -> [u8; 2] {
        [
            CODE_TABLE[(address >> 6) & 0x3F],
            CODE_TABLE[address & 0x3F],
        ]
    }

    pub fn encode_14bit_address(address: usize) -> [u8; 2] {
        [((address >> 8) & 0x3F) as u8, (address & 0xFF) as u8]
    }

    /// Encode with the codec implied by the buffer size.
    pub fn encode_address(address: usize, buffer_size: usize) -> [u8; 2] {
        if buffer_size > MAX_12BIT_BUFFER {
            encode_14bit_address(address)
        } else {
            encode_12bit_address(address)
        }
    }

    /// Graphic form of a field attribute, as sent inbound after SF.
    pub fn encode_attribute(attr: u8) -> u8 {
        CODE_TABLE[(attr & 0x3F) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::addressing::*;
    use super::*;

    #[test]
    fn test_screen_size_dimensions() {
        assert_eq!(ScreenSize::Model2.buffer_size(), 1920);
        assert_eq!(ScreenSize::Model4.buffer_size(), 3440);
        assert_eq!(ScreenSize::Model5.cols(), 132);
        assert_eq!(ScreenSize::from_model_number(3), Some(ScreenSize::Model3));
        assert_eq!(ScreenSize::Model2.terminal_type(true), "IBM-3278-2-E");
    }

    #[test]
    fn test_alternate_switch_reallocates() {
        let mut display = Display3270::with_size(ScreenSize::Model4);
        assert_eq!(display.buffer_size(), 1920);
        display.set_alternate(true);
        assert_eq!(display.buffer_size(), 3440);
        assert_eq!(display.rows(), 43);
        display.set_alternate(false);
        assert_eq!(display.buffer_size(), 1920);
    }

    #[test]
    fn test_known_address_encodings() {
        assert_eq!(encode_12bit_address(0), [0x40, 0x40]);
        assert_eq!(encode_12bit_address(80), [0xC1, 0x50]);
        assert_eq!(encode_12bit_address(165), [0xC2, 0xE5]);
        assert_eq!(decode_address(0xC1, 0x50), 80);
        assert_eq!(decode_address(0x5D, 0x7F), 1919);
        assert_eq!(decode_address(0x0D, 0x70), 0x0D70);
    }

    #[test]
    fn test_address_round_trip_all_models() {
        for model in [ScreenSize::Model2, ScreenSize::Model4, ScreenSize::Model5] {
            let size = model.buffer_size();
            for addr in 0..size {
                let [b1, b2] = encode_address(addr, size);
                assert_eq!(decode_address(b1, b2), addr);
            }
        }
    }

    #[test]
    fn test_field_scanning() {
        let mut display = Display3270::new();
        assert!(!display.is_formatted());
        assert_eq!(display.find_field_bounds(10), None);

        display.set_field_attribute(10, FieldAttribute::new(0x20), ExtendedAttributes::default());
        display.set_field_attribute(20, FieldAttribute::new(0x00), ExtendedAttributes::default());
        assert!(display.is_formatted());
        assert_eq!(display.find_field_bounds(15), Some((11, 20)));
        assert_eq!(display.find_field_bounds(25), Some((21, 10)));
        assert_eq!(display.distance(21, 10), 1909);
        // Cells before the first attribute belong to the last field (wrap)
        assert_eq!(display.field_attribute_address(5), Some(20));
        assert!(display.is_protected_at(15));
        assert!(!display.is_protected_at(5));
    }

    #[test]
    fn test_tab_and_backtab() {
        let mut display = Display3270::new();
        let xa = ExtendedAttributes::default();
        display.set_field_attribute(0, FieldAttribute::new(0x20), xa);
        display.set_field_attribute(100, FieldAttribute::new(0x00), xa);
        display.set_field_attribute(110, FieldAttribute::new(0x20), xa);
        display.set_field_attribute(200, FieldAttribute::new(0x00), xa);
        display.set_field_attribute(210, FieldAttribute::new(0x20), xa);

        display.set_cursor(5);
        display.cursor_move(CursorOp::Tab, 0, 0);
        assert_eq!(display.cursor_address(), 101);
        display.cursor_move(CursorOp::Tab, 0, 0);
        assert_eq!(display.cursor_address(), 201);
        display.cursor_move(CursorOp::Tab, 0, 0);
        assert_eq!(display.cursor_address(), 101);

        display.set_cursor(205);
        display.cursor_move(CursorOp::BackTab, 0, 0);
        assert_eq!(display.cursor_address(), 201);
        display.cursor_move(CursorOp::BackTab, 0, 0);
        assert_eq!(display.cursor_address(), 101);
        display.cursor_move(CursorOp::BackTab, 0, 0);
        assert_eq!(display.cursor_address(), 201);
    }

    #[test]
    fn test_nearest_unprotected_field() {
        let mut display = Display3270::new();
        let xa = ExtendedAttributes::default();
        display.set_field_attribute(0, FieldAttribute::new(0x20), xa);
        display.set_field_attribute(100, FieldAttribute::new(0x00), xa);
        display.set_field_attribute(110, FieldAttribute::new(0x20), xa);

        display.cursor_move(CursorOp::NearestUnprotectedField, 25, 1);
        assert_eq!(display.cursor_address(), 105);
        display.cursor_move(CursorOp::NearestUnprotectedField, 10, 0);
        assert_eq!(display.cursor_address(), 101);
        display.cursor_move(CursorOp::Exact, 10, 0);
        assert_eq!(display.cursor_address(), 10);
    }

    #[test]
    fn test_unformatted_tab_goes_home() {
        let mut display = Display3270::new();
        display.set_cursor(500);
        display.cursor_move(CursorOp::Tab, 0, 0);
        assert_eq!(display.cursor_address(), 0);
    }

    #[test]
    fn test_repeat_to_address_full_wrap() {
        let mut display = Display3270::new();
        let end = display.repeat_to_address(40, 40, 0x5C, 0, ExtendedAttributes::default());
        assert_eq!(end, 40);
        assert!(display.cells().iter().all(|cell| cell.char_data == 0x5C));
    }

    #[test]
    fn test_repeat_to_address_wraps_past_end() {
        let mut display = Display3270::new();
        let end = display.repeat_to_address(1918, 2, 0xC1, 0, ExtendedAttributes::default());
        assert_eq!(end, 2);
        assert_eq!(display.read_char_at(1918), Some(0xC1));
        assert_eq!(display.read_char_at(1), Some(0xC1));
        assert_eq!(display.read_char_at(2), Some(0x00));
    }

    #[test]
    fn test_erase_unprotected_to_address_keeps_protected() {
        let mut display = Display3270::new();
        let xa = ExtendedAttributes::default();
        display.set_field_attribute(0, FieldAttribute::new(0x20), xa);
        display.set_field_attribute(10, FieldAttribute::new(0x00), xa);
        for addr in 1..10 {
            display.set_cell(addr, 0xC1);
        }
        for addr in 11..20 {
            display.set_cell(addr, 0xC2);
        }
        display.erase_unprotected_to_address(0, 20);
        assert_eq!(display.read_char_at(5), Some(0xC1));
        assert_eq!(display.read_char_at(15), Some(0x00));
        assert!(display.is_field_attribute(10));
    }

    #[test]
    fn test_erase_all_unprotected() {
        let mut display = Display3270::new();
        let xa = ExtendedAttributes::default();
        display.set_field_attribute(0, FieldAttribute::new(0x20), xa);
        display.set_field_attribute(10, FieldAttribute::new(0x01), xa);
        display.set_field_attribute(20, FieldAttribute::new(0x20), xa);
        display.set_cell(5, 0xC1);
        display.set_cell(15, 0xC2);
        display.set_cursor(300);

        display.erase_all_unprotected();
        assert_eq!(display.read_char_at(5), Some(0xC1));
        assert_eq!(display.read_char_at(15), Some(0x00));
        assert!(!display.field_attribute(15).map_or(true, |a| a.is_modified()));
        assert_eq!(display.cursor_address(), 11);
    }

    #[test]
    fn test_hidden_fields_render_blank() {
        let mut display = Display3270::new();
        let xa = ExtendedAttributes::default();
        display.set_field_attribute(0, FieldAttribute::new(0x4C), xa);
        display.set_cell(1, 0xC1);
        display.set_field_attribute(2, FieldAttribute::new(0x60), xa);
        display.set_cell(3, 0xC2);
        assert_eq!(display.text_at(0, 0, 4), "   B");
        let fields = display.fields();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].hidden);
        assert_eq!(fields[0].length, 1);
        assert!(fields[1].protected);
    }
}
