//! Keyboard handling for the 3270 operator
//!
//! Turns logical key presses and typed text into buffer edits and, for the
//! attention keys, into the inbound record the host expects. The keyboard
//! carries the lock bits that model the 3270 "X" indicators: the host
//! unlocks with a WCC restore, the operator clears errors with Reset.

use std::fmt;

use crate::error::{KeyboardError, KeyboardResult};
use crate::lib3270::codes::{AidKey, FCORDER_DUP, FCORDER_FM};
use crate::lib3270::display::{CursorOp, Display3270};
use crate::lib3270::protocol::ProtocolProcessor3270;
use crate::protocol_common::ebcdic::try_ascii_to_ebcdic;

/// Operator error codes, kept in the low nibble of the lock word
pub const KL_OERR_MASK: u16 = 0x000F;
pub const KL_OERR_PROTECTED: u16 = 1;
pub const KL_OERR_NUMERIC: u16 = 2;
pub const KL_OERR_OVERFLOW: u16 = 3;
pub const KL_NOT_CONNECTED: u16 = 0x0010;
pub const KL_AWAITING_FIRST: u16 = 0x0020;
pub const KL_OIA_TWAIT: u16 = 0x0040;
pub const KL_OIA_LOCKED: u16 = 0x0080;
pub const KL_DEFERRED_UNLOCK: u16 = 0x0100;
pub const KL_ENTER_INHIBIT: u16 = 0x0200;
pub const KL_SCROLLED: u16 = 0x0400;
pub const KL_OIA_MINUS: u16 = 0x0800;

/// Keyboard lock word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardLock(u16);

impl Default for KeyboardLock {
    fn default() -> Self {
        Self(KL_NOT_CONNECTED)
    }
}

impl KeyboardLock {
    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn is_locked(self) -> bool {
        self.0 != 0
    }

    pub fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bits: u16) {
        self.0 |= bits;
    }

    pub fn clear(&mut self, bits: u16) {
        self.0 &= !bits;
    }

    /// Operator error currently shown, if any.
    pub fn operator_error(self) -> Option<u16> {
        match self.0 & KL_OERR_MASK {
            0 => None,
            code => Some(code),
        }
    }

    fn set_operator_error(&mut self, code: u16) {
        self.0 = (self.0 & !KL_OERR_MASK) | (code & KL_OERR_MASK);
    }

    /// WCC keyboard restore: everything but the connection lock goes.
    pub fn restore(&mut self) {
        self.0 &= KL_NOT_CONNECTED;
    }

    /// Operator Reset. Does nothing while disconnected.
    pub fn reset(&mut self) {
        if !self.has(KL_NOT_CONNECTED) {
            self.0 = 0;
        }
    }
}

impl fmt::Display for KeyboardLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_locked() {
            return write!(f, "unlocked");
        }
        let names = [
            (KL_NOT_CONNECTED, "not-connected"),
            (KL_AWAITING_FIRST, "awaiting-first"),
            (KL_OIA_TWAIT, "twait"),
            (KL_OIA_LOCKED, "locked"),
            (KL_DEFERRED_UNLOCK, "deferred-unlock"),
            (KL_ENTER_INHIBIT, "enter-inhibit"),
            (KL_SCROLLED, "scrolled"),
            (KL_OIA_MINUS, "minus"),
        ];
        let mut parts: Vec<String> = names
            .iter()
            .filter(|(bit, _)| self.has(*bit))
            .map(|(_, name)| name.to_string())
            .collect();
        if let Some(code) = self.operator_error() {
            parts.push(format!("oerr-{}", code));
        }
        write!(f, "{}", parts.join(","))
    }
}

/// Logical keys accepted by `send_key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TnKey {
    Enter,
    Clear,
    Pa(u8),
    Pf(u8),
    SysReq,
    Attn,
    Tab,
    BackTab,
    Home,
    Up,
    Down,
    Left,
    Right,
    Backspace,
    Delete,
    EraseEof,
    EraseInput,
    Newline,
    FieldEnd,
    Reset,
    Dup,
    FieldMark,
}

impl TnKey {
    /// Attention identifier sent for this key, for keys that submit.
    pub fn aid(self) -> Option<AidKey> {
        match self {
            TnKey::Enter => Some(AidKey::Enter),
            TnKey::Clear => Some(AidKey::Clear),
            TnKey::Pa(1) => Some(AidKey::PA1),
            TnKey::Pa(2) => Some(AidKey::PA2),
            TnKey::Pa(3) => Some(AidKey::PA3),
            TnKey::Pf(n) => AidKey::pf(n),
            TnKey::SysReq => Some(AidKey::SysReq),
            _ => None,
        }
    }

    /// Keys that send an AID to the host and so lock the keyboard.
    /// Attn interrupts the host without an AID and does not count.
    pub fn causes_submit(self) -> bool {
        self.aid().is_some()
    }

    /// Parse a key name such as `Enter`, `PF3`, `pa1` or `BackTab`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        if let Some(number) = upper.strip_prefix("PF") {
            return number
                .parse::<u8>()
                .ok()
                .filter(|n| (1..=24).contains(n))
                .map(TnKey::Pf);
        }
        if let Some(number) = upper.strip_prefix("PA") {
            return number
                .parse::<u8>()
                .ok()
                .filter(|n| (1..=3).contains(n))
                .map(TnKey::Pa);
        }
        let key = match upper.as_str() {
            "ENTER" => TnKey::Enter,
            "CLEAR" => TnKey::Clear,
            "SYSREQ" => TnKey::SysReq,
            "ATTN" => TnKey::Attn,
            "TAB" => TnKey::Tab,
            "BACKTAB" => TnKey::BackTab,
            "HOME" => TnKey::Home,
            "UP" => TnKey::Up,
            "DOWN" => TnKey::Down,
            "LEFT" => TnKey::Left,
            "RIGHT" => TnKey::Right,
            "BACKSPACE" => TnKey::Backspace,
            "DELETE" => TnKey::Delete,
            "ERASEEOF" => TnKey::EraseEof,
            "ERASEINPUT" => TnKey::EraseInput,
            "NEWLINE" => TnKey::Newline,
            "FIELDEND" => TnKey::FieldEnd,
            "RESET" => TnKey::Reset,
            "DUP" => TnKey::Dup,
            "FIELDMARK" => TnKey::FieldMark,
            _ => return None,
        };
        Some(key)
    }

    pub fn name(self) -> String {
        match self {
            TnKey::Pa(n) => format!("PA{}", n),
            TnKey::Pf(n) => format!("PF{}", n),
            other => format!("{:?}", other),
        }
    }
}

/// Keyboard state for one session
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    lock: KeyboardLock,
    insert_mode: bool,
    /// Typing into a protected position skips to the next input field
    /// instead of raising an operator error
    pub always_skip: bool,
    /// Numeric fields accept only digits, minus and period
    pub numeric_lock: bool,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> KeyboardLock {
        self.lock
    }

    pub fn lock_mut(&mut self) -> &mut KeyboardLock {
        &mut self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn insert_mode(&self) -> bool {
        self.insert_mode
    }

    pub fn set_insert_mode(&mut self, insert: bool) {
        self.insert_mode = insert;
    }

    /// Host restored the keyboard.
    pub fn restore(&mut self) {
        self.lock.restore();
    }

    pub fn reset(&mut self) {
        self.lock.reset();
        self.insert_mode = false;
    }

    /// Transport came up: locked until the host writes the first screen.
    pub fn connected(&mut self) {
        self.lock.clear(KL_NOT_CONNECTED);
        self.lock.set(KL_AWAITING_FIRST);
    }

    pub fn disconnected(&mut self) {
        self.lock = KeyboardLock::default();
        self.insert_mode = false;
    }

    fn operator_error(&mut self, code: u16, err: KeyboardError) -> KeyboardError {
        log::debug!("operator error {}: {}", code, err);
        self.lock.set_operator_error(code);
        err
    }

    fn check_unlocked(&self) -> KeyboardResult<()> {
        if self.lock.is_locked() {
            return Err(KeyboardError::Locked {
                lock_bits: self.lock.bits(),
            });
        }
        Ok(())
    }

    /// Type one character at the cursor.
    pub fn handle_ordinary_character(
        &mut self,
        display: &mut Display3270,
        ch: char,
        paste: bool,
    ) -> KeyboardResult<()> {
        let byte = try_ascii_to_ebcdic(ch).ok_or(KeyboardError::Unrepresentable)?;
        self.handle_ebcdic(display, byte, ch, paste)
    }

    fn handle_ebcdic(
        &mut self,
        display: &mut Display3270,
        byte: u8,
        ch: char,
        paste: bool,
    ) -> KeyboardResult<()> {
        if !paste {
            self.check_unlocked()?;
        }

        let mut address = display.cursor_address();
        if display.is_field_attribute(address) || display.is_protected_at(address) {
            let skipped = display.next_unprotected(address);
            let can_skip = self.always_skip
                && display.is_formatted()
                && !display.is_protected_at(skipped)
                && !display.is_field_attribute(skipped);
            if !can_skip {
                return Err(self.operator_error(
                    KL_OERR_PROTECTED,
                    KeyboardError::ProtectedField { address },
                ));
            }
            address = skipped;
        }

        let attr = display.field_attribute(address);
        if self.numeric_lock && attr.map_or(false, |a| a.is_numeric()) {
            let allowed = ch.is_ascii_digit() || ch == '-' || ch == '.' || byte == FCORDER_DUP;
            if !allowed {
                return Err(self.operator_error(KL_OERR_NUMERIC, KeyboardError::NumericField { address }));
            }
        }

        if self.insert_mode && !Display3270::is_null(display.read_char_at(address).unwrap_or(0)) {
            self.shift_right(display, address)?;
        }

        let extended = display.get_cell(address).map(|c| c.extended).unwrap_or_default();
        display.write_char_at(address, byte, 0, extended);
        display.set_mdt(address);

        let mut next = display.next_address(address);
        if let Some(attr) = display.get_cell(next).and_then(|cell| cell.attribute()) {
            if attr.is_autoskip() || self.always_skip {
                next = display.next_unprotected(next);
            } else {
                while display.is_field_attribute(next) && display.is_formatted() {
                    next = display.next_address(next);
                    if next == address {
                        break;
                    }
                }
            }
        }
        display.set_cursor(next);
        Ok(())
    }

    /// Open a gap at `address` by shifting the rest of the field right into
    /// its first null.
    fn shift_right(&mut self, display: &mut Display3270, address: usize) -> KeyboardResult<()> {
        let end = display
            .find_field_bounds(address)
            .map(|(_, end)| end)
            .unwrap_or(address);
        let mut null_at = None;
        let mut probe = address;
        loop {
            if display.is_field_attribute(probe) {
                break;
            }
            if display.read_char_at(probe) == Some(0) {
                null_at = Some(probe);
                break;
            }
            probe = display.next_address(probe);
            if probe == end || probe == address {
                break;
            }
        }
        let Some(mut to) = null_at else {
            return Err(self.operator_error(KL_OERR_OVERFLOW, KeyboardError::FieldOverflow { address }));
        };
        while to != address {
            let from = display.previous_address(to);
            if let Some(cell) = display.get_cell(from).copied() {
                display.write_char_at(to, cell.char_data, cell.charset, cell.extended);
            }
            to = from;
        }
        Ok(())
    }

    /// Type a string. Newlines move to the next line's input field.
    pub fn type_text(&mut self, display: &mut Display3270, text: &str, paste: bool) -> KeyboardResult<()> {
        for ch in text.chars() {
            if ch == '\n' {
                self.newline(display);
            } else {
                self.handle_ordinary_character(display, ch, paste)?;
            }
        }
        Ok(())
    }

    /// Submit an attention key: lock the keyboard, record the AID and build
    /// the Read Modified reply. Clear erases the screen first.
    pub fn key_aid(
        &mut self,
        aid: AidKey,
        display: &mut Display3270,
        processor: &mut ProtocolProcessor3270,
    ) -> KeyboardResult<Vec<u8>> {
        self.check_unlocked()?;
        if processor.is_sscp_mode() && !matches!(aid, AidKey::Enter | AidKey::Clear) {
            return Err(KeyboardError::NotAvailable);
        }
        if aid == AidKey::Clear {
            display.clear();
        }
        processor.set_aid(aid);
        self.lock.set(KL_OIA_TWAIT | KL_OIA_LOCKED);
        self.insert_mode = false;
        log::debug!("AID {}", aid.name());
        Ok(processor.create_read_modified_response(display, aid, false))
    }

    /// Apply a key that only edits the local buffer. Attention keys and
    /// Attn belong to the session and are rejected here.
    pub fn edit_key(&mut self, key: TnKey, display: &mut Display3270) -> KeyboardResult<()> {
        if key == TnKey::Reset {
            self.reset();
            return Ok(());
        }
        if key.causes_submit() || key == TnKey::Attn {
            return Err(KeyboardError::NotAvailable);
        }
        self.check_unlocked()?;
        let cursor = display.cursor_address();
        let size = display.buffer_size();
        match key {
            TnKey::Tab => display.cursor_move(CursorOp::Tab, 0, 0),
            TnKey::BackTab => display.cursor_move(CursorOp::BackTab, 0, 0),
            TnKey::Home => {
                let home = if display.is_formatted() {
                    display.next_unprotected(size - 1)
                } else {
                    0
                };
                display.set_cursor(home);
            }
            TnKey::Up => display.set_cursor((cursor + size - display.cols()) % size),
            TnKey::Down => display.set_cursor((cursor + display.cols()) % size),
            TnKey::Left => display.set_cursor(display.previous_address(cursor)),
            TnKey::Right => display.set_cursor(display.next_address(cursor)),
            TnKey::Backspace => {
                let previous = display.previous_address(cursor);
                if display.is_field_attribute(previous) || display.is_protected_at(previous) {
                    return Err(self.operator_error(
                        KL_OERR_PROTECTED,
                        KeyboardError::ProtectedField { address: previous },
                    ));
                }
                display.set_cursor(previous);
                self.delete_char(display, previous)?;
            }
            TnKey::Delete => self.delete_char(display, cursor)?,
            TnKey::EraseEof => {
                self.check_editable(display, cursor)?;
                let end = display
                    .find_field_bounds(cursor)
                    .map(|(_, end)| end)
                    .unwrap_or(0);
                if display.is_formatted() {
                    display.erase_range(cursor, end);
                } else {
                    // Unformatted: erase to the end of the screen
                    let mut addr = cursor;
                    while addr < size {
                        display.set_cell(addr, 0);
                        addr += 1;
                    }
                }
                display.set_mdt(cursor);
            }
            TnKey::EraseInput => display.erase_all_unprotected(),
            TnKey::Newline => self.newline(display),
            TnKey::FieldEnd => field_end(display),
            TnKey::Dup => {
                self.handle_ebcdic(display, FCORDER_DUP, '*', false)?;
                let next = display.next_unprotected(display.cursor_address());
                display.set_cursor(next);
            }
            TnKey::FieldMark => self.handle_ebcdic(display, FCORDER_FM, ';', false)?,
            _ => {}
        }
        Ok(())
    }

    fn check_editable(&mut self, display: &Display3270, address: usize) -> KeyboardResult<()> {
        if display.is_field_attribute(address) || display.is_protected_at(address) {
            return Err(self.operator_error(KL_OERR_PROTECTED, KeyboardError::ProtectedField { address }));
        }
        Ok(())
    }

    /// Remove the character at `address`, pulling the rest of the field left.
    fn delete_char(&mut self, display: &mut Display3270, address: usize) -> KeyboardResult<()> {
        self.check_editable(display, address)?;
        let end = match display.find_field_bounds(address) {
            Some((_, end)) => end,
            None => 0,
        };
        let mut to = address;
        loop {
            let from = display.next_address(to);
            if from == end || display.is_field_attribute(from) {
                display.set_cell(to, 0);
                break;
            }
            let cell = display.get_cell(from).copied().unwrap_or_default();
            display.write_char_at(to, cell.char_data, cell.charset, cell.extended);
            to = from;
        }
        display.set_mdt(address);
        Ok(())
    }

    /// Cursor to the start of the next line, or the next input field if that
    /// position is protected.
    fn newline(&mut self, display: &mut Display3270) {
        let size = display.buffer_size();
        let cols = display.cols();
        let mut address = (display.cursor_address() + cols) % size;
        address = (address / cols) * cols;
        let usable = display.is_formatted()
            && !display.is_field_attribute(address)
            && !display.is_protected_at(address);
        if usable || !display.is_formatted() {
            display.set_cursor(address);
        } else {
            display.set_cursor(display.next_unprotected(address));
        }
    }
}

/// Cursor just past the last non-blank character of the current field.
fn field_end(display: &mut Display3270) {
    let cursor = display.cursor_address();
    let Some(fa) = display.field_attribute_address(cursor) else {
        return;
    };
    if fa == cursor || display.is_protected_at(cursor) {
        return;
    }
    let mut last_nonblank = None;
    let mut address = display.next_address(fa);
    while !display.is_field_attribute(address) {
        match display.read_char_at(address) {
            Some(0x00) | Some(0x40) | None => {}
            Some(_) => last_nonblank = Some(address),
        }
        address = display.next_address(address);
        if address == fa {
            break;
        }
    }
    let target = match last_nonblank {
        None => display.next_address(fa),
        Some(last) => {
            let after = display.next_address(last);
            if display.is_field_attribute(after) {
                last
            } else {
                after
            }
        }
    };
    display.set_cursor(target);
}
