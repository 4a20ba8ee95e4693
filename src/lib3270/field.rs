//! Field attribute handling for 3270
//!
//! A 3270 field is not stored anywhere: it is the run of cells between one
//! attribute cell and the next. This module holds the attribute byte itself
//! (from SF, SFE or MF), the extended attribute bag that rides along with it,
//! and the read-only `FieldInfo` view handed out in screen snapshots.

use serde::{Deserialize, Serialize};

use super::codes::*;

/// 3270 field attribute byte, stored as received on the wire.
///
/// The predicates are plain bit tests against the 3270 attribute layout.
/// Hosts usually send attributes already passed through the address code
/// table (0x60 for protected, 0x40 for unprotected), which leaves the low six
/// bits unchanged, so both forms test the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldAttribute(pub u8);

impl FieldAttribute {
    pub fn new(attr: u8) -> Self {
        Self(attr)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_protected(self) -> bool {
        (self.0 & ATTR_PROTECTED) != 0
    }

    pub fn is_numeric(self) -> bool {
        (self.0 & ATTR_NUMERIC) != 0
    }

    /// Protected and numeric together mean the cursor skips over the field.
    pub fn is_autoskip(self) -> bool {
        self.is_protected() && self.is_numeric()
    }

    pub fn is_modified(self) -> bool {
        (self.0 & ATTR_MDT) != 0
    }

    /// Intensified display.
    pub fn is_high(self) -> bool {
        (self.0 & ATTR_DISPLAY) == DISPLAY_INTENSIFIED
    }

    /// Light-pen selectable (either of the two selectable display codes).
    pub fn is_selectable(self) -> bool {
        matches!(self.0 & ATTR_DISPLAY, DISPLAY_SELECTABLE | DISPLAY_INTENSIFIED)
    }

    /// Non-display field; contents are not rendered.
    pub fn is_zero(self) -> bool {
        (self.0 & ATTR_DISPLAY) == DISPLAY_HIDDEN
    }

    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.0 |= ATTR_MDT;
        } else {
            self.0 &= !ATTR_MDT;
        }
    }

    pub fn display_attr(self) -> u8 {
        self.0 & ATTR_DISPLAY
    }
}

/// Extended attributes set by SFE, SA and MF.
///
/// None of these affect text content; they only matter for rendering and
/// for the query replies that advertise them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendedAttributes {
    pub highlighting: Option<u8>,
    pub foreground_color: Option<u8>,
    pub background_color: Option<u8>,
    pub charset: Option<u8>,
    pub validation: Option<u8>,
    pub outlining: Option<u8>,
    pub transparency: Option<u8>,
}

impl ExtendedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one type/value pair. Returns false for a type this terminal
    /// does not know, which callers log and otherwise ignore.
    pub fn apply(&mut self, attr_type: u8, value: u8) -> bool {
        let slot = match attr_type {
            XA_HIGHLIGHTING => &mut self.highlighting,
            XA_FOREGROUND => &mut self.foreground_color,
            XA_BACKGROUND => &mut self.background_color,
            XA_CHARSET => &mut self.charset,
            XA_VALIDATION => &mut self.validation,
            XA_OUTLINING => &mut self.outlining,
            XA_TRANSPARENCY => &mut self.transparency,
            XA_ALL => {
                *self = Self::default();
                return true;
            }
            _ => return false,
        };
        // A zero value means "default", which is the same as unset
        *slot = if value == 0 { None } else { Some(value) };
        true
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One field as seen in a screen snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Address of the attribute cell
    pub attribute_address: usize,
    /// Address of the first data cell
    pub start: usize,
    /// Number of data cells, which may be zero
    pub length: usize,
    pub attribute: FieldAttribute,
    pub protected: bool,
    pub numeric: bool,
    pub hidden: bool,
    pub intensified: bool,
    pub modified: bool,
    /// Field contents translated to text; hidden fields render as spaces
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_predicates() {
        let unprotected = FieldAttribute::new(0x00);
        assert!(!unprotected.is_protected());
        assert!(!unprotected.is_numeric());
        assert!(!unprotected.is_modified());

        let protected_numeric = FieldAttribute::new(ATTR_PROTECTED | ATTR_NUMERIC);
        assert!(protected_numeric.is_protected());
        assert!(protected_numeric.is_numeric());
        assert!(protected_numeric.is_autoskip());
    }

    #[test]
    fn test_code_table_encoded_attributes() {
        // 0x60 is the graphic form of 0x20, 0xF0 of 0x30
        assert!(FieldAttribute::new(0x60).is_protected());
        assert!(FieldAttribute::new(0xF0).is_autoskip());
        assert!(!FieldAttribute::new(0x40).is_protected());
        assert!(FieldAttribute::new(0xC8).is_high());
        assert!(FieldAttribute::new(0x4C).is_zero());
    }

    #[test]
    fn test_display_predicates() {
        assert!(FieldAttribute::new(DISPLAY_INTENSIFIED).is_high());
        assert!(FieldAttribute::new(DISPLAY_INTENSIFIED).is_selectable());
        assert!(FieldAttribute::new(DISPLAY_SELECTABLE).is_selectable());
        assert!(!FieldAttribute::new(DISPLAY_SELECTABLE).is_high());
        assert!(FieldAttribute::new(DISPLAY_HIDDEN).is_zero());
        assert!(!FieldAttribute::new(DISPLAY_HIDDEN).is_selectable());
    }

    #[test]
    fn test_mdt_toggle() {
        let mut attr = FieldAttribute::new(0x40);
        attr.set_modified(true);
        assert!(attr.is_modified());
        assert_eq!(attr.value(), 0x41);
        attr.set_modified(false);
        assert_eq!(attr.value(), 0x40);
    }

    #[test]
    fn test_extended_attribute_apply() {
        let mut xa = ExtendedAttributes::new();
        assert!(xa.apply(XA_FOREGROUND, COLOR_RED));
        assert!(xa.apply(XA_HIGHLIGHTING, HIGHLIGHT_REVERSE));
        assert_eq!(xa.foreground_color, Some(COLOR_RED));
        assert_eq!(xa.highlighting, Some(HIGHLIGHT_REVERSE));

        assert!(xa.apply(XA_FOREGROUND, COLOR_DEFAULT));
        assert_eq!(xa.foreground_color, None);

        assert!(!xa.apply(0x99, 0x01));
        assert!(xa.apply(XA_ALL, 0x00));
        assert!(xa.is_default());
    }
}
