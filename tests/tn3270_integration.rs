//! TN3270 Integration Tests
//!
//! Data stream behavior checked end to end: host records go through the
//! interpreter or a whole session, and the inbound bytes coming back are
//! compared exactly.

use tn3270r::error::{KeyboardError, TN3270Error};
use tn3270r::keyboard::TnKey;
use tn3270r::lib3270::display::addressing::encode_address;
use tn3270r::lib3270::{
    AidKey, Display3270, ProtocolProcessor3270, ScreenSize, ORDER_IC, ORDER_RA, ORDER_SBA,
    ORDER_SF,
};
use tn3270r::session::Tn3270Session;
use tn3270r::telnet_negotiation::{ConnectionState, NegotiatorConfig};

const IAC: u8 = 0xFF;
const DO: u8 = 0xFD;
const WILL: u8 = 0xFB;
const EOR: u8 = 0xEF;

fn sba(address: usize) -> Vec<u8> {
    let mut order = vec![ORDER_SBA];
    order.extend_from_slice(&encode_address(address, 1920));
    order
}

/// A session that has completed classic TN3270 negotiation.
fn classic_session() -> Tn3270Session {
    let mut session = Tn3270Session::new(
        NegotiatorConfig {
            refuse_tn3270e: true,
            ..NegotiatorConfig::default()
        },
        ScreenSize::Model2,
    );
    session.connected();
    session.feed(&[IAC, DO, 24, IAC, DO, 25, IAC, WILL, 25, IAC, DO, 0, IAC, WILL, 0]);
    assert_eq!(session.state(), ConnectionState::Connected3270);
    session
}

fn record(data: &[u8]) -> Vec<u8> {
    let mut framed = data.to_vec();
    framed.extend_from_slice(&[IAC, EOR]);
    framed
}

/// Protected label at 0, unprotected field 3..10, protected from 10 on.
fn login_record() -> Vec<u8> {
    let mut data = vec![0xF5, 0xC3, ORDER_SF, 0x60, 0xD5, ORDER_SF, 0x40];
    data.extend(sba(10));
    data.extend_from_slice(&[ORDER_SF, 0x60]);
    data.extend(sba(3));
    data.push(ORDER_IC);
    data
}

/// Erase/Write with SF, "HI" and IC
#[test]
fn test_erase_write_scenario() {
    let mut display = Display3270::with_size(ScreenSize::Model2);
    let mut processor = ProtocolProcessor3270::new();
    let outcome = processor
        .process_data(&[0xF5, 0xC3, 0x1D, 0x20, 0xC8, 0xC9, 0x13], &mut display)
        .unwrap();

    assert!(display.is_field_attribute(0));
    assert!(display.field_attribute(1).unwrap().is_protected());
    assert_eq!(display.read_char_at(1), Some(0xC8));
    assert_eq!(display.read_char_at(2), Some(0xC9));
    assert_eq!(display.cursor_address(), 3);
    assert!(outcome.restore_keyboard);
    assert!(outcome.responses.is_empty());
}

/// Read Modified carries only the field whose MDT is set
#[test]
fn test_read_modified_returns_only_modified_field() {
    let mut display = Display3270::with_size(ScreenSize::Model2);
    let mut processor = ProtocolProcessor3270::new();
    // WCC without reset-MDT so the 0xC1 attribute keeps its MDT
    let data = [
        0xF5, 0xC2, ORDER_SF, 0x60, 0xC1, ORDER_SF, 0xC1, 0xE7, 0xE8, ORDER_SF, 0x40, 0xE9,
        0xE6, ORDER_SF, 0x60,
    ];
    processor.process_data(&data, &mut display).unwrap();

    let response = processor.create_read_modified_response(&display, AidKey::Enter, false);
    assert_eq!(response, vec![0x7D, 0x40, 0x40, ORDER_SBA, 0x40, 0xC3, 0xE7, 0xE8]);
}

/// RA whose target is the current address fills the whole buffer
#[test]
fn test_repeat_to_same_address_fills_buffer() {
    let mut display = Display3270::with_size(ScreenSize::Model2);
    let mut processor = ProtocolProcessor3270::new();
    let mut data = vec![0xF5, 0xC3];
    data.extend(sba(10));
    data.push(ORDER_RA);
    data.extend_from_slice(&encode_address(10, 1920));
    data.push(0xC1);
    processor.process_data(&data, &mut display).unwrap();

    assert!(display.cells().iter().all(|cell| cell.char_data == 0xC1));
}

/// EAU twice leaves the same buffer as EAU once
#[test]
fn test_erase_all_unprotected_is_idempotent() {
    let mut display = Display3270::with_size(ScreenSize::Model2);
    let mut processor = ProtocolProcessor3270::new();
    let mut data = login_record();
    data.extend_from_slice(&[0xC1, 0xC2]);
    processor.process_data(&data, &mut display).unwrap();

    processor.process_data(&[0x6F], &mut display).unwrap();
    let once: Vec<_> = display.cells().to_vec();
    let cursor = display.cursor_address();
    processor.process_data(&[0x6F], &mut display).unwrap();

    assert_eq!(display.cells(), once.as_slice());
    assert_eq!(display.cursor_address(), cursor);
    assert_eq!(cursor, 3);
}

/// Typing and Enter produce an exact Read Modified record
#[test]
fn test_typed_field_goes_back_on_enter() {
    let mut session = classic_session();
    assert!(session.feed(&record(&login_record())).is_empty());
    assert!(!session.keyboard().is_locked());

    session.send_text("HI").unwrap();
    let out = session.send_key(TnKey::Enter).unwrap();
    assert_eq!(out, vec![0x7D, 0x40, 0xC5, ORDER_SBA, 0x40, 0xC3, 0xC8, 0xC9, IAC, EOR]);

    assert!(session.keyboard().is_locked());
    assert!(matches!(
        session.send_text("X"),
        Err(TN3270Error::Keyboard(KeyboardError::Locked { .. }))
    ));
}

/// Typing into a protected field is an operator error
#[test]
fn test_protected_field_rejects_text() {
    let mut session = classic_session();
    session.feed(&record(&login_record()));
    session.move_cursor(1, 0).unwrap();
    assert!(matches!(
        session.send_text("X"),
        Err(TN3270Error::Keyboard(KeyboardError::ProtectedField { .. }))
    ));
}

/// A Query through the session answers with a framed Query Reply
#[test]
fn test_query_reply_through_session() {
    let mut session = classic_session();
    let out = session.feed(&record(&[0xF3, 0x00, 0x05, 0x01, 0xFF, 0x02]));

    assert_eq!(out[0], 0x88);
    assert_eq!(
        &out[1..12],
        &[0x00, 0x0B, 0x81, 0x80, 0x81, 0x84, 0x85, 0x86, 0x87, 0x88, 0xA6]
    );
    assert_eq!(&out[out.len() - 2..], &[IAC, EOR]);
}

/// A host Read Buffer is answered with the current AID and every cell
#[test]
fn test_read_buffer_through_session() {
    let mut session = classic_session();
    session.feed(&record(&login_record()));
    let out = session.feed(&record(&[0xF2]));

    assert_eq!(out[0], 0x60);
    assert_eq!(&out[1..3], &[0x40, 0xC3]);
    assert_eq!(&out[3..5], &[ORDER_SF, 0x60]);
    assert_eq!(&out[out.len() - 2..], &[IAC, EOR]);
}

/// Screen text and snapshots reflect the host screen
#[test]
fn test_snapshot_lists_fields() {
    let mut session = classic_session();
    session.feed(&record(&login_record()));

    assert_eq!(session.get_screen_text(1, 0, 1).unwrap(), "N");
    let snapshot = session.snapshot();
    assert_eq!(snapshot.rows.len(), 24);
    assert_eq!(snapshot.cursor_address, 3);
    assert_eq!(snapshot.fields.len(), 3);
    let input: Vec<_> = snapshot.fields.iter().filter(|f| !f.protected).collect();
    assert_eq!(input.len(), 1);
    assert_eq!((input[0].start, input[0].length), (3, 7));
}
