use tn3270r::lib3270::tn3270e::Tn3270eFunction;
use tn3270r::protocol_common::telnet_base::{build_subnegotiation, TelnetCommand};
use tn3270r::session::Tn3270Session;
use tn3270r::telnet_negotiation::{
    outbound_bytes, ConnectionState, NegotiatorConfig, TelnetEvent, TelnetNegotiator,
};
use tn3270r::ScreenSize;

const IAC: u8 = TelnetCommand::IAC as u8;
const DO: u8 = TelnetCommand::DO as u8;
const WILL: u8 = TelnetCommand::WILL as u8;
const SB: u8 = TelnetCommand::SB as u8;
const SE: u8 = TelnetCommand::SE as u8;
const EOR: u8 = TelnetCommand::EOR as u8;

fn device_type_is(lu: &[u8]) -> Vec<u8> {
    let mut body = vec![2, 4];
    body.extend_from_slice(b"IBM-3278-2-E");
    body.push(1);
    body.extend_from_slice(lu);
    build_subnegotiation(40, &body)
}

/// DO TN3270E through FUNCTIONS IS, then the first data record
#[test]
fn test_tn3270e_session_reaches_3270e_state() {
    let mut session = Tn3270Session::new(NegotiatorConfig::default(), ScreenSize::Model2);
    session.connected();

    assert_eq!(session.feed(&[IAC, DO, 40]), vec![IAC, WILL, 40]);
    assert_eq!(session.state(), ConnectionState::ConnectedInitial3270E);

    let out = session.feed(&device_type_is(b"LU07"));
    assert_eq!(out, vec![IAC, SB, 40, 3, 7, 0, 1, 2, 4, IAC, SE]);
    session.feed(&[IAC, SB, 40, 3, 4, 1, 4, IAC, SE]);
    assert_eq!(session.state(), ConnectionState::ConnectedInitial3270E);

    // 3270-DATA: Erase/Write, restore, "A"
    let out = session.feed(&[0, 0, 0, 0, 1, 0xF5, 0xC3, 0xC1, IAC, EOR]);
    assert!(out.is_empty());
    assert_eq!(session.state(), ConnectionState::Connected3270E);
    assert_eq!(session.display().read_char_at(0), Some(0xC1));
    assert!(!session.keyboard().is_locked());

    let status = session.status();
    assert_eq!(status.lu_name.as_deref(), Some("LU07"));
    assert_eq!(
        status.functions,
        vec![Tn3270eFunction::DataStreamCtl, Tn3270eFunction::SysReq]
    );
}

/// Doubled IAC inside a subnegotiation reaches the handler as one byte
#[test]
fn test_subnegotiation_iac_is_undoubled() {
    let mut negotiator = TelnetNegotiator::new(NegotiatorConfig::default());
    negotiator.set_state(ConnectionState::ConnectedInitial);
    negotiator.process_incoming_data(&[IAC, DO, 40]);

    let sb = device_type_is(&[b'L', b'U', 0xFF]);
    assert_eq!(&sb[sb.len() - 4..], &[0xFF, 0xFF, IAC, SE]);
    negotiator.process_incoming_data(&sb);
    assert_eq!(negotiator.connected_lu(), Some("LU\u{FFFD}"));
}

/// Doubled IAC inside a record is data
#[test]
fn test_record_iac_is_data() {
    let mut negotiator = TelnetNegotiator::new(NegotiatorConfig {
        refuse_tn3270e: true,
        ..NegotiatorConfig::default()
    });
    negotiator.set_state(ConnectionState::ConnectedInitial);
    negotiator.process_incoming_data(&[
        IAC, DO, 24, IAC, DO, 25, IAC, WILL, 25, IAC, DO, 0, IAC, WILL, 0,
    ]);

    let events = negotiator.process_incoming_data(&[0xF1, 0xC3, IAC, IAC, 0xC1, IAC, EOR]);
    assert_eq!(events, vec![TelnetEvent::Record(vec![0xF1, 0xC3, 0xFF, 0xC1])]);
}

/// Text before any 3270 negotiation is treated as NVT
#[test]
fn test_ansi_host_text() {
    let mut session = Tn3270Session::new(NegotiatorConfig::default(), ScreenSize::Model2);
    session.connected();
    session.feed(b"Welcome\r\nlogin: ");
    assert!(session.nvt_text().contains("Welcome"));
    assert!(matches!(
        session.state(),
        ConnectionState::ConnectedInitial | ConnectionState::ConnectedAnsi | ConnectionState::ConnectedNvt
    ));
}

/// Options outside TN3270 are refused in one round
#[test]
fn test_unknown_options_are_refused() {
    let mut negotiator = TelnetNegotiator::new(NegotiatorConfig::default());
    negotiator.set_state(ConnectionState::ConnectedInitial);
    let events = negotiator.process_incoming_data(&[IAC, DO, 31, IAC, WILL, 5]);
    assert_eq!(outbound_bytes(&events), vec![IAC, 0xFC, 31, IAC, 0xFE, 5]);
}

fn environ_exchange(lu_name: Option<&str>) -> Vec<u8> {
    let mut session = Tn3270Session::new(
        NegotiatorConfig {
            lu_name: lu_name.map(str::to_string),
            ..NegotiatorConfig::default()
        },
        ScreenSize::Model2,
    );
    session.connected();
    assert_eq!(session.feed(&[IAC, DO, 39]), vec![IAC, WILL, 39]);
    session.feed(&[IAC, SB, 39, 1, IAC, SE])
}

/// NEW-ENVIRON SEND is answered with an empty IS when no LU is configured
#[test]
fn test_new_environ_reply_without_lu() {
    assert_eq!(environ_exchange(None), vec![IAC, SB, 39, 0, IAC, SE]);
}

/// With an LU configured the IS names it as USER and DEVNAME
#[test]
fn test_new_environ_reply_with_lu() {
    let mut expected = vec![IAC, SB, 39, 0, 0];
    expected.extend_from_slice(b"USER");
    expected.push(1);
    expected.extend_from_slice(b"TSO0042");
    expected.push(3);
    expected.extend_from_slice(b"DEVNAME");
    expected.push(1);
    expected.extend_from_slice(b"TSO0042");
    expected.extend_from_slice(&[IAC, SE]);
    assert_eq!(environ_exchange(Some("TSO0042")), expected);
}
