//! Minimal TN3270 server
//!
//! Enough of the host side of RFC 1576 and RFC 2355 to drive a real client:
//! negotiate the session, send screens built with [`TNServerScreen`] and
//! wait for the client's AID key. Every call blocks; run one thread per
//! connection.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{NetworkError, TN3270Error, TN3270Result, TelnetError};
use crate::lib3270::display::ScreenSize;
use crate::lib3270::server_screen::TNServerScreen;
use crate::lib3270::tn3270e::{
    functions_from_bytes, functions_to_bytes, Tn3270eFunction, TN3270E_CONNECT,
    TN3270E_DEVICE_TYPE, TN3270E_FUNCTIONS, TN3270E_IS, TN3270E_REQUEST, TN3270E_SEND,
};
use crate::protocol_common::telnet_base::{
    build_negotiation, build_subnegotiation, hex_dump, unescape_iac, TelnetCommand, TelnetOption,
    TTYPE_IS, TTYPE_SEND,
};

const IAC: u8 = TelnetCommand::IAC as u8;
const SE: u8 = TelnetCommand::SE as u8;

/// How long negotiation may wait on the client.
const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Functions the server honours when a client asks for them.
const SERVER_FUNCTIONS: [Tn3270eFunction; 2] = [Tn3270eFunction::Responses, Tn3270eFunction::SysReq];

/// LU names handed to TN3270E clients that do not ask for one
static NEXT_LU: AtomicUsize = AtomicUsize::new(1);

/// One telnet unit read from the client during negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Inbound {
    Will(u8),
    Wont(u8),
    Do(u8),
    Dont(u8),
    /// Subnegotiation body: option byte first, IAC doubling removed
    Sub(Vec<u8>),
    /// Anything else, kept raw for the screen decoder
    Other(Vec<u8>),
}

/// Split the first telnet unit off `buf`. None when it is incomplete.
fn parse_inbound(buf: &[u8]) -> Option<(Inbound, usize)> {
    let first = *buf.first()?;
    if first != IAC {
        let len = buf.iter().position(|&b| b == IAC).unwrap_or(buf.len());
        return Some((Inbound::Other(buf[..len].to_vec()), len));
    }
    let command = *buf.get(1)?;
    match TelnetCommand::from_u8(command) {
        Some(TelnetCommand::WILL) => Some((Inbound::Will(*buf.get(2)?), 3)),
        Some(TelnetCommand::WONT) => Some((Inbound::Wont(*buf.get(2)?), 3)),
        Some(TelnetCommand::DO) => Some((Inbound::Do(*buf.get(2)?), 3)),
        Some(TelnetCommand::DONT) => Some((Inbound::Dont(*buf.get(2)?), 3)),
        Some(TelnetCommand::SB) => {
            let mut i = 2;
            while i + 1 < buf.len() {
                if buf[i] == IAC {
                    if buf[i + 1] == SE {
                        return Some((Inbound::Sub(unescape_iac(&buf[2..i])), i + 2));
                    }
                    i += 2;
                } else {
                    i += 1;
                }
            }
            None
        }
        _ => Some((Inbound::Other(buf[..2].to_vec()), 2)),
    }
}

/// Screen model implied by a terminal type such as `IBM-3278-4-E`.
fn model_from_terminal_type(terminal_type: &str) -> ScreenSize {
    terminal_type
        .split('-')
        .nth(2)
        .and_then(|model| model.parse::<u8>().ok())
        .and_then(ScreenSize::from_model_number)
        .unwrap_or(ScreenSize::Model2)
}

fn read_error(err: io::Error, operation: &str) -> TN3270Error {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TN3270Error::Timeout {
            operation: operation.to_string(),
            timeout_ms: NEGOTIATION_TIMEOUT.as_millis() as u64,
            audit: String::new(),
        },
        _ => TN3270Error::from(err),
    }
}

/// Listening socket that yields negotiated connections.
pub struct TnServer {
    listener: TcpListener,
}

impl TnServer {
    pub fn listen<A: ToSocketAddrs>(addr: A) -> TN3270Result<Self> {
        let listener = TcpListener::bind(addr).map_err(NetworkError::Io)?;
        if let Ok(local) = listener.local_addr() {
            log::info!("TN3270 server listening on {}", local);
        }
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> TN3270Result<SocketAddr> {
        Ok(self.listener.local_addr().map_err(NetworkError::Io)?)
    }

    /// Wait for a client and negotiate its session.
    pub fn accept(&self) -> TN3270Result<ServerConnection> {
        let (stream, peer) = self.listener.accept().map_err(NetworkError::Io)?;
        log::info!("client connected from {}", peer);
        ServerConnection::create_instance(stream)
    }
}

/// A negotiated client session.
#[derive(Debug)]
pub struct ServerConnection {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    terminal_type: String,
    tn3270e: bool,
    lu_name: Option<String>,
    functions: Vec<Tn3270eFunction>,
    model: ScreenSize,
    /// Bytes read but not yet parsed as a telnet unit
    inbuf: Vec<u8>,
    /// Bytes that belong to the 3270 data stream
    pending: Vec<u8>,
}

impl ServerConnection {
    /// Negotiate TN3270E, falling back to classic TN3270 when the client
    /// refuses it.
    pub fn create_instance(stream: TcpStream) -> TN3270Result<Self> {
        stream
            .set_read_timeout(Some(NEGOTIATION_TIMEOUT))
            .map_err(NetworkError::Io)?;
        stream.set_nodelay(true).map_err(NetworkError::Io)?;
        let mut connection = Self {
            peer: stream.peer_addr().ok(),
            stream,
            terminal_type: String::new(),
            tn3270e: false,
            lu_name: None,
            functions: Vec::new(),
            model: ScreenSize::Model2,
            inbuf: Vec::new(),
            pending: Vec::new(),
        };

        connection.send_command(TelnetCommand::DO, TelnetOption::Tn3270e)?;
        loop {
            match connection.next_inbound()? {
                Inbound::Will(option) if option == TelnetOption::Tn3270e as u8 => {
                    connection.negotiate_tn3270e()?;
                    break;
                }
                Inbound::Wont(option) if option == TelnetOption::Tn3270e as u8 => {
                    connection.negotiate_classic()?;
                    break;
                }
                other => connection.refuse(other)?,
            }
        }

        connection.model = model_from_terminal_type(&connection.terminal_type);
        connection.stream.set_read_timeout(None).map_err(NetworkError::Io)?;
        log::info!(
            "negotiated {} {} LU {}",
            if connection.tn3270e { "TN3270E" } else { "TN3270" },
            connection.terminal_type,
            connection.lu_name.as_deref().unwrap_or("(none)")
        );
        Ok(connection)
    }

    fn negotiate_tn3270e(&mut self) -> TN3270Result<()> {
        self.tn3270e = true;
        self.send_subnegotiation(TelnetOption::Tn3270e, &[TN3270E_SEND, TN3270E_DEVICE_TYPE])?;
        loop {
            match self.next_inbound()? {
                Inbound::Sub(body) if body.first() == Some(&(TelnetOption::Tn3270e as u8)) => {
                    match &body[1..] {
                        [TN3270E_DEVICE_TYPE, TN3270E_REQUEST, rest @ ..] => {
                            self.device_type_request(rest)?
                        }
                        [TN3270E_FUNCTIONS, TN3270E_REQUEST, list @ ..] => {
                            self.functions = functions_from_bytes(list)
                                .into_iter()
                                .filter(|f| SERVER_FUNCTIONS.contains(f))
                                .collect();
                            let mut reply = vec![TN3270E_FUNCTIONS, TN3270E_IS];
                            reply.extend(functions_to_bytes(&self.functions));
                            self.send_subnegotiation(TelnetOption::Tn3270e, &reply)?;
                            return Ok(());
                        }
                        _ => log::debug!("ignoring TN3270E subnegotiation {}", hex_dump(&body)),
                    }
                }
                other => self.refuse(other)?,
            }
        }
    }

    fn device_type_request(&mut self, rest: &[u8]) -> TN3270Result<()> {
        let (device, requested) = match rest.iter().position(|&b| b == TN3270E_CONNECT) {
            Some(split) => (&rest[..split], Some(&rest[split + 1..])),
            None => (rest, None),
        };
        self.terminal_type = String::from_utf8_lossy(device).into_owned();
        let lu = match requested {
            Some(lu) if !lu.is_empty() => String::from_utf8_lossy(lu).into_owned(),
            _ => format!("TNLU{:04}", NEXT_LU.fetch_add(1, Ordering::Relaxed)),
        };
        let mut reply = vec![TN3270E_DEVICE_TYPE, TN3270E_IS];
        reply.extend_from_slice(device);
        reply.push(TN3270E_CONNECT);
        reply.extend_from_slice(lu.as_bytes());
        self.lu_name = Some(lu);
        self.send_subnegotiation(TelnetOption::Tn3270e, &reply)
    }

    fn negotiate_classic(&mut self) -> TN3270Result<()> {
        self.send_command(TelnetCommand::DO, TelnetOption::TerminalType)?;
        loop {
            match self.next_inbound()? {
                Inbound::Will(option) if option == TelnetOption::TerminalType as u8 => {
                    self.send_subnegotiation(TelnetOption::TerminalType, &[TTYPE_SEND])?;
                }
                Inbound::Wont(option) if option == TelnetOption::TerminalType as u8 => {
                    return Err(TelnetError::NegotiationIncomplete {
                        detail: "client refused TERMINAL-TYPE".to_string(),
                    }
                    .into());
                }
                Inbound::Sub(body)
                    if body.first() == Some(&(TelnetOption::TerminalType as u8))
                        && body.get(1) == Some(&TTYPE_IS) =>
                {
                    let name = String::from_utf8_lossy(&body[2..]).into_owned();
                    let (terminal_type, lu) = match name.split_once('@') {
                        Some((terminal_type, lu)) => (terminal_type.to_string(), Some(lu.to_string())),
                        None => (name, None),
                    };
                    self.terminal_type = terminal_type;
                    self.lu_name = lu;
                    break;
                }
                other => self.refuse(other)?,
            }
        }
        for option in [TelnetOption::EndOfRecord, TelnetOption::Binary] {
            self.send_command(TelnetCommand::DO, option)?;
            self.send_command(TelnetCommand::WILL, option)?;
        }
        Ok(())
    }

    /// Turn down whatever the client offers outside the negotiation in
    /// progress. Stray data is kept for the screen decoder.
    fn refuse(&mut self, inbound: Inbound) -> TN3270Result<()> {
        match inbound {
            Inbound::Will(option) => self.write_all(&build_negotiation(TelnetCommand::DONT, option)),
            Inbound::Do(option) => self.write_all(&build_negotiation(TelnetCommand::WONT, option)),
            Inbound::Wont(_) | Inbound::Dont(_) => Ok(()),
            Inbound::Sub(body) => {
                log::debug!("ignoring subnegotiation {}", hex_dump(&body));
                Ok(())
            }
            Inbound::Other(raw) => {
                self.pending.extend_from_slice(&raw);
                Ok(())
            }
        }
    }

    fn next_inbound(&mut self) -> TN3270Result<Inbound> {
        loop {
            if let Some((inbound, used)) = parse_inbound(&self.inbuf) {
                self.inbuf.drain(..used);
                return Ok(inbound);
            }
            self.fill("negotiation")?;
        }
    }

    fn fill(&mut self, operation: &str) -> TN3270Result<()> {
        let mut buf = [0u8; 4096];
        let n = self.stream.read(&mut buf).map_err(|e| read_error(e, operation))?;
        if n == 0 {
            return Err(TN3270Error::ConnectionLost {
                reason: "client closed the connection".to_string(),
                audit: String::new(),
            });
        }
        log::trace!("RCVD {}", hex_dump(&buf[..n]));
        self.inbuf.extend_from_slice(&buf[..n]);
        Ok(())
    }

    fn send_command(&mut self, command: TelnetCommand, option: TelnetOption) -> TN3270Result<()> {
        log::debug!("SENT {} {}", command.name(), option.name());
        self.write_all(&build_negotiation(command, option as u8))
    }

    fn send_subnegotiation(&mut self, option: TelnetOption, data: &[u8]) -> TN3270Result<()> {
        log::debug!("SENT SB {} {}", option.name(), hex_dump(data));
        self.write_all(&build_subnegotiation(option as u8, data))
    }

    fn write_all(&mut self, bytes: &[u8]) -> TN3270Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn terminal_type(&self) -> &str {
        &self.terminal_type
    }

    pub fn is_tn3270e(&self) -> bool {
        self.tn3270e
    }

    pub fn lu_name(&self) -> Option<&str> {
        self.lu_name.as_deref()
    }

    pub fn functions(&self) -> &[Tn3270eFunction] {
        &self.functions
    }

    pub fn model(&self) -> ScreenSize {
        self.model
    }

    /// A blank screen sized and framed for this client.
    pub fn create_screen(&self) -> TNServerScreen {
        let mut screen = TNServerScreen::new(self.model);
        screen.set_tn3270e(self.tn3270e);
        screen
    }

    /// Erase/Write the screen and unlock the client keyboard.
    pub fn send(&mut self, screen: &TNServerScreen) -> TN3270Result<()> {
        self.send_with(screen, true, true)
    }

    pub fn send_with(&mut self, screen: &TNServerScreen, clear: bool, unlock: bool) -> TN3270Result<()> {
        let buffer = screen.as_tn3270_buffer(clear, unlock, self.tn3270e);
        log::debug!("sending screen ({} bytes)", buffer.len());
        self.write_all(&buffer)
    }

    /// Block until the client presses an AID key; the mirror is updated
    /// with whatever fields it sent.
    pub fn wait_for_key(&mut self, screen: &mut TNServerScreen) -> TN3270Result<String> {
        if let Some(key) = screen.next_key() {
            return Ok(key);
        }
        let mut data = std::mem::take(&mut self.pending);
        data.append(&mut self.inbuf);
        loop {
            if !data.is_empty() {
                if let Some(key) = screen.handle_tn3270_data(&data) {
                    return Ok(key);
                }
            }
            self.fill("wait for key")?;
            data = std::mem::take(&mut self.inbuf);
        }
    }

    pub fn close(&self) {
        if let Err(e) = self.stream.shutdown(std::net::Shutdown::Both) {
            log::debug!("shutdown of {:?} failed: {}", self.peer, e);
        }
    }
}
