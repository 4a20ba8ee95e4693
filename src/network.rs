//! TCP and TLS transport for host connections
//!
//! [`NetworkConnection`] opens the socket, optionally wraps it in rustls, and
//! starts a reader thread that pushes [`TransportEvent`]s onto a channel. The
//! write half is the [`Transport`] implementation the emulator sends through.
//! Reader and writers share the stream behind a mutex; the reader holds it
//! only for one short timed read at a time.

use std::fs;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use base64::Engine;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::config::SessionConfig;
use crate::error::{NetworkError, NetworkResult};
use crate::protocol_common::traits::Transport;

const MAX_READ_SIZE: usize = 8192;
/// How long the reader holds the stream before letting a writer in
const READ_POLL: Duration = Duration::from_millis(50);
/// Refuse CA bundles larger than this
const MAX_CA_BUNDLE: u64 = 10_000_000;

/// What the reader thread reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Data(Vec<u8>),
    /// The connection ended; the reason is absent for a local close
    Closed(Option<String>),
}

enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Stream::Plain(tcp) => tcp,
            Stream::Tls(tls) => tls.get_ref(),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(tcp) => tcp.read(buf),
            Stream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(tcp) => tcp.write(buf),
            Stream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(tcp) => tcp.flush(),
            Stream::Tls(tls) => tls.flush(),
        }
    }
}

type SharedStream = Arc<Mutex<Stream>>;

fn lock_stream(stream: &SharedStream) -> MutexGuard<'_, Stream> {
    match stream.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("stream mutex poisoned, continuing");
            poisoned.into_inner()
        }
    }
}

/// An open connection to a TN3270 host
pub struct NetworkConnection {
    stream: SharedStream,
    open: Arc<AtomicBool>,
    host: String,
    port: u16,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for NetworkConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("open", &self.is_open())
            .finish()
    }
}

impl NetworkConnection {
    /// Connect as configured and start the reader. Received data arrives on
    /// the returned channel in order, followed by one `Closed`.
    pub fn connect(config: &SessionConfig) -> NetworkResult<(Self, mpsc::Receiver<TransportEvent>)> {
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let tcp = connect_tcp(&config.host, config.port, timeout)?;
        tcp.set_nodelay(true).map_err(NetworkError::Io)?;

        let stream = if config.use_tls {
            let tls_config = build_tls_config(config.ca_bundle_path.as_deref().map(Path::new))?;
            let mut tls = wrap_tls(tls_config, &config.host, tcp)?;
            // Drive the handshake now so certificate errors surface here
            tls.get_ref()
                .set_read_timeout(Some(timeout))
                .map_err(NetworkError::Io)?;
            while tls.conn.is_handshaking() {
                tls.conn
                    .complete_io(&mut tls.sock)
                    .map_err(|e| NetworkError::Tls {
                        message: e.to_string(),
                    })?;
            }
            log::info!("TLS established with {}:{}", config.host, config.port);
            Stream::Tls(Box::new(tls))
        } else {
            Stream::Plain(tcp)
        };
        stream
            .tcp()
            .set_read_timeout(Some(READ_POLL))
            .map_err(NetworkError::Io)?;

        let (tx, rx) = mpsc::channel();
        let mut connection = Self {
            stream: Arc::new(Mutex::new(stream)),
            open: Arc::new(AtomicBool::new(true)),
            host: config.host.clone(),
            port: config.port,
            reader: None,
        };
        connection.start_receive_thread(tx);
        log::info!("connected to {}:{}", connection.host, connection.port);
        Ok((connection, rx))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn start_receive_thread(&mut self, sender: mpsc::Sender<TransportEvent>) {
        let shared = Arc::clone(&self.stream);
        let open = Arc::clone(&self.open);
        let name = format!("tn3270-reader-{}", self.host);
        let spawned = thread::Builder::new().name(name).spawn(move || {
            let mut buffer = [0u8; MAX_READ_SIZE];
            let reason = loop {
                if !open.load(Ordering::SeqCst) {
                    break None;
                }
                let result = lock_stream(&shared).read(&mut buffer);
                match result {
                    Ok(0) if open.load(Ordering::SeqCst) => {
                        break Some("connection closed by host".to_string())
                    }
                    Ok(0) => break None,
                    Ok(n) => {
                        if sender.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                            break None;
                        }
                    }
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock
                                | io::ErrorKind::TimedOut
                                | io::ErrorKind::Interrupted
                        ) =>
                    {
                        // Give a waiting writer the lock
                        thread::yield_now();
                    }
                    Err(e) => {
                        if open.load(Ordering::SeqCst) {
                            break Some(e.to_string());
                        }
                        break None;
                    }
                }
            };
            open.store(false, Ordering::SeqCst);
            log::debug!("reader thread finished: {:?}", reason);
            let _ = sender.send(TransportEvent::Closed(reason));
        });
        match spawned {
            Ok(handle) => self.reader = Some(handle),
            Err(e) => {
                log::error!("could not start reader thread: {}", e);
                self.open.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl Transport for NetworkConnection {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        let mut stream = lock_stream(&self.stream);
        stream.write_all(data)?;
        stream.flush()
    }

    fn close(&mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let stream = lock_stream(&self.stream);
            if let Err(e) = stream.tcp().shutdown(Shutdown::Both) {
                log::debug!("shutdown: {}", e);
            }
        }
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::warn!("reader thread panicked");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for NetworkConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve and connect, trying each address in turn.
pub fn connect_tcp(host: &str, port: u16, timeout: Duration) -> NetworkResult<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| NetworkError::DnsResolution {
            host: host.to_string(),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(NetworkError::DnsResolution {
            host: host.to_string(),
        });
    }

    let mut last_error = None;
    for addr in &addrs {
        log::debug!("connecting to {}", addr);
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    let err = last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no address"));
    Err(match err.kind() {
        io::ErrorKind::ConnectionRefused => NetworkError::ConnectionRefused {
            host: host.to_string(),
            port,
        },
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetworkError::ConnectTimeout {
            host: host.to_string(),
            port,
            timeout_ms: timeout.as_millis() as u64,
        },
        _ => NetworkError::Io(err),
    })
}

fn wrap_tls(
    config: Arc<ClientConfig>,
    host: &str,
    tcp: TcpStream,
) -> NetworkResult<StreamOwned<ClientConnection, TcpStream>> {
    let server_name = ServerName::try_from(host)
        .map_err(|e| NetworkError::Tls {
            message: format!("invalid server name {}: {}", host, e),
        })?
        .to_owned();
    let connection = ClientConnection::new(config, server_name).map_err(|e| NetworkError::Tls {
        message: e.to_string(),
    })?;
    Ok(StreamOwned::new(connection, tcp))
}

/// Client TLS settings: the bundled webpki roots, the platform store and
/// an optional extra CA bundle. Certificate validation is always on.
pub fn build_tls_config(ca_bundle: Option<&Path>) -> NetworkResult<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = roots.add_parsable_certificates(certs);
            log::debug!("platform roots: {} added, {} ignored", added, ignored);
        }
        Err(e) => log::warn!("could not load platform certificates: {}", e),
    }

    if let Some(path) = ca_bundle {
        let certs = load_ca_bundle(path)?;
        let (added, _) = roots.add_parsable_certificates(certs);
        if added == 0 {
            return Err(NetworkError::Tls {
                message: format!("no usable certificates in {}", path.display()),
            });
        }
        log::info!("added {} CA certificates from {}", added, path.display());
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Read a CA file: PEM with one or more certificates, or a single DER one.
pub fn load_ca_bundle(path: &Path) -> NetworkResult<Vec<CertificateDer<'static>>> {
    let size = fs::metadata(path).map_err(NetworkError::Io)?.len();
    if size > MAX_CA_BUNDLE {
        return Err(NetworkError::Tls {
            message: format!("CA bundle {} is too large", path.display()),
        });
    }
    let bytes = fs::read(path).map_err(NetworkError::Io)?;
    match std::str::from_utf8(&bytes) {
        Ok(text) if text.contains(PEM_BEGIN) => parse_pem_certificates(text),
        _ => Ok(vec![CertificateDer::from(bytes)]),
    }
}

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Decode every CERTIFICATE block in a PEM text.
pub fn parse_pem_certificates(text: &str) -> NetworkResult<Vec<CertificateDer<'static>>> {
    let mut certs = Vec::new();
    let mut rest = text;
    while let Some(begin) = rest.find(PEM_BEGIN) {
        let body_start = begin + PEM_BEGIN.len();
        let Some(end) = rest[body_start..].find(PEM_END) else {
            return Err(NetworkError::Tls {
                message: "unterminated PEM certificate".to_string(),
            });
        };
        let body: String = rest[body_start..body_start + end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(body.as_bytes())
            .map_err(|e| NetworkError::Tls {
                message: format!("bad base64 in PEM certificate: {}", e),
            })?;
        certs.push(CertificateDer::from(der));
        rest = &rest[body_start + end + PEM_END.len()..];
    }
    if certs.is_empty() {
        return Err(NetworkError::Tls {
            message: "no certificates found in PEM text".to_string(),
        });
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_parse_pem_certificates() {
        let pem = "junk\n-----BEGIN CERTIFICATE-----\nAQID\nBA==\n-----END CERTIFICATE-----\n\
                   -----BEGIN CERTIFICATE-----\nBQY=\n-----END CERTIFICATE-----\n";
        let certs = parse_pem_certificates(pem).unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].as_ref(), &[1, 2, 3, 4]);
        assert_eq!(certs[1].as_ref(), &[5, 6]);
    }

    #[test]
    fn test_parse_pem_rejects_bad_input() {
        assert!(parse_pem_certificates("nothing here").is_err());
        assert!(parse_pem_certificates("-----BEGIN CERTIFICATE-----\nAQID").is_err());
        assert!(parse_pem_certificates(
            "-----BEGIN CERTIFICATE-----\n!!!\n-----END CERTIFICATE-----"
        )
        .is_err());
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let result = connect_tcp("127.0.0.1", port, Duration::from_secs(2));
        assert!(matches!(
            result,
            Err(NetworkError::ConnectionRefused { .. }) | Err(NetworkError::Io(_))
        ));
    }

    #[test]
    fn test_reader_delivers_data_then_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&[0xFF, 0xFD, 0x28]).unwrap();
            let mut reply = [0u8; 3];
            socket.read_exact(&mut reply).unwrap();
            reply
        });

        let config = SessionConfig::new("127.0.0.1", port);
        let (mut connection, events) = NetworkConnection::connect(&config).unwrap();
        let first = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, TransportEvent::Data(vec![0xFF, 0xFD, 0x28]));
        connection.send(&[0xFF, 0xFB, 0x28]).unwrap();
        assert_eq!(server.join().unwrap(), [0xFF, 0xFB, 0x28]);

        let closed = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(closed, TransportEvent::Closed(Some(_))));
        assert!(!connection.is_open());
        assert!(connection.send(&[0]).is_err());
    }
}
