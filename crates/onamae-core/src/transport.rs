// # Transport
//
// Owns the single encrypted byte stream to the registrar.
//
// ## Layers
//
// - [`Transport`]: raw async byte I/O (write, read, shutdown)
// - [`Session`]: one open transport, with deadline-bounded reads and an
//   idempotent `close()`
// - [`Connector`]: opens sessions; [`TlsConnector`] is the production one
//
// No retries happen here. Every failure goes back to the caller.

use crate::config::Endpoint;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, RootCertStore};
use tracing::debug;

/// Size of a single read from the transport
const READ_CHUNK: usize = 1024;

/// Raw byte I/O underneath a [`Session`]
#[async_trait]
pub trait Transport: Send {
    /// Write every byte and flush
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read whatever is available; `Ok(0)` means the peer closed the stream
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Shut the stream down
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// [`Transport`] over any tokio byte stream
pub struct StreamTransport<S> {
    stream: S,
}

impl<S> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

/// An open stream to the registrar
///
/// A session belongs to exactly one workflow execution. `close()` may be
/// called any number of times; only the first call touches the stream.
pub struct Session {
    transport: Option<Box<dyn Transport>>,
    peer: String,
}

impl Session {
    /// Wrap an already connected transport
    pub fn new(transport: Box<dyn Transport>, peer: impl Into<String>) -> Self {
        Self {
            transport: Some(transport),
            peer: peer.into(),
        }
    }

    /// Remote address, for logging
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether `close()` has already run
    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "session already closed",
            ))
        })
    }

    /// Send bytes to the peer
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport()?.write_all(bytes).await?;
        Ok(())
    }

    /// Read until `predicate` accepts the captured text or `deadline` expires
    ///
    /// The predicate sees the captured text (lossily decoded) starting at
    /// the first line it has not yet rejected, and whether the peer has
    /// closed the stream. Lines it has seen complete are not offered again.
    /// Capture starts empty on every call.
    ///
    /// # Errors
    ///
    /// - `Error::Timeout` carrying the partial text if the deadline expires
    /// - `Error::Io` if reading fails or the peer closes without a match
    pub async fn read_until<F, T>(&mut self, mut predicate: F, deadline: Duration) -> Result<T>
    where
        F: FnMut(&str, bool) -> Option<T>,
    {
        let expires = Instant::now() + deadline;
        let transport = self.transport()?;
        let mut captured: Vec<u8> = Vec::new();
        // Start of the first line the predicate has not rejected
        let mut scanned = 0;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let read = match tokio::time::timeout_at(expires, transport.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => {
                    return Err(Error::Timeout {
                        partial: String::from_utf8_lossy(&captured).into_owned(),
                        after: deadline,
                    });
                }
            };

            let eof = read == 0;
            captured.extend_from_slice(&chunk[..read]);
            let pending = String::from_utf8_lossy(&captured[scanned..]);

            if let Some(found) = predicate(pending.as_ref(), eof) {
                return Ok(found);
            }

            if eof {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "connection closed before a status line (captured {:?})",
                        String::from_utf8_lossy(&captured)
                    ),
                )));
            }

            if let Some(newline) = captured[scanned..].iter().rposition(|&b| b == b'\n') {
                scanned += newline + 1;
            }
        }
    }

    /// Release the stream
    ///
    /// Never fails: shutdown errors are logged and swallowed, and closing a
    /// closed session is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match transport.shutdown().await {
                Ok(()) => debug!("Session to {} closed", self.peer),
                Err(e) => debug!("Session to {} closed with error: {}", self.peer, e),
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transport.is_some() {
            debug!("Session to {} dropped without close, releasing stream", self.peer);
        }
    }
}

/// Opens sessions to the registrar
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session
    ///
    /// # Errors
    ///
    /// `Error::Connection` if the endpoint cannot be reached or the
    /// handshake fails.
    async fn open(&self) -> Result<Session>;
}

/// Production connector: TCP plus TLS verified against the webpki roots
pub struct TlsConnector {
    endpoint: Endpoint,
    tls_config: Arc<rustls::ClientConfig>,
}

impl TlsConnector {
    /// Create a connector for the given endpoint
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::config(format!("TLS setup failed: {}", e)))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            endpoint,
            tls_config: Arc::new(tls_config),
        })
    }

    /// Endpoint this connector dials
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn open(&self) -> Result<Session> {
        let server_name = ServerName::try_from(self.endpoint.host.clone()).map_err(|_| {
            Error::Connection(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid DNS name: {}", self.endpoint.host),
            ))
        })?;

        debug!("Connecting to {}", self.endpoint);
        let tcp = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .await
            .map_err(Error::Connection)?;

        let tls = tokio_rustls::TlsConnector::from(self.tls_config.clone())
            .connect(server_name, tcp)
            .await
            .map_err(Error::Connection)?;

        Ok(Session::new(
            Box::new(StreamTransport::new(tls)),
            self.endpoint.to_string(),
        ))
    }
}
