//! Gateway connections.
//!
//! A connection owns one mutually authenticated TLS stream plus the replay
//! buffer of notifications written to it. APNs only ever sends bytes on
//! failure and closes the stream right after, so each connection runs a
//! single-shot reader that produces at most one [`ReadOutcome`].

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::frame::{self, ErrorResponse};
use super::replay::ReplayBuffer;
use crate::core::constants::{ERROR_RESPONSE_LEN, REPLAY_WINDOW, WRITE_TIMEOUT};
use crate::core::{ConnectError, EncodeError};
use crate::notification::Notification;

/// Result of writing one notification to a connection.
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    /// The frame was fully written and the notification recorded.
    Written,
    /// Connection-level failure. The caller must drop this connection and
    /// retry the notification on a fresh one.
    Connection(io::Error),
    /// Notification-level failure. The notification can never be sent, on
    /// this connection or any other.
    Notification(EncodeError),
}

/// Result of the connection's single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// APNs sent an error response before closing.
    Response(ErrorResponse),
    /// The connection ended without an APNs-level error (EOF, short read
    /// or any other I/O failure).
    Disconnected,
}

/// One gateway connection and its replay bookkeeping.
///
/// Mirrors the sender's view of a connection so tests can drive the sender
/// with scripted connections.
#[async_trait]
pub(crate) trait Conn: Send + Sync {
    /// Encode and write one notification, recording it on success.
    async fn write(&self, notification: &Arc<Notification>) -> WriteOutcome;

    /// Wait for the connection's single read outcome.
    ///
    /// Returns `None` if the connection was closed before anything was
    /// read.
    async fn read(&self) -> Option<ReadOutcome>;

    /// Token cancelled when the connection is closed.
    fn done(&self) -> CancellationToken;

    /// Close the connection. Idempotent.
    fn close(&self);

    /// Look up a sent notification by identifier.
    fn sent_notification(&self, identifier: u32) -> Option<Arc<Notification>>;

    /// Get all sent notifications strictly after `identifier`, or all of
    /// them if the identifier is unknown.
    fn sent_after(&self, identifier: u32) -> Vec<Arc<Notification>>;

    /// Get all sent notifications in write order.
    fn sent_all(&self) -> Vec<Arc<Notification>>;

    /// Drop expired entries from the replay buffer.
    fn expire_sent(&self);
}

/// Connection construction, abstracted so the sender's reconnect loop can
/// be driven by mock connections in tests.
#[async_trait]
pub(crate) trait Dial: Send + Sync {
    /// Establish a new gateway connection.
    async fn dial(&self) -> Result<Arc<dyn Conn>, ConnectError>;
}

/// A live TLS connection to the gateway.
pub(crate) struct TlsConn {
    writer: tokio::sync::Mutex<WriteHalf<TlsStream<TcpStream>>>,
    sent: Mutex<ReplayBuffer>,
    read_rx: tokio::sync::Mutex<mpsc::Receiver<ReadOutcome>>,
    done: CancellationToken,
}

impl TlsConn {
    /// Dial `addr`, perform the TLS handshake presenting the client
    /// certificate, and spawn the single-shot reader.
    ///
    /// `server_name` is the gateway hostname, which must be presented even
    /// when `addr` carries a resolved IP.
    pub(crate) async fn connect(
        addr: &str,
        server_name: &str,
        tls: Arc<rustls::ClientConfig>,
    ) -> Result<Self, ConnectError> {
        let tcp = TcpStream::connect(addr).await?;

        let name = rustls::pki_types::ServerName::try_from(server_name.to_string())?;
        let stream = TlsConnector::from(tls).connect(name, tcp).await?;

        let (reader, writer) = tokio::io::split(stream);
        let done = CancellationToken::new();
        let (read_tx, read_rx) = mpsc::channel(1);
        tokio::spawn(read_response(reader, read_tx, done.clone()));

        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            sent: Mutex::new(ReplayBuffer::new(REPLAY_WINDOW)),
            read_rx: tokio::sync::Mutex::new(read_rx),
            done,
        })
    }
}

#[async_trait]
impl Conn for TlsConn {
    async fn write(&self, notification: &Arc<Notification>) -> WriteOutcome {
        let frame = match frame::encode_notification(notification) {
            Ok(frame) => frame,
            Err(err) => return WriteOutcome::Notification(err),
        };

        let mut writer = self.writer.lock().await;
        let written = timeout(WRITE_TIMEOUT, async {
            writer.write_all(&frame).await?;
            writer.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => {
                self.sent.lock().add(Arc::clone(notification));
                WriteOutcome::Written
            }
            Ok(Err(err)) => WriteOutcome::Connection(err),
            Err(_) => WriteOutcome::Connection(io::Error::new(
                io::ErrorKind::TimedOut,
                "write deadline exceeded",
            )),
        }
    }

    async fn read(&self) -> Option<ReadOutcome> {
        self.read_rx.lock().await.recv().await
    }

    fn done(&self) -> CancellationToken {
        self.done.clone()
    }

    fn close(&self) {
        self.done.cancel();
    }

    fn sent_notification(&self, identifier: u32) -> Option<Arc<Notification>> {
        self.sent.lock().get(identifier)
    }

    fn sent_after(&self, identifier: u32) -> Vec<Arc<Notification>> {
        self.sent.lock().get_all_after(identifier)
    }

    fn sent_all(&self) -> Vec<Arc<Notification>> {
        self.sent.lock().get_all()
    }

    fn expire_sent(&self) {
        self.sent.lock().expire();
    }
}

/// Read exactly one error response, or report the connection as dropped.
///
/// Exits without publishing anything if the connection is closed first.
async fn read_response<R>(
    mut reader: ReadHalf<R>,
    read_tx: mpsc::Sender<ReadOutcome>,
    done: CancellationToken,
) where
    R: AsyncRead + Send + 'static,
{
    let mut buf = [0u8; ERROR_RESPONSE_LEN];

    let outcome = tokio::select! {
        _ = done.cancelled() => return,
        result = reader.read_exact(&mut buf) => match result {
            Ok(_) => match ErrorResponse::decode(&buf) {
                Ok(response) => ReadOutcome::Response(response),
                Err(_) => ReadOutcome::Disconnected,
            },
            Err(err) => {
                debug!(error = %err, "connection read ended without a response");
                ReadOutcome::Disconnected
            }
        },
    };

    let _ = read_tx.send(outcome).await;
}

/// Dials TLS connections to one gateway address.
pub(crate) struct TlsDialer {
    addr: String,
    server_name: String,
    tls: Arc<rustls::ClientConfig>,
}

impl TlsDialer {
    /// Create a dialer for `addr`, presenting `server_name` in the TLS
    /// handshake.
    pub(crate) fn new(
        addr: impl Into<String>,
        server_name: impl Into<String>,
        tls: Arc<rustls::ClientConfig>,
    ) -> Self {
        Self {
            addr: addr.into(),
            server_name: server_name.into(),
            tls,
        }
    }
}

#[async_trait]
impl Dial for TlsDialer {
    async fn dial(&self) -> Result<Arc<dyn Conn>, ConnectError> {
        let conn = TlsConn::connect(&self.addr, &self.server_name, Arc::clone(&self.tls)).await?;
        Ok(Arc::new(conn))
    }
}

/// Split a `host:port` address into its host portion.
pub(crate) fn host_of(addr: &str) -> Result<&str, ConnectError> {
    match addr.rsplit_once(':') {
        Some((host, _port)) if !host.is_empty() => Ok(host),
        _ => Err(ConnectError::InvalidAddress(addr.to_string())),
    }
}
