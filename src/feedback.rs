//! Feedback-service reader.
//!
//! The feedback service is a separate, one-shot protocol: connect with
//! the same TLS identity, read consecutive unsubscription records until
//! the gateway closes the stream, reconnect after a pause. Each record is
//! `unsubscribe-time (4B BE) | token-length (2B BE) | token bytes`.

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::constants::FEEDBACK_CHECK_PERIOD;
use crate::core::ConnectError;
use crate::transport::host_of;

/// One unsubscription record from the feedback service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    /// When the device unsubscribed.
    pub unsubscribed_at: SystemTime,
    /// The device token, as a lowercase hex string.
    pub device_token: String,
}

/// Start reading the feedback gateway at `addr` (`host:port`), presenting
/// the client TLS identity.
///
/// Returns the channel on which unsubscription records arrive. The reader
/// polls until `ctx` is cancelled.
pub fn feedback_messages(
    ctx: CancellationToken,
    addr: impl Into<String>,
    tls: Arc<rustls::ClientConfig>,
) -> Result<mpsc::Receiver<FeedbackMessage>, ConnectError> {
    let addr = addr.into();
    let server_name = host_of(&addr)?.to_string();

    let (messages_tx, messages_rx) = mpsc::channel(1);
    tokio::spawn(poll(ctx, addr, server_name, tls, messages_tx));

    Ok(messages_rx)
}

/// Connect, drain the stream, sleep, repeat.
async fn poll(
    ctx: CancellationToken,
    addr: String,
    server_name: String,
    tls: Arc<rustls::ClientConfig>,
    messages_tx: mpsc::Sender<FeedbackMessage>,
) {
    loop {
        tokio::select! {
            _ = ctx.cancelled() => return,
            result = receive(&addr, &server_name, &tls, &messages_tx) => {
                match result {
                    Ok(()) => debug!(addr = %addr, "feedback stream drained"),
                    Err(err) => warn!(addr = %addr, error = %err, "feedback receive failed; will retry"),
                }
            }
        }

        tokio::select! {
            _ = ctx.cancelled() => return,
            _ = tokio::time::sleep(FEEDBACK_CHECK_PERIOD) => {}
        }
    }
}

/// Read one connection's worth of records.
async fn receive(
    addr: &str,
    server_name: &str,
    tls: &Arc<rustls::ClientConfig>,
    messages_tx: &mpsc::Sender<FeedbackMessage>,
) -> io::Result<()> {
    debug!(addr = %addr, "connecting to feedback gateway");
    let tcp = TcpStream::connect(addr).await?;
    let name = rustls::pki_types::ServerName::try_from(server_name.to_string())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let mut stream = TlsConnector::from(Arc::clone(tls)).connect(name, tcp).await?;
    info!(addr = %addr, "connected to feedback gateway");

    read_records(&mut stream, messages_tx).await
}

/// Read records until EOF, forwarding each as a [`FeedbackMessage`].
async fn read_records<R>(
    reader: &mut R,
    messages_tx: &mpsc::Sender<FeedbackMessage>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut header = [0u8; 6];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }

        let unsubscribed = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let token_len = u16::from_be_bytes([header[4], header[5]]) as usize;

        let mut token = vec![0u8; token_len];
        reader.read_exact(&mut token).await?;

        let message = FeedbackMessage {
            unsubscribed_at: UNIX_EPOCH + Duration::from_secs(unsubscribed as u64),
            device_token: hex::encode(token),
        };
        debug!(token = %message.device_token, "feedback record received");

        if messages_tx.send(message).await.is_err() {
            return Ok(());
        }
    }
}
