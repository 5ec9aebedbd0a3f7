//! The sender: an event-loop actor that owns one gateway connection.
//!
//! All sender state (current connection, identifier counter, replay
//! bookkeeping) is mutated by a single task. Every other task, from the
//! per-connection read forwarders to the per-error requeue tasks and the
//! submitting caller, communicates with it through channels, so none of
//! that state needs a lock.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::{Backoff, BackoffPolicy};
use super::merge::PriorityMerge;
use crate::core::constants::EXPIRE_INTERVAL;
use crate::core::ConnectError;
use crate::notification::Notification;
use crate::transport::frame::{ErrorResponse, ResponseStatus};
use crate::transport::{host_of, Conn, Dial, ReadOutcome, TlsDialer, WriteOutcome};

/// A client-visible delivery failure.
///
/// One is emitted per notification that APNs explicitly rejected. Failures
/// the sender recovers from by itself (reconnects, replays) are never
/// surfaced.
#[derive(Debug, Clone)]
pub struct SenderError {
    /// The rejected notification.
    pub notification: Arc<Notification>,
    /// The error response naming it.
    pub response: ErrorResponse,
}

/// The sender has shut down and accepts no further notifications.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("sender is shut down")]
pub struct SenderClosed;

/// Sends notifications to one gateway address over a self-healing
/// connection.
///
/// Constructed with a cancellation context; cancelling it shuts the
/// sender down. Cloning is cheap and all clones submit to the same
/// sender.
#[derive(Debug, Clone)]
pub struct Sender {
    notif_tx: mpsc::Sender<Arc<Notification>>,
    done: CancellationToken,
}

impl Sender {
    /// Create a sender for `addr` (`host:port`), presenting the client TLS
    /// identity on every connection.
    ///
    /// Returns the sender and the channel on which delivery failures are
    /// emitted.
    pub fn new(
        ctx: CancellationToken,
        addr: impl Into<String>,
        tls: Arc<rustls::ClientConfig>,
    ) -> Result<(Self, mpsc::Receiver<SenderError>), ConnectError> {
        let addr = addr.into();
        let server_name = host_of(&addr)?.to_string();
        let dialer = Arc::new(TlsDialer::new(addr.clone(), server_name, tls));
        Ok(Self::with_dialer(ctx, addr, dialer))
    }

    /// Create a sender driven by an arbitrary dialer.
    pub(crate) fn with_dialer(
        ctx: CancellationToken,
        addr: String,
        dialer: Arc<dyn Dial>,
    ) -> (Self, mpsc::Receiver<SenderError>) {
        let (notif_tx, notif_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let (read_tx, read_rx) = mpsc::channel(1);
        let done = CancellationToken::new();

        let mut merge = PriorityMerge::new();
        merge.add(notif_rx);

        let job = SenderJob {
            addr,
            dialer,
            conn: None,
            next_identifier: 0,
            merge,
            error_tx,
            read_tx,
            read_rx,
            backoff: BackoffPolicy::default(),
            done: done.clone(),
        };
        tokio::spawn(job.run(ctx));

        (Self { notif_tx, done }, error_rx)
    }

    /// Submit a notification for delivery.
    ///
    /// An identifier is assigned automatically if none was set. The call
    /// only backpressures while the sender is replaying a failed
    /// connection's tail.
    pub async fn send(&self, notification: Notification) -> Result<(), SenderClosed> {
        self.notif_tx
            .send(Arc::new(notification))
            .await
            .map_err(|_| SenderClosed)
    }

    /// Token cancelled once the sender has fully shut down.
    pub fn done(&self) -> CancellationToken {
        self.done.clone()
    }
}

/// A read produced by one of the sender's connections.
struct ReadEvent {
    conn: Arc<dyn Conn>,
    outcome: ReadOutcome,
}

/// The single-owner event loop behind a [`Sender`].
struct SenderJob {
    addr: String,
    dialer: Arc<dyn Dial>,
    conn: Option<Arc<dyn Conn>>,
    next_identifier: u32,
    merge: PriorityMerge<Arc<Notification>>,
    error_tx: mpsc::Sender<SenderError>,
    read_tx: mpsc::Sender<ReadEvent>,
    read_rx: mpsc::Receiver<ReadEvent>,
    backoff: BackoffPolicy,
    done: CancellationToken,
}

impl SenderJob {
    async fn run(mut self, ctx: CancellationToken) {
        let mut expire = interval_at(Instant::now() + EXPIRE_INTERVAL, EXPIRE_INTERVAL);
        expire.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    if let Some(conn) = self.conn.take() {
                        conn.close();
                    }
                    self.merge.close();
                    self.done.cancel();
                    return;
                }
                Some(event) = self.read_rx.recv() => self.handle_read(event).await,
                Some(notification) = self.merge.recv() => {
                    debug!(identifier = ?notification.identifier(), "sending notification");
                    self.send_notification(notification, &ctx).await;
                }
                _ = expire.tick() => {
                    if let Some(conn) = &self.conn {
                        conn.expire_sent();
                    }
                }
            }
        }
    }

    /// Write one notification, reconnecting and retrying for as long as
    /// the failures are connection-level.
    async fn send_notification(&mut self, notification: Arc<Notification>, ctx: &CancellationToken) {
        let notification = self.assign_identifier(notification);

        loop {
            self.connect(ctx).await;
            let Some(conn) = self.conn.clone() else {
                // Cancelled while connecting; the notification is dropped
                // with the rest of the shutdown.
                return;
            };

            match conn.write(&notification).await {
                WriteOutcome::Written => return,
                WriteOutcome::Connection(err) => {
                    warn!(
                        identifier = ?notification.identifier(),
                        error = %err,
                        "failed sending notification; will retry",
                    );
                    conn.close();
                    self.conn = None;
                }
                WriteOutcome::Notification(err) => {
                    warn!(
                        identifier = ?notification.identifier(),
                        error = %err,
                        "dropping unsendable notification",
                    );
                    return;
                }
            }
        }
    }

    fn assign_identifier(&mut self, notification: Arc<Notification>) -> Arc<Notification> {
        if notification.identifier().is_some() {
            return notification;
        }

        let mut owned =
            Arc::try_unwrap(notification).unwrap_or_else(|shared| (*shared).clone());
        owned.set_identifier(self.next_identifier);
        self.next_identifier = self.next_identifier.wrapping_add(1);
        Arc::new(owned)
    }

    /// Process a read produced by the current (or a previous) connection.
    ///
    /// The connection is retired, at most one [`SenderError`] is surfaced,
    /// and the unconfirmed tail of its replay buffer is requeued ahead of
    /// all pending submissions.
    async fn handle_read(&mut self, event: ReadEvent) {
        let ReadEvent { conn, outcome } = event;

        conn.close();
        if let Some(current) = &self.conn {
            if Arc::ptr_eq(current, &conn) {
                self.conn = None;
            }
        }

        let mut confirmed = None;
        match outcome {
            ReadOutcome::Response(response) => {
                match conn.sent_notification(response.identifier) {
                    None => warn!(
                        identifier = response.identifier,
                        status = %response.status,
                        "got a response for an unknown notification",
                    ),
                    Some(notification) => {
                        debug!(
                            identifier = response.identifier,
                            status = %response.status,
                            "got an error response",
                        );
                        if response.status != ResponseStatus::SHUTDOWN {
                            let failure = SenderError {
                                notification: Arc::clone(&notification),
                                response,
                            };
                            let _ = self.error_tx.send(failure).await;
                        }
                        confirmed = Some(notification);
                    }
                }
            }
            ReadOutcome::Disconnected => {
                warn!(
                    addr = %self.addr,
                    "connection ended without a response; replaying all unexpired notifications",
                );
            }
        }

        let tail = match &confirmed {
            Some(notification) => conn.sent_after(notification.identifier().unwrap_or(0)),
            None => conn.sent_all(),
        };
        if tail.is_empty() {
            return;
        }

        // The requeue source goes on top of the merge before anything is
        // written to it, so the tail precedes all pending submissions.
        let (requeue_tx, requeue_rx) = mpsc::channel(1);
        self.merge.add(requeue_rx);

        tokio::spawn(async move {
            for notification in tail {
                debug!(identifier = ?notification.identifier(), "requeuing notification");
                if requeue_tx.send(notification).await.is_err() {
                    return;
                }
            }
        });
    }

    /// Block until a connection exists, dialing under exponential backoff.
    ///
    /// Returns with `self.conn` still unset only when `ctx` is cancelled.
    async fn connect(&mut self, ctx: &CancellationToken) {
        while self.conn.is_none() {
            if ctx.is_cancelled() {
                return;
            }

            let mut backoff = Backoff::new(self.backoff);
            loop {
                debug!(addr = %self.addr, "connecting to gateway");
                match self.dialer.dial().await {
                    Ok(conn) => {
                        info!(addr = %self.addr, "connected to gateway");
                        tokio::spawn(forward_read(Arc::clone(&conn), self.read_tx.clone()));
                        self.conn = Some(conn);
                        break;
                    }
                    Err(err) => {
                        warn!(
                            addr = %self.addr,
                            error = %err,
                            "failed connecting to gateway; will retry",
                        );
                        // A spent round is followed by a fresh one: the
                        // sender never stops trying to reconnect.
                        let Some(delay) = backoff.next_interval() else {
                            break;
                        };
                        tokio::select! {
                            _ = ctx.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Forward a connection's single read outcome to the sender job.
///
/// Exits without forwarding once the connection is closed.
async fn forward_read(conn: Arc<dyn Conn>, read_tx: mpsc::Sender<ReadEvent>) {
    let done = conn.done();
    tokio::select! {
        biased;
        _ = done.cancelled() => {}
        outcome = conn.read() => {
            if let Some(outcome) = outcome {
                let _ = read_tx.send(ReadEvent { conn, outcome }).await;
            }
        }
    }
}
