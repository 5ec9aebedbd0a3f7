//! Transport layer: wire framing, TLS connections and replay bookkeeping.
//!
//! This module implements everything between a [`Notification`] and the
//! gateway socket:
//!
//! - **Frame codec**: [`frame`] encodes the v2 push frame and decodes the
//!   6-byte error response.
//! - **Replay buffer**: per-connection record of written notifications,
//!   consulted when the gateway reports a failure.
//! - **Connections**: one TLS stream plus its replay buffer and a
//!   single-shot error-response reader.
//! - **TLS identity**: [`ClientIdentity`] loads the client certificate
//!   material every connection presents.
//!
//! [`Notification`]: crate::notification::Notification

pub mod frame;

mod conn;
mod replay;
mod tls;

pub use tls::ClientIdentity;

pub(crate) use conn::{host_of, Conn, Dial, ReadOutcome, TlsDialer, WriteOutcome};
#[cfg(test)]
pub(crate) use replay::ReplayBuffer;
