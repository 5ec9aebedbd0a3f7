//! # APNs binary-protocol client
//!
//! A long-running client for Apple's legacy binary Push Notification
//! Service. Notifications are framed in the v2 "enhanced" wire format and
//! written over mutually authenticated TLS to a gateway that only ever
//! answers on failure, then hangs up. The hard part is not sending; it is
//! coping with what the protocol does after an error:
//!
//! - **Replay**: every connection records what it wrote; when the gateway
//!   rejects a notification, everything written after it is retransmitted
//!   on a fresh connection, ahead of new traffic.
//! - **Reconnection**: connections are re-established under exponential
//!   backoff, indefinitely.
//! - **Error surfacing**: only failures APNs explicitly acknowledged are
//!   reported to the client; connection-level trouble is handled
//!   internally.
//!
//! ## Modules
//!
//! - [`core`]: constants and error types
//! - [`notification`]: the notification data model
//! - [`transport`]: frame codec, TLS connections, replay bookkeeping
//! - [`sender`]: the event-loop sender pipeline
//! - [`gateway`]: façade over one or more senders
//! - [`feedback`]: the feedback-service reader
//!
//! ## Example
//!
//! ```no_run
//! use apns::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), apns::ApnsError> {
//! let ctx = CancellationToken::new();
//! let gateway = Gateway::new_sandbox(ctx.clone(), "apns-cert.pem", "apns-key.pem").await?;
//!
//! gateway.on_error(|failure| {
//!     eprintln!(
//!         "notification {:?} rejected: {}",
//!         failure.notification.identifier(),
//!         failure.response.status,
//!     );
//! });
//!
//! let mut notification = Notification::new();
//! notification.set_device_token(
//!     "6f3031f2828aa1a369c78d3216be4b7c40ca7a8728a6a8d3e6229afc437b4ef1",
//! );
//! notification.payload_mut().set_alert_string("Hello");
//! let _ = gateway.send(notification).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod feedback;
pub mod gateway;
pub mod notification;
pub mod sender;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        ApnsError, ConnectError, EncodeError, GatewayError, ResponseError, TlsError,
    };
    pub use crate::feedback::{feedback_messages, FeedbackMessage};
    pub use crate::gateway::Gateway;
    pub use crate::notification::{AlertDictionary, Notification, NotificationPriority, Payload};
    pub use crate::sender::{Sender, SenderClosed, SenderError};
    pub use crate::transport::frame::{ErrorResponse, ResponseStatus};
    pub use crate::transport::ClientIdentity;
}

// Re-export commonly used items at crate root.
pub use crate::core::ApnsError;
pub use crate::gateway::Gateway;
pub use crate::notification::{Notification, Payload};
pub use crate::sender::{Sender, SenderError};
