//! The sender pipeline.
//!
//! A [`Sender`] owns one gateway connection at a time and drives it from a
//! single event loop: submissions flow in through a [priority
//! merge](merge), failures come back as read events, and the tail of a
//! failed connection is requeued ahead of new traffic before anything
//! else is written. Reconnection runs under bounded [backoff] rounds that
//! repeat forever.

mod backoff;
mod merge;
#[allow(clippy::module_inception)]
mod sender;

pub use sender::{Sender, SenderClosed, SenderError};
