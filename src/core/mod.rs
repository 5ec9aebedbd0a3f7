//! Core constants and error types.
//!
//! Everything in this module is independent of the transport and of the
//! sender machinery; the rest of the crate builds on it.

pub mod constants;
mod error;

pub use error::{ApnsError, ConnectError, EncodeError, GatewayError, ResponseError, TlsError};
