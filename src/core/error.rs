//! Error types for the APNs client.

use thiserror::Error;

use super::constants::{ERROR_RESPONSE_LEN, MAX_PAYLOAD_LEN};

/// Errors that can occur when encoding a notification frame.
///
/// These are notification-level failures: the notification can never be
/// sent, on this connection or any other.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The device token is not a valid hex string.
    #[error("failed decoding device token {token:?}: {source}")]
    TokenDecode {
        /// The offending token.
        token: String,
        /// The underlying hex error.
        source: hex::FromHexError,
    },

    /// The JSON-encoded payload exceeds the protocol limit.
    #[error("payload is {size} bytes, larger than the {MAX_PAYLOAD_LEN} byte limit")]
    PayloadTooLarge {
        /// Encoded payload size.
        size: usize,
    },

    /// The notification has no identifier.
    ///
    /// The sender assigns one before encoding; direct callers must set it.
    #[error("identifier was not set")]
    IdentifierUnset,

    /// Payload serialization failed.
    #[error("failed encoding payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when decoding an error-response packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The buffer is not exactly one error response long.
    #[error("invalid buffer length: expected {ERROR_RESPONSE_LEN} bytes, got {actual}")]
    InvalidLength {
        /// Actual buffer size.
        actual: usize,
    },
}

/// Errors in certificate loading and TLS configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Reading certificate or key material failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// PEM material could not be parsed.
    #[error("invalid PEM material: {0}")]
    InvalidPem(String),

    /// No certificate found in the PEM material.
    #[error("no certificate found")]
    MissingCertificate,

    /// No private key found in the PEM material.
    #[error("no private key found")]
    MissingPrivateKey,

    /// Inline material is not valid base64.
    #[error("invalid base64 material: {0}")]
    Base64(#[from] base64::DecodeError),

    /// TLS configuration was rejected.
    #[error("tls error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Errors that can occur when establishing a gateway connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The address is not of the form `host:port`.
    #[error("invalid gateway address {0:?}")]
    InvalidAddress(String),

    /// The gateway host is not a valid TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// TCP dial or TLS handshake failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in gateway construction.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Certificate material could not be loaded.
    #[error("tls error: {0}")]
    Tls(#[from] TlsError),

    /// The gateway address is malformed.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Gateway name resolution failed.
    #[error("failed resolving {gateway}: {source}")]
    Resolve {
        /// The gateway name.
        gateway: String,
        /// The underlying resolver error.
        source: std::io::Error,
    },

    /// The gateway name resolved to no addresses.
    #[error("no addresses for {0}")]
    NoAddresses(String),
}

/// Top-level APNs client errors.
#[derive(Debug, Error)]
pub enum ApnsError {
    /// Notification encoding error.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Error-response decoding error.
    #[error("response error: {0}")]
    Response(#[from] ResponseError),

    /// TLS configuration error.
    #[error("tls error: {0}")]
    Tls(#[from] TlsError),

    /// Connection establishment error.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Gateway construction error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
