//! TLS client identity for gateway authentication.
//!
//! APNs authenticates clients with a certificate issued per application.
//! The material can be loaded from PEM files on disk or from inline
//! base64 blobs; either way it ends up as a [`rustls::ClientConfig`]
//! shared by every connection a sender opens.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::prelude::{Engine, BASE64_STANDARD};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::core::TlsError;

/// Client certificate chain and private key.
pub struct ClientIdentity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    /// Load the identity from PEM-encoded certificate and key files.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, TlsError> {
        let cert_pem = fs::read(cert_path)?;
        let key_pem = fs::read(key_path)?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Load the identity from base64-encoded PEM blobs.
    pub fn from_base64(cert_base64: &str, key_base64: &str) -> Result<Self, TlsError> {
        let cert_pem = BASE64_STANDARD.decode(cert_base64.trim())?;
        let key_pem = BASE64_STANDARD.decode(key_base64.trim())?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Load the identity from PEM-encoded certificate and key material.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let certs = rustls_pemfile::certs(&mut &*cert_pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TlsError::InvalidPem(e.to_string()))?;
        if certs.is_empty() {
            return Err(TlsError::MissingCertificate);
        }

        let key = rustls_pemfile::private_key(&mut &*key_pem)
            .map_err(|e| TlsError::InvalidPem(e.to_string()))?
            .ok_or(TlsError::MissingPrivateKey)?;

        Ok(Self { certs, key })
    }

    /// Build the TLS client configuration presenting this identity.
    ///
    /// Server certificates are validated against the webpki root store.
    pub fn into_client_config(self) -> Result<Arc<rustls::ClientConfig>, TlsError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(self.certs, self.key)?;

        Ok(Arc::new(config))
    }
}
