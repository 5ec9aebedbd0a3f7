//! Gateway façade over one or more senders.
//!
//! A [`Gateway`] resolves the gateway name once, creates senders pinned to
//! the least-used IPs, routes each submission to one of them and fans
//! their failures into a single user callback.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::constants::{GATEWAY_HOST, GATEWAY_PORT, GATEWAY_SANDBOX_HOST};
use crate::core::{ConnectError, GatewayError};
use crate::notification::Notification;
use crate::sender::{Sender, SenderClosed, SenderError};
use crate::transport::{ClientIdentity, TlsDialer};

mod resolve;

use resolve::{resolve, IpUsage};

/// Callback invoked once per surfaced delivery failure.
pub type ErrorCallback = Box<dyn Fn(SenderError) + Send + Sync>;

/// A client of one APNs gateway.
pub struct Gateway {
    ctx: CancellationToken,
    gateway: String,
    server_name: String,
    port: u16,
    tls: Arc<rustls::ClientConfig>,
    ips: IpUsage,
    senders: Vec<Sender>,
    callback: Arc<RwLock<Option<ErrorCallback>>>,
}

impl Gateway {
    /// Create a gateway client for the Apple production servers.
    pub async fn new(
        ctx: CancellationToken,
        certificate_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<Self, GatewayError> {
        let gateway = format!("{GATEWAY_HOST}:{GATEWAY_PORT}");
        Self::new_custom(ctx, &gateway, certificate_file, key_file).await
    }

    /// Create a gateway client for the Apple sandbox servers.
    pub async fn new_sandbox(
        ctx: CancellationToken,
        certificate_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<Self, GatewayError> {
        let gateway = format!("{GATEWAY_SANDBOX_HOST}:{GATEWAY_PORT}");
        Self::new_custom(ctx, &gateway, certificate_file, key_file).await
    }

    /// Create a gateway client for a custom `host:port` gateway, loading
    /// the TLS identity from PEM files.
    pub async fn new_custom(
        ctx: CancellationToken,
        gateway: &str,
        certificate_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<Self, GatewayError> {
        let identity = ClientIdentity::from_pem_files(certificate_file, key_file)?;
        Self::with_identity(ctx, gateway, identity).await
    }

    /// Create a gateway client for a custom `host:port` gateway with an
    /// already loaded TLS identity.
    pub async fn with_identity(
        ctx: CancellationToken,
        gateway: &str,
        identity: ClientIdentity,
    ) -> Result<Self, GatewayError> {
        let (server_name, port) = split_gateway(gateway)?;
        let tls = identity.into_client_config()?;
        let ips = IpUsage::new(resolve(gateway).await?);

        let mut this = Self {
            ctx,
            gateway: gateway.to_string(),
            server_name,
            port,
            tls,
            ips,
            senders: Vec::new(),
            callback: Arc::new(RwLock::new(None)),
        };
        this.add_sender()?;
        Ok(this)
    }

    /// Add a sender pinned to the least-used gateway IP.
    pub fn add_sender(&mut self) -> Result<(), GatewayError> {
        let ip = self
            .ips
            .acquire_least_used()
            .ok_or_else(|| GatewayError::NoAddresses(self.gateway.clone()))?;
        let addr = SocketAddr::new(ip, self.port).to_string();

        let dialer = Arc::new(TlsDialer::new(
            addr.clone(),
            self.server_name.clone(),
            Arc::clone(&self.tls),
        ));
        let (sender, error_rx) = Sender::with_dialer(self.ctx.clone(), addr, dialer);

        spawn_error_pump(self.ctx.clone(), error_rx, Arc::clone(&self.callback));
        self.senders.push(sender);
        Ok(())
    }

    /// Submit a notification through one of the gateway's senders.
    pub async fn send(&self, notification: Notification) -> Result<(), SenderClosed> {
        let index = rand::thread_rng().gen_range(0..self.senders.len());
        self.senders[index].send(notification).await
    }

    /// Register the callback invoked once per surfaced delivery failure.
    ///
    /// The callback runs outside any sender's event loop.
    pub fn on_error(&self, callback: impl Fn(SenderError) + Send + Sync + 'static) {
        *self.callback.write() = Some(Box::new(callback));
    }
}

/// Forward one sender's failures to the user callback.
fn spawn_error_pump(
    ctx: CancellationToken,
    mut error_rx: mpsc::Receiver<SenderError>,
    callback: Arc<RwLock<Option<ErrorCallback>>>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                failure = error_rx.recv() => match failure {
                    Some(failure) => {
                        if let Some(callback) = &*callback.read() {
                            callback(failure);
                        }
                    }
                    None => return,
                },
            }
        }
    });
}

fn split_gateway(gateway: &str) -> Result<(String, u16), ConnectError> {
    let Some((host, port)) = gateway.rsplit_once(':') else {
        return Err(ConnectError::InvalidAddress(gateway.to_string()));
    };
    if host.is_empty() {
        return Err(ConnectError::InvalidAddress(gateway.to_string()));
    }
    let port = port
        .parse()
        .map_err(|_| ConnectError::InvalidAddress(gateway.to_string()))?;
    Ok((host.to_string(), port))
}
