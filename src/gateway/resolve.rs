//! Gateway name resolution and IP usage balancing.
//!
//! The gateway name resolves to several anycast IPs. Each gateway caches
//! its resolved set and hands the least-used IP to every new sender, so
//! connections spread across the gateway fleet.

use std::collections::HashMap;
use std::net::IpAddr;

use parking_lot::Mutex;
use tokio::net::lookup_host;

use crate::core::GatewayError;

/// Resolve a `host:port` gateway name to its IPs.
pub(crate) async fn resolve(gateway: &str) -> Result<Vec<IpAddr>, GatewayError> {
    let addrs = lookup_host(gateway)
        .await
        .map_err(|source| GatewayError::Resolve {
            gateway: gateway.to_string(),
            source,
        })?;

    let mut ips: Vec<IpAddr> = Vec::new();
    for addr in addrs {
        if !ips.contains(&addr.ip()) {
            ips.push(addr.ip());
        }
    }

    if ips.is_empty() {
        return Err(GatewayError::NoAddresses(gateway.to_string()));
    }
    Ok(ips)
}

/// Per-IP usage accounting.
///
/// A balancing hint, not a hard guarantee: senders are long-lived, so
/// handing out the least-used IP at creation time is enough to spread
/// them.
#[derive(Debug)]
pub(crate) struct IpUsage {
    usage: Mutex<HashMap<IpAddr, u32>>,
}

impl IpUsage {
    /// Track usage for the given IPs, all starting unused.
    pub fn new(ips: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            usage: Mutex::new(ips.into_iter().map(|ip| (ip, 0)).collect()),
        }
    }

    /// Claim the least-used IP, incrementing its usage count.
    pub fn acquire_least_used(&self) -> Option<IpAddr> {
        let mut usage = self.usage.lock();
        let best = usage
            .iter()
            .min_by_key(|(_, &count)| count)
            .map(|(&ip, _)| ip)?;

        if let Some(count) = usage.get_mut(&best) {
            *count += 1;
        }
        Some(best)
    }
}
