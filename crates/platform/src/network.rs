//! Address discovery.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use perimeter_common::{AddressFamily, PerimeterError, PerimeterResult};
use perimeter_config::NetworkConfig;

use crate::access::NetworkInfo;
use crate::certificate::InterfaceInfo;

// ============================================================================
// Interface Discovery
// ============================================================================

/// Checks if an IPv6 address is a global unicast address (2000::/3).
pub fn is_global_unicast(ip: &Ipv6Addr) -> bool {
    let first_byte = ip.octets()[0];
    (0x20..=0x3f).contains(&first_byte)
}

/// Local addresses from the routing table, public IPv4 from a discovery
/// service.
///
/// Local addresses are found by connecting a UDP socket towards a remote
/// endpoint and reading back the address the kernel picked. No packets are
/// sent.
#[derive(Debug, Clone)]
pub struct InterfaceNetworkInfo {
    client: reqwest::Client,
    discovery_url: String,
    route_probe_v4: String,
    route_probe_v6: String,
}

impl InterfaceNetworkInfo {
    pub fn from_config(config: &NetworkConfig) -> PerimeterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.lookup_timeout())
            .build()
            .map_err(|e| PerimeterError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            discovery_url: config.ip_discovery_url.clone(),
            route_probe_v4: config.route_probe_v4.clone(),
            route_probe_v6: config.route_probe_v6.clone(),
        })
    }

    async fn route_source(&self, bind: &str, remote: &str) -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(remote).await?;
        Ok(socket.local_addr()?.ip())
    }
}

#[async_trait]
impl InterfaceInfo for InterfaceNetworkInfo {
    async fn local_ipv4(&self) -> PerimeterResult<Ipv4Addr> {
        match self.route_source("0.0.0.0:0", &self.route_probe_v4).await {
            Ok(IpAddr::V4(address)) if !address.is_unspecified() => Ok(address),
            Ok(other) => Err(PerimeterError::resolution(
                AddressFamily::Ipv4,
                format!("unexpected source address {}", other),
            )),
            Err(e) => Err(PerimeterError::resolution(AddressFamily::Ipv4, e.to_string())),
        }
    }

    async fn ipv6(&self) -> PerimeterResult<Ipv6Addr> {
        match self.route_source("[::]:0", &self.route_probe_v6).await {
            Ok(IpAddr::V6(address)) if is_global_unicast(&address) => Ok(address),
            Ok(other) => Err(PerimeterError::resolution(
                AddressFamily::Ipv6,
                format!("no global address (source {})", other),
            )),
            Err(e) => Err(PerimeterError::resolution(AddressFamily::Ipv6, e.to_string())),
        }
    }
}

#[async_trait]
impl NetworkInfo for InterfaceNetworkInfo {
    async fn public_ipv4(&self) -> PerimeterResult<Ipv4Addr> {
        let failed = |message: String| PerimeterError::resolution(AddressFamily::Ipv4, message);

        let response = self
            .client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("discovery service returned {}", status)));
        }

        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        let address = body
            .trim()
            .parse::<Ipv4Addr>()
            .map_err(|_| failed(format!("discovery service returned '{}'", body.trim())))?;

        debug!(address = %address, "Discovered public IPv4 address");
        Ok(address)
    }

    async fn ipv6(&self) -> PerimeterResult<Ipv6Addr> {
        InterfaceInfo::ipv6(self).await
    }
}
