//! Collaborators consumed by the access manager.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use serde::Serialize;

use perimeter_common::PerimeterResult;

/// Observes the device's current addresses
#[async_trait]
pub trait NetworkInfo: Send + Sync {
    /// Public IPv4 address as seen from outside the local network
    async fn public_ipv4(&self) -> PerimeterResult<Ipv4Addr>;

    /// Global IPv6 address of the device
    async fn ipv6(&self) -> PerimeterResult<Ipv6Addr>;
}

/// Inbound reachability check
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: IpAddr, port: u16) -> PerimeterResult<()>;
}

/// Facts pushed to the redirect service on every update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedirectUpdate {
    pub ipv4: Option<Ipv4Addr>,
    pub port: Option<u16>,
    pub ipv4_enabled: bool,
    pub ipv4_public: bool,
    pub ipv6_enabled: bool,
}

/// Dynamic DNS registration
#[async_trait]
pub trait RedirectClient: Send + Sync {
    async fn update(&self, update: &RedirectUpdate) -> PerimeterResult<()>;
}

/// Notifies dependent subsystems that the access configuration changed
#[async_trait]
pub trait ChangeTrigger: Send + Sync {
    async fn notify(&self) -> PerimeterResult<()>;
}
