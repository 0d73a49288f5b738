//! Certificate strategy
//!
//! Decides each cycle whether a publicly-trusted certificate should be
//! requested. Requesting one is only pointless when the device cannot be
//! reached from the public internet by any path: redirect is enabled,
//! external access was not granted, the local IPv4 address is private and
//! no IPv6 address is available.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use perimeter_common::PerimeterResult;
use perimeter_config::UserConfig;

/// Live view of the device's network interfaces
#[async_trait]
pub trait InterfaceInfo: Send + Sync {
    /// IPv4 address of the interface holding the default route
    async fn local_ipv4(&self) -> PerimeterResult<Ipv4Addr>;

    /// Global IPv6 address, if any
    async fn ipv6(&self) -> PerimeterResult<Ipv6Addr>;
}

/// Requests a publicly-trusted certificate
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn request_public(&self) -> PerimeterResult<()>;
}

/// Reachability facts observed at decision time. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachabilityState {
    pub local_is_private_address: bool,
    pub ipv6_observed: bool,
}

impl ReachabilityState {
    /// Observe the current interfaces.
    ///
    /// Failing to resolve the local IPv4 address is an error; a missing
    /// IPv6 address only means IPv6 is unavailable.
    pub async fn observe(interface: &dyn InterfaceInfo) -> PerimeterResult<Self> {
        let local_ipv4 = interface.local_ipv4().await?;

        let ipv6_observed = match interface.ipv6().await {
            Ok(address) => {
                debug!(address = %address, "IPv6 available");
                true
            }
            Err(e) => {
                debug!(reason = %e, "IPv6 unavailable");
                false
            }
        };

        Ok(Self {
            local_is_private_address: local_ipv4.is_private(),
            ipv6_observed,
        })
    }
}

/// Outcome of a certificate cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateDecision {
    /// Request a publicly-trusted certificate
    RequestPublic,
    /// Keep the existing, possibly self-signed, certificate
    KeepExisting,
}

/// The decision table.
pub fn decide(
    redirect_enabled: bool,
    external_access: bool,
    state: ReachabilityState,
) -> CertificateDecision {
    let unreachable = redirect_enabled
        && !external_access
        && state.local_is_private_address
        && !state.ipv6_observed;

    if unreachable {
        CertificateDecision::KeepExisting
    } else {
        CertificateDecision::RequestPublic
    }
}

/// Runs the decision against persisted settings and live interfaces
pub struct CertificateStrategy {
    user_config: Arc<dyn UserConfig>,
    interface: Arc<dyn InterfaceInfo>,
    issuer: Arc<dyn CertificateIssuer>,
}

impl CertificateStrategy {
    pub fn new(
        user_config: Arc<dyn UserConfig>,
        interface: Arc<dyn InterfaceInfo>,
        issuer: Arc<dyn CertificateIssuer>,
    ) -> Self {
        Self {
            user_config,
            interface,
            issuer,
        }
    }

    /// Compute this cycle's decision without acting on it
    pub async fn evaluate(&self) -> PerimeterResult<CertificateDecision> {
        let state = ReachabilityState::observe(self.interface.as_ref()).await?;
        let redirect_enabled = self.user_config.is_redirect_enabled();
        let external_access = self.user_config.is_external_access();

        let decision = decide(redirect_enabled, external_access, state);
        debug!(
            redirect_enabled,
            external_access,
            local_is_private = state.local_is_private_address,
            ipv6_observed = state.ipv6_observed,
            decision = ?decision,
            "Evaluated certificate strategy"
        );
        Ok(decision)
    }

    /// Run one certificate cycle
    pub async fn run(&self) -> PerimeterResult<CertificateDecision> {
        let decision = self.evaluate().await?;

        match decision {
            CertificateDecision::RequestPublic => {
                info!("Requesting publicly-trusted certificate");
                self.issuer.request_public().await?;
            }
            CertificateDecision::KeepExisting => {
                info!("Device not publicly reachable, keeping existing certificate");
            }
        }

        Ok(decision)
    }
}

impl std::fmt::Debug for CertificateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStrategy").finish_non_exhaustive()
    }
}
