//! Access manager
//!
//! Validates the operator's requested exposure mode against the live
//! network, synchronizes it with the redirect service and persists it.
//!
//! # Update sequence
//!
//! 1. Normalize the IPv4 literal (malformed values are dropped)
//! 2. Resolve and probe public IPv4 when public IPv4 access is requested
//! 3. Resolve and probe IPv6 when IPv6 access is requested
//! 4. Push the result to the redirect service when redirect is enabled
//! 5. Persist the access configuration as one write
//! 6. Fire the change trigger
//!
//! Steps 1 to 4 are fail-closed: an error leaves the persisted
//! configuration untouched. A trigger failure in step 6 is returned even
//! though the configuration has already been saved.
//!
//! Concurrent updates are not serialized; the last one to reach step 5
//! wins.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use tracing::{debug, info, warn};

use perimeter_common::{
    parse_ipv4_literal, AccessConfiguration, AccessRequest, PerimeterResult, WEB_ACCESS_PORT,
};
use perimeter_config::UserConfig;

use super::traits::{ChangeTrigger, NetworkInfo, Probe, RedirectClient, RedirectUpdate};

/// Reachability decision engine
pub struct AccessManager {
    network: Arc<dyn NetworkInfo>,
    probe: Arc<dyn Probe>,
    redirect: Arc<dyn RedirectClient>,
    trigger: Arc<dyn ChangeTrigger>,
    user_config: Arc<dyn UserConfig>,
    /// Port used when the request names none, and for every IPv6 probe
    web_access_port: u16,
}

impl AccessManager {
    pub fn new(
        network: Arc<dyn NetworkInfo>,
        probe: Arc<dyn Probe>,
        redirect: Arc<dyn RedirectClient>,
        trigger: Arc<dyn ChangeTrigger>,
        user_config: Arc<dyn UserConfig>,
    ) -> Self {
        Self {
            network,
            probe,
            redirect,
            trigger,
            user_config,
            web_access_port: WEB_ACCESS_PORT,
        }
    }

    /// Override the platform web access port
    pub fn with_web_access_port(mut self, port: u16) -> Self {
        self.web_access_port = port;
        self
    }

    /// Currently persisted access configuration
    pub fn current(&self) -> AccessConfiguration {
        self.user_config.access()
    }

    /// Apply a new access configuration.
    pub async fn update(&self, request: &AccessRequest) -> PerimeterResult<()> {
        info!(
            ipv4_enabled = request.ipv4_enabled,
            ipv4_public = request.ipv4_public,
            ipv6_enabled = request.ipv6_enabled,
            access_port = ?request.access_port,
            "Updating access configuration"
        );

        let port = request.access_port.unwrap_or(self.web_access_port);

        let mut ipv4 = self.normalize_literal(request.ipv4.as_deref());

        if request.ipv4_enabled && request.ipv4_public {
            let address = match ipv4 {
                Some(address) => address,
                None => {
                    let address = self.network.public_ipv4().await?;
                    debug!(address = %address, "Resolved public IPv4 address");
                    address
                }
            };

            self.probe.probe(IpAddr::V4(address), port).await?;
            debug!(address = %address, port, "Public IPv4 address is reachable");
            ipv4 = Some(address);
        }

        if request.ipv6_enabled {
            let address = self.network.ipv6().await?;
            self.probe
                .probe(IpAddr::V6(address), self.web_access_port)
                .await?;
            debug!(
                address = %address,
                port = self.web_access_port,
                "IPv6 address is reachable"
            );
        }

        if self.user_config.is_redirect_enabled() {
            let update = RedirectUpdate {
                ipv4,
                port: request.access_port,
                ipv4_enabled: request.ipv4_enabled,
                ipv4_public: request.ipv4_public,
                ipv6_enabled: request.ipv6_enabled,
            };
            self.redirect.update(&update).await?;
            debug!("Redirect registration updated");
        }

        let access = AccessConfiguration {
            ipv4_enabled: request.ipv4_enabled,
            ipv4_public: request.ipv4_public,
            public_ip: ipv4,
            public_port: request.access_port,
            ipv6_enabled: request.ipv6_enabled,
        };
        self.user_config.save_access(&access)?;

        if let Err(e) = self.trigger.notify().await {
            warn!(
                error = %e,
                "Access configuration saved but change notification failed"
            );
            return Err(e);
        }

        info!("Access configuration updated");
        Ok(())
    }

    /// Re-push the persisted configuration to the redirect service.
    ///
    /// Does nothing when redirect is disabled.
    pub async fn sync(&self) -> PerimeterResult<()> {
        if !self.user_config.is_redirect_enabled() {
            debug!("Redirect disabled, nothing to sync");
            return Ok(());
        }

        let access = self.user_config.access();
        self.redirect.update(&RedirectUpdate::from(&access)).await?;

        info!("Redirect registration synchronized");
        Ok(())
    }

    fn normalize_literal(&self, literal: Option<&str>) -> Option<Ipv4Addr> {
        let raw = literal?;
        let parsed = parse_ipv4_literal(raw);
        if parsed.is_none() {
            warn!(literal = %raw, "Discarding malformed IPv4 literal");
        }
        parsed
    }
}

impl From<&AccessConfiguration> for RedirectUpdate {
    fn from(access: &AccessConfiguration) -> Self {
        Self {
            ipv4: access.public_ip,
            port: access.public_port,
            ipv4_enabled: access.ipv4_enabled,
            ipv4_public: access.ipv4_public,
            ipv6_enabled: access.ipv6_enabled,
        }
    }
}

impl std::fmt::Debug for AccessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessManager")
            .field("web_access_port", &self.web_access_port)
            .finish()
    }
}
