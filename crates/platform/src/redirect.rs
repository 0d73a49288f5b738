//! Redirect service client.
//!
//! The redirect service keeps the device's domain pointed at its current
//! address and checks, from outside the local network, that the device
//! answers on a given address and port.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use perimeter_common::{PerimeterError, PerimeterResult};
use perimeter_config::{RedirectConfig, UserConfig};

use crate::access::{Probe, RedirectClient, RedirectUpdate};

/// Body of `POST /domain/update`
#[derive(Debug, Serialize)]
struct DomainUpdateRequest<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    ipv4_enabled: bool,
    ipv4_public: bool,
    ipv6_enabled: bool,
}

/// Body of `POST /probe`
#[derive(Debug, Serialize)]
struct ProbeRequest<'a> {
    token: &'a str,
    ip: IpAddr,
    port: u16,
}

/// Reply to `POST /probe`; `data` is `OK` when the device answered
#[derive(Debug, Default, Deserialize)]
struct ProbeResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

/// JSON client for the redirect API
///
/// Authenticates with the device's update token from the user config.
pub struct HttpRedirectClient {
    client: reqwest::Client,
    api_url: Option<String>,
    user_config: Arc<dyn UserConfig>,
}

impl HttpRedirectClient {
    pub fn new(config: &RedirectConfig, user_config: Arc<dyn UserConfig>) -> PerimeterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PerimeterError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config
                .api_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            user_config,
        })
    }

    /// API base URL, derived from the redirect domain unless configured
    pub fn api_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.clone(),
            None => format!("https://api.{}", self.user_config.redirect_domain()),
        }
    }
}

#[async_trait]
impl RedirectClient for HttpRedirectClient {
    async fn update(&self, update: &RedirectUpdate) -> PerimeterResult<()> {
        let token = self
            .user_config
            .update_token()
            .ok_or_else(|| PerimeterError::RemoteSync("device has no update token".to_string()))?;

        let body = DomainUpdateRequest {
            token: &token,
            ip: update.ipv4,
            port: update.port,
            ipv4_enabled: update.ipv4_enabled,
            ipv4_public: update.ipv4_public,
            ipv6_enabled: update.ipv6_enabled,
        };

        let url = format!("{}/domain/update", self.api_url());
        debug!(
            url = %url,
            ip = ?update.ipv4,
            port = ?update.port,
            "Updating redirect registration"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PerimeterError::RemoteSync(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PerimeterError::RemoteSync(format!(
                "{} returned {}: {}",
                url,
                status,
                message.trim()
            )));
        }

        info!(domain = %self.user_config.device_domain(), "Redirect registration updated");
        Ok(())
    }
}

/// Reachability as seen by the redirect service, which connects back to
/// the device from outside its network.
#[async_trait]
impl Probe for HttpRedirectClient {
    async fn probe(&self, address: IpAddr, port: u16) -> PerimeterResult<()> {
        let failed = |message: String| PerimeterError::reachability(address, port, message);

        let token = self
            .user_config
            .update_token()
            .ok_or_else(|| failed("device has no update token".to_string()))?;

        let url = format!("{}/probe", self.api_url());
        debug!(url = %url, address = %address, port, "Requesting external probe");

        let response = self
            .client
            .post(&url)
            .json(&ProbeRequest {
                token: &token,
                ip: address,
                port,
            })
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let reply: ProbeResponse = serde_json::from_str(&body).unwrap_or_default();

        if status.is_success() && reply.data.as_deref() == Some("OK") {
            debug!(address = %address, port, "External probe succeeded");
            return Ok(());
        }

        let reason = reply
            .message
            .or(reply.data)
            .unwrap_or_else(|| body.trim().to_string());
        warn!(
            address = %address,
            port,
            status = %status,
            reason = %reason,
            "External probe failed"
        );
        Err(failed(format!("probe returned {}: {}", status, reason)))
    }
}

impl std::fmt::Debug for HttpRedirectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRedirectClient")
            .field("api_url", &self.api_url)
            .finish()
    }
}
