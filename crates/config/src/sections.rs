//! Platform configuration types
//!
//! One struct per top-level KDL block. Every field has a default so a
//! configuration file only needs to name what differs from the device
//! layout the platform ships with.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use perimeter_common::WEB_ACCESS_PORT;

// ============================================================================
// Platform
// ============================================================================

/// Device-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlatformConfig {
    /// Port the web interface is served on when no access port is configured
    #[serde(default = "default_web_access_port")]
    #[validate(range(min = 1))]
    pub web_access_port: u16,

    /// Persisted device state (access flags, domain, OIDC clients)
    #[serde(default = "default_user_config")]
    pub user_config: PathBuf,

    /// Directory holding per-app `access-change` hooks
    #[serde(default)]
    pub hooks_dir: Option<PathBuf>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            web_access_port: default_web_access_port(),
            user_config: default_user_config(),
            hooks_dir: None,
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// Address discovery
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetworkConfig {
    /// Timeout for a single public address lookup
    #[serde(default = "default_lookup_timeout")]
    #[validate(range(min = 1, max = 120))]
    pub lookup_timeout_secs: u64,

    /// Service that echoes the caller's public IPv4 address as plain text
    #[serde(default = "default_ip_discovery_url")]
    #[validate(length(min = 1))]
    pub ip_discovery_url: String,

    /// Remote IPv4 endpoint used to select the outbound interface
    #[serde(default = "default_route_probe_v4")]
    pub route_probe_v4: String,

    /// Remote IPv6 endpoint used to select the outbound interface
    #[serde(default = "default_route_probe_v6")]
    pub route_probe_v6: String,
}

impl NetworkConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_secs: default_lookup_timeout(),
            ip_discovery_url: default_ip_discovery_url(),
            route_probe_v4: default_route_probe_v4(),
            route_probe_v6: default_route_probe_v6(),
        }
    }
}

// ============================================================================
// Redirect
// ============================================================================

/// Dynamic DNS redirect service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedirectConfig {
    /// Base URL of the redirect API. When unset, the API is reached at
    /// `https://api.<redirect domain>` using the domain from user state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub api_url: Option<String>,

    /// Request timeout for redirect API calls
    #[serde(default = "default_redirect_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

impl RedirectConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: default_redirect_timeout(),
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Identity gateway provisioning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Service restarted after every regeneration
    #[serde(default = "default_gateway_service")]
    #[validate(length(min = 1))]
    pub service: String,

    /// App name the gateway is published under (`https://<app>.<domain>`)
    #[serde(default = "default_gateway_app")]
    #[validate(length(min = 1))]
    pub app: String,

    /// Directory of configuration templates
    #[serde(default = "default_gateway_template_dir")]
    pub template_dir: PathBuf,

    /// Directory the rendered configuration is written to
    #[serde(default = "default_gateway_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding the generated secret files
    #[serde(default = "default_gateway_secret_dir")]
    pub secret_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service: default_gateway_service(),
            app: default_gateway_app(),
            template_dir: default_gateway_template_dir(),
            output_dir: default_gateway_output_dir(),
            secret_dir: default_gateway_secret_dir(),
        }
    }
}

// ============================================================================
// Certificate
// ============================================================================

/// Certificate strategy scheduling
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CertificateConfig {
    /// Interval between certificate checks
    #[serde(default = "default_check_interval")]
    #[validate(range(min = 60))]
    pub check_interval_secs: u64,

    /// Program that requests a publicly-trusted certificate
    #[serde(default)]
    pub issue_command: Option<PathBuf>,

    /// Arguments passed to `issue_command`
    #[serde(default)]
    pub issue_args: Vec<String>,
}

impl CertificateConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            issue_command: None,
            issue_args: Vec::new(),
        }
    }
}

// ============================================================================
// Systemd
// ============================================================================

/// Service manager settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SystemdConfig {
    /// Prefix prepended to service names to form the unit name
    #[serde(default = "default_unit_prefix")]
    pub unit_prefix: String,
}

impl Default for SystemdConfig {
    fn default() -> Self {
        Self {
            unit_prefix: default_unit_prefix(),
        }
    }
}

// ============================================================================
// Default Value Functions
// ============================================================================

pub fn default_web_access_port() -> u16 {
    WEB_ACCESS_PORT
}

pub fn default_user_config() -> PathBuf {
    PathBuf::from("/var/snap/platform/common/user.json")
}

pub fn default_lookup_timeout() -> u64 {
    5
}

pub fn default_ip_discovery_url() -> String {
    "https://api.syncloud.it/ip".to_string()
}

pub fn default_route_probe_v4() -> String {
    "8.8.8.8:53".to_string()
}

pub fn default_route_probe_v6() -> String {
    "[2001:4860:4860::8888]:53".to_string()
}

pub fn default_redirect_timeout() -> u64 {
    10
}

pub fn default_gateway_service() -> String {
    "platform.authelia".to_string()
}

pub fn default_gateway_app() -> String {
    "auth".to_string()
}

pub fn default_gateway_template_dir() -> PathBuf {
    PathBuf::from("/snap/platform/current/config/authelia")
}

pub fn default_gateway_output_dir() -> PathBuf {
    PathBuf::from("/var/snap/platform/current/config/authelia")
}

pub fn default_gateway_secret_dir() -> PathBuf {
    PathBuf::from("/var/snap/platform/current/config/authelia")
}

pub fn default_check_interval() -> u64 {
    12 * 3600
}

pub fn default_unit_prefix() -> String {
    "snap.".to_string()
}
