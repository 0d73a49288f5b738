//! Configuration module for Perimeter
//!
//! This crate provides platform configuration parsing and validation, and
//! the persisted device state the control plane reads and writes.
//!
//! # Module Organization
//!
//! - [`sections`]: Configuration block types and their defaults
//! - [`user_config`]: Persisted device state (access, domain, OIDC clients)
//! - `kdl`: KDL format parsing
//! - `defaults`: Default embedded configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use perimeter_common::{PerimeterError, PerimeterResult};

// ============================================================================
// Module Declarations
// ============================================================================

mod defaults;
mod kdl;
pub mod sections;
pub mod user_config;

// ============================================================================
// Re-exports
// ============================================================================

pub use defaults::DEFAULT_CONFIG_KDL;

pub use sections::{
    CertificateConfig, GatewayConfig, NetworkConfig, PlatformConfig, RedirectConfig,
    SystemdConfig,
};

pub use user_config::{FileUserConfig, UserConfig, UserState};

// ============================================================================
// Main Configuration Structure
// ============================================================================

/// Main configuration structure for Perimeter
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Device-wide settings
    #[serde(default)]
    #[validate(nested)]
    pub platform: PlatformConfig,

    /// Address discovery and reachability probing
    #[serde(default)]
    #[validate(nested)]
    pub network: NetworkConfig,

    /// Dynamic DNS redirect service
    #[serde(default)]
    #[validate(nested)]
    pub redirect: RedirectConfig,

    /// Identity gateway provisioning
    #[serde(default)]
    #[validate(nested)]
    pub gateway: GatewayConfig,

    /// Certificate strategy scheduling
    #[serde(default)]
    #[validate(nested)]
    pub certificate: CertificateConfig,

    /// Service manager settings
    #[serde(default)]
    #[validate(nested)]
    pub systemd: SystemdConfig,
}

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("kdl");

        match extension {
            "kdl" => Self::from_kdl(&content),
            "json" => Self::from_json(&content),
            _ => Err(anyhow::anyhow!("Unsupported config format: {}", extension)),
        }
    }

    /// Load the default embedded configuration.
    pub fn default_embedded() -> Result<Self> {
        Self::from_kdl(DEFAULT_CONFIG_KDL).or_else(|e| {
            tracing::warn!(
                "Failed to parse embedded KDL config, using programmatic default: {}",
                e
            );
            Ok(Self::default())
        })
    }

    /// Parse configuration from KDL format
    pub fn from_kdl(content: &str) -> Result<Self> {
        let doc: ::kdl::KdlDocument = content.parse().map_err(|e: ::kdl::KdlError| {
            use miette::Diagnostic;

            let mut error_msg = String::new();
            error_msg.push_str("KDL configuration parse error:\n\n");

            let mut found_details = false;
            if let Some(related) = e.related() {
                for diagnostic in related {
                    error_msg.push_str(&format!("  {}\n", diagnostic));
                    found_details = true;

                    if let Some(labels) = diagnostic.labels() {
                        for label in labels {
                            let (line, col) = kdl::offset_to_line_col(content, label.offset());
                            error_msg
                                .push_str(&format!("\n  --> at line {}, column {}\n", line, col));

                            if let Some(line_content) = content.lines().nth(line.saturating_sub(1))
                            {
                                error_msg.push_str(&format!("{:>4} | {}\n", line, line_content));
                                error_msg.push_str(&format!(
                                    "     | {}^",
                                    " ".repeat(col.saturating_sub(1))
                                ));
                                if let Some(label_msg) = label.label() {
                                    error_msg.push_str(&format!(" {}", label_msg));
                                }
                                error_msg.push('\n');
                            }
                        }
                    }

                    if let Some(help) = diagnostic.help() {
                        error_msg.push_str(&format!("\n  Help: {}\n", help));
                    }
                }
            }

            if !found_details {
                error_msg.push_str(&format!("  {}\n", e));
            }

            anyhow::anyhow!("{}", error_msg)
        })?;

        kdl::parse_kdl_document(doc)
    }

    /// Parse configuration from JSON format
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse JSON configuration")
    }

    /// Validate the configuration
    pub fn validate(&self) -> PerimeterResult<()> {
        Validate::validate(self).map_err(|e| {
            PerimeterError::Config(format!("Configuration validation failed: {}", e))
        })?;

        self.validate_paths()?;
        self.validate_probe_targets()?;

        Ok(())
    }

    fn validate_paths(&self) -> PerimeterResult<()> {
        let paths = [
            ("platform.user-config", &self.platform.user_config),
            ("gateway.template-dir", &self.gateway.template_dir),
            ("gateway.output-dir", &self.gateway.output_dir),
            ("gateway.secret-dir", &self.gateway.secret_dir),
        ];

        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(PerimeterError::Config(format!("'{}' must not be empty", name)));
            }
        }

        if self.gateway.template_dir == self.gateway.output_dir {
            return Err(PerimeterError::Config(
                "'gateway.template-dir' and 'gateway.output-dir' must differ".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_probe_targets(&self) -> PerimeterResult<()> {
        for (name, target) in [
            ("network.route-probe-v4", &self.network.route_probe_v4),
            ("network.route-probe-v6", &self.network.route_probe_v6),
        ] {
            target.parse::<std::net::SocketAddr>().map_err(|e| {
                PerimeterError::Config(format!("'{}' is not a socket address: {}", name, e))
            })?;
        }
        Ok(())
    }
}
