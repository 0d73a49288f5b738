//! KDL configuration parsing.
//!
//! This module contains all functions for parsing KDL configuration files
//! into Perimeter configuration structures. It is organized into submodules:
//!
//! - `helpers`: Common parsing utility functions
//! - `sections`: One parser per top-level block

mod helpers;
mod sections;

pub use helpers::{
    get_bool_entry, get_first_arg_string, get_int_entry, get_path_entry, get_string_args,
    get_string_entry, offset_to_line_col,
};

pub use sections::{
    parse_certificate_config, parse_gateway_config, parse_network_config, parse_platform_config,
    parse_redirect_config, parse_systemd_config,
};

use anyhow::Result;
use tracing::warn;

use crate::Config;

// ============================================================================
// Top-Level Document Parser
// ============================================================================

/// Convert a parsed KDL document to Config
///
/// Missing blocks fall back to their defaults. Unknown blocks are logged
/// and ignored so newer configuration files still load.
pub fn parse_kdl_document(doc: kdl::KdlDocument) -> Result<Config> {
    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "platform" => {
                config.platform = parse_platform_config(node)?;
            }
            "network" => {
                config.network = parse_network_config(node)?;
            }
            "redirect" => {
                config.redirect = parse_redirect_config(node)?;
            }
            "gateway" => {
                config.gateway = parse_gateway_config(node)?;
            }
            "certificate" => {
                config.certificate = parse_certificate_config(node)?;
            }
            "systemd" => {
                config.systemd = parse_systemd_config(node)?;
            }
            other => {
                warn!(block = %other, "Ignoring unknown configuration block");
            }
        }
    }

    Ok(config)
}
