//! Section-level KDL parsing.

use anyhow::Result;
use tracing::trace;

use crate::sections::*;

use super::helpers::{get_int_entry, get_path_entry, get_string_args, get_string_entry};

fn int_in_range<T: TryFrom<i128>>(node: &kdl::KdlNode, name: &str) -> Result<Option<T>> {
    match get_int_entry(node, name) {
        Some(value) => T::try_from(value).map(Some).map_err(|_| {
            anyhow::anyhow!(
                "Value {} for '{}' in '{}' block is out of range",
                value,
                name,
                node.name().value()
            )
        }),
        None => Ok(None),
    }
}

/// Parse platform configuration block
pub fn parse_platform_config(node: &kdl::KdlNode) -> Result<PlatformConfig> {
    trace!("Parsing platform configuration block");

    let config = PlatformConfig {
        web_access_port: int_in_range(node, "web-access-port")?
            .unwrap_or_else(default_web_access_port),
        user_config: get_path_entry(node, "user-config").unwrap_or_else(default_user_config),
        hooks_dir: get_path_entry(node, "hooks-dir"),
    };

    trace!(
        web_access_port = config.web_access_port,
        user_config = %config.user_config.display(),
        "Parsed platform configuration"
    );

    Ok(config)
}

/// Parse network configuration block
pub fn parse_network_config(node: &kdl::KdlNode) -> Result<NetworkConfig> {
    trace!("Parsing network configuration block");

    Ok(NetworkConfig {
        lookup_timeout_secs: int_in_range(node, "lookup-timeout-secs")?
            .unwrap_or_else(default_lookup_timeout),
        ip_discovery_url: get_string_entry(node, "ip-discovery-url")
            .unwrap_or_else(default_ip_discovery_url),
        route_probe_v4: get_string_entry(node, "route-probe-v4")
            .unwrap_or_else(default_route_probe_v4),
        route_probe_v6: get_string_entry(node, "route-probe-v6")
            .unwrap_or_else(default_route_probe_v6),
    })
}

/// Parse redirect configuration block
pub fn parse_redirect_config(node: &kdl::KdlNode) -> Result<RedirectConfig> {
    trace!("Parsing redirect configuration block");

    Ok(RedirectConfig {
        api_url: get_string_entry(node, "api-url"),
        timeout_secs: int_in_range(node, "timeout-secs")?
            .unwrap_or_else(default_redirect_timeout),
    })
}

/// Parse gateway configuration block
pub fn parse_gateway_config(node: &kdl::KdlNode) -> Result<GatewayConfig> {
    trace!("Parsing gateway configuration block");

    let config = GatewayConfig {
        service: get_string_entry(node, "service").unwrap_or_else(default_gateway_service),
        app: get_string_entry(node, "app").unwrap_or_else(default_gateway_app),
        template_dir: get_path_entry(node, "template-dir")
            .unwrap_or_else(default_gateway_template_dir),
        output_dir: get_path_entry(node, "output-dir").unwrap_or_else(default_gateway_output_dir),
        secret_dir: get_path_entry(node, "secret-dir").unwrap_or_else(default_gateway_secret_dir),
    };

    trace!(
        service = %config.service,
        template_dir = %config.template_dir.display(),
        output_dir = %config.output_dir.display(),
        "Parsed gateway configuration"
    );

    Ok(config)
}

/// Parse certificate configuration block
///
/// The first argument of `issue-command` is the program, the rest are
/// passed through as arguments.
pub fn parse_certificate_config(node: &kdl::KdlNode) -> Result<CertificateConfig> {
    trace!("Parsing certificate configuration block");

    let mut command = get_string_args(node, "issue-command").into_iter();
    let issue_command = command.next().map(Into::into);
    let issue_args = command.collect();

    Ok(CertificateConfig {
        check_interval_secs: int_in_range(node, "check-interval-secs")?
            .unwrap_or_else(default_check_interval),
        issue_command,
        issue_args,
    })
}

/// Parse systemd configuration block
pub fn parse_systemd_config(node: &kdl::KdlNode) -> Result<SystemdConfig> {
    trace!("Parsing systemd configuration block");

    Ok(SystemdConfig {
        unit_prefix: get_string_entry(node, "unit-prefix").unwrap_or_else(default_unit_prefix),
    })
}
