//! Default embedded configuration for Perimeter
//!
//! Used when no configuration file is provided. It describes the standard
//! device layout: user state under the platform's common data directory,
//! gateway templates shipped with the platform, and the public redirect
//! service.

/// Embedded default configuration in KDL format
pub const DEFAULT_CONFIG_KDL: &str = r#"
// Perimeter Default Configuration
// This config is used when no configuration file is provided.

platform {
    web-access-port 443
    user-config "/var/snap/platform/common/user.json"
    hooks-dir "/snap/platform/current/hooks"
}

network {
    lookup-timeout-secs 5
    ip-discovery-url "https://api.syncloud.it/ip"
}

// The redirect API lives at https://api.<redirect domain> unless
// `api-url` overrides it
redirect {
    timeout-secs 10
}

gateway {
    service "platform.authelia"
    app "auth"
    template-dir "/snap/platform/current/config/authelia"
    output-dir "/var/snap/platform/current/config/authelia"
    secret-dir "/var/snap/platform/current/config/authelia"
}

certificate {
    check-interval-secs 43200
}

systemd {
    unit-prefix "snap."
}
"#;
