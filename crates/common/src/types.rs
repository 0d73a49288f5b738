//! Common type definitions for Perimeter.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::ids::ClientId;

/// Default port the device serves its web interface on
pub const WEB_ACCESS_PORT: u16 = 443;

/// Scheme used for every device and app URL
pub const WEB_PROTOCOL: &str = "https";

// ============================================================================
// Access
// ============================================================================

/// Desired exposure mode as submitted by the operator.
///
/// `ipv4` is the raw literal from the request and is not trusted until
/// it has been parsed; see [`parse_ipv4_literal`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default)]
    pub ipv4_enabled: bool,
    #[serde(default)]
    pub ipv4_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_port: Option<u16>,
    #[serde(default)]
    pub ipv6_enabled: bool,
}

/// Persisted exposure configuration.
///
/// `public_ip` only ever holds a parsed IPv4 address; malformed literals
/// are dropped before they reach this type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfiguration {
    #[serde(default)]
    pub ipv4_enabled: bool,
    #[serde(default)]
    pub ipv4_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(default)]
    pub ipv6_enabled: bool,
}

impl AccessConfiguration {
    /// Render as the request shape, for read endpoints
    pub fn to_request(&self) -> AccessRequest {
        AccessRequest {
            ipv4: self.public_ip.map(|ip| ip.to_string()),
            ipv4_enabled: self.ipv4_enabled,
            ipv4_public: self.ipv4_public,
            access_port: self.public_port,
            ipv6_enabled: self.ipv6_enabled,
        }
    }
}

/// Parse an operator-supplied IPv4 literal.
///
/// Only a bare dotted-decimal IPv4 address is accepted. Anything else,
/// including surrounding whitespace, IPv6 literals and hostnames, yields
/// `None`.
pub fn parse_ipv4_literal(literal: &str) -> Option<Ipv4Addr> {
    literal.parse::<Ipv4Addr>().ok()
}

// ============================================================================
// OIDC
// ============================================================================

/// How a relying party authenticates at the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
    ClientSecretJwt,
    PrivateKeyJwt,
    None,
}

impl TokenEndpointAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenEndpointAuthMethod::ClientSecretBasic => "client_secret_basic",
            TokenEndpointAuthMethod::ClientSecretPost => "client_secret_post",
            TokenEndpointAuthMethod::ClientSecretJwt => "client_secret_jwt",
            TokenEndpointAuthMethod::PrivateKeyJwt => "private_key_jwt",
            TokenEndpointAuthMethod::None => "none",
        }
    }
}

impl std::fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenEndpointAuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client_secret_basic" => Ok(TokenEndpointAuthMethod::ClientSecretBasic),
            "client_secret_post" => Ok(TokenEndpointAuthMethod::ClientSecretPost),
            "client_secret_jwt" => Ok(TokenEndpointAuthMethod::ClientSecretJwt),
            "private_key_jwt" => Ok(TokenEndpointAuthMethod::PrivateKeyJwt),
            "none" => Ok(TokenEndpointAuthMethod::None),
            other => Err(format!(
                "Invalid token endpoint auth method '{}'. Valid methods: client_secret_basic, \
                 client_secret_post, client_secret_jwt, private_key_jwt, none",
                other
            )),
        }
    }
}

/// A relying party registered with the identity gateway.
///
/// `secret` is the hash of the credential handed out at registration.
/// The plaintext is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcClient {
    pub id: ClientId,
    pub secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub require_pkce: bool,
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_ipv4_literal() {
        assert_eq!(
            parse_ipv4_literal("203.0.113.5"),
            Some(Ipv4Addr::new(203, 0, 113, 5))
        );
        assert_eq!(parse_ipv4_literal(" 10.0.0.1 "), None);
        assert_eq!(parse_ipv4_literal("10.0.0.1\n"), None);
        assert_eq!(parse_ipv4_literal("not-an-ip"), None);
        assert_eq!(parse_ipv4_literal("2001:db8::1"), None);
        assert_eq!(parse_ipv4_literal("256.1.1.1"), None);
        assert_eq!(parse_ipv4_literal("1.2.3"), None);
        assert_eq!(parse_ipv4_literal(""), None);
    }

    #[test]
    fn test_access_request_json_shape() {
        let request: AccessRequest = serde_json::from_str(
            r#"{"ipv4":"203.0.113.5","ipv4_enabled":true,"ipv4_public":false,"access_port":8443,"ipv6_enabled":false}"#,
        )
        .unwrap();
        assert_eq!(request.ipv4.as_deref(), Some("203.0.113.5"));
        assert_eq!(request.access_port, Some(8443));

        let minimal: AccessRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(minimal, AccessRequest::default());
    }

    #[test]
    fn test_configuration_to_request() {
        let config = AccessConfiguration {
            ipv4_enabled: true,
            ipv4_public: true,
            public_ip: Some(Ipv4Addr::new(198, 51, 100, 7)),
            public_port: Some(10443),
            ipv6_enabled: false,
        };
        let request = config.to_request();
        assert_eq!(request.ipv4.as_deref(), Some("198.51.100.7"));
        assert_eq!(request.access_port, Some(10443));
        assert!(request.ipv4_public);
    }

    #[test]
    fn test_auth_method_round_trip_names() {
        let method: TokenEndpointAuthMethod = "client_secret_post".parse().unwrap();
        assert_eq!(method, TokenEndpointAuthMethod::ClientSecretPost);
        assert_eq!(
            serde_json::to_string(&method).unwrap(),
            "\"client_secret_post\""
        );
        assert!("password".parse::<TokenEndpointAuthMethod>().is_err());
    }

    proptest! {
        #[test]
        fn prop_any_ipv4_parses(a: u8, b: u8, c: u8, d: u8) {
            let literal = format!("{}.{}.{}.{}", a, b, c, d);
            prop_assert_eq!(parse_ipv4_literal(&literal), Some(Ipv4Addr::new(a, b, c, d)));
        }

        #[test]
        fn prop_non_numeric_literals_rejected(s in "[a-zA-Z_-]{1,20}") {
            prop_assert_eq!(parse_ipv4_literal(&s), None);
        }

        #[test]
        fn prop_padded_literals_rejected(a: u8, b: u8, c: u8, d: u8, pad in "[ \t]{1,3}") {
            let literal = format!("{}{}.{}.{}.{}", pad, a, b, c, d);
            prop_assert_eq!(parse_ipv4_literal(&literal), None);
        }
    }
}
