//! Shared types for the Perimeter control plane.
//!
//! This crate holds the vocabulary every other crate speaks: the access
//! configuration model, OIDC client registrations, identifier newtypes,
//! and the error taxonomy.

pub mod errors;
pub mod ids;
pub mod types;

pub use errors::{AddressFamily, PerimeterError, PerimeterResult};
pub use ids::{ClientId, ServiceName};
pub use types::{
    parse_ipv4_literal, AccessConfiguration, AccessRequest, OidcClient, TokenEndpointAuthMethod,
    WEB_ACCESS_PORT, WEB_PROTOCOL,
};
