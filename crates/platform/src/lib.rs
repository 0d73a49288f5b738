//! Perimeter Platform Library
//!
//! The reachability and trust control plane of a self-hosted device.
//!
//! - **Access**: validates and persists the device's exposure mode and
//!   keeps the redirect service in sync
//! - **Certificate**: decides whether a publicly-trusted certificate can
//!   be requested given current reachability
//! - **Gateway**: owns the identity gateway's secrets and regenerates its
//!   configuration under a single lock
//!
//! Each component talks to the outside world through traits; the
//! production implementations live in [`network`], [`redirect`],
//! [`hooks`] and [`systemd`].
//!
//! # Example
//!
//! ```ignore
//! use perimeter_config::Config;
//! use perimeter_platform::Platform;
//!
//! let config = Config::default_embedded()?;
//! let platform = Platform::from_config(&config)?;
//! platform.gateway.init_config().await?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod access;
pub mod certificate;
pub mod gateway;
pub mod hooks;
pub mod network;
pub mod platform;
pub mod redirect;
pub mod systemd;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Access management
pub use access::{AccessManager, ChangeTrigger, NetworkInfo, Probe, RedirectClient, RedirectUpdate};

// Certificate strategy
pub use certificate::{
    CertificateDecision, CertificateIssuer, CertificateScheduler, CertificateStrategy,
    InterfaceInfo, ReachabilityState,
};

// Identity gateway
pub use gateway::{
    ConfigRenderer, GatewayProvisioner, GeneratedSecret, SecretGenerator, ServiceManager,
};

// Wiring
pub use platform::Platform;
