//! Error types for Perimeter
//!
//! One error enum covers the control plane. Each variant is a failure
//! class the caller can act on: resolution and reachability failures mean
//! the requested exposure is not possible right now, persistence failures
//! mean nothing was written, render and restart failures mean the gateway
//! may be running stale configuration.

use std::io;
use thiserror::Error;

/// Result type for control plane operations
pub type PerimeterResult<T> = Result<T, PerimeterError>;

/// Main error type for Perimeter operations
#[derive(Error, Debug)]
pub enum PerimeterError {
    /// No address of the requested family could be observed
    #[error("Unable to resolve {family} address: {message}")]
    Resolution {
        family: AddressFamily,
        message: String,
    },

    /// Inbound reachability probe failed
    #[error("Address {address}:{port} is not reachable: {message}")]
    Reachability {
        address: String,
        port: u16,
        message: String,
    },

    /// Redirect service rejected or failed the update
    #[error("Redirect service update failed: {0}")]
    RemoteSync(String),

    /// Configuration store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Change notification failed after configuration was persisted
    #[error("Change notification failed: {0}")]
    Trigger(String),

    /// Secret material could not be read or created
    #[error("Secret error for {path}: {message}")]
    Secret { path: String, message: String },

    /// Client credential could not be generated
    #[error("Credential generation failed: {0}")]
    Credential(String),

    /// Gateway configuration rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// Service restart failed
    #[error("Failed to restart service '{service}': {message}")]
    Restart { service: String, message: String },

    /// Certificate issuance collaborator failed
    #[error("Certificate issuance failed: {0}")]
    Certificate(String),

    /// Invalid platform configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// IP address family, used for resolution errors and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

impl PerimeterError {
    pub fn resolution(family: AddressFamily, message: impl Into<String>) -> Self {
        Self::Resolution {
            family,
            message: message.into(),
        }
    }

    pub fn reachability(address: impl ToString, port: u16, message: impl Into<String>) -> Self {
        Self::Reachability {
            address: address.to_string(),
            port,
            message: message.into(),
        }
    }

    pub fn secret(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Secret {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    pub fn restart(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Restart {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the failure happened before anything was persisted
    ///
    /// Validation, resolution, probe, and redirect failures abort an access
    /// update before the configuration store is touched.
    pub fn is_fail_closed(&self) -> bool {
        matches!(
            self,
            PerimeterError::Resolution { .. }
                | PerimeterError::Reachability { .. }
                | PerimeterError::RemoteSync(_)
        )
    }
}

impl From<serde_json::Error> for PerimeterError {
    fn from(e: serde_json::Error) -> Self {
        PerimeterError::Persistence(e.to_string())
    }
}
