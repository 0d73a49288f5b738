//! Certificate strategy
//!
//! Chooses between requesting a publicly-trusted certificate and keeping
//! the existing one, based on how the device is reachable right now.

mod issuer;
mod scheduler;
mod strategy;

pub use issuer::CommandIssuer;
pub use scheduler::CertificateScheduler;
pub use strategy::{
    decide, CertificateDecision, CertificateIssuer, CertificateStrategy, InterfaceInfo,
    ReachabilityState,
};
