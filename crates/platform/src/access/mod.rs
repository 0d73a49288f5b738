//! Access management
//!
//! Decides how the device is reachable from outside its local network and
//! keeps that decision in sync with the redirect service.

mod manager;
mod traits;

pub use manager::AccessManager;
pub use traits::{ChangeTrigger, NetworkInfo, Probe, RedirectClient, RedirectUpdate};
