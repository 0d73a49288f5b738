//! Identity gateway provisioning
//!
//! Keeps the auth gateway's secrets, client registry and rendered
//! configuration consistent with device state.

mod generator;
mod provisioner;
mod render;
mod secrets;
mod traits;

pub use generator::RandomSecretGenerator;
pub use provisioner::GatewayProvisioner;
pub use render::TemplateRenderer;
pub use secrets::{
    SecretStore, SymmetricSecrets, ENCRYPTION_KEY_FILE, HMAC_SECRET_FILE, JWKS_KEY_FILE,
    JWT_SECRET_FILE,
};
pub use traits::{ConfigRenderer, GeneratedSecret, SecretGenerator, ServiceManager};
