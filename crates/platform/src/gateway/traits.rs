//! Collaborators consumed by the gateway provisioner.

use std::path::Path;

use async_trait::async_trait;

use perimeter_common::PerimeterResult;

/// A freshly generated client credential
///
/// `password` is handed to the caller once; only `hash` is stored.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    pub password: String,
    pub hash: String,
}

impl std::fmt::Debug for GeneratedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSecret")
            .field("password", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}

/// Produces client credentials
#[async_trait]
pub trait SecretGenerator: Send + Sync {
    async fn generate(&self) -> PerimeterResult<GeneratedSecret>;
}

/// Renders the gateway configuration from a template set
pub trait ConfigRenderer: Send + Sync {
    fn render(
        &self,
        template_dir: &Path,
        output_dir: &Path,
        variables: &serde_json::Value,
    ) -> PerimeterResult<()>;
}

/// Restarts system services
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn restart_service(&self, service: &str) -> PerimeterResult<()>;
}
