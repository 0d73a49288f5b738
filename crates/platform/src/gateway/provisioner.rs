//! Identity gateway provisioner
//!
//! Owns the gateway secrets and regenerates the gateway configuration from
//! device state. One lock serializes every regeneration and registration;
//! it is held through the restart so a slow restart delays the next caller
//! instead of racing it.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use perimeter_common::{
    ClientId, OidcClient, PerimeterError, PerimeterResult, TokenEndpointAuthMethod,
};
use perimeter_config::{GatewayConfig, UserConfig};

use super::secrets::SecretStore;
use super::traits::{ConfigRenderer, SecretGenerator, ServiceManager};

/// Variables handed to the renderer
#[derive(Serialize)]
struct GatewayVariables {
    domain: String,
    app_url: String,
    device_url: String,
    auth_url: String,
    encryption_key: String,
    jwt_secret: String,
    hmac_secret: String,
    jwks_key_file: String,
    is_activated: bool,
    oidc_clients: Vec<GatewayClient>,
}

/// A client as the gateway configuration lists it
#[derive(Debug, Serialize)]
struct GatewayClient {
    client_id: String,
    client_name: String,
    client_secret: String,
    public: bool,
    authorization_policy: &'static str,
    require_pkce: bool,
    pkce_challenge_method: &'static str,
    redirect_uris: Vec<String>,
    scopes: Vec<&'static str>,
    userinfo_signed_response_alg: &'static str,
    token_endpoint_auth_method: String,
}

impl From<&OidcClient> for GatewayClient {
    fn from(client: &OidcClient) -> Self {
        Self {
            client_id: client.id.to_string(),
            client_name: client.id.to_string(),
            client_secret: client.secret.clone(),
            public: false,
            authorization_policy: "one_factor",
            require_pkce: client.require_pkce,
            pkce_challenge_method: if client.require_pkce { "S256" } else { "" },
            redirect_uris: vec![client.redirect_uri.clone()],
            scopes: vec!["openid", "email", "profile", "groups"],
            userinfo_signed_response_alg: "none",
            token_endpoint_auth_method: client.token_endpoint_auth_method.to_string(),
        }
    }
}

/// Secret and configuration regeneration engine
pub struct GatewayProvisioner {
    lock: Mutex<()>,
    template_dir: PathBuf,
    output_dir: PathBuf,
    secrets: SecretStore,
    service: String,
    app: String,
    user_config: Arc<dyn UserConfig>,
    generator: Arc<dyn SecretGenerator>,
    renderer: Arc<dyn ConfigRenderer>,
    services: Arc<dyn ServiceManager>,
}

impl GatewayProvisioner {
    pub fn new(
        config: &GatewayConfig,
        user_config: Arc<dyn UserConfig>,
        generator: Arc<dyn SecretGenerator>,
        renderer: Arc<dyn ConfigRenderer>,
        services: Arc<dyn ServiceManager>,
    ) -> Self {
        Self {
            lock: Mutex::new(()),
            template_dir: config.template_dir.clone(),
            output_dir: config.output_dir.clone(),
            secrets: SecretStore::new(&config.secret_dir),
            service: config.service.clone(),
            app: config.app.clone(),
            user_config,
            generator,
            renderer,
            services,
        }
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Register a relying party and regenerate the configuration.
    ///
    /// Returns the plaintext credential. It is not stored and cannot be
    /// retrieved again.
    pub async fn register_oidc_client(
        &self,
        id: ClientId,
        redirect_uri: impl Into<String>,
        require_pkce: bool,
        token_endpoint_auth_method: TokenEndpointAuthMethod,
    ) -> PerimeterResult<String> {
        let _guard = self.lock.lock().await;

        let secret = self.generator.generate().await?;

        let client = OidcClient {
            id: id.clone(),
            secret: secret.hash,
            redirect_uri: redirect_uri.into(),
            require_pkce,
            token_endpoint_auth_method,
        };
        self.user_config.add_oidc_client(client)?;
        info!(client_id = %id, "Added OIDC client registration");

        self.regenerate().await?;

        Ok(secret.password)
    }

    /// Regenerate the gateway configuration from current state
    pub async fn init_config(&self) -> PerimeterResult<()> {
        let _guard = self.lock.lock().await;
        self.regenerate().await
    }

    /// Full regeneration. The caller holds `lock`.
    async fn regenerate(&self) -> PerimeterResult<()> {
        let is_activated = self.user_config.is_activated();
        let domain = self.user_config.device_domain();
        let app_url = self.user_config.url(&self.app);

        let symmetric = self.secrets.symmetric()?;
        let jwks_key_file = self.secrets.ensure_signing_key().await?;

        let clients = self.user_config.oidc_clients();

        let variables = GatewayVariables {
            domain,
            auth_url: app_url.clone(),
            app_url,
            device_url: self.user_config.device_url(),
            encryption_key: symmetric.encryption_key,
            jwt_secret: symmetric.jwt_secret,
            hmac_secret: symmetric.hmac_secret,
            jwks_key_file: jwks_key_file.display().to_string(),
            is_activated,
            oidc_clients: clients.iter().map(GatewayClient::from).collect(),
        };
        let variables = template_variables(&variables)?;

        self.renderer
            .render(&self.template_dir, &self.output_dir, &variables)?;
        debug!(
            output_dir = %self.output_dir.display(),
            clients = clients.len(),
            is_activated,
            "Gateway configuration rendered"
        );

        if let Err(e) = self.services.restart_service(&self.service).await {
            error!(service = %self.service, error = %e, "Unable to restart gateway");
            return Err(e);
        }

        info!(service = %self.service, "Gateway configuration applied");
        Ok(())
    }
}

/// Convert renderer input to JSON; a failure here is a render failure
fn template_variables(variables: &impl Serialize) -> PerimeterResult<serde_json::Value> {
    serde_json::to_value(variables)
        .map_err(|e| PerimeterError::Render(format!("invalid template variables: {}", e)))
}

impl std::fmt::Debug for GatewayProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayProvisioner")
            .field("template_dir", &self.template_dir)
            .field("output_dir", &self.output_dir)
            .field("secret_dir", &self.secrets.dir())
            .field("service", &self.service)
            .finish()
    }
}
