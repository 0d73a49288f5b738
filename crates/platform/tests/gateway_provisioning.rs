//! Identity gateway registration and regeneration.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use parking_lot::Mutex;
use tempfile::TempDir;

use common::{gateway_fixture, SlowRestart};
use perimeter_common::{ClientId, TokenEndpointAuthMethod};
use perimeter_config::{FileUserConfig, GatewayConfig, UserConfig};
use perimeter_platform::gateway::{
    RandomSecretGenerator, TemplateRenderer, ENCRYPTION_KEY_FILE, HMAC_SECRET_FILE,
    JWKS_KEY_FILE, JWT_SECRET_FILE,
};
use perimeter_platform::GatewayProvisioner;

const TEMPLATE: &str = "\
domain: {{ domain }}
portal: {{ auth_url }}
activated: {{ is_activated }}
clients: {{ oidc_clients }}
";

#[tokio::test]
async fn test_register_clients_with_real_credentials() {
    let dir = TempDir::new().unwrap();
    let config = GatewayConfig {
        template_dir: dir.path().join("templates"),
        output_dir: dir.path().join("config"),
        secret_dir: dir.path().join("secrets"),
        ..Default::default()
    };
    fs::create_dir_all(&config.template_dir).unwrap();
    fs::write(config.template_dir.join("config.yml"), TEMPLATE).unwrap();
    fs::create_dir_all(&config.secret_dir).unwrap();
    fs::write(config.secret_dir.join(JWKS_KEY_FILE), "seeded").unwrap();

    let user_config = Arc::new(FileUserConfig::open(dir.path().join("user.json")).unwrap());
    user_config.set_domain("device.example.com").unwrap();

    let provisioner = GatewayProvisioner::new(
        &config,
        user_config.clone(),
        Arc::new(RandomSecretGenerator::new()),
        Arc::new(TemplateRenderer::new().unwrap()),
        Arc::new(SlowRestart {
            events: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }),
    );

    let first = provisioner
        .register_oidc_client(
            ClientId::new("client1"),
            "https://app/callback",
            true,
            TokenEndpointAuthMethod::ClientSecretPost,
        )
        .await
        .unwrap();

    let clients = user_config.oidc_clients();
    assert_eq!(clients.len(), 1);
    let stored = clients[0].clone();
    assert_eq!(stored.id.as_str(), "client1");
    assert_eq!(stored.redirect_uri, "https://app/callback");
    assert!(stored.require_pkce);
    assert_eq!(
        stored.token_endpoint_auth_method,
        TokenEndpointAuthMethod::ClientSecretPost
    );
    assert_ne!(stored.secret, first);

    let hash = PasswordHash::new(&stored.secret).unwrap();
    assert!(Argon2::default()
        .verify_password(first.as_bytes(), &hash)
        .is_ok());

    // Plaintext never lands on disk
    let persisted = fs::read_to_string(user_config.path()).unwrap();
    assert!(!persisted.contains(&first));

    let second = provisioner
        .register_oidc_client(
            ClientId::new("client2"),
            "https://other/callback",
            false,
            TokenEndpointAuthMethod::ClientSecretBasic,
        )
        .await
        .unwrap();
    assert_ne!(first, second);

    let clients = user_config.oidc_clients();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0], stored);
    assert_eq!(clients[1].id.as_str(), "client2");

    let rendered = fs::read_to_string(config.output_dir.join("config.yml")).unwrap();
    assert!(rendered.contains("domain: device.example.com"));
    assert!(rendered.contains("portal: https://auth.device.example.com"));
    assert!(rendered.contains("activated: false"));
    assert!(rendered.contains("\"client_id\":\"client1\""));
    assert!(rendered.contains("\"client_id\":\"client2\""));
    assert!(!rendered.contains(&first));
}

#[tokio::test]
async fn test_secrets_survive_regeneration() {
    let f = gateway_fixture(Duration::ZERO);

    f.provisioner.init_config().await.unwrap();
    let read_all = || {
        [ENCRYPTION_KEY_FILE, JWT_SECRET_FILE, HMAC_SECRET_FILE, JWKS_KEY_FILE]
            .iter()
            .map(|name| fs::read(f.config.secret_dir.join(name)).unwrap())
            .collect::<Vec<_>>()
    };
    let before = read_all();

    f.provisioner.init_config().await.unwrap();
    assert_eq!(read_all(), before);

    let variables = f.renderer.variables.lock();
    assert_eq!(variables.len(), 2);
    assert_eq!(variables[0], variables[1]);
    assert_eq!(variables[0]["domain"], "device.example.com");
    assert_eq!(variables[0]["is_activated"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_registrations_do_not_interleave() {
    let f = Arc::new(gateway_fixture(Duration::from_millis(50)));

    let a = {
        let f = f.clone();
        tokio::spawn(async move {
            f.provisioner
                .register_oidc_client(
                    ClientId::new("a"),
                    "https://a/callback",
                    false,
                    TokenEndpointAuthMethod::default(),
                )
                .await
        })
    };
    let b = {
        let f = f.clone();
        tokio::spawn(async move {
            f.provisioner
                .register_oidc_client(
                    ClientId::new("b"),
                    "https://b/callback",
                    false,
                    TokenEndpointAuthMethod::default(),
                )
                .await
        })
    };

    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_ne!(a, b);

    let sequence = [
        "generate:start",
        "generate:end",
        "render",
        "restart:start:platform.authelia",
        "restart:end",
    ];
    let events = f.events.lock().clone();
    assert_eq!(events.len(), sequence.len() * 2);
    for half in events.chunks(sequence.len()) {
        assert_eq!(half, sequence);
    }

    assert_eq!(f.user_config.oidc_clients().len(), 2);

    // The second render saw both clients
    let variables = f.renderer.variables.lock();
    assert_eq!(variables[1]["oidc_clients"].as_array().unwrap().len(), 2);
}
