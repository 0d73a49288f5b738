//! Persisted device state
//!
//! The control plane reads and writes a single JSON document describing the
//! device: access configuration, redirect registration, activation state,
//! domain and the OIDC client registry.
//!
//! # Atomicity
//!
//! Every mutation rewrites the whole document through a temporary file in
//! the same directory which is then renamed over the previous one. Readers
//! of the file therefore never observe a partially-updated document.
//!
//! Several processes may hold the same document open. A mutation takes an
//! exclusive lock on the sibling `<name>.lock` file, re-reads the document
//! from disk, applies the change to that fresh copy and writes it back, so
//! writers in different processes never drop each other's fields.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use perimeter_common::{
    AccessConfiguration, OidcClient, PerimeterError, PerimeterResult, WEB_PROTOCOL,
};

/// Domain used when the device has not been activated with one
const FALLBACK_DOMAIN: &str = "localhost";

/// Typed access to persisted device state.
///
/// Reads are served from memory and cannot fail; the in-memory copy is
/// refreshed from disk by every write. Writes return
/// [`PerimeterError::Persistence`] when the document could not be stored,
/// in which case the in-memory state is left unchanged.
pub trait UserConfig: Send + Sync {
    /// Current access configuration
    fn access(&self) -> AccessConfiguration;

    /// Replace the access configuration as one write
    fn save_access(&self, access: &AccessConfiguration) -> PerimeterResult<()>;

    fn is_redirect_enabled(&self) -> bool;

    fn redirect_domain(&self) -> String;

    /// Token authenticating this device against the redirect service
    fn update_token(&self) -> Option<String>;

    /// Whether the operator explicitly granted external access
    fn is_external_access(&self) -> bool;

    fn is_activated(&self) -> bool;

    /// Fully-qualified device domain
    fn device_domain(&self) -> String;

    /// URL of the device itself
    fn device_url(&self) -> String {
        format!("{}://{}", WEB_PROTOCOL, self.device_domain())
    }

    /// URL an app is published under
    fn url(&self, app: &str) -> String {
        format!("{}://{}.{}", WEB_PROTOCOL, app, self.device_domain())
    }

    fn oidc_clients(&self) -> Vec<OidcClient>;

    /// Append a client registration
    fn add_oidc_client(&self, client: OidcClient) -> PerimeterResult<()>;
}

/// On-disk shape of the device state document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    #[serde(default)]
    pub access: AccessConfiguration,

    #[serde(default)]
    pub redirect_enabled: bool,

    #[serde(default = "default_redirect_domain")]
    pub redirect_domain: String,

    #[serde(default)]
    pub external_access: bool,

    #[serde(default)]
    pub activated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_token: Option<String>,

    #[serde(default)]
    pub oidc_clients: Vec<OidcClient>,

    /// Time of the last successful write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            access: AccessConfiguration::default(),
            redirect_enabled: false,
            redirect_domain: default_redirect_domain(),
            external_access: false,
            activated: false,
            domain: None,
            update_token: None,
            oidc_clients: Vec::new(),
            updated_at: None,
        }
    }
}

fn default_redirect_domain() -> String {
    "syncloud.it".to_string()
}

/// File-backed [`UserConfig`]
#[derive(Debug)]
pub struct FileUserConfig {
    path: PathBuf,
    state: RwLock<UserState>,
}

impl FileUserConfig {
    /// Open the document at `path`.
    ///
    /// A missing file yields the default state; the file is created by the
    /// first write.
    pub fn open(path: impl AsRef<Path>) -> PerimeterResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = read_state(&path)?;

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the whole document
    pub fn snapshot(&self) -> UserState {
        self.state.read().clone()
    }

    pub fn set_redirect_enabled(&self, enabled: bool) -> PerimeterResult<()> {
        self.modify(|state| state.redirect_enabled = enabled)
    }

    pub fn set_redirect_domain(&self, domain: impl Into<String>) -> PerimeterResult<()> {
        let domain = domain.into();
        self.modify(|state| state.redirect_domain = domain)
    }

    pub fn set_external_access(&self, granted: bool) -> PerimeterResult<()> {
        self.modify(|state| state.external_access = granted)
    }

    pub fn set_activated(&self, activated: bool) -> PerimeterResult<()> {
        self.modify(|state| state.activated = activated)
    }

    pub fn set_domain(&self, domain: impl Into<String>) -> PerimeterResult<()> {
        let domain = domain.into();
        self.modify(|state| state.domain = Some(domain))
    }

    pub fn set_update_token(&self, token: impl Into<String>) -> PerimeterResult<()> {
        let token = token.into();
        self.modify(|state| state.update_token = Some(token))
    }

    /// Apply `change` to the current on-disk state, persist it, then
    /// publish it.
    ///
    /// The in-process write lock and the document lock file are both held
    /// from the re-read until the rename, so writers in this and other
    /// processes are applied one after another.
    fn modify(&self, change: impl FnOnce(&mut UserState)) -> PerimeterResult<()> {
        let mut guard = self.state.write();

        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| persistence(dir, e))?;
        let _lock = self.lock_document()?;

        let mut next = read_state(&self.path)?;
        change(&mut next);
        next.updated_at = Some(Utc::now());

        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.dir().join(name)
    }

    /// Exclusive lock on the sibling lock file, released on drop
    fn lock_document(&self) -> PerimeterResult<DocumentLock> {
        let lock_path = self.lock_path();

        let mut options = fs::OpenOptions::new();
        options.create(true).truncate(false).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(&lock_path)
            .map_err(|e| persistence(&lock_path, e))?;

        #[cfg(unix)]
        {
            use nix::fcntl::{Flock, FlockArg};
            let lock = Flock::lock(file, FlockArg::LockExclusive)
                .map_err(|(_, errno)| persistence(&lock_path, errno.into()))?;
            trace!(path = %lock_path.display(), "Locked user configuration");
            Ok(lock)
        }

        #[cfg(not(unix))]
        {
            Ok(file)
        }
    }

    fn persist(&self, state: &UserState) -> PerimeterResult<()> {
        let dir = self.dir();

        let content = serde_json::to_vec_pretty(state)?;

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| persistence(dir, e))?;
        file.write_all(&content)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| persistence(&self.path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))
                .map_err(|e| persistence(&self.path, e))?;
        }

        file.persist(&self.path)
            .map_err(|e| persistence(&self.path, e.error))?;

        trace!(path = %self.path.display(), "Persisted user configuration");
        Ok(())
    }
}

#[cfg(unix)]
type DocumentLock = nix::fcntl::Flock<fs::File>;

#[cfg(not(unix))]
type DocumentLock = fs::File;

/// Load the document at `path`, or the defaults when it does not exist
fn read_state(path: &Path) -> PerimeterResult<UserState> {
    if !path.exists() {
        trace!(path = %path.display(), "No user configuration found, using defaults");
        return Ok(UserState::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        PerimeterError::Persistence(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let state: UserState = serde_json::from_str(&content)?;
    debug!(path = %path.display(), "Loaded user configuration");
    Ok(state)
}

fn persistence(path: &Path, err: std::io::Error) -> PerimeterError {
    PerimeterError::Persistence(format!("{}: {}", path.display(), err))
}

impl UserConfig for FileUserConfig {
    fn access(&self) -> AccessConfiguration {
        self.state.read().access
    }

    fn save_access(&self, access: &AccessConfiguration) -> PerimeterResult<()> {
        let access = *access;
        self.modify(|state| state.access = access)?;
        info!(
            ipv4_enabled = access.ipv4_enabled,
            ipv4_public = access.ipv4_public,
            public_ip = ?access.public_ip,
            public_port = ?access.public_port,
            ipv6_enabled = access.ipv6_enabled,
            "Saved access configuration"
        );
        Ok(())
    }

    fn is_redirect_enabled(&self) -> bool {
        self.state.read().redirect_enabled
    }

    fn redirect_domain(&self) -> String {
        self.state.read().redirect_domain.clone()
    }

    fn update_token(&self) -> Option<String> {
        self.state.read().update_token.clone()
    }

    fn is_external_access(&self) -> bool {
        self.state.read().external_access
    }

    fn is_activated(&self) -> bool {
        self.state.read().activated
    }

    fn device_domain(&self) -> String {
        self.state
            .read()
            .domain
            .clone()
            .unwrap_or_else(|| FALLBACK_DOMAIN.to_string())
    }

    fn oidc_clients(&self) -> Vec<OidcClient> {
        self.state.read().oidc_clients.clone()
    }

    fn add_oidc_client(&self, client: OidcClient) -> PerimeterResult<()> {
        let id = client.id.clone();
        self.modify(|state| state.oidc_clients.push(client))?;
        info!(client_id = %id, "Registered OIDC client");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perimeter_common::{ClientId, TokenEndpointAuthMethod};
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    fn client(id: &str) -> OidcClient {
        OidcClient {
            id: ClientId::new(id),
            secret: "$argon2id$hash".to_string(),
            redirect_uri: format!("https://{}/callback", id),
            require_pkce: true,
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretPost,
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileUserConfig::open(temp_dir.path().join("user.json")).unwrap();

        assert_eq!(config.access(), AccessConfiguration::default());
        assert!(!config.is_redirect_enabled());
        assert!(!config.is_activated());
        assert_eq!(config.device_domain(), "localhost");
        assert!(config.oidc_clients().is_empty());
        assert!(!config.path().exists());
    }

    #[test]
    fn test_save_access_persists_all_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.json");

        let access = AccessConfiguration {
            ipv4_enabled: true,
            ipv4_public: false,
            public_ip: Some(Ipv4Addr::new(203, 0, 113, 5)),
            public_port: Some(8443),
            ipv6_enabled: true,
        };

        {
            let config = FileUserConfig::open(&path).unwrap();
            config.save_access(&access).unwrap();
        }

        let reopened = FileUserConfig::open(&path).unwrap();
        assert_eq!(reopened.access(), access);
        assert!(reopened.snapshot().updated_at.is_some());
    }

    #[test]
    fn test_urls_follow_domain() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileUserConfig::open(temp_dir.path().join("user.json")).unwrap();
        config.set_domain("example.syncloud.it").unwrap();

        assert_eq!(config.device_url(), "https://example.syncloud.it");
        assert_eq!(config.url("auth"), "https://auth.example.syncloud.it");
    }

    #[test]
    fn test_oidc_clients_append_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.json");

        let config = FileUserConfig::open(&path).unwrap();
        config.add_oidc_client(client("client1")).unwrap();
        config.add_oidc_client(client("client2")).unwrap();

        let reopened = FileUserConfig::open(&path).unwrap();
        let ids: Vec<_> = reopened
            .oidc_clients()
            .into_iter()
            .map(|c| c.id.into_string())
            .collect();
        assert_eq!(ids, vec!["client1", "client2"]);
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("user.json");

        let config = FileUserConfig::open(&path).unwrap();
        config.set_activated(true).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_document_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.json");
        let config = FileUserConfig::open(&path).unwrap();
        config.set_update_token("token").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let temp_dir = TempDir::new().unwrap();
        // A directory at the document path makes the final rename fail
        let path = temp_dir.path().join("user.json");
        fs::create_dir(&path).unwrap();

        let config = FileUserConfig {
            path: path.clone(),
            state: RwLock::new(UserState::default()),
        };
        let err = config.set_redirect_enabled(true).unwrap_err();
        assert!(matches!(err, PerimeterError::Persistence(_)));
        assert!(!config.is_redirect_enabled());
    }

    #[test]
    fn test_corrupt_document_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileUserConfig::open(&path).unwrap_err();
        assert!(matches!(err, PerimeterError::Persistence(_)));
    }

    #[test]
    fn test_handles_on_same_document_keep_each_others_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.json");

        let gateway = FileUserConfig::open(&path).unwrap();
        let access = FileUserConfig::open(&path).unwrap();

        gateway.add_oidc_client(client("client1")).unwrap();
        access
            .save_access(&AccessConfiguration {
                ipv4_enabled: true,
                ..Default::default()
            })
            .unwrap();

        // The second writer picked up the first one's change
        assert_eq!(access.oidc_clients().len(), 1);

        let reopened = FileUserConfig::open(&path).unwrap();
        assert_eq!(reopened.oidc_clients(), vec![client("client1")]);
        assert!(reopened.access().ipv4_enabled);
        assert!(temp_dir.path().join("user.json.lock").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_handles_lose_no_clients() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.json");

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let config = FileUserConfig::open(&path).unwrap();
                    for n in 0..10 {
                        config
                            .add_oidc_client(client(&format!("client-{}-{}", writer, n)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reopened = FileUserConfig::open(&path).unwrap();
        assert_eq!(reopened.oidc_clients().len(), 40);
    }
}
