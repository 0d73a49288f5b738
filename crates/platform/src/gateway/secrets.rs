//! Gateway secret files
//!
//! Four secrets live in the secret directory, one per file:
//!
//! ```text
//! secrets/
//! ├── authelia.storage.encryption.key   # storage encryption key (UUID)
//! ├── authelia.jwt.secret               # JWT signing secret (UUID)
//! ├── authelia.hmac_secret.key          # OIDC HMAC secret (UUID)
//! └── authelia.jwks.key                 # OIDC signing key (RSA-4096, PEM)
//! ```
//!
//! Each file is created once and never rotated. Files are written to a
//! temporary sibling and renamed into place, so an existing file is
//! always complete.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use perimeter_common::{PerimeterError, PerimeterResult};

pub const ENCRYPTION_KEY_FILE: &str = "authelia.storage.encryption.key";
pub const JWT_SECRET_FILE: &str = "authelia.jwt.secret";
pub const HMAC_SECRET_FILE: &str = "authelia.hmac_secret.key";
pub const JWKS_KEY_FILE: &str = "authelia.jwks.key";

/// Symmetric secrets read by the renderer
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricSecrets {
    pub encryption_key: String,
    pub jwt_secret: String,
    pub hmac_secret: String,
}

impl std::fmt::Debug for SymmetricSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricSecrets").finish_non_exhaustive()
    }
}

/// Read-or-create-once store for the gateway secrets
#[derive(Debug, Clone)]
pub struct SecretStore {
    dir: PathBuf,
}

impl SecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn encryption_key_path(&self) -> PathBuf {
        self.dir.join(ENCRYPTION_KEY_FILE)
    }

    pub fn jwt_secret_path(&self) -> PathBuf {
        self.dir.join(JWT_SECRET_FILE)
    }

    pub fn hmac_secret_path(&self) -> PathBuf {
        self.dir.join(HMAC_SECRET_FILE)
    }

    pub fn jwks_key_path(&self) -> PathBuf {
        self.dir.join(JWKS_KEY_FILE)
    }

    /// Read the three symmetric secrets, creating any that are missing
    pub fn symmetric(&self) -> PerimeterResult<SymmetricSecrets> {
        self.ensure_dir()?;
        Ok(SymmetricSecrets {
            encryption_key: self.read_or_create_token(&self.encryption_key_path())?,
            jwt_secret: self.read_or_create_token(&self.jwt_secret_path())?,
            hmac_secret: self.read_or_create_token(&self.hmac_secret_path())?,
        })
    }

    /// Create the signing key if it does not exist yet.
    ///
    /// Returns the key path. Key generation runs on the blocking pool.
    pub async fn ensure_signing_key(&self) -> PerimeterResult<PathBuf> {
        let path = self.jwks_key_path();
        if path.exists() {
            trace!(path = %path.display(), "Signing key present");
            return Ok(path);
        }

        self.ensure_dir()?;
        debug!(path = %path.display(), "Generating gateway signing key");

        let pem = tokio::task::spawn_blocking(generate_signing_key)
            .await
            .map_err(|e| PerimeterError::secret(&path, format!("key generation aborted: {}", e)))?
            .map_err(|e| PerimeterError::secret(&path, e))?;

        write_atomic(&path, pem.as_bytes())?;
        info!(path = %path.display(), "Created gateway signing key");
        Ok(path)
    }

    fn read_or_create_token(&self, path: &Path) -> PerimeterResult<String> {
        if path.exists() {
            let token = fs::read_to_string(path)
                .map_err(|e| PerimeterError::secret(path, e.to_string()))?;
            trace!(path = %path.display(), "Read existing secret");
            return Ok(token);
        }

        let token = uuid::Uuid::new_v4().to_string();
        write_atomic(path, token.as_bytes())?;
        info!(path = %path.display(), "Created secret");
        Ok(token)
    }

    fn ensure_dir(&self) -> PerimeterResult<()> {
        if self.dir.is_dir() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| PerimeterError::secret(&self.dir, e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| PerimeterError::secret(&self.dir, e.to_string()))?;
        }

        debug!(dir = %self.dir.display(), "Created secret directory");
        Ok(())
    }
}

/// RSA-4096 private key in PEM
fn generate_signing_key() -> Result<String, String> {
    let key = rcgen::KeyPair::generate_rsa_for(&rcgen::PKCS_RSA_SHA256, rcgen::RsaKeySize::_4096)
        .map_err(|e| e.to_string())?;
    Ok(key.serialize_pem())
}

/// Write `contents` to a temporary sibling with mode 0600, then rename
/// it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> PerimeterResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| PerimeterError::secret(path, "no parent directory"))?;
    let err = |e: std::io::Error| PerimeterError::secret(path, e.to_string());

    let mut file = tempfile::Builder::new()
        .prefix(".secret")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600)).map_err(err)?;
    }

    file.write_all(contents).map_err(err)?;
    file.as_file().sync_all().map_err(err)?;
    file.persist(path).map_err(|e| err(e.error))?;
    Ok(())
}
